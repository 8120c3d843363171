use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Medical history questionnaire. One per patient.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntakeForm {
    pub id: i64,
    pub patient: i64,
    pub allergies: String,
    pub current_medications: String,
    pub medical_conditions: String,
    pub previous_dental_treatments: String,
    pub dental_concerns: String,
    pub emergency_contact_name: String,
    pub emergency_contact_phone: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// Body for both create and update; on update every field is replaced.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IntakeFormInput {
    #[serde(default)]
    pub patient: Option<i64>,
    #[serde(default)]
    pub allergies: String,
    #[serde(default)]
    pub current_medications: String,
    #[serde(default)]
    pub medical_conditions: String,
    #[serde(default)]
    pub previous_dental_treatments: String,
    #[serde(default)]
    pub dental_concerns: String,
    #[serde(default)]
    pub emergency_contact_name: String,
    #[serde(default)]
    pub emergency_contact_phone: String,
}
