use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// A treatment entry in the patient's dental history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DentalRecord {
    pub id: i64,
    pub patient: i64,
    pub appointment: Option<i64>,
    pub treatment: String,
    pub diagnosis: String,
    pub notes: String,
    pub created_by: Option<i64>,
    pub created_by_name: Option<String>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewDentalRecord {
    pub patient: i64,
    #[serde(default)]
    pub appointment: Option<i64>,
    pub treatment: String,
    #[serde(default)]
    pub diagnosis: String,
    #[serde(default)]
    pub notes: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DentalRecordUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub treatment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagnosis: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}
