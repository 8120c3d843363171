use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use super::enums::TreatmentStatus;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreatmentAssignment {
    pub id: i64,
    pub patient: i64,
    pub title: String,
    pub description: String,
    pub assigned_dentist: Option<i64>,
    pub assigned_dentist_name: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub status: TreatmentStatus,
    pub created_by: Option<i64>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTreatmentAssignment {
    pub patient: i64,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub assigned_dentist: Option<i64>,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub status: Option<TreatmentStatus>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TreatmentUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_dentist: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<TreatmentStatus>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TreatmentStatusUpdate {
    pub status: TreatmentStatus,
}
