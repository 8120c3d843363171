use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::enums::BillingStatus;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Billing {
    pub id: i64,
    pub patient: i64,
    pub patient_name: String,
    pub appointment: Option<i64>,
    pub amount: f64,
    pub description: String,
    pub status: BillingStatus,
    pub created_by: Option<i64>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewBilling {
    pub patient: i64,
    #[serde(default)]
    pub appointment: Option<i64>,
    pub amount: f64,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub status: Option<BillingStatus>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BillingStatusUpdate {
    pub status: BillingStatus,
}
