use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use super::enums::UserType;

/// Patients with no visit in this many days are reported inactive.
pub const PATIENT_ACTIVITY_WINDOW_DAYS: i64 = 730;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub user_type: UserType,
    pub phone: String,
    pub address: String,
    pub birthday: Option<NaiveDate>,
    pub age: Option<i64>,
    pub is_active_patient: bool,
    pub is_archived: bool,
    pub created_at: NaiveDateTime,
    pub last_appointment_date: Option<NaiveDate>,
}

impl User {
    pub fn full_name(&self) -> String {
        display_name(&self.first_name, &self.last_name, &self.username)
    }
}

/// "First Last", falling back to the username when both are blank.
pub fn display_name(first: &str, last: &str, username: &str) -> String {
    let full = format!("{} {}", first.trim(), last.trim());
    let full = full.trim();
    if full.is_empty() {
        username.to_string()
    } else {
        full.to_string()
    }
}

/// A patient counts as active unless archived or without any visit
/// (or, for new accounts, registration) inside the activity window.
pub fn patient_is_active(
    is_archived: bool,
    last_appointment: Option<NaiveDate>,
    created_at: NaiveDateTime,
    today: NaiveDate,
) -> bool {
    if is_archived {
        return false;
    }
    let reference = last_appointment.unwrap_or_else(|| created_at.date());
    (today - reference).num_days() <= PATIENT_ACTIVITY_WINDOW_DAYS
}

/// Registration / staff-creation payload.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub user_type: Option<UserType>,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub birthday: Option<NaiveDate>,
    #[serde(default)]
    pub age: Option<i64>,
}

/// Partial profile update. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub birthday: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_type: Option<UserType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

/// The authenticated caller, resolved from the request token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub user_id: i64,
    pub user_type: UserType,
    pub name: String,
}

impl Actor {
    pub fn is_clinic(&self) -> bool {
        self.user_type.is_clinic()
    }

    pub fn is_owner(&self) -> bool {
        self.user_type == UserType::Owner
    }

    /// Patients may only touch their own records; clinic users any.
    pub fn can_access_patient(&self, patient_id: i64) -> bool {
        self.is_clinic() || self.user_id == patient_id
    }
}
