use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use super::enums::{AppointmentStatus, NotificationType};
use super::time_format::{hhmm, hhmm_opt};

/// A staff-facing record that a patient acted on an appointment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppointmentNotification {
    pub id: i64,
    pub recipient: i64,
    pub appointment: Option<i64>,
    pub notification_type: NotificationType,
    pub message: String,
    pub is_read: bool,
    pub created_at: NaiveDateTime,
    #[serde(default)]
    pub appointment_details: Option<AppointmentDetails>,
}

/// Snapshot of the appointment a notification points at, embedded so the
/// notification panel can render a request without a second fetch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppointmentDetails {
    pub patient_name: String,
    pub date: NaiveDate,
    #[serde(with = "hhmm")]
    pub time: NaiveTime,
    pub status: AppointmentStatus,
    #[serde(default)]
    pub service_name: Option<String>,
    #[serde(default)]
    pub reschedule_date: Option<NaiveDate>,
    #[serde(with = "hhmm_opt", default)]
    pub reschedule_time: Option<NaiveTime>,
    #[serde(default)]
    pub cancel_reason: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnreadCount {
    pub unread_count: i64,
}

/// Feed entry for the dentist assigned to an appointment: new bookings,
/// approved moves and approved cancellations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DentistNotification {
    pub id: i64,
    pub dentist: i64,
    pub appointment: Option<i64>,
    pub message: String,
    pub is_read: bool,
    pub created_at: NaiveDateTime,
}
