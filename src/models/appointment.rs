use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use super::enums::AppointmentStatus;
use super::time_format::{hhmm, hhmm_opt};

/// A booked visit. `patient_name`, `patient_email`, `dentist_name` and
/// `service_name` are read-only joins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: i64,
    pub patient: i64,
    pub patient_name: String,
    pub patient_email: String,
    pub dentist: Option<i64>,
    pub dentist_name: Option<String>,
    pub service: Option<i64>,
    pub service_name: Option<String>,
    pub date: NaiveDate,
    #[serde(with = "hhmm")]
    pub time: NaiveTime,
    pub status: AppointmentStatus,
    pub notes: String,
    pub reschedule_date: Option<NaiveDate>,
    #[serde(with = "hhmm_opt", default)]
    pub reschedule_time: Option<NaiveTime>,
    pub reschedule_service: Option<i64>,
    pub reschedule_dentist: Option<i64>,
    pub reschedule_notes: Option<String>,
    pub cancel_reason: Option<String>,
    /// Status to fall back to when a pending request is rejected.
    #[serde(default)]
    pub prior_status: Option<AppointmentStatus>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Appointment {
    pub fn has_reschedule_proposal(&self) -> bool {
        self.reschedule_date.is_some()
            || self.reschedule_time.is_some()
            || self.reschedule_service.is_some()
            || self.reschedule_dentist.is_some()
            || self.reschedule_notes.is_some()
    }
}

/// Booking request. `patient` is ignored for patient callers; `status`
/// is always decided by the server from the caller's role.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewAppointment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patient: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dentist: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<i64>,
    pub date: Option<NaiveDate>,
    #[serde(with = "hhmm_opt", default)]
    pub time: Option<NaiveTime>,
    #[serde(default)]
    pub notes: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<AppointmentStatus>,
}

/// A patient's proposed new slot. Fields left `None` keep their current
/// value when the proposal is approved.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RescheduleProposal {
    pub date: Option<NaiveDate>,
    #[serde(with = "hhmm_opt", default)]
    pub time: Option<NaiveTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dentist: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl RescheduleProposal {
    /// Prefill a proposal from the appointment's current values so the
    /// caller only changes what it wants to move.
    pub fn from_appointment(appt: &Appointment) -> Self {
        Self {
            date: Some(appt.date),
            time: Some(appt.time),
            service: appt.service,
            dentist: appt.dentist,
            notes: if appt.notes.is_empty() {
                None
            } else {
                Some(appt.notes.clone())
            },
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CancelRequest {
    #[serde(default)]
    pub reason: String,
}

/// Staff edit. Only these four fields may be changed directly; patient
/// and dentist identity are never part of the payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppointmentUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<AppointmentStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    #[serde(with = "hhmm_opt", default, skip_serializing_if = "Option::is_none")]
    pub time: Option<NaiveTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl AppointmentUpdate {
    pub fn staff_edit(
        status: AppointmentStatus,
        date: NaiveDate,
        time: NaiveTime,
        notes: impl Into<String>,
    ) -> Self {
        Self {
            status: Some(status),
            date: Some(date),
            time: Some(time),
            notes: Some(notes.into()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.status.is_none() && self.date.is_none() && self.time.is_none() && self.notes.is_none()
    }
}

/// Optional clinical record written when a visit is marked completed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompletionNote {
    #[serde(default)]
    pub treatment: Option<String>,
    #[serde(default)]
    pub diagnosis: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl CompletionNote {
    pub fn is_empty(&self) -> bool {
        let blank = |v: &Option<String>| v.as_deref().map_or(true, |s| s.trim().is_empty());
        blank(&self.treatment) && blank(&self.diagnosis) && blank(&self.notes)
    }
}

/// An occupied dentist slot, exposed so booking forms can grey it out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookedSlot {
    pub date: NaiveDate,
    #[serde(with = "hhmm")]
    pub time: NaiveTime,
    pub dentist: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Appointment {
        let ts = NaiveDateTime::parse_from_str("2025-01-01 08:00:00", "%Y-%m-%d %H:%M:%S").unwrap();
        Appointment {
            id: 1,
            patient: 2,
            patient_name: "Pat Doe".into(),
            patient_email: "pat@example.com".into(),
            dentist: Some(3),
            dentist_name: Some("Dr Who".into()),
            service: Some(4),
            service_name: Some("Cleaning".into()),
            date: NaiveDate::from_ymd_opt(2025, 1, 20).unwrap(),
            time: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
            status: AppointmentStatus::Confirmed,
            notes: String::new(),
            reschedule_date: None,
            reschedule_time: None,
            reschedule_service: None,
            reschedule_dentist: None,
            reschedule_notes: None,
            cancel_reason: None,
            prior_status: None,
            created_at: ts,
            updated_at: ts,
        }
    }

    #[test]
    fn proposal_prefills_current_values() {
        let appt = sample();
        let proposal = RescheduleProposal::from_appointment(&appt);
        assert_eq!(proposal.date, Some(appt.date));
        assert_eq!(proposal.time, Some(appt.time));
        assert_eq!(proposal.service, Some(4));
        assert_eq!(proposal.dentist, Some(3));
        assert!(proposal.notes.is_none());
    }

    #[test]
    fn staff_edit_serializes_only_editable_fields() {
        let edit = AppointmentUpdate::staff_edit(
            AppointmentStatus::Confirmed,
            NaiveDate::from_ymd_opt(2025, 2, 1).unwrap(),
            NaiveTime::from_hms_opt(9, 30, 0).unwrap(),
            "moved",
        );
        let json = serde_json::to_value(&edit).unwrap();
        let keys: Vec<_> = json.as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys.len(), 4);
        assert!(json.get("patient").is_none());
        assert!(json.get("dentist").is_none());
        assert_eq!(json["time"], "09:30");
    }

    #[test]
    fn appointment_json_uses_short_times() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["time"], "10:00");
        assert_eq!(json["date"], "2025-01-20");
        assert_eq!(json["status"], "confirmed");
        assert!(json["reschedule_time"].is_null());
    }

    #[test]
    fn completion_note_blank_detection() {
        assert!(CompletionNote::default().is_empty());
        let note = CompletionNote {
            treatment: Some("  ".into()),
            ..Default::default()
        };
        assert!(note.is_empty());
        let note = CompletionNote {
            diagnosis: Some("caries".into()),
            ..Default::default()
        };
        assert!(!note.is_empty());
    }
}
