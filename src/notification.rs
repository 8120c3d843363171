//! Staff notifications raised by patient actions on appointments.
//!
//! Every clinic account (staff and owner, not archived) receives its own
//! row, so read state is tracked per recipient. When staff settle a
//! request, all rows about that appointment are marked read.
//!
//! The assigned dentist also gets a personal feed entry when a booking
//! lands on their calendar, moves, or is cancelled.

use rusqlite::Connection;

use crate::db::{self, DatabaseError};
use crate::models::enums::NotificationType;
use crate::models::time_format::format_time;
use crate::models::{Appointment, RescheduleProposal};

/// Fan a notification out to every clinic account. Returns the number
/// of rows written.
pub fn notify_clinic(
    conn: &Connection,
    appointment: i64,
    notification_type: NotificationType,
    message: &str,
) -> Result<usize, DatabaseError> {
    let recipients = db::list_clinic_users(conn)?;
    for user in &recipients {
        db::insert_notification(conn, user.id, Some(appointment), notification_type, message)?;
    }
    tracing::debug!(
        appointment,
        kind = notification_type.as_str(),
        recipients = recipients.len(),
        "Clinic notified"
    );
    Ok(recipients.len())
}

/// Append to the assigned dentist's feed. Appointments without a
/// dentist produce nothing.
pub fn notify_dentist(
    conn: &Connection,
    dentist: Option<i64>,
    appointment: Option<i64>,
    message: &str,
) -> Result<Option<i64>, DatabaseError> {
    let Some(dentist) = dentist else {
        return Ok(None);
    };
    let id = db::insert_dentist_notification(conn, dentist, appointment, message)?;
    tracing::debug!(dentist, ?appointment, "Dentist notified");
    Ok(Some(id))
}

/// Mark every notification about an appointment read.
pub fn resolve_for_appointment(conn: &Connection, appointment: i64) -> Result<usize, DatabaseError> {
    db::mark_appointment_notifications_read(conn, appointment)
}

fn slot(appt: &Appointment) -> String {
    format!("{} at {}", appt.date, format_time(&appt.time))
}

pub fn new_appointment_message(appt: &Appointment) -> String {
    let service = appt
        .service_name
        .as_deref()
        .map(|s| format!(" for {s}"))
        .unwrap_or_default();
    format!("{} booked an appointment{service} on {}", appt.patient_name, slot(appt))
}

pub fn reschedule_request_message(appt: &Appointment, proposal: &RescheduleProposal) -> String {
    let date = proposal.date.unwrap_or(appt.date);
    let time = proposal.time.unwrap_or(appt.time);
    format!(
        "{} requested to reschedule the appointment on {} to {} at {}",
        appt.patient_name,
        slot(appt),
        date,
        format_time(&time)
    )
}

pub fn cancel_request_message(appt: &Appointment, reason: &str) -> String {
    let reason = reason.trim();
    if reason.is_empty() {
        format!("{} requested to cancel the appointment on {}", appt.patient_name, slot(appt))
    } else {
        format!(
            "{} requested to cancel the appointment on {}: {reason}",
            appt.patient_name,
            slot(appt)
        )
    }
}

pub fn dentist_booking_message(appt: &Appointment) -> String {
    format!("New appointment with {} on {}", appt.patient_name, slot(appt))
}

pub fn dentist_moved_message(appt: &Appointment) -> String {
    format!("Appointment with {} moved to {}", appt.patient_name, slot(appt))
}

pub fn dentist_cancelled_message(appt: &Appointment) -> String {
    format!("Appointment with {} on {} was cancelled", appt.patient_name, slot(appt))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::fixtures::{self, at, day};
    use crate::db::sqlite::open_memory_database;
    use crate::models::enums::{AppointmentStatus, UserType};

    #[test]
    fn fans_out_to_active_clinic_accounts() {
        let conn = open_memory_database().unwrap();
        let patient = fixtures::user(&conn, "pat", UserType::Patient);
        let staff = fixtures::user(&conn, "staff", UserType::Staff);
        let owner = fixtures::user(&conn, "owner", UserType::Owner);
        let archived = fixtures::user(&conn, "old", UserType::Staff);
        db::set_archived(&conn, archived, true).unwrap();
        let appt = fixtures::appointment(&conn, patient, None, day(2025, 1, 20), at(10, 0), AppointmentStatus::Pending);

        let sent = notify_clinic(&conn, appt, NotificationType::NewAppointment, "hi").unwrap();
        assert_eq!(sent, 2);
        assert_eq!(db::count_unread(&conn, staff).unwrap(), 1);
        assert_eq!(db::count_unread(&conn, owner).unwrap(), 1);
        assert_eq!(db::count_unread(&conn, archived).unwrap(), 0);
        assert_eq!(db::count_unread(&conn, patient).unwrap(), 0);

        assert_eq!(resolve_for_appointment(&conn, appt).unwrap(), 2);
        assert_eq!(db::count_unread(&conn, staff).unwrap(), 0);
    }

    #[test]
    fn messages_name_patient_and_slots() {
        let conn = open_memory_database().unwrap();
        let patient = fixtures::user(&conn, "pat", UserType::Patient);
        let id = fixtures::appointment(&conn, patient, None, day(2025, 1, 20), at(10, 0), AppointmentStatus::Confirmed);
        let appt = db::get_appointment(&conn, id).unwrap();

        let proposal = RescheduleProposal {
            date: Some(day(2025, 1, 25)),
            time: Some(at(14, 0)),
            ..Default::default()
        };
        assert_eq!(
            reschedule_request_message(&appt, &proposal),
            "PAT Test requested to reschedule the appointment on 2025-01-20 at 10:00 to 2025-01-25 at 14:00"
        );
        assert_eq!(
            cancel_request_message(&appt, " moving away "),
            "PAT Test requested to cancel the appointment on 2025-01-20 at 10:00: moving away"
        );
        assert!(new_appointment_message(&appt).starts_with("PAT Test booked an appointment on"));
    }

    #[test]
    fn dentist_feed_skips_unassigned() {
        let conn = open_memory_database().unwrap();
        let doc = fixtures::user(&conn, "doc", UserType::Staff);
        assert_eq!(notify_dentist(&conn, None, None, "x").unwrap(), None);
        assert!(notify_dentist(&conn, Some(doc), None, "x").unwrap().is_some());
        assert_eq!(db::count_unread_dentist_notifications(&conn, doc).unwrap(), 1);
    }
}
