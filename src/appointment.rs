//! Appointment lifecycle: booking, patient requests and staff decisions.
//!
//! Status workflow:
//!
//! ```text
//! pending ──┐                  ┌─ approve_reschedule ─▶ confirmed (new slot)
//!           ├─ reschedule ─▶ reschedule_requested
//! confirmed ┘                  └─ reject_reschedule ──▶ prior status
//!           ┌─ cancel ─────▶ cancel_requested
//!           │                  ├─ approve_cancel ─────▶ (deleted)
//!           │                  └─ reject_cancel ──────▶ prior status
//! pending | confirmed ─ mark_completed ─▶ completed
//! ```
//!
//! Every transition is a single guarded write (`WHERE status IN allowed`),
//! so two staff members deciding the same request cannot both win.
//! Writes that claim a dentist slot check it inside an `IMMEDIATE`
//! transaction, and the unique active-slot index backs the check.

use chrono::{NaiveDate, NaiveTime};
use rusqlite::{Connection, Transaction, TransactionBehavior};
use thiserror::Error;

use crate::db::{self, AppointmentFilter, AppointmentInsert, DatabaseError};
use crate::models::enums::{AppointmentStatus, NotificationType};
use crate::models::*;
use crate::notification;

use AppointmentStatus::*;

#[derive(Error, Debug)]
pub enum LifecycleError {
    #[error("Cannot {action} an appointment that is {status}")]
    InvalidTransition {
        action: &'static str,
        status: AppointmentStatus,
    },

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Forbidden(String),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

/// Lifecycle actions and the statuses each may start from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    RequestReschedule,
    RequestCancel,
    ApproveReschedule,
    RejectReschedule,
    ApproveCancel,
    RejectCancel,
    MarkCompleted,
}

impl Transition {
    pub fn allowed_from(&self) -> &'static [AppointmentStatus] {
        match self {
            Self::RequestReschedule | Self::RequestCancel | Self::MarkCompleted => {
                &[Pending, Confirmed]
            }
            Self::ApproveReschedule | Self::RejectReschedule => &[RescheduleRequested],
            Self::ApproveCancel | Self::RejectCancel => &[CancelRequested],
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RequestReschedule => "request a reschedule of",
            Self::RequestCancel => "request cancellation of",
            Self::ApproveReschedule => "approve a reschedule of",
            Self::RejectReschedule => "reject a reschedule of",
            Self::ApproveCancel => "approve cancellation of",
            Self::RejectCancel => "reject cancellation of",
            Self::MarkCompleted => "complete",
        }
    }

    /// Patient requests come from the appointment's patient; every other
    /// action is a staff/owner decision.
    pub fn is_patient_action(&self) -> bool {
        matches!(self, Self::RequestReschedule | Self::RequestCancel)
    }

    pub fn check(&self, current: AppointmentStatus) -> Result<(), LifecycleError> {
        if self.allowed_from().contains(&current) {
            Ok(())
        } else {
            Err(LifecycleError::InvalidTransition {
                action: self.as_str(),
                status: current,
            })
        }
    }
}

// ─── Access ───────────────────────────────────────────────────────────────────

/// Fetch an appointment the actor may see. Patients get not-found for
/// appointments that are not theirs.
pub fn fetch_for(conn: &Connection, actor: &Actor, id: i64) -> Result<Appointment, LifecycleError> {
    let appt = db::get_appointment(conn, id)?;
    if !actor.can_access_patient(appt.patient) {
        return Err(DatabaseError::not_found("Appointment", id).into());
    }
    Ok(appt)
}

fn require_clinic(actor: &Actor, what: &str) -> Result<(), LifecycleError> {
    if actor.is_clinic() {
        Ok(())
    } else {
        Err(LifecycleError::Forbidden(format!("Only staff can {what}")))
    }
}

fn authorize(conn: &Connection, actor: &Actor, id: i64, transition: Transition) -> Result<Appointment, LifecycleError> {
    let appt = fetch_for(conn, actor, id)?;
    if transition.is_patient_action() {
        if actor.user_id != appt.patient {
            return Err(LifecycleError::Forbidden(
                "Only the patient can make this request".into(),
            ));
        }
    } else {
        require_clinic(actor, "decide on appointments")?;
    }
    Ok(appt)
}

/// Explain a guarded write that changed nothing: the row vanished or
/// someone else moved it out of an allowed status first.
fn lost_race(conn: &Connection, id: i64, transition: Transition) -> LifecycleError {
    match db::current_status(conn, id) {
        Ok(status) => {
            tracing::warn!(appointment = id, status = %status, action = transition.as_str(), "Transition refused");
            LifecycleError::InvalidTransition {
                action: transition.as_str(),
                status,
            }
        }
        Err(e) => e.into(),
    }
}

/// Begin a transaction that holds the write lock from the start, so a
/// slot check and the write after it see the same bookings.
fn begin_write(conn: &Connection) -> Result<Transaction<'_>, LifecycleError> {
    Ok(Transaction::new_unchecked(conn, TransactionBehavior::Immediate).map_err(DatabaseError::from)?)
}

const SLOT_BOOKED: &str = "This time slot is already booked for the selected dentist";

fn ensure_slot_free(
    conn: &Connection,
    dentist: Option<i64>,
    date: NaiveDate,
    time: NaiveTime,
    exclude: Option<i64>,
    message: &str,
) -> Result<(), LifecycleError> {
    if db::slot_taken(conn, dentist, date, time, exclude)? {
        return Err(LifecycleError::Conflict(message.into()));
    }
    Ok(())
}

/// Map a unique active-slot violation to `Conflict`.
fn slot_write<T>(result: Result<T, DatabaseError>, message: &str) -> Result<T, LifecycleError> {
    result.map_err(|e| {
        if e.is_unique_violation() {
            LifecycleError::Conflict(message.into())
        } else {
            e.into()
        }
    })
}

// ─── Queries ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppointmentView {
    All,
    Today,
    /// Pending or confirmed from today on.
    Upcoming,
}

/// Appointments visible to the actor. Patients only see their own.
pub fn list_for(
    conn: &Connection,
    actor: &Actor,
    view: AppointmentView,
    today: NaiveDate,
) -> Result<Vec<Appointment>, LifecycleError> {
    let patient = (!actor.is_clinic()).then_some(actor.user_id);
    let filter = match view {
        AppointmentView::All => AppointmentFilter::for_patient(patient),
        AppointmentView::Today => AppointmentFilter {
            patient,
            date: Some(today),
            ..Default::default()
        },
        AppointmentView::Upcoming => AppointmentFilter {
            patient,
            from_date: Some(today),
            statuses: vec![Pending, Confirmed],
            ..Default::default()
        },
    };
    Ok(db::list_appointments(conn, &filter)?)
}

// ─── Booking ──────────────────────────────────────────────────────────────────

/// Book an appointment. Patients always book for themselves and start
/// `pending`; staff and owners book for a named patient and start
/// `confirmed`.
pub fn create_appointment(
    conn: &Connection,
    actor: &Actor,
    request: &NewAppointment,
) -> Result<Appointment, LifecycleError> {
    let date = request
        .date
        .ok_or_else(|| LifecycleError::Validation("Date is required".into()))?;
    let time = request
        .time
        .ok_or_else(|| LifecycleError::Validation("Time is required".into()))?;

    let (patient, status) = if actor.is_clinic() {
        let patient = request
            .patient
            .ok_or_else(|| LifecycleError::Validation("Patient is required".into()))?;
        (patient, Confirmed)
    } else {
        (actor.user_id, Pending)
    };

    validate_patient(conn, patient)?;
    if let Some(dentist) = request.dentist {
        validate_dentist(conn, dentist)?;
    }
    if let Some(service) = request.service {
        validate_service(conn, service)?;
    }

    let tx = begin_write(conn)?;
    ensure_slot_free(&tx, request.dentist, date, time, None, SLOT_BOOKED)?;
    let id = slot_write(
        db::insert_appointment(
            &tx,
            &AppointmentInsert {
                patient,
                dentist: request.dentist,
                service: request.service,
                date,
                time,
                status,
                notes: request.notes.trim().to_string(),
            },
        ),
        SLOT_BOOKED,
    )?;
    let appt = db::get_appointment(&tx, id)?;
    if status == Pending {
        let message = notification::new_appointment_message(&appt);
        notification::notify_clinic(&tx, id, NotificationType::NewAppointment, &message)?;
    }
    notification::notify_dentist(&tx, appt.dentist, Some(id), &notification::dentist_booking_message(&appt))?;
    tx.commit().map_err(DatabaseError::from)?;

    tracing::info!(appointment = id, patient, status = %status, "Appointment created");
    Ok(appt)
}

fn validate_patient(conn: &Connection, id: i64) -> Result<(), LifecycleError> {
    match db::get_user(conn, id) {
        Ok(user) if user.user_type == crate::models::enums::UserType::Patient => Ok(()),
        Ok(_) => Err(LifecycleError::Validation(format!("User {id} is not a patient"))),
        Err(DatabaseError::NotFound { .. }) => {
            Err(LifecycleError::Validation(format!("Unknown patient {id}")))
        }
        Err(e) => Err(e.into()),
    }
}

fn validate_dentist(conn: &Connection, id: i64) -> Result<(), LifecycleError> {
    match db::get_user(conn, id) {
        Ok(user) if user.user_type.is_clinic() => Ok(()),
        Ok(_) => Err(LifecycleError::Validation(format!("User {id} is not a dentist"))),
        Err(DatabaseError::NotFound { .. }) => {
            Err(LifecycleError::Validation(format!("Unknown dentist {id}")))
        }
        Err(e) => Err(e.into()),
    }
}

fn validate_service(conn: &Connection, id: i64) -> Result<(), LifecycleError> {
    match db::get_service(conn, id) {
        Ok(_) => Ok(()),
        Err(DatabaseError::NotFound { .. }) => {
            Err(LifecycleError::Validation(format!("Unknown service {id}")))
        }
        Err(e) => Err(e.into()),
    }
}

// ─── Patient requests ─────────────────────────────────────────────────────────

/// Store a proposed new slot. The primary date/time/service/dentist stay
/// untouched until staff approve.
pub fn request_reschedule(
    conn: &Connection,
    actor: &Actor,
    id: i64,
    proposal: &RescheduleProposal,
) -> Result<Appointment, LifecycleError> {
    let transition = Transition::RequestReschedule;
    let appt = authorize(conn, actor, id, transition)?;
    transition.check(appt.status)?;
    if proposal.date.is_none() || proposal.time.is_none() {
        return Err(LifecycleError::Validation(
            "New date and time are required".into(),
        ));
    }
    if let Some(dentist) = proposal.dentist {
        validate_dentist(conn, dentist)?;
    }
    if let Some(service) = proposal.service {
        validate_service(conn, service)?;
    }

    let tx = conn.unchecked_transaction().map_err(DatabaseError::from)?;
    if db::write_reschedule_request(&tx, id, proposal, transition.allowed_from())? == 0 {
        return Err(lost_race(&tx, id, transition));
    }
    let message = notification::reschedule_request_message(&appt, proposal);
    notification::notify_clinic(&tx, id, NotificationType::RescheduleRequest, &message)?;
    let updated = db::get_appointment(&tx, id)?;
    tx.commit().map_err(DatabaseError::from)?;

    tracing::info!(appointment = id, "Reschedule requested");
    Ok(updated)
}

pub fn request_cancel(
    conn: &Connection,
    actor: &Actor,
    id: i64,
    reason: &str,
) -> Result<Appointment, LifecycleError> {
    let transition = Transition::RequestCancel;
    let appt = authorize(conn, actor, id, transition)?;
    transition.check(appt.status)?;
    let reason = reason.trim();

    let tx = conn.unchecked_transaction().map_err(DatabaseError::from)?;
    if db::write_cancel_request(&tx, id, reason, transition.allowed_from())? == 0 {
        return Err(lost_race(&tx, id, transition));
    }
    let message = notification::cancel_request_message(&appt, reason);
    notification::notify_clinic(&tx, id, NotificationType::CancelRequest, &message)?;
    let updated = db::get_appointment(&tx, id)?;
    tx.commit().map_err(DatabaseError::from)?;

    tracing::info!(appointment = id, "Cancellation requested");
    Ok(updated)
}

// ─── Staff decisions ──────────────────────────────────────────────────────────

/// Move the appointment to the proposed slot and confirm it.
pub fn approve_reschedule(conn: &Connection, actor: &Actor, id: i64) -> Result<Appointment, LifecycleError> {
    let transition = Transition::ApproveReschedule;
    let appt = authorize(conn, actor, id, transition)?;
    transition.check(appt.status)?;

    const SLOT_GONE: &str = "The requested time slot is no longer available";
    let dentist = appt.reschedule_dentist.or(appt.dentist);
    let date = appt.reschedule_date.unwrap_or(appt.date);
    let time = appt.reschedule_time.unwrap_or(appt.time);

    let tx = begin_write(conn)?;
    ensure_slot_free(&tx, dentist, date, time, Some(id), SLOT_GONE)?;
    if slot_write(db::write_reschedule_approval(&tx, id), SLOT_GONE)? == 0 {
        return Err(lost_race(&tx, id, transition));
    }
    notification::resolve_for_appointment(&tx, id)?;
    let updated = db::get_appointment(&tx, id)?;
    notification::notify_dentist(&tx, updated.dentist, Some(id), &notification::dentist_moved_message(&updated))?;
    tx.commit().map_err(DatabaseError::from)?;

    tracing::info!(appointment = id, by = actor.user_id, "Reschedule approved");
    Ok(updated)
}

pub fn reject_reschedule(conn: &Connection, actor: &Actor, id: i64) -> Result<Appointment, LifecycleError> {
    revert_request(conn, actor, id, Transition::RejectReschedule, RescheduleRequested)
}

pub fn reject_cancel(conn: &Connection, actor: &Actor, id: i64) -> Result<Appointment, LifecycleError> {
    revert_request(conn, actor, id, Transition::RejectCancel, CancelRequested)
}

fn revert_request(
    conn: &Connection,
    actor: &Actor,
    id: i64,
    transition: Transition,
    from: AppointmentStatus,
) -> Result<Appointment, LifecycleError> {
    let appt = authorize(conn, actor, id, transition)?;
    transition.check(appt.status)?;

    let tx = conn.unchecked_transaction().map_err(DatabaseError::from)?;
    if db::write_request_reverted(&tx, id, from)? == 0 {
        return Err(lost_race(&tx, id, transition));
    }
    notification::resolve_for_appointment(&tx, id)?;
    let updated = db::get_appointment(&tx, id)?;
    tx.commit().map_err(DatabaseError::from)?;

    tracing::info!(appointment = id, by = actor.user_id, status = %updated.status, "Request rejected");
    Ok(updated)
}

/// Grant a cancellation request by deleting the appointment.
pub fn approve_cancel(conn: &Connection, actor: &Actor, id: i64) -> Result<(), LifecycleError> {
    let transition = Transition::ApproveCancel;
    let appt = authorize(conn, actor, id, transition)?;
    transition.check(appt.status)?;

    let tx = conn.unchecked_transaction().map_err(DatabaseError::from)?;
    notification::resolve_for_appointment(&tx, id)?;
    if db::delete_appointment_in_status(&tx, id, CancelRequested)? == 0 {
        return Err(lost_race(&tx, id, transition));
    }
    notification::notify_dentist(&tx, appt.dentist, None, &notification::dentist_cancelled_message(&appt))?;
    tx.commit().map_err(DatabaseError::from)?;

    tracing::info!(appointment = id, by = actor.user_id, "Cancellation approved");
    Ok(())
}

/// Close a visit. A non-empty completion note is filed as a clinical
/// note linked to the appointment.
pub fn mark_completed(
    conn: &Connection,
    actor: &Actor,
    id: i64,
    note: &CompletionNote,
) -> Result<Appointment, LifecycleError> {
    let transition = Transition::MarkCompleted;
    let appt = authorize(conn, actor, id, transition)?;
    transition.check(appt.status)?;

    let tx = conn.unchecked_transaction().map_err(DatabaseError::from)?;
    if db::write_status(&tx, id, Completed, transition.allowed_from())? == 0 {
        return Err(lost_race(&tx, id, transition));
    }
    if !note.is_empty() {
        let treatment = note
            .treatment
            .clone()
            .filter(|t| !t.trim().is_empty())
            .or_else(|| appt.service_name.clone())
            .unwrap_or_else(|| "Visit".to_string());
        db::insert_clinical_note(
            &tx,
            &NewClinicalNote {
                patient: appt.patient,
                appointment: Some(id),
                treatment,
                diagnosis: note.diagnosis.clone().unwrap_or_default(),
                notes: note.notes.clone().unwrap_or_default(),
            },
            Some(actor.user_id),
        )?;
    }
    let updated = db::get_appointment(&tx, id)?;
    tx.commit().map_err(DatabaseError::from)?;

    tracing::info!(appointment = id, by = actor.user_id, "Appointment completed");
    Ok(updated)
}

/// Direct staff edit of status, date, time and notes.
///
/// Request statuses can only be entered through the patient actions.
/// Moving an appointment out of a request status drops the pending
/// proposal and settles its notifications.
pub fn apply_staff_edit(
    conn: &Connection,
    actor: &Actor,
    id: i64,
    update: &AppointmentUpdate,
) -> Result<Appointment, LifecycleError> {
    require_clinic(actor, "edit appointments")?;
    let tx = begin_write(conn)?;
    let appt = db::get_appointment(&tx, id)?;
    if update.is_empty() {
        return Ok(appt);
    }
    if let Some(status) = update.status {
        if status.is_request() && status != appt.status {
            return Err(LifecycleError::Validation(format!(
                "Status {status} can only be set by a patient request"
            )));
        }
    }

    let new_status = update.status.unwrap_or(appt.status);
    let new_date = update.date.unwrap_or(appt.date);
    let new_time = update.time.unwrap_or(appt.time);
    let moved = new_date != appt.date || new_time != appt.time;
    // A cancelled or completed visit released its slot; reviving it
    // claims the slot again even when the date and time stay put.
    if new_status.holds_slot() && (moved || !appt.status.holds_slot()) {
        ensure_slot_free(&tx, appt.dentist, new_date, new_time, Some(id), SLOT_BOOKED)?;
    }

    let clear_request = appt.status.is_request() && new_status != appt.status;
    slot_write(db::write_staff_edit(&tx, id, update, clear_request), SLOT_BOOKED)?;
    if clear_request {
        notification::resolve_for_appointment(&tx, id)?;
    }
    let updated = db::get_appointment(&tx, id)?;
    tx.commit().map_err(DatabaseError::from)?;

    tracing::info!(appointment = id, by = actor.user_id, status = %updated.status, "Appointment edited");
    Ok(updated)
}

pub fn delete_appointment(conn: &Connection, actor: &Actor, id: i64) -> Result<(), LifecycleError> {
    require_clinic(actor, "delete appointments")?;
    let tx = conn.unchecked_transaction().map_err(DatabaseError::from)?;
    notification::resolve_for_appointment(&tx, id)?;
    db::delete_appointment(&tx, id)?;
    tx.commit().map_err(DatabaseError::from)?;
    tracing::info!(appointment = id, by = actor.user_id, "Appointment deleted");
    Ok(())
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::fixtures::{self, at, day};
    use crate::db::sqlite::open_memory_database;
    use crate::models::enums::UserType;

    struct Clinic {
        conn: Connection,
        patient: Actor,
        other_patient: Actor,
        staff: Actor,
        owner: Actor,
        dentist: i64,
    }

    fn actor(id: i64, user_type: UserType) -> Actor {
        Actor {
            user_id: id,
            user_type,
            name: format!("user{id}"),
        }
    }

    fn clinic() -> Clinic {
        let conn = open_memory_database().unwrap();
        let patient = fixtures::user(&conn, "pat", UserType::Patient);
        let other = fixtures::user(&conn, "other", UserType::Patient);
        let staff = fixtures::user(&conn, "staff", UserType::Staff);
        let owner = fixtures::user(&conn, "owner", UserType::Owner);
        let dentist = fixtures::user(&conn, "doc", UserType::Staff);
        Clinic {
            conn,
            patient: actor(patient, UserType::Patient),
            other_patient: actor(other, UserType::Patient),
            staff: actor(staff, UserType::Staff),
            owner: actor(owner, UserType::Owner),
            dentist,
        }
    }

    fn booking(date: NaiveDate, hour: u32) -> NewAppointment {
        NewAppointment {
            date: Some(date),
            time: Some(at(hour, 0)),
            ..Default::default()
        }
    }

    fn confirmed(c: &Clinic) -> Appointment {
        let mut req = booking(day(2025, 1, 20), 10);
        req.patient = Some(c.patient.user_id);
        req.dentist = Some(c.dentist);
        create_appointment(&c.conn, &c.staff, &req).unwrap()
    }

    #[test]
    fn transition_table() {
        assert!(Transition::RequestReschedule.check(Pending).is_ok());
        assert!(Transition::RequestReschedule.check(Confirmed).is_ok());
        assert!(Transition::RequestReschedule.check(CancelRequested).is_err());
        assert!(Transition::ApproveCancel.check(CancelRequested).is_ok());
        assert!(Transition::ApproveCancel.check(RescheduleRequested).is_err());
        assert!(Transition::MarkCompleted.check(Completed).is_err());
        assert!(Transition::RequestCancel.is_patient_action());
        assert!(!Transition::RejectCancel.is_patient_action());
    }

    #[test]
    fn patient_booking_is_pending_and_notifies_staff() {
        let c = clinic();
        let mut req = booking(day(2025, 1, 20), 9);
        req.patient = Some(c.other_patient.user_id);
        req.status = Some(Confirmed);
        let appt = create_appointment(&c.conn, &c.patient, &req).unwrap();

        assert_eq!(appt.status, Pending);
        assert_eq!(appt.patient, c.patient.user_id);
        assert_eq!(db::count_unread(&c.conn, c.staff.user_id).unwrap(), 1);
        assert_eq!(db::count_unread(&c.conn, c.owner.user_id).unwrap(), 1);
    }

    #[test]
    fn staff_booking_is_confirmed_without_notification() {
        let c = clinic();
        let appt = confirmed(&c);
        assert_eq!(appt.status, Confirmed);
        assert_eq!(db::count_unread(&c.conn, c.owner.user_id).unwrap(), 0);
    }

    #[test]
    fn booking_validates_input() {
        let c = clinic();
        let missing = NewAppointment::default();
        assert!(matches!(
            create_appointment(&c.conn, &c.patient, &missing),
            Err(LifecycleError::Validation(_))
        ));
        let no_patient = booking(day(2025, 1, 20), 9);
        assert!(matches!(
            create_appointment(&c.conn, &c.staff, &no_patient),
            Err(LifecycleError::Validation(_))
        ));
        let mut staff_as_patient = booking(day(2025, 1, 20), 9);
        staff_as_patient.patient = Some(c.owner.user_id);
        assert!(matches!(
            create_appointment(&c.conn, &c.staff, &staff_as_patient),
            Err(LifecycleError::Validation(_))
        ));
        let mut bad_service = booking(day(2025, 1, 20), 9);
        bad_service.service = Some(404);
        assert!(matches!(
            create_appointment(&c.conn, &c.patient, &bad_service),
            Err(LifecycleError::Validation(_))
        ));
    }

    #[test]
    fn double_booking_same_dentist_conflicts() {
        let c = clinic();
        confirmed(&c);
        let mut req = booking(day(2025, 1, 20), 10);
        req.dentist = Some(c.dentist);
        assert!(matches!(
            create_appointment(&c.conn, &c.patient, &req),
            Err(LifecycleError::Conflict(_))
        ));
        req.dentist = None;
        assert!(create_appointment(&c.conn, &c.patient, &req).is_ok());
    }

    #[test]
    fn reschedule_scenario_end_to_end() {
        let c = clinic();
        let appt = confirmed(&c);
        let proposal = RescheduleProposal {
            date: Some(day(2025, 1, 25)),
            time: Some(at(14, 0)),
            ..RescheduleProposal::from_appointment(&appt)
        };

        let requested = request_reschedule(&c.conn, &c.patient, appt.id, &proposal).unwrap();
        assert_eq!(requested.status, RescheduleRequested);
        assert_eq!(requested.date, day(2025, 1, 20));
        assert_eq!(requested.time, at(10, 0));
        assert_eq!(requested.dentist, Some(c.dentist));
        assert_eq!(requested.reschedule_date, Some(day(2025, 1, 25)));
        assert_eq!(requested.reschedule_time, Some(at(14, 0)));
        assert_eq!(db::count_unread(&c.conn, c.staff.user_id).unwrap(), 1);

        let approved = approve_reschedule(&c.conn, &c.staff, appt.id).unwrap();
        assert_eq!(approved.status, Confirmed);
        assert_eq!(approved.date, day(2025, 1, 25));
        assert_eq!(approved.time, at(14, 0));
        assert!(!approved.has_reschedule_proposal());
        assert_eq!(db::count_unread(&c.conn, c.staff.user_id).unwrap(), 0);
        assert_eq!(db::count_unread(&c.conn, c.owner.user_id).unwrap(), 0);
    }

    #[test]
    fn reschedule_requires_new_slot() {
        let c = clinic();
        let appt = confirmed(&c);
        let err = request_reschedule(&c.conn, &c.patient, appt.id, &RescheduleProposal::default()).unwrap_err();
        assert!(matches!(err, LifecycleError::Validation(_)));
    }

    #[test]
    fn reject_reschedule_reverts_and_clears_proposal() {
        let c = clinic();
        let appt = confirmed(&c);
        let proposal = RescheduleProposal {
            date: Some(day(2025, 2, 1)),
            time: Some(at(8, 0)),
            ..Default::default()
        };
        request_reschedule(&c.conn, &c.patient, appt.id, &proposal).unwrap();
        let rejected = reject_reschedule(&c.conn, &c.owner, appt.id).unwrap();
        assert_eq!(rejected.status, Confirmed);
        assert_eq!(rejected.date, day(2025, 1, 20));
        assert!(rejected.reschedule_date.is_none());
        assert!(rejected.prior_status.is_none());
    }

    #[test]
    fn reject_cancel_restores_pending() {
        let c = clinic();
        let appt = create_appointment(&c.conn, &c.patient, &booking(day(2025, 3, 3), 11)).unwrap();
        let requested = request_cancel(&c.conn, &c.patient, appt.id, "travel").unwrap();
        assert_eq!(requested.status, CancelRequested);
        assert_eq!(requested.cancel_reason.as_deref(), Some("travel"));

        let rejected = reject_cancel(&c.conn, &c.staff, appt.id).unwrap();
        assert_eq!(rejected.status, Pending);
        assert!(rejected.cancel_reason.is_none());
    }

    #[test]
    fn approve_cancel_deletes_and_second_approval_fails() {
        let c = clinic();
        let appt = confirmed(&c);
        request_cancel(&c.conn, &c.patient, appt.id, "").unwrap();
        approve_cancel(&c.conn, &c.staff, appt.id).unwrap();

        let staff_list = list_for(&c.conn, &c.staff, AppointmentView::All, day(2025, 1, 1)).unwrap();
        assert!(staff_list.iter().all(|a| a.id != appt.id));
        assert_eq!(db::count_unread(&c.conn, c.staff.user_id).unwrap(), 0);

        let err = approve_cancel(&c.conn, &c.owner, appt.id).unwrap_err();
        assert!(matches!(err, LifecycleError::Database(DatabaseError::NotFound { .. })));
    }

    #[test]
    fn stale_decision_is_invalid_transition() {
        let c = clinic();
        let appt = confirmed(&c);
        request_cancel(&c.conn, &c.patient, appt.id, "").unwrap();
        reject_cancel(&c.conn, &c.staff, appt.id).unwrap();
        let err = reject_cancel(&c.conn, &c.owner, appt.id).unwrap_err();
        assert!(matches!(
            err,
            LifecycleError::InvalidTransition { status: Confirmed, .. }
        ));
    }

    #[test]
    fn patients_cannot_decide_or_touch_others() {
        let c = clinic();
        let appt = confirmed(&c);
        request_cancel(&c.conn, &c.patient, appt.id, "").unwrap();
        assert!(matches!(
            approve_cancel(&c.conn, &c.patient, appt.id),
            Err(LifecycleError::Forbidden(_))
        ));
        assert!(matches!(
            request_cancel(&c.conn, &c.other_patient, appt.id, ""),
            Err(LifecycleError::Database(DatabaseError::NotFound { .. }))
        ));
        assert!(matches!(
            request_cancel(&c.conn, &c.staff, appt.id, ""),
            Err(LifecycleError::Forbidden(_))
        ));
    }

    #[test]
    fn approve_reschedule_into_taken_slot_conflicts() {
        let c = clinic();
        let appt = confirmed(&c);
        let mut other = booking(day(2025, 1, 25), 14);
        other.patient = Some(c.other_patient.user_id);
        other.dentist = Some(c.dentist);
        create_appointment(&c.conn, &c.staff, &other).unwrap();

        let proposal = RescheduleProposal {
            date: Some(day(2025, 1, 25)),
            time: Some(at(14, 0)),
            ..Default::default()
        };
        request_reschedule(&c.conn, &c.patient, appt.id, &proposal).unwrap();
        assert!(matches!(
            approve_reschedule(&c.conn, &c.staff, appt.id),
            Err(LifecycleError::Conflict(_))
        ));
        assert_eq!(db::get_appointment(&c.conn, appt.id).unwrap().status, RescheduleRequested);
    }

    #[test]
    fn concurrent_bookings_claim_a_slot_once() {
        use std::sync::{Arc, Barrier};

        use crate::test_support::{seed_user, test_core};

        let (core, _tmp) = test_core();
        let (dentist, _) = seed_user(&core, "doc", UserType::Staff);
        let (desk, _) = seed_user(&core, "desk", UserType::Staff);
        let (patient, _) = seed_user(&core, "pat", UserType::Patient);
        let desk = actor(desk.id, UserType::Staff);

        for round in 0..10u32 {
            let barrier = Arc::new(Barrier::new(4));
            let handles: Vec<_> = (0..4)
                .map(|_| {
                    let core = core.clone();
                    let barrier = barrier.clone();
                    let desk = desk.clone();
                    let request = NewAppointment {
                        patient: Some(patient.id),
                        dentist: Some(dentist.id),
                        ..booking(day(2025, 2, 3), 8 + round)
                    };
                    std::thread::spawn(move || {
                        let conn = core.open_db().unwrap();
                        barrier.wait();
                        create_appointment(&conn, &desk, &request)
                            .map(|a| a.id)
                            .map_err(|e| matches!(e, LifecycleError::Conflict(_)))
                    })
                })
                .collect();
            let results: Vec<Result<i64, bool>> = handles.into_iter().map(|h| h.join().unwrap()).collect();

            assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1, "round {round}");
            assert!(results.iter().all(|r| *r != Err(false)), "round {round}: {results:?}");
        }
    }

    #[test]
    fn assigned_dentist_follows_booking_move_and_cancel() {
        let c = clinic();
        let appt = confirmed(&c);
        let feed = db::list_dentist_notifications(&c.conn, c.dentist).unwrap();
        assert_eq!(feed.len(), 1);
        assert_eq!(feed[0].message, "New appointment with PAT Test on 2025-01-20 at 10:00");
        assert_eq!(feed[0].appointment, Some(appt.id));

        let proposal = RescheduleProposal {
            date: Some(day(2025, 1, 25)),
            time: Some(at(14, 0)),
            ..Default::default()
        };
        request_reschedule(&c.conn, &c.patient, appt.id, &proposal).unwrap();
        approve_reschedule(&c.conn, &c.staff, appt.id).unwrap();
        request_cancel(&c.conn, &c.patient, appt.id, "").unwrap();
        approve_cancel(&c.conn, &c.staff, appt.id).unwrap();

        let messages: Vec<String> = db::list_dentist_notifications(&c.conn, c.dentist)
            .unwrap()
            .into_iter()
            .map(|n| n.message)
            .collect();
        assert_eq!(messages.len(), 3);
        assert!(messages.contains(&"Appointment with PAT Test moved to 2025-01-25 at 14:00".to_string()));
        assert!(messages.contains(&"Appointment with PAT Test on 2025-01-25 at 14:00 was cancelled".to_string()));
        assert_eq!(db::count_unread_dentist_notifications(&c.conn, c.staff.user_id).unwrap(), 0);
    }

    #[test]
    fn reviving_cancelled_visit_rechecks_its_slot() {
        let c = clinic();
        let first = confirmed(&c);
        let cancel = AppointmentUpdate {
            status: Some(Cancelled),
            ..Default::default()
        };
        apply_staff_edit(&c.conn, &c.staff, first.id, &cancel).unwrap();

        let mut other = booking(day(2025, 1, 20), 10);
        other.patient = Some(c.other_patient.user_id);
        other.dentist = Some(c.dentist);
        let second = create_appointment(&c.conn, &c.staff, &other).unwrap();

        let revive = AppointmentUpdate {
            status: Some(Confirmed),
            ..Default::default()
        };
        assert!(matches!(
            apply_staff_edit(&c.conn, &c.staff, first.id, &revive),
            Err(LifecycleError::Conflict(_))
        ));
        assert_eq!(db::get_appointment(&c.conn, first.id).unwrap().status, Cancelled);

        delete_appointment(&c.conn, &c.staff, second.id).unwrap();
        let revived = apply_staff_edit(&c.conn, &c.staff, first.id, &revive).unwrap();
        assert_eq!(revived.status, Confirmed);
    }

    #[test]
    fn mark_completed_files_clinical_note() {
        let c = clinic();
        let appt = confirmed(&c);
        let note = CompletionNote {
            treatment: Some("Scaling".into()),
            diagnosis: Some("Gingivitis".into()),
            notes: None,
        };
        let done = mark_completed(&c.conn, &c.staff, appt.id, &note).unwrap();
        assert_eq!(done.status, Completed);
        let notes = db::list_clinical_notes(&c.conn, Some(c.patient.user_id)).unwrap();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].treatment, "Scaling");
        assert_eq!(notes[0].appointment, Some(appt.id));

        assert!(mark_completed(&c.conn, &c.staff, appt.id, &CompletionNote::default()).is_err());
    }

    #[test]
    fn staff_edit_limits() {
        let c = clinic();
        let appt = confirmed(&c);
        let to_request = AppointmentUpdate {
            status: Some(CancelRequested),
            ..Default::default()
        };
        assert!(matches!(
            apply_staff_edit(&c.conn, &c.staff, appt.id, &to_request),
            Err(LifecycleError::Validation(_))
        ));
        assert!(matches!(
            apply_staff_edit(&c.conn, &c.patient, appt.id, &AppointmentUpdate::default()),
            Err(LifecycleError::Forbidden(_))
        ));

        let edit = AppointmentUpdate::staff_edit(Confirmed, day(2025, 1, 21), at(15, 0), "moved");
        let edited = apply_staff_edit(&c.conn, &c.staff, appt.id, &edit).unwrap();
        assert_eq!(edited.date, day(2025, 1, 21));
        assert_eq!(edited.dentist, Some(c.dentist));
        assert_eq!(edited.patient, c.patient.user_id);
    }

    #[test]
    fn staff_edit_out_of_request_settles_it() {
        let c = clinic();
        let appt = confirmed(&c);
        request_cancel(&c.conn, &c.patient, appt.id, "maybe").unwrap();
        let edit = AppointmentUpdate {
            status: Some(Cancelled),
            ..Default::default()
        };
        let edited = apply_staff_edit(&c.conn, &c.staff, appt.id, &edit).unwrap();
        assert_eq!(edited.status, Cancelled);
        assert!(edited.cancel_reason.is_none());
        assert_eq!(db::count_unread(&c.conn, c.staff.user_id).unwrap(), 0);
    }

    #[test]
    fn list_views_scope_by_role() {
        let c = clinic();
        confirmed(&c);
        create_appointment(&c.conn, &c.other_patient, &booking(day(2025, 1, 20), 8)).unwrap();
        create_appointment(&c.conn, &c.other_patient, &booking(day(2024, 12, 1), 8)).unwrap();

        let today = day(2025, 1, 20);
        assert_eq!(list_for(&c.conn, &c.staff, AppointmentView::All, today).unwrap().len(), 3);
        assert_eq!(list_for(&c.conn, &c.patient, AppointmentView::All, today).unwrap().len(), 1);
        assert_eq!(list_for(&c.conn, &c.staff, AppointmentView::Today, today).unwrap().len(), 2);
        assert_eq!(list_for(&c.conn, &c.other_patient, AppointmentView::Upcoming, today).unwrap().len(), 1);
    }

    #[test]
    fn delete_is_staff_only() {
        let c = clinic();
        let appt = confirmed(&c);
        assert!(delete_appointment(&c.conn, &c.patient, appt.id).is_err());
        delete_appointment(&c.conn, &c.owner, appt.id).unwrap();
        assert!(db::get_appointment(&c.conn, appt.id).is_err());
    }
}
