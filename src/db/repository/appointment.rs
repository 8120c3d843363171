use chrono::{NaiveDate, NaiveTime};
use rusqlite::{params, Connection, Row};

use super::{enum_col, expect_changed, opt_enum_col, or_not_found, timestamp_now};
use crate::db::DatabaseError;
use crate::models::enums::AppointmentStatus;
use crate::models::time_format::format_time;
use crate::models::*;

const APPOINTMENT_SELECT: &str = "SELECT a.id, a.patient_id, p.first_name, p.last_name, p.username, p.email,
        a.dentist_id, d.first_name, d.last_name, d.username,
        a.service_id, s.name, a.date, a.time, a.status, a.notes,
        a.reschedule_date, a.reschedule_time, a.reschedule_service_id,
        a.reschedule_dentist_id, a.reschedule_notes,
        a.cancel_reason, a.prior_status, a.created_at, a.updated_at
     FROM appointments a
     JOIN users p ON p.id = a.patient_id
     LEFT JOIN users d ON d.id = a.dentist_id
     LEFT JOIN services s ON s.id = a.service_id";

/// Statuses that occupy a dentist's slot.
const SLOT_HOLDING: &str = "a.status NOT IN ('cancelled', 'completed')";

fn appointment_from_row(row: &Row<'_>) -> rusqlite::Result<Appointment> {
    let patient_first: String = row.get(2)?;
    let patient_last: String = row.get(3)?;
    let patient_username: String = row.get(4)?;
    let dentist: Option<i64> = row.get(6)?;
    let dentist_name = match dentist {
        Some(_) => Some(display_name(
            &row.get::<_, Option<String>>(7)?.unwrap_or_default(),
            &row.get::<_, Option<String>>(8)?.unwrap_or_default(),
            &row.get::<_, Option<String>>(9)?.unwrap_or_default(),
        )),
        None => None,
    };
    Ok(Appointment {
        id: row.get(0)?,
        patient: row.get(1)?,
        patient_name: display_name(&patient_first, &patient_last, &patient_username),
        patient_email: row.get(5)?,
        dentist,
        dentist_name,
        service: row.get(10)?,
        service_name: row.get(11)?,
        date: row.get(12)?,
        time: row.get(13)?,
        status: enum_col(row, 14)?,
        notes: row.get(15)?,
        reschedule_date: row.get(16)?,
        reschedule_time: row.get(17)?,
        reschedule_service: row.get(18)?,
        reschedule_dentist: row.get(19)?,
        reschedule_notes: row.get(20)?,
        cancel_reason: row.get(21)?,
        prior_status: opt_enum_col(row, 22)?,
        created_at: row.get(23)?,
        updated_at: row.get(24)?,
    })
}

/// SQL `IN (...)` body for a fixed set of statuses. Values come from
/// `as_str`, never from user input.
fn status_list(statuses: &[AppointmentStatus]) -> String {
    statuses
        .iter()
        .map(|s| format!("'{}'", s.as_str()))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Row-level insert payload. The caller has already resolved the status.
#[derive(Debug, Clone)]
pub struct AppointmentInsert {
    pub patient: i64,
    pub dentist: Option<i64>,
    pub service: Option<i64>,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub status: AppointmentStatus,
    pub notes: String,
}

pub fn insert_appointment(conn: &Connection, appt: &AppointmentInsert) -> Result<i64, DatabaseError> {
    let now = timestamp_now();
    conn.execute(
        "INSERT INTO appointments (patient_id, dentist_id, service_id, date, time, status, notes,
                                   created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)",
        params![
            appt.patient,
            appt.dentist,
            appt.service,
            appt.date,
            format_time(&appt.time),
            appt.status.as_str(),
            appt.notes,
            now,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get_appointment(conn: &Connection, id: i64) -> Result<Appointment, DatabaseError> {
    let sql = format!("{APPOINTMENT_SELECT} WHERE a.id = ?1");
    or_not_found(
        conn.query_row(&sql, params![id], appointment_from_row),
        "Appointment",
        id,
    )
}

/// Listing filter. Every `None` field is unconstrained.
#[derive(Debug, Clone, Default)]
pub struct AppointmentFilter {
    pub patient: Option<i64>,
    pub date: Option<NaiveDate>,
    pub from_date: Option<NaiveDate>,
    pub statuses: Vec<AppointmentStatus>,
}

impl AppointmentFilter {
    pub fn for_patient(patient: Option<i64>) -> Self {
        Self {
            patient,
            ..Default::default()
        }
    }
}

/// Appointments newest first.
pub fn list_appointments(
    conn: &Connection,
    filter: &AppointmentFilter,
) -> Result<Vec<Appointment>, DatabaseError> {
    let mut sql = format!(
        "{APPOINTMENT_SELECT}
         WHERE (?1 IS NULL OR a.patient_id = ?1)
           AND (?2 IS NULL OR a.date = ?2)
           AND (?3 IS NULL OR a.date >= ?3)"
    );
    if !filter.statuses.is_empty() {
        sql.push_str(&format!(" AND a.status IN ({})", status_list(&filter.statuses)));
    }
    sql.push_str(" ORDER BY a.date DESC, a.time DESC, a.id DESC");

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(
        params![filter.patient, filter.date, filter.from_date],
        appointment_from_row,
    )?;
    rows.map(|r| r.map_err(DatabaseError::from)).collect()
}

/// True when `dentist` already holds an active booking at `date`/`time`.
/// Appointments without a dentist never collide.
pub fn slot_taken(
    conn: &Connection,
    dentist: Option<i64>,
    date: NaiveDate,
    time: NaiveTime,
    exclude_id: Option<i64>,
) -> Result<bool, DatabaseError> {
    let Some(dentist) = dentist else {
        return Ok(false);
    };
    let sql = format!(
        "SELECT COUNT(*) FROM appointments a
         WHERE a.dentist_id = ?1 AND a.date = ?2 AND a.time = ?3
           AND (?4 IS NULL OR a.id != ?4) AND {SLOT_HOLDING}"
    );
    let count: i64 = conn.query_row(
        &sql,
        params![dentist, date, format_time(&time), exclude_id],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// Occupied slots from `from_date` on, optionally for one dentist.
pub fn booked_slots(
    conn: &Connection,
    from_date: NaiveDate,
    dentist: Option<i64>,
) -> Result<Vec<BookedSlot>, DatabaseError> {
    let sql = format!(
        "SELECT a.date, a.time, a.dentist_id FROM appointments a
         WHERE a.date >= ?1 AND (?2 IS NULL OR a.dentist_id = ?2) AND {SLOT_HOLDING}
         ORDER BY a.date, a.time"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![from_date, dentist], |row| {
        Ok(BookedSlot {
            date: row.get(0)?,
            time: row.get(1)?,
            dentist: row.get(2)?,
        })
    })?;
    rows.map(|r| r.map_err(DatabaseError::from)).collect()
}

pub fn current_status(conn: &Connection, id: i64) -> Result<AppointmentStatus, DatabaseError> {
    or_not_found(
        conn.query_row(
            "SELECT status FROM appointments WHERE id = ?1",
            params![id],
            |row| enum_col(row, 0),
        ),
        "Appointment",
        id,
    )
}

// ── Guarded transitions ─────────────────────────────────────
//
// Each write is one UPDATE/DELETE conditioned on the current status and
// returns the number of rows changed. Zero means the appointment is gone
// or no longer in an allowed status.

pub fn write_reschedule_request(
    conn: &Connection,
    id: i64,
    proposal: &RescheduleProposal,
    allowed: &[AppointmentStatus],
) -> Result<usize, DatabaseError> {
    let sql = format!(
        "UPDATE appointments SET
            prior_status = status,
            status = 'reschedule_requested',
            reschedule_date = ?2,
            reschedule_time = ?3,
            reschedule_service_id = ?4,
            reschedule_dentist_id = ?5,
            reschedule_notes = ?6,
            cancel_reason = NULL,
            updated_at = ?7
         WHERE id = ?1 AND status IN ({})",
        status_list(allowed)
    );
    Ok(conn.execute(
        &sql,
        params![
            id,
            proposal.date,
            proposal.time.as_ref().map(format_time),
            proposal.service,
            proposal.dentist,
            proposal.notes,
            timestamp_now(),
        ],
    )?)
}

pub fn write_cancel_request(
    conn: &Connection,
    id: i64,
    reason: &str,
    allowed: &[AppointmentStatus],
) -> Result<usize, DatabaseError> {
    let sql = format!(
        "UPDATE appointments SET
            prior_status = status,
            status = 'cancel_requested',
            cancel_reason = ?2,
            updated_at = ?3
         WHERE id = ?1 AND status IN ({})",
        status_list(allowed)
    );
    Ok(conn.execute(&sql, params![id, reason, timestamp_now()])?)
}

/// Promote the stored proposal into the primary fields. Proposed fields
/// left NULL keep the current value.
pub fn write_reschedule_approval(conn: &Connection, id: i64) -> Result<usize, DatabaseError> {
    Ok(conn.execute(
        "UPDATE appointments SET
            date = COALESCE(reschedule_date, date),
            time = COALESCE(reschedule_time, time),
            service_id = COALESCE(reschedule_service_id, service_id),
            dentist_id = COALESCE(reschedule_dentist_id, dentist_id),
            notes = COALESCE(reschedule_notes, notes),
            status = 'confirmed',
            reschedule_date = NULL,
            reschedule_time = NULL,
            reschedule_service_id = NULL,
            reschedule_dentist_id = NULL,
            reschedule_notes = NULL,
            prior_status = NULL,
            updated_at = ?2
         WHERE id = ?1 AND status = 'reschedule_requested'",
        params![id, timestamp_now()],
    )?)
}

/// Drop a pending request and fall back to the status it was raised
/// from (`confirmed` if unknown).
pub fn write_request_reverted(
    conn: &Connection,
    id: i64,
    from: AppointmentStatus,
) -> Result<usize, DatabaseError> {
    Ok(conn.execute(
        "UPDATE appointments SET
            status = COALESCE(prior_status, 'confirmed'),
            reschedule_date = NULL,
            reschedule_time = NULL,
            reschedule_service_id = NULL,
            reschedule_dentist_id = NULL,
            reschedule_notes = NULL,
            cancel_reason = NULL,
            prior_status = NULL,
            updated_at = ?3
         WHERE id = ?1 AND status = ?2",
        params![id, from.as_str(), timestamp_now()],
    )?)
}

pub fn write_status(
    conn: &Connection,
    id: i64,
    status: AppointmentStatus,
    allowed: &[AppointmentStatus],
) -> Result<usize, DatabaseError> {
    let sql = format!(
        "UPDATE appointments SET status = ?2, updated_at = ?3
         WHERE id = ?1 AND status IN ({})",
        status_list(allowed)
    );
    Ok(conn.execute(&sql, params![id, status.as_str(), timestamp_now()])?)
}

pub fn delete_appointment_in_status(
    conn: &Connection,
    id: i64,
    status: AppointmentStatus,
) -> Result<usize, DatabaseError> {
    Ok(conn.execute(
        "DELETE FROM appointments WHERE id = ?1 AND status = ?2",
        params![id, status.as_str()],
    )?)
}

/// Staff edit of status/date/time/notes. With `clear_request` the
/// pending proposal and cancel reason are dropped as well.
pub fn write_staff_edit(
    conn: &Connection,
    id: i64,
    update: &AppointmentUpdate,
    clear_request: bool,
) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE appointments SET
            status = COALESCE(?2, status),
            date = COALESCE(?3, date),
            time = COALESCE(?4, time),
            notes = COALESCE(?5, notes),
            reschedule_date = CASE WHEN ?6 THEN NULL ELSE reschedule_date END,
            reschedule_time = CASE WHEN ?6 THEN NULL ELSE reschedule_time END,
            reschedule_service_id = CASE WHEN ?6 THEN NULL ELSE reschedule_service_id END,
            reschedule_dentist_id = CASE WHEN ?6 THEN NULL ELSE reschedule_dentist_id END,
            reschedule_notes = CASE WHEN ?6 THEN NULL ELSE reschedule_notes END,
            cancel_reason = CASE WHEN ?6 THEN NULL ELSE cancel_reason END,
            prior_status = CASE WHEN ?6 THEN NULL ELSE prior_status END,
            updated_at = ?7
         WHERE id = ?1",
        params![
            id,
            update.status.map(|s| s.as_str()),
            update.date,
            update.time.as_ref().map(format_time),
            update.notes,
            clear_request,
            timestamp_now(),
        ],
    )?;
    expect_changed(changed, "Appointment", id)
}

pub fn delete_appointment(conn: &Connection, id: i64) -> Result<(), DatabaseError> {
    let changed = conn.execute("DELETE FROM appointments WHERE id = ?1", params![id])?;
    expect_changed(changed, "Appointment", id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::fixtures::{self, at, day};
    use crate::db::sqlite::open_memory_database;
    use crate::models::enums::UserType;
    use AppointmentStatus::*;

    struct Setup {
        conn: Connection,
        patient: i64,
        dentist: i64,
    }

    fn setup() -> Setup {
        let conn = open_memory_database().unwrap();
        let patient = fixtures::user(&conn, "pat", UserType::Patient);
        let dentist = fixtures::user(&conn, "doc", UserType::Staff);
        Setup { conn, patient, dentist }
    }

    #[test]
    fn insert_and_read_joined_names() {
        let s = setup();
        let svc = fixtures::service(&s.conn, "Cleaning");
        let id = insert_appointment(
            &s.conn,
            &AppointmentInsert {
                patient: s.patient,
                dentist: Some(s.dentist),
                service: Some(svc),
                date: day(2025, 1, 20),
                time: at(10, 0),
                status: Confirmed,
                notes: "first visit".into(),
            },
        )
        .unwrap();
        let appt = get_appointment(&s.conn, id).unwrap();
        assert_eq!(appt.patient_name, "PAT Test");
        assert_eq!(appt.patient_email, "pat@clinic.test");
        assert_eq!(appt.dentist_name.as_deref(), Some("DOC Test"));
        assert_eq!(appt.service_name.as_deref(), Some("Cleaning"));
        assert_eq!(appt.time, at(10, 0));
        assert_eq!(appt.status, Confirmed);
        assert!(!appt.has_reschedule_proposal());
    }

    #[test]
    fn list_is_newest_first_and_scoped() {
        let s = setup();
        let other = fixtures::user(&s.conn, "other", UserType::Patient);
        fixtures::appointment(&s.conn, s.patient, None, day(2025, 1, 1), at(9, 0), Pending);
        fixtures::appointment(&s.conn, s.patient, None, day(2025, 3, 1), at(9, 0), Confirmed);
        fixtures::appointment(&s.conn, other, None, day(2025, 2, 1), at(9, 0), Pending);

        let all = list_appointments(&s.conn, &AppointmentFilter::default()).unwrap();
        let dates: Vec<_> = all.iter().map(|a| a.date).collect();
        assert_eq!(dates, vec![day(2025, 3, 1), day(2025, 2, 1), day(2025, 1, 1)]);

        let mine = list_appointments(&s.conn, &AppointmentFilter::for_patient(Some(s.patient))).unwrap();
        assert_eq!(mine.len(), 2);

        let upcoming = list_appointments(
            &s.conn,
            &AppointmentFilter {
                from_date: Some(day(2025, 2, 1)),
                statuses: vec![Pending, Confirmed],
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(upcoming.len(), 2);
    }

    #[test]
    fn slot_collision_ignores_inactive_and_self() {
        let s = setup();
        let id = fixtures::appointment(&s.conn, s.patient, Some(s.dentist), day(2025, 1, 20), at(10, 0), Confirmed);

        assert!(slot_taken(&s.conn, Some(s.dentist), day(2025, 1, 20), at(10, 0), None).unwrap());
        assert!(!slot_taken(&s.conn, Some(s.dentist), day(2025, 1, 20), at(10, 0), Some(id)).unwrap());
        assert!(!slot_taken(&s.conn, Some(s.dentist), day(2025, 1, 20), at(11, 0), None).unwrap());
        assert!(!slot_taken(&s.conn, None, day(2025, 1, 20), at(10, 0), None).unwrap());

        write_status(&s.conn, id, Cancelled, &[Confirmed]).unwrap();
        assert!(!slot_taken(&s.conn, Some(s.dentist), day(2025, 1, 20), at(10, 0), None).unwrap());
    }

    #[test]
    fn active_slot_index_rejects_second_booking() {
        let s = setup();
        let slot = |status| AppointmentInsert {
            patient: s.patient,
            dentist: Some(s.dentist),
            service: None,
            date: day(2025, 1, 20),
            time: at(10, 0),
            status,
            notes: String::new(),
        };
        let first = insert_appointment(&s.conn, &slot(Confirmed)).unwrap();
        let err = insert_appointment(&s.conn, &slot(Pending)).unwrap_err();
        assert!(err.is_unique_violation());

        insert_appointment(&s.conn, &slot(Cancelled)).unwrap();
        write_status(&s.conn, first, Completed, &[Confirmed]).unwrap();
        insert_appointment(&s.conn, &slot(Pending)).unwrap();
    }

    #[test]
    fn reschedule_request_then_approval() {
        let s = setup();
        let id = fixtures::appointment(&s.conn, s.patient, None, day(2025, 1, 20), at(10, 0), Confirmed);
        let proposal = RescheduleProposal {
            date: Some(day(2025, 1, 25)),
            time: Some(at(14, 0)),
            ..Default::default()
        };
        assert_eq!(write_reschedule_request(&s.conn, id, &proposal, &[Pending, Confirmed]).unwrap(), 1);

        let appt = get_appointment(&s.conn, id).unwrap();
        assert_eq!(appt.status, RescheduleRequested);
        assert_eq!(appt.date, day(2025, 1, 20));
        assert_eq!(appt.reschedule_date, Some(day(2025, 1, 25)));
        assert_eq!(appt.reschedule_time, Some(at(14, 0)));
        assert_eq!(appt.prior_status, Some(Confirmed));

        // A second request from reschedule_requested is refused.
        assert_eq!(write_reschedule_request(&s.conn, id, &proposal, &[Pending, Confirmed]).unwrap(), 0);

        assert_eq!(write_reschedule_approval(&s.conn, id).unwrap(), 1);
        let appt = get_appointment(&s.conn, id).unwrap();
        assert_eq!(appt.status, Confirmed);
        assert_eq!(appt.date, day(2025, 1, 25));
        assert_eq!(appt.time, at(14, 0));
        assert!(!appt.has_reschedule_proposal());
        assert!(appt.prior_status.is_none());

        assert_eq!(write_reschedule_approval(&s.conn, id).unwrap(), 0);
    }

    #[test]
    fn revert_restores_prior_status() {
        let s = setup();
        let id = fixtures::appointment(&s.conn, s.patient, None, day(2025, 1, 20), at(10, 0), Pending);
        write_cancel_request(&s.conn, id, "sick", &[Pending, Confirmed]).unwrap();
        assert_eq!(get_appointment(&s.conn, id).unwrap().cancel_reason.as_deref(), Some("sick"));

        assert_eq!(write_request_reverted(&s.conn, id, CancelRequested).unwrap(), 1);
        let appt = get_appointment(&s.conn, id).unwrap();
        assert_eq!(appt.status, Pending);
        assert!(appt.cancel_reason.is_none());
        assert_eq!(write_request_reverted(&s.conn, id, CancelRequested).unwrap(), 0);
    }

    #[test]
    fn guarded_delete_only_in_status() {
        let s = setup();
        let id = fixtures::appointment(&s.conn, s.patient, None, day(2025, 1, 20), at(10, 0), Confirmed);
        assert_eq!(delete_appointment_in_status(&s.conn, id, CancelRequested).unwrap(), 0);
        write_cancel_request(&s.conn, id, "", &[Confirmed]).unwrap();
        assert_eq!(delete_appointment_in_status(&s.conn, id, CancelRequested).unwrap(), 1);
        assert!(matches!(get_appointment(&s.conn, id), Err(DatabaseError::NotFound { .. })));
    }

    #[test]
    fn staff_edit_can_clear_request() {
        let s = setup();
        let id = fixtures::appointment(&s.conn, s.patient, None, day(2025, 1, 20), at(10, 0), Confirmed);
        write_reschedule_request(
            &s.conn,
            id,
            &RescheduleProposal {
                date: Some(day(2025, 2, 2)),
                ..Default::default()
            },
            &[Confirmed],
        )
        .unwrap();
        let edit = AppointmentUpdate {
            status: Some(Confirmed),
            notes: Some("handled by phone".into()),
            ..Default::default()
        };
        write_staff_edit(&s.conn, id, &edit, true).unwrap();
        let appt = get_appointment(&s.conn, id).unwrap();
        assert_eq!(appt.status, Confirmed);
        assert_eq!(appt.notes, "handled by phone");
        assert!(appt.reschedule_date.is_none());
        assert_eq!(appt.date, day(2025, 1, 20));
    }

    #[test]
    fn booked_slots_lists_active_future() {
        let s = setup();
        fixtures::appointment(&s.conn, s.patient, Some(s.dentist), day(2025, 1, 10), at(9, 0), Confirmed);
        fixtures::appointment(&s.conn, s.patient, Some(s.dentist), day(2025, 1, 20), at(10, 0), Pending);
        fixtures::appointment(&s.conn, s.patient, Some(s.dentist), day(2025, 1, 21), at(10, 0), Cancelled);

        let slots = booked_slots(&s.conn, day(2025, 1, 15), None).unwrap();
        assert_eq!(slots.len(), 1);
        assert_eq!(slots[0].time, at(10, 0));
        assert_eq!(slots[0].dentist, Some(s.dentist));
    }
}
