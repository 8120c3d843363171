use rusqlite::{params, Connection, Row};

use super::{enum_col, expect_changed, timestamp_now};
use crate::db::DatabaseError;
use crate::models::enums::NotificationType;
use crate::models::*;

const NOTIFICATION_SELECT: &str = "SELECT n.id, n.recipient_id, n.appointment_id, n.notification_type,
        n.message, n.is_read, n.created_at,
        a.id, p.first_name, p.last_name, p.username, a.date, a.time, a.status,
        s.name, a.reschedule_date, a.reschedule_time, a.cancel_reason
     FROM appointment_notifications n
     LEFT JOIN appointments a ON a.id = n.appointment_id
     LEFT JOIN users p ON p.id = a.patient_id
     LEFT JOIN services s ON s.id = a.service_id";

fn notification_from_row(row: &Row<'_>) -> rusqlite::Result<AppointmentNotification> {
    let joined: Option<i64> = row.get(7)?;
    let appointment_details = match joined {
        Some(_) => Some(AppointmentDetails {
            patient_name: display_name(
                &row.get::<_, Option<String>>(8)?.unwrap_or_default(),
                &row.get::<_, Option<String>>(9)?.unwrap_or_default(),
                &row.get::<_, Option<String>>(10)?.unwrap_or_default(),
            ),
            date: row.get(11)?,
            time: row.get(12)?,
            status: enum_col(row, 13)?,
            service_name: row.get(14)?,
            reschedule_date: row.get(15)?,
            reschedule_time: row.get(16)?,
            cancel_reason: row.get(17)?,
        }),
        None => None,
    };
    Ok(AppointmentNotification {
        id: row.get(0)?,
        recipient: row.get(1)?,
        appointment: row.get(2)?,
        notification_type: enum_col(row, 3)?,
        message: row.get(4)?,
        is_read: row.get(5)?,
        created_at: row.get(6)?,
        appointment_details,
    })
}

pub fn insert_notification(
    conn: &Connection,
    recipient: i64,
    appointment: Option<i64>,
    notification_type: NotificationType,
    message: &str,
) -> Result<i64, DatabaseError> {
    conn.execute(
        "INSERT INTO appointment_notifications
            (recipient_id, appointment_id, notification_type, message, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![recipient, appointment, notification_type.as_str(), message, timestamp_now()],
    )?;
    Ok(conn.last_insert_rowid())
}

/// A recipient's notifications, newest first.
pub fn list_notifications(
    conn: &Connection,
    recipient: i64,
) -> Result<Vec<AppointmentNotification>, DatabaseError> {
    let sql = format!(
        "{NOTIFICATION_SELECT} WHERE n.recipient_id = ?1 ORDER BY n.created_at DESC, n.id DESC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![recipient], notification_from_row)?;
    rows.map(|r| r.map_err(DatabaseError::from)).collect()
}

pub fn get_notification(
    conn: &Connection,
    id: i64,
    recipient: i64,
) -> Result<AppointmentNotification, DatabaseError> {
    let sql = format!("{NOTIFICATION_SELECT} WHERE n.id = ?1 AND n.recipient_id = ?2");
    super::or_not_found(
        conn.query_row(&sql, params![id, recipient], notification_from_row),
        "Notification",
        id,
    )
}

pub fn count_unread(conn: &Connection, recipient: i64) -> Result<i64, DatabaseError> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM appointment_notifications WHERE recipient_id = ?1 AND is_read = 0",
        params![recipient],
        |row| row.get(0),
    )?;
    Ok(count)
}

/// Idempotent: marking an already-read notification succeeds.
pub fn mark_notification_read(conn: &Connection, id: i64, recipient: i64) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE appointment_notifications SET is_read = 1 WHERE id = ?1 AND recipient_id = ?2",
        params![id, recipient],
    )?;
    expect_changed(changed, "Notification", id)
}

pub fn mark_all_notifications_read(conn: &Connection, recipient: i64) -> Result<usize, DatabaseError> {
    Ok(conn.execute(
        "UPDATE appointment_notifications SET is_read = 1 WHERE recipient_id = ?1 AND is_read = 0",
        params![recipient],
    )?)
}

/// Mark every recipient's notification about one appointment as read.
pub fn mark_appointment_notifications_read(
    conn: &Connection,
    appointment: i64,
) -> Result<usize, DatabaseError> {
    Ok(conn.execute(
        "UPDATE appointment_notifications SET is_read = 1 WHERE appointment_id = ?1 AND is_read = 0",
        params![appointment],
    )?)
}
