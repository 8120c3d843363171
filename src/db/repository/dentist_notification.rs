use rusqlite::{params, Connection, Row};

use super::{expect_changed, or_not_found, timestamp_now};
use crate::db::DatabaseError;
use crate::models::*;

const FEED_SELECT: &str = "SELECT id, dentist_id, appointment_id, message, is_read, created_at
     FROM dentist_notifications";

fn feed_from_row(row: &Row<'_>) -> rusqlite::Result<DentistNotification> {
    Ok(DentistNotification {
        id: row.get(0)?,
        dentist: row.get(1)?,
        appointment: row.get(2)?,
        message: row.get(3)?,
        is_read: row.get(4)?,
        created_at: row.get(5)?,
    })
}

pub fn insert_dentist_notification(
    conn: &Connection,
    dentist: i64,
    appointment: Option<i64>,
    message: &str,
) -> Result<i64, DatabaseError> {
    conn.execute(
        "INSERT INTO dentist_notifications (dentist_id, appointment_id, message, created_at)
         VALUES (?1, ?2, ?3, ?4)",
        params![dentist, appointment, message, timestamp_now()],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn list_dentist_notifications(
    conn: &Connection,
    dentist: i64,
) -> Result<Vec<DentistNotification>, DatabaseError> {
    let sql = format!("{FEED_SELECT} WHERE dentist_id = ?1 ORDER BY created_at DESC, id DESC");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![dentist], feed_from_row)?;
    rows.map(|r| r.map_err(DatabaseError::from)).collect()
}

pub fn get_dentist_notification(
    conn: &Connection,
    id: i64,
    dentist: i64,
) -> Result<DentistNotification, DatabaseError> {
    let sql = format!("{FEED_SELECT} WHERE id = ?1 AND dentist_id = ?2");
    or_not_found(
        conn.query_row(&sql, params![id, dentist], feed_from_row),
        "DentistNotification",
        id,
    )
}

pub fn count_unread_dentist_notifications(conn: &Connection, dentist: i64) -> Result<i64, DatabaseError> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM dentist_notifications WHERE dentist_id = ?1 AND is_read = 0",
        params![dentist],
        |row| row.get(0),
    )?;
    Ok(count)
}

/// Idempotent.
pub fn mark_dentist_notification_read(conn: &Connection, id: i64, dentist: i64) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE dentist_notifications SET is_read = 1 WHERE id = ?1 AND dentist_id = ?2",
        params![id, dentist],
    )?;
    expect_changed(changed, "DentistNotification", id)
}

pub fn mark_all_dentist_notifications_read(conn: &Connection, dentist: i64) -> Result<usize, DatabaseError> {
    Ok(conn.execute(
        "UPDATE dentist_notifications SET is_read = 1 WHERE dentist_id = ?1 AND is_read = 0",
        params![dentist],
    )?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::fixtures;
    use crate::db::sqlite::open_memory_database;
    use crate::models::enums::UserType;

    #[test]
    fn feed_is_private_to_each_dentist() {
        let conn = open_memory_database().unwrap();
        let doc = fixtures::user(&conn, "doc", UserType::Staff);
        let other = fixtures::user(&conn, "other", UserType::Staff);
        let a = insert_dentist_notification(&conn, doc, None, "first").unwrap();
        insert_dentist_notification(&conn, doc, None, "second").unwrap();

        let feed = list_dentist_notifications(&conn, doc).unwrap();
        assert_eq!(feed.len(), 2);
        assert_eq!(feed[0].message, "second");
        assert!(list_dentist_notifications(&conn, other).unwrap().is_empty());
        assert!(mark_dentist_notification_read(&conn, a, other).is_err());

        mark_dentist_notification_read(&conn, a, doc).unwrap();
        mark_dentist_notification_read(&conn, a, doc).unwrap();
        assert_eq!(count_unread_dentist_notifications(&conn, doc).unwrap(), 1);
        assert_eq!(mark_all_dentist_notifications_read(&conn, doc).unwrap(), 1);
        assert_eq!(count_unread_dentist_notifications(&conn, doc).unwrap(), 0);
    }
}
