use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension};

use super::TIMESTAMP_FORMAT;
use crate::db::DatabaseError;

pub fn insert_password_reset(
    conn: &Connection,
    token_hash: &str,
    user_id: i64,
    expires_at: NaiveDateTime,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO password_resets (token_hash, user_id, expires_at) VALUES (?1, ?2, ?3)",
        params![token_hash, user_id, expires_at.format(TIMESTAMP_FORMAT).to_string()],
    )?;
    Ok(())
}

/// Mark an unused, unexpired reset token as used and return its user.
/// A token can be consumed exactly once.
pub fn consume_password_reset(
    conn: &Connection,
    token_hash: &str,
    now: NaiveDateTime,
) -> Result<Option<i64>, DatabaseError> {
    let now = now.format(TIMESTAMP_FORMAT).to_string();
    let user_id: Option<i64> = conn
        .query_row(
            "SELECT user_id FROM password_resets
             WHERE token_hash = ?1 AND used = 0 AND expires_at > ?2",
            params![token_hash, now],
            |row| row.get(0),
        )
        .optional()?;
    let Some(user_id) = user_id else {
        return Ok(None);
    };
    let changed = conn.execute(
        "UPDATE password_resets SET used = 1 WHERE token_hash = ?1 AND used = 0",
        params![token_hash],
    )?;
    Ok((changed == 1).then_some(user_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::fixtures;
    use crate::db::sqlite::open_memory_database;
    use crate::models::enums::UserType;
    use chrono::Duration;

    fn ts(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT).unwrap()
    }

    #[test]
    fn token_is_single_use() {
        let conn = open_memory_database().unwrap();
        let uid = fixtures::user(&conn, "reset", UserType::Patient);
        let now = ts("2025-01-01 10:00:00");
        insert_password_reset(&conn, "h1", uid, now + Duration::hours(1)).unwrap();

        assert_eq!(consume_password_reset(&conn, "h1", now).unwrap(), Some(uid));
        assert_eq!(consume_password_reset(&conn, "h1", now).unwrap(), None);
    }

    #[test]
    fn expired_token_rejected() {
        let conn = open_memory_database().unwrap();
        let uid = fixtures::user(&conn, "late", UserType::Patient);
        let now = ts("2025-01-01 10:00:00");
        insert_password_reset(&conn, "h2", uid, now + Duration::hours(1)).unwrap();

        let later = now + Duration::minutes(61);
        assert_eq!(consume_password_reset(&conn, "h2", later).unwrap(), None);
        assert_eq!(consume_password_reset(&conn, "unknown", now).unwrap(), None);
    }
}
