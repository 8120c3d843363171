use rusqlite::{params, Connection, OptionalExtension};

use super::timestamp_now;
use crate::db::DatabaseError;

/// Store the SHA-256 hex digest of a freshly issued token.
pub fn insert_auth_token(conn: &Connection, token_hash: &str, user_id: i64) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO auth_tokens (token_hash, user_id, created_at) VALUES (?1, ?2, ?3)",
        params![token_hash, user_id, timestamp_now()],
    )?;
    Ok(())
}

pub fn find_token_user(conn: &Connection, token_hash: &str) -> Result<Option<i64>, DatabaseError> {
    conn.query_row(
        "SELECT user_id FROM auth_tokens WHERE token_hash = ?1",
        params![token_hash],
        |row| row.get(0),
    )
    .optional()
    .map_err(DatabaseError::from)
}

pub fn delete_auth_token(conn: &Connection, token_hash: &str) -> Result<bool, DatabaseError> {
    let changed = conn.execute(
        "DELETE FROM auth_tokens WHERE token_hash = ?1",
        params![token_hash],
    )?;
    Ok(changed > 0)
}

/// Revoke every session of a user. Returns the number revoked.
pub fn delete_user_tokens(conn: &Connection, user_id: i64) -> Result<usize, DatabaseError> {
    Ok(conn.execute("DELETE FROM auth_tokens WHERE user_id = ?1", params![user_id])?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::fixtures;
    use crate::db::sqlite::open_memory_database;
    use crate::models::enums::UserType;

    #[test]
    fn token_lifecycle() {
        let conn = open_memory_database().unwrap();
        let uid = fixtures::user(&conn, "tok", UserType::Patient);
        insert_auth_token(&conn, "aa", uid).unwrap();
        insert_auth_token(&conn, "bb", uid).unwrap();
        assert_eq!(find_token_user(&conn, "aa").unwrap(), Some(uid));

        assert!(delete_auth_token(&conn, "aa").unwrap());
        assert!(!delete_auth_token(&conn, "aa").unwrap());
        assert!(find_token_user(&conn, "aa").unwrap().is_none());

        assert_eq!(delete_user_tokens(&conn, uid).unwrap(), 1);
        assert!(find_token_user(&conn, "bb").unwrap().is_none());
    }
}
