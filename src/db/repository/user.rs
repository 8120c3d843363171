use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{enum_col, expect_changed, or_not_found, timestamp_now};
use crate::db::DatabaseError;
use crate::models::enums::UserType;
use crate::models::*;

const USER_COLUMNS: &str = "u.id, u.username, u.email, u.first_name, u.last_name, u.user_type,
     u.phone, u.address, u.birthday, u.age, u.is_archived, u.created_at,
     (SELECT MAX(a.date) FROM appointments a
       WHERE a.patient_id = u.id AND a.status != 'cancelled')";

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    let user_type: UserType = enum_col(row, 5)?;
    let is_archived: bool = row.get(10)?;
    let created_at = row.get(11)?;
    let last_appointment_date = row.get(12)?;
    let today = chrono::Local::now().date_naive();
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        first_name: row.get(3)?,
        last_name: row.get(4)?,
        user_type,
        phone: row.get(6)?,
        address: row.get(7)?,
        birthday: row.get(8)?,
        age: row.get(9)?,
        is_active_patient: user_type == UserType::Patient
            && patient_is_active(is_archived, last_appointment_date, created_at, today),
        is_archived,
        created_at,
        last_appointment_date,
    })
}

pub fn insert_user(
    conn: &Connection,
    user: &NewUser,
    user_type: UserType,
    password_hash: &str,
) -> Result<i64, DatabaseError> {
    conn.execute(
        "INSERT INTO users (username, email, password_hash, first_name, last_name, user_type,
                            phone, address, birthday, age, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            user.username.trim(),
            user.email.trim(),
            password_hash,
            user.first_name,
            user.last_name,
            user_type.as_str(),
            user.phone,
            user.address,
            user.birthday,
            user.age,
            timestamp_now(),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get_user(conn: &Connection, id: i64) -> Result<User, DatabaseError> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users u WHERE u.id = ?1");
    or_not_found(conn.query_row(&sql, params![id], user_from_row), "User", id)
}

/// Users of one role, optionally filtered on the archive flag.
pub fn list_users(
    conn: &Connection,
    user_type: UserType,
    archived: Option<bool>,
) -> Result<Vec<User>, DatabaseError> {
    let sql = format!(
        "SELECT {USER_COLUMNS} FROM users u
         WHERE u.user_type = ?1 AND (?2 IS NULL OR u.is_archived = ?2)
         ORDER BY u.last_name, u.first_name, u.username"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![user_type.as_str(), archived], user_from_row)?;
    rows.map(|r| r.map_err(DatabaseError::from)).collect()
}

/// Staff and owner accounts, the people who see appointment requests.
pub fn list_clinic_users(conn: &Connection) -> Result<Vec<User>, DatabaseError> {
    let sql = format!(
        "SELECT {USER_COLUMNS} FROM users u
         WHERE u.user_type IN ('staff', 'owner') AND u.is_archived = 0
         ORDER BY u.id"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], user_from_row)?;
    rows.map(|r| r.map_err(DatabaseError::from)).collect()
}

/// Credentials lookup by username or, failing that, email.
/// Returns `(user_id, password_hash)`.
pub fn find_credentials(
    conn: &Connection,
    identifier: &str,
) -> Result<Option<(i64, String)>, DatabaseError> {
    let identifier = identifier.trim();
    let by_username = conn
        .query_row(
            "SELECT id, password_hash FROM users WHERE username = ?1",
            params![identifier],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;
    if by_username.is_some() {
        return Ok(by_username);
    }
    conn.query_row(
        "SELECT id, password_hash FROM users WHERE lower(email) = lower(?1)",
        params![identifier],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )
    .optional()
    .map_err(DatabaseError::from)
}

pub fn find_user_id_by_email(conn: &Connection, email: &str) -> Result<Option<i64>, DatabaseError> {
    conn.query_row(
        "SELECT id FROM users WHERE lower(email) = lower(?1)",
        params![email.trim()],
        |row| row.get(0),
    )
    .optional()
    .map_err(DatabaseError::from)
}

pub fn username_or_email_taken(
    conn: &Connection,
    username: &str,
    email: &str,
) -> Result<bool, DatabaseError> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM users WHERE username = ?1 OR lower(email) = lower(?2)",
        params![username.trim(), email.trim()],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// Apply a partial profile update. `user_type` is honored only when the
/// caller passes `allow_role_change`.
pub fn update_user(
    conn: &Connection,
    id: i64,
    update: &UserUpdate,
    allow_role_change: bool,
) -> Result<User, DatabaseError> {
    let role = if allow_role_change {
        update.user_type.map(|t| t.as_str())
    } else {
        None
    };
    let changed = conn.execute(
        "UPDATE users SET
            email = COALESCE(?2, email),
            first_name = COALESCE(?3, first_name),
            last_name = COALESCE(?4, last_name),
            phone = COALESCE(?5, phone),
            address = COALESCE(?6, address),
            birthday = COALESCE(?7, birthday),
            age = COALESCE(?8, age),
            user_type = COALESCE(?9, user_type)
         WHERE id = ?1",
        params![
            id,
            update.email.as_deref().map(str::trim),
            update.first_name,
            update.last_name,
            update.phone,
            update.address,
            update.birthday,
            update.age,
            role,
        ],
    )?;
    expect_changed(changed, "User", id)?;
    get_user(conn, id)
}

pub fn set_password_hash(conn: &Connection, id: i64, password_hash: &str) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE users SET password_hash = ?2 WHERE id = ?1",
        params![id, password_hash],
    )?;
    expect_changed(changed, "User", id)
}

pub fn set_archived(conn: &Connection, id: i64, archived: bool) -> Result<User, DatabaseError> {
    let changed = conn.execute(
        "UPDATE users SET is_archived = ?2 WHERE id = ?1",
        params![id, archived],
    )?;
    expect_changed(changed, "User", id)?;
    get_user(conn, id)
}

pub fn delete_user(conn: &Connection, id: i64) -> Result<(), DatabaseError> {
    let changed = conn.execute("DELETE FROM users WHERE id = ?1", params![id])?;
    expect_changed(changed, "User", id)
}

pub fn count_users(conn: &Connection, user_type: UserType) -> Result<i64, DatabaseError> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM users WHERE user_type = ?1",
        params![user_type.as_str()],
        |row| row.get(0),
    )?;
    Ok(count)
}
