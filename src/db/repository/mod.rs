//! Repository layer: entity-scoped database operations.
//!
//! Every function takes a borrowed `Connection` and returns
//! `DatabaseError`; callers own the connection and any transaction.

mod appointment;
mod auth_token;
mod availability;
mod billing;
mod clinical_note;
mod dental_record;
mod dentist_notification;
mod document;
mod file_attachment;
mod intake_form;
mod inventory;
mod notification;
mod password_reset;
mod service;
mod teeth_image;
mod treatment;
mod user;

use std::str::FromStr;

use rusqlite::types::Type;
use rusqlite::Row;

use super::DatabaseError;

pub use appointment::*;
pub use auth_token::*;
pub use availability::*;
pub use billing::*;
pub use clinical_note::*;
pub use dental_record::*;
pub use dentist_notification::*;
pub use document::*;
pub use file_attachment::*;
pub use intake_form::*;
pub use inventory::*;
pub use notification::*;
pub use password_reset::*;
pub use service::*;
pub use teeth_image::*;
pub use treatment::*;
pub use user::*;

/// Timestamp format for every `*_at` column.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub(crate) fn timestamp_now() -> String {
    chrono::Local::now().format(TIMESTAMP_FORMAT).to_string()
}

/// Read a TEXT column into one of the `str_enum` types.
pub(crate) fn enum_col<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr<Err = DatabaseError>,
{
    let raw: String = row.get(idx)?;
    T::from_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

pub(crate) fn opt_enum_col<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<T>>
where
    T: FromStr<Err = DatabaseError>,
{
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| {
        T::from_str(&s)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
    })
    .transpose()
}

/// Map `QueryReturnedNoRows` to a typed not-found error.
pub(crate) fn or_not_found<T>(
    result: rusqlite::Result<T>,
    entity_type: &str,
    id: i64,
) -> Result<T, DatabaseError> {
    match result {
        Ok(v) => Ok(v),
        Err(rusqlite::Error::QueryReturnedNoRows) => Err(DatabaseError::not_found(entity_type, id)),
        Err(e) => Err(e.into()),
    }
}

/// Fail with not-found when a write touched no rows.
pub(crate) fn expect_changed(changed: usize, entity_type: &str, id: i64) -> Result<(), DatabaseError> {
    if changed == 0 {
        Err(DatabaseError::not_found(entity_type, id))
    } else {
        Ok(())
    }
}

/// Display name from a LEFT JOINed user's first name, last name and
/// username columns starting at `idx`. `None` when the join found no row.
pub(crate) fn joined_name(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<String>> {
    let username: Option<String> = row.get(idx + 2)?;
    let Some(username) = username else {
        return Ok(None);
    };
    let first: Option<String> = row.get(idx)?;
    let last: Option<String> = row.get(idx + 1)?;
    Ok(Some(crate::models::display_name(
        &first.unwrap_or_default(),
        &last.unwrap_or_default(),
        &username,
    )))
}
