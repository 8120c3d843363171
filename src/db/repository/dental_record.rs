use rusqlite::{params, Connection, Row};

use super::{expect_changed, joined_name, or_not_found, timestamp_now};
use crate::db::DatabaseError;
use crate::models::*;

const RECORD_SELECT: &str = "SELECT r.id, r.patient_id, r.appointment_id, r.treatment, r.diagnosis, r.notes,
        r.created_by, u.first_name, u.last_name, u.username, r.created_at
     FROM dental_records r
     LEFT JOIN users u ON u.id = r.created_by";

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<DentalRecord> {
    Ok(DentalRecord {
        id: row.get(0)?,
        patient: row.get(1)?,
        appointment: row.get(2)?,
        treatment: row.get(3)?,
        diagnosis: row.get(4)?,
        notes: row.get(5)?,
        created_by: row.get(6)?,
        created_by_name: joined_name(row, 7)?,
        created_at: row.get(10)?,
    })
}

pub fn insert_dental_record(
    conn: &Connection,
    record: &NewDentalRecord,
    created_by: Option<i64>,
) -> Result<DentalRecord, DatabaseError> {
    conn.execute(
        "INSERT INTO dental_records (patient_id, appointment_id, treatment, diagnosis, notes,
                                     created_by, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            record.patient,
            record.appointment,
            record.treatment.trim(),
            record.diagnosis,
            record.notes,
            created_by,
            timestamp_now(),
        ],
    )?;
    get_dental_record(conn, conn.last_insert_rowid())
}

pub fn get_dental_record(conn: &Connection, id: i64) -> Result<DentalRecord, DatabaseError> {
    let sql = format!("{RECORD_SELECT} WHERE r.id = ?1");
    or_not_found(conn.query_row(&sql, params![id], record_from_row), "DentalRecord", id)
}

/// Newest first, optionally narrowed to one patient.
pub fn list_dental_records(
    conn: &Connection,
    patient: Option<i64>,
) -> Result<Vec<DentalRecord>, DatabaseError> {
    let sql = format!(
        "{RECORD_SELECT} WHERE ?1 IS NULL OR r.patient_id = ?1 ORDER BY r.created_at DESC, r.id DESC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![patient], record_from_row)?;
    rows.map(|r| r.map_err(DatabaseError::from)).collect()
}

pub fn update_dental_record(
    conn: &Connection,
    id: i64,
    update: &DentalRecordUpdate,
) -> Result<DentalRecord, DatabaseError> {
    let changed = conn.execute(
        "UPDATE dental_records SET
            treatment = COALESCE(?2, treatment),
            diagnosis = COALESCE(?3, diagnosis),
            notes = COALESCE(?4, notes)
         WHERE id = ?1",
        params![id, update.treatment, update.diagnosis, update.notes],
    )?;
    expect_changed(changed, "DentalRecord", id)?;
    get_dental_record(conn, id)
}

pub fn delete_dental_record(conn: &Connection, id: i64) -> Result<(), DatabaseError> {
    let changed = conn.execute("DELETE FROM dental_records WHERE id = ?1", params![id])?;
    expect_changed(changed, "DentalRecord", id)
}
