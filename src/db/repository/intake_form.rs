use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{expect_changed, or_not_found, timestamp_now};
use crate::db::DatabaseError;
use crate::models::*;

const INTAKE_SELECT: &str = "SELECT id, patient_id, allergies, current_medications, medical_conditions,
        previous_dental_treatments, dental_concerns, emergency_contact_name,
        emergency_contact_phone, created_at, updated_at
     FROM intake_forms";

fn intake_from_row(row: &Row<'_>) -> rusqlite::Result<IntakeForm> {
    Ok(IntakeForm {
        id: row.get(0)?,
        patient: row.get(1)?,
        allergies: row.get(2)?,
        current_medications: row.get(3)?,
        medical_conditions: row.get(4)?,
        previous_dental_treatments: row.get(5)?,
        dental_concerns: row.get(6)?,
        emergency_contact_name: row.get(7)?,
        emergency_contact_phone: row.get(8)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}

/// Fails with a constraint error if the patient already has a form.
pub fn insert_intake_form(
    conn: &Connection,
    patient: i64,
    form: &IntakeFormInput,
) -> Result<IntakeForm, DatabaseError> {
    let now = timestamp_now();
    conn.execute(
        "INSERT INTO intake_forms (patient_id, allergies, current_medications, medical_conditions,
                                   previous_dental_treatments, dental_concerns,
                                   emergency_contact_name, emergency_contact_phone,
                                   created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)",
        params![
            patient,
            form.allergies,
            form.current_medications,
            form.medical_conditions,
            form.previous_dental_treatments,
            form.dental_concerns,
            form.emergency_contact_name,
            form.emergency_contact_phone,
            now,
        ],
    )?;
    get_intake_form(conn, conn.last_insert_rowid())
}

pub fn get_intake_form(conn: &Connection, id: i64) -> Result<IntakeForm, DatabaseError> {
    let sql = format!("{INTAKE_SELECT} WHERE id = ?1");
    or_not_found(conn.query_row(&sql, params![id], intake_from_row), "IntakeForm", id)
}

pub fn find_intake_form_for_patient(
    conn: &Connection,
    patient: i64,
) -> Result<Option<IntakeForm>, DatabaseError> {
    let sql = format!("{INTAKE_SELECT} WHERE patient_id = ?1");
    conn.query_row(&sql, params![patient], intake_from_row)
        .optional()
        .map_err(DatabaseError::from)
}

pub fn list_intake_forms(
    conn: &Connection,
    patient: Option<i64>,
) -> Result<Vec<IntakeForm>, DatabaseError> {
    let sql = format!("{INTAKE_SELECT} WHERE ?1 IS NULL OR patient_id = ?1 ORDER BY updated_at DESC");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![patient], intake_from_row)?;
    rows.map(|r| r.map_err(DatabaseError::from)).collect()
}

pub fn update_intake_form(
    conn: &Connection,
    id: i64,
    form: &IntakeFormInput,
) -> Result<IntakeForm, DatabaseError> {
    let changed = conn.execute(
        "UPDATE intake_forms SET
            allergies = ?2, current_medications = ?3, medical_conditions = ?4,
            previous_dental_treatments = ?5, dental_concerns = ?6,
            emergency_contact_name = ?7, emergency_contact_phone = ?8, updated_at = ?9
         WHERE id = ?1",
        params![
            id,
            form.allergies,
            form.current_medications,
            form.medical_conditions,
            form.previous_dental_treatments,
            form.dental_concerns,
            form.emergency_contact_name,
            form.emergency_contact_phone,
            timestamp_now(),
        ],
    )?;
    expect_changed(changed, "IntakeForm", id)?;
    get_intake_form(conn, id)
}

pub fn delete_intake_form(conn: &Connection, id: i64) -> Result<(), DatabaseError> {
    let changed = conn.execute("DELETE FROM intake_forms WHERE id = ?1", params![id])?;
    expect_changed(changed, "IntakeForm", id)
}
