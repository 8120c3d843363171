use rusqlite::{params, Connection, Row};

use super::{expect_changed, or_not_found, timestamp_now};
use crate::db::DatabaseError;
use crate::models::*;

const NOTE_SELECT: &str = "SELECT n.id, n.patient_id, n.appointment_id, n.treatment, n.diagnosis, n.notes,
        n.created_by, u.first_name, u.last_name, u.username, n.created_at, n.updated_at
     FROM clinical_notes n
     LEFT JOIN users u ON u.id = n.created_by";

fn note_from_row(row: &Row<'_>) -> rusqlite::Result<ClinicalNote> {
    let created_by: Option<i64> = row.get(6)?;
    let created_by_name = match created_by {
        Some(_) => Some(display_name(
            &row.get::<_, Option<String>>(7)?.unwrap_or_default(),
            &row.get::<_, Option<String>>(8)?.unwrap_or_default(),
            &row.get::<_, Option<String>>(9)?.unwrap_or_default(),
        )),
        None => None,
    };
    Ok(ClinicalNote {
        id: row.get(0)?,
        patient: row.get(1)?,
        appointment: row.get(2)?,
        treatment: row.get(3)?,
        diagnosis: row.get(4)?,
        notes: row.get(5)?,
        created_by,
        created_by_name,
        created_at: row.get(10)?,
        updated_at: row.get(11)?,
    })
}

pub fn insert_clinical_note(
    conn: &Connection,
    note: &NewClinicalNote,
    created_by: Option<i64>,
) -> Result<ClinicalNote, DatabaseError> {
    let now = timestamp_now();
    conn.execute(
        "INSERT INTO clinical_notes (patient_id, appointment_id, treatment, diagnosis, notes,
                                     created_by, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
        params![
            note.patient,
            note.appointment,
            note.treatment,
            note.diagnosis,
            note.notes,
            created_by,
            now,
        ],
    )?;
    get_clinical_note(conn, conn.last_insert_rowid())
}

pub fn get_clinical_note(conn: &Connection, id: i64) -> Result<ClinicalNote, DatabaseError> {
    let sql = format!("{NOTE_SELECT} WHERE n.id = ?1");
    or_not_found(conn.query_row(&sql, params![id], note_from_row), "ClinicalNote", id)
}

pub fn list_clinical_notes(
    conn: &Connection,
    patient: Option<i64>,
) -> Result<Vec<ClinicalNote>, DatabaseError> {
    let sql = format!(
        "{NOTE_SELECT} WHERE ?1 IS NULL OR n.patient_id = ?1 ORDER BY n.created_at DESC, n.id DESC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![patient], note_from_row)?;
    rows.map(|r| r.map_err(DatabaseError::from)).collect()
}

pub fn update_clinical_note(
    conn: &Connection,
    id: i64,
    update: &ClinicalNoteUpdate,
) -> Result<ClinicalNote, DatabaseError> {
    let changed = conn.execute(
        "UPDATE clinical_notes SET
            treatment = COALESCE(?2, treatment),
            diagnosis = COALESCE(?3, diagnosis),
            notes = COALESCE(?4, notes),
            updated_at = ?5
         WHERE id = ?1",
        params![id, update.treatment, update.diagnosis, update.notes, timestamp_now()],
    )?;
    expect_changed(changed, "ClinicalNote", id)?;
    get_clinical_note(conn, id)
}

pub fn delete_clinical_note(conn: &Connection, id: i64) -> Result<(), DatabaseError> {
    let changed = conn.execute("DELETE FROM clinical_notes WHERE id = ?1", params![id])?;
    expect_changed(changed, "ClinicalNote", id)
}
