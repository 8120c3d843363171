use rusqlite::{params, Connection, Row};

use super::{enum_col, expect_changed, or_not_found, timestamp_now};
use crate::db::DatabaseError;
use crate::models::*;

const ATTACHMENT_SELECT: &str = "SELECT id, patient_id, file_type, title, description, file_name,
        stored_name, content_type, size_bytes, uploaded_by, uploaded_at
     FROM file_attachments";

fn attachment_from_row(row: &Row<'_>) -> rusqlite::Result<FileAttachment> {
    Ok(FileAttachment {
        id: row.get(0)?,
        patient: row.get(1)?,
        file_type: enum_col(row, 2)?,
        title: row.get(3)?,
        description: row.get(4)?,
        file_name: row.get(5)?,
        stored_name: row.get(6)?,
        content_type: row.get(7)?,
        size_bytes: row.get(8)?,
        uploaded_by: row.get(9)?,
        uploaded_at: row.get(10)?,
    })
}

pub fn insert_file_attachment(
    conn: &Connection,
    file: &NewFileAttachment,
) -> Result<FileAttachment, DatabaseError> {
    conn.execute(
        "INSERT INTO file_attachments (patient_id, file_type, title, description, file_name,
                                       stored_name, content_type, size_bytes, uploaded_by, uploaded_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            file.patient,
            file.file_type.as_str(),
            file.title,
            file.description,
            file.file_name,
            file.stored_name,
            file.content_type,
            file.size_bytes,
            file.uploaded_by,
            timestamp_now(),
        ],
    )?;
    get_file_attachment(conn, conn.last_insert_rowid())
}

pub fn get_file_attachment(conn: &Connection, id: i64) -> Result<FileAttachment, DatabaseError> {
    let sql = format!("{ATTACHMENT_SELECT} WHERE id = ?1");
    or_not_found(conn.query_row(&sql, params![id], attachment_from_row), "FileAttachment", id)
}

pub fn list_file_attachments(
    conn: &Connection,
    patient: Option<i64>,
) -> Result<Vec<FileAttachment>, DatabaseError> {
    let sql = format!(
        "{ATTACHMENT_SELECT} WHERE ?1 IS NULL OR patient_id = ?1 ORDER BY uploaded_at DESC, id DESC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![patient], attachment_from_row)?;
    rows.map(|r| r.map_err(DatabaseError::from)).collect()
}

pub fn delete_file_attachment(conn: &Connection, id: i64) -> Result<(), DatabaseError> {
    let changed = conn.execute("DELETE FROM file_attachments WHERE id = ?1", params![id])?;
    expect_changed(changed, "FileAttachment", id)
}
