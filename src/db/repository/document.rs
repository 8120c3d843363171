use rusqlite::{params, Connection, Row};

use super::{enum_col, expect_changed, joined_name, or_not_found, timestamp_now};
use crate::db::DatabaseError;
use crate::models::*;

const DOCUMENT_SELECT: &str = "SELECT d.id, d.patient_id, d.document_type, d.title, d.description,
        d.file_name, d.stored_name, d.content_type, d.size_bytes, d.uploaded_by,
        u.first_name, u.last_name, u.username, d.uploaded_at
     FROM documents d
     LEFT JOIN users u ON u.id = d.uploaded_by";

fn document_from_row(row: &Row<'_>) -> rusqlite::Result<Document> {
    Ok(Document {
        id: row.get(0)?,
        patient: row.get(1)?,
        document_type: enum_col(row, 2)?,
        title: row.get(3)?,
        description: row.get(4)?,
        file_name: row.get(5)?,
        stored_name: row.get(6)?,
        content_type: row.get(7)?,
        size_bytes: row.get(8)?,
        uploaded_by: row.get(9)?,
        uploaded_by_name: joined_name(row, 10)?,
        uploaded_at: row.get(13)?,
    })
}

pub fn insert_document(conn: &Connection, doc: &NewDocument) -> Result<Document, DatabaseError> {
    conn.execute(
        "INSERT INTO documents (patient_id, document_type, title, description, file_name,
                                stored_name, content_type, size_bytes, uploaded_by, uploaded_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            doc.patient,
            doc.document_type.as_str(),
            doc.title,
            doc.description,
            doc.file_name,
            doc.stored_name,
            doc.content_type,
            doc.size_bytes,
            doc.uploaded_by,
            timestamp_now(),
        ],
    )?;
    get_document(conn, conn.last_insert_rowid())
}

pub fn get_document(conn: &Connection, id: i64) -> Result<Document, DatabaseError> {
    let sql = format!("{DOCUMENT_SELECT} WHERE d.id = ?1");
    or_not_found(conn.query_row(&sql, params![id], document_from_row), "Document", id)
}

pub fn list_documents(conn: &Connection, patient: Option<i64>) -> Result<Vec<Document>, DatabaseError> {
    let sql = format!(
        "{DOCUMENT_SELECT} WHERE ?1 IS NULL OR d.patient_id = ?1 ORDER BY d.uploaded_at DESC, d.id DESC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![patient], document_from_row)?;
    rows.map(|r| r.map_err(DatabaseError::from)).collect()
}

pub fn delete_document(conn: &Connection, id: i64) -> Result<(), DatabaseError> {
    let changed = conn.execute("DELETE FROM documents WHERE id = ?1", params![id])?;
    expect_changed(changed, "Document", id)
}
