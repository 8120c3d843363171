use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{expect_changed, joined_name, or_not_found, timestamp_now};
use crate::db::DatabaseError;
use crate::models::*;

const IMAGE_SELECT: &str = "SELECT t.id, t.patient_id, p.first_name, p.last_name, p.username, t.notes,
        t.file_name, t.stored_name, t.content_type, t.size_bytes, t.uploaded_by,
        u.first_name, u.last_name, u.username, t.is_latest, t.uploaded_at
     FROM teeth_images t
     JOIN users p ON p.id = t.patient_id
     LEFT JOIN users u ON u.id = t.uploaded_by";

fn image_from_row(row: &Row<'_>) -> rusqlite::Result<TeethImage> {
    let id: i64 = row.get(0)?;
    Ok(TeethImage {
        id,
        patient: row.get(1)?,
        patient_name: joined_name(row, 2)?.unwrap_or_default(),
        notes: row.get(5)?,
        file_name: row.get(6)?,
        stored_name: row.get(7)?,
        content_type: row.get(8)?,
        size_bytes: row.get(9)?,
        uploaded_by: row.get(10)?,
        uploaded_by_name: joined_name(row, 11)?,
        is_latest: row.get(14)?,
        uploaded_at: row.get(15)?,
        image_url: format!("/api/teeth-images/{id}/image/"),
    })
}

/// Store a new image as the patient's latest, demoting the previous one.
/// Two statements: run inside a transaction.
pub fn insert_teeth_image(conn: &Connection, image: &NewTeethImage) -> Result<TeethImage, DatabaseError> {
    conn.execute(
        "UPDATE teeth_images SET is_latest = 0 WHERE patient_id = ?1 AND is_latest = 1",
        params![image.patient],
    )?;
    conn.execute(
        "INSERT INTO teeth_images (patient_id, notes, file_name, stored_name, content_type,
                                   size_bytes, uploaded_by, is_latest, uploaded_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 1, ?8)",
        params![
            image.patient,
            image.notes,
            image.file_name,
            image.stored_name,
            image.content_type,
            image.size_bytes,
            image.uploaded_by,
            timestamp_now(),
        ],
    )?;
    get_teeth_image(conn, conn.last_insert_rowid())
}

pub fn get_teeth_image(conn: &Connection, id: i64) -> Result<TeethImage, DatabaseError> {
    let sql = format!("{IMAGE_SELECT} WHERE t.id = ?1");
    or_not_found(conn.query_row(&sql, params![id], image_from_row), "TeethImage", id)
}

/// Newest first.
pub fn list_teeth_images(conn: &Connection, patient: Option<i64>) -> Result<Vec<TeethImage>, DatabaseError> {
    let sql = format!(
        "{IMAGE_SELECT} WHERE ?1 IS NULL OR t.patient_id = ?1 ORDER BY t.uploaded_at DESC, t.id DESC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![patient], image_from_row)?;
    rows.map(|r| r.map_err(DatabaseError::from)).collect()
}

pub fn latest_teeth_image(conn: &Connection, patient: i64) -> Result<Option<TeethImage>, DatabaseError> {
    let sql = format!("{IMAGE_SELECT} WHERE t.patient_id = ?1 AND t.is_latest = 1");
    Ok(conn.query_row(&sql, params![patient], image_from_row).optional()?)
}

/// Delete an image. When it was the latest, the newest remaining image
/// for that patient takes over. Run inside a transaction.
pub fn delete_teeth_image(conn: &Connection, id: i64) -> Result<(), DatabaseError> {
    let image = get_teeth_image(conn, id)?;
    let changed = conn.execute("DELETE FROM teeth_images WHERE id = ?1", params![id])?;
    expect_changed(changed, "TeethImage", id)?;
    if image.is_latest {
        conn.execute(
            "UPDATE teeth_images SET is_latest = 1
             WHERE id = (SELECT id FROM teeth_images WHERE patient_id = ?1
                         ORDER BY uploaded_at DESC, id DESC LIMIT 1)",
            params![image.patient],
        )?;
    }
    Ok(())
}
