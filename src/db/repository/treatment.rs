use rusqlite::{params, Connection, Row};

use super::{enum_col, expect_changed, or_not_found, timestamp_now};
use crate::db::DatabaseError;
use crate::models::enums::TreatmentStatus;
use crate::models::*;

const TREATMENT_SELECT: &str = "SELECT t.id, t.patient_id, t.title, t.description, t.assigned_dentist_id,
        d.first_name, d.last_name, d.username, t.start_date, t.end_date, t.status,
        t.created_by, t.created_at, t.updated_at
     FROM treatment_assignments t
     LEFT JOIN users d ON d.id = t.assigned_dentist_id";

fn treatment_from_row(row: &Row<'_>) -> rusqlite::Result<TreatmentAssignment> {
    let assigned_dentist: Option<i64> = row.get(4)?;
    let assigned_dentist_name = match assigned_dentist {
        Some(_) => Some(display_name(
            &row.get::<_, Option<String>>(5)?.unwrap_or_default(),
            &row.get::<_, Option<String>>(6)?.unwrap_or_default(),
            &row.get::<_, Option<String>>(7)?.unwrap_or_default(),
        )),
        None => None,
    };
    Ok(TreatmentAssignment {
        id: row.get(0)?,
        patient: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        assigned_dentist,
        assigned_dentist_name,
        start_date: row.get(8)?,
        end_date: row.get(9)?,
        status: enum_col(row, 10)?,
        created_by: row.get(11)?,
        created_at: row.get(12)?,
        updated_at: row.get(13)?,
    })
}

pub fn insert_treatment(
    conn: &Connection,
    treatment: &NewTreatmentAssignment,
    created_by: Option<i64>,
) -> Result<TreatmentAssignment, DatabaseError> {
    let now = timestamp_now();
    conn.execute(
        "INSERT INTO treatment_assignments (patient_id, title, description, assigned_dentist_id,
                                            start_date, end_date, status, created_by, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)",
        params![
            treatment.patient,
            treatment.title.trim(),
            treatment.description,
            treatment.assigned_dentist,
            treatment.start_date,
            treatment.end_date,
            treatment.status.unwrap_or(TreatmentStatus::Planned).as_str(),
            created_by,
            now,
        ],
    )?;
    get_treatment(conn, conn.last_insert_rowid())
}

pub fn get_treatment(conn: &Connection, id: i64) -> Result<TreatmentAssignment, DatabaseError> {
    let sql = format!("{TREATMENT_SELECT} WHERE t.id = ?1");
    or_not_found(conn.query_row(&sql, params![id], treatment_from_row), "TreatmentAssignment", id)
}

pub fn list_treatments(
    conn: &Connection,
    patient: Option<i64>,
) -> Result<Vec<TreatmentAssignment>, DatabaseError> {
    let sql = format!(
        "{TREATMENT_SELECT} WHERE ?1 IS NULL OR t.patient_id = ?1 ORDER BY t.created_at DESC, t.id DESC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![patient], treatment_from_row)?;
    rows.map(|r| r.map_err(DatabaseError::from)).collect()
}

pub fn update_treatment(
    conn: &Connection,
    id: i64,
    update: &TreatmentUpdate,
) -> Result<TreatmentAssignment, DatabaseError> {
    let changed = conn.execute(
        "UPDATE treatment_assignments SET
            title = COALESCE(?2, title),
            description = COALESCE(?3, description),
            assigned_dentist_id = COALESCE(?4, assigned_dentist_id),
            start_date = COALESCE(?5, start_date),
            end_date = COALESCE(?6, end_date),
            status = COALESCE(?7, status),
            updated_at = ?8
         WHERE id = ?1",
        params![
            id,
            update.title.as_deref().map(str::trim),
            update.description,
            update.assigned_dentist,
            update.start_date,
            update.end_date,
            update.status.map(|s| s.as_str()),
            timestamp_now(),
        ],
    )?;
    expect_changed(changed, "TreatmentAssignment", id)?;
    get_treatment(conn, id)
}

pub fn update_treatment_status(
    conn: &Connection,
    id: i64,
    status: TreatmentStatus,
) -> Result<TreatmentAssignment, DatabaseError> {
    update_treatment(
        conn,
        id,
        &TreatmentUpdate {
            status: Some(status),
            ..Default::default()
        },
    )
}

pub fn delete_treatment(conn: &Connection, id: i64) -> Result<(), DatabaseError> {
    let changed = conn.execute("DELETE FROM treatment_assignments WHERE id = ?1", params![id])?;
    expect_changed(changed, "TreatmentAssignment", id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::fixtures;
    use crate::db::sqlite::open_memory_database;
    use crate::models::enums::UserType;

    #[test]
    fn treatment_defaults_and_status_update() {
        let conn = open_memory_database().unwrap();
        let p = fixtures::user(&conn, "pat", UserType::Patient);
        let d = fixtures::user(&conn, "doc", UserType::Staff);
        let t = insert_treatment(
            &conn,
            &NewTreatmentAssignment {
                patient: p,
                title: "Braces".into(),
                description: String::new(),
                assigned_dentist: Some(d),
                start_date: Some(fixtures::day(2025, 2, 1)),
                end_date: None,
                status: None,
            },
            Some(d),
        )
        .unwrap();
        assert_eq!(t.status, TreatmentStatus::Planned);
        assert_eq!(t.assigned_dentist_name.as_deref(), Some("DOC Test"));

        let t = update_treatment_status(&conn, t.id, TreatmentStatus::Ongoing).unwrap();
        assert_eq!(t.status, TreatmentStatus::Ongoing);
        assert_eq!(t.title, "Braces");
        assert_eq!(list_treatments(&conn, Some(p)).unwrap().len(), 1);
        assert!(list_treatments(&conn, Some(d)).unwrap().is_empty());
    }
}
