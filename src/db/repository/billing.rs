use rusqlite::{params, Connection, Row};

use super::{enum_col, expect_changed, or_not_found, timestamp_now};
use crate::db::DatabaseError;
use crate::models::enums::BillingStatus;
use crate::models::*;

const BILLING_SELECT: &str = "SELECT b.id, b.patient_id, p.first_name, p.last_name, p.username,
        b.appointment_id, b.amount, b.description, b.status, b.created_by, b.created_at
     FROM billings b
     JOIN users p ON p.id = b.patient_id";

fn billing_from_row(row: &Row<'_>) -> rusqlite::Result<Billing> {
    let first: String = row.get(2)?;
    let last: String = row.get(3)?;
    let username: String = row.get(4)?;
    Ok(Billing {
        id: row.get(0)?,
        patient: row.get(1)?,
        patient_name: display_name(&first, &last, &username),
        appointment: row.get(5)?,
        amount: row.get(6)?,
        description: row.get(7)?,
        status: enum_col(row, 8)?,
        created_by: row.get(9)?,
        created_at: row.get(10)?,
    })
}

pub fn insert_billing(
    conn: &Connection,
    billing: &NewBilling,
    created_by: Option<i64>,
) -> Result<Billing, DatabaseError> {
    conn.execute(
        "INSERT INTO billings (patient_id, appointment_id, amount, description, status, created_by, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            billing.patient,
            billing.appointment,
            billing.amount,
            billing.description,
            billing.status.unwrap_or(BillingStatus::Pending).as_str(),
            created_by,
            timestamp_now(),
        ],
    )?;
    get_billing(conn, conn.last_insert_rowid())
}

pub fn get_billing(conn: &Connection, id: i64) -> Result<Billing, DatabaseError> {
    let sql = format!("{BILLING_SELECT} WHERE b.id = ?1");
    or_not_found(conn.query_row(&sql, params![id], billing_from_row), "Billing", id)
}

/// Billings newest first, optionally scoped to a patient and a status.
pub fn list_billings(
    conn: &Connection,
    patient: Option<i64>,
    status: Option<BillingStatus>,
) -> Result<Vec<Billing>, DatabaseError> {
    let sql = format!(
        "{BILLING_SELECT}
         WHERE (?1 IS NULL OR b.patient_id = ?1) AND (?2 IS NULL OR b.status = ?2)
         ORDER BY b.created_at DESC, b.id DESC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![patient, status.map(|s| s.as_str())], billing_from_row)?;
    rows.map(|r| r.map_err(DatabaseError::from)).collect()
}

pub fn update_billing_status(
    conn: &Connection,
    id: i64,
    status: BillingStatus,
) -> Result<Billing, DatabaseError> {
    let changed = conn.execute(
        "UPDATE billings SET status = ?2 WHERE id = ?1",
        params![id, status.as_str()],
    )?;
    expect_changed(changed, "Billing", id)?;
    get_billing(conn, id)
}

pub fn delete_billing(conn: &Connection, id: i64) -> Result<(), DatabaseError> {
    let changed = conn.execute("DELETE FROM billings WHERE id = ?1", params![id])?;
    expect_changed(changed, "Billing", id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::fixtures;
    use crate::db::sqlite::open_memory_database;
    use crate::models::enums::UserType;

    fn bill(patient: i64, amount: f64) -> NewBilling {
        NewBilling {
            patient,
            appointment: None,
            amount,
            description: "Cleaning".into(),
            status: None,
        }
    }

    #[test]
    fn new_billing_defaults_to_pending() {
        let conn = open_memory_database().unwrap();
        let p = fixtures::user(&conn, "pat", UserType::Patient);
        let b = insert_billing(&conn, &bill(p, 80.0), None).unwrap();
        assert_eq!(b.status, BillingStatus::Pending);
        assert_eq!(b.patient_name, "PAT Test");
    }

    #[test]
    fn filters_by_patient_and_status() {
        let conn = open_memory_database().unwrap();
        let p1 = fixtures::user(&conn, "p1", UserType::Patient);
        let p2 = fixtures::user(&conn, "p2", UserType::Patient);
        let b = insert_billing(&conn, &bill(p1, 10.0), None).unwrap();
        insert_billing(&conn, &bill(p1, 20.0), None).unwrap();
        insert_billing(&conn, &bill(p2, 30.0), None).unwrap();
        update_billing_status(&conn, b.id, BillingStatus::Paid).unwrap();

        assert_eq!(list_billings(&conn, Some(p1), None).unwrap().len(), 2);
        let paid = list_billings(&conn, None, Some(BillingStatus::Paid)).unwrap();
        assert_eq!(paid.len(), 1);
        assert_eq!(paid[0].id, b.id);
    }
}
