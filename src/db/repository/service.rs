use rusqlite::{params, Connection, Row};

use super::{enum_col, expect_changed, or_not_found, timestamp_now};
use crate::db::DatabaseError;
use crate::models::enums::ServiceCategory;
use crate::models::*;

fn service_from_row(row: &Row<'_>) -> rusqlite::Result<Service> {
    Ok(Service {
        id: row.get(0)?,
        name: row.get(1)?,
        category: enum_col(row, 2)?,
        description: row.get(3)?,
        created_at: row.get(4)?,
    })
}

pub fn insert_service(conn: &Connection, service: &NewService) -> Result<Service, DatabaseError> {
    conn.execute(
        "INSERT INTO services (name, category, description, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![
            service.name.trim(),
            service.category.as_str(),
            service.description,
            timestamp_now(),
        ],
    )?;
    get_service(conn, conn.last_insert_rowid())
}

pub fn get_service(conn: &Connection, id: i64) -> Result<Service, DatabaseError> {
    or_not_found(
        conn.query_row(
            "SELECT id, name, category, description, created_at FROM services WHERE id = ?1",
            params![id],
            service_from_row,
        ),
        "Service",
        id,
    )
}

/// All services, or only one category. `ServiceCategory::All` is itself a
/// stored category and is not treated as a wildcard.
pub fn list_services(
    conn: &Connection,
    category: Option<ServiceCategory>,
) -> Result<Vec<Service>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, name, category, description, created_at FROM services
         WHERE ?1 IS NULL OR category = ?1
         ORDER BY name",
    )?;
    let rows = stmt.query_map(params![category.map(|c| c.as_str())], service_from_row)?;
    rows.map(|r| r.map_err(DatabaseError::from)).collect()
}

pub fn update_service(conn: &Connection, id: i64, update: &ServiceUpdate) -> Result<Service, DatabaseError> {
    let changed = conn.execute(
        "UPDATE services SET
            name = COALESCE(?2, name),
            category = COALESCE(?3, category),
            description = COALESCE(?4, description)
         WHERE id = ?1",
        params![
            id,
            update.name.as_deref().map(str::trim),
            update.category.map(|c| c.as_str()),
            update.description,
        ],
    )?;
    expect_changed(changed, "Service", id)?;
    get_service(conn, id)
}

pub fn delete_service(conn: &Connection, id: i64) -> Result<(), DatabaseError> {
    let changed = conn.execute("DELETE FROM services WHERE id = ?1", params![id])?;
    expect_changed(changed, "Service", id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::open_memory_database;

    fn new(name: &str, category: ServiceCategory) -> NewService {
        NewService {
            name: name.into(),
            category,
            description: String::new(),
        }
    }

    #[test]
    fn filter_by_category() {
        let conn = open_memory_database().unwrap();
        insert_service(&conn, &new("Braces", ServiceCategory::Orthodontics)).unwrap();
        insert_service(&conn, &new("Filling", ServiceCategory::Restorations)).unwrap();
        insert_service(&conn, &new("Aligners", ServiceCategory::Orthodontics)).unwrap();

        assert_eq!(list_services(&conn, None).unwrap().len(), 3);
        let ortho = list_services(&conn, Some(ServiceCategory::Orthodontics)).unwrap();
        let names: Vec<_> = ortho.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Aligners", "Braces"]);
    }

    #[test]
    fn update_and_delete() {
        let conn = open_memory_database().unwrap();
        let svc = insert_service(&conn, &new("Xray", ServiceCategory::Xrays)).unwrap();
        let updated = update_service(
            &conn,
            svc.id,
            &ServiceUpdate {
                description: Some("Panoramic".into()),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(updated.name, "Xray");
        assert_eq!(updated.description, "Panoramic");

        delete_service(&conn, svc.id).unwrap();
        assert!(matches!(get_service(&conn, svc.id), Err(DatabaseError::NotFound { .. })));
        assert!(delete_service(&conn, svc.id).is_err());
    }
}
