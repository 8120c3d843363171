use rusqlite::{params, Connection, Row};

use crate::db::DatabaseError;
use crate::models::time_format::format_time;
use crate::models::*;

fn availability_from_row(row: &Row<'_>) -> rusqlite::Result<StaffAvailability> {
    Ok(StaffAvailability {
        id: row.get(0)?,
        staff: row.get(1)?,
        day_of_week: row.get(2)?,
        is_available: row.get(3)?,
        start_time: row.get(4)?,
        end_time: row.get(5)?,
    })
}

/// Weekly schedule rows, for one staff member or everyone.
pub fn list_availability(
    conn: &Connection,
    staff: Option<i64>,
) -> Result<Vec<StaffAvailability>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, staff_id, day_of_week, is_available, start_time, end_time
         FROM staff_availability
         WHERE ?1 IS NULL OR staff_id = ?1
         ORDER BY staff_id, day_of_week",
    )?;
    let rows = stmt.query_map(params![staff], availability_from_row)?;
    rows.map(|r| r.map_err(DatabaseError::from)).collect()
}

/// Replace a staff member's whole week atomically.
pub fn replace_availability(
    conn: &Connection,
    staff: i64,
    slots: &[AvailabilitySlot],
) -> Result<Vec<StaffAvailability>, DatabaseError> {
    let tx = conn.unchecked_transaction()?;
    tx.execute("DELETE FROM staff_availability WHERE staff_id = ?1", params![staff])?;
    for slot in slots {
        tx.execute(
            "INSERT INTO staff_availability (staff_id, day_of_week, is_available, start_time, end_time)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                staff,
                slot.day_of_week,
                slot.is_available,
                format_time(&slot.start_time),
                format_time(&slot.end_time),
            ],
        )?;
    }
    tx.commit()?;
    list_availability(conn, Some(staff))
}

/// Non-archived clinic users marked available on a weekday.
pub fn available_staff_on(conn: &Connection, day_of_week: u8) -> Result<Vec<AvailableStaff>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT u.id, u.first_name, u.last_name, u.username, sa.start_time, sa.end_time
         FROM staff_availability sa
         JOIN users u ON u.id = sa.staff_id
         WHERE sa.day_of_week = ?1 AND sa.is_available = 1
           AND u.is_archived = 0 AND u.user_type IN ('staff', 'owner')
         ORDER BY sa.start_time, u.id",
    )?;
    let rows = stmt.query_map(params![day_of_week], |row| {
        let first: String = row.get(1)?;
        let last: String = row.get(2)?;
        let username: String = row.get(3)?;
        Ok(AvailableStaff {
            staff_id: row.get(0)?,
            name: display_name(&first, &last, &username),
            start_time: row.get(4)?,
            end_time: row.get(5)?,
        })
    })?;
    rows.map(|r| r.map_err(DatabaseError::from)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::fixtures::{self, at};
    use crate::db::sqlite::open_memory_database;
    use crate::models::enums::UserType;

    fn slot(day: u8, available: bool) -> AvailabilitySlot {
        AvailabilitySlot {
            day_of_week: day,
            is_available: available,
            start_time: at(9, 0),
            end_time: at(17, 0),
        }
    }

    #[test]
    fn bulk_replace_overwrites_week() {
        let conn = open_memory_database().unwrap();
        let staff = fixtures::user(&conn, "doc", UserType::Staff);
        replace_availability(&conn, staff, &[slot(1, true), slot(2, true)]).unwrap();
        let week = replace_availability(&conn, staff, &[slot(3, true)]).unwrap();
        assert_eq!(week.len(), 1);
        assert_eq!(week[0].day_of_week, 3);
        assert_eq!(week[0].start_time, at(9, 0));
    }

    #[test]
    fn duplicate_day_rolls_back() {
        let conn = open_memory_database().unwrap();
        let staff = fixtures::user(&conn, "doc", UserType::Staff);
        replace_availability(&conn, staff, &[slot(1, true)]).unwrap();
        assert!(replace_availability(&conn, staff, &[slot(2, true), slot(2, true)]).is_err());
        let week = list_availability(&conn, Some(staff)).unwrap();
        assert_eq!(week.len(), 1);
        assert_eq!(week[0].day_of_week, 1);
    }

    #[test]
    fn available_on_weekday() {
        let conn = open_memory_database().unwrap();
        let a = fixtures::user(&conn, "a", UserType::Staff);
        let b = fixtures::user(&conn, "b", UserType::Owner);
        replace_availability(&conn, a, &[slot(1, true)]).unwrap();
        replace_availability(&conn, b, &[slot(1, false), slot(2, true)]).unwrap();

        let monday = available_staff_on(&conn, 1).unwrap();
        assert_eq!(monday.len(), 1);
        assert_eq!(monday[0].staff_id, a);
        assert_eq!(available_staff_on(&conn, 2).unwrap()[0].staff_id, b);
        assert!(available_staff_on(&conn, 0).unwrap().is_empty());
    }
}
