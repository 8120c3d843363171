use rusqlite::{params, Connection, Row};

use super::{expect_changed, or_not_found, timestamp_now};
use crate::db::DatabaseError;
use crate::models::*;

const INVENTORY_SELECT: &str =
    "SELECT id, name, category, quantity, min_stock, supplier, cost, updated_at FROM inventory_items";

fn item_from_row(row: &Row<'_>) -> rusqlite::Result<InventoryItem> {
    let quantity: i64 = row.get(3)?;
    let min_stock: i64 = row.get(4)?;
    Ok(InventoryItem {
        id: row.get(0)?,
        name: row.get(1)?,
        category: row.get(2)?,
        quantity,
        min_stock,
        supplier: row.get(5)?,
        cost: row.get(6)?,
        is_low_stock: is_low_stock(quantity, min_stock),
        updated_at: row.get(7)?,
    })
}

pub fn insert_inventory_item(conn: &Connection, item: &NewInventoryItem) -> Result<InventoryItem, DatabaseError> {
    conn.execute(
        "INSERT INTO inventory_items (name, category, quantity, min_stock, supplier, cost, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            item.name.trim(),
            item.category,
            item.quantity,
            item.min_stock,
            item.supplier,
            item.cost,
            timestamp_now(),
        ],
    )?;
    get_inventory_item(conn, conn.last_insert_rowid())
}

pub fn get_inventory_item(conn: &Connection, id: i64) -> Result<InventoryItem, DatabaseError> {
    let sql = format!("{INVENTORY_SELECT} WHERE id = ?1");
    or_not_found(conn.query_row(&sql, params![id], item_from_row), "InventoryItem", id)
}

pub fn list_inventory(conn: &Connection, low_stock_only: bool) -> Result<Vec<InventoryItem>, DatabaseError> {
    let sql = format!("{INVENTORY_SELECT} WHERE (?1 = 0 OR quantity <= min_stock) ORDER BY name");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![low_stock_only], item_from_row)?;
    rows.map(|r| r.map_err(DatabaseError::from)).collect()
}

pub fn update_inventory_item(
    conn: &Connection,
    id: i64,
    update: &InventoryUpdate,
) -> Result<InventoryItem, DatabaseError> {
    let changed = conn.execute(
        "UPDATE inventory_items SET
            name = COALESCE(?2, name),
            category = COALESCE(?3, category),
            quantity = COALESCE(?4, quantity),
            min_stock = COALESCE(?5, min_stock),
            supplier = COALESCE(?6, supplier),
            cost = COALESCE(?7, cost),
            updated_at = ?8
         WHERE id = ?1",
        params![
            id,
            update.name.as_deref().map(str::trim),
            update.category,
            update.quantity,
            update.min_stock,
            update.supplier,
            update.cost,
            timestamp_now(),
        ],
    )?;
    expect_changed(changed, "InventoryItem", id)?;
    get_inventory_item(conn, id)
}

pub fn delete_inventory_item(conn: &Connection, id: i64) -> Result<(), DatabaseError> {
    let changed = conn.execute("DELETE FROM inventory_items WHERE id = ?1", params![id])?;
    expect_changed(changed, "InventoryItem", id)
}

/// Σ cost × quantity over all stock.
pub fn total_inventory_value(conn: &Connection) -> Result<f64, DatabaseError> {
    let total = conn.query_row(
        "SELECT COALESCE(SUM(cost * quantity), 0.0) FROM inventory_items",
        [],
        |row| row.get(0),
    )?;
    Ok(total)
}
