//! Inventory endpoints (clinic only).

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, ApiJson, AuthUser};
use crate::db;
use crate::models::{InventoryItem, InventoryUpdate, NewInventoryItem};

fn validate_amounts(quantity: Option<i64>, min_stock: Option<i64>, cost: Option<f64>) -> Result<(), ApiError> {
    if quantity.is_some_and(|q| q < 0) || min_stock.is_some_and(|m| m < 0) {
        return Err(ApiError::BadRequest("Quantities cannot be negative".into()));
    }
    if cost.is_some_and(|c| c < 0.0 || !c.is_finite()) {
        return Err(ApiError::BadRequest("Cost must be a non-negative number".into()));
    }
    Ok(())
}

/// `GET /api/inventory/`
pub async fn list(State(ctx): State<ApiContext>, user: AuthUser) -> Result<Json<Vec<InventoryItem>>, ApiError> {
    user.require_clinic()?;
    let conn = ctx.core.open_db()?;
    Ok(Json(db::list_inventory(&conn, false)?))
}

/// `GET /api/inventory/low_stock/`: items at or below their minimum.
pub async fn low_stock(State(ctx): State<ApiContext>, user: AuthUser) -> Result<Json<Vec<InventoryItem>>, ApiError> {
    user.require_clinic()?;
    let conn = ctx.core.open_db()?;
    Ok(Json(db::list_inventory(&conn, true)?))
}

/// `POST /api/inventory/`
pub async fn create(
    State(ctx): State<ApiContext>,
    user: AuthUser,
    ApiJson(item): ApiJson<NewInventoryItem>,
) -> Result<(StatusCode, Json<InventoryItem>), ApiError> {
    user.require_clinic()?;
    if item.name.trim().is_empty() {
        return Err(ApiError::BadRequest("Item name is required".into()));
    }
    validate_amounts(Some(item.quantity), Some(item.min_stock), Some(item.cost))?;
    let conn = ctx.core.open_db()?;
    Ok((StatusCode::CREATED, Json(db::insert_inventory_item(&conn, &item)?)))
}

/// `GET /api/inventory/:id/`
pub async fn detail(
    State(ctx): State<ApiContext>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<InventoryItem>, ApiError> {
    user.require_clinic()?;
    let conn = ctx.core.open_db()?;
    Ok(Json(db::get_inventory_item(&conn, id)?))
}

/// `PATCH /api/inventory/:id/`
pub async fn update(
    State(ctx): State<ApiContext>,
    user: AuthUser,
    Path(id): Path<i64>,
    ApiJson(update): ApiJson<InventoryUpdate>,
) -> Result<Json<InventoryItem>, ApiError> {
    user.require_clinic()?;
    validate_amounts(update.quantity, update.min_stock, update.cost)?;
    let conn = ctx.core.open_db()?;
    Ok(Json(db::update_inventory_item(&conn, id, &update)?))
}

/// `DELETE /api/inventory/:id/`
pub async fn delete(
    State(ctx): State<ApiContext>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    user.require_clinic()?;
    let conn = ctx.core.open_db()?;
    db::delete_inventory_item(&conn, id)?;
    Ok(StatusCode::NO_CONTENT)
}
