//! Service catalogue endpoints. Listing is public; changes need staff.

use std::str::FromStr;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, ApiJson, AuthUser};
use crate::db;
use crate::models::enums::ServiceCategory;
use crate::models::{NewService, Service, ServiceUpdate};

#[derive(Debug, Deserialize)]
pub struct CategoryQuery {
    pub category: Option<String>,
}

fn parse_category(raw: Option<&str>) -> Result<Option<ServiceCategory>, ApiError> {
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| ServiceCategory::from_str(s).map_err(|_| ApiError::BadRequest(format!("Unknown category '{s}'"))))
        .transpose()
}

/// `GET /api/services/?category=`
pub async fn list(
    State(ctx): State<ApiContext>,
    Query(query): Query<CategoryQuery>,
) -> Result<Json<Vec<Service>>, ApiError> {
    let category = parse_category(query.category.as_deref())?;
    let conn = ctx.core.open_db()?;
    Ok(Json(db::list_services(&conn, category)?))
}

/// `GET /api/services/by_category/?category=`: category is required.
pub async fn by_category(
    State(ctx): State<ApiContext>,
    Query(query): Query<CategoryQuery>,
) -> Result<Json<Vec<Service>>, ApiError> {
    let category = parse_category(query.category.as_deref())?
        .ok_or_else(|| ApiError::BadRequest("category parameter is required".into()))?;
    let conn = ctx.core.open_db()?;
    Ok(Json(db::list_services(&conn, Some(category))?))
}

/// `GET /api/services/:id/`
pub async fn detail(State(ctx): State<ApiContext>, Path(id): Path<i64>) -> Result<Json<Service>, ApiError> {
    let conn = ctx.core.open_db()?;
    Ok(Json(db::get_service(&conn, id)?))
}

/// `POST /api/services/`
pub async fn create(
    State(ctx): State<ApiContext>,
    user: AuthUser,
    ApiJson(new): ApiJson<NewService>,
) -> Result<(StatusCode, Json<Service>), ApiError> {
    user.require_clinic()?;
    if new.name.trim().is_empty() {
        return Err(ApiError::BadRequest("Service name is required".into()));
    }
    let conn = ctx.core.open_db()?;
    Ok((StatusCode::CREATED, Json(db::insert_service(&conn, &new)?)))
}

/// `PATCH /api/services/:id/`
pub async fn update(
    State(ctx): State<ApiContext>,
    user: AuthUser,
    Path(id): Path<i64>,
    ApiJson(update): ApiJson<ServiceUpdate>,
) -> Result<Json<Service>, ApiError> {
    user.require_clinic()?;
    let conn = ctx.core.open_db()?;
    Ok(Json(db::update_service(&conn, id, &update)?))
}

/// `DELETE /api/services/:id/`
pub async fn delete(
    State(ctx): State<ApiContext>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    user.require_clinic()?;
    let conn = ctx.core.open_db()?;
    db::delete_service(&conn, id)?;
    Ok(StatusCode::NO_CONTENT)
}
