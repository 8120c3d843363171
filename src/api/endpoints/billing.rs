//! Billing endpoints. Patients see their own bills; staff manage all.

use std::str::FromStr;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use crate::api::error::ApiError;
use crate::api::types::{parse_id_param, ApiContext, ApiJson, AuthUser};
use crate::db;
use crate::models::enums::{BillingStatus, UserType};
use crate::models::{Billing, BillingStatusUpdate, NewBilling};

#[derive(Debug, Deserialize)]
pub struct BillingQuery {
    pub status: Option<String>,
    pub patient_id: Option<String>,
}

/// `GET /api/billing/?status=&patient_id=`
pub async fn list(
    State(ctx): State<ApiContext>,
    user: AuthUser,
    Query(query): Query<BillingQuery>,
) -> Result<Json<Vec<Billing>>, ApiError> {
    let status = query
        .status
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| BillingStatus::from_str(s).map_err(|_| ApiError::BadRequest(format!("Unknown status '{s}'"))))
        .transpose()?;
    let patient = user.scope_patient(parse_id_param("patient_id", query.patient_id.as_deref())?);
    let conn = ctx.core.open_db()?;
    Ok(Json(db::list_billings(&conn, patient, status)?))
}

/// `POST /api/billing/`
pub async fn create(
    State(ctx): State<ApiContext>,
    user: AuthUser,
    ApiJson(new): ApiJson<NewBilling>,
) -> Result<(StatusCode, Json<Billing>), ApiError> {
    let actor = user.require_clinic()?;
    if !(new.amount.is_finite() && new.amount >= 0.0) {
        return Err(ApiError::BadRequest("Amount must be a non-negative number".into()));
    }
    let conn = ctx.core.open_db()?;
    if db::get_user(&conn, new.patient)?.user_type != UserType::Patient {
        return Err(ApiError::BadRequest("Bills can only be issued to patients".into()));
    }
    let billing = db::insert_billing(&conn, &new, Some(actor.user_id))?;
    tracing::info!(billing_id = billing.id, patient = billing.patient, by = actor.user_id, "Billing created");
    Ok((StatusCode::CREATED, Json(billing)))
}

/// `GET /api/billing/:id/`
pub async fn detail(
    State(ctx): State<ApiContext>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<Billing>, ApiError> {
    let conn = ctx.core.open_db()?;
    let billing = db::get_billing(&conn, id)?;
    if !user.0.can_access_patient(billing.patient) {
        return Err(ApiError::NotFound("Billing not found".into()));
    }
    Ok(Json(billing))
}

/// `PATCH /api/billing/:id/update_status/`
pub async fn update_status(
    State(ctx): State<ApiContext>,
    user: AuthUser,
    Path(id): Path<i64>,
    ApiJson(update): ApiJson<BillingStatusUpdate>,
) -> Result<Json<Billing>, ApiError> {
    let actor = user.require_clinic()?;
    let conn = ctx.core.open_db()?;
    let billing = db::update_billing_status(&conn, id, update.status)?;
    tracing::info!(billing_id = id, status = %update.status, by = actor.user_id, "Billing status changed");
    Ok(Json(billing))
}

/// `DELETE /api/billing/:id/`
pub async fn delete(
    State(ctx): State<ApiContext>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    user.require_clinic()?;
    let conn = ctx.core.open_db()?;
    db::delete_billing(&conn, id)?;
    Ok(StatusCode::NO_CONTENT)
}
