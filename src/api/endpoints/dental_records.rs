//! Dental history entries. Patients read their own; staff write.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;

use crate::api::endpoints::documents::PatientFilter;
use crate::api::error::ApiError;
use crate::api::types::{parse_id_param, ApiContext, ApiJson, AuthUser};
use crate::db;
use crate::models::{DentalRecord, DentalRecordUpdate, NewDentalRecord};

/// `GET /api/dental-records/?patient=`
pub async fn list(
    State(ctx): State<ApiContext>,
    user: AuthUser,
    Query(query): Query<PatientFilter>,
) -> Result<Json<Vec<DentalRecord>>, ApiError> {
    let requested = parse_id_param("patient", query.patient.as_deref())?;
    let conn = ctx.core.open_db()?;
    Ok(Json(db::list_dental_records(&conn, user.scope_patient(requested))?))
}

/// `POST /api/dental-records/`
pub async fn create(
    State(ctx): State<ApiContext>,
    user: AuthUser,
    ApiJson(record): ApiJson<NewDentalRecord>,
) -> Result<(StatusCode, Json<DentalRecord>), ApiError> {
    let actor = user.require_clinic()?;
    if record.treatment.trim().is_empty() {
        return Err(ApiError::BadRequest("Treatment is required".into()));
    }
    let conn = ctx.core.open_db()?;
    let saved = db::insert_dental_record(&conn, &record, Some(actor.user_id))?;
    tracing::info!(record_id = saved.id, patient = saved.patient, by = actor.user_id, "Dental record created");
    Ok((StatusCode::CREATED, Json(saved)))
}

/// `GET /api/dental-records/:id/`
pub async fn detail(State(ctx): State<ApiContext>, user: AuthUser, Path(id): Path<i64>) -> Result<Json<DentalRecord>, ApiError> {
    let conn = ctx.core.open_db()?;
    let record = db::get_dental_record(&conn, id)?;
    if !user.0.can_access_patient(record.patient) {
        return Err(ApiError::NotFound("DentalRecord not found".into()));
    }
    Ok(Json(record))
}

/// `PATCH /api/dental-records/:id/`
pub async fn update(
    State(ctx): State<ApiContext>,
    user: AuthUser,
    Path(id): Path<i64>,
    ApiJson(update): ApiJson<DentalRecordUpdate>,
) -> Result<Json<DentalRecord>, ApiError> {
    user.require_clinic()?;
    if update.treatment.as_deref().is_some_and(|t| t.trim().is_empty()) {
        return Err(ApiError::BadRequest("Treatment cannot be empty".into()));
    }
    let conn = ctx.core.open_db()?;
    Ok(Json(db::update_dental_record(&conn, id, &update)?))
}

/// `DELETE /api/dental-records/:id/`
pub async fn delete(State(ctx): State<ApiContext>, user: AuthUser, Path(id): Path<i64>) -> Result<StatusCode, ApiError> {
    user.require_clinic()?;
    let conn = ctx.core.open_db()?;
    db::delete_dental_record(&conn, id)?;
    Ok(StatusCode::NO_CONTENT)
}
