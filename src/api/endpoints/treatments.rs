//! Treatment assignments. Patients may read their own plan; staff write.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;

use crate::api::endpoints::files::PatientQuery;
use crate::api::error::ApiError;
use crate::api::types::{parse_id_param, ApiContext, ApiJson, AuthUser};
use crate::db;
use crate::models::{NewTreatmentAssignment, TreatmentAssignment, TreatmentStatusUpdate, TreatmentUpdate};

fn check_dates(start: Option<chrono::NaiveDate>, end: Option<chrono::NaiveDate>) -> Result<(), ApiError> {
    match (start, end) {
        (Some(s), Some(e)) if e < s => Err(ApiError::BadRequest("end_date is before start_date".into())),
        _ => Ok(()),
    }
}

/// `GET /api/treatment-assignments/`
pub async fn list(State(ctx): State<ApiContext>, user: AuthUser) -> Result<Json<Vec<TreatmentAssignment>>, ApiError> {
    let conn = ctx.core.open_db()?;
    Ok(Json(db::list_treatments(&conn, user.scope_patient(None))?))
}

/// `GET /api/treatment-assignments/by_patient/?patient_id=`
pub async fn by_patient(
    State(ctx): State<ApiContext>,
    user: AuthUser,
    Query(query): Query<PatientQuery>,
) -> Result<Json<Vec<TreatmentAssignment>>, ApiError> {
    let patient = parse_id_param("patient_id", query.patient_id.as_deref())?
        .ok_or_else(|| ApiError::BadRequest("patient_id parameter is required".into()))?;
    user.require_patient_access(patient)?;
    let conn = ctx.core.open_db()?;
    Ok(Json(db::list_treatments(&conn, Some(patient))?))
}

/// `POST /api/treatment-assignments/`
pub async fn create(
    State(ctx): State<ApiContext>,
    user: AuthUser,
    ApiJson(new): ApiJson<NewTreatmentAssignment>,
) -> Result<(StatusCode, Json<TreatmentAssignment>), ApiError> {
    let actor = user.require_clinic()?;
    if new.title.trim().is_empty() {
        return Err(ApiError::BadRequest("Title is required".into()));
    }
    check_dates(new.start_date, new.end_date)?;
    let conn = ctx.core.open_db()?;
    Ok((StatusCode::CREATED, Json(db::insert_treatment(&conn, &new, Some(actor.user_id))?)))
}

/// `GET /api/treatment-assignments/:id/`
pub async fn detail(
    State(ctx): State<ApiContext>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<TreatmentAssignment>, ApiError> {
    let conn = ctx.core.open_db()?;
    let treatment = db::get_treatment(&conn, id)?;
    if !user.0.can_access_patient(treatment.patient) {
        return Err(ApiError::NotFound("TreatmentAssignment not found".into()));
    }
    Ok(Json(treatment))
}

/// `PATCH /api/treatment-assignments/:id/`
pub async fn update(
    State(ctx): State<ApiContext>,
    user: AuthUser,
    Path(id): Path<i64>,
    ApiJson(update): ApiJson<TreatmentUpdate>,
) -> Result<Json<TreatmentAssignment>, ApiError> {
    user.require_clinic()?;
    let conn = ctx.core.open_db()?;
    let current = db::get_treatment(&conn, id)?;
    check_dates(update.start_date.or(current.start_date), update.end_date.or(current.end_date))?;
    Ok(Json(db::update_treatment(&conn, id, &update)?))
}

/// `PATCH /api/treatment-assignments/:id/update_status/`
pub async fn update_status(
    State(ctx): State<ApiContext>,
    user: AuthUser,
    Path(id): Path<i64>,
    ApiJson(update): ApiJson<TreatmentStatusUpdate>,
) -> Result<Json<TreatmentAssignment>, ApiError> {
    let actor = user.require_clinic()?;
    let conn = ctx.core.open_db()?;
    let treatment = db::update_treatment_status(&conn, id, update.status)?;
    tracing::info!(treatment_id = id, status = %update.status, by = actor.user_id, "Treatment status changed");
    Ok(Json(treatment))
}

/// `DELETE /api/treatment-assignments/:id/`
pub async fn delete(State(ctx): State<ApiContext>, user: AuthUser, Path(id): Path<i64>) -> Result<StatusCode, ApiError> {
    user.require_clinic()?;
    let conn = ctx.core.open_db()?;
    db::delete_treatment(&conn, id)?;
    Ok(StatusCode::NO_CONTENT)
}
