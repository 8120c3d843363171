//! Clinical notes. Patients may read their own; staff write.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;

use crate::api::endpoints::files::PatientQuery;
use crate::api::error::ApiError;
use crate::api::types::{parse_id_param, ApiContext, ApiJson, AuthUser};
use crate::db;
use crate::models::{ClinicalNote, ClinicalNoteUpdate, NewClinicalNote};

/// `GET /api/clinical-notes/`
pub async fn list(State(ctx): State<ApiContext>, user: AuthUser) -> Result<Json<Vec<ClinicalNote>>, ApiError> {
    let conn = ctx.core.open_db()?;
    Ok(Json(db::list_clinical_notes(&conn, user.scope_patient(None))?))
}

/// `GET /api/clinical-notes/by_patient/?patient_id=`
pub async fn by_patient(
    State(ctx): State<ApiContext>,
    user: AuthUser,
    Query(query): Query<PatientQuery>,
) -> Result<Json<Vec<ClinicalNote>>, ApiError> {
    let patient = parse_id_param("patient_id", query.patient_id.as_deref())?
        .ok_or_else(|| ApiError::BadRequest("patient_id parameter is required".into()))?;
    user.require_patient_access(patient)?;
    let conn = ctx.core.open_db()?;
    Ok(Json(db::list_clinical_notes(&conn, Some(patient))?))
}

/// `POST /api/clinical-notes/`
pub async fn create(
    State(ctx): State<ApiContext>,
    user: AuthUser,
    ApiJson(note): ApiJson<NewClinicalNote>,
) -> Result<(StatusCode, Json<ClinicalNote>), ApiError> {
    let actor = user.require_clinic()?;
    if note.treatment.trim().is_empty() {
        return Err(ApiError::BadRequest("Treatment is required".into()));
    }
    let conn = ctx.core.open_db()?;
    Ok((StatusCode::CREATED, Json(db::insert_clinical_note(&conn, &note, Some(actor.user_id))?)))
}

/// `GET /api/clinical-notes/:id/`
pub async fn detail(State(ctx): State<ApiContext>, user: AuthUser, Path(id): Path<i64>) -> Result<Json<ClinicalNote>, ApiError> {
    let conn = ctx.core.open_db()?;
    let note = db::get_clinical_note(&conn, id)?;
    if !user.0.can_access_patient(note.patient) {
        return Err(ApiError::NotFound("ClinicalNote not found".into()));
    }
    Ok(Json(note))
}

/// `PATCH /api/clinical-notes/:id/`
pub async fn update(
    State(ctx): State<ApiContext>,
    user: AuthUser,
    Path(id): Path<i64>,
    ApiJson(update): ApiJson<ClinicalNoteUpdate>,
) -> Result<Json<ClinicalNote>, ApiError> {
    user.require_clinic()?;
    let conn = ctx.core.open_db()?;
    Ok(Json(db::update_clinical_note(&conn, id, &update)?))
}

/// `DELETE /api/clinical-notes/:id/`
pub async fn delete(State(ctx): State<ApiContext>, user: AuthUser, Path(id): Path<i64>) -> Result<StatusCode, ApiError> {
    user.require_clinic()?;
    let conn = ctx.core.open_db()?;
    db::delete_clinical_note(&conn, id)?;
    Ok(StatusCode::NO_CONTENT)
}
