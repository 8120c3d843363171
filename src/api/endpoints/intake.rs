//! Patient intake forms, one per patient. Patients fill in their own;
//! staff may file one on a patient's behalf.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;

use crate::api::endpoints::files::PatientQuery;
use crate::api::error::ApiError;
use crate::api::types::{parse_id_param, ApiContext, ApiJson, AuthUser};
use crate::db;
use crate::models::enums::UserType;
use crate::models::{IntakeForm, IntakeFormInput};

/// `GET /api/intake-forms/`
pub async fn list(State(ctx): State<ApiContext>, user: AuthUser) -> Result<Json<Vec<IntakeForm>>, ApiError> {
    let conn = ctx.core.open_db()?;
    Ok(Json(db::list_intake_forms(&conn, user.scope_patient(None))?))
}

/// `GET /api/intake-forms/by_patient/?patient_id=`: 404 when the patient
/// has not filled one in.
pub async fn by_patient(
    State(ctx): State<ApiContext>,
    user: AuthUser,
    Query(query): Query<PatientQuery>,
) -> Result<Json<IntakeForm>, ApiError> {
    let patient = parse_id_param("patient_id", query.patient_id.as_deref())?
        .ok_or_else(|| ApiError::BadRequest("patient_id parameter is required".into()))?;
    user.require_patient_access(patient)?;
    let conn = ctx.core.open_db()?;
    db::find_intake_form_for_patient(&conn, patient)?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("IntakeForm not found".into()))
}

/// `POST /api/intake-forms/`: patients file for themselves; staff must
/// name the patient.
pub async fn create(
    State(ctx): State<ApiContext>,
    user: AuthUser,
    ApiJson(input): ApiJson<IntakeFormInput>,
) -> Result<(StatusCode, Json<IntakeForm>), ApiError> {
    let patient = if user.0.is_clinic() {
        input
            .patient
            .ok_or_else(|| ApiError::BadRequest("patient is required".into()))?
    } else {
        user.0.user_id
    };
    let conn = ctx.core.open_db()?;
    if db::get_user(&conn, patient)?.user_type != UserType::Patient {
        return Err(ApiError::BadRequest("Intake forms belong to patients".into()));
    }
    match db::insert_intake_form(&conn, patient, &input) {
        Ok(form) => Ok((StatusCode::CREATED, Json(form))),
        Err(e) if e.is_constraint() => Err(ApiError::Conflict(
            "This patient already has an intake form".into(),
        )),
        Err(e) => Err(e.into()),
    }
}

fn visible_form(conn: &rusqlite::Connection, user: &AuthUser, id: i64) -> Result<IntakeForm, ApiError> {
    let form = db::get_intake_form(conn, id)?;
    if !user.0.can_access_patient(form.patient) {
        return Err(ApiError::NotFound("IntakeForm not found".into()));
    }
    Ok(form)
}

/// `GET /api/intake-forms/:id/`
pub async fn detail(State(ctx): State<ApiContext>, user: AuthUser, Path(id): Path<i64>) -> Result<Json<IntakeForm>, ApiError> {
    let conn = ctx.core.open_db()?;
    Ok(Json(visible_form(&conn, &user, id)?))
}

/// `PUT|PATCH /api/intake-forms/:id/`: replaces the answers.
pub async fn update(
    State(ctx): State<ApiContext>,
    user: AuthUser,
    Path(id): Path<i64>,
    ApiJson(input): ApiJson<IntakeFormInput>,
) -> Result<Json<IntakeForm>, ApiError> {
    let conn = ctx.core.open_db()?;
    visible_form(&conn, &user, id)?;
    Ok(Json(db::update_intake_form(&conn, id, &input)?))
}

/// `DELETE /api/intake-forms/:id/`
pub async fn delete(State(ctx): State<ApiContext>, user: AuthUser, Path(id): Path<i64>) -> Result<StatusCode, ApiError> {
    user.require_clinic()?;
    let conn = ctx.core.open_db()?;
    db::delete_intake_form(&conn, id)?;
    Ok(StatusCode::NO_CONTENT)
}
