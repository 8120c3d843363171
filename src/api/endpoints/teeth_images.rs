//! Teeth photos. Each upload becomes the patient's latest image; the
//! patient records page shows the latest and the history.

use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::response::Response;
use axum::Json;
use rusqlite::{Connection, Transaction, TransactionBehavior};

use crate::api::endpoints::files::{
    discard_upload, file_response, read_upload_form, require_patient_account, PatientQuery,
};
use crate::api::error::ApiError;
use crate::api::types::{parse_id_param, ApiContext, AuthUser};
use crate::db::{self, DatabaseError};
use crate::models::{NewTeethImage, TeethImage};

/// Patient named by `?patient_id=`. Patients default to themselves;
/// clinic users must name one.
fn target_patient(user: &AuthUser, raw: Option<&str>) -> Result<i64, ApiError> {
    let patient = match parse_id_param("patient_id", raw)? {
        Some(id) => id,
        None if !user.0.is_clinic() => user.0.user_id,
        None => return Err(ApiError::BadRequest("patient_id parameter is required".into())),
    };
    user.require_patient_access(patient)?;
    Ok(patient)
}

/// `GET /api/teeth-images/?patient_id=`
pub async fn list(
    State(ctx): State<ApiContext>,
    user: AuthUser,
    Query(query): Query<PatientQuery>,
) -> Result<Json<Vec<TeethImage>>, ApiError> {
    let requested = parse_id_param("patient_id", query.patient_id.as_deref())?;
    let conn = ctx.core.open_db()?;
    Ok(Json(db::list_teeth_images(&conn, user.scope_patient(requested))?))
}

/// `GET /api/teeth-images/by_patient/?patient_id=`
pub async fn by_patient(
    State(ctx): State<ApiContext>,
    user: AuthUser,
    Query(query): Query<PatientQuery>,
) -> Result<Json<Vec<TeethImage>>, ApiError> {
    let patient = target_patient(&user, query.patient_id.as_deref())?;
    let conn = ctx.core.open_db()?;
    Ok(Json(db::list_teeth_images(&conn, Some(patient))?))
}

/// `GET /api/teeth-images/latest/?patient_id=`: 404 when the patient has
/// no images yet.
pub async fn latest(
    State(ctx): State<ApiContext>,
    user: AuthUser,
    Query(query): Query<PatientQuery>,
) -> Result<Json<TeethImage>, ApiError> {
    let patient = target_patient(&user, query.patient_id.as_deref())?;
    let conn = ctx.core.open_db()?;
    db::latest_teeth_image(&conn, patient)?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("No teeth images found for this patient".into()))
}

/// `POST /api/teeth-images/`: multipart fields `patient`, `image`, `notes`.
pub async fn upload(
    State(ctx): State<ApiContext>,
    user: AuthUser,
    multipart: Multipart,
) -> Result<(StatusCode, Json<TeethImage>), ApiError> {
    let actor = user.require_clinic()?.clone();
    let mut form = read_upload_form(multipart, "image").await?;

    let patient = form.patient()?;
    let image = form.take_file()?;
    if !image.content_type.starts_with("image/") {
        return Err(ApiError::BadRequest("Teeth images must be image files".into()));
    }

    let conn = ctx.core.open_db()?;
    require_patient_account(&conn, patient)?;

    let stored_name = ctx.core.store_upload(&image.file_name, &image.bytes)?;
    let new = NewTeethImage {
        patient,
        notes: form.text_or_empty("notes"),
        file_name: image.file_name,
        stored_name: stored_name.clone(),
        content_type: image.content_type,
        size_bytes: image.bytes.len() as i64,
        uploaded_by: Some(actor.user_id),
    };
    let saved = save_as_latest(&conn, &new).map_err(|e| {
        discard_upload(&ctx, &stored_name);
        ApiError::from(e)
    })?;
    tracing::info!(image_id = saved.id, patient, by = actor.user_id, "Teeth image uploaded");
    Ok((StatusCode::CREATED, Json(saved)))
}

fn save_as_latest(conn: &Connection, new: &NewTeethImage) -> Result<TeethImage, DatabaseError> {
    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;
    let saved = db::insert_teeth_image(&tx, new)?;
    tx.commit()?;
    Ok(saved)
}

fn visible_image(ctx: &ApiContext, user: &AuthUser, id: i64) -> Result<TeethImage, ApiError> {
    let conn = ctx.core.open_db()?;
    let image = db::get_teeth_image(&conn, id)?;
    if !user.0.can_access_patient(image.patient) {
        return Err(ApiError::NotFound("TeethImage not found".into()));
    }
    Ok(image)
}

/// `GET /api/teeth-images/:id/`
pub async fn detail(State(ctx): State<ApiContext>, user: AuthUser, Path(id): Path<i64>) -> Result<Json<TeethImage>, ApiError> {
    Ok(Json(visible_image(&ctx, &user, id)?))
}

/// `GET /api/teeth-images/:id/image/`: the bytes, served inline.
pub async fn image(State(ctx): State<ApiContext>, user: AuthUser, Path(id): Path<i64>) -> Result<Response, ApiError> {
    let image = visible_image(&ctx, &user, id)?;
    file_response(&ctx, &image.stored_name, &image.file_name, image.content_type, "inline")
}

/// `DELETE /api/teeth-images/:id/`: the next newest image becomes latest.
pub async fn delete(State(ctx): State<ApiContext>, user: AuthUser, Path(id): Path<i64>) -> Result<StatusCode, ApiError> {
    let actor = user.require_clinic()?;
    let conn = ctx.core.open_db()?;
    let tx = Transaction::new_unchecked(&conn, TransactionBehavior::Immediate).map_err(DatabaseError::from)?;
    let image = db::get_teeth_image(&tx, id)?;
    db::delete_teeth_image(&tx, id)?;
    tx.commit().map_err(DatabaseError::from)?;
    ctx.core.remove_upload(&image.stored_name)?;
    tracing::info!(image_id = id, by = actor.user_id, "Teeth image deleted");
    Ok(StatusCode::NO_CONTENT)
}
