//! Clinical documents (X-rays, scans, reports). Staff upload and delete;
//! patients list and download their own.

use std::str::FromStr;

use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::response::Response;
use axum::Json;
use serde::Deserialize;

use crate::api::endpoints::files::{discard_upload, file_response, read_upload_form, require_patient_account};
use crate::api::error::ApiError;
use crate::api::types::{parse_id_param, ApiContext, AuthUser};
use crate::db;
use crate::models::enums::DocumentType;
use crate::models::{Document, NewDocument};

/// `?patient=` narrowing for list endpoints.
#[derive(Debug, Deserialize)]
pub struct PatientFilter {
    pub patient: Option<String>,
}

/// `GET /api/documents/?patient=`
pub async fn list(
    State(ctx): State<ApiContext>,
    user: AuthUser,
    Query(query): Query<PatientFilter>,
) -> Result<Json<Vec<Document>>, ApiError> {
    let requested = parse_id_param("patient", query.patient.as_deref())?;
    let conn = ctx.core.open_db()?;
    Ok(Json(db::list_documents(&conn, user.scope_patient(requested))?))
}

/// `POST /api/documents/`: multipart fields `patient`, `document_type`,
/// `title`, `description`, `file`.
pub async fn upload(
    State(ctx): State<ApiContext>,
    user: AuthUser,
    multipart: Multipart,
) -> Result<(StatusCode, Json<Document>), ApiError> {
    let actor = user.require_clinic()?.clone();
    let mut form = read_upload_form(multipart, "file").await?;

    let patient = form.patient()?;
    let raw_type = form.text_or_empty("document_type");
    let document_type = DocumentType::from_str(&raw_type)
        .map_err(|_| ApiError::BadRequest(format!("Unknown document_type '{raw_type}'")))?;
    let title = form.text_or_empty("title");
    if title.is_empty() {
        return Err(ApiError::BadRequest("Title is required".into()));
    }
    let file = form.take_file()?;

    let conn = ctx.core.open_db()?;
    require_patient_account(&conn, patient)?;

    let stored_name = ctx.core.store_upload(&file.file_name, &file.bytes)?;
    let new = NewDocument {
        patient,
        document_type,
        title,
        description: form.text_or_empty("description"),
        file_name: file.file_name,
        stored_name: stored_name.clone(),
        content_type: file.content_type,
        size_bytes: file.bytes.len() as i64,
        uploaded_by: Some(actor.user_id),
    };
    let saved = db::insert_document(&conn, &new).map_err(|e| {
        discard_upload(&ctx, &stored_name);
        ApiError::from(e)
    })?;
    tracing::info!(document_id = saved.id, patient, kind = %saved.document_type, by = actor.user_id, "Document uploaded");
    Ok((StatusCode::CREATED, Json(saved)))
}

fn visible_document(ctx: &ApiContext, user: &AuthUser, id: i64) -> Result<Document, ApiError> {
    let conn = ctx.core.open_db()?;
    let doc = db::get_document(&conn, id)?;
    if !user.0.can_access_patient(doc.patient) {
        return Err(ApiError::NotFound("Document not found".into()));
    }
    Ok(doc)
}

/// `GET /api/documents/:id/`
pub async fn detail(State(ctx): State<ApiContext>, user: AuthUser, Path(id): Path<i64>) -> Result<Json<Document>, ApiError> {
    Ok(Json(visible_document(&ctx, &user, id)?))
}

/// `GET /api/documents/:id/download/`
pub async fn download(State(ctx): State<ApiContext>, user: AuthUser, Path(id): Path<i64>) -> Result<Response, ApiError> {
    let doc = visible_document(&ctx, &user, id)?;
    file_response(&ctx, &doc.stored_name, &doc.file_name, doc.content_type, "attachment")
}

/// `DELETE /api/documents/:id/`
pub async fn delete(State(ctx): State<ApiContext>, user: AuthUser, Path(id): Path<i64>) -> Result<StatusCode, ApiError> {
    let actor = user.require_clinic()?;
    let conn = ctx.core.open_db()?;
    let doc = db::get_document(&conn, id)?;
    db::delete_document(&conn, id)?;
    ctx.core.remove_upload(&doc.stored_name)?;
    tracing::info!(document_id = id, by = actor.user_id, "Document deleted");
    Ok(StatusCode::NO_CONTENT)
}
