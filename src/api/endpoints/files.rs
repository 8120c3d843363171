//! Patient file attachments: multipart upload, listing, download, delete.
//!
//! Bytes live in the upload directory under a generated name; the
//! `file_attachments` row keeps the original name and metadata.

use std::collections::HashMap;
use std::str::FromStr;

use axum::extract::{Multipart, Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;

use crate::api::error::ApiError;
use crate::api::types::{parse_id_param, ApiContext, AuthUser};
use crate::config::MAX_UPLOAD_BYTES;
use crate::db;
use crate::models::enums::{FileType, UserType};
use crate::models::{FileAttachment, NewFileAttachment};

#[derive(Debug, Deserialize)]
pub struct PatientQuery {
    pub patient_id: Option<String>,
}

/// `GET /api/file-attachments/`
pub async fn list(State(ctx): State<ApiContext>, user: AuthUser) -> Result<Json<Vec<FileAttachment>>, ApiError> {
    let conn = ctx.core.open_db()?;
    Ok(Json(db::list_file_attachments(&conn, user.scope_patient(None))?))
}

/// `GET /api/file-attachments/by_patient/?patient_id=`
pub async fn by_patient(
    State(ctx): State<ApiContext>,
    user: AuthUser,
    Query(query): Query<PatientQuery>,
) -> Result<Json<Vec<FileAttachment>>, ApiError> {
    let patient = parse_id_param("patient_id", query.patient_id.as_deref())?
        .ok_or_else(|| ApiError::BadRequest("patient_id parameter is required".into()))?;
    user.require_patient_access(patient)?;
    let conn = ctx.core.open_db()?;
    Ok(Json(db::list_file_attachments(&conn, Some(patient))?))
}

/// A file part that passed the size checks, with its content type
/// resolved.
pub(crate) struct UploadedFile {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Text fields of a multipart form plus its single file part.
#[derive(Default)]
pub(crate) struct UploadForm {
    fields: HashMap<String, String>,
    file: Option<(String, Option<String>, Vec<u8>)>,
}

impl UploadForm {
    pub(crate) fn text(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    /// Trimmed text field, empty when absent.
    pub(crate) fn text_or_empty(&self, name: &str) -> String {
        self.text(name).map(str::trim).unwrap_or("").to_string()
    }

    pub(crate) fn patient(&self) -> Result<i64, ApiError> {
        parse_id_param("patient", self.text("patient"))?
            .ok_or_else(|| ApiError::BadRequest("patient is required".into()))
    }

    /// Validate the file part: present, non-empty, within `MAX_UPLOAD_BYTES`.
    pub(crate) fn take_file(&mut self) -> Result<UploadedFile, ApiError> {
        let (file_name, content_type, bytes) = self
            .file
            .take()
            .ok_or_else(|| ApiError::BadRequest("No file provided".into()))?;
        if bytes.is_empty() {
            return Err(ApiError::BadRequest("Uploaded file is empty".into()));
        }
        if bytes.len() > MAX_UPLOAD_BYTES {
            return Err(ApiError::BadRequest(format!(
                "File too large. Maximum {}MB.",
                MAX_UPLOAD_BYTES / (1024 * 1024)
            )));
        }
        let content_type = content_type
            .filter(|ct| ct != "application/octet-stream")
            .unwrap_or_else(|| mime_guess::from_path(&file_name).first_or_octet_stream().to_string());
        Ok(UploadedFile {
            file_name,
            content_type,
            bytes,
        })
    }
}

/// Collect a multipart body. `file_field` names the part holding the
/// bytes; every other part is read as text.
pub(crate) async fn read_upload_form(mut multipart: Multipart, file_field: &str) -> Result<UploadForm, ApiError> {
    let mut form = UploadForm::default();
    let bad = |e: axum::extract::multipart::MultipartError| ApiError::BadRequest(format!("Malformed upload: {e}"));

    while let Some(field) = multipart.next_field().await.map_err(bad)? {
        let name = field.name().unwrap_or("").to_string();
        if name == file_field {
            let file_name = field.file_name().unwrap_or("upload").to_string();
            let content_type = field.content_type().map(str::to_string);
            let bytes = field.bytes().await.map_err(bad)?;
            form.file = Some((file_name, content_type, bytes.to_vec()));
        } else if !name.is_empty() {
            let value = field.text().await.map_err(bad)?;
            form.fields.insert(name, value);
        }
    }
    Ok(form)
}

/// Uploads attach to patient accounts only.
pub(crate) fn require_patient_account(conn: &rusqlite::Connection, patient: i64) -> Result<(), ApiError> {
    if db::get_user(conn, patient)?.user_type != UserType::Patient {
        return Err(ApiError::BadRequest("Files can only be attached to patients".into()));
    }
    Ok(())
}

/// Remove stored bytes whose row could not be written.
pub(crate) fn discard_upload(ctx: &ApiContext, stored_name: &str) {
    if let Err(cleanup) = ctx.core.remove_upload(stored_name) {
        tracing::warn!(error = %cleanup, "Could not remove orphaned upload");
    }
}

/// Serve stored bytes with their original name.
pub(crate) fn file_response(
    ctx: &ApiContext,
    stored_name: &str,
    file_name: &str,
    content_type: String,
    disposition: &str,
) -> Result<Response, ApiError> {
    let bytes = ctx.core.read_upload(stored_name)?;
    let disposition = format!("{disposition}; filename=\"{}\"", file_name.replace(['"', '\\'], "_"));
    Ok((
        [
            (header::CONTENT_TYPE, content_type),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    )
        .into_response())
}

/// `POST /api/file-attachments/`: multipart fields `patient`,
/// `file_type`, `title`, `description`, `file`.
pub async fn upload(
    State(ctx): State<ApiContext>,
    user: AuthUser,
    multipart: Multipart,
) -> Result<(StatusCode, Json<FileAttachment>), ApiError> {
    let actor = user.require_clinic()?.clone();
    let mut form = read_upload_form(multipart, "file").await?;

    let patient = form.patient()?;
    let file_type = match form.text("file_type").map(str::trim).filter(|s| !s.is_empty()) {
        Some(raw) => FileType::from_str(raw).map_err(|_| ApiError::BadRequest(format!("Unknown file_type '{raw}'")))?,
        None => FileType::Other,
    };
    let file = form.take_file()?;

    let conn = ctx.core.open_db()?;
    require_patient_account(&conn, patient)?;

    let stored_name = ctx.core.store_upload(&file.file_name, &file.bytes)?;
    let title = match form.text_or_empty("title") {
        t if t.is_empty() => file.file_name.clone(),
        t => t,
    };
    let new = NewFileAttachment {
        patient,
        file_type,
        title,
        description: form.text("description").unwrap_or("").to_string(),
        file_name: file.file_name,
        stored_name: stored_name.clone(),
        content_type: file.content_type,
        size_bytes: file.bytes.len() as i64,
        uploaded_by: Some(actor.user_id),
    };
    let saved = db::insert_file_attachment(&conn, &new).map_err(|e| {
        discard_upload(&ctx, &stored_name);
        ApiError::from(e)
    })?;
    tracing::info!(file_id = saved.id, patient, size = saved.size_bytes, by = actor.user_id, "File uploaded");
    Ok((StatusCode::CREATED, Json(saved)))
}

fn visible_file(ctx: &ApiContext, user: &AuthUser, id: i64) -> Result<FileAttachment, ApiError> {
    let conn = ctx.core.open_db()?;
    let file = db::get_file_attachment(&conn, id)?;
    if !user.0.can_access_patient(file.patient) {
        return Err(ApiError::NotFound("FileAttachment not found".into()));
    }
    Ok(file)
}

/// `GET /api/file-attachments/:id/`
pub async fn detail(State(ctx): State<ApiContext>, user: AuthUser, Path(id): Path<i64>) -> Result<Json<FileAttachment>, ApiError> {
    Ok(Json(visible_file(&ctx, &user, id)?))
}

/// `GET /api/file-attachments/:id/download/`
pub async fn download(State(ctx): State<ApiContext>, user: AuthUser, Path(id): Path<i64>) -> Result<Response, ApiError> {
    let file = visible_file(&ctx, &user, id)?;
    file_response(&ctx, &file.stored_name, &file.file_name, file.content_type, "attachment")
}

/// `DELETE /api/file-attachments/:id/`
pub async fn delete(State(ctx): State<ApiContext>, user: AuthUser, Path(id): Path<i64>) -> Result<StatusCode, ApiError> {
    let actor = user.require_clinic()?;
    let conn = ctx.core.open_db()?;
    let file = db::get_file_attachment(&conn, id)?;
    db::delete_file_attachment(&conn, id)?;
    ctx.core.remove_upload(&file.stored_name)?;
    tracing::info!(file_id = id, by = actor.user_id, "File deleted");
    Ok(StatusCode::NO_CONTENT)
}
