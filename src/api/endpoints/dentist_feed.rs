//! The `/notifications/` feed: entries for the dentist assigned to an
//! appointment. Clinic accounts only.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, AuthUser};
use crate::db;
use crate::models::{DentistNotification, UnreadCount};

/// `GET /api/notifications/`: newest first.
pub async fn list(State(ctx): State<ApiContext>, user: AuthUser) -> Result<Json<Vec<DentistNotification>>, ApiError> {
    let actor = user.require_clinic()?;
    let conn = ctx.core.open_db()?;
    Ok(Json(db::list_dentist_notifications(&conn, actor.user_id)?))
}

/// `GET /api/notifications/unread_count/`
pub async fn unread_count(State(ctx): State<ApiContext>, user: AuthUser) -> Result<Json<UnreadCount>, ApiError> {
    let actor = user.require_clinic()?;
    let conn = ctx.core.open_db()?;
    Ok(Json(UnreadCount {
        unread_count: db::count_unread_dentist_notifications(&conn, actor.user_id)?,
    }))
}

/// `POST /api/notifications/:id/mark_read/`
pub async fn mark_read(
    State(ctx): State<ApiContext>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<DentistNotification>, ApiError> {
    let actor = user.require_clinic()?;
    let conn = ctx.core.open_db()?;
    db::mark_dentist_notification_read(&conn, id, actor.user_id)?;
    Ok(Json(db::get_dentist_notification(&conn, id, actor.user_id)?))
}

/// `POST /api/notifications/mark_all_read/`
pub async fn mark_all_read(State(ctx): State<ApiContext>, user: AuthUser) -> Result<StatusCode, ApiError> {
    let actor = user.require_clinic()?;
    let conn = ctx.core.open_db()?;
    let marked = db::mark_all_dentist_notifications_read(&conn, actor.user_id)?;
    tracing::debug!(user_id = actor.user_id, marked, "Dentist feed marked read");
    Ok(StatusCode::NO_CONTENT)
}
