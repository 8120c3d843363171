//! Appointment notifications for clinic users. Read state is per
//! recipient; patients simply have none.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, AuthUser};
use crate::db;
use crate::models::{AppointmentNotification, UnreadCount};

/// `GET /api/appointment-notifications/`: newest first.
pub async fn list(
    State(ctx): State<ApiContext>,
    AuthUser(actor): AuthUser,
) -> Result<Json<Vec<AppointmentNotification>>, ApiError> {
    let conn = ctx.core.open_db()?;
    Ok(Json(db::list_notifications(&conn, actor.user_id)?))
}

/// `GET /api/appointment-notifications/unread_count/`
pub async fn unread_count(State(ctx): State<ApiContext>, AuthUser(actor): AuthUser) -> Result<Json<UnreadCount>, ApiError> {
    let conn = ctx.core.open_db()?;
    Ok(Json(UnreadCount {
        unread_count: db::count_unread(&conn, actor.user_id)?,
    }))
}

/// `POST /api/appointment-notifications/:id/mark_read/`: idempotent.
pub async fn mark_read(
    State(ctx): State<ApiContext>,
    AuthUser(actor): AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<AppointmentNotification>, ApiError> {
    let conn = ctx.core.open_db()?;
    db::mark_notification_read(&conn, id, actor.user_id)?;
    Ok(Json(db::get_notification(&conn, id, actor.user_id)?))
}

/// `POST /api/appointment-notifications/mark_all_read/`
pub async fn mark_all_read(State(ctx): State<ApiContext>, AuthUser(actor): AuthUser) -> Result<StatusCode, ApiError> {
    let conn = ctx.core.open_db()?;
    let marked = db::mark_all_notifications_read(&conn, actor.user_id)?;
    tracing::debug!(user_id = actor.user_id, marked, "Notifications marked read");
    Ok(StatusCode::NO_CONTENT)
}
