//! Appointment endpoints: booking, views, patient requests and staff
//! decisions. Status rules live in `crate::appointment`.

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use crate::api::endpoints::optional_body;
use crate::api::error::ApiError;
use crate::api::types::{parse_id_param, ApiContext, ApiJson, AuthUser};
use crate::appointment::{self, AppointmentView};
use crate::db;
use crate::models::{
    Appointment, AppointmentUpdate, BookedSlot, CancelRequest, CompletionNote, NewAppointment,
    RescheduleProposal,
};

type AppointmentResult = Result<Json<Appointment>, ApiError>;

fn list_view(ctx: &ApiContext, user: &AuthUser, view: AppointmentView) -> Result<Json<Vec<Appointment>>, ApiError> {
    let conn = ctx.core.open_db()?;
    Ok(Json(appointment::list_for(&conn, &user.0, view, ctx.core.today())?))
}

/// `GET /api/appointments/`
pub async fn list(State(ctx): State<ApiContext>, user: AuthUser) -> Result<Json<Vec<Appointment>>, ApiError> {
    list_view(&ctx, &user, AppointmentView::All)
}

/// `GET /api/appointments/today/`
pub async fn today(State(ctx): State<ApiContext>, user: AuthUser) -> Result<Json<Vec<Appointment>>, ApiError> {
    list_view(&ctx, &user, AppointmentView::Today)
}

/// `GET /api/appointments/upcoming/`
pub async fn upcoming(State(ctx): State<ApiContext>, user: AuthUser) -> Result<Json<Vec<Appointment>>, ApiError> {
    list_view(&ctx, &user, AppointmentView::Upcoming)
}

#[derive(Debug, Deserialize)]
pub struct BookedSlotsQuery {
    pub dentist: Option<String>,
}

/// `GET /api/appointments/booked_slots/?dentist=`: occupied slots from
/// today on. Carries no patient identity.
pub async fn booked_slots(
    State(ctx): State<ApiContext>,
    _user: AuthUser,
    Query(query): Query<BookedSlotsQuery>,
) -> Result<Json<Vec<BookedSlot>>, ApiError> {
    let dentist = parse_id_param("dentist", query.dentist.as_deref())?;
    let conn = ctx.core.open_db()?;
    Ok(Json(db::booked_slots(&conn, ctx.core.today(), dentist)?))
}

/// `POST /api/appointments/`
pub async fn create(
    State(ctx): State<ApiContext>,
    AuthUser(actor): AuthUser,
    ApiJson(request): ApiJson<NewAppointment>,
) -> Result<(StatusCode, Json<Appointment>), ApiError> {
    let conn = ctx.core.open_db()?;
    let appt = appointment::create_appointment(&conn, &actor, &request)?;
    Ok((StatusCode::CREATED, Json(appt)))
}

/// `GET /api/appointments/:id/`
pub async fn detail(State(ctx): State<ApiContext>, AuthUser(actor): AuthUser, Path(id): Path<i64>) -> AppointmentResult {
    let conn = ctx.core.open_db()?;
    Ok(Json(appointment::fetch_for(&conn, &actor, id)?))
}

/// `PATCH /api/appointments/:id/`: staff edit of status, date, time, notes.
pub async fn update(
    State(ctx): State<ApiContext>,
    AuthUser(actor): AuthUser,
    Path(id): Path<i64>,
    ApiJson(update): ApiJson<AppointmentUpdate>,
) -> AppointmentResult {
    let conn = ctx.core.open_db()?;
    Ok(Json(appointment::apply_staff_edit(&conn, &actor, id, &update)?))
}

/// `DELETE /api/appointments/:id/`
pub async fn delete(
    State(ctx): State<ApiContext>,
    AuthUser(actor): AuthUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    let conn = ctx.core.open_db()?;
    appointment::delete_appointment(&conn, &actor, id)?;
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /api/appointments/:id/request_reschedule/`
pub async fn request_reschedule(
    State(ctx): State<ApiContext>,
    AuthUser(actor): AuthUser,
    Path(id): Path<i64>,
    ApiJson(proposal): ApiJson<RescheduleProposal>,
) -> AppointmentResult {
    let conn = ctx.core.open_db()?;
    Ok(Json(appointment::request_reschedule(&conn, &actor, id, &proposal)?))
}

/// `POST /api/appointments/:id/request_cancel/`: body `{reason}` is optional.
pub async fn request_cancel(
    State(ctx): State<ApiContext>,
    AuthUser(actor): AuthUser,
    Path(id): Path<i64>,
    body: Bytes,
) -> AppointmentResult {
    let request: CancelRequest = optional_body(&body)?;
    let conn = ctx.core.open_db()?;
    Ok(Json(appointment::request_cancel(&conn, &actor, id, request.reason.trim())?))
}

/// `POST /api/appointments/:id/approve_reschedule/`
pub async fn approve_reschedule(State(ctx): State<ApiContext>, AuthUser(actor): AuthUser, Path(id): Path<i64>) -> AppointmentResult {
    let conn = ctx.core.open_db()?;
    Ok(Json(appointment::approve_reschedule(&conn, &actor, id)?))
}

/// `POST /api/appointments/:id/reject_reschedule/`
pub async fn reject_reschedule(State(ctx): State<ApiContext>, AuthUser(actor): AuthUser, Path(id): Path<i64>) -> AppointmentResult {
    let conn = ctx.core.open_db()?;
    Ok(Json(appointment::reject_reschedule(&conn, &actor, id)?))
}

/// `POST /api/appointments/:id/approve_cancel/`: deletes; 204 with no body.
pub async fn approve_cancel(
    State(ctx): State<ApiContext>,
    AuthUser(actor): AuthUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    let conn = ctx.core.open_db()?;
    appointment::approve_cancel(&conn, &actor, id)?;
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /api/appointments/:id/reject_cancel/`
pub async fn reject_cancel(State(ctx): State<ApiContext>, AuthUser(actor): AuthUser, Path(id): Path<i64>) -> AppointmentResult {
    let conn = ctx.core.open_db()?;
    Ok(Json(appointment::reject_cancel(&conn, &actor, id)?))
}

/// `POST /api/appointments/:id/mark_completed/`: optional treatment,
/// diagnosis and notes become a clinical note.
pub async fn mark_completed(
    State(ctx): State<ApiContext>,
    AuthUser(actor): AuthUser,
    Path(id): Path<i64>,
    body: Bytes,
) -> AppointmentResult {
    let note: CompletionNote = optional_body(&body)?;
    let conn = ctx.core.open_db()?;
    Ok(Json(appointment::mark_completed(&conn, &actor, id, &note)?))
}
