//! User management: patient and staff directories, staff-created
//! accounts, archive/restore and record export.

use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, ApiJson, AuthUser};
use crate::auth;
use crate::db;
use crate::export;
use crate::models::enums::UserType;
use crate::models::{Actor, NewUser, User, UserUpdate};

/// `GET /api/users/patients/`: patients not archived.
pub async fn patients(State(ctx): State<ApiContext>, user: AuthUser) -> Result<Json<Vec<User>>, ApiError> {
    user.require_clinic()?;
    let conn = ctx.core.open_db()?;
    Ok(Json(db::list_users(&conn, UserType::Patient, Some(false))?))
}

/// `GET /api/users/archived_patients/`
pub async fn archived_patients(State(ctx): State<ApiContext>, user: AuthUser) -> Result<Json<Vec<User>>, ApiError> {
    user.require_clinic()?;
    let conn = ctx.core.open_db()?;
    Ok(Json(db::list_users(&conn, UserType::Patient, Some(true))?))
}

/// `GET /api/users/staff/`: staff and owners; open to patients so they
/// can pick a dentist when booking.
pub async fn staff(State(ctx): State<ApiContext>, _user: AuthUser) -> Result<Json<Vec<User>>, ApiError> {
    let conn = ctx.core.open_db()?;
    Ok(Json(db::list_clinic_users(&conn)?))
}

/// `POST /api/users/`: owners create any role; staff create patients.
pub async fn create(
    State(ctx): State<ApiContext>,
    user: AuthUser,
    ApiJson(new): ApiJson<NewUser>,
) -> Result<(StatusCode, Json<User>), ApiError> {
    let actor = user.require_clinic()?;
    let role = new.user_type.unwrap_or(UserType::Patient);
    if role != UserType::Patient && !actor.is_owner() {
        return Err(ApiError::Forbidden("Only the owner can create staff accounts".into()));
    }
    let conn = ctx.core.open_db()?;
    let created = auth::create_account(&conn, &new, role, ctx.core.pbkdf2_iterations())?;
    tracing::info!(user_id = created.id, role = %role, by = actor.user_id, "User created by clinic");
    Ok((StatusCode::CREATED, Json(created)))
}

/// Load a user the actor may see. Patients only see themselves.
fn visible_user(conn: &rusqlite::Connection, actor: &Actor, id: i64) -> Result<User, ApiError> {
    if !actor.can_access_patient(id) {
        return Err(ApiError::NotFound("User not found".into()));
    }
    Ok(db::get_user(conn, id)?)
}

/// `GET /api/users/:id/`
pub async fn detail(
    State(ctx): State<ApiContext>,
    AuthUser(actor): AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<User>, ApiError> {
    let conn = ctx.core.open_db()?;
    Ok(Json(visible_user(&conn, &actor, id)?))
}

/// `PATCH /api/users/:id/`: owners may change roles; staff may edit
/// patients; everyone may edit themselves.
pub async fn update(
    State(ctx): State<ApiContext>,
    AuthUser(actor): AuthUser,
    Path(id): Path<i64>,
    ApiJson(update): ApiJson<UserUpdate>,
) -> Result<Json<User>, ApiError> {
    let conn = ctx.core.open_db()?;
    let target = visible_user(&conn, &actor, id)?;
    let allowed = actor.user_id == id || actor.is_owner() || target.user_type == UserType::Patient;
    if !allowed {
        return Err(ApiError::Forbidden("Only the owner can edit staff accounts".into()));
    }
    let allow_role_change = actor.is_owner() && actor.user_id != id;
    let user = auth::update_profile(&conn, id, &update, allow_role_change, ctx.core.pbkdf2_iterations())?;
    Ok(Json(user))
}

/// `DELETE /api/users/:id/`: owner only, never their own account.
pub async fn delete(
    State(ctx): State<ApiContext>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    let actor = user.require_owner()?;
    if actor.user_id == id {
        return Err(ApiError::BadRequest("You cannot delete your own account".into()));
    }
    let conn = ctx.core.open_db()?;
    db::delete_user(&conn, id)?;
    tracing::info!(user_id = id, by = actor.user_id, "User deleted");
    Ok(StatusCode::NO_CONTENT)
}

fn set_archived(ctx: &ApiContext, user: &AuthUser, id: i64, archived: bool) -> Result<Json<User>, ApiError> {
    let actor = user.require_clinic()?;
    let conn = ctx.core.open_db()?;
    if db::get_user(&conn, id)?.user_type != UserType::Patient {
        return Err(ApiError::BadRequest("Only patients can be archived".into()));
    }
    let updated = db::set_archived(&conn, id, archived)?;
    tracing::info!(user_id = id, archived, by = actor.user_id, "Patient archive flag changed");
    Ok(Json(updated))
}

/// `POST /api/users/:id/archive/`
pub async fn archive(State(ctx): State<ApiContext>, user: AuthUser, Path(id): Path<i64>) -> Result<Json<User>, ApiError> {
    set_archived(&ctx, &user, id, true)
}

/// `POST /api/users/:id/restore/`
pub async fn restore(State(ctx): State<ApiContext>, user: AuthUser, Path(id): Path<i64>) -> Result<Json<User>, ApiError> {
    set_archived(&ctx, &user, id, false)
}

#[derive(Debug, Deserialize)]
pub struct ExportQuery {
    pub format: Option<String>,
}

/// `GET /api/users/:id/export_records/?format=json|pdf`
pub async fn export_records(
    State(ctx): State<ApiContext>,
    AuthUser(actor): AuthUser,
    Path(id): Path<i64>,
    Query(query): Query<ExportQuery>,
) -> Result<Response, ApiError> {
    if !actor.can_access_patient(id) {
        return Err(ApiError::NotFound("User not found".into()));
    }
    let conn = ctx.core.open_db()?;
    let bundle = export::build_export(&conn, id, ctx.core.now())?;
    tracing::info!(patient = id, by = actor.user_id, "Patient records exported");

    match query.format.as_deref().unwrap_or("json") {
        "json" => Ok(Json(bundle).into_response()),
        "pdf" => {
            let bytes = export::render_pdf(&bundle)?;
            let disposition = format!(
                "attachment; filename=\"{}\"",
                export::export_file_name(&bundle, "pdf")
            );
            Ok((
                [
                    (header::CONTENT_TYPE, "application/pdf".to_string()),
                    (header::CONTENT_DISPOSITION, disposition),
                ],
                bytes,
            )
                .into_response())
        }
        other => Err(ApiError::BadRequest(format!(
            "Unknown format '{other}'. Use json or pdf."
        ))),
    }
}
