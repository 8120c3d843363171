//! Account endpoints: register, login, logout, profile and password reset.

use axum::extract::State;
use axum::http::StatusCode;
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, ApiJson, AuthUser, BearerToken};
use crate::auth::{self, AuthResponse};
use crate::db;
use crate::models::{NewUser, User, UserUpdate};

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginRequest {
    /// Username or email.
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PasswordResetRequest {
    pub email: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PasswordResetConfirm {
    pub token: String,
    pub new_password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Detail {
    pub detail: String,
}

/// `POST /api/register/`: patient self-registration.
pub async fn register(
    State(ctx): State<ApiContext>,
    ApiJson(new): ApiJson<NewUser>,
) -> Result<(StatusCode, Json<AuthResponse>), ApiError> {
    let conn = ctx.core.open_db()?;
    let response = auth::register(&conn, &new, ctx.core.pbkdf2_iterations())?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// `POST /api/login/`
pub async fn login(
    State(ctx): State<ApiContext>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    let conn = ctx.core.open_db()?;
    Ok(Json(auth::login(&conn, req.username.trim(), &req.password)?))
}

/// `POST /api/logout/`: revokes the presented token.
pub async fn logout(
    State(ctx): State<ApiContext>,
    _user: AuthUser,
    Extension(BearerToken(token)): Extension<BearerToken>,
) -> Result<StatusCode, ApiError> {
    let conn = ctx.core.open_db()?;
    auth::logout(&conn, &token)?;
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /api/profile/` (alias `/api/me/`)
pub async fn profile(
    State(ctx): State<ApiContext>,
    AuthUser(actor): AuthUser,
) -> Result<Json<User>, ApiError> {
    let conn = ctx.core.open_db()?;
    Ok(Json(db::get_user(&conn, actor.user_id)?))
}

/// `PATCH /api/profile/`: role changes are ignored here.
pub async fn update_profile(
    State(ctx): State<ApiContext>,
    AuthUser(actor): AuthUser,
    ApiJson(update): ApiJson<UserUpdate>,
) -> Result<Json<User>, ApiError> {
    let conn = ctx.core.open_db()?;
    let user = auth::update_profile(&conn, actor.user_id, &update, false, ctx.core.pbkdf2_iterations())?;
    Ok(Json(user))
}

/// `POST /api/password-reset/request/`: answers the same whether or not
/// the email is known.
pub async fn request_password_reset(
    State(ctx): State<ApiContext>,
    ApiJson(req): ApiJson<PasswordResetRequest>,
) -> Result<Json<Detail>, ApiError> {
    let conn = ctx.core.open_db()?;
    auth::request_password_reset(&conn, req.email.trim(), ctx.core.now())?;
    Ok(Json(Detail {
        detail: "If that email is registered, a reset token has been issued".into(),
    }))
}

/// `POST /api/password-reset/confirm/`
pub async fn confirm_password_reset(
    State(ctx): State<ApiContext>,
    ApiJson(req): ApiJson<PasswordResetConfirm>,
) -> Result<Json<Detail>, ApiError> {
    let conn = ctx.core.open_db()?;
    auth::confirm_password_reset(
        &conn,
        &req.token,
        &req.new_password,
        ctx.core.pbkdf2_iterations(),
        ctx.core.now(),
    )?;
    Ok(Json(Detail {
        detail: "Password has been reset".into(),
    }))
}
