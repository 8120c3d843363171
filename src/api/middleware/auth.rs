//! Token authentication middleware.
//!
//! Resolves `Authorization: Token <token>` to an `Actor` and injects it,
//! with the raw `BearerToken`, into request extensions. Requests without
//! a token pass through anonymously; handlers that need a caller extract
//! `AuthUser`, which rejects with 401. A token that does not resolve is
//! rejected here.

use axum::http::{HeaderValue, Request};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::api::error::ApiError;
use crate::api::middleware::token_from_headers;
use crate::api::types::{ApiContext, BearerToken};
use crate::auth::{self, AuthError};

pub async fn resolve_auth(req: Request<axum::body::Body>, next: Next) -> Response {
    match resolve_auth_inner(req, next).await {
        Ok(resp) => resp,
        Err(err) => err.into_response(),
    }
}

async fn resolve_auth_inner(
    mut req: Request<axum::body::Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let ctx: ApiContext = req
        .extensions()
        .get::<ApiContext>()
        .cloned()
        .ok_or(ApiError::Internal("missing API context".into()))?;

    let Some(token) = token_from_headers(req.headers()).map(str::to_string) else {
        return Ok(next.run(req).await);
    };

    // Connection dropped before any .await
    let actor = {
        let conn = ctx.core.open_db()?;
        match auth::authenticate(&conn, &token) {
            Ok(actor) => actor,
            Err(AuthError::InvalidToken) => {
                tracing::warn!(path = %req.uri().path(), "Rejected unknown token");
                return Err(ApiError::Unauthorized);
            }
            Err(e) => return Err(e.into()),
        }
    };

    req.extensions_mut().insert(actor);
    req.extensions_mut().insert(BearerToken(token));

    let mut response = next.run(req).await;
    response
        .headers_mut()
        .insert("Cache-Control", HeaderValue::from_static("no-store"));
    Ok(response)
}
