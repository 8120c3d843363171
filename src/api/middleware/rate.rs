//! Per-token rate limiting middleware.
//!
//! Sliding-window limits per caller: 300 requests per minute and 5000
//! per hour. Anonymous requests are keyed by peer IP.

use std::net::SocketAddr;

use axum::extract::ConnectInfo;
use axum::http::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::api::error::ApiError;
use crate::api::middleware::token_from_headers;
use crate::api::types::ApiContext;

/// Extract a rate-limit key from the request: the token prefix when
/// present, else the peer IP. Routers served without connect info
/// (in-process tests) fall back to one shared anonymous key.
fn rate_key(req: &Request<axum::body::Body>) -> String {
    if let Some(token) = token_from_headers(req.headers()) {
        let prefix: String = token.chars().take(16).collect();
        return format!("token:{prefix}");
    }
    match req.extensions().get::<ConnectInfo<SocketAddr>>() {
        Some(ConnectInfo(addr)) => format!("ip:{}", addr.ip()),
        None => "anonymous".to_string(),
    }
}

/// Returns 429 if exceeded.
pub async fn limit(req: Request<axum::body::Body>, next: Next) -> Response {
    match limit_inner(req, next).await {
        Ok(response) => response,
        Err(err) => err.into_response(),
    }
}

async fn limit_inner(req: Request<axum::body::Body>, next: Next) -> Result<Response, ApiError> {
    let ctx: ApiContext = req
        .extensions()
        .get::<ApiContext>()
        .cloned()
        .ok_or(ApiError::Internal("missing API context".into()))?;

    let key = rate_key(&req);

    // MutexGuard is !Send, drop before .await
    {
        let mut limiter = ctx
            .rate_limiter
            .lock()
            .map_err(|_| ApiError::Internal("rate limiter lock".into()))?;

        limiter.check(&key).map_err(|retry_after| {
            tracing::warn!(key = %key, retry_after, "Rate limit exceeded");
            ApiError::RateLimited { retry_after }
        })?;
    }

    Ok(next.run(req).await)
}
