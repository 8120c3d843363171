//! Audit logging middleware.
//!
//! Logs every API request with method, path, response status and the
//! calling user. Runs innermost, after auth has injected the `Actor`.

use axum::http::Request;
use axum::middleware::Next;
use axum::response::Response;

use crate::models::Actor;

pub async fn log_access(req: Request<axum::body::Body>, next: Next) -> Response {
    let method = req.method().to_string();
    let path = req.uri().path().to_string();
    let user_id = req.extensions().get::<Actor>().map(|a| a.user_id);

    let response = next.run(req).await;

    let status = response.status().as_u16();
    match user_id {
        Some(user_id) => tracing::info!(%method, %path, status, user_id, "API access"),
        None => tracing::info!(%method, %path, status, "API access (anonymous)"),
    }

    response
}
