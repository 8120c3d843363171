//! Health check endpoint.

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::api::error::ApiError;
use crate::api::types::ApiContext;

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub database: bool,
    pub version: String,
}

/// `GET /api/health`: unauthenticated liveness and database check.
pub async fn check(State(ctx): State<ApiContext>) -> Result<Json<HealthResponse>, ApiError> {
    let database = ctx
        .core
        .open_db()
        .map(|conn| conn.query_row("SELECT 1", [], |_| Ok(())).is_ok())
        .unwrap_or(false);

    Ok(Json(HealthResponse {
        status: if database { "ok" } else { "degraded" }.to_string(),
        database,
        version: crate::config::APP_VERSION.to_string(),
    }))
}
