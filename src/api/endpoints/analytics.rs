//! Owner dashboard endpoint.

use std::str::FromStr;

use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;

use crate::analytics::{self, AnalyticsSummary, DateRange};
use crate::api::error::ApiError;
use crate::api::types::{ApiContext, AuthUser};

#[derive(Debug, Deserialize)]
pub struct RangeQuery {
    pub range: Option<String>,
}

/// `GET /api/analytics/?range=daily|weekly|monthly|annual` (default monthly)
pub async fn summary(
    State(ctx): State<ApiContext>,
    user: AuthUser,
    Query(query): Query<RangeQuery>,
) -> Result<Json<AnalyticsSummary>, ApiError> {
    user.require_owner()?;
    let range = match query.range.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        Some(raw) => DateRange::from_str(raw).map_err(ApiError::BadRequest)?,
        None => DateRange::default(),
    };
    let conn = ctx.core.open_db()?;
    Ok(Json(analytics::summarize(&conn, range, ctx.core.today())?))
}
