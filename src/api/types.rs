//! Shared types for the API layer: context, extractors and the rate limiter.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use axum::async_trait;
use axum::extract::{FromRequest, FromRequestParts};
use axum::http::request::Parts;

use crate::api::error::ApiError;
use crate::core_state::CoreState;
use crate::models::Actor;

// ═══════════════════════════════════════════════════════════
// API context: shared state for the router
// ═══════════════════════════════════════════════════════════

/// Shared context for all API routes and middleware.
#[derive(Clone)]
pub struct ApiContext {
    pub core: Arc<CoreState>,
    pub rate_limiter: Arc<Mutex<RateLimiter>>,
}

impl ApiContext {
    pub fn new(core: Arc<CoreState>) -> Self {
        Self {
            core,
            rate_limiter: Arc::new(Mutex::new(RateLimiter::new())),
        }
    }
}

// ═══════════════════════════════════════════════════════════
// Extractors
// ═══════════════════════════════════════════════════════════

/// Raw bearer token, inserted by the auth middleware next to the `Actor`.
#[derive(Debug, Clone)]
pub struct BearerToken(pub String);

/// The authenticated caller. Rejects with 401 when the auth middleware
/// did not resolve a token.
#[derive(Debug, Clone)]
pub struct AuthUser(pub Actor);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Actor>()
            .cloned()
            .map(AuthUser)
            .ok_or(ApiError::Unauthorized)
    }
}

impl AuthUser {
    pub fn require_clinic(&self) -> Result<&Actor, ApiError> {
        if self.0.is_clinic() {
            Ok(&self.0)
        } else {
            Err(ApiError::Forbidden("Staff access required".into()))
        }
    }

    pub fn require_owner(&self) -> Result<&Actor, ApiError> {
        if self.0.is_owner() {
            Ok(&self.0)
        } else {
            Err(ApiError::Forbidden("Owner access required".into()))
        }
    }

    /// Patients may only reach their own records.
    pub fn require_patient_access(&self, patient_id: i64) -> Result<&Actor, ApiError> {
        if self.0.can_access_patient(patient_id) {
            Ok(&self.0)
        } else {
            Err(ApiError::Forbidden("You can only access your own records".into()))
        }
    }

    /// Patient filter for list queries: patients are pinned to themselves,
    /// clinic users may narrow to a requested patient.
    pub fn scope_patient(&self, requested: Option<i64>) -> Option<i64> {
        if self.0.is_clinic() {
            requested
        } else {
            Some(self.0.user_id)
        }
    }
}

/// JSON body extractor whose rejections use the API error shape.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

/// Parse an optional numeric query parameter.
pub fn parse_id_param(name: &str, raw: Option<&str>) -> Result<Option<i64>, ApiError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(s) => s
            .parse()
            .map(Some)
            .map_err(|_| ApiError::BadRequest(format!("{name} must be an integer"))),
    }
}

pub fn parse_date_param(name: &str, raw: &str) -> Result<chrono::NaiveDate, ApiError> {
    chrono::NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| ApiError::BadRequest(format!("{name} must be a date in YYYY-MM-DD format")))
}

// ═══════════════════════════════════════════════════════════
// Rate limiter: per-token sliding window
// ═══════════════════════════════════════════════════════════

/// Per-key rate limiter with per-minute and per-hour limits.
pub struct RateLimiter {
    windows: HashMap<String, Vec<Instant>>,
    per_minute: u32,
    per_hour: u32,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::with_limits(300, 5000)
    }

    pub fn with_limits(per_minute: u32, per_hour: u32) -> Self {
        Self {
            windows: HashMap::new(),
            per_minute,
            per_hour,
        }
    }

    /// Check if a key is within rate limits. Returns `Ok(())` or
    /// `Err(retry_after_secs)` if exceeded.
    pub fn check(&mut self, key: &str) -> Result<(), u64> {
        let now = Instant::now();
        let entries = self.windows.entry(key.to_string()).or_default();

        entries.retain(|ts| now.duration_since(*ts) < Duration::from_secs(3600));

        let last_minute = entries
            .iter()
            .filter(|ts| now.duration_since(**ts) < Duration::from_secs(60))
            .count() as u32;
        if last_minute >= self.per_minute {
            return Err(60);
        }

        if entries.len() as u32 >= self.per_hour {
            return Err(3600);
        }

        entries.push(now);
        Ok(())
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}
