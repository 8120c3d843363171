//! API endpoint handlers, one module per resource.

pub mod analytics;
pub mod appointments;
pub mod auth;
pub mod availability;
pub mod billing;
pub mod dental_records;
pub mod dentist_feed;
pub mod documents;
pub mod files;
pub mod health;
pub mod intake;
pub mod inventory;
pub mod notes;
pub mod notifications;
pub mod services;
pub mod teeth_images;
pub mod treatments;
pub mod users;

use serde::de::DeserializeOwned;

use crate::api::error::ApiError;

/// Parse a JSON body that may be omitted entirely.
pub(crate) fn optional_body<T: DeserializeOwned + Default>(body: &[u8]) -> Result<T, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|e| ApiError::BadRequest(format!("Invalid JSON body: {e}")))
}
