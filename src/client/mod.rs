//! HTTP client for the DentDesk API.
//!
//! `ClinicClient` is a thin typed wrapper over `reqwest`: one method per
//! endpoint the front-end flows use, every failure mapped to a
//! `ClientError` variant. `board` and `poller` build the patient,
//! review and notification flows on top of it.

pub mod board;
pub mod poller;

use reqwest::{Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

use crate::api::error::ErrorBody;
use crate::auth::AuthResponse;
use crate::config::ClientConfig;
use crate::models::enums::FileType;
use crate::models::*;

pub use board::{AppointmentBoard, AppointmentDraft, StaffEdit};
pub use poller::{NotificationPoller, NotificationSnapshot};

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Not logged in or session expired")]
    Unauthorized,

    #[error("Not allowed: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Server error ({status}): {message}")]
    Server { status: u16, message: String },

    #[error("Cannot reach server: {0}")]
    Transport(String),

    #[error("Unexpected response: {0}")]
    Decode(String),
}

impl ClientError {
    /// Map a non-success response to an error, using the server's
    /// `{"error": {...}}` message when the body has one.
    fn from_response(status: StatusCode, body: &str) -> Self {
        let message = serde_json::from_str::<ErrorBody>(body)
            .map(|b| b.error.message)
            .unwrap_or_else(|_| body.trim().to_string());
        match status {
            StatusCode::UNAUTHORIZED => ClientError::Unauthorized,
            StatusCode::FORBIDDEN => ClientError::Forbidden(message),
            StatusCode::NOT_FOUND => ClientError::NotFound(message),
            StatusCode::CONFLICT => ClientError::Conflict(message),
            StatusCode::BAD_REQUEST => ClientError::BadRequest(message),
            other => ClientError::Server {
                status: other.as_u16(),
                message,
            },
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            ClientError::Decode(e.to_string())
        } else if e.is_timeout() {
            ClientError::Transport(format!("Request timed out: {e}"))
        } else {
            ClientError::Transport(e.to_string())
        }
    }
}

/// Authenticated API client. Cheap to clone; clones share the
/// connection pool but carry their own token.
#[derive(Debug, Clone)]
pub struct ClinicClient {
    api_url: String,
    http: reqwest::Client,
    token: Option<String>,
}

impl ClinicClient {
    pub fn new(config: &ClientConfig) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| ClientError::Transport(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self {
            api_url: format!("{}/api", config.base_url),
            http,
            token: None,
        })
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self.http.request(method, format!("{}{path}", self.api_url));
        match &self.token {
            Some(token) => builder.header(reqwest::header::AUTHORIZATION, format!("Token {token}")),
            None => builder,
        }
    }

    /// Send and return the successful response, mapping error statuses.
    async fn send(&self, builder: RequestBuilder) -> Result<reqwest::Response, ClientError> {
        let response = builder.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        let err = ClientError::from_response(status, &body);
        tracing::debug!(status = status.as_u16(), error = %err, "API request failed");
        Err(err)
    }

    async fn json<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T, ClientError> {
        let response = self.send(builder).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| ClientError::Decode(e.to_string()))
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        self.json(self.request(Method::GET, path)).await
    }

    async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T, ClientError> {
        self.json(self.request(Method::POST, path).json(body)).await
    }

    async fn patch<B: Serialize + ?Sized, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T, ClientError> {
        self.json(self.request(Method::PATCH, path).json(body)).await
    }

    /// For endpoints answering 204 No Content.
    async fn no_content(&self, builder: RequestBuilder) -> Result<(), ClientError> {
        self.send(builder).await.map(|_| ())
    }

    // ── Accounts ──

    /// Register a patient account and keep its token.
    pub async fn register(&mut self, new: &NewUser) -> Result<User, ClientError> {
        let auth: AuthResponse = self.post("/register/", new).await?;
        self.token = Some(auth.token);
        Ok(auth.user)
    }

    /// Log in by username or email and keep the token.
    pub async fn login(&mut self, username: &str, password: &str) -> Result<User, ClientError> {
        let body = serde_json::json!({ "username": username, "password": password });
        let auth: AuthResponse = self.post("/login/", &body).await?;
        self.token = Some(auth.token);
        Ok(auth.user)
    }

    pub async fn logout(&mut self) -> Result<(), ClientError> {
        self.no_content(self.request(Method::POST, "/logout/")).await?;
        self.token = None;
        Ok(())
    }

    pub async fn profile(&self) -> Result<User, ClientError> {
        self.get("/profile/").await
    }

    pub async fn staff(&self) -> Result<Vec<User>, ClientError> {
        self.get("/users/staff/").await
    }

    pub async fn services(&self) -> Result<Vec<Service>, ClientError> {
        self.get("/services/").await
    }

    // ── Appointments ──

    pub async fn list_appointments(&self) -> Result<Vec<Appointment>, ClientError> {
        self.get("/appointments/").await
    }

    pub async fn get_appointment(&self, id: i64) -> Result<Appointment, ClientError> {
        self.get(&format!("/appointments/{id}/")).await
    }

    pub async fn create_appointment(&self, new: &NewAppointment) -> Result<Appointment, ClientError> {
        self.post("/appointments/", new).await
    }

    pub async fn update_appointment(&self, id: i64, update: &AppointmentUpdate) -> Result<Appointment, ClientError> {
        self.patch(&format!("/appointments/{id}/"), update).await
    }

    pub async fn delete_appointment(&self, id: i64) -> Result<(), ClientError> {
        self.no_content(self.request(Method::DELETE, &format!("/appointments/{id}/")))
            .await
    }

    pub async fn booked_slots(&self, dentist: Option<i64>) -> Result<Vec<BookedSlot>, ClientError> {
        match dentist {
            Some(d) => self.get(&format!("/appointments/booked_slots/?dentist={d}")).await,
            None => self.get("/appointments/booked_slots/").await,
        }
    }

    pub async fn request_reschedule(&self, id: i64, proposal: &RescheduleProposal) -> Result<Appointment, ClientError> {
        self.post(&format!("/appointments/{id}/request_reschedule/"), proposal)
            .await
    }

    pub async fn request_cancel(&self, id: i64, reason: &str) -> Result<Appointment, ClientError> {
        let body = CancelRequest {
            reason: reason.to_string(),
        };
        self.post(&format!("/appointments/{id}/request_cancel/"), &body)
            .await
    }

    async fn decide(&self, id: i64, action: &str) -> Result<Appointment, ClientError> {
        self.json(self.request(Method::POST, &format!("/appointments/{id}/{action}/")))
            .await
    }

    pub async fn approve_reschedule(&self, id: i64) -> Result<Appointment, ClientError> {
        self.decide(id, "approve_reschedule").await
    }

    pub async fn reject_reschedule(&self, id: i64) -> Result<Appointment, ClientError> {
        self.decide(id, "reject_reschedule").await
    }

    /// Deletes the appointment; the server answers 204.
    pub async fn approve_cancel(&self, id: i64) -> Result<(), ClientError> {
        self.no_content(self.request(Method::POST, &format!("/appointments/{id}/approve_cancel/")))
            .await
    }

    pub async fn reject_cancel(&self, id: i64) -> Result<Appointment, ClientError> {
        self.decide(id, "reject_cancel").await
    }

    pub async fn mark_completed(&self, id: i64, note: &CompletionNote) -> Result<Appointment, ClientError> {
        self.post(&format!("/appointments/{id}/mark_completed/"), note)
            .await
    }

    // ── Notifications ──

    pub async fn notifications(&self) -> Result<Vec<AppointmentNotification>, ClientError> {
        self.get("/appointment-notifications/").await
    }

    pub async fn unread_count(&self) -> Result<i64, ClientError> {
        let count: UnreadCount = self.get("/appointment-notifications/unread_count/").await?;
        Ok(count.unread_count)
    }

    pub async fn mark_notification_read(&self, id: i64) -> Result<AppointmentNotification, ClientError> {
        self.json(self.request(
            Method::POST,
            &format!("/appointment-notifications/{id}/mark_read/"),
        ))
        .await
    }

    pub async fn mark_all_notifications_read(&self) -> Result<(), ClientError> {
        self.no_content(self.request(Method::POST, "/appointment-notifications/mark_all_read/"))
            .await
    }

    // ── Files ──

    pub async fn upload_file(
        &self,
        patient: i64,
        file_type: FileType,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<FileAttachment, ClientError> {
        let content_type = mime_guess::from_path(file_name).first_or_octet_stream();
        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(file_name.to_string())
            .mime_str(content_type.as_ref())
            .map_err(|e| ClientError::BadRequest(e.to_string()))?;
        let form = reqwest::multipart::Form::new()
            .text("patient", patient.to_string())
            .text("file_type", file_type.as_str())
            .part("file", part);
        self.json(self.request(Method::POST, "/file-attachments/").multipart(form))
            .await
    }

    pub async fn download_file(&self, id: i64) -> Result<Vec<u8>, ClientError> {
        let response = self
            .send(self.request(Method::GET, &format!("/file-attachments/{id}/download/")))
            .await?;
        Ok(response.bytes().await?.to_vec())
    }
}
