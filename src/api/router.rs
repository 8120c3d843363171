//! API router.
//!
//! Returns a composable `Router` with every route nested under `/api/`.
//!
//! Middleware stack (outermost → innermost):
//! 1. CORS → 2. Rate limiter → 3. Auth resolver → 4. Audit logger
//!
//! Auth is resolved for every request that carries a token; handlers
//! that need a caller extract `AuthUser`, so public and protected routes
//! can share a path with different methods.

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderValue, Method};
use axum::routing::{get, patch, post};
use axum::Router;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

use crate::api::endpoints::*;
use crate::api::middleware;
use crate::api::types::ApiContext;
use crate::config::MAX_UPLOAD_BYTES;
use crate::core_state::CoreState;

/// Build the API router.
///
/// Middleware uses `Extension<ApiContext>` (injected as the outermost layer).
/// Endpoint handlers use `State<ApiContext>` (provided via `with_state`).
pub fn api_router(core: Arc<CoreState>) -> Router {
    build_router(ApiContext::new(core))
}

/// Build router from a pre-constructed `ApiContext` (tests tune the
/// rate limiter this way).
pub(crate) fn build_router(ctx: ApiContext) -> Router {
    let cors = cors_layer(ctx.core.config.cors_origin.as_deref());

    // NOTE: Path params use `:param` syntax (matchit 0.7 / axum 0.7).
    let routes = Router::new()
        .route("/health", get(health::check))
        // ── Accounts ──
        .route("/register/", post(auth::register))
        .route("/login/", post(auth::login))
        .route("/logout/", post(auth::logout))
        .route("/profile/", get(auth::profile).patch(auth::update_profile))
        .route("/me/", get(auth::profile).patch(auth::update_profile))
        .route("/password-reset/request/", post(auth::request_password_reset))
        .route("/password-reset/confirm/", post(auth::confirm_password_reset))
        // ── Services ──
        .route("/services/", get(services::list).post(services::create))
        .route("/services/by_category/", get(services::by_category))
        .route(
            "/services/:id/",
            get(services::detail)
                .patch(services::update)
                .delete(services::delete),
        )
        // ── Appointments ──
        .route("/appointments/", get(appointments::list).post(appointments::create))
        .route("/appointments/today/", get(appointments::today))
        .route("/appointments/upcoming/", get(appointments::upcoming))
        .route("/appointments/booked_slots/", get(appointments::booked_slots))
        .route(
            "/appointments/:id/",
            get(appointments::detail)
                .patch(appointments::update)
                .delete(appointments::delete),
        )
        .route("/appointments/:id/request_reschedule/", post(appointments::request_reschedule))
        .route("/appointments/:id/approve_reschedule/", post(appointments::approve_reschedule))
        .route("/appointments/:id/reject_reschedule/", post(appointments::reject_reschedule))
        .route("/appointments/:id/request_cancel/", post(appointments::request_cancel))
        .route("/appointments/:id/approve_cancel/", post(appointments::approve_cancel))
        .route("/appointments/:id/reject_cancel/", post(appointments::reject_cancel))
        .route("/appointments/:id/mark_completed/", post(appointments::mark_completed))
        // ── Users ──
        .route("/users/", post(users::create))
        .route("/users/patients/", get(users::patients))
        .route("/users/archived_patients/", get(users::archived_patients))
        .route("/users/staff/", get(users::staff))
        .route(
            "/users/:id/",
            get(users::detail).patch(users::update).delete(users::delete),
        )
        .route("/users/:id/archive/", post(users::archive))
        .route("/users/:id/restore/", post(users::restore))
        .route("/users/:id/export_records/", get(users::export_records))
        // ── Staff availability ──
        .route("/staff-availability/", get(availability::list))
        .route("/staff-availability/bulk_update/", post(availability::bulk_update))
        .route("/staff-availability/by_date/", get(availability::by_date))
        // ── Inventory ──
        .route("/inventory/", get(inventory::list).post(inventory::create))
        .route("/inventory/low_stock/", get(inventory::low_stock))
        .route(
            "/inventory/:id/",
            get(inventory::detail)
                .patch(inventory::update)
                .delete(inventory::delete),
        )
        // ── Billing ──
        .route("/billing/", get(billing::list).post(billing::create))
        .route("/billing/:id/", get(billing::detail).delete(billing::delete))
        .route("/billing/:id/update_status/", patch(billing::update_status))
        // ── Analytics ──
        .route("/analytics/", get(analytics::summary))
        // ── File attachments ──
        .route(
            "/file-attachments/",
            get(files::list)
                .post(files::upload)
                .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES + 1024 * 1024)),
        )
        .route("/file-attachments/by_patient/", get(files::by_patient))
        .route("/file-attachments/:id/", get(files::detail).delete(files::delete))
        .route("/file-attachments/:id/download/", get(files::download))
        // ── Documents ──
        .route(
            "/documents/",
            get(documents::list)
                .post(documents::upload)
                .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES + 1024 * 1024)),
        )
        .route("/documents/:id/", get(documents::detail).delete(documents::delete))
        .route("/documents/:id/download/", get(documents::download))
        // ── Teeth images ──
        .route(
            "/teeth-images/",
            get(teeth_images::list)
                .post(teeth_images::upload)
                .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES + 1024 * 1024)),
        )
        .route("/teeth-images/latest/", get(teeth_images::latest))
        .route("/teeth-images/by_patient/", get(teeth_images::by_patient))
        .route("/teeth-images/:id/", get(teeth_images::detail).delete(teeth_images::delete))
        .route("/teeth-images/:id/image/", get(teeth_images::image))
        // ── Dental records ──
        .route("/dental-records/", get(dental_records::list).post(dental_records::create))
        .route(
            "/dental-records/:id/",
            get(dental_records::detail)
                .patch(dental_records::update)
                .delete(dental_records::delete),
        )
        // ── Clinical notes ──
        .route("/clinical-notes/", get(notes::list).post(notes::create))
        .route("/clinical-notes/by_patient/", get(notes::by_patient))
        .route(
            "/clinical-notes/:id/",
            get(notes::detail).patch(notes::update).delete(notes::delete),
        )
        // ── Treatment assignments ──
        .route("/treatment-assignments/", get(treatments::list).post(treatments::create))
        .route("/treatment-assignments/by_patient/", get(treatments::by_patient))
        .route(
            "/treatment-assignments/:id/",
            get(treatments::detail)
                .patch(treatments::update)
                .delete(treatments::delete),
        )
        .route("/treatment-assignments/:id/update_status/", patch(treatments::update_status))
        // ── Intake forms ──
        .route("/intake-forms/", get(intake::list).post(intake::create))
        .route("/intake-forms/by_patient/", get(intake::by_patient))
        .route(
            "/intake-forms/:id/",
            get(intake::detail)
                .put(intake::update)
                .patch(intake::update)
                .delete(intake::delete),
        )
        // ── Notifications ──
        .route("/appointment-notifications/", get(notifications::list))
        .route("/appointment-notifications/unread_count/", get(notifications::unread_count))
        .route("/appointment-notifications/mark_all_read/", post(notifications::mark_all_read))
        .route("/appointment-notifications/:id/mark_read/", post(notifications::mark_read))
        .route("/notifications/", get(dentist_feed::list))
        .route("/notifications/unread_count/", get(dentist_feed::unread_count))
        .route("/notifications/mark_all_read/", post(dentist_feed::mark_all_read))
        .route("/notifications/:id/mark_read/", post(dentist_feed::mark_read))
        .with_state(ctx.clone())
        // Middleware stack (innermost first, outermost last):
        .layer(axum::middleware::from_fn(middleware::audit::log_access))
        .layer(axum::middleware::from_fn(middleware::auth::resolve_auth))
        .layer(axum::middleware::from_fn(middleware::rate::limit))
        // Extension must be outermost so middleware can extract ApiContext
        .layer(axum::Extension(ctx));

    Router::new().nest("/api", routes).layer(cors)
}

fn cors_layer(origin: Option<&str>) -> CorsLayer {
    let allow_origin = match origin.and_then(|o| HeaderValue::from_str(o).ok()) {
        Some(value) => AllowOrigin::exact(value),
        None => AllowOrigin::from(Any),
    };
    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
}
