//! HTTP API.
//!
//! Routes are nested under `/api/` and pass through the middleware
//! stack: CORS → Rate Limit → Auth → Audit → Handler.
//!
//! `api_router()` returns a `Router` that can be mounted on any axum
//! server; `server` runs it on a background task with a shutdown handle.

pub mod endpoints;
pub mod error;
pub mod middleware;
pub mod router;
pub mod server;
pub mod types;

pub use router::api_router;
pub use server::{serve_until_ctrl_c, start_server, ApiServer, ServerError, ServerSession};
pub use types::ApiContext;
