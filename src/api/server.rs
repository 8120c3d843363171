//! API server lifecycle: binds the listener, mounts `api_router()` and
//! serves it on a background task until told to stop.
//!
//! bind → spawn background task → return handle with shutdown channel.

use std::net::SocketAddr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::oneshot;
use uuid::Uuid;

use crate::api::router::api_router;
use crate::config::ServerConfig;
use crate::core_state::{CoreError, CoreState};

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        source: std::io::Error,
    },

    #[error("Failed to read server address: {0}")]
    Address(std::io::Error),

    #[error("Server error: {0}")]
    Serve(std::io::Error),

    #[error(transparent)]
    Core(#[from] CoreError),
}

/// Metadata for a running server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSession {
    pub session_id: String,
    pub server_addr: String,
    pub port: u16,
    pub started_at: String,
}

/// Handle to a running API server.
pub struct ApiServer {
    pub session: ServerSession,
    addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: Option<tokio::task::JoinHandle<()>>,
}

impl ApiServer {
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// `http://host:port`, the base URL clients should use.
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Signal a graceful shutdown. Safe to call more than once.
    pub fn shutdown(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
            tracing::info!("API server shutdown signal sent");
        }
    }

    /// Signal shutdown and wait for in-flight requests to drain.
    pub async fn stop(mut self) {
        self.shutdown();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::error!(error = %e, "API server task failed");
            }
        }
    }
}

impl Drop for ApiServer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Start serving `core` on `bind`. Port 0 picks an ephemeral port; the
/// chosen address is in the returned handle.
pub async fn start_server(core: Arc<CoreState>, bind: SocketAddr) -> Result<ApiServer, ServerError> {
    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .map_err(|source| ServerError::Bind { addr: bind, source })?;
    let addr = listener.local_addr().map_err(ServerError::Address)?;

    tracing::info!(%addr, "API server binding");

    let app = api_router(core);

    let session = ServerSession {
        session_id: Uuid::new_v4().to_string(),
        server_addr: addr.to_string(),
        port: addr.port(),
        started_at: chrono::Utc::now().to_rfc3339(),
    };

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    let task = tokio::spawn(async move {
        let shutdown_signal = async move {
            let _ = shutdown_rx.await;
            tracing::info!("API server received shutdown signal");
        };

        if let Err(e) = axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
            .with_graceful_shutdown(shutdown_signal)
            .await
        {
            tracing::error!("API server error: {e}");
        }

        tracing::info!("API server stopped");
    });

    Ok(ApiServer {
        session,
        addr,
        shutdown_tx: Some(shutdown_tx),
        task: Some(task),
    })
}

/// Initialise state from `config` and serve in the foreground until
/// Ctrl-C.
pub async fn serve_until_ctrl_c(config: ServerConfig) -> Result<(), ServerError> {
    let bind = config.bind;
    let core = Arc::new(CoreState::init(config)?);
    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .map_err(|source| ServerError::Bind { addr: bind, source })?;
    let addr = listener.local_addr().map_err(ServerError::Address)?;
    tracing::info!(%addr, "DentDesk API listening");

    let app = api_router(core);
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Could not listen for Ctrl-C");
            }
            tracing::info!("Ctrl-C received, shutting down");
        })
        .await
        .map_err(ServerError::Serve)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::test_core;

    fn localhost() -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], 0))
    }

    #[tokio::test]
    async fn start_and_stop_server() {
        let (core, _tmp) = test_core();
        let server = start_server(core, localhost()).await.expect("server should start");

        assert!(!server.session.session_id.is_empty());
        assert!(server.session.port > 0);

        let resp = reqwest::get(format!("{}/api/health", server.base_url())).await.unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::OK);

        let resp = reqwest::get(format!("{}/api/appointments/", server.base_url())).await.unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::UNAUTHORIZED);

        server.stop().await;
    }

    #[tokio::test]
    async fn unknown_route_is_404() {
        let (core, _tmp) = test_core();
        let server = start_server(core, localhost()).await.unwrap();

        let resp = reqwest::get(format!("{}/nonexistent", server.base_url())).await.unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::NOT_FOUND);

        server.stop().await;
    }

    #[tokio::test]
    async fn session_metadata_matches_address() {
        let (core, _tmp) = test_core();
        let mut server = start_server(core, localhost()).await.unwrap();

        assert!(!server.session.started_at.is_empty());
        assert_eq!(server.session.server_addr, server.addr().to_string());
        assert_eq!(server.session.port, server.addr().port());

        server.shutdown();
        server.shutdown();
    }

    #[tokio::test]
    async fn bind_conflict_is_reported() {
        let (core, _tmp) = test_core();
        let server = start_server(core.clone(), localhost()).await.unwrap();

        let err = start_server(core, server.addr()).await.err().expect("port already in use");
        assert!(matches!(err, ServerError::Bind { .. }));

        server.stop().await;
    }
}
