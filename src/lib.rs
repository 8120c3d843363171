pub mod analytics;
pub mod api;
pub mod appointment;
pub mod auth;
pub mod client;
pub mod config;
pub mod core_state;
pub mod db;
pub mod export;
pub mod models;
pub mod notification;

#[cfg(test)]
mod test_support;

use tracing_subscriber::EnvFilter;

/// Start the server: logging, configuration from the environment, then
/// serve until Ctrl-C.
pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();

    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);

    let server_config = config::ServerConfig::from_env()?;
    tracing::info!(
        db = %server_config.db_path.display(),
        uploads = %server_config.upload_dir.display(),
        "Using data paths"
    );
    api::serve_until_ctrl_c(server_config).await?;
    Ok(())
}
