use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::auth::DEFAULT_PBKDF2_ITERATIONS;

/// Application-level constants
pub const APP_NAME: &str = "DentDesk";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// How often the client polls for unread notifications.
pub const NOTIFICATION_POLL_INTERVAL_SECS: u64 = 30;

pub const DEFAULT_BIND: &str = "127.0.0.1:8000";

/// Largest accepted file upload.
pub const MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

/// Get the application data directory (`<data dir>/DentDesk`).
/// Falls back to the working directory when the platform has none.
pub fn app_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}

pub fn default_db_path() -> PathBuf {
    app_data_dir().join("dentdesk.db")
}

pub fn default_upload_dir() -> PathBuf {
    app_data_dir().join("uploads")
}

/// Default tracing filter, overridden by `RUST_LOG`.
pub fn default_log_filter() -> &'static str {
    "dentdesk=info,tower_http=info"
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid value for {var}: {reason}")]
    Invalid { var: &'static str, reason: String },
}

/// Credentials for the owner account created on first start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnerBootstrap {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind: SocketAddr,
    pub db_path: PathBuf,
    pub upload_dir: PathBuf,
    pub pbkdf2_iterations: u32,
    /// Allowed browser origin. `None` allows any origin.
    pub cors_origin: Option<String>,
    pub bootstrap_owner: Option<OwnerBootstrap>,
}

impl ServerConfig {
    /// Read `DENTDESK_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());

        let bind_str = get("DENTDESK_BIND").unwrap_or_else(|| DEFAULT_BIND.to_string());
        let bind = bind_str.parse().map_err(|e| ConfigError::Invalid {
            var: "DENTDESK_BIND",
            reason: format!("'{bind_str}': {e}"),
        })?;

        let pbkdf2_iterations = match get("DENTDESK_PBKDF2_ITERATIONS") {
            Some(raw) => match raw.parse::<u32>() {
                Ok(n) if n > 0 => n,
                _ => {
                    return Err(ConfigError::Invalid {
                        var: "DENTDESK_PBKDF2_ITERATIONS",
                        reason: format!("'{raw}' is not a positive integer"),
                    })
                }
            },
            None => DEFAULT_PBKDF2_ITERATIONS,
        };

        let bootstrap_owner = match (
            get("DENTDESK_OWNER_USERNAME"),
            get("DENTDESK_OWNER_EMAIL"),
            get("DENTDESK_OWNER_PASSWORD"),
        ) {
            (Some(username), Some(email), Some(password)) => Some(OwnerBootstrap {
                username,
                email,
                password,
            }),
            (None, None, None) => None,
            _ => {
                return Err(ConfigError::Invalid {
                    var: "DENTDESK_OWNER_*",
                    reason: "username, email and password must be set together".into(),
                })
            }
        };

        Ok(Self {
            bind,
            db_path: get("DENTDESK_DB_PATH").map(PathBuf::from).unwrap_or_else(default_db_path),
            upload_dir: get("DENTDESK_UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(default_upload_dir),
            pbkdf2_iterations,
            cors_origin: get("DENTDESK_CORS_ORIGIN"),
            bootstrap_owner,
        })
    }

    /// Config rooted in a scratch directory (tests and demos).
    pub fn in_dir(dir: &std::path::Path) -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 0)),
            db_path: dir.join("dentdesk.db"),
            upload_dir: dir.join("uploads"),
            pbkdf2_iterations: DEFAULT_PBKDF2_ITERATIONS,
            cors_origin: None,
            bootstrap_owner: None,
        }
    }
}

/// Settings for the HTTP client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Server root, e.g. `http://127.0.0.1:8000`. `/api` is appended.
    pub base_url: String,
    pub poll_interval: Duration,
    pub request_timeout: Duration,
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            poll_interval: Duration::from_secs(NOTIFICATION_POLL_INTERVAL_SECS),
            request_timeout: Duration::from_secs(30),
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn app_data_dir_ends_with_app_name() {
        assert!(app_data_dir().ends_with("DentDesk"));
        assert!(default_db_path().starts_with(app_data_dir()));
    }

    #[test]
    fn app_version_matches_cargo() {
        assert_eq!(APP_VERSION, "0.1.0");
    }

    #[test]
    fn defaults_when_env_is_empty() {
        let config = ServerConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.bind.to_string(), DEFAULT_BIND);
        assert_eq!(config.pbkdf2_iterations, DEFAULT_PBKDF2_ITERATIONS);
        assert_eq!(config.db_path, default_db_path());
        assert!(config.cors_origin.is_none());
        assert!(config.bootstrap_owner.is_none());
    }

    #[test]
    fn reads_overrides() {
        let config = ServerConfig::from_lookup(lookup(&[
            ("DENTDESK_BIND", "0.0.0.0:9000"),
            ("DENTDESK_DB_PATH", "/tmp/clinic.db"),
            ("DENTDESK_PBKDF2_ITERATIONS", "1000"),
            ("DENTDESK_CORS_ORIGIN", "http://localhost:3000"),
        ]))
        .unwrap();
        assert_eq!(config.bind.port(), 9000);
        assert_eq!(config.db_path, PathBuf::from("/tmp/clinic.db"));
        assert_eq!(config.pbkdf2_iterations, 1000);
        assert_eq!(config.cors_origin.as_deref(), Some("http://localhost:3000"));
    }

    #[test]
    fn rejects_bad_values() {
        assert!(ServerConfig::from_lookup(lookup(&[("DENTDESK_BIND", "nope")])).is_err());
        assert!(ServerConfig::from_lookup(lookup(&[("DENTDESK_PBKDF2_ITERATIONS", "0")])).is_err());
    }

    #[test]
    fn owner_bootstrap_needs_all_three() {
        let partial = lookup(&[("DENTDESK_OWNER_USERNAME", "owner")]);
        assert!(ServerConfig::from_lookup(partial).is_err());

        let full = lookup(&[
            ("DENTDESK_OWNER_USERNAME", "owner"),
            ("DENTDESK_OWNER_EMAIL", "owner@clinic.test"),
            ("DENTDESK_OWNER_PASSWORD", "s3cret-pass"),
        ]);
        let config = ServerConfig::from_lookup(full).unwrap();
        assert_eq!(config.bootstrap_owner.unwrap().username, "owner");
    }

    #[test]
    fn client_config_trims_slash() {
        let config = ClientConfig::new("http://localhost:8000/");
        assert_eq!(config.base_url, "http://localhost:8000");
        assert_eq!(config.poll_interval, Duration::from_secs(30));
    }
}
