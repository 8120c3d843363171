//! Shared server state: configuration plus per-request database access
//! and the upload store.
//!
//! Held in an `Arc` by the router. Every request opens its own SQLite
//! connection; migrations run once in [`CoreState::init`].

use std::path::{Path, PathBuf};

use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::Connection;
use uuid::Uuid;

use crate::auth::{self, AuthError};
use crate::config::ServerConfig;
use crate::db::{self, DatabaseError};
use crate::models::enums::UserType;
use crate::models::NewUser;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
    #[error("Upload store error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Owner bootstrap failed: {0}")]
    Bootstrap(#[from] AuthError),
}

pub struct CoreState {
    pub config: ServerConfig,
}

impl CoreState {
    /// Prepare storage: create directories, migrate the database and
    /// create the bootstrap owner when configured and no owner exists.
    pub fn init(config: ServerConfig) -> Result<Self, CoreError> {
        if let Some(parent) = config.db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::create_dir_all(&config.upload_dir)?;

        let conn = db::open_database(&config.db_path)?;
        tracing::info!(path = %config.db_path.display(), "Database ready");

        if let Some(owner) = &config.bootstrap_owner {
            if db::count_users(&conn, UserType::Owner)? == 0 {
                let new = NewUser {
                    username: owner.username.clone(),
                    email: owner.email.clone(),
                    password: owner.password.clone(),
                    first_name: "Clinic".into(),
                    last_name: "Owner".into(),
                    ..Default::default()
                };
                let user = auth::create_account(&conn, &new, UserType::Owner, config.pbkdf2_iterations)?;
                tracing::info!(user_id = user.id, "Bootstrap owner created");
            }
        }

        Ok(Self { config })
    }

    /// Open a connection for one request.
    pub fn open_db(&self) -> Result<Connection, CoreError> {
        Ok(db::connect(&self.config.db_path)?)
    }

    pub fn pbkdf2_iterations(&self) -> u32 {
        self.config.pbkdf2_iterations
    }

    pub fn now(&self) -> NaiveDateTime {
        chrono::Local::now().naive_local()
    }

    pub fn today(&self) -> NaiveDate {
        self.now().date()
    }

    // ── Upload store ────────────────────────────────────────

    /// Write an upload under a fresh name, keeping the original extension.
    pub fn store_upload(&self, original_name: &str, bytes: &[u8]) -> Result<String, CoreError> {
        let extension = Path::new(original_name)
            .extension()
            .and_then(|e| e.to_str())
            .filter(|e| e.chars().all(|c| c.is_ascii_alphanumeric()))
            .map(|e| format!(".{}", e.to_ascii_lowercase()))
            .unwrap_or_default();
        let stored_name = format!("{}{extension}", Uuid::new_v4());
        std::fs::write(self.upload_path(&stored_name), bytes)?;
        Ok(stored_name)
    }

    pub fn read_upload(&self, stored_name: &str) -> Result<Vec<u8>, CoreError> {
        Ok(std::fs::read(self.upload_path(stored_name))?)
    }

    /// Remove a stored upload. A file that is already gone is not an error.
    pub fn remove_upload(&self, stored_name: &str) -> Result<(), CoreError> {
        match std::fs::remove_file(self.upload_path(stored_name)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn upload_path(&self, stored_name: &str) -> PathBuf {
        // Stored names are generated here; strip any path component regardless.
        let file_name = Path::new(stored_name)
            .file_name()
            .map(PathBuf::from)
            .unwrap_or_default();
        self.config.upload_dir.join(file_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OwnerBootstrap;

    fn test_config(dir: &Path) -> ServerConfig {
        let mut config = ServerConfig::in_dir(dir);
        config.pbkdf2_iterations = 1_000;
        config
    }

    #[test]
    fn init_creates_database_and_upload_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let core = CoreState::init(test_config(tmp.path())).unwrap();
        assert!(core.config.upload_dir.is_dir());
        let conn = core.open_db().unwrap();
        assert_eq!(db::count_tables(&conn).unwrap(), 18);
    }

    #[test]
    fn bootstrap_owner_created_once() {
        let tmp = tempfile::tempdir().unwrap();
        let mut config = test_config(tmp.path());
        config.bootstrap_owner = Some(OwnerBootstrap {
            username: "owner".into(),
            email: "owner@clinic.test".into(),
            password: "owner-pass-1".into(),
        });

        let core = CoreState::init(config.clone()).unwrap();
        drop(core);
        let core = CoreState::init(config).unwrap();

        let conn = core.open_db().unwrap();
        assert_eq!(db::count_users(&conn, UserType::Owner).unwrap(), 1);
        assert!(auth::login(&conn, "owner", "owner-pass-1").is_ok());
    }

    #[test]
    fn upload_round_trip_and_removal() {
        let tmp = tempfile::tempdir().unwrap();
        let core = CoreState::init(test_config(tmp.path())).unwrap();

        let stored = core.store_upload("X-Ray.PNG", b"image-bytes").unwrap();
        assert!(stored.ends_with(".png"));
        assert_eq!(core.read_upload(&stored).unwrap(), b"image-bytes");

        core.remove_upload(&stored).unwrap();
        assert!(core.read_upload(&stored).is_err());
        core.remove_upload(&stored).unwrap();
    }

    #[test]
    fn upload_path_ignores_directories() {
        let tmp = tempfile::tempdir().unwrap();
        let core = CoreState::init(test_config(tmp.path())).unwrap();
        assert_eq!(
            core.upload_path("../../etc/passwd"),
            core.config.upload_dir.join("passwd")
        );
    }
}
