//! Shared fixtures for router and client tests.

use std::sync::Arc;

use tempfile::TempDir;

use crate::auth;
use crate::config::ServerConfig;
use crate::core_state::CoreState;
use crate::models::enums::UserType;
use crate::models::{NewUser, User};

pub const TEST_PASSWORD: &str = "correct-horse-1";

/// A migrated database and upload dir in a temp directory. Keep the
/// `TempDir` alive for the duration of the test.
pub fn test_core() -> (Arc<CoreState>, TempDir) {
    let tmp = tempfile::tempdir().unwrap();
    let mut config = ServerConfig::in_dir(tmp.path());
    config.pbkdf2_iterations = 1_000;
    let core = CoreState::init(config).unwrap();
    (Arc::new(core), tmp)
}

/// Create an account of the given role and log it in.
pub fn seed_user(core: &CoreState, username: &str, user_type: UserType) -> (User, String) {
    let conn = core.open_db().unwrap();
    let new = NewUser {
        username: username.into(),
        email: format!("{username}@clinic.test"),
        password: TEST_PASSWORD.into(),
        first_name: capitalize(username),
        last_name: "Test".into(),
        ..Default::default()
    };
    let user = auth::create_account(&conn, &new, user_type, core.pbkdf2_iterations()).unwrap();
    let session = auth::login(&conn, username, TEST_PASSWORD).unwrap();
    (user, session.token)
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
