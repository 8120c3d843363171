//! Accounts, passwords and opaque bearer tokens.
//!
//! Passwords are stored as `pbkdf2_sha256$<iterations>$<salt>$<hash>`
//! (base64 salt and hash). Tokens are 32 random bytes, URL-safe base64;
//! only their SHA-256 digest is persisted.

use std::sync::LazyLock;

use base64::engine::general_purpose::STANDARD_NO_PAD;
use base64::Engine;
use chrono::{Duration, NaiveDateTime};
use pbkdf2::pbkdf2_hmac;
use regex::Regex;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use thiserror::Error;

use crate::db::{self, DatabaseError};
use crate::models::enums::UserType;
use crate::models::*;

pub const MIN_PASSWORD_LEN: usize = 8;
pub const DEFAULT_PBKDF2_ITERATIONS: u32 = 600_000;
pub const RESET_TOKEN_TTL_MINUTES: i64 = 60;

const HASH_ALGORITHM: &str = "pbkdf2_sha256";
const SALT_LENGTH: usize = 16;
const HASH_LENGTH: usize = 32;

static EMAIL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap());

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Conflict(String),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

/// Returned by register and login.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: User,
}

// ─── Passwords ────────────────────────────────────────────────────────────────

pub fn hash_password(password: &str, iterations: u32) -> String {
    use rand::RngCore;
    let mut salt = [0u8; SALT_LENGTH];
    rand::thread_rng().fill_bytes(&mut salt);
    let mut hash = [0u8; HASH_LENGTH];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), &salt, iterations, &mut hash);
    format!(
        "{HASH_ALGORITHM}${iterations}${}${}",
        STANDARD_NO_PAD.encode(salt),
        STANDARD_NO_PAD.encode(hash)
    )
}

/// Constant-time check against a stored hash. Malformed hashes never
/// verify.
pub fn verify_password(password: &str, stored: &str) -> bool {
    let mut parts = stored.split('$');
    let (Some(algorithm), Some(iterations), Some(salt), Some(expected), None) = (
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
    ) else {
        return false;
    };
    if algorithm != HASH_ALGORITHM {
        return false;
    }
    let (Ok(iterations), Ok(salt), Ok(expected)) = (
        iterations.parse::<u32>(),
        STANDARD_NO_PAD.decode(salt),
        STANDARD_NO_PAD.decode(expected),
    ) else {
        return false;
    };
    if iterations == 0 || expected.len() != HASH_LENGTH {
        return false;
    }
    let mut actual = [0u8; HASH_LENGTH];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), &salt, iterations, &mut actual);
    actual.as_slice().ct_eq(expected.as_slice()).into()
}

pub fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AuthError::Validation(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

pub fn validate_email(email: &str) -> Result<(), AuthError> {
    if EMAIL_PATTERN.is_match(email.trim()) {
        Ok(())
    } else {
        Err(AuthError::Validation("Enter a valid email address".into()))
    }
}

// ─── Tokens ───────────────────────────────────────────────────────────────────

/// Generate a random bearer token (URL-safe base64, 32 bytes of entropy).
pub fn generate_token() -> String {
    let bytes: [u8; 32] = rand::random();
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

/// Hex SHA-256 digest used as the storage key for a token.
pub fn hash_token(token: &str) -> String {
    let digest = Sha256::digest(token.as_bytes());
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

fn issue_token(conn: &Connection, user_id: i64) -> Result<String, AuthError> {
    let token = generate_token();
    db::insert_auth_token(conn, &hash_token(&token), user_id)?;
    Ok(token)
}

/// Resolve a bearer token to the calling user.
pub fn authenticate(conn: &Connection, token: &str) -> Result<Actor, AuthError> {
    let user_id = db::find_token_user(conn, &hash_token(token))?.ok_or(AuthError::InvalidToken)?;
    let user = match db::get_user(conn, user_id) {
        Ok(user) => user,
        Err(DatabaseError::NotFound { .. }) => return Err(AuthError::InvalidToken),
        Err(e) => return Err(e.into()),
    };
    Ok(Actor {
        user_id: user.id,
        user_type: user.user_type,
        name: user.full_name(),
    })
}

// ─── Accounts ─────────────────────────────────────────────────────────────────

fn validate_new_user(conn: &Connection, new: &NewUser) -> Result<(), AuthError> {
    if new.username.trim().is_empty() {
        return Err(AuthError::Validation("Username is required".into()));
    }
    validate_email(&new.email)?;
    validate_password(&new.password)?;
    if db::username_or_email_taken(conn, &new.username, &new.email)? {
        return Err(AuthError::Conflict(
            "A user with that username or email already exists".into(),
        ));
    }
    Ok(())
}

/// Create an account of the given role without logging it in.
pub fn create_account(
    conn: &Connection,
    new: &NewUser,
    user_type: UserType,
    iterations: u32,
) -> Result<User, AuthError> {
    validate_new_user(conn, new)?;
    let hash = hash_password(&new.password, iterations);
    let id = db::insert_user(conn, new, user_type, &hash)?;
    tracing::info!(user_id = id, role = %user_type, "Account created");
    Ok(db::get_user(conn, id)?)
}

/// Public self-registration. Always creates a patient, whatever the
/// payload claims.
pub fn register(conn: &Connection, new: &NewUser, iterations: u32) -> Result<AuthResponse, AuthError> {
    let user = create_account(conn, new, UserType::Patient, iterations)?;
    let token = issue_token(conn, user.id)?;
    Ok(AuthResponse { token, user })
}

/// Log in by username or email.
pub fn login(conn: &Connection, identifier: &str, password: &str) -> Result<AuthResponse, AuthError> {
    let Some((user_id, stored)) = db::find_credentials(conn, identifier)? else {
        tracing::warn!("Login failed: unknown account");
        return Err(AuthError::InvalidCredentials);
    };
    if !verify_password(password, &stored) {
        tracing::warn!(user_id, "Login failed: wrong password");
        return Err(AuthError::InvalidCredentials);
    }
    let token = issue_token(conn, user_id)?;
    let user = db::get_user(conn, user_id)?;
    tracing::info!(user_id, "Login succeeded");
    Ok(AuthResponse { token, user })
}

pub fn logout(conn: &Connection, token: &str) -> Result<(), AuthError> {
    db::delete_auth_token(conn, &hash_token(token))?;
    Ok(())
}

/// Apply a profile update, hashing a new password if one is supplied.
pub fn update_profile(
    conn: &Connection,
    user_id: i64,
    update: &UserUpdate,
    allow_role_change: bool,
    iterations: u32,
) -> Result<User, AuthError> {
    if let Some(email) = &update.email {
        validate_email(email)?;
    }
    if let Some(password) = &update.password {
        validate_password(password)?;
    }
    let tx = conn.unchecked_transaction().map_err(DatabaseError::from)?;
    let user = match db::update_user(&tx, user_id, update, allow_role_change) {
        Err(e) if e.is_constraint() => {
            return Err(AuthError::Conflict("That email is already in use".into()))
        }
        other => other?,
    };
    if let Some(password) = &update.password {
        db::set_password_hash(&tx, user_id, &hash_password(password, iterations))?;
    }
    tx.commit().map_err(DatabaseError::from)?;
    Ok(user)
}

// ─── Password reset ───────────────────────────────────────────────────────────

/// Start a reset. Returns the raw token when the email belongs to an
/// account; callers must answer identically either way.
pub fn request_password_reset(
    conn: &Connection,
    email: &str,
    now: NaiveDateTime,
) -> Result<Option<String>, AuthError> {
    let Some(user_id) = db::find_user_id_by_email(conn, email)? else {
        tracing::info!("Password reset requested for unknown email");
        return Ok(None);
    };
    let token = generate_token();
    let expires_at = now + Duration::minutes(RESET_TOKEN_TTL_MINUTES);
    db::insert_password_reset(conn, &hash_token(&token), user_id, expires_at)?;
    // No mail transport: the token goes to the server log for the operator.
    tracing::info!(user_id, reset_token = %token, expires_at = %expires_at, "Password reset token issued");
    Ok(Some(token))
}

/// Finish a reset. Consumes the token and revokes every existing session.
pub fn confirm_password_reset(
    conn: &Connection,
    token: &str,
    new_password: &str,
    iterations: u32,
    now: NaiveDateTime,
) -> Result<(), AuthError> {
    validate_password(new_password)?;
    let tx = conn.unchecked_transaction().map_err(DatabaseError::from)?;
    let user_id = db::consume_password_reset(&tx, &hash_token(token), now)?
        .ok_or(AuthError::InvalidToken)?;
    db::set_password_hash(&tx, user_id, &hash_password(new_password, iterations))?;
    let revoked = db::delete_user_tokens(&tx, user_id)?;
    tx.commit().map_err(DatabaseError::from)?;
    tracing::info!(user_id, revoked, "Password reset completed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::open_memory_database;

    const ITER: u32 = 1_000;

    fn new_user(username: &str, password: &str) -> NewUser {
        NewUser {
            username: username.into(),
            email: format!("{username}@example.com"),
            password: password.into(),
            first_name: "Test".into(),
            last_name: "User".into(),
            user_type: Some(UserType::Owner),
            phone: String::new(),
            address: String::new(),
            birthday: None,
            age: None,
        }
    }

    fn now() -> NaiveDateTime {
        chrono::Local::now().naive_local()
    }

    #[test]
    fn password_hash_round_trip() {
        let stored = hash_password("correct horse", ITER);
        assert!(stored.starts_with("pbkdf2_sha256$1000$"));
        assert!(verify_password("correct horse", &stored));
        assert!(!verify_password("wrong horse", &stored));
    }

    #[test]
    fn same_password_gets_different_salts() {
        assert_ne!(hash_password("samepass", ITER), hash_password("samepass", ITER));
    }

    #[test]
    fn malformed_hash_never_verifies() {
        assert!(!verify_password("x", ""));
        assert!(!verify_password("x", "md5$1$abc$def"));
        assert!(!verify_password("x", "pbkdf2_sha256$notanumber$abc$def"));
        assert!(!verify_password("x", "pbkdf2_sha256$0$abc$def"));
    }

    #[test]
    fn token_hash_is_hex_sha256() {
        let h = hash_token("abc");
        assert_eq!(h, "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad");
        assert_ne!(generate_token(), generate_token());
    }

    #[test]
    fn email_validation() {
        assert!(validate_email("a@b.co").is_ok());
        assert!(validate_email("no-at-sign").is_err());
        assert!(validate_email("two@@at.com").is_err());
        assert!(validate_email("spa ce@x.com").is_err());
    }

    #[test]
    fn register_forces_patient_role() {
        let conn = open_memory_database().unwrap();
        let resp = register(&conn, &new_user("ana", "password1"), ITER).unwrap();
        assert_eq!(resp.user.user_type, UserType::Patient);
        let actor = authenticate(&conn, &resp.token).unwrap();
        assert_eq!(actor.user_id, resp.user.id);
        assert_eq!(actor.name, "Test User");
    }

    #[test]
    fn register_rejects_short_password_and_duplicates() {
        let conn = open_memory_database().unwrap();
        assert!(matches!(
            register(&conn, &new_user("ana", "short"), ITER),
            Err(AuthError::Validation(_))
        ));
        register(&conn, &new_user("ana", "password1"), ITER).unwrap();
        assert!(matches!(
            register(&conn, &new_user("ana", "password1"), ITER),
            Err(AuthError::Conflict(_))
        ));
    }

    #[test]
    fn login_by_username_or_email_and_logout() {
        let conn = open_memory_database().unwrap();
        register(&conn, &new_user("ben", "password1"), ITER).unwrap();

        let by_name = login(&conn, "ben", "password1").unwrap();
        let by_email = login(&conn, "ben@example.com", "password1").unwrap();
        assert_ne!(by_name.token, by_email.token);
        assert!(matches!(login(&conn, "ben", "nope-nope"), Err(AuthError::InvalidCredentials)));
        assert!(matches!(login(&conn, "ghost", "password1"), Err(AuthError::InvalidCredentials)));

        logout(&conn, &by_name.token).unwrap();
        assert!(matches!(authenticate(&conn, &by_name.token), Err(AuthError::InvalidToken)));
        assert!(authenticate(&conn, &by_email.token).is_ok());
    }

    #[test]
    fn password_reset_flow() {
        let conn = open_memory_database().unwrap();
        let resp = register(&conn, &new_user("cat", "password1"), ITER).unwrap();

        assert!(request_password_reset(&conn, "nobody@example.com", now()).unwrap().is_none());
        let token = request_password_reset(&conn, "cat@example.com", now()).unwrap().unwrap();

        assert!(matches!(
            confirm_password_reset(&conn, &token, "short", ITER, now()),
            Err(AuthError::Validation(_))
        ));
        confirm_password_reset(&conn, &token, "brand-new-pass", ITER, now()).unwrap();

        assert!(login(&conn, "cat", "password1").is_err());
        assert!(login(&conn, "cat", "brand-new-pass").is_ok());
        assert!(matches!(authenticate(&conn, &resp.token), Err(AuthError::InvalidToken)));
        assert!(matches!(
            confirm_password_reset(&conn, &token, "another-pass", ITER, now()),
            Err(AuthError::InvalidToken)
        ));
    }

    #[test]
    fn expired_reset_token_rejected() {
        let conn = open_memory_database().unwrap();
        register(&conn, &new_user("dee", "password1"), ITER).unwrap();
        let issued = now() - Duration::minutes(RESET_TOKEN_TTL_MINUTES + 1);
        let token = request_password_reset(&conn, "dee@example.com", issued).unwrap().unwrap();
        assert!(matches!(
            confirm_password_reset(&conn, &token, "brand-new-pass", ITER, now()),
            Err(AuthError::InvalidToken)
        ));
    }

    #[test]
    fn profile_update_changes_password() {
        let conn = open_memory_database().unwrap();
        let resp = register(&conn, &new_user("eve", "password1"), ITER).unwrap();
        let update = UserUpdate {
            password: Some("new-password".into()),
            phone: Some("123".into()),
            ..Default::default()
        };
        let user = update_profile(&conn, resp.user.id, &update, false, ITER).unwrap();
        assert_eq!(user.phone, "123");
        assert!(login(&conn, "eve", "new-password").is_ok());

        let bad = UserUpdate {
            email: Some("broken".into()),
            ..Default::default()
        };
        assert!(update_profile(&conn, resp.user.id, &bad, false, ITER).is_err());
    }
}
