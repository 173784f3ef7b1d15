// --------------------------------------------------
// Identity record store
//
// Users live in the same document store as tasks.
// Passwords are kept as argon2 PHC strings with a random salt.
// --------------------------------------------------

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use chrono::{DateTime, FixedOffset};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{Db, Preferences, User, UserStats};

/// Public view of a user, without the password hash.
#[derive(Debug, Clone, Serialize)]
pub struct UserProfile {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub preferences: Preferences,
    pub stats: UserStats,
    pub created_at: DateTime<FixedOffset>,
    pub last_login: DateTime<FixedOffset>,
}

impl From<&User> for UserProfile {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            name: display_name(user),
            preferences: user.preferences.clone(),
            stats: user.stats.clone(),
            created_at: user.created_at,
            last_login: user.last_login,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct PreferencesPatch {
    pub theme: Option<String>,
    pub notifications_enabled: Option<bool>,
    pub focus_session_duration: Option<u32>,
    pub break_duration: Option<u32>,
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

// Falls back to the local part of the email
pub fn display_name(user: &User) -> String {
    match user.name.as_deref().map(str::trim) {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => user
            .email
            .split('@')
            .next()
            .unwrap_or_default()
            .to_string(),
    }
}

pub fn hash_password(plaintext: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(plaintext.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| AppError::Internal(format!("password hashing failed: {e}")))
}

pub fn verify_password(user: &User, plaintext: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(&user.password_hash) else {
        tracing::warn!(user_id = %user.id, "Stored password hash is malformed");
        return false;
    };
    Argon2::default()
        .verify_password(plaintext.as_bytes(), &parsed)
        .is_ok()
}

// Argon2 is deliberately slow; these run it on the blocking pool so the
// store lock and the async workers stay free.
pub async fn hash_password_blocking(plaintext: String) -> Result<String, AppError> {
    tokio::task::spawn_blocking(move || hash_password(&plaintext))
        .await
        .map_err(|e| AppError::Internal(format!("hashing task failed: {e}")))?
}

pub async fn verify_password_blocking(user: User, plaintext: String) -> bool {
    match tokio::task::spawn_blocking(move || verify_password(&user, &plaintext)).await {
        Ok(ok) => ok,
        Err(e) => {
            tracing::error!(error = %e, "Password verification task failed");
            false
        }
    }
}

pub fn invalid_credentials() -> AppError {
    AppError::BadRequest("Invalid credentials".to_string())
}

pub fn find_by_id(db: &Db, id: Uuid) -> Option<&User> {
    db.users.iter().find(|u| u.id == id)
}

pub fn find_by_email<'a>(db: &'a Db, email: &str) -> Option<&'a User> {
    let email = normalize_email(email);
    db.users.iter().find(|u| u.email == email)
}

// Validates a registration and returns the normalized email
pub fn check_registration(db: &Db, email: &str, password: &str) -> Result<String, AppError> {
    let email = normalize_email(email);
    if email.is_empty() || !email.contains('@') {
        return Err(AppError::BadRequest("valid email required".to_string()));
    }
    if password.is_empty() {
        return Err(AppError::BadRequest("password required".to_string()));
    }
    if find_by_email(db, &email).is_some() {
        return Err(AppError::Conflict("User already exists".to_string()));
    }
    Ok(email)
}

// The email may have been taken while the hash was computed, so it is checked again
pub fn insert_user(
    db: &mut Db,
    email: &str,
    password_hash: String,
    name: Option<String>,
    now: DateTime<FixedOffset>,
) -> Result<User, AppError> {
    let email = normalize_email(email);
    if find_by_email(db, &email).is_some() {
        return Err(AppError::Conflict("User already exists".to_string()));
    }

    let user = User {
        id: Uuid::new_v4(),
        email,
        password_hash,
        name: name.filter(|n| !n.trim().is_empty()),
        preferences: Preferences::default(),
        stats: UserStats::default(),
        created_at: now,
        last_login: now,
    };

    tracing::info!(user_id = %user.id, "User registered");
    db.users.push(user.clone());
    Ok(user)
}

/// Check, hash and insert in one go. Used where no lock is involved
/// (demo seeding).
pub fn register(
    db: &mut Db,
    email: &str,
    password: &str,
    name: Option<String>,
    now: DateTime<FixedOffset>,
) -> Result<User, AppError> {
    let email = check_registration(db, email, password)?;
    let hash = hash_password(password)?;
    insert_user(db, &email, hash, name, now)
}

pub fn record_login(db: &mut Db, user_id: Uuid, now: DateTime<FixedOffset>) -> Result<User, AppError> {
    let user = db
        .users
        .iter_mut()
        .find(|u| u.id == user_id)
        .ok_or_else(invalid_credentials)?;
    user.last_login = now;
    Ok(user.clone())
}

pub fn update_preferences(
    db: &mut Db,
    user_id: Uuid,
    patch: PreferencesPatch,
) -> Result<User, AppError> {
    let user = db
        .users
        .iter_mut()
        .find(|u| u.id == user_id)
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    let prefs = &mut user.preferences;
    if let Some(theme) = patch.theme {
        prefs.theme = theme;
    }
    if let Some(enabled) = patch.notifications_enabled {
        prefs.notifications_enabled = enabled;
    }
    if let Some(mins) = patch.focus_session_duration {
        if mins == 0 {
            return Err(AppError::BadRequest("focus_session_duration must be > 0".to_string()));
        }
        prefs.focus_session_duration = mins;
    }
    if let Some(mins) = patch.break_duration {
        prefs.break_duration = mins;
    }

    Ok(user.clone())
}

// Lifetime counters; a missing user is ignored so task writes never fail on stats
pub(crate) fn record_stats(db: &mut Db, user_id: Uuid, f: impl FnOnce(&mut UserStats)) {
    match db.users.iter_mut().find(|u| u.id == user_id) {
        Some(user) => f(&mut user.stats),
        None => tracing::debug!(user_id = %user_id, "Stats update for unknown user skipped"),
    }
}
