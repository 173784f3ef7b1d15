// --------------------------------------------------
// Registration, login/logout and the caller's profile
// and preferences.
// --------------------------------------------------

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::app::AppState;
use crate::auth::AuthUser;
use crate::error::AppError;
use crate::identity::{self, PreferencesPatch, UserProfile};
use crate::models::{now_fixed_offset, Preferences};

#[derive(Debug, Deserialize)]
pub struct RegisterInput {
    pub email: String,
    pub password: String,
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginInput {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: UserProfile,
}

// -----------------------------
// POST /api/auth/register
// -----------------------------
pub async fn register(
    State(state): State<AppState>,
    Json(input): Json<RegisterInput>,
) -> Result<Json<AuthResponse>, AppError> {
    let email = state
        .store
        .read(|db| identity::check_registration(db, &input.email, &input.password))
        .await?;

    // hash without holding the store lock
    let hash = identity::hash_password_blocking(input.password).await?;

    let now = now_fixed_offset();
    let user = state
        .store
        .mutate(|db| identity::insert_user(db, &email, hash, input.name, now))
        .await?;

    let token = state.sessions.issue(user.id, &user.email).await;
    Ok(Json(AuthResponse {
        token,
        user: UserProfile::from(&user),
    }))
}

// -----------------------------
// POST /api/auth/login
// -----------------------------
pub async fn login(
    State(state): State<AppState>,
    Json(input): Json<LoginInput>,
) -> Result<Json<AuthResponse>, AppError> {
    let candidate = state
        .store
        .read(|db| identity::find_by_email(db, &input.email).cloned())
        .await
        .ok_or_else(identity::invalid_credentials)?;

    if !identity::verify_password_blocking(candidate.clone(), input.password).await {
        return Err(identity::invalid_credentials());
    }

    let now = now_fixed_offset();
    let user = state
        .store
        .mutate(|db| identity::record_login(db, candidate.id, now))
        .await?;

    tracing::info!(user_id = %user.id, "User logged in");
    let token = state.sessions.issue(user.id, &user.email).await;
    Ok(Json(AuthResponse {
        token,
        user: UserProfile::from(&user),
    }))
}

// -----------------------------
// POST /api/auth/logout
// Drops the caller's token
// -----------------------------
pub async fn logout(
    State(state): State<AppState>,
    user: AuthUser,
) -> Json<serde_json::Value> {
    state.sessions.revoke(&user.token).await;
    Json(serde_json::json!({ "ok": true }))
}

// -----------------------------
// GET /api/auth/me
// -----------------------------
pub async fn me(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<UserProfile>, AppError> {
    state
        .store
        .read(|db| identity::find_by_id(db, user.id).map(UserProfile::from))
        .await
        .map(Json)
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))
}

// -----------------------------
// GET /api/auth/preferences
// -----------------------------
pub async fn get_preferences(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<Preferences>, AppError> {
    state
        .store
        .read(|db| identity::find_by_id(db, user.id).map(|u| u.preferences.clone()))
        .await
        .map(Json)
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))
}

// -----------------------------
// PUT /api/auth/preferences
// Partial update of the caller's preferences
// -----------------------------
pub async fn put_preferences(
    State(state): State<AppState>,
    user: AuthUser,
    Json(patch): Json<PreferencesPatch>,
) -> Result<Json<Preferences>, AppError> {
    let updated = state
        .store
        .mutate(|db| identity::update_preferences(db, user.id, patch))
        .await?;
    Ok(Json(updated.preferences))
}
