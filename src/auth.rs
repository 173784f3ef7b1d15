//! Bearer-token sessions.
//!
//! A [`SessionRegistry`] is created once at startup and injected through the
//! router state. Tokens are issued on register/login, resolved on every
//! authenticated request and revoked on logout.

use std::collections::HashMap;

use axum::extract::{FromRef, FromRequestParts};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use chrono::{DateTime, Duration, FixedOffset};
use rand::rngs::OsRng;
use rand::RngCore;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::app::AppState;
use crate::error::AppError;
use crate::models::now_fixed_offset;

#[derive(Debug, Clone)]
struct Session {
    user_id: Uuid,
    email: String,
    issued_at: DateTime<FixedOffset>,
}

pub struct SessionRegistry {
    ttl: Duration,
    sessions: RwLock<HashMap<String, Session>>,
}

impl SessionRegistry {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    pub async fn issue(&self, user_id: Uuid, email: &str) -> String {
        let mut bytes = [0u8; 32];
        OsRng.fill_bytes(&mut bytes);
        let token = hex::encode(bytes);
        let now = now_fixed_offset();

        let mut sessions = self.sessions.write().await;
        // sweep expired tokens that were never presented again
        sessions.retain(|_, s| now - s.issued_at < self.ttl);
        sessions.insert(
            token.clone(),
            Session {
                user_id,
                email: email.to_string(),
                issued_at: now,
            },
        );
        tracing::debug!(user_id = %user_id, "Session issued");
        token
    }

    /// Returns the caller for a live token. Expired tokens are dropped.
    pub async fn resolve(&self, token: &str) -> Option<AuthUser> {
        let now = now_fixed_offset();
        {
            let sessions = self.sessions.read().await;
            let session = sessions.get(token)?;
            if now - session.issued_at < self.ttl {
                return Some(AuthUser {
                    id: session.user_id,
                    email: session.email.clone(),
                    token: token.to_string(),
                });
            }
        }
        self.sessions.write().await.remove(token);
        None
    }

    pub async fn revoke(&self, token: &str) -> bool {
        self.sessions.write().await.remove(token).is_some()
    }
}

/// Authenticated caller, resolved from `Authorization: Bearer <token>`.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Uuid,
    pub email: String,
    pub token: String,
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let state = AppState::from_ref(state);

        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");
        let token = header.strip_prefix("Bearer ").unwrap_or("").trim();

        if token.is_empty() {
            return Err(AppError::Unauthorized("No token, authorization denied".to_string()));
        }

        state
            .sessions
            .resolve(token)
            .await
            .ok_or_else(|| AppError::Unauthorized("Token is not valid".to_string()))
    }
}
