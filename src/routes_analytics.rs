use axum::{
    extract::{Query, State},
    Json,
};
use chrono::{DateTime, FixedOffset, Utc};
use serde::Deserialize;

use crate::analytics::{self, AnalyticsSummary};
use crate::app::AppState;
use crate::auth::AuthUser;
use crate::error::AppError;
use crate::models::now_fixed_offset;
use crate::suggest::{self, Suggestions};
use crate::tasks;

#[derive(Debug, Deserialize)]
pub struct AnalyticsQuery {
    // client's UTC offset; hour-of-day buckets are read in this zone
    pub tz_offset_minutes: Option<i32>,
}

fn now_in(tz_offset_minutes: Option<i32>) -> Result<DateTime<FixedOffset>, AppError> {
    match tz_offset_minutes {
        None => Ok(now_fixed_offset()),
        Some(mins) => FixedOffset::east_opt(mins * 60)
            .map(|offset| Utc::now().with_timezone(&offset))
            .ok_or_else(|| AppError::BadRequest("invalid tz_offset_minutes".to_string())),
    }
}

// -----------------------------
// GET /api/analytics
// Summary over the caller's own tasks (drafts excluded)
// -----------------------------
pub async fn get_analytics(
    State(state): State<AppState>,
    user: AuthUser,
    Query(q): Query<AnalyticsQuery>,
) -> Result<Json<AnalyticsSummary>, AppError> {
    let now = now_in(q.tz_offset_minutes)?;
    let owned = state.store.read(|db| tasks::list(db, user.id)).await;
    Ok(Json(analytics::summarize(&owned, now)))
}

// -----------------------------
// GET /api/suggestions
// Top open tasks to work on next, with suggested focus blocks
// -----------------------------
pub async fn get_suggestions(
    State(state): State<AppState>,
    user: AuthUser,
) -> Json<Suggestions> {
    let now = now_fixed_offset();
    let owned = state.store.read(|db| tasks::list(db, user.id)).await;
    Json(suggest::suggest(&owned, now))
}
