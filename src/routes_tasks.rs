// --------------------------------------------------
// Handles API endpoints related to tasks.
//
// Responsibilities:
// - Create / read / update / delete own tasks
// - Focus sessions (start / break / end)
// - Collaboration (share / assign / comment / complete)
// - Tasks shared with the caller
// --------------------------------------------------

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::app::AppState;
use crate::auth::AuthUser;
use crate::error::AppError;
use crate::focus;
use crate::models::{now_fixed_offset, BreakRecord, Task};
use crate::tasks::{self, NewTask, TaskPatch};

fn parse_id(id: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(id).map_err(|_| AppError::BadRequest("invalid id".to_string()))
}

#[derive(Debug, Deserialize)]
pub struct EmailInput {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct CommentInput {
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct CompleteInput {
    #[serde(default)]
    pub time_spent: u64, // seconds
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct EndFocusInput {
    pub duration: u64, // seconds
}

// -----------------------------
// GET /api/tasks
// Caller's own tasks, most important first
// -----------------------------
pub async fn get_tasks(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<Vec<Task>>, AppError> {
    let tasks = state.store.read(|db| tasks::list(db, user.id)).await;
    Ok(Json(tasks))
}

// -----------------------------
// GET /api/tasks/shared
// Tasks other users shared with the caller's email
// -----------------------------
pub async fn get_shared_tasks(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<Vec<Task>>, AppError> {
    let tasks = state
        .store
        .read(|db| tasks::list_shared(db, &user.email))
        .await;
    Ok(Json(tasks))
}

// -----------------------------
// POST /api/tasks
// Creates a new task owned by the caller
// -----------------------------
pub async fn create_task(
    State(state): State<AppState>,
    user: AuthUser,
    Json(input): Json<NewTask>,
) -> Result<(StatusCode, Json<Task>), AppError> {
    let now = now_fixed_offset();
    let task = state
        .store
        .mutate(|db| tasks::create(db, user.id, input, now))
        .await?;
    Ok((StatusCode::CREATED, Json(task)))
}

// -----------------------------
// PUT /api/tasks/:id
// Merges scalar fields into an owned task
// -----------------------------
pub async fn update_task(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
    Json(patch): Json<TaskPatch>,
) -> Result<Json<Task>, AppError> {
    let id = parse_id(&id)?;
    let now = now_fixed_offset();
    let task = state
        .store
        .mutate(|db| tasks::update(db, user.id, id, patch, now))
        .await?;
    Ok(Json(task))
}

// -----------------------------
// DELETE /api/tasks/:id
// Removes an owned task permanently
// -----------------------------
pub async fn delete_task(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let id = parse_id(&id)?;
    state
        .store
        .mutate(|db| tasks::delete(db, user.id, id))
        .await?;
    Ok(Json(serde_json::json!({ "msg": "Task deleted" })))
}

// -----------------------------
// POST /api/tasks/:id/focus/start
// -----------------------------
pub async fn start_focus(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<Task>, AppError> {
    let id = parse_id(&id)?;
    let now = now_fixed_offset();
    let task = state
        .store
        .mutate(|db| focus::start_focus_session(db, user.id, id, now))
        .await?;
    Ok(Json(task))
}

// -----------------------------
// POST /api/tasks/:id/focus/end
// Closes the last session with the client-measured duration
// -----------------------------
pub async fn end_focus(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
    Json(input): Json<EndFocusInput>,
) -> Result<Json<Task>, AppError> {
    let id = parse_id(&id)?;
    let now = now_fixed_offset();
    let task = state
        .store
        .mutate(|db| focus::end_focus_session(db, user.id, id, input.duration, now))
        .await?;
    Ok(Json(task))
}

// -----------------------------
// POST /api/tasks/:id/focus/break
// -----------------------------
pub async fn record_break(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
    Json(brk): Json<BreakRecord>,
) -> Result<Json<Task>, AppError> {
    let id = parse_id(&id)?;
    let now = now_fixed_offset();
    let task = state
        .store
        .mutate(|db| focus::record_break(db, user.id, id, brk, now))
        .await?;
    Ok(Json(task))
}

// -----------------------------
// POST /api/tasks/:id/share
// -----------------------------
pub async fn share_task(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
    Json(input): Json<EmailInput>,
) -> Result<Json<Task>, AppError> {
    let id = parse_id(&id)?;
    let now = now_fixed_offset();
    let task = state
        .store
        .mutate_if(|db| tasks::share(db, user.id, id, &input.email, now))
        .await?;
    Ok(Json(task))
}

// -----------------------------
// POST /api/tasks/:id/assign
// Toggles assignment of a shared-with entry
// -----------------------------
pub async fn assign_task(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
    Json(input): Json<EmailInput>,
) -> Result<Json<Task>, AppError> {
    let id = parse_id(&id)?;
    let now = now_fixed_offset();
    let task = state
        .store
        .mutate(|db| tasks::assign(db, user.id, id, &input.email, now))
        .await?;
    Ok(Json(task))
}

// -----------------------------
// POST /api/tasks/:id/comment
// Owner or collaborators only
// -----------------------------
pub async fn add_comment(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
    Json(input): Json<CommentInput>,
) -> Result<Json<Task>, AppError> {
    let id = parse_id(&id)?;
    let now = now_fixed_offset();
    let task = state
        .store
        .mutate(|db| tasks::add_comment(db, user.id, &user.email, id, &input.text, now))
        .await?;
    Ok(Json(task))
}

// -----------------------------
// POST /api/tasks/:id/complete
// Marks done and appends a completion record
// -----------------------------
pub async fn complete_task(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
    Json(input): Json<CompleteInput>,
) -> Result<Json<Task>, AppError> {
    let id = parse_id(&id)?;
    let now = now_fixed_offset();
    let task = state
        .store
        .mutate(|db| tasks::complete(db, user.id, id, input.time_spent, input.notes, now))
        .await?;
    Ok(Json(task))
}
