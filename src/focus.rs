// Focus-session tracker.
//
// Idle --start--> Running --end--> Idle; breaks are recorded while Running
// and do not change the state. Break and end always act on the last
// session. Elapsed-time timers belong to the client, which reports
// boundaries here.

use chrono::{DateTime, FixedOffset};
use serde::Serialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::identity;
use crate::models::{BreakRecord, Db, FocusSession, Task};
use crate::tasks::owned_task_mut;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FocusState {
    Idle,
    Running,
}

pub fn focus_state(task: &Task) -> FocusState {
    match task.focus_sessions.last() {
        Some(s) if s.end_time.is_none() => FocusState::Running,
        _ => FocusState::Idle,
    }
}

fn no_session() -> AppError {
    AppError::BadRequest("No active focus session found".to_string())
}

// Appends unconditionally; an already running session is left open
pub fn start_focus_session(
    db: &mut Db,
    owner_id: Uuid,
    task_id: Uuid,
    now: DateTime<FixedOffset>,
) -> Result<Task, AppError> {
    let t = owned_task_mut(db, owner_id, task_id, "start focus session for")?;

    if focus_state(t) == FocusState::Running {
        tracing::warn!(task_id = %task_id, "Starting a focus session while another is still open");
    }

    t.focus_sessions.push(FocusSession {
        start_time: now,
        end_time: None,
        duration: None,
        breaks: Vec::new(),
    });
    t.updated_at = now;

    tracing::debug!(task_id = %task_id, sessions = t.focus_sessions.len(), "Focus session started");
    Ok(t.clone())
}

pub fn end_focus_session(
    db: &mut Db,
    owner_id: Uuid,
    task_id: Uuid,
    duration: u64,
    now: DateTime<FixedOffset>,
) -> Result<Task, AppError> {
    let t = owned_task_mut(db, owner_id, task_id, "end focus session for")?;

    let session = t.focus_sessions.last_mut().ok_or_else(no_session)?;
    session.end_time = Some(now);
    session.duration = Some(duration);

    t.last_time_spent = duration;
    t.updated_at = now;
    let task = t.clone();

    identity::record_stats(db, owner_id, |s| {
        s.focus_sessions_completed += 1;
        s.total_focus_time += duration;
    });

    tracing::debug!(task_id = %task_id, duration, "Focus session ended");
    Ok(task)
}

pub fn record_break(
    db: &mut Db,
    owner_id: Uuid,
    task_id: Uuid,
    brk: BreakRecord,
    now: DateTime<FixedOffset>,
) -> Result<Task, AppError> {
    let t = owned_task_mut(db, owner_id, task_id, "record break for")?;

    let session = t.focus_sessions.last_mut().ok_or_else(no_session)?;
    session.breaks.push(brk);

    t.updated_at = now;
    Ok(t.clone())
}
