/*
Task lifecycle: CRUD plus ownership-gated collaboration.
Operates on the in-memory `Db` handed out by `Store::mutate`,
so it stays independent from HTTP / Axum for testing.
*/

use std::cmp::Ordering;

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Deserializer};
use uuid::Uuid;

use crate::error::AppError;
use crate::identity::{self, normalize_email};
use crate::models::{Comment, CompletionRecord, Db, Recurrence, SharedWith, Task};
use crate::store::check_task_schema;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewTask {
    pub title: String,
    pub description: Option<String>,
    pub deadline: Option<DateTime<FixedOffset>>,
    pub importance: Option<i64>,
    #[serde(default)]
    pub draft: bool,
    pub notes: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub time_estimate: Option<u64>,
    pub recurrence: Option<Recurrence>,
}

// Scalar fields only. Array-valued fields (shared_with, comments,
// completion_records, focus_sessions) change through their own operations,
// and so do `completed` (complete) and `last_time_spent` (end of a focus
// session); any such keys in the payload are ignored.
//
// Nullable fields use Option<Option<T>>: absent = keep, null = clear.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskPatch {
    pub title: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub deadline: Option<Option<DateTime<FixedOffset>>>,
    pub importance: Option<i64>,
    #[serde(default, deserialize_with = "nullable")]
    pub notes: Option<Option<String>>,
    pub tags: Option<Vec<String>>,
    pub draft: Option<bool>,
    #[serde(default, deserialize_with = "nullable")]
    pub time_estimate: Option<Option<u64>>,
    #[serde(default, deserialize_with = "nullable")]
    pub recurrence: Option<Option<Recurrence>>,
}

fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

// Tags behave as a set; first occurrence wins
fn dedup_tags(tags: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        let tag = tag.trim().to_string();
        if !tag.is_empty() && !out.contains(&tag) {
            out.push(tag);
        }
    }
    out
}

fn find_task_mut(db: &mut Db, task_id: Uuid) -> Result<&mut Task, AppError> {
    db.tasks
        .iter_mut()
        .find(|t| t.id == task_id)
        .ok_or_else(AppError::task_not_found)
}

// NotFound first, then Unauthorized for anyone but the owner
pub(crate) fn owned_task_mut<'a>(
    db: &'a mut Db,
    owner_id: Uuid,
    task_id: Uuid,
    action: &str,
) -> Result<&'a mut Task, AppError> {
    let task = find_task_mut(db, task_id)?;
    if task.owner_id != owner_id {
        tracing::warn!(task_id = %task_id, caller = %owner_id, action, "Ownership check failed");
        return Err(AppError::Unauthorized(format!(
            "Not authorized to {action} this task"
        )));
    }
    Ok(task)
}

// Ordering for list(): importance desc, then deadline asc, no deadline last
fn list_order(a: &Task, b: &Task) -> Ordering {
    b.importance
        .cmp(&a.importance)
        .then_with(|| match (a.deadline, b.deadline) {
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        })
}

pub fn list(db: &Db, owner_id: Uuid) -> Vec<Task> {
    let mut tasks: Vec<Task> = db
        .tasks
        .iter()
        .filter(|t| t.owner_id == owner_id)
        .cloned()
        .collect();
    tasks.sort_by(list_order);
    tasks
}

pub fn list_shared(db: &Db, caller_email: &str) -> Vec<Task> {
    let email = normalize_email(caller_email);
    db.tasks
        .iter()
        .filter(|t| t.is_shared_with(&email))
        .cloned()
        .collect()
}

pub fn create(
    db: &mut Db,
    owner_id: Uuid,
    input: NewTask,
    now: DateTime<FixedOffset>,
) -> Result<Task, AppError> {
    let task = Task {
        id: Uuid::new_v4(),
        owner_id,
        title: input.title.trim().to_string(),
        description: input.description,
        deadline: input.deadline,
        importance: input.importance.unwrap_or(1),
        completed: false,
        draft: input.draft,
        notes: input.notes,
        tags: dedup_tags(input.tags),
        time_estimate: input.time_estimate,
        last_time_spent: 0,
        shared: false,
        shared_with: Vec::new(),
        comments: Vec::new(),
        completion_records: Vec::new(),
        focus_sessions: Vec::new(),
        recurrence: input.recurrence,
        created_at: now,
        updated_at: now,
    };

    check_task_schema(&task)?;

    tracing::info!(task_id = %task.id, owner_id = %owner_id, draft = task.draft, "Task created");
    db.tasks.push(task.clone());
    Ok(task)
}

pub fn update(
    db: &mut Db,
    owner_id: Uuid,
    task_id: Uuid,
    patch: TaskPatch,
    now: DateTime<FixedOffset>,
) -> Result<Task, AppError> {
    let t = owned_task_mut(db, owner_id, task_id, "update")?;

    // apply to a copy so a schema failure leaves the task as it was
    let mut next = t.clone();
    if let Some(title) = patch.title {
        next.title = title.trim().to_string();
    }
    if let Some(description) = patch.description {
        next.description = description;
    }
    if let Some(deadline) = patch.deadline {
        next.deadline = deadline;
    }
    if let Some(importance) = patch.importance {
        next.importance = importance;
    }
    if let Some(notes) = patch.notes {
        next.notes = notes;
    }
    if let Some(tags) = patch.tags {
        next.tags = dedup_tags(tags);
    }
    if let Some(draft) = patch.draft {
        next.draft = draft;
    }
    if let Some(estimate) = patch.time_estimate {
        next.time_estimate = estimate;
    }
    if let Some(recurrence) = patch.recurrence {
        next.recurrence = recurrence;
    }

    check_task_schema(&next)?;

    next.updated_at = now;
    *t = next;
    Ok(t.clone())
}

pub fn delete(db: &mut Db, owner_id: Uuid, task_id: Uuid) -> Result<(), AppError> {
    owned_task_mut(db, owner_id, task_id, "delete")?;
    db.tasks.retain(|t| t.id != task_id);
    tracing::info!(task_id = %task_id, "Task deleted");
    Ok(())
}

// Returns the task and whether anything changed; re-sharing an
// existing email is a no-op
pub fn share(
    db: &mut Db,
    owner_id: Uuid,
    task_id: Uuid,
    email: &str,
    now: DateTime<FixedOffset>,
) -> Result<(Task, bool), AppError> {
    let t = owned_task_mut(db, owner_id, task_id, "share")?;

    let email = normalize_email(email);
    if email.is_empty() {
        return Err(AppError::BadRequest("email required".to_string()));
    }
    if t.is_shared_with(&email) {
        return Ok((t.clone(), false));
    }

    t.shared_with.push(SharedWith {
        email,
        is_assigned: false,
        assigned_at: None,
    });
    t.shared = true;
    t.updated_at = now;

    Ok((t.clone(), true))
}

// Toggles the assignment flag of an existing shared-with entry
pub fn assign(
    db: &mut Db,
    owner_id: Uuid,
    task_id: Uuid,
    email: &str,
    now: DateTime<FixedOffset>,
) -> Result<Task, AppError> {
    let email = normalize_email(email);
    let t = owned_task_mut(db, owner_id, task_id, "assign")?;

    if t.shared_with.is_empty() {
        return Err(AppError::BadRequest("Task is not shared with anyone".to_string()));
    }
    let Some(entry) = t.shared_with.iter_mut().find(|s| s.email == email) else {
        return Err(AppError::BadRequest("User not found in shared list".to_string()));
    };

    entry.is_assigned = !entry.is_assigned;
    entry.assigned_at = entry.is_assigned.then_some(now);

    t.updated_at = now;
    Ok(t.clone())
}

pub fn add_comment(
    db: &mut Db,
    caller_id: Uuid,
    caller_email: &str,
    task_id: Uuid,
    text: &str,
    now: DateTime<FixedOffset>,
) -> Result<Task, AppError> {
    let author = normalize_email(caller_email);
    let t = find_task_mut(db, task_id)?;

    let is_owner = t.owner_id == caller_id;
    if !is_owner && !t.is_shared_with(&author) {
        return Err(AppError::Unauthorized(
            "Not authorized to comment on this task".to_string(),
        ));
    }

    let text = text.trim();
    if text.is_empty() {
        return Err(AppError::BadRequest("comment text required".to_string()));
    }

    t.comments.push(Comment {
        author,
        text: text.to_string(),
        timestamp: now,
    });
    t.updated_at = now;
    Ok(t.clone())
}

// Every call appends a record, so recurring tasks keep their history
pub fn complete(
    db: &mut Db,
    owner_id: Uuid,
    task_id: Uuid,
    time_spent: u64,
    notes: Option<String>,
    now: DateTime<FixedOffset>,
) -> Result<Task, AppError> {
    let t = owned_task_mut(db, owner_id, task_id, "complete")?;

    t.completed = true;
    t.completion_records.push(CompletionRecord {
        time_spent,
        completed_at: now,
        notes,
    });
    t.updated_at = now;
    let task = t.clone();

    identity::record_stats(db, owner_id, |s| s.tasks_completed += 1);

    tracing::info!(task_id = %task_id, time_spent, records = task.completion_records.len(), "Task completed");
    Ok(task)
}
