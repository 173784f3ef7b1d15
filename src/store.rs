use std::{
    fs, io,
    path::{Path, PathBuf},
};

use chrono::{DateTime, Duration, FixedOffset};
use thiserror::Error;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::AppError;
use crate::identity;
use crate::models::{CompletionRecord, Db, FocusSession, Task};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Malformed database file: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to seed demo data: {0}")]
    Seed(String),
}

pub fn load_db(path: &Path) -> Result<Db, StoreError> {
    let text = fs::read_to_string(path)?;
    let db: Db = serde_json::from_str(&text)?;
    Ok(db)
}

pub fn save_db(path: &Path, db: &Db) -> Result<(), StoreError> {
    let tmp_path = path.with_extension("json.tmp");
    let text = serde_json::to_string_pretty(db)?;

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    fs::write(&tmp_path, text)?;
    fs::rename(&tmp_path, path)?;
    Ok(())
}

// Schema-level constraints checked before a task is written
pub fn check_task_schema(task: &Task) -> Result<(), AppError> {
    if task.title.trim().is_empty() {
        return Err(AppError::BadRequest("title required".to_string()));
    }
    if !(1..=5).contains(&task.importance) {
        return Err(AppError::BadRequest("importance must be 1..=5".to_string()));
    }
    if let Some(r) = &task.recurrence {
        if r.interval < 1 {
            return Err(AppError::BadRequest("recurrence interval must be >= 1".to_string()));
        }
    }
    Ok(())
}

/// JSON document store.
///
/// The whole database lives in memory behind one async mutex. Every write
/// goes through [`Store::mutate`], which runs the closure on a copy, writes
/// the copy to disk and only then publishes it, so concurrent appends to the
/// same task are serialized and a failed write leaves memory untouched.
pub struct Store {
    path: PathBuf,
    db: Mutex<Db>,
}

impl Store {
    pub fn open(path: impl Into<PathBuf>, seed_demo: bool) -> Result<Self, StoreError> {
        let path = path.into();

        let db = if path.exists() {
            load_db(&path)?
        } else if seed_demo {
            tracing::warn!(
                path = %path.display(),
                "Database file missing, seeding demo data (SEED_DEMO_DATA is set)"
            );
            let db = demo_db(crate::models::now_fixed_offset())?;
            save_db(&path, &db)?;
            db
        } else {
            tracing::info!(path = %path.display(), "Database file missing, starting empty");
            Db::default()
        };

        tracing::info!(users = db.users.len(), tasks = db.tasks.len(), "Store opened");

        Ok(Self {
            path,
            db: Mutex::new(db),
        })
    }

    pub async fn read<T>(&self, f: impl FnOnce(&Db) -> T) -> T {
        let db = self.db.lock().await;
        f(&db)
    }

    pub async fn mutate<T, E>(&self, f: impl FnOnce(&mut Db) -> Result<T, E>) -> Result<T, E>
    where
        E: From<StoreError>,
    {
        self.mutate_if(|db| f(db).map(|out| (out, true))).await
    }

    /// Like [`Store::mutate`], but the closure also reports whether it changed
    /// anything. When it did not, nothing is written and the copy is dropped.
    pub async fn mutate_if<T, E>(
        &self,
        f: impl FnOnce(&mut Db) -> Result<(T, bool), E>,
    ) -> Result<T, E>
    where
        E: From<StoreError>,
    {
        let mut db = self.db.lock().await;
        let mut next = db.clone();
        let (out, changed) = f(&mut next)?;
        if !changed {
            return Ok(out);
        }
        save_db(&self.path, &next)?;
        *db = next;
        Ok(out)
    }
}

// Demo content for local development. Login: demo@example.com / demo
fn demo_db(now: DateTime<FixedOffset>) -> Result<Db, StoreError> {
    let mut db = Db::default();
    let user = identity::register(&mut db, "demo@example.com", "demo", Some("Demo".to_string()), now)
        .map_err(|e| StoreError::Seed(e.to_string()))?;

    let task = |title: &str, importance: i64, deadline_days: Option<i64>| Task {
        id: Uuid::new_v4(),
        owner_id: user.id,
        title: title.to_string(),
        description: None,
        deadline: deadline_days.map(|d| now + Duration::days(d)),
        importance,
        completed: false,
        draft: false,
        notes: None,
        tags: Vec::new(),
        time_estimate: None,
        last_time_spent: 0,
        shared: false,
        shared_with: Vec::new(),
        comments: Vec::new(),
        completion_records: Vec::new(),
        focus_sessions: Vec::new(),
        recurrence: None,
        created_at: now,
        updated_at: now,
    };

    let mut report = task("Write quarterly report", 5, Some(2));
    report.tags = vec!["work".to_string()];
    report.time_estimate = Some(2 * 3600);

    let mut groceries = task("Buy groceries", 2, Some(1));
    groceries.completed = true;
    groceries.completion_records.push(CompletionRecord {
        time_spent: 1200,
        completed_at: now - Duration::hours(3),
        notes: None,
    });

    let mut reading = task("Read chapter 4", 3, None);
    reading.focus_sessions.push(FocusSession {
        start_time: now - Duration::hours(5),
        end_time: Some(now - Duration::hours(5) + Duration::minutes(25)),
        duration: Some(1500),
        breaks: Vec::new(),
    });
    reading.last_time_spent = 1500;

    db.tasks = vec![report, groceries, reading];
    Ok(db)
}
