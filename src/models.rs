use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// Local time with a fixed offset; every stored timestamp uses this form
pub fn now_fixed_offset() -> DateTime<FixedOffset> {
    chrono::Local::now().fixed_offset()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Preferences {
    pub theme: String,
    pub notifications_enabled: bool,
    pub focus_session_duration: u32, // minutes
    pub break_duration: u32,         // minutes
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            theme: "light".to_string(),
            notifications_enabled: true,
            focus_session_duration: 25,
            break_duration: 5,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserStats {
    pub tasks_completed: u64,
    pub total_focus_time: u64, // seconds
    pub focus_sessions_completed: u64,
}

// Stored user record. `password_hash` never leaves the store;
// API responses go through `identity::UserProfile`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub name: Option<String>,
    #[serde(default)]
    pub preferences: Preferences,
    #[serde(default)]
    pub stats: UserStats,
    pub created_at: DateTime<FixedOffset>,
    pub last_login: DateTime<FixedOffset>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SharedWith {
    pub email: String,
    pub is_assigned: bool,
    pub assigned_at: Option<DateTime<FixedOffset>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Comment {
    pub author: String,
    pub text: String,
    pub timestamp: DateTime<FixedOffset>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CompletionRecord {
    pub time_spent: u64, // seconds
    pub completed_at: DateTime<FixedOffset>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BreakRecord {
    pub start_time: DateTime<FixedOffset>,
    pub end_time: DateTime<FixedOffset>,
    pub duration: u64, // seconds
}

// Only the last session of a task may be open (end_time == None)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FocusSession {
    pub start_time: DateTime<FixedOffset>,
    pub end_time: Option<DateTime<FixedOffset>>,
    pub duration: Option<u64>, // seconds
    #[serde(default)]
    pub breaks: Vec<BreakRecord>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Recurrence {
    pub frequency: Frequency,
    pub interval: u32, // >= 1
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub deadline: Option<DateTime<FixedOffset>>,
    pub importance: i64, // 1..=5
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub draft: bool,
    pub notes: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub time_estimate: Option<u64>, // seconds
    #[serde(default)]
    pub last_time_spent: u64, // seconds
    #[serde(default)]
    pub shared: bool,
    #[serde(default)]
    pub shared_with: Vec<SharedWith>,
    #[serde(default)]
    pub comments: Vec<Comment>,
    #[serde(default)]
    pub completion_records: Vec<CompletionRecord>,
    #[serde(default)]
    pub focus_sessions: Vec<FocusSession>,
    pub recurrence: Option<Recurrence>,
    pub created_at: DateTime<FixedOffset>,
    pub updated_at: DateTime<FixedOffset>,
}

impl Task {
    pub fn is_shared_with(&self, email: &str) -> bool {
        self.shared_with.iter().any(|s| s.email == email)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Db {
    #[serde(default)]
    pub users: Vec<User>,
    #[serde(default)]
    pub tasks: Vec<Task>,
}
