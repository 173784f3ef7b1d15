/*
Task suggestions.
Pure read-side scoring over the caller's open tasks, kept apart from HTTP for testing
*/

use chrono::{DateTime, FixedOffset};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;
use uuid::Uuid;

use crate::models::Task;

// How many tasks a suggestion lists
pub const MAX_SUGGESTIONS: usize = 5;

// Minutes of focus suggested per importance point
pub const MINUTES_PER_IMPORTANCE: i64 = 25;

// Days assumed for a task without a deadline
const NO_DEADLINE_DAYS: f64 = 30.0;

pub const TIPS: [&str; 5] = [
    "Try the Pomodoro Technique: 25 minutes of focus followed by a 5-minute break.",
    "Tackle your most important task first thing in the morning.",
    "Break large tasks into smaller, manageable chunks.",
    "Set specific goals for each work session.",
    "Minimize distractions by turning off notifications during focus time.",
];

#[derive(Debug, Clone, Serialize)]
pub struct TimeBlock {
    pub task_id: Uuid,
    pub task: String,
    pub suggested_minutes: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Suggestions {
    pub prioritized_tasks: Vec<Task>,
    pub time_blocks: Vec<TimeBlock>,
    pub daily_tip: &'static str,
}

// importance * 10 + days until the deadline (negative once overdue)
pub fn suggestion_score(task: &Task, now: DateTime<FixedOffset>) -> f64 {
    let days = match task.deadline {
        Some(deadline) => (deadline - now).num_seconds() as f64 / 86_400.0,
        None => NO_DEADLINE_DAYS,
    };
    (task.importance * 10) as f64 + days
}

// Open tasks by score, lowest first; ties by title (case-insensitive)
pub fn rank(tasks: &[Task], now: DateTime<FixedOffset>) -> Vec<Task> {
    let mut scored: Vec<(f64, &Task)> = tasks
        .iter()
        .filter(|t| !t.completed && !t.draft)
        .map(|t| (suggestion_score(t, now), t))
        .collect();

    scored.sort_by(|(sa, a), (sb, b)| {
        sa.total_cmp(sb)
            .then_with(|| a.title.to_lowercase().cmp(&b.title.to_lowercase()))
    });

    scored
        .into_iter()
        .take(MAX_SUGGESTIONS)
        .map(|(_, t)| t.clone())
        .collect()
}

pub fn pick_tip<R: Rng + ?Sized>(rng: &mut R) -> &'static str {
    TIPS.choose(rng).copied().unwrap_or(TIPS[0])
}

pub fn suggest(tasks: &[Task], now: DateTime<FixedOffset>) -> Suggestions {
    let prioritized_tasks = rank(tasks, now);
    let time_blocks = prioritized_tasks
        .iter()
        .map(|t| TimeBlock {
            task_id: t.id,
            task: t.title.clone(),
            suggested_minutes: t.importance * MINUTES_PER_IMPORTANCE,
        })
        .collect();

    Suggestions {
        prioritized_tasks,
        time_blocks,
        daily_tip: pick_tip(&mut rand::thread_rng()),
    }
}
