/*
Productivity analytics.
Pure read-side computation over a task collection; recomputed from
scratch on every call, nothing is cached.
*/

use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, Timelike};
use serde::Serialize;
use uuid::Uuid;

use crate::models::Task;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CompletionTimeRanges {
    pub fast: u32,   // < 30 min
    pub medium: u32, // 30 min .. 2 h
    pub long: u32,   // >= 2 h
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductiveTime {
    Morning,   // 05:00-12:00
    Afternoon, // 12:00-17:00
    Evening,   // 17:00-05:00
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityStatus {
    Completed,
    Active,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecentActivity {
    pub id: Uuid,
    pub title: String,
    pub status: ActivityStatus,
    pub date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnalyticsSummary {
    pub total_tasks: u32,
    pub completed_tasks: u32,
    pub completion_rate: u32, // percent
    pub total_focus_time: u64, // seconds
    pub focus_sessions_count: u32,
    pub average_session_time: u64, // seconds
    pub tasks_by_priority: [u32; 5],
    pub completion_time_ranges: CompletionTimeRanges,
    pub most_productive_time: ProductiveTime,
    pub recent_activity: Vec<RecentActivity>,
    pub overdue_tasks: u32,
    pub high_priority_completed: u32,
    pub completions_by_weekday: [u32; 7], // Sunday first, last 7 days
}

pub const FAST_COMPLETION_SECS: u64 = 30 * 60;
pub const MEDIUM_COMPLETION_SECS: u64 = 2 * 60 * 60;
const RECENT_ACTIVITY_LIMIT: usize = 5;

// round(100 * completed / total), half up; 0 for an empty set
pub fn completion_rate(completed: usize, total: usize) -> u32 {
    if total == 0 {
        return 0;
    }
    ((200 * completed + total) / (2 * total)) as u32
}

// Session durations plus last_time_spent. The latter usually repeats the
// final session's duration, so a session can be counted twice.
pub fn total_focus_time(tasks: &[&Task]) -> u64 {
    tasks
        .iter()
        .map(|t| {
            let sessions: u64 = t.focus_sessions.iter().filter_map(|s| s.duration).sum();
            sessions + t.last_time_spent
        })
        .sum()
}

pub fn tasks_by_priority(tasks: &[&Task]) -> [u32; 5] {
    let mut buckets = [0u32; 5];
    for t in tasks {
        if (1..=5).contains(&t.importance) {
            buckets[(t.importance - 1) as usize] += 1;
        }
    }
    buckets
}

pub fn completion_time_ranges(completed: &[&Task]) -> CompletionTimeRanges {
    let mut ranges = CompletionTimeRanges::default();
    for t in completed {
        let spent: u64 = t.completion_records.iter().map(|r| r.time_spent).sum();
        if spent < FAST_COMPLETION_SECS {
            ranges.fast += 1;
        } else if spent < MEDIUM_COMPLETION_SECS {
            ranges.medium += 1;
        } else {
            ranges.long += 1;
        }
    }
    ranges
}

pub fn time_of_day(hour: u32) -> ProductiveTime {
    match hour {
        5..=11 => ProductiveTime::Morning,
        12..=16 => ProductiveTime::Afternoon,
        _ => ProductiveTime::Evening,
    }
}

// Every completion event counts, hours read in `offset`.
// Ties resolve morning, then afternoon, then evening.
pub fn most_productive_time(tasks: &[&Task], offset: FixedOffset) -> ProductiveTime {
    let (mut morning, mut afternoon, mut evening) = (0u32, 0u32, 0u32);
    for record in tasks.iter().flat_map(|t| t.completion_records.iter()) {
        match time_of_day(record.completed_at.with_timezone(&offset).hour()) {
            ProductiveTime::Morning => morning += 1,
            ProductiveTime::Afternoon => afternoon += 1,
            ProductiveTime::Evening => evening += 1,
        }
    }

    if morning >= afternoon && morning >= evening {
        ProductiveTime::Morning
    } else if afternoon >= evening {
        ProductiveTime::Afternoon
    } else {
        ProductiveTime::Evening
    }
}

pub fn recent_activity(tasks: &[&Task], offset: FixedOffset) -> Vec<RecentActivity> {
    let mut sorted: Vec<&Task> = tasks.to_vec();
    sorted.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
    sorted
        .into_iter()
        .take(RECENT_ACTIVITY_LIMIT)
        .map(|t| RecentActivity {
            id: t.id,
            title: t.title.clone(),
            status: if t.completed {
                ActivityStatus::Completed
            } else {
                ActivityStatus::Active
            },
            date: t.updated_at.with_timezone(&offset).date_naive(),
        })
        .collect()
}

// Completed tasks by weekday of their latest completion within the past 7 days
pub fn completions_by_weekday(completed: &[&Task], now: DateTime<FixedOffset>) -> [u32; 7] {
    let since = now - Duration::days(7);
    let mut days = [0u32; 7];
    for t in completed {
        let Some(last) = t.completion_records.last() else {
            continue;
        };
        if last.completed_at >= since {
            let local = last.completed_at.with_timezone(now.offset());
            days[local.weekday().num_days_from_sunday() as usize] += 1;
        }
    }
    days
}

/// Summarize a user's tasks as of `now`. Drafts are excluded up front.
pub fn summarize(tasks: &[Task], now: DateTime<FixedOffset>) -> AnalyticsSummary {
    let offset = *now.offset();
    let active: Vec<&Task> = tasks.iter().filter(|t| !t.draft).collect();
    let completed: Vec<&Task> = active.iter().copied().filter(|t| t.completed).collect();

    let total_focus_time = total_focus_time(&active);
    let focus_sessions_count: usize = active.iter().map(|t| t.focus_sessions.len()).sum();
    let average_session_time = if focus_sessions_count > 0 {
        total_focus_time / focus_sessions_count as u64
    } else {
        0
    };

    let overdue_tasks = active
        .iter()
        .filter(|t| !t.completed && t.deadline.is_some_and(|d| d < now))
        .count();
    let high_priority_completed = completed.iter().filter(|t| t.importance >= 4).count();

    AnalyticsSummary {
        total_tasks: active.len() as u32,
        completed_tasks: completed.len() as u32,
        completion_rate: completion_rate(completed.len(), active.len()),
        total_focus_time,
        focus_sessions_count: focus_sessions_count as u32,
        average_session_time,
        tasks_by_priority: tasks_by_priority(&active),
        completion_time_ranges: completion_time_ranges(&completed),
        most_productive_time: most_productive_time(&completed, offset),
        recent_activity: recent_activity(&active, offset),
        overdue_tasks: overdue_tasks as u32,
        high_priority_completed: high_priority_completed as u32,
        completions_by_weekday: completions_by_weekday(&completed, now),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CompletionRecord, Db, FocusSession};
    use crate::tasks::tests::{new_task, now};
    use chrono::TimeZone;

    fn task(importance: i64) -> Task {
        let mut db = Db::default();
        let mut t = new_task(&mut db, Uuid::new_v4(), "t");
        t.importance = importance;
        t
    }

    fn completed_at(t: &mut Task, at: DateTime<FixedOffset>, time_spent: u64) {
        t.completed = true;
        t.completion_records.push(CompletionRecord {
            time_spent,
            completed_at: at,
            notes: None,
        });
    }

    fn at_hour(hour: u32) -> DateTime<FixedOffset> {
        FixedOffset::east_opt(0)
            .unwrap()
            .with_ymd_and_hms(2024, 2, 28, hour, 0, 0)
            .unwrap()
    }

    #[test]
    fn completion_rate_excludes_drafts() {
        let mut a = task(1);
        let mut b = task(1);
        completed_at(&mut a, now(), 10);
        completed_at(&mut b, now(), 10);
        let mut draft = task(1);
        draft.draft = true;
        let active = task(1);

        let summary = summarize(&[a, b, draft, active], now());
        assert_eq!(summary.total_tasks, 3);
        assert_eq!(summary.completed_tasks, 2);
        assert_eq!(summary.completion_rate, 67);
    }

    #[test]
    fn completion_rate_rounding() {
        assert_eq!(completion_rate(0, 0), 0);
        assert_eq!(completion_rate(1, 3), 33);
        assert_eq!(completion_rate(1, 2), 50);
        assert_eq!(completion_rate(1, 8), 13); // 12.5 rounds up
        assert_eq!(completion_rate(5, 5), 100);
    }

    #[test]
    fn priority_histogram_ignores_out_of_range() {
        let tasks: Vec<Task> = [1, 1, 3, 5, 5, 5, 0, 7].into_iter().map(task).collect();
        let refs: Vec<&Task> = tasks.iter().collect();
        assert_eq!(tasks_by_priority(&refs), [2, 0, 1, 0, 3]);
    }

    // Pins the current double counting of the final session's duration.
    #[test]
    fn focus_time_counts_sessions_and_last_time_spent() {
        let mut t = task(1);
        t.focus_sessions.push(FocusSession {
            start_time: now(),
            end_time: Some(now()),
            duration: Some(120),
            breaks: Vec::new(),
        });
        t.focus_sessions.push(FocusSession {
            start_time: now(),
            end_time: None,
            duration: None,
            breaks: Vec::new(),
        });
        t.last_time_spent = 120;

        let summary = summarize(std::slice::from_ref(&t), now());
        assert_eq!(summary.total_focus_time, 240);
        assert_eq!(summary.focus_sessions_count, 2);
        assert_eq!(summary.average_session_time, 120);
    }

    #[test]
    fn completion_time_buckets() {
        let mut fast = task(1);
        completed_at(&mut fast, now(), 1799);
        let mut medium = task(1);
        completed_at(&mut medium, now(), 1000);
        completed_at(&mut medium, now(), 800);
        let mut long = task(1);
        completed_at(&mut long, now(), 7200);

        let refs = [&fast, &medium, &long];
        assert_eq!(
            completion_time_ranges(&refs),
            CompletionTimeRanges {
                fast: 1,
                medium: 1,
                long: 1
            }
        );
    }

    #[test]
    fn hour_buckets() {
        assert_eq!(time_of_day(4), ProductiveTime::Evening);
        assert_eq!(time_of_day(5), ProductiveTime::Morning);
        assert_eq!(time_of_day(11), ProductiveTime::Morning);
        assert_eq!(time_of_day(12), ProductiveTime::Afternoon);
        assert_eq!(time_of_day(16), ProductiveTime::Afternoon);
        assert_eq!(time_of_day(17), ProductiveTime::Evening);
    }

    #[test]
    fn most_productive_time_counts_each_completion() {
        let utc = FixedOffset::east_opt(0).unwrap();
        let mut a = task(1);
        completed_at(&mut a, at_hour(20), 1);
        completed_at(&mut a, at_hour(22), 1);
        let mut b = task(1);
        completed_at(&mut b, at_hour(9), 1);
        assert_eq!(most_productive_time(&[&a, &b], utc), ProductiveTime::Evening);

        let mut c = task(1);
        completed_at(&mut c, at_hour(13), 1);
        // morning 1, afternoon 1, evening 2
        assert_eq!(most_productive_time(&[&a, &b, &c], utc), ProductiveTime::Evening);
        assert_eq!(most_productive_time(&[&b, &c], utc), ProductiveTime::Morning);
        assert_eq!(most_productive_time(&[], utc), ProductiveTime::Morning);
    }

    #[test]
    fn most_productive_time_uses_callers_offset() {
        let mut t = task(1);
        completed_at(&mut t, at_hour(10), 1); // 10:00 UTC
        let plus_eight = FixedOffset::east_opt(8 * 3600).unwrap(); // 18:00 local
        assert_eq!(most_productive_time(&[&t], plus_eight), ProductiveTime::Evening);
    }

    #[test]
    fn recent_activity_top_five_by_update() {
        let tasks: Vec<Task> = (0..7)
            .map(|i| {
                let mut t = task(1);
                t.title = format!("t{i}");
                t.updated_at = now() - Duration::hours(i);
                t.completed = i == 1;
                t
            })
            .collect();
        let refs: Vec<&Task> = tasks.iter().rev().collect();

        let recent = recent_activity(&refs, *now().offset());
        let titles: Vec<&str> = recent.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, ["t0", "t1", "t2", "t3", "t4"]);
        assert_eq!(recent[1].status, ActivityStatus::Completed);
        assert_eq!(recent[0].status, ActivityStatus::Active);
        assert_eq!(recent[0].date, now().date_naive());
    }

    #[test]
    fn overdue_and_high_priority_counts() {
        let mut overdue = task(2);
        overdue.deadline = Some(now() - Duration::days(1));
        let mut done_late = task(5);
        done_late.deadline = Some(now() - Duration::days(1));
        completed_at(&mut done_late, now(), 60);
        let mut upcoming = task(4);
        upcoming.deadline = Some(now() + Duration::days(1));

        let summary = summarize(&[overdue, done_late, upcoming], now());
        assert_eq!(summary.overdue_tasks, 1);
        assert_eq!(summary.high_priority_completed, 1);
    }

    #[test]
    fn weekday_histogram_uses_latest_completion_in_last_week() {
        // now() is Friday 2024-03-01
        let mut recent = task(1);
        completed_at(&mut recent, now() - Duration::days(30), 1);
        completed_at(&mut recent, now() - Duration::days(1), 1); // Thursday
        let mut old = task(1);
        completed_at(&mut old, now() - Duration::days(8), 1);

        let days = completions_by_weekday(&[&recent, &old], now());
        assert_eq!(days, [0, 0, 0, 0, 1, 0, 0]);
    }

    #[test]
    fn empty_input_yields_zeroes() {
        let summary = summarize(&[], now());
        assert_eq!(summary.total_tasks, 0);
        assert_eq!(summary.completion_rate, 0);
        assert_eq!(summary.total_focus_time, 0);
        assert_eq!(summary.tasks_by_priority, [0; 5]);
        assert!(summary.recent_activity.is_empty());
    }
}
