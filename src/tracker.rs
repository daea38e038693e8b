//! Task status derivation and progress aggregation.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::{Task, TaskStatus};

/// Status a pending task moves to when it is submitted at `now`.
/// Submitting exactly at the deadline is on time.
pub fn derive_submission_status(deadline: DateTime<Utc>, now: DateTime<Utc>) -> TaskStatus {
    if now > deadline {
        TaskStatus::Late
    } else {
        TaskStatus::Submitted
    }
}

/// Whole days left until `deadline`, rounded up. Zero or negative once due.
pub fn days_until_deadline(deadline: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    const DAY_MS: i64 = 86_400_000;
    let ms = (deadline - now).num_milliseconds();
    // ceil for signed integer division
    ms.div_euclid(DAY_MS) + i64::from(ms.rem_euclid(DAY_MS) != 0)
}

/// `round(100 * handled / total)`, zero for an empty set.
pub fn progress_percent(handled: usize, total: usize) -> u32 {
    if total == 0 {
        return 0;
    }
    ((handled as f64 / total as f64) * 100.0).round() as u32
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TaskStats {
    pub total: usize,
    pub submitted: usize,
    pub late: usize,
    pub pending: usize,
    pub progress: u32,
}

impl TaskStats {
    pub fn from_statuses<I>(statuses: I) -> Self
    where
        I: IntoIterator<Item = TaskStatus>,
    {
        let mut stats = TaskStats::default();
        for status in statuses {
            stats.total += 1;
            match status {
                TaskStatus::Submitted => stats.submitted += 1,
                TaskStatus::Late => stats.late += 1,
                TaskStatus::Pending => stats.pending += 1,
            }
        }
        stats.progress = progress_percent(stats.submitted + stats.late, stats.total);
        stats
    }

    pub fn from_tasks<'a, I>(tasks: I) -> Self
    where
        I: IntoIterator<Item = &'a Task>,
    {
        Self::from_statuses(tasks.into_iter().map(|t| t.status))
    }
}

/// Stats keyed by whatever `key` extracts from each task (project id, student id).
pub fn stats_by<'a, F>(tasks: &'a [Task], key: F) -> BTreeMap<String, TaskStats>
where
    F: Fn(&'a Task) -> &'a str,
{
    let mut grouped: BTreeMap<String, Vec<TaskStatus>> = BTreeMap::new();
    for task in tasks {
        grouped.entry(key(task).to_string()).or_default().push(task.status);
    }
    grouped
        .into_iter()
        .map(|(k, statuses)| (k, TaskStats::from_statuses(statuses)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    fn task(id: &str, project: &str, status: TaskStatus) -> Task {
        Task {
            id: id.to_string(),
            name: format!("task {}", id),
            student_id: "s1".to_string(),
            project_id: project.to_string(),
            deadline: at(2025, 1, 1, 10, 0),
            status,
            file_url: String::new(),
            submission_url: None,
            assigned_by: "f1".to_string(),
            created_at: at(2024, 12, 1, 0, 0),
            submitted_at: None,
        }
    }

    #[test]
    fn submission_after_deadline_is_late() {
        let status = derive_submission_status(at(2025, 1, 1, 10, 0), at(2025, 1, 2, 9, 0));
        assert_eq!(status, TaskStatus::Late);
    }

    #[test]
    fn submission_at_deadline_is_on_time() {
        let deadline = at(2025, 1, 1, 10, 0);
        assert_eq!(derive_submission_status(deadline, deadline), TaskStatus::Submitted);
        assert_eq!(
            derive_submission_status(deadline, at(2024, 12, 31, 23, 0)),
            TaskStatus::Submitted
        );
    }

    #[test]
    fn empty_set_has_zero_progress() {
        let none: Vec<Task> = Vec::new();
        let stats = TaskStats::from_tasks(&none);
        assert_eq!(stats.total, 0);
        assert_eq!(stats.progress, 0);
    }

    #[test]
    fn pending_counts_against_progress() {
        let tasks = vec![
            task("1", "p", TaskStatus::Submitted),
            task("2", "p", TaskStatus::Late),
            task("3", "p", TaskStatus::Pending),
        ];
        let stats = TaskStats::from_tasks(&tasks);
        assert_eq!(stats.submitted, 1);
        assert_eq!(stats.late, 1);
        assert_eq!(stats.pending, 1);
        // 2/3 rounds to 67
        assert_eq!(stats.progress, 67);
    }

    #[test]
    fn groups_by_project() {
        let tasks = vec![
            task("1", "alpha", TaskStatus::Submitted),
            task("2", "alpha", TaskStatus::Submitted),
            task("3", "beta", TaskStatus::Pending),
        ];
        let grouped = stats_by(&tasks, |t| t.project_id.as_str());
        assert_eq!(grouped["alpha"].progress, 100);
        assert_eq!(grouped["beta"].progress, 0);
        assert_eq!(grouped.len(), 2);
    }

    #[test]
    fn days_left_rounds_up() {
        let now = at(2025, 1, 1, 0, 0);
        assert_eq!(days_until_deadline(at(2025, 1, 1, 1, 0), now), 1);
        assert_eq!(days_until_deadline(at(2025, 1, 3, 0, 0), now), 2);
        assert_eq!(days_until_deadline(now, now), 0);
        assert_eq!(days_until_deadline(at(2024, 12, 31, 12, 0), now), 0);
        assert_eq!(days_until_deadline(at(2024, 12, 30, 0, 0), now), -2);
    }
}
