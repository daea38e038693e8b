use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum TaskStatus {
    Pending,
    Submitted,
    Late,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "Pending",
            TaskStatus::Submitted => "Submitted",
            TaskStatus::Late => "Late",
        }
    }

    /// Submitted and Late both count as handled.
    pub fn is_handled(&self) -> bool {
        !matches!(self, TaskStatus::Pending)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub student_id: String,
    pub project_id: String,
    pub deadline: DateTime<Utc>,
    pub status: TaskStatus,
    /// Brief attached by the faculty, if any.
    #[serde(default)]
    pub file_url: String,
    #[serde(default)]
    pub submission_url: Option<String>,
    pub assigned_by: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub submitted_at: Option<DateTime<Utc>>,
}
