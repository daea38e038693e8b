use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Append-only audit record of a user action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityLog {
    #[serde(rename = "_id")]
    pub id: String,
    pub user_id: String,
    /// "faculty" or "student", derived from the e-mail domain.
    pub user_role: String,
    pub action: String,
    pub related_project_id: Option<String>,
    pub details: String,
    pub timestamp: DateTime<Utc>,
}
