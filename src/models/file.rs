use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Metadata for a file attached to a project. The bytes live in external
/// storage; only the download URL is kept here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectFile {
    #[serde(rename = "_id")]
    pub id: String,
    pub project_id: String,
    pub name: String,
    pub url: String,
    pub uploaded_by: String,
    pub uploaded_by_email: String,
    pub timestamp: DateTime<Utc>,
}
