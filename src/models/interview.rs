use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Interview {
    #[serde(rename = "_id")]
    pub id: String,
    pub student_id: String,
    pub faculty_id: String,
    #[serde(default)]
    pub project_id: Option<String>,
    pub date_time: DateTime<Utc>,
    pub meeting_link: String,
    pub status: String,
}

/// Faculty feedback on a held interview. One per interview.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterviewFeedback {
    #[serde(rename = "_id")]
    pub id: String,
    pub student_id: String,
    pub faculty_id: String,
    pub project_id: Option<String>,
    pub interview_id: String,
    pub rating: u8,
    pub comment: String,
    pub created_at: DateTime<Utc>,
}
