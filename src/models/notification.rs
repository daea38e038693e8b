use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    #[serde(rename = "_id")]
    pub id: String,
    pub to: String,
    pub message: String,
    pub link: Option<String>,
    pub kind: String,
    pub read: bool,
    pub timestamp: DateTime<Utc>,
}
