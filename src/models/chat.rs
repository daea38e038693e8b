use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A direct message between two users.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    #[serde(rename = "_id")]
    pub id: String,
    pub sender: String,
    pub receiver: String,
    pub chat_pair: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub read: bool,
}

/// Conversation key shared by both participants, independent of direction.
pub fn chat_pair_id(a: &str, b: &str) -> String {
    if a <= b {
        format!("{}_{}", a, b)
    } else {
        format!("{}_{}", b, a)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pair_id_is_symmetric() {
        assert_eq!(chat_pair_id("bob", "alice"), "alice_bob");
        assert_eq!(chat_pair_id("alice", "bob"), "alice_bob");
    }
}
