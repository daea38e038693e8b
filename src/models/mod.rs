pub mod activity;
pub mod chat;
pub mod file;
pub mod interview;
pub mod notification;
pub mod project;
pub mod task;
pub mod user;

pub use activity::ActivityLog;
pub use chat::ChatMessage;
pub use file::ProjectFile;
pub use interview::{Interview, InterviewFeedback};
pub use notification::Notification;
pub use project::{Project, ProjectRequest, RequestStatus};
pub use task::{Task, TaskStatus};
pub use user::{Role, User};

/// Fresh document id, stored as a string `_id`.
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
