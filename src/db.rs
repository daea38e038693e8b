use mongodb::bson::{doc, Document};
use mongodb::error::{Error, ErrorKind, WriteFailure};
use mongodb::options::{ClientOptions, IndexOptions};
use mongodb::{Client, Collection, Database, IndexModel};

pub const USERS: &str = "users";
pub const PROJECTS: &str = "projects";
pub const PROJECT_REQUESTS: &str = "projectRequests";
pub const TASKS: &str = "tasks";
pub const INTERVIEWS: &str = "interviews";
pub const INTERVIEW_FEEDBACK: &str = "interview_feedback";
pub const NOTIFICATIONS: &str = "notifications";
pub const ACTIVITY_LOGS: &str = "activity_logs";
pub const CHATS: &str = "chats";
pub const FILES: &str = "files";
pub const MAIL: &str = "mail";

const DUPLICATE_KEY: i32 = 11000;

pub struct MongoDB {
    pub db: Database,
}

impl MongoDB {
    /// Builds the client. No round trip is made until the first operation.
    pub async fn init(uri: &str, db_name: &str) -> mongodb::error::Result<Self> {
        let client_options = ClientOptions::parse(uri).await?;
        let client = Client::with_options(client_options)?;
        Ok(MongoDB {
            db: client.database(db_name),
        })
    }

    pub fn collection<T: Send + Sync>(&self, name: &str) -> Collection<T> {
        self.db.collection::<T>(name)
    }

    pub async fn ensure_indexes(&self) -> mongodb::error::Result<()> {
        self.collection::<Document>(USERS)
            .create_index(user_email_index())
            .await?;
        Ok(())
    }
}

/// One account per e-mail address, enforced by the server.
pub fn user_email_index() -> IndexModel {
    IndexModel::builder()
        .keys(doc! { "email": 1 })
        .options(IndexOptions::builder().unique(true).build())
        .build()
}

pub fn is_duplicate_key(err: &Error) -> bool {
    matches!(
        *err.kind,
        ErrorKind::Write(WriteFailure::WriteError(ref we)) if we.code == DUPLICATE_KEY
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_index_is_unique() {
        let index = user_email_index();
        assert_eq!(index.keys, doc! { "email": 1 });
        assert_eq!(index.options.and_then(|o| o.unique), Some(true));
    }

    #[test]
    fn other_errors_are_not_duplicates() {
        let err = Error::from(std::io::Error::new(
            std::io::ErrorKind::ConnectionReset,
            "connection reset",
        ));
        assert!(!is_duplicate_key(&err));
    }
}
