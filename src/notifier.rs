//! E-mail notifications fired after task, interview and join-request writes.
//!
//! Every handler here runs after the triggering write has been stored. A
//! failed send is logged and dropped; nothing is retried or rolled back.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lettre::{
    message::{header::ContentType, Mailbox, MultiPart},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use log::{debug, error, info};
use mongodb::bson::doc;
use serde::Serialize;
use thiserror::Error;

use crate::config::{Config, MailTransport};
use crate::db::{self, MongoDB};
use crate::models::{new_id, Interview, Task, User};
use crate::tracker::days_until_deadline;

#[derive(Debug, Error)]
pub enum MailError {
    #[error("invalid address: {0}")]
    Address(#[from] lettre::address::AddressError),
    #[error("could not build message: {0}")]
    Build(#[from] lettre::error::Error),
    #[error("smtp: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),
    #[error("outbox write failed: {0}")]
    Store(#[from] mongodb::error::Error),
}

/// The scenarios we send mail for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EmailKind {
    InterviewScheduled,
    TaskAssigned,
    TaskOverdue,
    JoinApproved,
}

#[derive(Debug, Clone, Serialize)]
pub struct OutgoingEmail {
    pub kind: EmailKind,
    pub to: String,
    pub subject: String,
    pub text: String,
    pub html: Option<String>,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: &OutgoingEmail) -> Result<(), MailError>;
}

/// Sends directly through an SMTP relay.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(config: &Config) -> Result<Self, MailError> {
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_host)?;
        if let (Some(user), Some(pass)) = (&config.smtp_user, &config.smtp_pass) {
            builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }
        Ok(SmtpMailer {
            transport: builder.build(),
            from: config.mail_from.parse()?,
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, email: &OutgoingEmail) -> Result<(), MailError> {
        let builder = Message::builder()
            .from(self.from.clone())
            .to(email.to.parse()?)
            .subject(email.subject.clone());
        let message = match &email.html {
            Some(html) => builder.multipart(MultiPart::alternative_plain_html(
                email.text.clone(),
                html.clone(),
            ))?,
            None => builder
                .header(ContentType::TEXT_PLAIN)
                .body(email.text.clone())?,
        };
        self.transport.send(message).await?;
        Ok(())
    }
}

/// Queues mail in the `mail` collection for an external sender.
pub struct OutboxMailer {
    db: Arc<MongoDB>,
    from: String,
}

impl OutboxMailer {
    pub fn new(db: Arc<MongoDB>, from: String) -> Self {
        OutboxMailer { db, from }
    }
}

#[async_trait]
impl Mailer for OutboxMailer {
    async fn send(&self, email: &OutgoingEmail) -> Result<(), MailError> {
        let record = doc! {
            "_id": new_id(),
            "from": &self.from,
            "to": &email.to,
            "message": {
                "subject": &email.subject,
                "text": &email.text,
                "html": email.html.clone(),
            },
            "created_at": Utc::now().to_rfc3339(),
        };
        self.db
            .collection::<mongodb::bson::Document>(db::MAIL)
            .insert_one(record)
            .await?;
        Ok(())
    }
}

pub fn mailer_from_config(config: &Config, db: Arc<MongoDB>) -> Result<Arc<dyn Mailer>, MailError> {
    Ok(match config.mail_transport {
        MailTransport::Smtp => Arc::new(SmtpMailer::new(config)?),
        MailTransport::Outbox => Arc::new(OutboxMailer::new(db, config.mail_from.clone())),
    })
}

fn format_when(at: DateTime<Utc>) -> String {
    at.format("%d %b %Y, %H:%M UTC").to_string()
}

pub fn interview_scheduled_email(student: &User, interview: &Interview) -> OutgoingEmail {
    let when = format_when(interview.date_time);
    OutgoingEmail {
        kind: EmailKind::InterviewScheduled,
        to: student.email.clone(),
        subject: "Interview Scheduled".to_string(),
        text: format!(
            "Dear {},\n\nYour interview is scheduled on {}.\nMeeting Link: {}\n\nBest,\nIdeaHive Team",
            student.name, when, interview.meeting_link
        ),
        html: Some(format!(
            "<p>Dear {},</p><p>You have been scheduled for an interview.</p>\
             <p><strong>Date &amp; Time:</strong> {}</p>\
             <p><strong>Meeting Link:</strong> <a href=\"{link}\">{link}</a></p>\
             <p>Regards,<br/>IdeaHive Team</p>",
            student.name,
            when,
            link = interview.meeting_link
        )),
    }
}

pub fn task_assigned_email(student: &User, task: &Task) -> OutgoingEmail {
    OutgoingEmail {
        kind: EmailKind::TaskAssigned,
        to: student.email.clone(),
        subject: "New Task Assigned".to_string(),
        text: format!(
            "Dear {},\n\nYou have a new task: \"{}\".\nDeadline: {}\n\nBest,\nIdeaHive Team",
            student.name,
            task.name,
            format_when(task.deadline)
        ),
        html: None,
    }
}

pub fn task_overdue_email(student: &User, task: &Task) -> OutgoingEmail {
    OutgoingEmail {
        kind: EmailKind::TaskOverdue,
        to: student.email.clone(),
        subject: "Overdue Task Alert".to_string(),
        text: format!(
            "Dear {},\n\nYour task \"{}\" is overdue.\nPlease complete it as soon as possible.\n\nBest,\nIdeaHive Team",
            student.name, task.name
        ),
        html: None,
    }
}

pub fn join_approved_email(name: &str, email: &str, project_title: &str) -> OutgoingEmail {
    OutgoingEmail {
        kind: EmailKind::JoinApproved,
        to: email.to_string(),
        subject: format!("You're approved to join \"{}\"!", project_title),
        text: format!(
            "Hello {},\n\nYour join request to {} has been approved.\nYou can now access all features inside the IdeaHive platform.\n\nBest,\nIdeaHive Team",
            name, project_title
        ),
        html: Some(format!(
            "<p>Hello {},</p><p>Your join request to <strong>{}</strong> has been approved.</p>\
             <p>You can now access all features inside the IdeaHive platform.</p>\
             <p>Best,<br/>IdeaHive Team</p>",
            name, project_title
        )),
    }
}

/// A task that is still pending and has reached its deadline day.
pub fn is_overdue(task: &Task, now: DateTime<Utc>) -> bool {
    !task.status.is_handled() && days_until_deadline(task.deadline, now) <= 0
}

/// Sends one e-mail and swallows the failure. Returns whether it went out.
pub async fn deliver(mailer: &dyn Mailer, email: OutgoingEmail) -> bool {
    match mailer.send(&email).await {
        Ok(()) => {
            info!("Email ({:?}) sent to {}", email.kind, email.to);
            true
        }
        Err(e) => {
            error!("Failed to send {:?} email to {}: {}", email.kind, email.to, e);
            false
        }
    }
}

#[derive(Clone)]
pub struct Notifier {
    mailer: Arc<dyn Mailer>,
    db: Arc<MongoDB>,
}

impl Notifier {
    pub fn new(mailer: Arc<dyn Mailer>, db: Arc<MongoDB>) -> Self {
        Notifier { mailer, db }
    }

    async fn lookup_student(&self, student_id: &str) -> Option<User> {
        match self
            .db
            .collection::<User>(db::USERS)
            .find_one(doc! { "_id": student_id })
            .await
        {
            Ok(Some(user)) => Some(user),
            Ok(None) => {
                debug!("No user {} to notify", student_id);
                None
            }
            Err(e) => {
                error!("Error looking up user {}: {}", student_id, e);
                None
            }
        }
    }

    pub fn task_created(&self, task: Task) {
        let this = self.clone();
        actix_web::rt::spawn(async move {
            if let Some(student) = this.lookup_student(&task.student_id).await {
                deliver(this.mailer.as_ref(), task_assigned_email(&student, &task)).await;
            }
        });
    }

    pub fn task_updated(&self, task: Task) {
        if !is_overdue(&task, Utc::now()) {
            return;
        }
        let this = self.clone();
        actix_web::rt::spawn(async move {
            if let Some(student) = this.lookup_student(&task.student_id).await {
                deliver(this.mailer.as_ref(), task_overdue_email(&student, &task)).await;
            }
        });
    }

    pub fn interview_created(&self, interview: Interview) {
        let this = self.clone();
        actix_web::rt::spawn(async move {
            if let Some(student) = this.lookup_student(&interview.student_id).await {
                deliver(
                    this.mailer.as_ref(),
                    interview_scheduled_email(&student, &interview),
                )
                .await;
            }
        });
    }

    pub fn join_approved(&self, name: String, email: String, project_title: String) {
        let mailer = self.mailer.clone();
        actix_web::rt::spawn(async move {
            deliver(mailer.as_ref(), join_approved_email(&name, &email, &project_title)).await;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Role, TaskStatus};
    use chrono::{Duration, TimeZone};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingMailer {
        sent: Mutex<Vec<OutgoingEmail>>,
    }

    #[async_trait]
    impl Mailer for RecordingMailer {
        async fn send(&self, email: &OutgoingEmail) -> Result<(), MailError> {
            self.sent.lock().unwrap().push(email.clone());
            Ok(())
        }
    }

    struct BrokenMailer;

    #[async_trait]
    impl Mailer for BrokenMailer {
        async fn send(&self, _email: &OutgoingEmail) -> Result<(), MailError> {
            let bad: Result<Mailbox, _> = "not an address".parse();
            Err(MailError::Address(bad.unwrap_err()))
        }
    }

    fn student() -> User {
        User {
            id: "s1".into(),
            name: "Asha".into(),
            email: "asha@example.com".into(),
            password_hash: String::new(),
            role: Role::Student,
            department: "Computer Science & Engineering".into(),
            srn: Some("PES1UG21CS001".into()),
            about: None,
        }
    }

    fn task(status: TaskStatus, deadline: DateTime<Utc>) -> Task {
        Task {
            id: "t1".into(),
            name: "Literature survey".into(),
            student_id: "s1".into(),
            project_id: "p1".into(),
            deadline,
            status,
            file_url: String::new(),
            submission_url: None,
            assigned_by: "f1".into(),
            created_at: deadline - Duration::days(7),
            submitted_at: None,
        }
    }

    #[test]
    fn overdue_only_for_pending_tasks_past_due() {
        let now = Utc.with_ymd_and_hms(2025, 1, 2, 9, 0, 0).unwrap();
        let past = Utc.with_ymd_and_hms(2025, 1, 1, 10, 0, 0).unwrap();
        let future = now + Duration::days(3);

        assert!(is_overdue(&task(TaskStatus::Pending, past), now));
        assert!(!is_overdue(&task(TaskStatus::Pending, future), now));
        assert!(!is_overdue(&task(TaskStatus::Late, past), now));
        assert!(!is_overdue(&task(TaskStatus::Submitted, past), now));
    }

    #[test]
    fn assigned_template_names_task_and_deadline() {
        let deadline = Utc.with_ymd_and_hms(2025, 3, 14, 17, 30, 0).unwrap();
        let email = task_assigned_email(&student(), &task(TaskStatus::Pending, deadline));
        assert_eq!(email.to, "asha@example.com");
        assert_eq!(email.subject, "New Task Assigned");
        assert!(email.text.contains("\"Literature survey\""));
        assert!(email.text.contains("14 Mar 2025, 17:30 UTC"));
    }

    #[test]
    fn interview_template_carries_link() {
        let interview = Interview {
            id: "i1".into(),
            student_id: "s1".into(),
            faculty_id: "f1".into(),
            project_id: None,
            date_time: Utc.with_ymd_and_hms(2025, 2, 1, 11, 0, 0).unwrap(),
            meeting_link: "https://meet.example.com/abc".into(),
            status: "Scheduled".into(),
        };
        let email = interview_scheduled_email(&student(), &interview);
        assert_eq!(email.kind, EmailKind::InterviewScheduled);
        assert!(email.text.contains("https://meet.example.com/abc"));
        assert!(email.html.unwrap().contains("href=\"https://meet.example.com/abc\""));
    }

    #[tokio::test]
    async fn deliver_records_sent_mail() {
        let mailer = RecordingMailer::default();
        let email = join_approved_email("Asha", "asha@example.com", "Smart Campus");
        assert!(deliver(&mailer, email).await);

        let sent = mailer.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].subject, "You're approved to join \"Smart Campus\"!");
    }

    #[tokio::test]
    async fn deliver_swallows_failures() {
        let email = task_overdue_email(
            &student(),
            &task(TaskStatus::Pending, Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()),
        );
        assert!(!deliver(&BrokenMailer, email).await);
    }

    #[tokio::test]
    async fn mailer_follows_configured_transport() {
        let mut cfg = Config::for_tests();
        let db = Arc::new(
            MongoDB::init(&cfg.mongo_uri, &cfg.database_name)
                .await
                .unwrap(),
        );
        assert!(mailer_from_config(&cfg, db.clone()).is_ok());

        cfg.mail_transport = MailTransport::Smtp;
        cfg.mail_from = "not an address".into();
        assert!(matches!(
            mailer_from_config(&cfg, db),
            Err(MailError::Address(_))
        ));
    }
}
