// src/activity.rs

use std::sync::Arc;

use actix_web::{web, HttpResponse};
use chrono::{DateTime, Duration, Utc};
use futures::stream::TryStreamExt;
use log::{debug, error};
use mongodb::bson::doc;
use serde::Deserialize;

use crate::app_state::AppState;
use crate::db::{self, MongoDB};
use crate::error::ApiResult;
use crate::export::SimplePdf;
use crate::models::{new_id, ActivityLog};
use crate::session::Session;

/// "faculty" when the e-mail carries the institutional domain, else "student".
pub fn classify_role(email: &str, institution_domain: &str) -> &'static str {
    if email.contains(institution_domain) {
        "faculty"
    } else {
        "student"
    }
}

#[derive(Clone)]
pub struct ActivityLogger {
    db: Arc<MongoDB>,
    institution_domain: String,
}

impl ActivityLogger {
    pub fn new(db: Arc<MongoDB>, institution_domain: String) -> Self {
        ActivityLogger {
            db,
            institution_domain,
        }
    }

    pub fn entry(
        &self,
        session: &Session,
        action: &str,
        related_project_id: Option<&str>,
        details: String,
    ) -> ActivityLog {
        ActivityLog {
            id: new_id(),
            user_id: session.user_id.clone(),
            user_role: classify_role(&session.email, &self.institution_domain).to_string(),
            action: action.to_string(),
            related_project_id: related_project_id.map(str::to_string),
            details,
            timestamp: Utc::now(),
        }
    }

    /// Appends one record. A failed write is logged and otherwise ignored.
    pub async fn log(
        &self,
        session: &Session,
        action: &str,
        related_project_id: Option<&str>,
        details: String,
    ) {
        let entry = self.entry(session, action, related_project_id, details);
        debug!("Activity: {} by {}", entry.action, entry.user_id);
        if let Err(e) = self
            .db
            .collection::<ActivityLog>(db::ACTIVITY_LOGS)
            .insert_one(&entry)
            .await
        {
            error!("Failed to log activity: {}", e);
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
pub enum DateRange {
    #[default]
    All,
    Today,
    Last7Days,
}

#[derive(Debug, Default, Deserialize)]
pub struct ActivityQuery {
    /// "student" or "faculty"; anything else means all roles.
    pub role: Option<String>,
    #[serde(default)]
    pub range: DateRange,
    pub search: Option<String>,
}

impl ActivityQuery {
    pub fn matches(&self, log: &ActivityLog, now: DateTime<Utc>) -> bool {
        if let Some(role) = self.role.as_deref() {
            if !role.eq_ignore_ascii_case("all") && !log.user_role.eq_ignore_ascii_case(role) {
                return false;
            }
        }

        let in_range = match self.range {
            DateRange::All => true,
            DateRange::Today => log.timestamp.date_naive() == now.date_naive(),
            DateRange::Last7Days => log.timestamp >= now - Duration::days(7),
        };
        if !in_range {
            return false;
        }

        match self.search.as_deref().map(str::trim) {
            Some(term) if !term.is_empty() => {
                let term = term.to_lowercase();
                log.action.to_lowercase().contains(&term)
                    || log.details.to_lowercase().contains(&term)
                    || log.user_role.to_lowercase().contains(&term)
            }
            _ => true,
        }
    }
}

async fn filtered_logs(state: &AppState, query: &ActivityQuery) -> ApiResult<Vec<ActivityLog>> {
    let logs: Vec<ActivityLog> = state
        .mongodb
        .collection::<ActivityLog>(db::ACTIVITY_LOGS)
        .find(doc! {})
        .sort(doc! { "timestamp": -1 })
        .await?
        .try_collect()
        .await?;
    let now = Utc::now();
    Ok(logs.into_iter().filter(|l| query.matches(l, now)).collect())
}

/// GET /activity
pub async fn list_activity(
    session: Session,
    state: web::Data<AppState>,
    query: web::Query<ActivityQuery>,
) -> ApiResult<HttpResponse> {
    session.require_faculty()?;
    let logs = filtered_logs(&state, &query).await?;
    Ok(HttpResponse::Ok().json(logs))
}

/// GET /activity/export.pdf
pub async fn export_activity_pdf(
    session: Session,
    state: web::Data<AppState>,
    query: web::Query<ActivityQuery>,
) -> ApiResult<HttpResponse> {
    session.require_faculty()?;
    let logs = filtered_logs(&state, &query).await?;

    let rows = logs.iter().map(|l| {
        vec![
            l.user_role.to_uppercase(),
            l.action.clone(),
            if l.details.is_empty() { "-".to_string() } else { l.details.clone() },
            l.timestamp.format("%Y-%m-%d %H:%M").to_string(),
        ]
    });
    let mut pdf = SimplePdf::new();
    pdf.title("Activity Log")
        .table(&["Role", "Action", "Details", "Time"], rows);

    Ok(HttpResponse::Ok()
        .content_type("application/pdf")
        .insert_header(("Content-Disposition", "attachment; filename=\"activity_log.pdf\""))
        .body(pdf.render()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn log(role: &str, action: &str, at: DateTime<Utc>) -> ActivityLog {
        ActivityLog {
            id: "a".into(),
            user_id: "u".into(),
            user_role: role.into(),
            action: action.into(),
            related_project_id: None,
            details: "Task: \"Survey\" to studentId: s1".into(),
            timestamp: at,
        }
    }

    #[test]
    fn institutional_email_is_faculty() {
        assert_eq!(classify_role("rao@pes.edu", "@pes.edu"), "faculty");
        assert_eq!(classify_role("asha@gmail.com", "@pes.edu"), "student");
    }

    #[test]
    fn filters_by_role_range_and_search() {
        let now = Utc.with_ymd_and_hms(2025, 3, 10, 12, 0, 0).unwrap();
        let today = log("faculty", "Assigned a task", now - Duration::hours(1));
        let old = log("student", "Submitted a task", now - Duration::days(9));

        let by_role = ActivityQuery {
            role: Some("Faculty".into()),
            ..Default::default()
        };
        assert!(by_role.matches(&today, now));
        assert!(!by_role.matches(&old, now));

        let week = ActivityQuery {
            range: DateRange::Last7Days,
            ..Default::default()
        };
        assert!(week.matches(&today, now));
        assert!(!week.matches(&old, now));

        let search = ActivityQuery {
            search: Some("SURVEY".into()),
            ..Default::default()
        };
        assert!(search.matches(&old, now));

        let all = ActivityQuery {
            role: Some("All".into()),
            ..Default::default()
        };
        assert!(all.matches(&old, now));
    }
}
