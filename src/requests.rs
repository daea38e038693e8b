// src/requests.rs
//
// Join-request workflow: a student asks to join, the owning faculty approves
// or rejects. A request is decided exactly once.

use actix_web::{web, HttpResponse};
use async_trait::async_trait;
use chrono::Utc;
use futures::stream::TryStreamExt;
use log::info;
use mongodb::bson::{doc, to_bson};

use crate::app_state::AppState;
use crate::db::{self, MongoDB};
use crate::error::{ApiError, ApiResult};
use crate::models::{new_id, Project, ProjectRequest, RequestStatus};
use crate::notifications::notify;
use crate::project::{fetch_owned_project, fetch_project};
use crate::session::Session;
use crate::user_management::fetch_user;

/// The status a request moves to, or a conflict if it was already decided.
pub fn decide(current: RequestStatus, approve: bool) -> ApiResult<RequestStatus> {
    if current.is_terminal() {
        return Err(ApiError::Conflict(format!(
            "Request already {}",
            current.as_str().to_lowercase()
        )));
    }
    Ok(if approve {
        RequestStatus::Approved
    } else {
        RequestStatus::Rejected
    })
}

async fn fetch_request(state: &AppState, request_id: &str) -> ApiResult<ProjectRequest> {
    state
        .mongodb
        .collection::<ProjectRequest>(db::PROJECT_REQUESTS)
        .find_one(doc! { "_id": request_id })
        .await?
        .ok_or_else(|| ApiError::NotFound("Request not found".to_string()))
}

/// POST /projects/{project_id}/requests
pub async fn request_join(
    session: Session,
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> ApiResult<HttpResponse> {
    session.require_student()?;
    let project = fetch_project(&data, &path.into_inner()).await?;
    if project.members.contains(&session.user_id) {
        return Err(ApiError::Conflict("Already a member of this project".to_string()));
    }

    let requests = data
        .mongodb
        .collection::<ProjectRequest>(db::PROJECT_REQUESTS);
    let existing = requests
        .find_one(doc! {
            "project_id": &project.id,
            "student_id": &session.user_id,
            "status": RequestStatus::Pending.as_str(),
        })
        .await?;
    if existing.is_some() {
        return Err(ApiError::Conflict(
            "You've already requested to join this project.".to_string(),
        ));
    }

    let student = fetch_user(&data, &session.user_id).await?;
    let request = ProjectRequest {
        id: new_id(),
        project_id: project.id.clone(),
        project_title: project.title.clone(),
        student_id: session.user_id.clone(),
        student_name: student
            .as_ref()
            .map(|s| s.name.clone())
            .unwrap_or_else(|| "Unknown Student".to_string()),
        student_email: session.email.clone(),
        status: RequestStatus::Pending,
        created_at: Utc::now(),
        decided_at: None,
    };
    requests.insert_one(&request).await?;
    info!("Join request {} for project {}", request.id, project.id);

    data.activity
        .log(
            &session,
            "Requested to join a project",
            Some(&project.id),
            format!("Project: \"{}\"", project.title),
        )
        .await;
    Ok(HttpResponse::Ok().json(request))
}

/// GET /requests/pending
/// Pending requests for projects the caller owns.
pub async fn pending_requests(
    session: Session,
    data: web::Data<AppState>,
) -> ApiResult<HttpResponse> {
    session.require_faculty()?;
    let owned: Vec<Project> = data
        .mongodb
        .collection::<Project>(db::PROJECTS)
        .find(doc! { "faculty_id": &session.user_id })
        .await?
        .try_collect()
        .await?;
    let project_ids: Vec<String> = owned.into_iter().map(|p| p.id).collect();
    if project_ids.is_empty() {
        return Ok(HttpResponse::Ok().json(Vec::<ProjectRequest>::new()));
    }

    let pending: Vec<ProjectRequest> = data
        .mongodb
        .collection::<ProjectRequest>(db::PROJECT_REQUESTS)
        .find(doc! {
            "project_id": { "$in": project_ids },
            "status": RequestStatus::Pending.as_str(),
        })
        .sort(doc! { "created_at": 1 })
        .await?
        .try_collect()
        .await?;
    Ok(HttpResponse::Ok().json(pending))
}

/// GET /requests/mine
pub async fn my_requests(session: Session, data: web::Data<AppState>) -> ApiResult<HttpResponse> {
    let mine: Vec<ProjectRequest> = data
        .mongodb
        .collection::<ProjectRequest>(db::PROJECT_REQUESTS)
        .find(doc! { "student_id": &session.user_id })
        .sort(doc! { "created_at": -1 })
        .await?
        .try_collect()
        .await?;
    Ok(HttpResponse::Ok().json(mine))
}

/// The two writes a decision makes.
#[async_trait]
pub trait DecisionStore: Sync {
    /// Idempotent: adding an existing member is a no-op.
    async fn add_member(&self, project_id: &str, student_id: &str) -> ApiResult<()>;
    /// Filtered on `Pending`, so of two racing decisions only one wins.
    async fn mark_decided(&self, request_id: &str, next: RequestStatus) -> ApiResult<()>;
}

struct MongoDecisionStore<'a> {
    db: &'a MongoDB,
}

#[async_trait]
impl DecisionStore for MongoDecisionStore<'_> {
    async fn add_member(&self, project_id: &str, student_id: &str) -> ApiResult<()> {
        self.db
            .collection::<Project>(db::PROJECTS)
            .update_one(
                doc! { "_id": project_id },
                doc! { "$addToSet": { "members": student_id } },
            )
            .await?;
        Ok(())
    }

    async fn mark_decided(&self, request_id: &str, next: RequestStatus) -> ApiResult<()> {
        let res = self
            .db
            .collection::<ProjectRequest>(db::PROJECT_REQUESTS)
            .update_one(
                doc! { "_id": request_id, "status": RequestStatus::Pending.as_str() },
                doc! { "$set": {
                    "status": next.as_str(),
                    "decided_at": to_bson(&Utc::now())?,
                } },
            )
            .await?;
        if res.modified_count == 0 {
            return Err(ApiError::Conflict("Request already decided".to_string()));
        }
        Ok(())
    }
}

/// Membership is granted before the request leaves `Pending`. If the status
/// write fails the request stays pending and the decision can be retried.
pub async fn apply_decision(
    store: &dyn DecisionStore,
    request: &ProjectRequest,
    next: RequestStatus,
) -> ApiResult<()> {
    if next == RequestStatus::Approved {
        store.add_member(&request.project_id, &request.student_id).await?;
    }
    store.mark_decided(&request.id, next).await
}

async fn decide_request(
    session: &Session,
    state: &AppState,
    request_id: &str,
    approve: bool,
) -> ApiResult<ProjectRequest> {
    session.require_faculty()?;
    let mut request = fetch_request(state, request_id).await?;
    fetch_owned_project(state, session, &request.project_id).await?;
    let next = decide(request.status, approve)?;
    let store = MongoDecisionStore { db: &state.mongodb };
    apply_decision(&store, &request, next).await?;
    request.status = next;
    request.decided_at = Some(Utc::now());

    info!(
        "Request {} {} by {}",
        request.id,
        next.as_str().to_lowercase(),
        session.user_id
    );
    Ok(request)
}

/// POST /requests/{request_id}/approve
pub async fn approve_request(
    session: Session,
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> ApiResult<HttpResponse> {
    let request = decide_request(&session, &data, &path.into_inner(), true).await?;

    notify(
        &data,
        &request.student_id,
        format!("Your request to join \"{}\" was approved.", request.project_title),
        "joinRequestApproved",
        Some(format!("/projects/{}", request.project_id)),
    )
    .await;
    data.notifier.join_approved(
        request.student_name.clone(),
        request.student_email.clone(),
        request.project_title.clone(),
    );
    data.activity
        .log(
            &session,
            "Approved a join request",
            Some(&request.project_id),
            format!("Student: {}", request.student_name),
        )
        .await;
    Ok(HttpResponse::Ok().json(request))
}

/// POST /requests/{request_id}/reject
pub async fn reject_request(
    session: Session,
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> ApiResult<HttpResponse> {
    let request = decide_request(&session, &data, &path.into_inner(), false).await?;
    data.activity
        .log(
            &session,
            "Rejected a join request",
            Some(&request.project_id),
            format!("Student: {}", request.student_name),
        )
        .await;
    Ok(HttpResponse::Ok().json(request))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeStore {
        calls: Mutex<Vec<String>>,
        fail_status_write: bool,
    }

    #[async_trait]
    impl DecisionStore for FakeStore {
        async fn add_member(&self, project_id: &str, student_id: &str) -> ApiResult<()> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("add_member {} {}", project_id, student_id));
            Ok(())
        }

        async fn mark_decided(&self, request_id: &str, next: RequestStatus) -> ApiResult<()> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("mark_decided {} {}", request_id, next.as_str()));
            if self.fail_status_write {
                return Err(ApiError::Internal("Database error".to_string()));
            }
            Ok(())
        }
    }

    fn pending_request() -> ProjectRequest {
        ProjectRequest {
            id: "r1".into(),
            project_id: "p1".into(),
            project_title: "Campus Map".into(),
            student_id: "s1".into(),
            student_name: "Asha".into(),
            student_email: "asha@example.com".into(),
            status: RequestStatus::Pending,
            created_at: Utc::now(),
            decided_at: None,
        }
    }

    #[tokio::test]
    async fn approval_adds_member_before_leaving_pending() {
        let store = FakeStore::default();
        apply_decision(&store, &pending_request(), RequestStatus::Approved)
            .await
            .unwrap();
        assert_eq!(
            *store.calls.lock().unwrap(),
            vec!["add_member p1 s1", "mark_decided r1 Approved"]
        );
    }

    #[tokio::test]
    async fn failed_status_write_leaves_request_retryable() {
        let store = FakeStore {
            fail_status_write: true,
            ..Default::default()
        };
        let request = pending_request();
        assert!(apply_decision(&store, &request, RequestStatus::Approved).await.is_err());
        // Nothing marked the request decided, so a retry still passes `decide`.
        assert_eq!(
            decide(request.status, true).unwrap(),
            RequestStatus::Approved
        );
    }

    #[tokio::test]
    async fn rejection_never_touches_membership() {
        let store = FakeStore::default();
        apply_decision(&store, &pending_request(), RequestStatus::Rejected)
            .await
            .unwrap();
        assert_eq!(*store.calls.lock().unwrap(), vec!["mark_decided r1 Rejected"]);
    }

    #[test]
    fn pending_reaches_exactly_one_terminal_state() {
        let approved = decide(RequestStatus::Pending, true).unwrap();
        assert_eq!(approved, RequestStatus::Approved);
        assert!(matches!(decide(approved, false), Err(ApiError::Conflict(_))));
        assert!(matches!(decide(approved, true), Err(ApiError::Conflict(_))));

        let rejected = decide(RequestStatus::Pending, false).unwrap();
        assert_eq!(rejected, RequestStatus::Rejected);
        assert!(decide(rejected, true).is_err());
    }
}
