// src/interview.rs
//
// Interview scheduling and post-interview feedback.

use std::collections::HashMap;

use actix_web::{web, HttpResponse};
use chrono::{DateTime, Utc};
use futures::stream::TryStreamExt;
use log::info;
use mongodb::bson::doc;
use serde::{Deserialize, Serialize};

use crate::app_state::AppState;
use crate::db;
use crate::error::{ApiError, ApiResult};
use crate::export::to_csv;
use crate::models::{new_id, Interview, InterviewFeedback, Project, Role, User};
use crate::notifications::notify;
use crate::project::fetch_owned_project;
use crate::session::Session;
use crate::user_management::fetch_user;

pub const STATUS_SCHEDULED: &str = "Scheduled";
pub const STATUS_COMPLETED: &str = "Completed";

#[derive(Debug, Deserialize)]
pub struct ScheduleInterviewRequest {
    pub student_id: String,
    #[serde(default)]
    pub project_id: Option<String>,
    pub date_time: DateTime<Utc>,
    pub meeting_link: String,
}

#[derive(Debug, Deserialize)]
pub struct FeedbackRequest {
    pub rating: u8,
    #[serde(default)]
    pub comment: String,
}

/// A feedback entry with ids resolved to display names.
#[derive(Debug, Serialize)]
pub struct FeedbackSummaryRow {
    pub student_name: String,
    pub project_title: String,
    pub interview_date: Option<DateTime<Utc>>,
    pub rating: u8,
    pub comment: String,
}

pub fn validate_feedback(req: &FeedbackRequest) -> ApiResult<()> {
    if !(1..=5).contains(&req.rating) {
        return Err(ApiError::BadRequest("Rating must be between 1 and 5".to_string()));
    }
    Ok(())
}

pub fn summary_rows(
    feedback: Vec<InterviewFeedback>,
    students: &HashMap<String, String>,
    projects: &HashMap<String, String>,
    interviews: &HashMap<String, DateTime<Utc>>,
) -> Vec<FeedbackSummaryRow> {
    feedback
        .into_iter()
        .map(|f| FeedbackSummaryRow {
            student_name: students
                .get(&f.student_id)
                .cloned()
                .unwrap_or_else(|| "Unknown".to_string()),
            project_title: f
                .project_id
                .as_ref()
                .and_then(|id| projects.get(id))
                .cloned()
                .unwrap_or_else(|| "Unknown".to_string()),
            interview_date: interviews.get(&f.interview_id).copied(),
            rating: f.rating,
            comment: f.comment,
        })
        .collect()
}

pub fn summary_csv(rows: &[FeedbackSummaryRow]) -> Result<Vec<u8>, csv::Error> {
    to_csv(
        &["Student", "Project", "Interview Date", "Rating", "Comment"],
        rows.iter().map(|r| {
            vec![
                r.student_name.clone(),
                r.project_title.clone(),
                r.interview_date
                    .map(|d| d.format("%Y-%m-%d %H:%M").to_string())
                    .unwrap_or_else(|| "Unknown".to_string()),
                r.rating.to_string(),
                r.comment.clone(),
            ]
        }),
    )
}

async fn fetch_interview(state: &AppState, interview_id: &str) -> ApiResult<Interview> {
    state
        .mongodb
        .collection::<Interview>(db::INTERVIEWS)
        .find_one(doc! { "_id": interview_id })
        .await?
        .ok_or_else(|| ApiError::NotFound("Interview not found".to_string()))
}

/// POST /interviews
pub async fn schedule_interview(
    session: Session,
    data: web::Data<AppState>,
    payload: web::Json<ScheduleInterviewRequest>,
) -> ApiResult<HttpResponse> {
    session.require_faculty()?;
    let req = payload.into_inner();
    if req.meeting_link.trim().is_empty() {
        return Err(ApiError::BadRequest("Meeting link is required".to_string()));
    }
    let student = fetch_user(&data, &req.student_id)
        .await?
        .filter(|u| u.role == Role::Student)
        .ok_or_else(|| ApiError::NotFound("Student not found".to_string()))?;
    if let Some(project_id) = &req.project_id {
        fetch_owned_project(&data, &session, project_id).await?;
    }

    let interview = Interview {
        id: new_id(),
        student_id: student.id.clone(),
        faculty_id: session.user_id.clone(),
        project_id: req.project_id,
        date_time: req.date_time,
        meeting_link: req.meeting_link.trim().to_string(),
        status: STATUS_SCHEDULED.to_string(),
    };
    data.mongodb
        .collection::<Interview>(db::INTERVIEWS)
        .insert_one(&interview)
        .await?;
    info!("Interview {} scheduled for {}", interview.id, student.id);

    notify(
        &data,
        &student.id,
        format!(
            "Interview scheduled on {}",
            interview.date_time.format("%d %b %Y, %H:%M UTC")
        ),
        "interviewScheduled",
        Some("/interviews/upcoming".to_string()),
    )
    .await;
    data.notifier.interview_created(interview.clone());
    data.activity
        .log(
            &session,
            "Scheduled an interview",
            interview.project_id.as_deref(),
            format!("Student: {}", student.name),
        )
        .await;
    Ok(HttpResponse::Ok().json(interview))
}

/// GET /interviews/upcoming
pub async fn upcoming_interviews(
    session: Session,
    data: web::Data<AppState>,
) -> ApiResult<HttpResponse> {
    let all: Vec<Interview> = data
        .mongodb
        .collection::<Interview>(db::INTERVIEWS)
        .find(doc! { "student_id": &session.user_id })
        .await?
        .try_collect()
        .await?;
    let now = Utc::now();
    let mut upcoming: Vec<Interview> = all.into_iter().filter(|i| i.date_time >= now).collect();
    upcoming.sort_by_key(|i| i.date_time);
    Ok(HttpResponse::Ok().json(upcoming))
}

/// GET /interviews/faculty
pub async fn faculty_interviews(
    session: Session,
    data: web::Data<AppState>,
) -> ApiResult<HttpResponse> {
    session.require_faculty()?;
    let mut interviews: Vec<Interview> = data
        .mongodb
        .collection::<Interview>(db::INTERVIEWS)
        .find(doc! { "faculty_id": &session.user_id })
        .await?
        .try_collect()
        .await?;
    interviews.sort_by_key(|i| i.date_time);
    Ok(HttpResponse::Ok().json(interviews))
}

/// POST /interviews/{interview_id}/feedback
pub async fn submit_feedback(
    session: Session,
    data: web::Data<AppState>,
    path: web::Path<String>,
    payload: web::Json<FeedbackRequest>,
) -> ApiResult<HttpResponse> {
    session.require_faculty()?;
    validate_feedback(&payload)?;
    let interview = fetch_interview(&data, &path.into_inner()).await?;
    if interview.faculty_id != session.user_id {
        return Err(ApiError::Forbidden(
            "Only the interviewing faculty can leave feedback".to_string(),
        ));
    }

    let feedback_coll = data
        .mongodb
        .collection::<InterviewFeedback>(db::INTERVIEW_FEEDBACK);
    if feedback_coll
        .find_one(doc! { "interview_id": &interview.id })
        .await?
        .is_some()
    {
        return Err(ApiError::Conflict(
            "Feedback already submitted for this interview".to_string(),
        ));
    }

    let feedback = InterviewFeedback {
        id: new_id(),
        student_id: interview.student_id.clone(),
        faculty_id: session.user_id.clone(),
        project_id: interview.project_id.clone(),
        interview_id: interview.id.clone(),
        rating: payload.rating,
        comment: payload.comment.trim().to_string(),
        created_at: Utc::now(),
    };
    feedback_coll.insert_one(&feedback).await?;
    data.mongodb
        .collection::<Interview>(db::INTERVIEWS)
        .update_one(
            doc! { "_id": &interview.id },
            doc! { "$set": { "status": STATUS_COMPLETED } },
        )
        .await?;

    notify(
        &data,
        &feedback.student_id,
        "Feedback is available for your interview".to_string(),
        "interviewFeedback",
        Some("/feedback/mine".to_string()),
    )
    .await;
    data.activity
        .log(
            &session,
            "Submitted interview feedback",
            feedback.project_id.as_deref(),
            format!("Rating: {}", feedback.rating),
        )
        .await;
    Ok(HttpResponse::Ok().json(feedback))
}

/// GET /feedback/mine
pub async fn my_feedback(session: Session, data: web::Data<AppState>) -> ApiResult<HttpResponse> {
    let feedback: Vec<InterviewFeedback> = data
        .mongodb
        .collection::<InterviewFeedback>(db::INTERVIEW_FEEDBACK)
        .find(doc! { "student_id": &session.user_id })
        .sort(doc! { "created_at": -1 })
        .await?
        .try_collect()
        .await?;
    Ok(HttpResponse::Ok().json(feedback))
}

async fn load_summary(state: &AppState, session: &Session) -> ApiResult<Vec<FeedbackSummaryRow>> {
    let filter = match session.role {
        Role::Admin => doc! {},
        _ => doc! { "faculty_id": &session.user_id },
    };
    let feedback: Vec<InterviewFeedback> = state
        .mongodb
        .collection::<InterviewFeedback>(db::INTERVIEW_FEEDBACK)
        .find(filter)
        .sort(doc! { "created_at": -1 })
        .await?
        .try_collect()
        .await?;

    let student_ids: Vec<String> = feedback.iter().map(|f| f.student_id.clone()).collect();
    let project_ids: Vec<String> = feedback.iter().filter_map(|f| f.project_id.clone()).collect();
    let interview_ids: Vec<String> = feedback.iter().map(|f| f.interview_id.clone()).collect();

    let students: HashMap<String, String> = state
        .mongodb
        .collection::<User>(db::USERS)
        .find(doc! { "_id": { "$in": student_ids } })
        .await?
        .try_collect::<Vec<User>>()
        .await?
        .into_iter()
        .map(|u| (u.id, u.name))
        .collect();
    let projects: HashMap<String, String> = state
        .mongodb
        .collection::<Project>(db::PROJECTS)
        .find(doc! { "_id": { "$in": project_ids } })
        .await?
        .try_collect::<Vec<Project>>()
        .await?
        .into_iter()
        .map(|p| (p.id, p.title))
        .collect();
    let interviews: HashMap<String, DateTime<Utc>> = state
        .mongodb
        .collection::<Interview>(db::INTERVIEWS)
        .find(doc! { "_id": { "$in": interview_ids } })
        .await?
        .try_collect::<Vec<Interview>>()
        .await?
        .into_iter()
        .map(|i| (i.id, i.date_time))
        .collect();

    Ok(summary_rows(feedback, &students, &projects, &interviews))
}

/// GET /feedback/summary
pub async fn feedback_summary(
    session: Session,
    data: web::Data<AppState>,
) -> ApiResult<HttpResponse> {
    session.require_faculty()?;
    let rows = load_summary(&data, &session).await?;
    Ok(HttpResponse::Ok().json(rows))
}

/// GET /feedback/summary.csv
pub async fn feedback_summary_csv(
    session: Session,
    data: web::Data<AppState>,
) -> ApiResult<HttpResponse> {
    session.require_faculty()?;
    let rows = load_summary(&data, &session).await?;
    let body = summary_csv(&rows)?;
    Ok(HttpResponse::Ok()
        .content_type("text/csv")
        .insert_header((
            "Content-Disposition",
            "attachment; filename=\"interview_feedback_summary.csv\"",
        ))
        .body(body))
}
