// src/dashboard.rs
//
// Role dashboards and progress reports. Everything is recomputed from the
// task, project and interview collections on each request.

use actix_web::{web, HttpResponse};
use chrono::Utc;
use futures::stream::TryStreamExt;
use mongodb::bson::{doc, Document};
use serde::Serialize;

use crate::app_state::AppState;
use crate::db;
use crate::error::{ApiError, ApiResult};
use crate::export::SimplePdf;
use crate::models::{ChatMessage, Interview, Project, ProjectRequest, Role, Task, User};
use crate::session::Session;
use crate::tracker::{stats_by, TaskStats};
use crate::user_management::fetch_user;

#[derive(Debug, Serialize)]
pub struct AdminDashboard {
    pub total_users: u64,
    pub total_students: u64,
    pub total_faculty: u64,
    pub total_projects: u64,
    pub total_interviews: u64,
    pub tasks: TaskStats,
}

#[derive(Debug, Serialize)]
pub struct FacultyDashboard {
    pub total_projects: usize,
    pub pending_requests: u64,
    pub upcoming_interviews: usize,
    pub tasks: TaskStats,
    pub projects: Vec<Project>,
}

#[derive(Debug, Serialize)]
pub struct StudentDashboard {
    pub joined_projects: usize,
    pub upcoming_interviews: usize,
    pub unread_messages: u64,
    pub tasks: TaskStats,
}

#[derive(Debug, Serialize)]
pub struct ProjectProgress {
    pub project_id: String,
    pub project_title: String,
    #[serde(flatten)]
    pub stats: TaskStats,
}

#[derive(Debug, Serialize)]
pub struct StudentPerformance {
    pub student_id: String,
    pub name: String,
    pub email: String,
    #[serde(flatten)]
    pub stats: TaskStats,
}

/// One row per project, including projects with no tasks yet.
pub fn project_progress(projects: &[Project], tasks: &[Task]) -> Vec<ProjectProgress> {
    let by_project = stats_by(tasks, |t| t.project_id.as_str());
    projects
        .iter()
        .map(|p| ProjectProgress {
            project_id: p.id.clone(),
            project_title: p.title.clone(),
            stats: by_project.get(&p.id).copied().unwrap_or_default(),
        })
        .collect()
}

pub fn student_performance(students: &[User], tasks: &[Task]) -> Vec<StudentPerformance> {
    let by_student = stats_by(tasks, |t| t.student_id.as_str());
    students
        .iter()
        .map(|s| StudentPerformance {
            student_id: s.id.clone(),
            name: s.name.clone(),
            email: s.email.clone(),
            stats: by_student.get(&s.id).copied().unwrap_or_default(),
        })
        .collect()
}

pub fn project_progress_pdf(rows: &[ProjectProgress]) -> Vec<u8> {
    let mut pdf = SimplePdf::new();
    pdf.title("Project Progress Summary").table(
        &["Project Title", "Total Tasks", "Submitted", "Late", "Pending", "Progress %"],
        rows.iter().map(|r| {
            vec![
                r.project_title.clone(),
                r.stats.total.to_string(),
                r.stats.submitted.to_string(),
                r.stats.late.to_string(),
                r.stats.pending.to_string(),
                format!("{}%", r.stats.progress),
            ]
        }),
    );
    pdf.render()
}

pub fn student_report_pdf(perf: &StudentPerformance) -> Vec<u8> {
    let s = &perf.stats;
    let mut pdf = SimplePdf::new();
    pdf.title("Student Progress Report")
        .text(&format!("Student Name: {}", perf.name))
        .text(&format!("Email: {}", perf.email))
        .blank()
        .heading("Task Summary")
        .table(
            &["Metric", "Value"],
            vec![
                vec!["Total Tasks Assigned".to_string(), s.total.to_string()],
                vec!["Submitted On Time".to_string(), s.submitted.to_string()],
                vec!["Submitted Late".to_string(), s.late.to_string()],
                vec!["Pending".to_string(), s.pending.to_string()],
                vec!["Progress (%)".to_string(), s.progress.to_string()],
            ],
        );
    pdf.render()
}

fn pdf_response(body: Vec<u8>, filename: &str) -> HttpResponse {
    HttpResponse::Ok()
        .content_type("application/pdf")
        .insert_header((
            "Content-Disposition",
            format!("attachment; filename=\"{}\"", filename),
        ))
        .body(body)
}

async fn find_all<T>(state: &AppState, name: &str, filter: Document) -> ApiResult<Vec<T>>
where
    T: serde::de::DeserializeOwned + Send + Sync,
{
    Ok(state
        .mongodb
        .collection::<T>(name)
        .find(filter)
        .await?
        .try_collect()
        .await?)
}

/// GET /dashboard/admin
pub async fn admin_dashboard(session: Session, data: web::Data<AppState>) -> ApiResult<HttpResponse> {
    session.require_admin()?;
    let users = data.mongodb.collection::<User>(db::USERS);
    let tasks: Vec<Task> = find_all(&data, db::TASKS, doc! {}).await?;

    let dashboard = AdminDashboard {
        total_users: users.count_documents(doc! {}).await?,
        total_students: users.count_documents(doc! { "role": Role::Student.as_str() }).await?,
        total_faculty: users.count_documents(doc! { "role": Role::Faculty.as_str() }).await?,
        total_projects: data
            .mongodb
            .collection::<Project>(db::PROJECTS)
            .count_documents(doc! {})
            .await?,
        total_interviews: data
            .mongodb
            .collection::<Interview>(db::INTERVIEWS)
            .count_documents(doc! {})
            .await?,
        tasks: TaskStats::from_tasks(&tasks),
    };
    Ok(HttpResponse::Ok().json(dashboard))
}

/// GET /dashboard/faculty
pub async fn faculty_dashboard(
    session: Session,
    data: web::Data<AppState>,
) -> ApiResult<HttpResponse> {
    session.require_faculty()?;
    let projects: Vec<Project> =
        find_all(&data, db::PROJECTS, doc! { "faculty_id": &session.user_id }).await?;
    let project_ids: Vec<String> = projects.iter().map(|p| p.id.clone()).collect();

    let pending_requests = data
        .mongodb
        .collection::<ProjectRequest>(db::PROJECT_REQUESTS)
        .count_documents(doc! { "project_id": { "$in": project_ids }, "status": "Pending" })
        .await?;
    let now = Utc::now();
    let interviews: Vec<Interview> =
        find_all(&data, db::INTERVIEWS, doc! { "faculty_id": &session.user_id }).await?;
    let tasks: Vec<Task> =
        find_all(&data, db::TASKS, doc! { "assigned_by": &session.user_id }).await?;

    Ok(HttpResponse::Ok().json(FacultyDashboard {
        total_projects: projects.len(),
        pending_requests,
        upcoming_interviews: interviews.iter().filter(|i| i.date_time >= now).count(),
        tasks: TaskStats::from_tasks(&tasks),
        projects,
    }))
}

/// GET /dashboard/student
pub async fn student_dashboard(
    session: Session,
    data: web::Data<AppState>,
) -> ApiResult<HttpResponse> {
    session.require_student()?;
    let joined_projects = data
        .mongodb
        .collection::<Project>(db::PROJECTS)
        .count_documents(doc! { "members": &session.user_id })
        .await?;
    let tasks: Vec<Task> =
        find_all(&data, db::TASKS, doc! { "student_id": &session.user_id }).await?;
    let interviews: Vec<Interview> =
        find_all(&data, db::INTERVIEWS, doc! { "student_id": &session.user_id }).await?;
    let unread_messages = data
        .mongodb
        .collection::<ChatMessage>(db::CHATS)
        .count_documents(doc! { "receiver": &session.user_id, "read": false })
        .await?;
    let now = Utc::now();

    Ok(HttpResponse::Ok().json(StudentDashboard {
        joined_projects: joined_projects as usize,
        upcoming_interviews: interviews.iter().filter(|i| i.date_time >= now).count(),
        unread_messages,
        tasks: TaskStats::from_tasks(&tasks),
    }))
}

async fn load_project_progress(state: &AppState, session: &Session) -> ApiResult<Vec<ProjectProgress>> {
    session.require_faculty()?;
    let filter = match session.role {
        Role::Admin => doc! {},
        _ => doc! { "faculty_id": &session.user_id },
    };
    let projects: Vec<Project> = find_all(state, db::PROJECTS, filter).await?;
    let project_ids: Vec<String> = projects.iter().map(|p| p.id.clone()).collect();
    let tasks: Vec<Task> =
        find_all(state, db::TASKS, doc! { "project_id": { "$in": project_ids } }).await?;
    Ok(project_progress(&projects, &tasks))
}

/// GET /progress/projects
pub async fn projects_progress(session: Session, data: web::Data<AppState>) -> ApiResult<HttpResponse> {
    let rows = load_project_progress(&data, &session).await?;
    Ok(HttpResponse::Ok().json(rows))
}

/// GET /progress/projects.pdf
pub async fn projects_progress_pdf(
    session: Session,
    data: web::Data<AppState>,
) -> ApiResult<HttpResponse> {
    let rows = load_project_progress(&data, &session).await?;
    Ok(pdf_response(project_progress_pdf(&rows), "project_progress.pdf"))
}

fn assigned_by_filter(session: &Session) -> Document {
    match session.role {
        Role::Admin => doc! {},
        _ => doc! { "assigned_by": &session.user_id },
    }
}

/// GET /progress/students
/// Every student, scored on the tasks the caller assigned.
pub async fn students_performance(
    session: Session,
    data: web::Data<AppState>,
) -> ApiResult<HttpResponse> {
    session.require_faculty()?;
    let students: Vec<User> =
        find_all(&data, db::USERS, doc! { "role": Role::Student.as_str() }).await?;
    let tasks: Vec<Task> = find_all(&data, db::TASKS, assigned_by_filter(&session)).await?;
    Ok(HttpResponse::Ok().json(student_performance(&students, &tasks)))
}

async fn load_student_performance(
    state: &AppState,
    session: &Session,
    student_id: &str,
) -> ApiResult<StudentPerformance> {
    session.require_faculty()?;
    let student = fetch_user(state, student_id)
        .await?
        .filter(|u| u.role == Role::Student)
        .ok_or_else(|| ApiError::NotFound("Student not found".to_string()))?;
    let mut filter = assigned_by_filter(session);
    filter.insert("student_id", student.id.clone());
    let tasks: Vec<Task> = find_all(state, db::TASKS, filter).await?;
    let mut rows = student_performance(std::slice::from_ref(&student), &tasks);
    rows.pop()
        .ok_or_else(|| ApiError::Internal("Performance row missing".to_string()))
}

/// GET /progress/students/{student_id}
pub async fn student_progress(
    session: Session,
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> ApiResult<HttpResponse> {
    let perf = load_student_performance(&data, &session, &path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(perf))
}

/// GET /progress/students/{student_id}.pdf
pub async fn student_progress_pdf(
    session: Session,
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> ApiResult<HttpResponse> {
    let perf = load_student_performance(&data, &session, &path.into_inner()).await?;
    let filename = format!("{}_progress_report.pdf", perf.name.replace('"', ""));
    Ok(pdf_response(student_report_pdf(&perf), &filename))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TaskStatus;
    use chrono::Duration;

    fn project(id: &str, title: &str) -> Project {
        Project {
            id: id.into(),
            title: title.into(),
            description: String::new(),
            faculty_id: "f1".into(),
            faculty_name: "Dr. Rao".into(),
            members: vec!["s1".into()],
            created_at: Utc::now(),
        }
    }

    fn task(project_id: &str, student_id: &str, status: TaskStatus) -> Task {
        let now = Utc::now();
        Task {
            id: format!("{}-{}-{:?}", project_id, student_id, status),
            name: "Survey".into(),
            student_id: student_id.into(),
            project_id: project_id.into(),
            deadline: now + Duration::days(3),
            status,
            file_url: String::new(),
            submission_url: None,
            assigned_by: "f1".into(),
            created_at: now,
            submitted_at: None,
        }
    }

    fn student(id: &str, name: &str) -> User {
        User {
            id: id.into(),
            name: name.into(),
            email: format!("{}@example.com", id),
            password_hash: String::new(),
            role: Role::Student,
            department: "MCA".into(),
            srn: None,
            about: None,
        }
    }

    #[test]
    fn projects_without_tasks_report_zero() {
        let projects = vec![project("p1", "Campus Map"), project("p2", "Air Quality")];
        let tasks = vec![
            task("p1", "s1", TaskStatus::Submitted),
            task("p1", "s1", TaskStatus::Late),
            task("p1", "s2", TaskStatus::Pending),
        ];
        let rows = project_progress(&projects, &tasks);
        assert_eq!(rows[0].stats.total, 3);
        assert_eq!(rows[0].stats.progress, 67);
        assert_eq!(rows[1].stats, TaskStats::default());
    }

    #[test]
    fn performance_is_per_student() {
        let students = vec![student("s1", "Asha"), student("s2", "Ravi")];
        let tasks = vec![
            task("p1", "s1", TaskStatus::Submitted),
            task("p1", "s2", TaskStatus::Pending),
            task("p2", "s2", TaskStatus::Late),
        ];
        let rows = student_performance(&students, &tasks);
        assert_eq!(rows[0].stats.progress, 100);
        assert_eq!(rows[1].stats.total, 2);
        assert_eq!(rows[1].stats.progress, 50);
    }

    #[test]
    fn progress_pdf_lists_projects() {
        let rows = project_progress(&[project("p1", "Campus Map")], &[]);
        let pdf = String::from_utf8_lossy(&project_progress_pdf(&rows)).to_string();
        assert!(pdf.starts_with("%PDF-1.4"));
        assert!(pdf.contains("Project Progress Summary"));
        assert!(pdf.contains("Campus Map | 0 | 0 | 0 | 0 | 0%"));
    }

    #[test]
    fn student_report_has_metrics() {
        let perf = student_performance(&[student("s1", "Asha")], &[]).remove(0);
        let pdf = String::from_utf8_lossy(&student_report_pdf(&perf)).to_string();
        assert!(pdf.contains("Student Name: Asha"));
        assert!(pdf.contains("(Task Summary) Tj"));
        assert!(pdf.contains("Submitted On Time | 0"));
    }
}
