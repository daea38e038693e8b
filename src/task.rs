// src/task.rs

use std::collections::HashMap;

use actix_web::{web, HttpResponse};
use chrono::{DateTime, Utc};
use futures::stream::TryStreamExt;
use log::{debug, info};
use mongodb::bson::{doc, to_bson};
use serde::{Deserialize, Serialize};

use crate::app_state::AppState;
use crate::db;
use crate::error::{ApiError, ApiResult};
use crate::models::{new_id, Project, Role, Task, TaskStatus, User};
use crate::notifications::notify;
use crate::project::{fetch_owned_project, fetch_project};
use crate::session::Session;
use crate::tracker::{derive_submission_status, TaskStats};

#[derive(Debug, Deserialize)]
pub struct AssignTaskRequest {
    pub name: String,
    pub student_id: String,
    pub project_id: String,
    pub deadline: DateTime<Utc>,
    #[serde(default)]
    pub file_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateTaskRequest {
    pub name: Option<String>,
    pub deadline: Option<DateTime<Utc>>,
    pub file_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SubmitTaskRequest {
    #[serde(default)]
    pub submission_url: Option<String>,
}

/// One project's slice of a student's task list.
#[derive(Debug, Serialize)]
pub struct ProjectTasks {
    pub project_id: String,
    pub project_title: String,
    pub stats: TaskStats,
    pub tasks: Vec<Task>,
}

#[derive(Debug, Serialize)]
pub struct TaskWithStudent {
    #[serde(flatten)]
    pub task: Task,
    pub student_name: String,
}

/// Groups a student's tasks by project, ordered by project title.
/// Tasks whose project is gone land under "Unknown Project".
pub fn group_by_project(tasks: Vec<Task>, titles: &HashMap<String, String>) -> Vec<ProjectTasks> {
    let mut groups: HashMap<String, Vec<Task>> = HashMap::new();
    for task in tasks {
        groups.entry(task.project_id.clone()).or_default().push(task);
    }
    let mut out: Vec<ProjectTasks> = groups
        .into_iter()
        .map(|(project_id, mut tasks)| {
            tasks.sort_by_key(|t| t.deadline);
            ProjectTasks {
                project_title: titles
                    .get(&project_id)
                    .cloned()
                    .unwrap_or_else(|| "Unknown Project".to_string()),
                stats: TaskStats::from_tasks(&tasks),
                project_id,
                tasks,
            }
        })
        .collect();
    out.sort_by(|a, b| {
        a.project_title
            .cmp(&b.project_title)
            .then_with(|| a.project_id.cmp(&b.project_id))
    });
    out
}

/// Checks that the submitting student owns a still-pending task and returns
/// the status it moves to.
pub fn check_submission(task: &Task, student_id: &str, now: DateTime<Utc>) -> ApiResult<TaskStatus> {
    if task.student_id != student_id {
        return Err(ApiError::Forbidden("This task is not assigned to you".to_string()));
    }
    if task.status != TaskStatus::Pending {
        return Err(ApiError::Conflict(format!(
            "Task already {}",
            task.status.as_str().to_lowercase()
        )));
    }
    Ok(derive_submission_status(task.deadline, now))
}

async fn fetch_task(state: &AppState, task_id: &str) -> ApiResult<Task> {
    state
        .mongodb
        .collection::<Task>(db::TASKS)
        .find_one(doc! { "_id": task_id })
        .await?
        .ok_or_else(|| ApiError::NotFound("Task not found".to_string()))
}

/// POST /tasks
pub async fn assign_task(
    session: Session,
    data: web::Data<AppState>,
    payload: web::Json<AssignTaskRequest>,
) -> ApiResult<HttpResponse> {
    session.require_faculty()?;
    let req = payload.into_inner();
    debug!("assign_task payload: {:?}", req);
    let name = req.name.trim();
    if name.is_empty() {
        return Err(ApiError::BadRequest("Task name is required".to_string()));
    }

    let project = fetch_owned_project(&data, &session, &req.project_id).await?;
    if !project.members.contains(&req.student_id) {
        return Err(ApiError::BadRequest(
            "Student is not a member of this project".to_string(),
        ));
    }

    let tasks = data.mongodb.collection::<Task>(db::TASKS);
    let duplicate = tasks
        .find_one(doc! {
            "name": name,
            "student_id": &req.student_id,
            "project_id": &project.id,
        })
        .await?;
    if duplicate.is_some() {
        return Err(ApiError::Conflict(
            "This task is already assigned to the student".to_string(),
        ));
    }

    let task = Task {
        id: new_id(),
        name: name.to_string(),
        student_id: req.student_id,
        project_id: project.id.clone(),
        deadline: req.deadline,
        status: TaskStatus::Pending,
        file_url: req.file_url.unwrap_or_default(),
        submission_url: None,
        assigned_by: session.user_id.clone(),
        created_at: Utc::now(),
        submitted_at: None,
    };
    tasks.insert_one(&task).await?;
    info!("Task {} assigned to {}", task.id, task.student_id);

    notify(
        &data,
        &task.student_id,
        format!("New task \"{}\" in \"{}\"", task.name, project.title),
        "taskAssigned",
        Some("/tasks".to_string()),
    )
    .await;
    data.notifier.task_created(task.clone());
    data.activity
        .log(
            &session,
            "Assigned a task",
            Some(&project.id),
            format!("Task: \"{}\"", task.name),
        )
        .await;
    Ok(HttpResponse::Ok().json(task))
}

/// GET /tasks/mine
pub async fn my_tasks(session: Session, data: web::Data<AppState>) -> ApiResult<HttpResponse> {
    session.require_student()?;
    let tasks: Vec<Task> = data
        .mongodb
        .collection::<Task>(db::TASKS)
        .find(doc! { "student_id": &session.user_id })
        .await?
        .try_collect()
        .await?;

    let mut project_ids: Vec<String> = tasks.iter().map(|t| t.project_id.clone()).collect();
    project_ids.sort();
    project_ids.dedup();
    let projects: Vec<Project> = data
        .mongodb
        .collection::<Project>(db::PROJECTS)
        .find(doc! { "_id": { "$in": project_ids } })
        .await?
        .try_collect()
        .await?;
    let titles: HashMap<String, String> = projects.into_iter().map(|p| (p.id, p.title)).collect();

    Ok(HttpResponse::Ok().json(group_by_project(tasks, &titles)))
}

/// GET /tasks/project/{project_id}
/// Faculty see every task on their project, members only their own.
pub async fn project_tasks(
    session: Session,
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> ApiResult<HttpResponse> {
    let project_id = path.into_inner();
    let mut filter = doc! { "project_id": &project_id };
    match session.role {
        Role::Student => {
            let project = fetch_project(&data, &project_id).await?;
            if !project.members.contains(&session.user_id) {
                return Err(ApiError::Forbidden("Not a member of this project".to_string()));
            }
            filter.insert("student_id", session.user_id.clone());
        }
        Role::Faculty | Role::Admin => {
            fetch_owned_project(&data, &session, &project_id).await?;
        }
    }

    let tasks: Vec<Task> = data
        .mongodb
        .collection::<Task>(db::TASKS)
        .find(filter)
        .sort(doc! { "deadline": 1 })
        .await?
        .try_collect()
        .await?;

    let mut student_ids: Vec<String> = tasks.iter().map(|t| t.student_id.clone()).collect();
    student_ids.sort();
    student_ids.dedup();
    let students: Vec<User> = data
        .mongodb
        .collection::<User>(db::USERS)
        .find(doc! { "_id": { "$in": student_ids } })
        .await?
        .try_collect()
        .await?;
    let names: HashMap<String, String> = students.into_iter().map(|u| (u.id, u.name)).collect();

    let out: Vec<TaskWithStudent> = tasks
        .into_iter()
        .map(|task| TaskWithStudent {
            student_name: names
                .get(&task.student_id)
                .cloned()
                .unwrap_or_else(|| "Unknown Student".to_string()),
            task,
        })
        .collect();
    Ok(HttpResponse::Ok().json(out))
}

/// POST /tasks/{task_id}/submit
pub async fn submit_task(
    session: Session,
    data: web::Data<AppState>,
    path: web::Path<String>,
    payload: Option<web::Json<SubmitTaskRequest>>,
) -> ApiResult<HttpResponse> {
    session.require_student()?;
    let mut task = fetch_task(&data, &path.into_inner()).await?;
    let now = Utc::now();
    let status = check_submission(&task, &session.user_id, now)?;
    let submission_url = payload.and_then(|p| p.into_inner().submission_url);

    // Filtered on Pending so a double submit cannot overwrite the first.
    let res = data
        .mongodb
        .collection::<Task>(db::TASKS)
        .update_one(
            doc! { "_id": &task.id, "status": TaskStatus::Pending.as_str() },
            doc! { "$set": {
                "status": status.as_str(),
                "submitted_at": to_bson(&now)?,
                "submission_url": to_bson(&submission_url)?,
            } },
        )
        .await?;
    if res.modified_count == 0 {
        return Err(ApiError::Conflict("Task already submitted".to_string()));
    }
    task.status = status;
    task.submitted_at = Some(now);
    task.submission_url = submission_url;
    info!("Task {} submitted as {}", task.id, status.as_str());

    notify(
        &data,
        &task.assigned_by,
        format!("Task \"{}\" was submitted ({})", task.name, status.as_str()),
        "taskSubmitted",
        Some(format!("/tasks/project/{}", task.project_id)),
    )
    .await;
    data.activity
        .log(
            &session,
            "Submitted a task",
            Some(&task.project_id),
            format!("Task: \"{}\" ({})", task.name, status.as_str()),
        )
        .await;
    data.notifier.task_updated(task.clone());
    Ok(HttpResponse::Ok().json(task))
}

/// PUT /tasks/{task_id}
pub async fn update_task(
    session: Session,
    data: web::Data<AppState>,
    path: web::Path<String>,
    payload: web::Json<UpdateTaskRequest>,
) -> ApiResult<HttpResponse> {
    session.require_faculty()?;
    let task = fetch_task(&data, &path.into_inner()).await?;
    if task.assigned_by != session.user_id && session.role != Role::Admin {
        return Err(ApiError::Forbidden(
            "Only the assigning faculty can edit this task".to_string(),
        ));
    }

    let mut set_doc = doc! {};
    if let Some(name) = payload.name.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
        set_doc.insert("name", name);
    }
    if let Some(deadline) = &payload.deadline {
        set_doc.insert("deadline", to_bson(deadline)?);
    }
    if let Some(file_url) = &payload.file_url {
        set_doc.insert("file_url", file_url.clone());
    }
    if set_doc.is_empty() {
        return Err(ApiError::BadRequest("No fields to update".to_string()));
    }

    data.mongodb
        .collection::<Task>(db::TASKS)
        .update_one(doc! { "_id": &task.id }, doc! { "$set": set_doc })
        .await?;
    let updated = fetch_task(&data, &task.id).await?;

    data.activity
        .log(
            &session,
            "Updated a task",
            Some(&updated.project_id),
            format!("Task: \"{}\"", updated.name),
        )
        .await;
    data.notifier.task_updated(updated.clone());
    Ok(HttpResponse::Ok().json(updated))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn task(project_id: &str, status: TaskStatus, deadline: DateTime<Utc>) -> Task {
        Task {
            id: new_id(),
            name: "Literature survey".into(),
            student_id: "s1".into(),
            project_id: project_id.into(),
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
    fn groups_by_project_title_with_progress() {
        let d = Utc.with_ymd_and_hms(2024, 5, 10, 12, 0, 0).unwrap();
        let tasks = vec![
            task("p2", TaskStatus::Submitted, d),
            task("p1", TaskStatus::Pending, d),
            task("p2", TaskStatus::Pending, d),
            task("gone", TaskStatus::Late, d),
        ];
        let titles: HashMap<String, String> = [
            ("p1".to_string(), "Campus Map".to_string()),
            ("p2".to_string(), "Air Quality".to_string()),
        ]
        .into_iter()
        .collect();

        let groups = group_by_project(tasks, &titles);
        let order: Vec<&str> = groups.iter().map(|g| g.project_title.as_str()).collect();
        assert_eq!(order, vec!["Air Quality", "Campus Map", "Unknown Project"]);
        assert_eq!(groups[0].stats.total, 2);
        assert_eq!(groups[0].stats.progress, 50);
        assert_eq!(groups[1].stats.progress, 0);
        assert_eq!(groups[2].stats.progress, 100);
    }

    #[test]
    fn submission_after_deadline_is_late() {
        let d = Utc.with_ymd_and_hms(2024, 5, 10, 12, 0, 0).unwrap();
        let t = task("p1", TaskStatus::Pending, d);
        assert_eq!(check_submission(&t, "s1", d).unwrap(), TaskStatus::Submitted);
        assert_eq!(
            check_submission(&t, "s1", d + Duration::seconds(1)).unwrap(),
            TaskStatus::Late
        );
    }

    #[test]
    fn only_owner_may_submit_and_only_once() {
        let d = Utc.with_ymd_and_hms(2024, 5, 10, 12, 0, 0).unwrap();
        let t = task("p1", TaskStatus::Pending, d);
        assert!(matches!(check_submission(&t, "s2", d), Err(ApiError::Forbidden(_))));

        let done = task("p1", TaskStatus::Submitted, d);
        assert!(matches!(check_submission(&done, "s1", d), Err(ApiError::Conflict(_))));
        let late = task("p1", TaskStatus::Late, d);
        assert!(matches!(check_submission(&late, "s1", d), Err(ApiError::Conflict(_))));
    }
}
