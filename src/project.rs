// src/project.rs

use actix_web::{web, HttpResponse};
use chrono::Utc;
use futures::stream::TryStreamExt;
use log::{debug, info};
use mongodb::bson::doc;
use serde::Deserialize;

use crate::app_state::AppState;
use crate::db;
use crate::error::{ApiError, ApiResult};
use crate::models::{new_id, Project, ProjectRequest, Role};
use crate::session::Session;
use crate::user_management::fetch_user;

#[derive(Debug, Deserialize)]
pub struct CreateProjectRequest {
    pub title: String,
    pub description: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateProjectRequest {
    pub title: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ProjectQuery {
    pub search: Option<String>,
    pub faculty: Option<String>,
}

impl ProjectQuery {
    pub fn matches(&self, project: &Project) -> bool {
        let search_ok = match self.search.as_deref().map(str::trim) {
            Some(term) if !term.is_empty() => {
                let term = term.to_lowercase();
                project.title.to_lowercase().contains(&term)
                    || project.description.to_lowercase().contains(&term)
            }
            _ => true,
        };
        let faculty_ok = match self.faculty.as_deref() {
            Some(name) if !name.is_empty() => project.faculty_name == name,
            _ => true,
        };
        search_ok && faculty_ok
    }
}

pub async fn fetch_project(state: &AppState, project_id: &str) -> ApiResult<Project> {
    state
        .mongodb
        .collection::<Project>(db::PROJECTS)
        .find_one(doc! { "_id": project_id })
        .await?
        .ok_or_else(|| ApiError::NotFound("Project not found".to_string()))
}

/// The project, provided the caller owns it. Admins pass as owners.
pub async fn fetch_owned_project(
    state: &AppState,
    session: &Session,
    project_id: &str,
) -> ApiResult<Project> {
    let project = fetch_project(state, project_id).await?;
    if project.faculty_id != session.user_id && session.role != Role::Admin {
        return Err(ApiError::Forbidden("Only the project owner can do this".to_string()));
    }
    Ok(project)
}

/// POST /projects
pub async fn create_project(
    session: Session,
    data: web::Data<AppState>,
    payload: web::Json<CreateProjectRequest>,
) -> ApiResult<HttpResponse> {
    session.require_faculty()?;
    debug!("create_project payload: {:?}", payload);
    if payload.title.trim().is_empty() {
        return Err(ApiError::BadRequest("Title is required".to_string()));
    }

    let faculty_name = fetch_user(&data, &session.user_id)
        .await?
        .map(|u| u.name)
        .unwrap_or_else(|| "N/A".to_string());

    let new_project = Project {
        id: new_id(),
        title: payload.title.trim().to_string(),
        description: payload.description.clone(),
        faculty_id: session.user_id.clone(),
        faculty_name,
        members: Vec::new(),
        created_at: Utc::now(),
    };
    data.mongodb
        .collection::<Project>(db::PROJECTS)
        .insert_one(&new_project)
        .await?;
    info!("Project created {:?}", new_project.id);

    data.activity
        .log(
            &session,
            "Created a project",
            Some(&new_project.id),
            format!("Project: \"{}\"", new_project.title),
        )
        .await;
    Ok(HttpResponse::Ok().json(new_project))
}

/// GET /projects
pub async fn list_projects(
    _session: Session,
    data: web::Data<AppState>,
    query: web::Query<ProjectQuery>,
) -> ApiResult<HttpResponse> {
    let projects: Vec<Project> = data
        .mongodb
        .collection::<Project>(db::PROJECTS)
        .find(doc! {})
        .sort(doc! { "created_at": -1 })
        .await?
        .try_collect()
        .await?;
    let projects: Vec<Project> = projects.into_iter().filter(|p| query.matches(p)).collect();
    Ok(HttpResponse::Ok().json(projects))
}

/// GET /projects/mine
/// Faculty see the projects they own, students the ones they are members of.
pub async fn my_projects(session: Session, data: web::Data<AppState>) -> ApiResult<HttpResponse> {
    let filter = match session.role {
        Role::Student => doc! { "members": &session.user_id },
        Role::Faculty | Role::Admin => doc! { "faculty_id": &session.user_id },
    };
    let projects: Vec<Project> = data
        .mongodb
        .collection::<Project>(db::PROJECTS)
        .find(filter)
        .await?
        .try_collect()
        .await?;
    Ok(HttpResponse::Ok().json(projects))
}

/// GET /projects/{project_id}
pub async fn get_project(
    _session: Session,
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> ApiResult<HttpResponse> {
    let project = fetch_project(&data, &path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(project))
}

/// PUT /projects/{project_id}
pub async fn update_project(
    session: Session,
    data: web::Data<AppState>,
    path: web::Path<String>,
    update_info: web::Json<UpdateProjectRequest>,
) -> ApiResult<HttpResponse> {
    let project_id = path.into_inner();
    fetch_owned_project(&data, &session, &project_id).await?;

    let mut set_doc = doc! {};
    if let Some(title) = update_info.title.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
        set_doc.insert("title", title);
    }
    if let Some(desc) = &update_info.description {
        set_doc.insert("description", desc.clone());
    }
    if set_doc.is_empty() {
        return Err(ApiError::BadRequest("No fields to update".to_string()));
    }

    data.mongodb
        .collection::<Project>(db::PROJECTS)
        .update_one(doc! { "_id": &project_id }, doc! { "$set": set_doc })
        .await?;
    data.activity
        .log(&session, "Updated a project", Some(&project_id), String::new())
        .await;

    let project = fetch_project(&data, &project_id).await?;
    Ok(HttpResponse::Ok().json(project))
}

/// DELETE /projects/{project_id}
pub async fn delete_project(
    session: Session,
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> ApiResult<HttpResponse> {
    let project_id = path.into_inner();
    let project = fetch_owned_project(&data, &session, &project_id).await?;

    let res = data
        .mongodb
        .collection::<Project>(db::PROJECTS)
        .delete_one(doc! { "_id": &project_id })
        .await?;
    if res.deleted_count == 0 {
        return Err(ApiError::NotFound("Project not found".to_string()));
    }
    // Pending requests for a project that no longer exists can never be decided.
    data.mongodb
        .collection::<ProjectRequest>(db::PROJECT_REQUESTS)
        .delete_many(doc! { "project_id": &project_id, "status": "Pending" })
        .await?;

    data.activity
        .log(
            &session,
            "Deleted a project",
            Some(&project_id),
            format!("Project: \"{}\"", project.title),
        )
        .await;
    Ok(HttpResponse::Ok().body("Project deleted"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn project(title: &str, description: &str, faculty: &str) -> Project {
        Project {
            id: new_id(),
            title: title.into(),
            description: description.into(),
            faculty_id: "f1".into(),
            faculty_name: faculty.into(),
            members: vec![],
            created_at: Utc::now(),
        }
    }

    #[test]
    fn search_matches_title_or_description() {
        let p = project("Smart Campus", "IoT sensors for classrooms", "Dr. Rao");
        let q = ProjectQuery {
            search: Some("iot".into()),
            faculty: None,
        };
        assert!(q.matches(&p));
        let q = ProjectQuery {
            search: Some("blockchain".into()),
            faculty: None,
        };
        assert!(!q.matches(&p));
    }

    #[test]
    fn faculty_filter_is_exact() {
        let p = project("Smart Campus", "", "Dr. Rao");
        let q = ProjectQuery {
            search: None,
            faculty: Some("Dr. Rao".into()),
        };
        assert!(q.matches(&p));
        let q = ProjectQuery {
            search: None,
            faculty: Some("Dr. Iyer".into()),
        };
        assert!(!q.matches(&p));
        assert!(ProjectQuery::default().matches(&p));
    }
}
