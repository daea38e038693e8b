// src/files.rs

use actix_web::{web, HttpResponse};
use chrono::Utc;
use futures::stream::TryStreamExt;
use log::info;
use mongodb::bson::doc;
use serde::Deserialize;

use crate::app_state::AppState;
use crate::db;
use crate::error::{ApiError, ApiResult};
use crate::models::{new_id, Project, ProjectFile, Role};
use crate::project::fetch_project;
use crate::session::Session;

#[derive(Debug, Deserialize)]
pub struct UploadFileRequest {
    pub name: String,
    pub url: String,
}

/// Owner, members and admins see a project's files.
pub fn can_access(project: &Project, session: &Session) -> bool {
    session.role == Role::Admin
        || project.faculty_id == session.user_id
        || project.members.iter().any(|m| m == &session.user_id)
}

pub fn validate_upload(req: &UploadFileRequest) -> ApiResult<(String, String)> {
    let name = req.name.trim();
    if name.is_empty() {
        return Err(ApiError::BadRequest("File name is required".to_string()));
    }
    let url = req.url.trim();
    if !(url.starts_with("https://") || url.starts_with("http://")) {
        return Err(ApiError::BadRequest("File URL must be http(s)".to_string()));
    }
    Ok((name.to_string(), url.to_string()))
}

async fn fetch_accessible_project(
    state: &AppState,
    session: &Session,
    project_id: &str,
) -> ApiResult<Project> {
    let project = fetch_project(state, project_id).await?;
    if !can_access(&project, session) {
        return Err(ApiError::Forbidden("Not a member of this project".to_string()));
    }
    Ok(project)
}

/// POST /projects/{project_id}/files
pub async fn upload_file(
    session: Session,
    data: web::Data<AppState>,
    path: web::Path<String>,
    payload: web::Json<UploadFileRequest>,
) -> ApiResult<HttpResponse> {
    let project = fetch_accessible_project(&data, &session, &path).await?;
    let (name, url) = validate_upload(&payload)?;

    let file = ProjectFile {
        id: new_id(),
        project_id: project.id.clone(),
        name,
        url,
        uploaded_by: session.user_id.clone(),
        uploaded_by_email: session.email.clone(),
        timestamp: Utc::now(),
    };
    data.mongodb
        .collection::<ProjectFile>(db::FILES)
        .insert_one(&file)
        .await?;
    info!("File {} attached to project {}", file.id, project.id);

    data.activity
        .log(
            &session,
            "Uploaded a file",
            Some(&project.id),
            format!("File: \"{}\"", file.name),
        )
        .await;
    Ok(HttpResponse::Ok().json(file))
}

/// GET /projects/{project_id}/files
/// Newest first.
pub async fn list_files(
    session: Session,
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> ApiResult<HttpResponse> {
    let project = fetch_accessible_project(&data, &session, &path).await?;
    let files: Vec<ProjectFile> = data
        .mongodb
        .collection::<ProjectFile>(db::FILES)
        .find(doc! { "project_id": &project.id })
        .sort(doc! { "timestamp": -1 })
        .await?
        .try_collect()
        .await?;
    Ok(HttpResponse::Ok().json(files))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn project() -> Project {
        Project {
            id: "p1".into(),
            title: "Smart Campus".into(),
            description: String::new(),
            faculty_id: "f1".into(),
            faculty_name: "Dr. Rao".into(),
            members: vec!["s1".into()],
            created_at: Utc::now(),
        }
    }

    fn session(user_id: &str, role: Role) -> Session {
        Session {
            user_id: user_id.into(),
            email: format!("{}@college.edu", user_id),
            role,
        }
    }

    #[test]
    fn only_owner_members_and_admins_see_files() {
        let p = project();
        assert!(can_access(&p, &session("f1", Role::Faculty)));
        assert!(can_access(&p, &session("s1", Role::Student)));
        assert!(can_access(&p, &session("a1", Role::Admin)));
        assert!(!can_access(&p, &session("s2", Role::Student)));
        assert!(!can_access(&p, &session("f2", Role::Faculty)));
    }

    #[test]
    fn upload_needs_a_name_and_web_url() {
        let ok = UploadFileRequest {
            name: " report.pdf ".into(),
            url: "https://storage.example.com/p1/report.pdf".into(),
        };
        assert_eq!(
            validate_upload(&ok).unwrap(),
            ("report.pdf".to_string(), ok.url.clone())
        );

        let unnamed = UploadFileRequest {
            name: "  ".into(),
            url: ok.url.clone(),
        };
        assert!(matches!(validate_upload(&unnamed), Err(ApiError::BadRequest(_))));

        let local = UploadFileRequest {
            name: "report.pdf".into(),
            url: "file:///etc/passwd".into(),
        };
        assert!(matches!(validate_upload(&local), Err(ApiError::BadRequest(_))));
    }
}
