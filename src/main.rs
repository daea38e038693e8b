// src/main.rs

mod activity;
mod app_state;
mod auth;
mod chat;
mod chat_server;
mod config;
mod dashboard;
mod db;
mod error;
mod export;
mod files;
mod interview;
mod models;
mod notifications;
mod notifier;
mod project;
mod requests;
mod session;
mod task;
mod tracker;
mod user_management;
mod web_socket_server;

use std::io;
use std::sync::Arc;

use actix::Actor;
use actix_cors::Cors;
use actix_web::{http, middleware::Logger, web, App, HttpServer};
use env_logger::Env;
use log::info;

use crate::activity::{export_activity_pdf, list_activity, ActivityLogger};
use crate::app_state::AppState;
use crate::auth::{login, signup};
use crate::chat::{get_conversation, list_conversations, send_message, unread_count};
use crate::dashboard::{
    admin_dashboard, faculty_dashboard, projects_progress, projects_progress_pdf,
    student_dashboard, student_progress, student_progress_pdf, students_performance,
};
use crate::files::{list_files, upload_file};
use crate::interview::{
    faculty_interviews, feedback_summary, feedback_summary_csv, my_feedback,
    schedule_interview, submit_feedback, upcoming_interviews,
};
use crate::notifications::{list_notifications, mark_all_read, mark_read};
use crate::notifier::{mailer_from_config, Notifier};
use crate::project::{
    create_project, delete_project, get_project, list_projects, my_projects, update_project,
};
use crate::requests::{approve_request, my_requests, pending_requests, reject_request, request_join};
use crate::session::Authentication;
use crate::task::{assign_task, my_tasks, project_tasks, submit_task, update_task};
use crate::user_management::{find_user_email, get_me, get_user_by_id, list_users, update_me};
use crate::web_socket_server::ws_index;

#[actix_web::main]
async fn main() -> io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let config = config::Config::from_env()
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e.to_string()))?;
    let mongodb = Arc::new(
        db::MongoDB::init(&config.mongo_uri, &config.database_name)
            .await
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))?,
    );
    mongodb
        .ensure_indexes()
        .await
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))?;
    let chat_server = chat_server::ChatServer::new(mongodb.clone()).start();
    let mailer = mailer_from_config(&config, mongodb.clone())
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e.to_string()))?;
    let notifier = Notifier::new(mailer, mongodb.clone());
    let activity = ActivityLogger::new(mongodb.clone(), config.institution_domain.clone());

    let state = web::Data::new(AppState {
        chat_server,
        mongodb,
        config: config.clone(),
        notifier,
        activity,
    });

    info!("Server running at http://{}", config.bind_address);
    info!("Allowed CORS Origin: {}", config.frontend_origin);
    info!("Mail transport: {:?}", config.mail_transport);

    let bind_address = config.bind_address.clone();
    HttpServer::new(move || {
        let cors = Cors::default()
            .allowed_origin(&config.frontend_origin)
            .allowed_methods(vec!["GET", "POST", "PUT", "DELETE", "OPTIONS"])
            .allowed_headers(vec![
                http::header::CONTENT_TYPE,
                http::header::ACCEPT,
                http::header::AUTHORIZATION,
            ])
            .supports_credentials()
            .max_age(3600);

        App::new()
            .wrap(Logger::default())
            .wrap(cors)
            .wrap(Authentication::new(config.jwt_secret.clone()))
            .app_data(state.clone())
            .service(
                web::scope("/auth")
                    .route("/signup", web::post().to(signup))
                    .route("/login", web::post().to(login)),
            )
            // USERS
            .service(
                web::scope("/users")
                    .route("", web::get().to(list_users))
                    .route("/me", web::get().to(get_me))
                    .route("/me", web::put().to(update_me))
                    .route("/find", web::get().to(find_user_email))
                    .route("/{id}", web::get().to(get_user_by_id)),
            )
            // PROJECTS & JOIN REQUESTS
            .service(
                web::scope("/projects")
                    .route("", web::post().to(create_project))
                    .route("", web::get().to(list_projects))
                    .route("/mine", web::get().to(my_projects))
                    .route("/{project_id}", web::get().to(get_project))
                    .route("/{project_id}", web::put().to(update_project))
                    .route("/{project_id}", web::delete().to(delete_project))
                    .route("/{project_id}/requests", web::post().to(request_join))
                    .route("/{project_id}/files", web::get().to(list_files))
                    .route("/{project_id}/files", web::post().to(upload_file)),
            )
            .service(
                web::scope("/requests")
                    .route("/pending", web::get().to(pending_requests))
                    .route("/mine", web::get().to(my_requests))
                    .route("/{request_id}/approve", web::post().to(approve_request))
                    .route("/{request_id}/reject", web::post().to(reject_request)),
            )
            // TASKS
            .service(
                web::scope("/tasks")
                    .route("", web::post().to(assign_task))
                    .route("/mine", web::get().to(my_tasks))
                    .route("/project/{project_id}", web::get().to(project_tasks))
                    .route("/{task_id}", web::put().to(update_task))
                    .route("/{task_id}/submit", web::post().to(submit_task)),
            )
            // INTERVIEWS & FEEDBACK
            .service(
                web::scope("/interviews")
                    .route("", web::post().to(schedule_interview))
                    .route("/upcoming", web::get().to(upcoming_interviews))
                    .route("/faculty", web::get().to(faculty_interviews))
                    .route("/{interview_id}/feedback", web::post().to(submit_feedback)),
            )
            .service(
                web::scope("/feedback")
                    .route("/mine", web::get().to(my_feedback))
                    .route("/summary.csv", web::get().to(feedback_summary_csv))
                    .route("/summary", web::get().to(feedback_summary)),
            )
            // NOTIFICATIONS & ACTIVITY
            .service(
                web::scope("/notifications")
                    .route("", web::get().to(list_notifications))
                    .route("/read_all", web::post().to(mark_all_read))
                    .route("/{id}/read", web::post().to(mark_read)),
            )
            .service(
                web::scope("/activity")
                    .route("", web::get().to(list_activity))
                    .route("/export.pdf", web::get().to(export_activity_pdf)),
            )
            // CHATS
            .service(
                web::scope("/chats")
                    .route("", web::get().to(list_conversations))
                    .route("/unread/count", web::get().to(unread_count))
                    .route("/{peer_id}", web::get().to(get_conversation))
                    .route("/{peer_id}", web::post().to(send_message)),
            )
            // DASHBOARDS & PROGRESS
            .service(
                web::scope("/dashboard")
                    .route("/admin", web::get().to(admin_dashboard))
                    .route("/faculty", web::get().to(faculty_dashboard))
                    .route("/student", web::get().to(student_dashboard)),
            )
            .service(
                web::scope("/progress")
                    .route("/projects", web::get().to(projects_progress))
                    .route("/projects.pdf", web::get().to(projects_progress_pdf))
                    .route("/students", web::get().to(students_performance))
                    .route("/students/{student_id}.pdf", web::get().to(student_progress_pdf))
                    .route("/students/{student_id}", web::get().to(student_progress)),
            )
            // WEBSOCKET route for real-time
            .service(web::resource("/ws").route(web::get().to(ws_index)))
    })
    .bind(bind_address)?
    .run()
    .await
}
