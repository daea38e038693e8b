use actix_web::{web, HttpResponse};
use bcrypt::{hash, verify, DEFAULT_COST};
use log::{debug, info};
use mongodb::bson::doc;
use regex::Regex;
use serde::Deserialize;
use std::sync::OnceLock;

use crate::app_state::AppState;
use crate::db;
use crate::error::{ApiError, ApiResult};
use crate::models::user::PublicUser;
use crate::models::{new_id, Role, User};
use crate::session::create_jwt;

#[derive(Debug, Deserialize)]
pub struct SignupInfo {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: Role,
    pub department: String,
    pub srn: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginInfo {
    pub email: String,
    pub password: String,
}

fn email_pattern() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| {
        Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email pattern is valid")
    })
}

impl SignupInfo {
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.name.trim().is_empty() {
            return Err(ApiError::BadRequest("Name is required".to_string()));
        }
        if !email_pattern().is_match(self.email.trim()) {
            return Err(ApiError::BadRequest("Invalid email".to_string()));
        }
        if self.password.len() < 6 {
            return Err(ApiError::BadRequest(
                "Password must be at least 6 characters".to_string(),
            ));
        }
        if self.department.trim().is_empty() {
            return Err(ApiError::BadRequest("Please select a department".to_string()));
        }
        if self.role == Role::Admin {
            return Err(ApiError::Forbidden("Admin accounts cannot self-register".to_string()));
        }
        Ok(())
    }
}

fn already_registered() -> ApiError {
    ApiError::Conflict("This email is already registered. Please login instead.".to_string())
}

fn auth_response(user: User, secret: &str) -> ApiResult<HttpResponse> {
    let token = create_jwt(&user.id, &user.email, user.role, secret)?;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "token": token,
        "user": PublicUser::from(user),
    })))
}

// Signup Endpoint
pub async fn signup(
    data: web::Data<AppState>,
    signup_info: web::Json<SignupInfo>,
) -> ApiResult<HttpResponse> {
    let info = signup_info.into_inner();
    debug!("Signup request for {}", info.email);
    info.validate()?;

    let email = info.email.trim().to_lowercase();
    let users = data.mongodb.collection::<User>(db::USERS);
    if users.find_one(doc! { "email": &email }).await?.is_some() {
        return Err(already_registered());
    }

    let new_user = User {
        id: new_id(),
        name: info.name.trim().to_string(),
        email,
        password_hash: hash(&info.password, DEFAULT_COST)?,
        role: info.role,
        department: info.department,
        srn: if info.role == Role::Student { info.srn } else { None },
        about: None,
    };
    // A concurrent signup for the same address loses on the unique index.
    users.insert_one(&new_user).await.map_err(|e| {
        if db::is_duplicate_key(&e) {
            already_registered()
        } else {
            ApiError::from(e)
        }
    })?;
    info!("User {} signed up as {}", new_user.id, new_user.role.as_str());

    auth_response(new_user, &data.config.jwt_secret)
}

// Login Endpoint
pub async fn login(
    data: web::Data<AppState>,
    login_info: web::Json<LoginInfo>,
) -> ApiResult<HttpResponse> {
    let email = login_info.email.trim().to_lowercase();
    let user = data
        .mongodb
        .collection::<User>(db::USERS)
        .find_one(doc! { "email": &email })
        .await?
        .ok_or_else(|| ApiError::Unauthorized("Invalid credentials".to_string()))?;

    if !verify(&login_info.password, &user.password_hash).unwrap_or(false) {
        return Err(ApiError::Unauthorized("Invalid credentials".to_string()));
    }
    info!("User {} logged in", user.id);
    auth_response(user, &data.config.jwt_secret)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(email: &str, role: Role) -> SignupInfo {
        SignupInfo {
            name: "Asha".into(),
            email: email.into(),
            password: "hunter22".into(),
            role,
            department: "MCA".into(),
            srn: None,
        }
    }

    #[test]
    fn accepts_well_formed_signup() {
        assert!(info("asha@example.com", Role::Student).validate().is_ok());
        assert!(info("rao@pes.edu", Role::Faculty).validate().is_ok());
    }

    #[test]
    fn rejects_bad_email_and_admin_role() {
        assert!(matches!(
            info("not-an-email", Role::Student).validate(),
            Err(ApiError::BadRequest(_))
        ));
        assert!(matches!(
            info("root@pes.edu", Role::Admin).validate(),
            Err(ApiError::Forbidden(_))
        ));
    }

    #[test]
    fn requires_department() {
        let mut s = info("asha@example.com", Role::Student);
        s.department = "  ".into();
        assert!(s.validate().is_err());
    }

    #[test]
    fn duplicate_signup_is_a_conflict() {
        use actix_web::{http::StatusCode, ResponseError};
        assert_eq!(already_registered().status_code(), StatusCode::CONFLICT);
    }
}
