use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};

use actix_web::{
    body::{BoxBody, MessageBody},
    dev::{Payload, Service, ServiceRequest, ServiceResponse, Transform},
    http, Error, FromRequest, HttpMessage, HttpRequest, ResponseError,
};
use chrono::{Duration, Utc};
use futures::future::{ok, ready, Ready};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::models::Role;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub email: String,
    pub role: Role,
    pub exp: usize,
}

/// The authenticated caller, passed explicitly to every handler that needs it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user_id: String,
    pub email: String,
    pub role: Role,
}

impl Session {
    pub fn require_faculty(&self) -> Result<(), ApiError> {
        match self.role {
            Role::Faculty | Role::Admin => Ok(()),
            Role::Student => Err(ApiError::Forbidden("Faculty only".to_string())),
        }
    }

    pub fn require_student(&self) -> Result<(), ApiError> {
        match self.role {
            Role::Student => Ok(()),
            _ => Err(ApiError::Forbidden("Students only".to_string())),
        }
    }

    pub fn require_admin(&self) -> Result<(), ApiError> {
        match self.role {
            Role::Admin => Ok(()),
            _ => Err(ApiError::Forbidden("Admins only".to_string())),
        }
    }
}

impl From<Claims> for Session {
    fn from(c: Claims) -> Self {
        Session {
            user_id: c.sub,
            email: c.email,
            role: c.role,
        }
    }
}

// JWT Creation
pub fn create_jwt(
    user_id: &str,
    email: &str,
    role: Role,
    secret: &str,
) -> Result<String, jsonwebtoken::errors::Error> {
    let expiration = Utc::now() + Duration::hours(24);
    let claims = Claims {
        sub: user_id.to_string(),
        email: email.to_string(),
        role,
        exp: expiration.timestamp() as usize,
    };
    encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_ref()))
}

// JWT Validation
pub fn validate_jwt(token: &str, secret: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_ref()),
        &Validation::default(),
    )?;
    Ok(token_data.claims)
}

impl FromRequest for Session {
    type Error = ApiError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(
            req.extensions()
                .get::<Session>()
                .cloned()
                .ok_or_else(|| ApiError::Unauthorized("Unauthorized".to_string())),
        )
    }
}

/// Validates `Authorization: Bearer <token>` and stores the resulting
/// [`Session`] in request extensions. Requests without a header pass
/// through untouched; handlers that take a `Session` reject them.
#[derive(Debug, Clone)]
pub struct Authentication {
    secret: Rc<String>,
}

impl Authentication {
    pub fn new(secret: impl Into<String>) -> Self {
        Authentication {
            secret: Rc::new(secret.into()),
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for Authentication
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = Error;
    type Transform = AuthMiddleware<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(AuthMiddleware {
            service,
            secret: self.secret.clone(),
        })
    }
}

pub struct AuthMiddleware<S> {
    service: S,
    secret: Rc<String>,
}

impl<S, B> Service<ServiceRequest> for AuthMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    fn poll_ready(&self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.service.poll_ready(cx)
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let bearer = req
            .headers()
            .get(http::header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .and_then(|s| s.strip_prefix("Bearer "))
            .map(|t| t.trim().to_string());

        if let Some(token) = bearer {
            match validate_jwt(&token, &self.secret) {
                Ok(claims) => {
                    req.extensions_mut().insert(Session::from(claims));
                }
                Err(e) => {
                    let resp = ApiError::from(e).error_response();
                    let (req_parts, _payload) = req.into_parts();
                    let srv_resp = ServiceResponse::new(req_parts, resp);
                    return Box::pin(async move { Ok(srv_resp) });
                }
            }
        }

        let fut = self.service.call(req);
        Box::pin(async move {
            let res = fut.await?;
            Ok(res.map_into_boxed_body())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{test as actix_test, web, App, HttpResponse};

    async fn whoami(session: Session) -> HttpResponse {
        HttpResponse::Ok().body(session.user_id)
    }

    #[test]
    fn jwt_round_trip_keeps_role() {
        let token = create_jwt("u1", "prof@pes.edu", Role::Faculty, "s3cret").unwrap();
        let claims = validate_jwt(&token, "s3cret").unwrap();
        assert_eq!(claims.sub, "u1");
        assert_eq!(claims.role, Role::Faculty);
        assert!(validate_jwt(&token, "other").is_err());
    }

    #[actix_web::test]
    async fn valid_token_yields_session() {
        let app = actix_test::init_service(
            App::new()
                .wrap(Authentication::new("s3cret"))
                .route("/me", web::get().to(whoami)),
        )
        .await;
        let token = create_jwt("student-1", "s@mail.com", Role::Student, "s3cret").unwrap();
        let req = actix_test::TestRequest::get()
            .uri("/me")
            .insert_header(("Authorization", format!("Bearer {}", token)))
            .to_request();
        let body = actix_test::call_and_read_body(&app, req).await;
        assert_eq!(body, "student-1");
    }

    #[actix_web::test]
    async fn missing_token_is_unauthorized() {
        let app = actix_test::init_service(
            App::new()
                .wrap(Authentication::new("s3cret"))
                .route("/me", web::get().to(whoami)),
        )
        .await;
        let req = actix_test::TestRequest::get().uri("/me").to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), http::StatusCode::UNAUTHORIZED);
    }

    #[actix_web::test]
    async fn bad_token_is_rejected_before_handler() {
        let app = actix_test::init_service(
            App::new()
                .wrap(Authentication::new("s3cret"))
                .route("/me", web::get().to(whoami)),
        )
        .await;
        let req = actix_test::TestRequest::get()
            .uri("/me")
            .insert_header(("Authorization", "Bearer not-a-jwt"))
            .to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), http::StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn role_guards() {
        let student = Session {
            user_id: "s".into(),
            email: "s@mail.com".into(),
            role: Role::Student,
        };
        assert!(student.require_student().is_ok());
        assert!(student.require_faculty().is_err());
        assert!(student.require_admin().is_err());
    }
}
