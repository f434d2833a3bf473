use crate::auth::jwt::verify_token;
use crate::config::Config;
use crate::error::AppError;
use crate::model::course::Course;
use actix_web::{FromRequest, HttpMessage, HttpRequest, dev::Payload, web::Data};
use futures::future::{Ready, ready};

/// The instructor behind the bearer token.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub instructor_id: u64,
    pub username: String,
}

impl FromRequest for AuthUser {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        // set by auth_middleware on protected routes
        if let Some(user) = req.extensions().get::<AuthUser>() {
            return ready(Ok(user.clone()));
        }

        let token = match req
            .headers()
            .get("Authorization")
            .and_then(|h| h.to_str().ok())
            .and_then(|h| h.strip_prefix("Bearer "))
        {
            Some(t) => t,
            None => return ready(Err(AppError::Unauthorized("Missing token".to_string()))),
        };

        let config = match req.app_data::<Data<Config>>() {
            Some(c) => c,
            None => return ready(Err(AppError::Internal("Config missing".to_string()))),
        };

        let claims = match verify_token(token, &config.jwt_secret) {
            Ok(c) => c,
            Err(_) => {
                return ready(Err(AppError::Unauthorized(
                    "Invalid or expired token".to_string(),
                )));
            }
        };

        ready(Ok(AuthUser {
            instructor_id: claims.instructor_id,
            username: claims.sub,
        }))
    }
}

impl AuthUser {
    pub fn require_course_owner(&self, course: &Course) -> Result<(), AppError> {
        course.ensure_owned_by(self.instructor_id)
    }

    pub fn require_username(&self, username: &str) -> Result<(), AppError> {
        if self.username == username {
            Ok(())
        } else {
            Err(AppError::Forbidden(
                "Not authorized to view this dashboard".to_string(),
            ))
        }
    }
}
