use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use serde_json::json;
use thiserror::Error;

use crate::face::{FaceError, ImageRole};

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Student {student_id} not enrolled in course {course_id}")]
    NotEnrolled { student_id: u64, course_id: u64 },

    #[error("No profile picture stored for this student")]
    NoReferencePhoto,

    #[error("No face detected in the {0}")]
    NoFaceDetected(ImageRole),

    #[error("More than one face detected in the {0}")]
    MultipleFaces(ImageRole),

    #[error("Could not process uploaded image: {0}")]
    InvalidImage(String),

    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Image exceeds {0} bytes")]
    PayloadTooLarge(usize),

    #[error("Database error: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("Internal server error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, AppError>;

impl From<FaceError> for AppError {
    fn from(err: FaceError) -> Self {
        match err {
            FaceError::NoFaceDetected(role) => AppError::NoFaceDetected(role),
            FaceError::MultipleFaces(role) => AppError::MultipleFaces(role),
            FaceError::Decode(e) => AppError::InvalidImage(e.to_string()),
            other => AppError::Internal(other.to_string()),
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_)
            | AppError::NoReferencePhoto
            | AppError::NoFaceDetected(_)
            | AppError::MultipleFaces(_)
            | AppError::InvalidImage(_)
            | AppError::InvalidCredentials => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) | AppError::NotEnrolled { .. } => StatusCode::NOT_FOUND,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::Storage(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let message = match self {
            AppError::Storage(e) => {
                tracing::error!(error = %e, "Database error");
                "Database error occurred".to_string()
            }
            AppError::Internal(msg) => {
                tracing::error!(error = %msg, "Internal error");
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };

        HttpResponse::build(self.status_code()).json(json!({ "error": message }))
    }
}
