use serde::Serialize;
use tracing::{debug, info};
use utoipa::ToSchema;

use crate::auth::jwt::generate_access_token;
use crate::auth::password::verify_password;
use crate::config::Config;
use crate::error::{AppError, Result};
use crate::repo::Repository;

#[derive(Debug, Serialize, ToSchema)]
pub struct Session {
    pub access_token: String,
    #[schema(example = "bearer")]
    pub token_type: String,
    /// seconds until the token expires
    #[schema(example = 1800)]
    pub expires_in: i64,
}

/// Unknown usernames and wrong passwords fail the same way.
pub async fn authenticate(
    repo: &dyn Repository,
    config: &Config,
    username: &str,
    password: &str,
) -> Result<Session> {
    if username.trim().is_empty() || password.is_empty() {
        return Err(AppError::Validation(
            "Username and password must not be empty".to_string(),
        ));
    }

    let instructor = match repo.find_instructor_by_username(username).await? {
        Some(i) => i,
        None => {
            info!("Invalid credentials: user not found");
            return Err(AppError::InvalidCredentials);
        }
    };

    if let Err(e) = verify_password(password, &instructor.password) {
        info!(error = %e, "Invalid credentials: password mismatch");
        return Err(AppError::InvalidCredentials);
    }
    debug!(instructor_id = instructor.id, "Password verified");

    let (access_token, _) = generate_access_token(
        instructor.id,
        instructor.username,
        &config.jwt_secret,
        config.access_token_ttl,
    )
    .map_err(|e| AppError::Internal(format!("token signing failed: {}", e)))?;

    Ok(Session {
        access_token,
        token_type: "bearer".to_string(),
        expires_in: config.access_token_ttl,
    })
}
