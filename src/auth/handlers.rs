use crate::{
    auth::{
        credentials::{Session, authenticate},
        password::hash_password,
    },
    config::Config,
    error::AppError,
    model::instructor::NewInstructor,
    models::{LoginReqDto, RegisterReq},
    repo::Repository,
};
use actix_web::{HttpResponse, web};
use serde_json::json;
use tracing::{debug, info, instrument};

/// Instructor registration
#[utoipa::path(
    post,
    path = "/register",
    request_body = RegisterReq,
    responses(
        (status = 201, description = "Instructor registered", body = Object, example = json!({
            "message": "Instructor registered successfully",
            "instructorId": 1
        })),
        (status = 400, description = "Missing fields"),
        (status = 409, description = "Username already exists")
    ),
    tag = "Auth"
)]
#[instrument(
    name = "auth_register",
    skip(user, repo),
    fields(username = %user.username)
)]
pub async fn register(
    user: web::Json<RegisterReq>,
    repo: web::Data<dyn Repository>,
) -> Result<HttpResponse, AppError> {
    let user = user.into_inner();
    let username = user.username.trim();

    if username.is_empty()
        || user.password.is_empty()
        || user.first_name.trim().is_empty()
        || user.last_name.trim().is_empty()
    {
        info!("Validation failed: empty registration field");
        return Err(AppError::Validation(
            "Username, password, first and last name must not be empty".to_string(),
        ));
    }

    let password_hash = hash_password(&user.password)
        .map_err(|e| AppError::Internal(format!("password hashing failed: {}", e)))?;

    let instructor_id = repo
        .insert_instructor(&NewInstructor {
            username: username.to_string(),
            password_hash,
            first_name: user.first_name.trim().to_string(),
            last_name: user.last_name.trim().to_string(),
        })
        .await?;

    info!(instructor_id, "Instructor registered");

    Ok(HttpResponse::Created().json(json!({
        "message": "Instructor registered successfully",
        "instructorId": instructor_id
    })))
}

/// Exchange credentials for a bearer token
#[utoipa::path(
    post,
    path = "/login",
    request_body = LoginReqDto,
    responses(
        (status = 200, description = "Authenticated", body = Session),
        (status = 400, description = "Invalid username or password", body = Object, example = json!({
            "error": "Invalid username or password"
        }))
    ),
    tag = "Auth"
)]
#[instrument(
    name = "auth_login",
    skip(user, repo, config),
    fields(username = %user.username)
)]
pub async fn login(
    user: web::Json<LoginReqDto>,
    repo: web::Data<dyn Repository>,
    config: web::Data<Config>,
) -> Result<HttpResponse, AppError> {
    info!("Login request received");

    let session = authenticate(repo.get_ref(), &config, &user.username, &user.password).await?;

    debug!("Access token issued");
    info!("Login successful");

    Ok(HttpResponse::Ok().json(session))
}
