use crate::{
    api::{attendance, course, student},
    auth::{handlers, middleware::auth_middleware},
    config::Config,
    error::AppError,
};
use actix_governor::{
    Governor, GovernorConfig, GovernorConfigBuilder, PeerIpKeyExtractor,
    governor::middleware::NoOpMiddleware,
};
use actix_web::{error::JsonPayloadError, middleware::from_fn, web};
use std::sync::Arc;

/// JSON bodies may carry a base64 image, so the limit follows the image cap.
pub fn json_config(config: &Config) -> web::JsonConfig {
    let max_image_bytes = config.max_image_bytes;
    web::JsonConfig::default()
        .limit(config.json_limit())
        .error_handler(move |err, _req| {
            let app_err = match err {
                JsonPayloadError::OverflowKnownLength { .. } | JsonPayloadError::Overflow { .. } => {
                    AppError::PayloadTooLarge(max_image_bytes)
                }
                other => AppError::Validation(format!("Invalid request body: {}", other)),
            };
            app_err.into()
        })
}

pub fn configure(cfg: &mut web::ServiceConfig, config: Config) {
    // Helper to build per-route limiter
    fn build_limiter(requests_per_min: u32) -> Governor<PeerIpKeyExtractor, NoOpMiddleware> {
        let requests_per_min = requests_per_min.max(1);
        let per_ms = (60_000 / requests_per_min as u64).max(1);
        let cfg = GovernorConfigBuilder::default()
            .per_millisecond(per_ms)
            .burst_size(requests_per_min)
            .key_extractor(PeerIpKeyExtractor)
            .finish()
            .unwrap_or_else(|| {
                tracing::warn!(requests_per_min, "Invalid rate limit, using defaults");
                GovernorConfig::default()
            });
        Governor::new(&cfg)
    }

    let login_limiter = Arc::new(build_limiter(config.rate_login_per_min));
    let register_limiter = Arc::new(build_limiter(config.rate_register_per_min));
    let protected_limiter = Arc::new(build_limiter(config.rate_protected_per_min));

    cfg.app_data(json_config(&config));

    // Public routes
    cfg.service(
        web::resource("/login")
            .wrap(login_limiter.clone())
            .route(web::post().to(handlers::login)),
    )
    .service(
        web::resource("/register")
            .wrap(register_limiter.clone())
            .route(web::post().to(handlers::register)),
    );

    // Protected routes
    cfg.service(
        web::scope(&config.api_prefix)
            .wrap(from_fn(auth_middleware)) // authentication
            .wrap(protected_limiter) // rate limiting
            .service(
                web::scope("/attendance")
                    // /attendance/verify
                    .service(
                        web::resource("/verify")
                            .route(web::post().to(attendance::verify_attendance)),
                    )
                    // /attendance/instructor/{username}
                    .service(
                        web::resource("/instructor/{username}")
                            .route(web::get().to(attendance::instructor_dashboard)),
                    )
                    // /attendance/instructor/{username}/course/{course_id}
                    .service(
                        web::resource("/instructor/{username}/course/{course_id}")
                            .route(web::get().to(attendance::course_dashboard)),
                    ),
            )
            .service(
                web::scope("/students")
                    // /students
                    .service(web::resource("").route(web::post().to(student::create_student)))
                    // /students/{id}/upload-photo
                    .service(
                        web::resource("/{id}/upload-photo")
                            .route(web::post().to(student::upload_photo)),
                    )
                    // /students/{id}/verify-face
                    .service(
                        web::resource("/{id}/verify-face")
                            .route(web::post().to(student::verify_face)),
                    )
                    // /students/{id}/verify-and-attend/{course_id}
                    .service(
                        web::resource("/{id}/verify-and-attend/{course_id}")
                            .route(web::post().to(student::verify_and_attend)),
                    ),
            )
            .service(
                web::scope("/courses")
                    // /courses
                    .service(web::resource("").route(web::post().to(course::create_course)))
                    // /courses/{id}/enrollments
                    .service(
                        web::resource("/{id}/enrollments")
                            .route(web::post().to(course::enroll_student)),
                    ),
            ),
    );
}
