use actix_web::middleware::NormalizePath;
use actix_web::web::Data;
use actix_web::{App, HttpServer};
use anyhow::Context;
use std::sync::Arc;

mod api;
mod auth;
mod config;
mod db;
mod docs;
mod error;
mod face;
mod model;
mod models;
mod repo;
mod routes;
mod service;
mod utils;

use config::Config;
use db::{init_db, init_schema};

use crate::docs::ApiDoc;
use crate::face::onnx::{OnnxFaceEncoder, OnnxSettings};
use crate::face::{FaceMatcher, MatchPolicy};
use crate::repo::{Repository, mysql::MySqlRepository};
use crate::service::verification::VerificationWorkflow;
use crate::utils::reference_cache::ReferenceCache;
use tracing::info;
use tracing_appender::rolling;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    // Rolling daily log
    let file_appender = rolling::daily(&config.log_dir, "attendance.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    let level: tracing::Level = config
        .log_level
        .parse()
        .with_context(|| format!("LOG_LEVEL has an invalid value: {}", config.log_level))?;

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_max_level(level)
        .with_ansi(false)
        .with_target(false) // removes module path
        .with_level(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .pretty()
        .init();

    info!("Server starting...");

    let pool = init_db(&config.database_url, config.db_max_connections)
        .await
        .context("failed to connect to the database")?;
    init_schema(&pool)
        .await
        .context("failed to create the database schema")?;

    let repo: Arc<dyn Repository> = Arc::new(MySqlRepository::new(pool));

    let encoder = OnnxFaceEncoder::load(
        &config.face_detector_model,
        &config.face_recognizer_model,
        OnnxSettings {
            detection_confidence: config.face_detection_confidence,
            ..OnnxSettings::default()
        },
    )
    .context("failed to load face models")?;

    let matcher = Arc::new(FaceMatcher::new(
        Arc::new(encoder),
        MatchPolicy {
            threshold: config.face_match_threshold,
            reject_multiple_faces: config.reject_multiple_faces,
        },
    ));
    let workflow = Data::new(VerificationWorkflow::new(
        repo.clone(),
        matcher,
        ReferenceCache::new(config.reference_cache_capacity),
    ));

    info!(
        threshold = workflow.threshold(),
        reject_multiple_faces = config.reject_multiple_faces,
        "Face verification ready"
    );

    let server_addr = config.server_addr.clone();
    let config_data = config.clone();

    HttpServer::new(move || {
        App::new()
            .wrap(actix_web::middleware::Logger::default())
            .wrap(NormalizePath::trim())
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}") // wildcard {_:.*} to match JS/CSS files
                    .url("/api-doc/openapi.json", ApiDoc::openapi()),
            )
            .app_data(Data::from(repo.clone()))
            .app_data(Data::new(config.clone()))
            .app_data(workflow.clone())
            // auth + protected routes with rate limiting
            .configure(|cfg| routes::configure(cfg, config_data.clone()))
    })
    .bind(&server_addr)
    .with_context(|| format!("failed to bind {}", server_addr))?
    .run()
    .await?;

    Ok(())
}
