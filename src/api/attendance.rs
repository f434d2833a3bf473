use crate::auth::auth::AuthUser;
use crate::config::Config;
use crate::error::AppError;
use crate::face::MatchResult;
use crate::repo::Repository;
use crate::service::dashboard::{self, DashboardSummary};
use crate::service::ledger::LedgerOutcome;
use crate::service::verification::{VerificationOutcome, VerificationWorkflow, VerifyAttendance};
use actix_web::{HttpResponse, web};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use utoipa::ToSchema;

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VerifyAttendanceReq {
    #[schema(example = 12)]
    pub student_id: u64,
    #[schema(example = 3)]
    pub course_id: u64,
    /// base64 image, optionally as a `data:` URL
    pub probe_image: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VerifyResponse {
    pub verified: bool,
    #[schema(example = 0.31)]
    pub distance: f32,
    #[schema(example = 0.6)]
    pub threshold: f32,
    pub attendance_recorded: bool,
    /// `recorded` or `already_recorded`; absent when the face did not match
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(example = "recorded")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attendance_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<String>, example = "2026-03-14T09:00:00")]
    pub timestamp: Option<NaiveDateTime>,
    pub message: String,
}

impl From<VerificationOutcome> for VerifyResponse {
    fn from(outcome: VerificationOutcome) -> Self {
        match outcome {
            VerificationOutcome::Rejected(m) => Self::unrecorded(m, "Face verification failed"),
            VerificationOutcome::Recorded {
                matched,
                ledger: LedgerOutcome::Created(record),
            } => Self {
                verified: true,
                distance: matched.distance,
                threshold: matched.threshold,
                attendance_recorded: true,
                status: Some("recorded".to_string()),
                attendance_id: Some(record.id),
                timestamp: Some(record.recorded_at),
                message: "Attendance recorded successfully".to_string(),
            },
            VerificationOutcome::Recorded {
                matched,
                ledger: LedgerOutcome::AlreadyRecordedToday(record),
            } => Self {
                verified: true,
                distance: matched.distance,
                threshold: matched.threshold,
                attendance_recorded: false,
                status: Some("already_recorded".to_string()),
                attendance_id: Some(record.id),
                timestamp: Some(record.recorded_at),
                message: "Attendance already recorded for today".to_string(),
            },
        }
    }
}

impl VerifyResponse {
    fn unrecorded(m: MatchResult, message: &str) -> Self {
        Self {
            verified: m.verified,
            distance: m.distance,
            threshold: m.threshold,
            attendance_recorded: false,
            status: None,
            attendance_id: None,
            timestamp: None,
            message: message.to_string(),
        }
    }
}

/// Decodes a base64 image, accepting a `data:image/...;base64,` prefix.
pub fn decode_probe(encoded: &str, max_bytes: usize) -> Result<Vec<u8>, AppError> {
    let payload = match encoded.trim().strip_prefix("data:") {
        Some(rest) => rest
            .split_once(',')
            .map(|(_, data)| data)
            .ok_or_else(|| AppError::Validation("Malformed data URL".to_string()))?,
        None => encoded.trim(),
    };

    // wrapped output from base64 tools and mobile clients
    let payload: String = payload
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();

    let bytes = STANDARD
        .decode(&payload)
        .map_err(|e| AppError::Validation(format!("probeImage is not valid base64: {}", e)))?;

    if bytes.is_empty() {
        return Err(AppError::Validation("probeImage is empty".to_string()));
    }
    if bytes.len() > max_bytes {
        return Err(AppError::PayloadTooLarge(max_bytes));
    }
    Ok(bytes)
}

/// Verify a face and record attendance
#[utoipa::path(
    post,
    path = "/attendance/verify",
    request_body = VerifyAttendanceReq,
    responses(
        (status = 200, description = "Verification finished", body = VerifyResponse, example = json!({
            "verified": true,
            "distance": 0.0,
            "threshold": 0.6,
            "attendanceRecorded": true,
            "status": "recorded",
            "attendanceId": 41,
            "timestamp": "2026-03-14T09:00:00",
            "message": "Attendance recorded successfully"
        })),
        (status = 400, description = "No reference photo, no face, or invalid image"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Course owned by another instructor"),
        (status = 404, description = "Student, course or enrollment not found"),
        (status = 413, description = "Image too large"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
#[instrument(
    name = "attendance_verify",
    skip(auth, body, workflow, config),
    fields(instructor = %auth.username, student_id = body.student_id, course_id = body.course_id)
)]
pub async fn verify_attendance(
    auth: AuthUser,
    body: web::Json<VerifyAttendanceReq>,
    workflow: web::Data<VerificationWorkflow>,
    config: web::Data<Config>,
) -> Result<HttpResponse, AppError> {
    let body = body.into_inner();
    let probe = decode_probe(&body.probe_image, config.max_image_bytes)?;

    let outcome = workflow
        .verify_and_record(VerifyAttendance {
            instructor_id: auth.instructor_id,
            student_id: body.student_id,
            course_id: body.course_id,
            probe,
            at: config.local_now(),
        })
        .await?;

    info!(
        distance = outcome.match_result().distance,
        verified = outcome.match_result().verified,
        "Verification finished"
    );
    let response = VerifyResponse::from(outcome);
    Ok(HttpResponse::Ok().json(response))
}

/// Dashboard across all of an instructor's courses
#[utoipa::path(
    get,
    path = "/attendance/instructor/{username}",
    params(
        ("username", Path, description = "Instructor username")
    ),
    responses(
        (status = 200, description = "Attendance summary", body = DashboardSummary),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Another instructor's dashboard"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn instructor_dashboard(
    auth: AuthUser,
    path: web::Path<String>,
    repo: web::Data<dyn Repository>,
    config: web::Data<Config>,
) -> Result<HttpResponse, AppError> {
    auth.require_username(&path)?;

    let courses = repo.courses_for_instructor(auth.instructor_id).await?;
    let summary = dashboard::summarize(repo.get_ref(), &courses, config.local_now()).await?;

    Ok(HttpResponse::Ok().json(summary))
}

/// Dashboard for one course
#[utoipa::path(
    get,
    path = "/attendance/instructor/{username}/course/{course_id}",
    params(
        ("username", Path, description = "Instructor username"),
        ("course_id", Path, description = "Course ID")
    ),
    responses(
        (status = 200, description = "Attendance summary", body = DashboardSummary),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Another instructor's dashboard"),
        (status = 404, description = "Course not found"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn course_dashboard(
    auth: AuthUser,
    path: web::Path<(String, u64)>,
    repo: web::Data<dyn Repository>,
    config: web::Data<Config>,
) -> Result<HttpResponse, AppError> {
    let (username, course_id) = path.into_inner();
    auth.require_username(&username)?;

    // another instructor's course is reported as missing
    let course = repo
        .find_course(course_id)
        .await?
        .filter(|c| c.instructor_id == auth.instructor_id)
        .ok_or_else(|| AppError::NotFound("Course not found".to_string()))?;

    let summary = dashboard::summarize(repo.get_ref(), &[course], config.local_now()).await?;

    Ok(HttpResponse::Ok().json(summary))
}
