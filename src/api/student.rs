use crate::api::attendance::VerifyResponse;
use crate::auth::auth::AuthUser;
use crate::config::Config;
use crate::error::AppError;
use crate::face::{MatchResult, normalize_to_png};
use crate::repo::Repository;
use crate::service::verification::{VerificationWorkflow, VerifyAttendance};
use crate::utils::multipart::read_first_file;
use actix_multipart::Multipart;
use actix_web::{HttpResponse, web};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tracing::{info, instrument};
use utoipa::ToSchema;

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateStudent {
    #[schema(example = "Ada")]
    pub first_name: String,
    #[schema(example = "Lovelace")]
    pub last_name: String,
}

/// Create student
#[utoipa::path(
    post,
    path = "/students",
    request_body = CreateStudent,
    responses(
        (status = 201, description = "Student created", body = Object, example = json!({
            "message": "Student created successfully",
            "studentId": 12
        })),
        (status = 400, description = "Missing name"),
        (status = 401, description = "Unauthorized"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Student"
)]
pub async fn create_student(
    _auth: AuthUser,
    body: web::Json<CreateStudent>,
    repo: web::Data<dyn Repository>,
) -> Result<HttpResponse, AppError> {
    let first_name = body.first_name.trim();
    let last_name = body.last_name.trim();
    if first_name.is_empty() || last_name.is_empty() {
        return Err(AppError::Validation(
            "First and last name must not be empty".to_string(),
        ));
    }

    let student_id = repo.insert_student(first_name, last_name).await?;
    info!(student_id, "Student created");

    Ok(HttpResponse::Created().json(json!({
        "message": "Student created successfully",
        "studentId": student_id
    })))
}

/// Upload the student's reference photo
#[utoipa::path(
    post,
    path = "/students/{id}/upload-photo",
    params(
        ("id", Path, description = "Student ID")
    ),
    request_body(content = String, content_type = "multipart/form-data", description = "Image file part"),
    responses(
        (status = 200, description = "Photo stored", body = Object, example = json!({
            "message": "Profile picture uploaded successfully"
        })),
        (status = 400, description = "Missing or undecodable image"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Student not found"),
        (status = 413, description = "Image too large"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Student"
)]
#[instrument(name = "student_upload_photo", skip(_auth, payload, repo, config))]
pub async fn upload_photo(
    _auth: AuthUser,
    path: web::Path<u64>,
    payload: Multipart,
    repo: web::Data<dyn Repository>,
    config: web::Data<Config>,
) -> Result<HttpResponse, AppError> {
    let student_id = path.into_inner();
    if repo.find_student(student_id).await?.is_none() {
        return Err(AppError::NotFound("Student not found".to_string()));
    }

    let bytes = read_first_file(payload, config.max_image_bytes).await?;
    let png = web::block(move || normalize_to_png(&bytes))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))??;

    // microsecond precision; the timestamp doubles as the photo version
    let stored = repo
        .store_student_photo(student_id, png, Utc::now().naive_utc())
        .await?;
    if !stored {
        return Err(AppError::NotFound("Student not found".to_string()));
    }

    info!(student_id, "Reference photo stored");

    Ok(HttpResponse::Ok().json(json!({
        "message": "Profile picture uploaded successfully"
    })))
}

/// Compare a photo with the stored reference without recording attendance
#[utoipa::path(
    post,
    path = "/students/{id}/verify-face",
    params(
        ("id", Path, description = "Student ID")
    ),
    request_body(content = String, content_type = "multipart/form-data", description = "Probe image file part"),
    responses(
        (status = 200, description = "Comparison result", body = MatchResult),
        (status = 400, description = "No reference photo, no face, or invalid image"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Student not found"),
        (status = 413, description = "Image too large")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Student"
)]
pub async fn verify_face(
    _auth: AuthUser,
    path: web::Path<u64>,
    payload: Multipart,
    workflow: web::Data<VerificationWorkflow>,
    config: web::Data<Config>,
) -> Result<HttpResponse, AppError> {
    let probe = read_first_file(payload, config.max_image_bytes).await?;
    let result = workflow.verify_face(path.into_inner(), probe).await?;

    Ok(HttpResponse::Ok().json(result))
}

/// Verify a face and record attendance from a multipart upload
#[utoipa::path(
    post,
    path = "/students/{id}/verify-and-attend/{course_id}",
    params(
        ("id", Path, description = "Student ID"),
        ("course_id", Path, description = "Course ID")
    ),
    request_body(content = String, content_type = "multipart/form-data", description = "Probe image file part"),
    responses(
        (status = 200, description = "Verification finished", body = VerifyResponse),
        (status = 400, description = "No reference photo, no face, or invalid image"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Course owned by another instructor"),
        (status = 404, description = "Student, course or enrollment not found"),
        (status = 413, description = "Image too large")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Student"
)]
pub async fn verify_and_attend(
    auth: AuthUser,
    path: web::Path<(u64, u64)>,
    payload: Multipart,
    workflow: web::Data<VerificationWorkflow>,
    config: web::Data<Config>,
) -> Result<HttpResponse, AppError> {
    let (student_id, course_id) = path.into_inner();
    let probe = read_first_file(payload, config.max_image_bytes).await?;

    let outcome = workflow
        .verify_and_record(VerifyAttendance {
            instructor_id: auth.instructor_id,
            student_id,
            course_id,
            probe,
            at: config.local_now(),
        })
        .await?;

    Ok(HttpResponse::Ok().json(VerifyResponse::from(outcome)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::face::stub::solid_png;
    use crate::routes::test_app::{self, Context};
    use crate::utils::multipart::test_body;
    use actix_web::{http::StatusCode, test};
    use serde_json::Value;

    const SKIN: [u8; 3] = [200, 150, 120];

    fn upload(uri: &str, token: &str, body: Vec<u8>) -> test::TestRequest {
        test_app::post(uri, token)
            .insert_header(("Content-Type", test_body::content_type()))
            .set_payload(body)
    }

    #[actix_web::test]
    async fn create_upload_and_verify() {
        let ctx = Context::new();
        let (instructor_id, token) = ctx.instructor("jdoe", "pa55word").await;
        let course_id = ctx
            .repo
            .insert_course("Databases", None, instructor_id)
            .await
            .unwrap();
        let app = test::init_service(ctx.app()).await;

        let req = test_app::post("/students", &token)
            .set_json(serde_json::json!({"firstName": "Ada", "lastName": "Lovelace"}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let body: Value = test::read_body_json(resp).await;
        let student_id = body["studentId"].as_u64().unwrap();
        ctx.repo.enroll(student_id, course_id).await.unwrap();

        let photo = solid_png(40, 40, SKIN);
        let uri = format!("/students/{}/upload-photo", student_id);
        let req = upload(&uri, &token, test_body::file("file", "ada.png", &photo)).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let stored = ctx.repo.find_student(student_id).await.unwrap().unwrap();
        assert!(stored.profile_pic.is_some());
        assert!(stored.photo_updated_at.is_some());

        let uri = format!("/students/{}/verify-face", student_id);
        let req = upload(&uri, &token, test_body::file("file", "probe.png", &photo)).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["verified"], true);
        assert_eq!(body["distance"], 0.0);
        assert!(ctx.repo.attendance().is_empty());

        let uri = format!("/students/{}/verify-and-attend/{}", student_id, course_id);
        let req = upload(&uri, &token, test_body::file("file", "probe.png", &photo)).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["status"], "recorded");
        assert_eq!(ctx.repo.attendance().len(), 1);
    }

    #[actix_web::test]
    async fn upload_rejects_bad_input() {
        let ctx = Context::new();
        let (_, token) = ctx.instructor("jdoe", "pa55word").await;
        let student_id = ctx.repo.insert_student("Ada", "Lovelace").await.unwrap();
        let max = ctx.config.max_image_bytes;
        let app = test::init_service(ctx.app()).await;
        let uri = format!("/students/{}/upload-photo", student_id);

        let req = upload(&uri, &token, test_body::file("file", "x.png", b"not an image"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let req = upload(&uri, &token, test_body::text("note", "no file here")).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let oversized = vec![0u8; max + 1];
        let req = upload(&uri, &token, test_body::file("file", "big.png", &oversized))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);

        let req = upload(
            "/students/9999/upload-photo",
            &token,
            test_body::file("file", "x.png", &solid_png(8, 8, SKIN)),
        )
        .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let stored = ctx.repo.find_student(student_id).await.unwrap().unwrap();
        assert!(stored.profile_pic.is_none());
    }

    #[actix_web::test]
    async fn verify_face_without_photo_is_400() {
        let ctx = Context::new();
        let (_, token) = ctx.instructor("jdoe", "pa55word").await;
        let student_id = ctx.repo.insert_student("Ada", "Lovelace").await.unwrap();
        let app = test::init_service(ctx.app()).await;

        let uri = format!("/students/{}/verify-face", student_id);
        let req = upload(&uri, &token, test_body::file("file", "p.png", &solid_png(8, 8, SKIN)))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(ctx.encoder.calls(), 0);
    }
}
