use crate::auth::auth::AuthUser;
use crate::error::AppError;
use crate::model::course::Course;
use crate::repo::Repository;
use actix_web::{HttpResponse, web};
use serde::Deserialize;
use serde_json::json;
use tracing::info;
use utoipa::ToSchema;

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateCourse {
    #[schema(example = "Data Structures")]
    pub course_name: String,
    #[schema(example = "Fall 2026")]
    pub semester: Option<String>,
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EnrollStudent {
    #[schema(example = 12)]
    pub student_id: u64,
}

/// Create a course owned by the caller
#[utoipa::path(
    post,
    path = "/courses",
    request_body = CreateCourse,
    responses(
        (status = 201, description = "Course created", body = Course),
        (status = 400, description = "Missing course name"),
        (status = 401, description = "Unauthorized"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Course"
)]
pub async fn create_course(
    auth: AuthUser,
    body: web::Json<CreateCourse>,
    repo: web::Data<dyn Repository>,
) -> Result<HttpResponse, AppError> {
    let course_name = body.course_name.trim();
    if course_name.is_empty() {
        return Err(AppError::Validation("Course name must not be empty".to_string()));
    }
    let semester = body
        .semester
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty());

    let id = repo
        .insert_course(course_name, semester, auth.instructor_id)
        .await?;
    info!(course_id = id, instructor_id = auth.instructor_id, "Course created");

    Ok(HttpResponse::Created().json(Course {
        id,
        course_name: course_name.to_string(),
        instructor_id: auth.instructor_id,
        semester: semester.map(str::to_string),
    }))
}

/// Enroll a student in a course
#[utoipa::path(
    post,
    path = "/courses/{id}/enrollments",
    params(
        ("id", Path, description = "Course ID")
    ),
    request_body = EnrollStudent,
    responses(
        (status = 201, description = "Student enrolled", body = Object, example = json!({
            "message": "Student enrolled successfully"
        })),
        (status = 200, description = "Student already enrolled", body = Object, example = json!({
            "message": "Student already enrolled"
        })),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Course owned by another instructor"),
        (status = 404, description = "Course or student not found"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Course"
)]
pub async fn enroll_student(
    auth: AuthUser,
    path: web::Path<u64>,
    body: web::Json<EnrollStudent>,
    repo: web::Data<dyn Repository>,
) -> Result<HttpResponse, AppError> {
    let course = repo
        .find_course(path.into_inner())
        .await?
        .ok_or_else(|| AppError::NotFound("Course not found".to_string()))?;
    auth.require_course_owner(&course)?;

    let student = repo
        .find_student(body.student_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Student not found".to_string()))?;

    if repo.enroll(student.id, course.id).await? {
        info!(student_id = student.id, course_id = course.id, "Student enrolled");
        Ok(HttpResponse::Created().json(json!({
            "message": "Student enrolled successfully"
        })))
    } else {
        Ok(HttpResponse::Ok().json(json!({
            "message": "Student already enrolled"
        })))
    }
}
