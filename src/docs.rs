use crate::api::attendance::{VerifyAttendanceReq, VerifyResponse};
use crate::api::course::{CreateCourse, EnrollStudent};
use crate::api::student::CreateStudent;
use crate::auth::credentials::Session;
use crate::face::MatchResult;
use crate::model::course::Course;
use crate::models::{LoginReqDto, RegisterReq};
use crate::service::dashboard::{DashboardSummary, RecentActivity};
use utoipa::Modify;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{OpenApi, openapi};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Student Attendance API",
        version = "1.0.0",
        description = r#"
## Student Attendance

Instructors manage courses and enrollments and mark students present by
face verification.

### Key Features
- **Face verification**
  - A probe photo is compared with the student's stored reference photo
- **Attendance ledger**
  - At most one record per student, course and day; repeats report the first record
- **Dashboards**
  - Today's presence and the latest activity across an instructor's courses

### Security
All endpoints except `/login` and `/register` require a **JWT Bearer** token.
"#,
    ),
    paths(
        crate::auth::handlers::register,
        crate::auth::handlers::login,

        crate::api::attendance::verify_attendance,
        crate::api::attendance::instructor_dashboard,
        crate::api::attendance::course_dashboard,

        crate::api::student::create_student,
        crate::api::student::upload_photo,
        crate::api::student::verify_face,
        crate::api::student::verify_and_attend,

        crate::api::course::create_course,
        crate::api::course::enroll_student
    ),
    components(
        schemas(
            RegisterReq,
            LoginReqDto,
            Session,
            VerifyAttendanceReq,
            VerifyResponse,
            MatchResult,
            DashboardSummary,
            RecentActivity,
            CreateStudent,
            CreateCourse,
            EnrollStudent,
            Course
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Auth", description = "Instructor registration and login"),
        (name = "Attendance", description = "Face-verified attendance and dashboards"),
        (name = "Student", description = "Students and reference photos"),
        (name = "Course", description = "Courses and enrollments"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_routes_and_bearer_scheme() {
        let doc = ApiDoc::openapi();

        assert!(doc.paths.paths.contains_key("/attendance/verify"));
        assert!(doc.paths.paths.contains_key("/students/{id}/upload-photo"));
        let components = doc.components.expect("components");
        assert!(components.security_schemes.contains_key("bearer_auth"));
    }
}
