use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::AppError;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    #[schema(example = 1)]
    pub id: u64,
    #[schema(example = "Data Structures")]
    pub course_name: String,
    #[schema(example = 3)]
    pub instructor_id: u64,
    #[schema(example = "Fall 2026", nullable = true)]
    pub semester: Option<String>,
}

impl Course {
    /// Forbidden unless `instructor_id` teaches this course.
    pub fn ensure_owned_by(&self, instructor_id: u64) -> Result<(), AppError> {
        if self.instructor_id == instructor_id {
            Ok(())
        } else {
            Err(AppError::Forbidden(
                "You are not the instructor of this course".to_string(),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_the_owner_passes() {
        let course = Course {
            id: 1,
            course_name: "Compilers".to_string(),
            instructor_id: 7,
            semester: None,
        };

        assert!(course.ensure_owned_by(7).is_ok());
        assert!(matches!(course.ensure_owned_by(8), Err(AppError::Forbidden(_))));
    }
}
