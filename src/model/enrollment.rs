use serde::{Deserialize, Serialize};

/// Existence implies the student may be marked present in the course.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, sqlx::FromRow)]
pub struct Enrollment {
    pub student_id: u64,
    pub course_id: u64,
}
