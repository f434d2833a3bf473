//! Persistence seam. Handlers and services only see [`Repository`].

#[cfg(test)]
pub mod memory;
pub mod mysql;

use async_trait::async_trait;
use chrono::NaiveDateTime;

use crate::error::Result;
use crate::model::{
    attendance::{AttendanceRecord, DayWindow, RecentAttendance},
    course::Course,
    instructor::{Instructor, NewInstructor},
    student::Student,
};

/// Result of an attendance insert guarded by the one-per-day rule.
#[derive(Debug, Clone, PartialEq)]
pub enum AttendanceWrite {
    Created(AttendanceRecord),
    /// A record for the same student, course and day already existed.
    Existing(AttendanceRecord),
}

#[async_trait]
pub trait Repository: Send + Sync {
    async fn find_instructor_by_username(&self, username: &str) -> Result<Option<Instructor>>;

    /// Fails with `AppError::Conflict` when the username is taken.
    async fn insert_instructor(&self, new: &NewInstructor) -> Result<u64>;

    async fn insert_student(&self, first_name: &str, last_name: &str) -> Result<u64>;

    async fn find_student(&self, id: u64) -> Result<Option<Student>>;

    /// Replaces the reference photo. Returns false if the student does not exist.
    async fn store_student_photo(&self, id: u64, png: Vec<u8>, at: NaiveDateTime) -> Result<bool>;

    async fn insert_course(
        &self,
        course_name: &str,
        semester: Option<&str>,
        instructor_id: u64,
    ) -> Result<u64>;

    async fn find_course(&self, id: u64) -> Result<Option<Course>>;

    async fn courses_for_instructor(&self, instructor_id: u64) -> Result<Vec<Course>>;

    /// Returns false if the enrollment already existed.
    async fn enroll(&self, student_id: u64, course_id: u64) -> Result<bool>;

    async fn is_enrolled(&self, student_id: u64, course_id: u64) -> Result<bool>;

    /// Atomically inserts a record unless one exists for the same student,
    /// course and `window`.
    async fn record_attendance(
        &self,
        student_id: u64,
        course_id: u64,
        recorded_at: NaiveDateTime,
        window: DayWindow,
    ) -> Result<AttendanceWrite>;

    async fn count_enrolled_students(&self, course_ids: &[u64]) -> Result<i64>;

    async fn count_attendance(&self, course_ids: &[u64], window: DayWindow) -> Result<i64>;

    async fn recent_attendance(&self, course_ids: &[u64], limit: u32)
    -> Result<Vec<RecentAttendance>>;
}
