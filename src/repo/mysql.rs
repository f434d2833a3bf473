use async_trait::async_trait;
use chrono::NaiveDateTime;
use sqlx::MySqlPool;
use tracing::{debug, warn};

use super::{AttendanceWrite, Repository};
use crate::error::{AppError, Result};
use crate::model::{
    attendance::{AttendanceRecord, DayWindow, RecentAttendance},
    course::Course,
    enrollment::Enrollment,
    instructor::{Instructor, NewInstructor},
    student::Student,
};

pub struct MySqlRepository {
    pool: MySqlPool,
}

impl MySqlRepository {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    /// Row holding the `uq_attendance_day` slot.
    async fn find_for_day(
        &self,
        student_id: u64,
        course_id: u64,
        window: DayWindow,
    ) -> Result<Option<AttendanceRecord>> {
        let record = sqlx::query_as::<_, AttendanceRecord>(
            r#"
            SELECT id, student_id, course_id, recorded_at
            FROM attendance
            WHERE student_id = ? AND course_id = ? AND attendance_day = ?
            "#,
        )
        .bind(student_id)
        .bind(course_id)
        .bind(window.day())
        .fetch_optional(&self.pool)
        .await?;
        Ok(record)
    }
}

/// Inserts retried after a deadlock that left no committed row.
const INSERT_ATTEMPTS: u32 = 3;

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.is_unique_violation())
}

/// InnoDB deadlock victim (1213, SQLSTATE 40001).
fn is_deadlock(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some("40001"))
}

/// `?, ?, ?` for an IN list.
fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

#[async_trait]
impl Repository for MySqlRepository {
    async fn find_instructor_by_username(&self, username: &str) -> Result<Option<Instructor>> {
        let instructor = sqlx::query_as::<_, Instructor>(
            r#"
            SELECT id, username, password, first_name, last_name
            FROM instructors
            WHERE username = ?
            "#,
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        Ok(instructor)
    }

    async fn insert_instructor(&self, new: &NewInstructor) -> Result<u64> {
        let result = sqlx::query(
            r#"
            INSERT INTO instructors (username, password, first_name, last_name)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(&new.username)
        .bind(&new.password_hash)
        .bind(&new.first_name)
        .bind(&new.last_name)
        .execute(&self.pool)
        .await;

        match result {
            Ok(done) => Ok(done.last_insert_id()),
            Err(e) if is_unique_violation(&e) => {
                Err(AppError::Conflict("Username already exists".to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn insert_student(&self, first_name: &str, last_name: &str) -> Result<u64> {
        let done = sqlx::query("INSERT INTO students (first_name, last_name) VALUES (?, ?)")
            .bind(first_name)
            .bind(last_name)
            .execute(&self.pool)
            .await?;
        Ok(done.last_insert_id())
    }

    async fn find_student(&self, id: u64) -> Result<Option<Student>> {
        let student = sqlx::query_as::<_, Student>(
            r#"
            SELECT id, first_name, last_name, profile_pic, photo_updated_at
            FROM students
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(student)
    }

    async fn store_student_photo(&self, id: u64, png: Vec<u8>, at: NaiveDateTime) -> Result<bool> {
        let mut tx = self.pool.begin().await?;
        let done = sqlx::query(
            "UPDATE students SET profile_pic = ?, photo_updated_at = ? WHERE id = ?",
        )
        .bind(png)
        .bind(at)
        .bind(id)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        Ok(done.rows_affected() > 0)
    }

    async fn insert_course(
        &self,
        course_name: &str,
        semester: Option<&str>,
        instructor_id: u64,
    ) -> Result<u64> {
        let done = sqlx::query(
            "INSERT INTO courses (course_name, semester, instructor_id) VALUES (?, ?, ?)",
        )
        .bind(course_name)
        .bind(semester)
        .bind(instructor_id)
        .execute(&self.pool)
        .await?;
        Ok(done.last_insert_id())
    }

    async fn find_course(&self, id: u64) -> Result<Option<Course>> {
        let course = sqlx::query_as::<_, Course>(
            "SELECT id, course_name, instructor_id, semester FROM courses WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(course)
    }

    async fn courses_for_instructor(&self, instructor_id: u64) -> Result<Vec<Course>> {
        let courses = sqlx::query_as::<_, Course>(
            r#"
            SELECT id, course_name, instructor_id, semester
            FROM courses
            WHERE instructor_id = ?
            ORDER BY id
            "#,
        )
        .bind(instructor_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(courses)
    }

    async fn enroll(&self, student_id: u64, course_id: u64) -> Result<bool> {
        let result = sqlx::query("INSERT INTO student_courses (student_id, course_id) VALUES (?, ?)")
            .bind(student_id)
            .bind(course_id)
            .execute(&self.pool)
            .await;

        match result {
            Ok(_) => Ok(true),
            Err(e) if is_unique_violation(&e) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn is_enrolled(&self, student_id: u64, course_id: u64) -> Result<bool> {
        let enrollment = sqlx::query_as::<_, Enrollment>(
            "SELECT student_id, course_id FROM student_courses WHERE student_id = ? AND course_id = ?",
        )
        .bind(student_id)
        .bind(course_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(enrollment.is_some())
    }

    async fn record_attendance(
        &self,
        student_id: u64,
        course_id: u64,
        recorded_at: NaiveDateTime,
        window: DayWindow,
    ) -> Result<AttendanceWrite> {
        // uq_attendance_day decides; no read before the insert
        for attempt in 1..=INSERT_ATTEMPTS {
            let inserted = sqlx::query(
                r#"
                INSERT INTO attendance (student_id, course_id, recorded_at, attendance_day)
                VALUES (?, ?, ?, ?)
                "#,
            )
            .bind(student_id)
            .bind(course_id)
            .bind(recorded_at)
            .bind(window.day())
            .execute(&self.pool)
            .await;

            match inserted {
                Ok(done) => {
                    return Ok(AttendanceWrite::Created(AttendanceRecord {
                        id: done.last_insert_id(),
                        student_id,
                        course_id,
                        recorded_at,
                    }));
                }
                Err(e) if is_unique_violation(&e) || is_deadlock(&e) => {
                    debug!(student_id, course_id, attempt, error = %e, "Attendance insert lost the race");
                    if let Some(record) = self.find_for_day(student_id, course_id, window).await? {
                        return Ok(AttendanceWrite::Existing(record));
                    }
                    // deadlock victim whose rival has not committed yet
                }
                Err(e) => return Err(e.into()),
            }
        }

        warn!(student_id, course_id, "Attendance insert kept conflicting without a visible row");
        Err(AppError::Internal(
            "attendance insert kept conflicting".to_string(),
        ))
    }

    async fn count_enrolled_students(&self, course_ids: &[u64]) -> Result<i64> {
        if course_ids.is_empty() {
            return Ok(0);
        }
        let sql = format!(
            "SELECT COUNT(DISTINCT student_id) FROM student_courses WHERE course_id IN ({})",
            placeholders(course_ids.len())
        );
        let mut query = sqlx::query_scalar::<_, i64>(&sql);
        for id in course_ids {
            query = query.bind(*id);
        }
        Ok(query.fetch_one(&self.pool).await?)
    }

    async fn count_attendance(&self, course_ids: &[u64], window: DayWindow) -> Result<i64> {
        if course_ids.is_empty() {
            return Ok(0);
        }
        let sql = format!(
            r#"
            SELECT COUNT(*) FROM attendance
            WHERE course_id IN ({})
            AND recorded_at >= ? AND recorded_at < ?
            "#,
            placeholders(course_ids.len())
        );
        let mut query = sqlx::query_scalar::<_, i64>(&sql);
        for id in course_ids {
            query = query.bind(*id);
        }
        Ok(query
            .bind(window.start)
            .bind(window.end)
            .fetch_one(&self.pool)
            .await?)
    }

    async fn recent_attendance(
        &self,
        course_ids: &[u64],
        limit: u32,
    ) -> Result<Vec<RecentAttendance>> {
        if course_ids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            r#"
            SELECT a.id, a.student_id, a.course_id, a.recorded_at,
                   s.first_name, s.last_name, c.course_name
            FROM attendance a
            LEFT JOIN students s ON s.id = a.student_id
            LEFT JOIN courses c ON c.id = a.course_id
            WHERE a.course_id IN ({})
            ORDER BY a.recorded_at DESC, a.id DESC
            LIMIT ?
            "#,
            placeholders(course_ids.len())
        );
        let mut query = sqlx::query_as::<_, RecentAttendance>(&sql);
        for id in course_ids {
            query = query.bind(*id);
        }
        Ok(query.bind(limit).fetch_all(&self.pool).await?)
    }
}
