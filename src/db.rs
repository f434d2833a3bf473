use sqlx::MySqlPool;
use sqlx::mysql::MySqlPoolOptions;
use tracing::info;

pub async fn init_db(database_url: &str, max_connections: u32) -> Result<MySqlPool, sqlx::Error> {
    MySqlPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await
}

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS instructors (
        id BIGINT UNSIGNED AUTO_INCREMENT PRIMARY KEY,
        username VARCHAR(50) NOT NULL,
        password VARCHAR(255) NOT NULL,
        first_name VARCHAR(50) NOT NULL,
        last_name VARCHAR(50) NOT NULL,
        created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
        UNIQUE KEY uq_instructors_username (username)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS students (
        id BIGINT UNSIGNED AUTO_INCREMENT PRIMARY KEY,
        first_name VARCHAR(50) NOT NULL,
        last_name VARCHAR(50) NOT NULL,
        profile_pic LONGBLOB NULL,
        photo_updated_at DATETIME(6) NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS courses (
        id BIGINT UNSIGNED AUTO_INCREMENT PRIMARY KEY,
        course_name VARCHAR(100) NOT NULL,
        instructor_id BIGINT UNSIGNED NOT NULL,
        semester VARCHAR(20) NULL,
        CONSTRAINT fk_courses_instructor FOREIGN KEY (instructor_id)
            REFERENCES instructors (id) ON DELETE CASCADE
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS student_courses (
        student_id BIGINT UNSIGNED NOT NULL,
        course_id BIGINT UNSIGNED NOT NULL,
        PRIMARY KEY (student_id, course_id),
        CONSTRAINT fk_student_courses_student FOREIGN KEY (student_id)
            REFERENCES students (id) ON DELETE CASCADE,
        CONSTRAINT fk_student_courses_course FOREIGN KEY (course_id)
            REFERENCES courses (id) ON DELETE CASCADE
    )
    "#,
    // attendance_day backs the one-record-per-day rule at the storage layer
    r#"
    CREATE TABLE IF NOT EXISTS attendance (
        id BIGINT UNSIGNED AUTO_INCREMENT PRIMARY KEY,
        student_id BIGINT UNSIGNED NOT NULL,
        course_id BIGINT UNSIGNED NOT NULL,
        recorded_at DATETIME NOT NULL,
        attendance_day DATE NOT NULL,
        UNIQUE KEY uq_attendance_day (student_id, course_id, attendance_day),
        KEY idx_attendance_course_time (course_id, recorded_at),
        CONSTRAINT fk_attendance_student FOREIGN KEY (student_id)
            REFERENCES students (id) ON DELETE CASCADE,
        CONSTRAINT fk_attendance_course FOREIGN KEY (course_id)
            REFERENCES courses (id) ON DELETE CASCADE
    )
    "#,
];

/// Creates missing tables.
pub async fn init_schema(pool: &MySqlPool) -> Result<(), sqlx::Error> {
    for statement in SCHEMA {
        sqlx::query(statement).execute(pool).await?;
    }
    info!(tables = SCHEMA.len(), "Database schema ready");
    Ok(())
}
