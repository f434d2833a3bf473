//! In-process repository with the same uniqueness rules as the MySQL schema.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::NaiveDateTime;

use super::{AttendanceWrite, Repository};
use crate::error::{AppError, Result};
use crate::model::{
    attendance::{AttendanceRecord, DayWindow, RecentAttendance},
    course::Course,
    enrollment::Enrollment,
    instructor::{Instructor, NewInstructor},
    student::Student,
};

#[derive(Default)]
struct State {
    next_id: u64,
    instructors: Vec<Instructor>,
    students: BTreeMap<u64, Student>,
    courses: BTreeMap<u64, Course>,
    enrollments: BTreeSet<Enrollment>,
    attendance: Vec<AttendanceRecord>,
}

impl State {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

#[derive(Default)]
pub struct MemoryRepository {
    state: Mutex<State>,
}

impl MemoryRepository {
    fn state(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().expect("memory repository poisoned")
    }

    pub fn attendance(&self) -> Vec<AttendanceRecord> {
        self.state().attendance.clone()
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn find_instructor_by_username(&self, username: &str) -> Result<Option<Instructor>> {
        Ok(self
            .state()
            .instructors
            .iter()
            .find(|i| i.username == username)
            .cloned())
    }

    async fn insert_instructor(&self, new: &NewInstructor) -> Result<u64> {
        let mut state = self.state();
        if state.instructors.iter().any(|i| i.username == new.username) {
            return Err(AppError::Conflict("Username already exists".to_string()));
        }
        let id = state.next_id();
        state.instructors.push(Instructor {
            id,
            username: new.username.clone(),
            password: new.password_hash.clone(),
            first_name: new.first_name.clone(),
            last_name: new.last_name.clone(),
        });
        Ok(id)
    }

    async fn insert_student(&self, first_name: &str, last_name: &str) -> Result<u64> {
        let mut state = self.state();
        let id = state.next_id();
        state.students.insert(
            id,
            Student {
                id,
                first_name: first_name.to_string(),
                last_name: last_name.to_string(),
                profile_pic: None,
                photo_updated_at: None,
            },
        );
        Ok(id)
    }

    async fn find_student(&self, id: u64) -> Result<Option<Student>> {
        Ok(self.state().students.get(&id).cloned())
    }

    async fn store_student_photo(&self, id: u64, png: Vec<u8>, at: NaiveDateTime) -> Result<bool> {
        let mut state = self.state();
        match state.students.get_mut(&id) {
            Some(student) => {
                student.profile_pic = Some(png);
                student.photo_updated_at = Some(at);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn insert_course(
        &self,
        course_name: &str,
        semester: Option<&str>,
        instructor_id: u64,
    ) -> Result<u64> {
        let mut state = self.state();
        let id = state.next_id();
        state.courses.insert(
            id,
            Course {
                id,
                course_name: course_name.to_string(),
                instructor_id,
                semester: semester.map(str::to_string),
            },
        );
        Ok(id)
    }

    async fn find_course(&self, id: u64) -> Result<Option<Course>> {
        Ok(self.state().courses.get(&id).cloned())
    }

    async fn courses_for_instructor(&self, instructor_id: u64) -> Result<Vec<Course>> {
        Ok(self
            .state()
            .courses
            .values()
            .filter(|c| c.instructor_id == instructor_id)
            .cloned()
            .collect())
    }

    async fn enroll(&self, student_id: u64, course_id: u64) -> Result<bool> {
        Ok(self.state().enrollments.insert(Enrollment {
            student_id,
            course_id,
        }))
    }

    async fn is_enrolled(&self, student_id: u64, course_id: u64) -> Result<bool> {
        Ok(self.state().enrollments.contains(&Enrollment {
            student_id,
            course_id,
        }))
    }

    async fn record_attendance(
        &self,
        student_id: u64,
        course_id: u64,
        recorded_at: NaiveDateTime,
        window: DayWindow,
    ) -> Result<AttendanceWrite> {
        let mut state = self.state();
        let existing = state
            .attendance
            .iter()
            .filter(|r| {
                r.student_id == student_id
                    && r.course_id == course_id
                    && window.contains(r.recorded_at)
            })
            .min_by_key(|r| r.recorded_at)
            .cloned();
        if let Some(record) = existing {
            return Ok(AttendanceWrite::Existing(record));
        }

        let record = AttendanceRecord {
            id: state.next_id(),
            student_id,
            course_id,
            recorded_at,
        };
        state.attendance.push(record.clone());
        Ok(AttendanceWrite::Created(record))
    }

    async fn count_enrolled_students(&self, course_ids: &[u64]) -> Result<i64> {
        let students: BTreeSet<u64> = self
            .state()
            .enrollments
            .iter()
            .filter(|e| course_ids.contains(&e.course_id))
            .map(|e| e.student_id)
            .collect();
        Ok(students.len() as i64)
    }

    async fn count_attendance(&self, course_ids: &[u64], window: DayWindow) -> Result<i64> {
        Ok(self
            .state()
            .attendance
            .iter()
            .filter(|r| course_ids.contains(&r.course_id) && window.contains(r.recorded_at))
            .count() as i64)
    }

    async fn recent_attendance(
        &self,
        course_ids: &[u64],
        limit: u32,
    ) -> Result<Vec<RecentAttendance>> {
        let state = self.state();
        let mut records: Vec<&AttendanceRecord> = state
            .attendance
            .iter()
            .filter(|r| course_ids.contains(&r.course_id))
            .collect();
        records.sort_by(|a, b| (b.recorded_at, b.id).cmp(&(a.recorded_at, a.id)));

        Ok(records
            .into_iter()
            .take(limit as usize)
            .map(|r| {
                let student = state.students.get(&r.student_id);
                RecentAttendance {
                    id: r.id,
                    student_id: r.student_id,
                    course_id: r.course_id,
                    recorded_at: r.recorded_at,
                    first_name: student.map(|s| s.first_name.clone()),
                    last_name: student.map(|s| s.last_name.clone()),
                    course_name: state.courses.get(&r.course_id).map(|c| c.course_name.clone()),
                }
            })
            .collect())
    }
}
