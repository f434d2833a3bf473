use std::sync::Arc;

use chrono::NaiveDateTime;
use tracing::{debug, info};

use crate::error::Result;
use crate::model::attendance::{AttendanceRecord, DayWindow};
use crate::repo::{AttendanceWrite, Repository};

#[derive(Debug, Clone, PartialEq)]
pub enum LedgerOutcome {
    Created(AttendanceRecord),
    /// Nothing was written; carries the first record of the day.
    AlreadyRecordedToday(AttendanceRecord),
}

impl LedgerOutcome {
    pub fn record(&self) -> &AttendanceRecord {
        match self {
            LedgerOutcome::Created(r) | LedgerOutcome::AlreadyRecordedToday(r) => r,
        }
    }
}

/// At most one attendance record per student, course and calendar day.
#[derive(Clone)]
pub struct AttendanceLedger {
    repo: Arc<dyn Repository>,
}

impl AttendanceLedger {
    pub fn new(repo: Arc<dyn Repository>) -> Self {
        Self { repo }
    }

    pub async fn record(
        &self,
        student_id: u64,
        course_id: u64,
        timestamp: NaiveDateTime,
    ) -> Result<LedgerOutcome> {
        let window = DayWindow::containing(timestamp);

        match self
            .repo
            .record_attendance(student_id, course_id, timestamp, window)
            .await?
        {
            AttendanceWrite::Created(record) => {
                info!(
                    student_id,
                    course_id,
                    attendance_id = record.id,
                    "Attendance recorded"
                );
                Ok(LedgerOutcome::Created(record))
            }
            AttendanceWrite::Existing(record) => {
                debug!(
                    student_id,
                    course_id,
                    attendance_id = record.id,
                    "Attendance already recorded today"
                );
                Ok(LedgerOutcome::AlreadyRecordedToday(record))
            }
        }
    }
}
