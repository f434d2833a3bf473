use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct AttendanceRecord {
    pub id: u64,
    pub student_id: u64,
    pub course_id: u64,
    pub recorded_at: NaiveDateTime,
}

/// Row of the dashboard's recent-activity feed.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RecentAttendance {
    pub id: u64,
    pub student_id: u64,
    pub course_id: u64,
    pub recorded_at: NaiveDateTime,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub course_name: Option<String>,
}

/// Half-open calendar day `[midnight, next midnight)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayWindow {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl DayWindow {
    pub fn containing(timestamp: NaiveDateTime) -> Self {
        let start = timestamp.date().and_time(NaiveTime::MIN);
        Self {
            start,
            end: start + Duration::days(1),
        }
    }

    pub fn day(&self) -> NaiveDate {
        self.start.date()
    }

    #[cfg(test)]
    pub fn contains(&self, timestamp: NaiveDateTime) -> bool {
        self.start <= timestamp && timestamp < self.end
    }
}
