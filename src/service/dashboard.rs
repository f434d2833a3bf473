use chrono::NaiveDateTime;
use serde::Serialize;
use utoipa::ToSchema;

use crate::error::Result;
use crate::model::attendance::DayWindow;
use crate::model::course::Course;
use crate::repo::Repository;

const RECENT_ACTIVITY_LIMIT: u32 = 5;

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RecentActivity {
    #[schema(example = "Ada Lovelace")]
    pub student_name: String,
    pub student_id: u64,
    #[schema(example = "Data Structures")]
    pub course_name: String,
    #[schema(example = "present")]
    pub status: String,
    #[schema(value_type = String, example = "2026-03-14T09:00:00")]
    pub date_time: NaiveDateTime,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSummary {
    pub total_students: i64,
    pub present_today: i64,
    pub absent_today: i64,
    #[schema(example = 83.33)]
    pub attendance_rate: f64,
    pub recent_activity: Vec<RecentActivity>,
}

/// Figures for the given courses; `now` selects the "today" window.
pub async fn summarize(
    repo: &dyn Repository,
    courses: &[Course],
    now: NaiveDateTime,
) -> Result<DashboardSummary> {
    let course_ids: Vec<u64> = courses.iter().map(|c| c.id).collect();

    let total_students = repo.count_enrolled_students(&course_ids).await?;
    let present_today = repo
        .count_attendance(&course_ids, DayWindow::containing(now))
        .await?;

    let recent_activity = repo
        .recent_attendance(&course_ids, RECENT_ACTIVITY_LIMIT)
        .await?
        .into_iter()
        .map(|row| RecentActivity {
            student_name: match (row.first_name, row.last_name) {
                (Some(first), Some(last)) => format!("{} {}", first, last),
                _ => "Unknown".to_string(),
            },
            student_id: row.student_id,
            course_name: row.course_name.unwrap_or_else(|| "Unknown".to_string()),
            status: "present".to_string(),
            date_time: row.recorded_at,
        })
        .collect();

    Ok(DashboardSummary {
        total_students,
        present_today,
        absent_today: (total_students - present_today).max(0),
        attendance_rate: attendance_rate(present_today, total_students),
        recent_activity,
    })
}

fn attendance_rate(present: i64, total: i64) -> f64 {
    if total <= 0 {
        return 0.0;
    }
    let rate = present as f64 / total as f64 * 100.0;
    (rate * 100.0).round() / 100.0
}
