use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, FromRow)]
pub struct DashboardStats {
    pub total_students: i64,
    pub total_courses: i64,
    pub total_enrollments: i64,
    pub active_courses: i64,
    /// Mean engagement score of active students, rounded.
    pub avg_engagement: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct CourseEnrollmentCount {
    pub course_id: Uuid,
    pub course_title: String,
    pub enrollment_count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct DailySignups {
    pub date: NaiveDate,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct TopStudent {
    pub student_id: Uuid,
    pub student_name: String,
    pub student_email: String,
    pub engagement_score: i32,
    pub enrollments_count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct CompletionRate {
    pub course_id: Uuid,
    pub course_title: String,
    pub total_enrollments: i64,
    pub completed_count: i64,
    /// Percentage, one decimal place.
    pub completion_rate: f64,
}

/// Percentage of `part` in `whole`, rounded to one decimal; zero when empty.
pub fn percentage(part: i64, whole: i64) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    ((part as f64 * 1000.0) / whole as f64).round() / 10.0
}
