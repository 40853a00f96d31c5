// handlers/admin/analytics.rs - GET /dashboard/admin/analytics

use axum::extract::State;
use serde::Serialize;

use crate::app::AppState;
use crate::database::models::{CompletionRate, CourseEnrollmentCount, DailySignups, DashboardStats, TopStudent};
use crate::middleware::{ApiResponse, ApiResult};

const TOP_STUDENTS: i64 = 10;

#[derive(Debug, Serialize)]
pub struct AnalyticsView {
    pub stats: DashboardStats,
    pub enrollments_per_course: Vec<CourseEnrollmentCount>,
    pub student_growth_over_time: Vec<DailySignups>,
    pub top_students: Vec<TopStudent>,
    pub completion_rates: Vec<CompletionRate>,
}

/// GET /dashboard/admin/analytics - summary stats and the four report tables
pub async fn analytics_get(State(state): State<AppState>) -> ApiResult<AnalyticsView> {
    let store = &state.learning;
    let (stats, enrollments_per_course, student_growth_over_time, top_students, completion_rates) = tokio::try_join!(
        store.dashboard_stats(),
        store.enrollments_per_course(),
        store.daily_signups(),
        store.top_students(TOP_STUDENTS),
        store.completion_rates(),
    )?;

    Ok(ApiResponse::success(AnalyticsView {
        stats,
        enrollments_per_course,
        student_growth_over_time,
        top_students,
        completion_rates,
    }))
}
