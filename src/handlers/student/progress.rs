// handlers/student/progress.rs - Learning progress and upcoming schedule

use axum::{extract::State, Extension};
use chrono::{NaiveDate, Utc};
use serde::Serialize;

use crate::app::AppState;
use crate::database::models::{EnrollmentDetail, EnrollmentFilter, EnrollmentStatus, COMPLETE_PROGRESS};
use crate::middleware::{ApiResponse, ApiResult, Caller};
use crate::store::StoreError;

#[derive(Debug, Serialize)]
pub struct ProgressView {
    pub engagement_score: i32,
    pub avg_progress: i64,
    pub completed_count: usize,
    pub enrollments: Vec<EnrollmentDetail>,
}

/// GET /dashboard/student/progress - every own enrollment with averages
pub async fn progress_get(State(state): State<AppState>, Extension(caller): Extension<Caller>) -> ApiResult<ProgressView> {
    let student_id = caller.require_identity()?.user_id;

    let engagement_score = match state.learning.get_student(student_id).await {
        Ok(student) => student.engagement_score,
        Err(StoreError::NotFound(_)) => 0,
        Err(e) => return Err(e.into()),
    };
    let enrollments = state
        .learning
        .list_enrollments(EnrollmentFilter {
            student_id: Some(student_id),
            ..Default::default()
        })
        .await?;

    let avg_progress = if enrollments.is_empty() {
        0
    } else {
        let total: i64 = enrollments.iter().map(|e| i64::from(e.enrollment.progress)).sum();
        (total as f64 / enrollments.len() as f64).round() as i64
    };
    let completed_count = enrollments
        .iter()
        .filter(|e| e.enrollment.progress == COMPLETE_PROGRESS)
        .count();

    Ok(ApiResponse::success(ProgressView {
        engagement_score,
        avg_progress,
        completed_count,
        enrollments,
    }))
}

#[derive(Debug, Serialize)]
pub struct ScheduleDay {
    pub date: NaiveDate,
    pub courses: Vec<EnrollmentDetail>,
}

/// Group enrollments that have not ended by `today` under their start date, earliest first.
pub fn upcoming_days(enrollments: Vec<EnrollmentDetail>, today: NaiveDate) -> Vec<ScheduleDay> {
    let mut upcoming: Vec<EnrollmentDetail> = enrollments.into_iter().filter(|e| e.end_date >= today).collect();
    upcoming.sort_by_key(|e| e.start_date);

    let mut days: Vec<ScheduleDay> = Vec::new();
    for enrollment in upcoming {
        match days.last_mut() {
            Some(day) if day.date == enrollment.start_date => day.courses.push(enrollment),
            _ => days.push(ScheduleDay {
                date: enrollment.start_date,
                courses: vec![enrollment],
            }),
        }
    }
    days
}

/// GET /dashboard/student/schedule - active courses that have not ended, by start date
pub async fn schedule_get(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
) -> ApiResult<Vec<ScheduleDay>> {
    let student_id = caller.require_identity()?.user_id;
    let enrollments = state
        .learning
        .list_enrollments(EnrollmentFilter {
            student_id: Some(student_id),
            status: Some(EnrollmentStatus::Active),
            ..Default::default()
        })
        .await?;
    Ok(ApiResponse::success(upcoming_days(enrollments, Utc::now().date_naive())))
}
