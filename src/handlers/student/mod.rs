// handlers/student/mod.rs - Student area (/dashboard/student/*)
//
// Everything here is scoped to the caller's own student record. Admins may
// enter the area; without a student record they simply have no enrollments.

use std::collections::HashSet;

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Extension, Router,
};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::app::AppState;
use crate::database::models::{
    CapacityRule, Course, CourseFilter, CourseOrder, CourseStatus, Enrollment, EnrollmentDetail, EnrollmentFilter,
    EnrollmentStatus, Student, COMPLETE_PROGRESS,
};
use crate::middleware::{ApiResponse, ApiResult, Caller};
use crate::store::StoreError;

pub mod progress;

pub const ENROLLED: &str = "Successfully enrolled!";

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/dashboard/student", get(overview_get))
        .route("/dashboard/student/courses", get(courses_get))
        .route("/dashboard/student/certificates", get(certificates_get))
        .route("/dashboard/student/progress", get(progress::progress_get))
        .route("/dashboard/student/schedule", get(progress::schedule_get))
        .route("/dashboard/student/browse", get(browse_get))
        .route("/dashboard/student/browse/:course_id/enroll", post(enroll_post))
}

async fn own_enrollments(state: &AppState, student_id: Uuid, filter: EnrollmentFilter) -> ApiResult<Vec<EnrollmentDetail>> {
    let enrollments = state
        .learning
        .list_enrollments(EnrollmentFilter {
            student_id: Some(student_id),
            ..filter
        })
        .await?;
    Ok(ApiResponse::success(enrollments))
}

#[derive(Debug, Serialize)]
pub struct StudentOverview {
    pub student: Option<Student>,
    pub active_enrollments: Vec<EnrollmentDetail>,
    pub completed_count: usize,
}

/// GET /dashboard/student - own record, active enrollments and completed count
pub async fn overview_get(State(state): State<AppState>, Extension(caller): Extension<Caller>) -> ApiResult<StudentOverview> {
    let student_id = caller.require_identity()?.user_id;

    let student = match state.learning.get_student(student_id).await {
        Ok(student) => Some(student),
        Err(StoreError::NotFound(_)) => None,
        Err(e) => return Err(e.into()),
    };

    let enrollments = state
        .learning
        .list_enrollments(EnrollmentFilter {
            student_id: Some(student_id),
            ..Default::default()
        })
        .await?;
    let completed_count = enrollments
        .iter()
        .filter(|e| e.enrollment.status == EnrollmentStatus::Completed)
        .count();
    let active_enrollments = enrollments
        .into_iter()
        .filter(|e| e.enrollment.status == EnrollmentStatus::Active)
        .collect();

    Ok(ApiResponse::success(StudentOverview {
        student,
        active_enrollments,
        completed_count,
    }))
}

/// GET /dashboard/student/courses - active enrollments with course details
pub async fn courses_get(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
) -> ApiResult<Vec<EnrollmentDetail>> {
    let student_id = caller.require_identity()?.user_id;
    let filter = EnrollmentFilter {
        status: Some(EnrollmentStatus::Active),
        ..Default::default()
    };
    own_enrollments(&state, student_id, filter).await
}

/// GET /dashboard/student/certificates - enrollments at full progress
pub async fn certificates_get(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
) -> ApiResult<Vec<EnrollmentDetail>> {
    let student_id = caller.require_identity()?.user_id;
    let filter = EnrollmentFilter {
        progress: Some(COMPLETE_PROGRESS),
        ..Default::default()
    };
    own_enrollments(&state, student_id, filter).await
}

#[derive(Debug, Serialize)]
pub struct BrowseCourse {
    #[serde(flatten)]
    pub course: Course,
    pub enrolled: bool,
    pub seats_left: i32,
}

/// GET /dashboard/student/browse - active and upcoming courses, flagged when already enrolled
pub async fn browse_get(State(state): State<AppState>, Extension(caller): Extension<Caller>) -> ApiResult<Vec<BrowseCourse>> {
    let student_id = caller.require_identity()?.user_id;

    let courses = state
        .learning
        .list_courses(CourseFilter {
            statuses: vec![CourseStatus::Active, CourseStatus::Upcoming],
            order: CourseOrder::Newest,
            ..Default::default()
        })
        .await?;
    let enrolled: HashSet<Uuid> = state
        .learning
        .list_enrollments(EnrollmentFilter {
            student_id: Some(student_id),
            ..Default::default()
        })
        .await?
        .into_iter()
        .map(|e| e.enrollment.course_id)
        .collect();

    let courses = courses
        .into_iter()
        .map(|course| BrowseCourse {
            enrolled: enrolled.contains(&course.id),
            seats_left: course.seats_left(),
            course,
        })
        .collect();
    Ok(ApiResponse::success(courses))
}

#[derive(Debug, Serialize)]
pub struct EnrollResult {
    pub message: &'static str,
    pub enrollment: Enrollment,
}

/// POST /dashboard/student/browse/:course_id/enroll - self-enrollment, capacity enforced
pub async fn enroll_post(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(course_id): Path<Uuid>,
) -> ApiResult<EnrollResult> {
    let student_id = caller.require_identity()?.user_id;
    let enrollment = state
        .learning
        .enroll(student_id, course_id, CapacityRule::Enforce)
        .await?;
    info!("Student {} enrolled in course {}", student_id, course_id);
    Ok(ApiResponse::created(EnrollResult {
        message: ENROLLED,
        enrollment,
    }))
}
