// handlers/instructor/mod.rs - Instructor area (/dashboard/instructor/*)
//
// Instructors see the courses assigned to them. Admins may enter the area
// too and see every course.

use std::collections::HashSet;

use axum::{extract::State, routing::get, Extension, Router};
use serde::Serialize;
use uuid::Uuid;

use crate::app::AppState;
use crate::database::models::{Course, CourseFilter, CourseOrder, EnrollmentFilter, EnrollmentStatus};
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, Caller};
use crate::policy::Role;
use crate::store::StoreResult;

pub mod attendance;
pub mod performance;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/dashboard/instructor", get(home_get))
        .route("/dashboard/instructor/courses", get(courses_get))
        .route(
            "/dashboard/instructor/attendance",
            get(attendance::roster_get).post(attendance::mark_post),
        )
        .route("/dashboard/instructor/performance", get(performance::performance_get))
        .route("/dashboard/instructor/students", get(performance::students_get))
}

/// Instructor whose courses the caller sees; `None` for admins, who see all.
fn course_scope(caller: &Caller) -> Result<Option<Uuid>, ApiError> {
    let identity = caller.require_identity()?;
    Ok(match caller.role() {
        Some(Role::Admin) => None,
        _ => Some(identity.user_id),
    })
}

pub(crate) async fn scoped_courses(state: &AppState, caller: &Caller) -> Result<Vec<Course>, ApiError> {
    let filter = CourseFilter {
        instructor_id: course_scope(caller)?,
        order: CourseOrder::Title,
        ..Default::default()
    };
    Ok(state.learning.list_courses(filter).await?)
}

async fn active_enrollment_count(state: &AppState, courses: &[Course]) -> StoreResult<usize> {
    let ids: HashSet<Uuid> = courses.iter().map(|c| c.id).collect();
    let active = state
        .learning
        .list_enrollments(EnrollmentFilter {
            status: Some(EnrollmentStatus::Active),
            ..Default::default()
        })
        .await?;
    Ok(active.iter().filter(|e| ids.contains(&e.enrollment.course_id)).count())
}

#[derive(Debug, Serialize)]
pub struct InstructorHome {
    pub courses: Vec<Course>,
    pub total_courses: usize,
    pub active_students: usize,
}

/// GET /dashboard/instructor - assigned courses and active enrollment count
pub async fn home_get(State(state): State<AppState>, Extension(caller): Extension<Caller>) -> ApiResult<InstructorHome> {
    let courses = scoped_courses(&state, &caller).await?;
    let active_students = active_enrollment_count(&state, &courses).await?;
    Ok(ApiResponse::success(InstructorHome {
        total_courses: courses.len(),
        active_students,
        courses,
    }))
}

/// GET /dashboard/instructor/courses
pub async fn courses_get(State(state): State<AppState>, Extension(caller): Extension<Caller>) -> ApiResult<Vec<Course>> {
    let courses = scoped_courses(&state, &caller).await?;
    Ok(ApiResponse::success(courses))
}
