// handlers/instructor/performance.rs - Course performance and student list

use std::collections::{BTreeMap, HashMap, HashSet};

use axum::{extract::State, Extension};
use serde::Serialize;
use uuid::Uuid;

use super::{attendance::NO_COURSES, scoped_courses};
use crate::app::AppState;
use crate::database::models::{
    AttendanceStatus, Course, CourseStatus, EnrollmentDetail, EnrollmentFilter, EnrollmentStatus, Student,
};
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, Caller};

/// Rounded mean, 0 for an empty input.
fn rounded_mean(values: impl IntoIterator<Item = i64>) -> i64 {
    let (sum, count) = values.into_iter().fold((0i64, 0i64), |(s, c), v| (s + v, c + 1));
    if count == 0 {
        return 0;
    }
    (sum as f64 / count as f64).round() as i64
}

fn percent(part: i64, whole: i64) -> i64 {
    if whole <= 0 {
        return 0;
    }
    (part as f64 / whole as f64 * 100.0).round() as i64
}

async fn scoped_enrollments(
    state: &AppState,
    courses: &[Course],
    status: Option<EnrollmentStatus>,
) -> Result<Vec<EnrollmentDetail>, ApiError> {
    let ids: HashSet<Uuid> = courses.iter().map(|c| c.id).collect();
    let enrollments = state
        .learning
        .list_enrollments(EnrollmentFilter {
            status,
            ..Default::default()
        })
        .await?;
    Ok(enrollments
        .into_iter()
        .filter(|e| ids.contains(&e.enrollment.course_id))
        .collect())
}

#[derive(Debug, Default, PartialEq, Eq, Serialize)]
pub struct PerformanceStats {
    pub total_courses: usize,
    pub total_students: usize,
    pub total_enrollments: usize,
    pub avg_progress: i64,
    pub attendance_rate: i64,
}

#[derive(Debug, Serialize)]
pub struct CoursePerformance {
    pub course_id: Uuid,
    pub title: String,
    pub status: CourseStatus,
    pub current_enrolled: i32,
    pub capacity: i32,
    pub fill_rate: i64,
    pub avg_progress: i64,
}

#[derive(Debug, Serialize)]
pub struct PerformanceView {
    pub stats: PerformanceStats,
    pub courses: Vec<CoursePerformance>,
}

/// GET /dashboard/instructor/performance - progress, attendance and fill rates
pub async fn performance_get(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
) -> ApiResult<PerformanceView> {
    let courses = scoped_courses(&state, &caller).await?;
    let enrollments = scoped_enrollments(&state, &courses, None).await?;
    let course_ids: Vec<Uuid> = courses.iter().map(|c| c.id).collect();
    let records = if course_ids.is_empty() {
        Vec::new()
    } else {
        state.learning.course_attendance(&course_ids).await?
    };

    let present = records.iter().filter(|r| r.status == AttendanceStatus::Present).count();
    let stats = PerformanceStats {
        total_courses: courses.len(),
        total_students: enrollments
            .iter()
            .map(|e| e.enrollment.student_id)
            .collect::<HashSet<_>>()
            .len(),
        total_enrollments: enrollments.len(),
        avg_progress: rounded_mean(enrollments.iter().map(|e| i64::from(e.enrollment.progress))),
        attendance_rate: percent(present as i64, records.len() as i64),
    };

    let courses = courses
        .into_iter()
        .map(|course| {
            let avg_progress = rounded_mean(
                enrollments
                    .iter()
                    .filter(|e| e.enrollment.course_id == course.id && e.enrollment.status == EnrollmentStatus::Active)
                    .map(|e| i64::from(e.enrollment.progress)),
            );
            CoursePerformance {
                course_id: course.id,
                fill_rate: percent(i64::from(course.current_enrolled), i64::from(course.capacity)),
                status: course.status,
                current_enrolled: course.current_enrolled,
                capacity: course.capacity,
                avg_progress,
                title: course.title,
            }
        })
        .collect();

    Ok(ApiResponse::success(PerformanceView { stats, courses }))
}

#[derive(Debug, Serialize)]
pub struct InstructorStudent {
    #[serde(flatten)]
    pub student: Student,
    pub enrollments_count: usize,
    pub courses: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct StudentsView {
    pub students: Vec<InstructorStudent>,
    pub active_enrollments: usize,
    pub avg_engagement: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'static str>,
}

/// GET /dashboard/instructor/students - students with active enrollments in the caller's courses
pub async fn students_get(State(state): State<AppState>, Extension(caller): Extension<Caller>) -> ApiResult<StudentsView> {
    let courses = scoped_courses(&state, &caller).await?;
    if courses.is_empty() {
        return Ok(ApiResponse::success(StudentsView {
            students: Vec::new(),
            active_enrollments: 0,
            avg_engagement: 0,
            message: Some(NO_COURSES),
        }));
    }

    let enrollments = scoped_enrollments(&state, &courses, Some(EnrollmentStatus::Active)).await?;
    let titles: HashMap<Uuid, &str> = courses.iter().map(|c| (c.id, c.title.as_str())).collect();
    let mut by_student: BTreeMap<Uuid, Vec<String>> = BTreeMap::new();
    for e in &enrollments {
        let title = titles.get(&e.enrollment.course_id).copied().unwrap_or("Unknown");
        by_student.entry(e.enrollment.student_id).or_default().push(title.to_string());
    }

    let students: Vec<InstructorStudent> = state
        .learning
        .list_students(None)
        .await?
        .into_iter()
        .filter_map(|student| {
            let courses = by_student.remove(&student.id)?;
            Some(InstructorStudent {
                enrollments_count: courses.len(),
                courses,
                student,
            })
        })
        .collect();

    Ok(ApiResponse::success(StudentsView {
        avg_engagement: rounded_mean(students.iter().map(|s| i64::from(s.student.engagement_score))),
        active_enrollments: enrollments.len(),
        students,
        message: None,
    }))
}
