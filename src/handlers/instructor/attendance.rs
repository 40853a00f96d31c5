// handlers/instructor/attendance.rs - Attendance roster and marking

use axum::{
    extract::{Query, State},
    Extension, Json,
};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::scoped_courses;
use crate::app::AppState;
use crate::database::models::{
    Attendance, AttendanceStatus, Course, EnrollmentDetail, EnrollmentFilter, EnrollmentStatus, MarkAttendance,
};
use crate::error::ApiError;
use crate::handlers::non_blank;
use crate::middleware::{ApiResponse, ApiResult, Caller};

pub const NO_COURSES: &str = "No courses assigned. Contact admin to get courses assigned.";
pub const UNMARKED: &str = "unmarked";

#[derive(Debug, Default, Deserialize)]
pub struct RosterQuery {
    pub course: Option<Uuid>,
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Serialize)]
pub struct RosterEntry {
    pub enrollment_id: Uuid,
    pub student_id: Uuid,
    pub student_name: String,
    pub student_email: String,
    pub attendance_id: Option<Uuid>,
    /// present, absent, late, or unmarked
    pub status: &'static str,
    pub notes: Option<String>,
}

#[derive(Debug, Default, PartialEq, Eq, Serialize)]
pub struct RosterStats {
    pub total: usize,
    pub present: usize,
    pub absent: usize,
    pub late: usize,
    pub unmarked: usize,
}

#[derive(Debug, Serialize)]
pub struct RosterView {
    pub courses: Vec<Course>,
    pub selected_course: Option<Uuid>,
    pub session_date: NaiveDate,
    pub roster: Vec<RosterEntry>,
    pub stats: RosterStats,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'static str>,
}

/// Pair each active enrollment with its record for the day, if any.
pub fn merge_roster(enrollments: Vec<EnrollmentDetail>, records: &[Attendance]) -> (Vec<RosterEntry>, RosterStats) {
    let mut stats = RosterStats::default();
    let roster: Vec<RosterEntry> = enrollments
        .into_iter()
        .map(|detail| {
            let record = records.iter().find(|r| r.enrollment_id == detail.enrollment.id);
            match record.map(|r| r.status) {
                Some(AttendanceStatus::Present) => stats.present += 1,
                Some(AttendanceStatus::Absent) => stats.absent += 1,
                Some(AttendanceStatus::Late) => stats.late += 1,
                None => stats.unmarked += 1,
            }
            RosterEntry {
                enrollment_id: detail.enrollment.id,
                student_id: detail.enrollment.student_id,
                student_name: detail.student_name,
                student_email: detail.student_email,
                attendance_id: record.map(|r| r.id),
                status: record.map_or(UNMARKED, |r| r.status.as_str()),
                notes: record.and_then(|r| r.notes.clone()),
            }
        })
        .collect();
    stats.total = roster.len();
    (roster, stats)
}

/// GET /dashboard/instructor/attendance?course=&date= - defaults to the first course by title and today
pub async fn roster_get(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Query(query): Query<RosterQuery>,
) -> ApiResult<RosterView> {
    let courses = scoped_courses(&state, &caller).await?;
    let session_date = query.date.unwrap_or_else(|| Utc::now().date_naive());

    let Some(first_id) = courses.first().map(|c| c.id) else {
        return Ok(ApiResponse::success(RosterView {
            courses,
            selected_course: None,
            session_date,
            roster: Vec::new(),
            stats: RosterStats::default(),
            message: Some(NO_COURSES),
        }));
    };

    let course_id = query.course.unwrap_or(first_id);
    if !courses.iter().any(|c| c.id == course_id) {
        return Err(ApiError::forbidden("You are not assigned to this course"));
    }

    let enrollments = state
        .learning
        .list_enrollments(EnrollmentFilter {
            course_id: Some(course_id),
            status: Some(EnrollmentStatus::Active),
            ..Default::default()
        })
        .await?;
    let records = state.learning.list_attendance(course_id, session_date).await?;
    let (roster, stats) = merge_roster(enrollments, &records);

    Ok(ApiResponse::success(RosterView {
        courses,
        selected_course: Some(course_id),
        session_date,
        roster,
        stats,
        message: None,
    }))
}

#[derive(Debug, Deserialize)]
pub struct MarkForm {
    pub attendance_id: Option<Uuid>,
    pub enrollment_id: Uuid,
    pub student_id: Uuid,
    pub course_id: Uuid,
    pub session_date: NaiveDate,
    pub status: AttendanceStatus,
    pub notes: Option<String>,
}

/// POST /dashboard/instructor/attendance - update when `attendance_id` is given, insert otherwise
pub async fn mark_post(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Json(form): Json<MarkForm>,
) -> ApiResult<Attendance> {
    let marked_by = caller.require_identity()?.user_id;
    let courses = scoped_courses(&state, &caller).await?;
    if !courses.iter().any(|c| c.id == form.course_id) {
        return Err(ApiError::forbidden("You are not assigned to this course"));
    }

    let record = state
        .learning
        .mark_attendance(MarkAttendance {
            attendance_id: form.attendance_id,
            enrollment_id: form.enrollment_id,
            student_id: form.student_id,
            course_id: form.course_id,
            session_date: form.session_date,
            status: form.status,
            notes: non_blank(form.notes),
            marked_by,
        })
        .await?;
    tracing::info!(
        "Attendance {} marked {} for student {} on {}",
        record.id,
        record.status,
        record.student_id,
        record.session_date
    );
    Ok(ApiResponse::success(record))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::{CourseStatus, Enrollment};

    fn detail(student: &str) -> EnrollmentDetail {
        let now = Utc::now();
        EnrollmentDetail {
            enrollment: Enrollment {
                id: Uuid::new_v4(),
                student_id: Uuid::new_v4(),
                course_id: Uuid::nil(),
                status: EnrollmentStatus::Active,
                progress: 0,
                enrolled_at: now,
            },
            course_title: "Brand Strategy".into(),
            course_status: CourseStatus::Active,
            start_date: now.date_naive(),
            end_date: now.date_naive(),
            student_name: student.into(),
            student_email: format!("{}@example.test", student),
        }
    }

    #[test]
    fn students_without_a_record_are_unmarked() {
        let ada = detail("ada");
        let bo = detail("bo");
        let now = Utc::now();
        let record = Attendance {
            id: Uuid::new_v4(),
            enrollment_id: ada.enrollment.id,
            student_id: ada.enrollment.student_id,
            course_id: Uuid::nil(),
            session_date: now.date_naive(),
            status: AttendanceStatus::Late,
            notes: Some("traffic".into()),
            marked_by: None,
            created_at: now,
            updated_at: now,
        };

        let (roster, stats) = merge_roster(vec![ada, bo], &[record]);
        assert_eq!(roster[0].status, "late");
        assert_eq!(roster[0].notes.as_deref(), Some("traffic"));
        assert_eq!(roster[1].status, UNMARKED);
        assert_eq!(roster[1].attendance_id, None);
        assert_eq!(
            stats,
            RosterStats {
                total: 2,
                present: 0,
                absent: 0,
                late: 1,
                unmarked: 1
            }
        );
    }
}
