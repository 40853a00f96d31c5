use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::CourseStatus;

text_enum!(EnrollmentStatus {
    Active => "active",
    Completed => "completed",
    Dropped => "dropped",
});

pub const COMPLETE_PROGRESS: i32 = 100;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Enrollment {
    pub id: Uuid,
    pub student_id: Uuid,
    pub course_id: Uuid,
    pub status: EnrollmentStatus,
    pub progress: i32,
    pub enrolled_at: DateTime<Utc>,
}

/// An enrollment joined with the course and student it links.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct EnrollmentDetail {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub enrollment: Enrollment,
    pub course_title: String,
    pub course_status: CourseStatus,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub student_name: String,
    pub student_email: String,
}

#[derive(Debug, Clone, Default)]
pub struct EnrollmentFilter {
    pub student_id: Option<Uuid>,
    pub course_id: Option<Uuid>,
    pub status: Option<EnrollmentStatus>,
    pub progress: Option<i32>,
}

impl EnrollmentFilter {
    pub fn matches(&self, enrollment: &Enrollment) -> bool {
        self.student_id.map_or(true, |id| enrollment.student_id == id)
            && self.course_id.map_or(true, |id| enrollment.course_id == id)
            && self.status.map_or(true, |status| enrollment.status == status)
            && self.progress.map_or(true, |progress| enrollment.progress == progress)
    }
}

/// Whether an enrollment may exceed the course capacity. Students enrolling
/// themselves are held to it; admins are not.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapacityRule {
    Enforce,
    Ignore,
}
