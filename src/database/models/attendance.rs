use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

text_enum!(AttendanceStatus {
    Present => "present",
    Absent => "absent",
    Late => "late",
});

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Attendance {
    pub id: Uuid,
    pub enrollment_id: Uuid,
    pub student_id: Uuid,
    pub course_id: Uuid,
    pub session_date: NaiveDate,
    pub status: AttendanceStatus,
    pub notes: Option<String>,
    pub marked_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Mark one student for one session. With `attendance_id` the existing record
/// is updated, otherwise a new one is inserted.
#[derive(Debug, Clone)]
pub struct MarkAttendance {
    pub attendance_id: Option<Uuid>,
    pub enrollment_id: Uuid,
    pub student_id: Uuid,
    pub course_id: Uuid,
    pub session_date: NaiveDate,
    pub status: AttendanceStatus,
    pub notes: Option<String>,
    pub marked_by: Uuid,
}
