// store/mod.rs - Persistence seams for profiles and learning records
//
// Handlers only see these traits. `postgres` is the durable backend; `memory`
// backs tests and local development.

use async_trait::async_trait;
use chrono::NaiveDate;
use thiserror::Error;
use uuid::Uuid;

use crate::database::models::{
    Account, Attendance, Brand, CapacityRule, CompletionRate, Course, CourseEnrollmentCount, CourseFilter,
    DailySignups, DashboardStats, Enrollment, EnrollmentDetail, EnrollmentFilter, MarkAttendance, NewAccount,
    NewCourse, Profile, Student, StudentUpdate, TopStudent,
};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

pub const ALREADY_ENROLLED: &str = "Already enrolled in this course";
pub const COURSE_FULL: &str = "Course is full";
pub const EMAIL_TAKEN: &str = "An account with this email already exists";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Accounts, profiles and the reference data around them.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Point lookup used by the access policy on every dashboard request.
    async fn get_profile(&self, user_id: Uuid) -> StoreResult<Option<Profile>>;
    async fn find_account(&self, email: &str) -> StoreResult<Option<Account>>;
    /// Write the account, its profile and its role record atomically.
    /// Fails with `Conflict` when the email is taken.
    async fn register_account(&self, account: NewAccount) -> StoreResult<Profile>;
    async fn get_brand(&self, brand_id: Uuid) -> StoreResult<Option<Brand>>;
    async fn list_brands(&self) -> StoreResult<Vec<Brand>>;
    async fn list_instructors(&self) -> StoreResult<Vec<Profile>>;

    async fn health_check(&self) -> StoreResult<()>;
    fn backend_name(&self) -> &'static str;
}

/// Students, courses, enrollments, attendance and the analytics over them.
#[async_trait]
pub trait LearningStore: Send + Sync {
    /// Live students, newest first. `search` matches name or email.
    async fn list_students(&self, search: Option<&str>) -> StoreResult<Vec<Student>>;
    async fn get_student(&self, student_id: Uuid) -> StoreResult<Student>;
    async fn update_student(&self, student_id: Uuid, update: StudentUpdate) -> StoreResult<Student>;
    async fn delete_student(&self, student_id: Uuid) -> StoreResult<()>;

    async fn list_courses(&self, filter: CourseFilter) -> StoreResult<Vec<Course>>;
    async fn get_course(&self, course_id: Uuid) -> StoreResult<Course>;
    async fn create_course(&self, course: NewCourse) -> StoreResult<Course>;
    async fn update_course(&self, course_id: Uuid, course: NewCourse) -> StoreResult<Course>;
    async fn delete_course(&self, course_id: Uuid) -> StoreResult<()>;

    /// Enrollments with course and student details, newest first.
    async fn list_enrollments(&self, filter: EnrollmentFilter) -> StoreResult<Vec<EnrollmentDetail>>;
    /// Insert an active enrollment at zero progress and bump the course's
    /// enrolled count. `Conflict` on a duplicate, or on a full course under
    /// `CapacityRule::Enforce`.
    async fn enroll(&self, student_id: Uuid, course_id: Uuid, capacity: CapacityRule) -> StoreResult<Enrollment>;

    async fn list_attendance(&self, course_id: Uuid, session_date: NaiveDate) -> StoreResult<Vec<Attendance>>;
    async fn mark_attendance(&self, mark: MarkAttendance) -> StoreResult<Attendance>;
    /// Every attendance record across `course_ids`, any session date.
    async fn course_attendance(&self, course_ids: &[Uuid]) -> StoreResult<Vec<Attendance>>;

    async fn dashboard_stats(&self) -> StoreResult<DashboardStats>;
    async fn enrollments_per_course(&self) -> StoreResult<Vec<CourseEnrollmentCount>>;
    async fn daily_signups(&self) -> StoreResult<Vec<DailySignups>>;
    async fn top_students(&self, limit: i64) -> StoreResult<Vec<TopStudent>>;
    async fn completion_rates(&self) -> StoreResult<Vec<CompletionRate>>;
}
