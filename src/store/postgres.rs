//! Postgres-backed implementation of the profile and learning stores.
//!
//! Multi-record writes (registration, student updates, enrollment) run in one
//! transaction; dropping an uncommitted `Transaction` rolls it back, so every
//! early `?` return leaves the database untouched.
//!
//! Constraint violations are translated rather than surfaced: unique
//! violations (`23505`) become `Conflict`, foreign-key violations (`23503`)
//! become `NotFound` for the referenced record.

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::{
    LearningStore, ProfileStore, StoreError, StoreResult, ALREADY_ENROLLED, COURSE_FULL, EMAIL_TAKEN,
};
use crate::database::models::{
    Account, Attendance, Brand, CapacityRule, CompletionRate, Course, CourseEnrollmentCount, CourseFilter,
    CourseOrder, DailySignups, DashboardStats, Enrollment, EnrollmentDetail, EnrollmentFilter, MarkAttendance,
    NewAccount, NewCourse, Profile, ProfileRow, Student, StudentUpdate, TopStudent,
};
use crate::policy::Role;

const PROFILE_COLUMNS: &str = "id, email, name, role, brand_id, created_at";
const STUDENT_COLUMNS: &str =
    "id, email, name, phone_number, city, state, brand_id, engagement_score, created_at, deleted_at";
const COURSE_COLUMNS: &str = "id, title, description, brand_id, instructor_id, start_date, end_date, \
     capacity, price, status, current_enrolled, created_at";
const ENROLLMENT_COLUMNS: &str = "id, student_id, course_id, status, progress, enrolled_at";
const ATTENDANCE_COLUMNS: &str =
    "id, enrollment_id, student_id, course_id, session_date, status, notes, marked_by, created_at, updated_at";

const ENROLLMENT_DETAIL_SELECT: &str = "SELECT e.id, e.student_id, e.course_id, e.status, e.progress, \
     e.enrolled_at, c.title AS course_title, c.status AS course_status, c.start_date, c.end_date, \
     s.name AS student_name, s.email AS student_email \
     FROM enrollments e \
     JOIN courses c ON c.id = e.course_id \
     JOIN students s ON s.id = e.student_id";

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn db_code(err: &sqlx::Error) -> Option<String> {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().map(|code| code.into_owned()),
        _ => None,
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    db_code(err).as_deref() == Some("23505")
}

fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    db_code(err).as_deref() == Some("23503")
}

fn unique_as_conflict(err: sqlx::Error, message: &str) -> StoreError {
    if is_unique_violation(&err) {
        return StoreError::Conflict(message.to_string());
    }
    StoreError::Database(err)
}

fn foreign_key_as_not_found(err: sqlx::Error, referenced: &str) -> StoreError {
    if is_foreign_key_violation(&err) {
        return StoreError::NotFound(referenced.to_string());
    }
    StoreError::Database(err)
}

#[async_trait]
impl ProfileStore for PgStore {
    async fn get_profile(&self, user_id: Uuid) -> StoreResult<Option<Profile>> {
        let row = sqlx::query_as::<_, ProfileRow>(&format!("SELECT {} FROM profiles WHERE id = $1", PROFILE_COLUMNS))
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Profile::from))
    }

    async fn find_account(&self, email: &str) -> StoreResult<Option<Account>> {
        let account = sqlx::query_as::<_, Account>("SELECT id, email, password_hash FROM accounts WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(account)
    }

    async fn register_account(&self, account: NewAccount) -> StoreResult<Profile> {
        let mut tx = self.pool.begin().await?;
        let id = Uuid::new_v4();

        sqlx::query("INSERT INTO accounts (id, email, password_hash) VALUES ($1, $2, $3)")
            .bind(id)
            .bind(&account.email)
            .bind(&account.password_hash)
            .execute(&mut *tx)
            .await
            .map_err(|e| unique_as_conflict(e, EMAIL_TAKEN))?;

        let profile = sqlx::query_as::<_, ProfileRow>(&format!(
            "INSERT INTO profiles (id, email, name, role, brand_id) VALUES ($1, $2, $3, $4, $5) RETURNING {}",
            PROFILE_COLUMNS
        ))
        .bind(id)
        .bind(&account.email)
        .bind(&account.name)
        .bind(account.role.as_str())
        .bind(account.brand_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| foreign_key_as_not_found(e, "brand"))?;

        match account.role {
            Role::Student => {
                sqlx::query(
                    "INSERT INTO students (id, email, name, phone_number, city, state, brand_id) \
                     VALUES ($1, $2, $3, $4, $5, $6, $7)",
                )
                .bind(id)
                .bind(&account.email)
                .bind(&account.name)
                .bind(&account.contact.phone_number)
                .bind(&account.contact.city)
                .bind(&account.contact.state)
                .bind(account.brand_id)
                .execute(&mut *tx)
                .await?;
            }
            Role::Instructor => {
                sqlx::query("INSERT INTO instructors (id, email, name) VALUES ($1, $2, $3)")
                    .bind(id)
                    .bind(&account.email)
                    .bind(&account.name)
                    .execute(&mut *tx)
                    .await?;
            }
            Role::Admin => {}
        }

        tx.commit().await?;
        Ok(profile.into())
    }

    async fn get_brand(&self, brand_id: Uuid) -> StoreResult<Option<Brand>> {
        let brand = sqlx::query_as::<_, Brand>("SELECT id, name, created_at FROM brands WHERE id = $1")
            .bind(brand_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(brand)
    }

    async fn list_brands(&self) -> StoreResult<Vec<Brand>> {
        let brands = sqlx::query_as::<_, Brand>("SELECT id, name, created_at FROM brands ORDER BY name")
            .fetch_all(&self.pool)
            .await?;
        Ok(brands)
    }

    async fn list_instructors(&self) -> StoreResult<Vec<Profile>> {
        let rows = sqlx::query_as::<_, ProfileRow>(&format!(
            "SELECT {} FROM profiles WHERE role = 'instructor' ORDER BY name",
            PROFILE_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Profile::from).collect())
    }

    async fn health_check(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "postgres"
    }
}

#[async_trait]
impl LearningStore for PgStore {
    async fn list_students(&self, search: Option<&str>) -> StoreResult<Vec<Student>> {
        let mut query = QueryBuilder::<Postgres>::new(format!(
            "SELECT {} FROM students WHERE deleted_at IS NULL",
            STUDENT_COLUMNS
        ));
        if let Some(search) = search {
            let pattern = format!("%{}%", search);
            query
                .push(" AND (name ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR email ILIKE ")
                .push_bind(pattern)
                .push(")");
        }
        query.push(" ORDER BY created_at DESC, name");

        let students = query.build_query_as::<Student>().fetch_all(&self.pool).await?;
        Ok(students)
    }

    async fn get_student(&self, student_id: Uuid) -> StoreResult<Student> {
        sqlx::query_as::<_, Student>(&format!(
            "SELECT {} FROM students WHERE id = $1 AND deleted_at IS NULL",
            STUDENT_COLUMNS
        ))
        .bind(student_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StoreError::NotFound("Student not found".into()))
    }

    async fn update_student(&self, student_id: Uuid, update: StudentUpdate) -> StoreResult<Student> {
        let mut tx = self.pool.begin().await?;

        let student = sqlx::query_as::<_, Student>(&format!(
            "UPDATE students SET name = $2, email = $3, phone_number = $4, city = $5, state = $6 \
             WHERE id = $1 AND deleted_at IS NULL RETURNING {}",
            STUDENT_COLUMNS
        ))
        .bind(student_id)
        .bind(&update.name)
        .bind(&update.email)
        .bind(&update.contact.phone_number)
        .bind(&update.contact.city)
        .bind(&update.contact.state)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| StoreError::NotFound("Student not found".into()))?;

        sqlx::query("UPDATE profiles SET name = $2, email = $3 WHERE id = $1")
            .bind(student_id)
            .bind(&update.name)
            .bind(&update.email)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(student)
    }

    async fn delete_student(&self, student_id: Uuid) -> StoreResult<()> {
        let result = sqlx::query("UPDATE students SET deleted_at = now() WHERE id = $1 AND deleted_at IS NULL")
            .bind(student_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound("Student not found".into()));
        }
        Ok(())
    }

    async fn list_courses(&self, filter: CourseFilter) -> StoreResult<Vec<Course>> {
        let mut query = QueryBuilder::<Postgres>::new(format!("SELECT {} FROM courses WHERE TRUE", COURSE_COLUMNS));
        if let Some(search) = filter.search {
            query.push(" AND title ILIKE ").push_bind(format!("%{}%", search));
        }
        if let Some(instructor_id) = filter.instructor_id {
            query.push(" AND instructor_id = ").push_bind(instructor_id);
        }
        if !filter.statuses.is_empty() {
            let statuses: Vec<String> = filter.statuses.iter().map(|s| s.as_str().to_string()).collect();
            query.push(" AND status = ANY(").push_bind(statuses).push(")");
        }
        query.push(match filter.order {
            CourseOrder::Newest => " ORDER BY created_at DESC, title",
            CourseOrder::Title => " ORDER BY title",
        });

        let courses = query.build_query_as::<Course>().fetch_all(&self.pool).await?;
        Ok(courses)
    }

    async fn get_course(&self, course_id: Uuid) -> StoreResult<Course> {
        sqlx::query_as::<_, Course>(&format!("SELECT {} FROM courses WHERE id = $1", COURSE_COLUMNS))
            .bind(course_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StoreError::NotFound("Course not found".into()))
    }

    async fn create_course(&self, course: NewCourse) -> StoreResult<Course> {
        let created = sqlx::query_as::<_, Course>(&format!(
            "INSERT INTO courses (id, title, description, brand_id, instructor_id, start_date, end_date, \
             capacity, price, status) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) RETURNING {}",
            COURSE_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(&course.title)
        .bind(&course.description)
        .bind(course.brand_id)
        .bind(course.instructor_id)
        .bind(course.start_date)
        .bind(course.end_date)
        .bind(course.capacity)
        .bind(course.price)
        .bind(course.status)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| foreign_key_as_not_found(e, "brand or instructor"))?;
        Ok(created)
    }

    async fn update_course(&self, course_id: Uuid, course: NewCourse) -> StoreResult<Course> {
        sqlx::query_as::<_, Course>(&format!(
            "UPDATE courses SET title = $2, description = $3, brand_id = $4, instructor_id = $5, \
             start_date = $6, end_date = $7, capacity = $8, price = $9, status = $10 \
             WHERE id = $1 RETURNING {}",
            COURSE_COLUMNS
        ))
        .bind(course_id)
        .bind(&course.title)
        .bind(&course.description)
        .bind(course.brand_id)
        .bind(course.instructor_id)
        .bind(course.start_date)
        .bind(course.end_date)
        .bind(course.capacity)
        .bind(course.price)
        .bind(course.status)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| foreign_key_as_not_found(e, "brand or instructor"))?
        .ok_or_else(|| StoreError::NotFound("Course not found".into()))
    }

    async fn delete_course(&self, course_id: Uuid) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM courses WHERE id = $1")
            .bind(course_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound("Course not found".into()));
        }
        Ok(())
    }

    async fn list_enrollments(&self, filter: EnrollmentFilter) -> StoreResult<Vec<EnrollmentDetail>> {
        let mut query = QueryBuilder::<Postgres>::new(ENROLLMENT_DETAIL_SELECT);
        query.push(" WHERE TRUE");
        if let Some(student_id) = filter.student_id {
            query.push(" AND e.student_id = ").push_bind(student_id);
        }
        if let Some(course_id) = filter.course_id {
            query.push(" AND e.course_id = ").push_bind(course_id);
        }
        if let Some(status) = filter.status {
            query.push(" AND e.status = ").push_bind(status);
        }
        if let Some(progress) = filter.progress {
            query.push(" AND e.progress = ").push_bind(progress);
        }
        query.push(" ORDER BY e.enrolled_at DESC");

        let details = query.build_query_as::<EnrollmentDetail>().fetch_all(&self.pool).await?;
        Ok(details)
    }

    async fn enroll(&self, student_id: Uuid, course_id: Uuid, capacity: CapacityRule) -> StoreResult<Enrollment> {
        let mut tx = self.pool.begin().await?;

        let student: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM students WHERE id = $1 AND deleted_at IS NULL")
            .bind(student_id)
            .fetch_optional(&mut *tx)
            .await?;
        if student.is_none() {
            return Err(StoreError::NotFound("Student not found".into()));
        }

        let existing: Option<(Uuid,)> =
            sqlx::query_as("SELECT id FROM enrollments WHERE student_id = $1 AND course_id = $2")
                .bind(student_id)
                .bind(course_id)
                .fetch_optional(&mut *tx)
                .await?;
        if existing.is_some() {
            return Err(StoreError::Conflict(ALREADY_ENROLLED.into()));
        }

        // Row lock keeps concurrent enrollments from overfilling the course.
        let (seats, enrolled): (i32, i32) =
            sqlx::query_as("SELECT capacity, current_enrolled FROM courses WHERE id = $1 FOR UPDATE")
                .bind(course_id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or_else(|| StoreError::NotFound("Course not found".into()))?;
        if capacity == CapacityRule::Enforce && enrolled >= seats {
            return Err(StoreError::Conflict(COURSE_FULL.into()));
        }

        let enrollment = sqlx::query_as::<_, Enrollment>(&format!(
            "INSERT INTO enrollments (id, student_id, course_id, status, progress) \
             VALUES ($1, $2, $3, 'active', 0) RETURNING {}",
            ENROLLMENT_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(student_id)
        .bind(course_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| unique_as_conflict(e, ALREADY_ENROLLED))?;

        sqlx::query("UPDATE courses SET current_enrolled = current_enrolled + 1 WHERE id = $1")
            .bind(course_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(enrollment)
    }

    async fn list_attendance(&self, course_id: Uuid, session_date: NaiveDate) -> StoreResult<Vec<Attendance>> {
        let records = sqlx::query_as::<_, Attendance>(&format!(
            "SELECT {} FROM attendance WHERE course_id = $1 AND session_date = $2 ORDER BY created_at",
            ATTENDANCE_COLUMNS
        ))
        .bind(course_id)
        .bind(session_date)
        .fetch_all(&self.pool)
        .await?;
        Ok(records)
    }

    async fn mark_attendance(&self, mark: MarkAttendance) -> StoreResult<Attendance> {
        if let Some(attendance_id) = mark.attendance_id {
            return sqlx::query_as::<_, Attendance>(&format!(
                "UPDATE attendance SET status = $2, notes = $3, marked_by = $4, updated_at = now() \
                 WHERE id = $1 AND course_id = $5 RETURNING {}",
                ATTENDANCE_COLUMNS
            ))
            .bind(attendance_id)
            .bind(mark.status)
            .bind(&mark.notes)
            .bind(mark.marked_by)
            .bind(mark.course_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("attendance record {}", attendance_id)));
        }

        let enrollment: Option<(Uuid,)> =
            sqlx::query_as("SELECT id FROM enrollments WHERE id = $1 AND student_id = $2 AND course_id = $3")
                .bind(mark.enrollment_id)
                .bind(mark.student_id)
                .bind(mark.course_id)
                .fetch_optional(&self.pool)
                .await?;
        if enrollment.is_none() {
            return Err(StoreError::NotFound("Enrollment not found".into()));
        }

        let record = sqlx::query_as::<_, Attendance>(&format!(
            "INSERT INTO attendance (id, enrollment_id, student_id, course_id, session_date, status, notes, marked_by) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             ON CONFLICT (enrollment_id, session_date) DO UPDATE \
             SET status = EXCLUDED.status, notes = EXCLUDED.notes, marked_by = EXCLUDED.marked_by, updated_at = now() \
             RETURNING {}",
            ATTENDANCE_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(mark.enrollment_id)
        .bind(mark.student_id)
        .bind(mark.course_id)
        .bind(mark.session_date)
        .bind(mark.status)
        .bind(&mark.notes)
        .bind(mark.marked_by)
        .fetch_one(&self.pool)
        .await?;
        Ok(record)
    }

    async fn course_attendance(&self, course_ids: &[Uuid]) -> StoreResult<Vec<Attendance>> {
        let records = sqlx::query_as::<_, Attendance>(&format!(
            "SELECT {} FROM attendance WHERE course_id = ANY($1) ORDER BY session_date, created_at",
            ATTENDANCE_COLUMNS
        ))
        .bind(course_ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(records)
    }

    async fn dashboard_stats(&self) -> StoreResult<DashboardStats> {
        let stats = sqlx::query_as::<_, DashboardStats>(
            "SELECT \
               (SELECT COUNT(*) FROM students WHERE deleted_at IS NULL) AS total_students, \
               (SELECT COUNT(*) FROM courses) AS total_courses, \
               (SELECT COUNT(*) FROM enrollments) AS total_enrollments, \
               (SELECT COUNT(*) FROM courses WHERE status = 'active') AS active_courses, \
               (SELECT COALESCE(ROUND(AVG(engagement_score)), 0)::BIGINT \
                  FROM students WHERE deleted_at IS NULL) AS avg_engagement",
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(stats)
    }

    async fn enrollments_per_course(&self) -> StoreResult<Vec<CourseEnrollmentCount>> {
        let counts = sqlx::query_as::<_, CourseEnrollmentCount>(
            "SELECT c.id AS course_id, c.title AS course_title, COUNT(e.id) AS enrollment_count \
             FROM courses c LEFT JOIN enrollments e ON e.course_id = c.id \
             GROUP BY c.id, c.title \
             ORDER BY enrollment_count DESC, c.title",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(counts)
    }

    async fn daily_signups(&self) -> StoreResult<Vec<DailySignups>> {
        let days = sqlx::query_as::<_, DailySignups>(
            "SELECT (created_at AT TIME ZONE 'UTC')::date AS date, COUNT(*) AS count \
             FROM students WHERE deleted_at IS NULL \
             GROUP BY 1 ORDER BY 1",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(days)
    }

    async fn top_students(&self, limit: i64) -> StoreResult<Vec<TopStudent>> {
        let students = sqlx::query_as::<_, TopStudent>(
            "SELECT s.id AS student_id, s.name AS student_name, s.email AS student_email, \
                    s.engagement_score, COUNT(e.id) AS enrollments_count \
             FROM students s LEFT JOIN enrollments e ON e.student_id = s.id \
             WHERE s.deleted_at IS NULL \
             GROUP BY s.id \
             ORDER BY s.engagement_score DESC, s.name \
             LIMIT $1",
        )
        .bind(limit.max(0))
        .fetch_all(&self.pool)
        .await?;
        Ok(students)
    }

    async fn completion_rates(&self) -> StoreResult<Vec<CompletionRate>> {
        let rates = sqlx::query_as::<_, CompletionRate>(
            "SELECT c.id AS course_id, c.title AS course_title, \
                    COUNT(e.id) AS total_enrollments, \
                    COUNT(e.id) FILTER (WHERE e.status = 'completed') AS completed_count, \
                    ROUND(100.0 * COUNT(e.id) FILTER (WHERE e.status = 'completed') / COUNT(e.id), 1)::FLOAT8 \
                      AS completion_rate \
             FROM courses c JOIN enrollments e ON e.course_id = c.id \
             GROUP BY c.id, c.title \
             ORDER BY completion_rate DESC, c.title",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::ContactDetails;
    use crate::database::DatabaseManager;

    async fn connect() -> Option<PgStore> {
        let url = std::env::var("DATABASE_URL").ok()?;
        let mut config = crate::config::AppConfig::in_memory().database;
        config.url = Some(url);
        let pool = DatabaseManager::connect(&config).await.ok()?;
        DatabaseManager::apply_schema(&pool).await.ok()?;
        Some(PgStore::new(pool))
    }

    #[test]
    fn constraint_codes_are_translated() {
        let err = foreign_key_as_not_found(sqlx::Error::RowNotFound, "brand");
        assert!(matches!(err, StoreError::Database(sqlx::Error::RowNotFound)));
        let err = unique_as_conflict(sqlx::Error::RowNotFound, "dup");
        assert!(matches!(err, StoreError::Database(_)));
    }

    #[tokio::test]
    #[ignore = "requires DATABASE_URL pointing at a scratch database"]
    async fn registration_with_unknown_brand_rolls_back() {
        let Some(store) = connect().await else {
            return;
        };
        let email = format!("rollback-{}@brandhub.test", Uuid::new_v4());
        let account = NewAccount {
            email: email.clone(),
            name: "Rollback".into(),
            password_hash: "hash".into(),
            role: Role::Student,
            brand_id: Some(Uuid::new_v4()),
            contact: ContactDetails::default(),
        };

        assert!(matches!(store.register_account(account).await, Err(StoreError::NotFound(_))));
        assert!(store.find_account(&email).await.unwrap().is_none());
    }
}
