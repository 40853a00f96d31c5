//! In-memory implementation of the profile and learning stores.
//!
//! All tables live in one `Tables` value behind a `tokio::sync::RwLock`.
//! Multi-record mutations run against a staged copy that replaces the live
//! tables only when every step succeeds, which gives them the same
//! all-or-nothing behavior as a Postgres transaction.
//!
//! Not durable: state is lost on restart.

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    LearningStore, ProfileStore, StoreError, StoreResult, ALREADY_ENROLLED, COURSE_FULL, EMAIL_TAKEN,
};
use crate::database::models::analytics::percentage;
use crate::database::models::{
    Account, Attendance, Brand, CapacityRule, CompletionRate, Course, CourseEnrollmentCount, CourseFilter,
    CourseOrder, CourseStatus, DailySignups, DashboardStats, Enrollment, EnrollmentDetail, EnrollmentFilter, EnrollmentStatus,
    Instructor, MarkAttendance, NewAccount, NewCourse, Profile, Student, StudentUpdate, TopStudent,
};
use crate::policy::Role;

#[derive(Debug, Clone, Default)]
struct Tables {
    accounts: HashMap<Uuid, Account>,
    profiles: HashMap<Uuid, Profile>,
    brands: HashMap<Uuid, Brand>,
    students: HashMap<Uuid, Student>,
    instructors: HashMap<Uuid, Instructor>,
    courses: HashMap<Uuid, Course>,
    enrollments: HashMap<Uuid, Enrollment>,
    attendance: HashMap<Uuid, Attendance>,
}

impl Tables {
    fn live_student(&self, id: Uuid) -> Option<&Student> {
        self.students.get(&id).filter(|s| s.deleted_at.is_none())
    }

    fn live_students(&self) -> impl Iterator<Item = &Student> {
        self.students.values().filter(|s| s.deleted_at.is_none())
    }

    fn check_brand(&self, brand_id: Option<Uuid>) -> StoreResult<()> {
        match brand_id {
            Some(id) if !self.brands.contains_key(&id) => Err(StoreError::NotFound(format!("brand {}", id))),
            _ => Ok(()),
        }
    }

    fn check_course_refs(&self, course: &NewCourse) -> StoreResult<()> {
        self.check_brand(course.brand_id)?;
        match course.instructor_id {
            Some(id) if !self.profiles.contains_key(&id) => Err(StoreError::NotFound(format!("instructor {}", id))),
            _ => Ok(()),
        }
    }

    fn detail(&self, enrollment: &Enrollment) -> Option<EnrollmentDetail> {
        let course = self.courses.get(&enrollment.course_id)?;
        let student = self.students.get(&enrollment.student_id)?;
        Some(EnrollmentDetail {
            enrollment: enrollment.clone(),
            course_title: course.title.clone(),
            course_status: course.status,
            start_date: course.start_date,
            end_date: course.end_date,
            student_name: student.name.clone(),
            student_email: student.email.clone(),
        })
    }

    fn enrollment_count(&self, course_id: Uuid) -> i64 {
        self.enrollments.values().filter(|e| e.course_id == course_id).count() as i64
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply `f` to a staged copy and keep it only on success.
    async fn transact<T>(&self, f: impl FnOnce(&mut Tables) -> StoreResult<T> + Send) -> StoreResult<T> {
        let mut live = self.tables.write().await;
        let mut staged = live.clone();
        let out = f(&mut staged)?;
        *live = staged;
        Ok(out)
    }

    pub async fn create_brand(&self, name: &str) -> StoreResult<Brand> {
        let mut tables = self.tables.write().await;
        if tables.brands.values().any(|b| b.name == name) {
            return Err(StoreError::Conflict(format!("brand '{}' exists", name)));
        }
        let brand = Brand {
            id: Uuid::new_v4(),
            name: name.to_string(),
            created_at: Utc::now(),
        };
        tables.brands.insert(brand.id, brand.clone());
        Ok(brand)
    }

    /// Overwrite a profile's role, including with no role at all.
    pub async fn set_role(&self, user_id: Uuid, role: Option<Role>) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        let profile = tables
            .profiles
            .get_mut(&user_id)
            .ok_or_else(|| StoreError::NotFound(format!("profile {}", user_id)))?;
        profile.role = role;
        Ok(())
    }

    pub async fn set_progress(&self, enrollment_id: Uuid, progress: i32, status: EnrollmentStatus) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        let enrollment = tables
            .enrollments
            .get_mut(&enrollment_id)
            .ok_or_else(|| StoreError::NotFound(format!("enrollment {}", enrollment_id)))?;
        enrollment.progress = progress.clamp(0, 100);
        enrollment.status = status;
        Ok(())
    }

    pub async fn set_engagement(&self, student_id: Uuid, score: i32) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        let student = tables
            .students
            .get_mut(&student_id)
            .ok_or_else(|| StoreError::NotFound(format!("student {}", student_id)))?;
        student.engagement_score = score;
        Ok(())
    }
}

#[async_trait]
impl ProfileStore for MemoryStore {
    async fn get_profile(&self, user_id: Uuid) -> StoreResult<Option<Profile>> {
        Ok(self.tables.read().await.profiles.get(&user_id).cloned())
    }

    async fn find_account(&self, email: &str) -> StoreResult<Option<Account>> {
        let tables = self.tables.read().await;
        Ok(tables.accounts.values().find(|a| a.email == email).cloned())
    }

    async fn register_account(&self, account: NewAccount) -> StoreResult<Profile> {
        self.transact(move |tables| {
            if tables.accounts.values().any(|a| a.email == account.email) {
                return Err(StoreError::Conflict(EMAIL_TAKEN.into()));
            }

            let id = Uuid::new_v4();
            let now = Utc::now();
            tables.accounts.insert(
                id,
                Account {
                    id,
                    email: account.email.clone(),
                    password_hash: account.password_hash,
                },
            );

            tables.check_brand(account.brand_id)?;
            let profile = Profile {
                id,
                email: account.email.clone(),
                name: account.name.clone(),
                role: Some(account.role),
                brand_id: account.brand_id,
                created_at: now,
            };
            tables.profiles.insert(id, profile.clone());

            match account.role {
                Role::Student => {
                    tables.students.insert(
                        id,
                        Student {
                            id,
                            email: account.email,
                            name: account.name,
                            phone_number: account.contact.phone_number,
                            city: account.contact.city,
                            state: account.contact.state,
                            brand_id: account.brand_id,
                            engagement_score: 0,
                            created_at: now,
                            deleted_at: None,
                        },
                    );
                }
                Role::Instructor => {
                    tables.instructors.insert(
                        id,
                        Instructor {
                            id,
                            email: account.email,
                            name: account.name,
                            created_at: now,
                        },
                    );
                }
                Role::Admin => {}
            }

            Ok(profile)
        })
        .await
    }

    async fn get_brand(&self, brand_id: Uuid) -> StoreResult<Option<Brand>> {
        Ok(self.tables.read().await.brands.get(&brand_id).cloned())
    }

    async fn list_brands(&self) -> StoreResult<Vec<Brand>> {
        let mut brands: Vec<Brand> = self.tables.read().await.brands.values().cloned().collect();
        brands.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(brands)
    }

    async fn list_instructors(&self) -> StoreResult<Vec<Profile>> {
        let tables = self.tables.read().await;
        let mut instructors: Vec<Profile> = tables
            .profiles
            .values()
            .filter(|p| p.role == Some(Role::Instructor))
            .cloned()
            .collect();
        instructors.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(instructors)
    }

    async fn health_check(&self) -> StoreResult<()> {
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[async_trait]
impl LearningStore for MemoryStore {
    async fn list_students(&self, search: Option<&str>) -> StoreResult<Vec<Student>> {
        let tables = self.tables.read().await;
        let needle = search.map(str::to_lowercase);
        let mut students: Vec<Student> = tables
            .live_students()
            .filter(|s| match needle.as_deref() {
                Some(n) => s.name.to_lowercase().contains(n) || s.email.to_lowercase().contains(n),
                None => true,
            })
            .cloned()
            .collect();
        students.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.name.cmp(&b.name)));
        Ok(students)
    }

    async fn get_student(&self, student_id: Uuid) -> StoreResult<Student> {
        let tables = self.tables.read().await;
        tables
            .live_student(student_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound("Student not found".into()))
    }

    async fn update_student(&self, student_id: Uuid, update: StudentUpdate) -> StoreResult<Student> {
        self.transact(move |tables| {
            if tables.live_student(student_id).is_none() {
                return Err(StoreError::NotFound("Student not found".into()));
            }
            let student = tables
                .students
                .get_mut(&student_id)
                .ok_or_else(|| StoreError::NotFound("Student not found".into()))?;
            student.name = update.name.clone();
            student.email = update.email.clone();
            student.phone_number = update.contact.phone_number;
            student.city = update.contact.city;
            student.state = update.contact.state;
            let student = student.clone();

            if let Some(profile) = tables.profiles.get_mut(&student_id) {
                profile.name = update.name;
                profile.email = update.email;
            }
            Ok(student)
        })
        .await
    }

    async fn delete_student(&self, student_id: Uuid) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        match tables.students.get_mut(&student_id) {
            Some(student) if student.deleted_at.is_none() => {
                student.deleted_at = Some(Utc::now());
                Ok(())
            }
            _ => Err(StoreError::NotFound("Student not found".into())),
        }
    }

    async fn list_courses(&self, filter: CourseFilter) -> StoreResult<Vec<Course>> {
        let tables = self.tables.read().await;
        let mut courses: Vec<Course> = tables.courses.values().filter(|c| filter.matches(c)).cloned().collect();
        match filter.order {
            CourseOrder::Newest => {
                courses.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.title.cmp(&b.title)))
            }
            CourseOrder::Title => courses.sort_by(|a, b| a.title.cmp(&b.title)),
        }
        Ok(courses)
    }

    async fn get_course(&self, course_id: Uuid) -> StoreResult<Course> {
        let tables = self.tables.read().await;
        tables
            .courses
            .get(&course_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound("Course not found".into()))
    }

    async fn create_course(&self, course: NewCourse) -> StoreResult<Course> {
        let mut tables = self.tables.write().await;
        tables.check_course_refs(&course)?;
        let created = Course {
            id: Uuid::new_v4(),
            title: course.title,
            description: course.description,
            brand_id: course.brand_id,
            instructor_id: course.instructor_id,
            start_date: course.start_date,
            end_date: course.end_date,
            capacity: course.capacity,
            price: course.price,
            status: course.status,
            current_enrolled: 0,
            created_at: Utc::now(),
        };
        tables.courses.insert(created.id, created.clone());
        Ok(created)
    }

    async fn update_course(&self, course_id: Uuid, course: NewCourse) -> StoreResult<Course> {
        let mut tables = self.tables.write().await;
        tables.check_course_refs(&course)?;
        let existing = tables
            .courses
            .get_mut(&course_id)
            .ok_or_else(|| StoreError::NotFound("Course not found".into()))?;
        existing.title = course.title;
        existing.description = course.description;
        existing.brand_id = course.brand_id;
        existing.instructor_id = course.instructor_id;
        existing.start_date = course.start_date;
        existing.end_date = course.end_date;
        existing.capacity = course.capacity;
        existing.price = course.price;
        existing.status = course.status;
        Ok(existing.clone())
    }

    async fn delete_course(&self, course_id: Uuid) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        if tables.courses.remove(&course_id).is_none() {
            return Err(StoreError::NotFound("Course not found".into()));
        }
        tables.enrollments.retain(|_, e| e.course_id != course_id);
        tables.attendance.retain(|_, a| a.course_id != course_id);
        Ok(())
    }

    async fn list_enrollments(&self, filter: EnrollmentFilter) -> StoreResult<Vec<EnrollmentDetail>> {
        let tables = self.tables.read().await;
        let mut details: Vec<EnrollmentDetail> = tables
            .enrollments
            .values()
            .filter(|e| filter.matches(e))
            .filter_map(|e| tables.detail(e))
            .collect();
        details.sort_by(|a, b| b.enrollment.enrolled_at.cmp(&a.enrollment.enrolled_at));
        Ok(details)
    }

    async fn enroll(&self, student_id: Uuid, course_id: Uuid, capacity: CapacityRule) -> StoreResult<Enrollment> {
        self.transact(move |tables| {
            if tables.live_student(student_id).is_none() {
                return Err(StoreError::NotFound("Student not found".into()));
            }
            if tables
                .enrollments
                .values()
                .any(|e| e.student_id == student_id && e.course_id == course_id)
            {
                return Err(StoreError::Conflict(ALREADY_ENROLLED.into()));
            }
            let course = tables
                .courses
                .get_mut(&course_id)
                .ok_or_else(|| StoreError::NotFound("Course not found".into()))?;
            if capacity == CapacityRule::Enforce && course.is_full() {
                return Err(StoreError::Conflict(COURSE_FULL.into()));
            }
            course.current_enrolled += 1;

            let enrollment = Enrollment {
                id: Uuid::new_v4(),
                student_id,
                course_id,
                status: EnrollmentStatus::Active,
                progress: 0,
                enrolled_at: Utc::now(),
            };
            tables.enrollments.insert(enrollment.id, enrollment.clone());
            Ok(enrollment)
        })
        .await
    }

    async fn list_attendance(&self, course_id: Uuid, session_date: NaiveDate) -> StoreResult<Vec<Attendance>> {
        let tables = self.tables.read().await;
        let mut records: Vec<Attendance> = tables
            .attendance
            .values()
            .filter(|a| a.course_id == course_id && a.session_date == session_date)
            .cloned()
            .collect();
        records.sort_by_key(|a| a.created_at);
        Ok(records)
    }

    async fn mark_attendance(&self, mark: MarkAttendance) -> StoreResult<Attendance> {
        let mut tables = self.tables.write().await;
        let now = Utc::now();

        let enrollment_matches = tables
            .enrollments
            .get(&mark.enrollment_id)
            .map_or(false, |e| e.student_id == mark.student_id && e.course_id == mark.course_id);

        let existing_id = match mark.attendance_id {
            Some(id) if tables.attendance.get(&id).map_or(false, |a| a.course_id == mark.course_id) => Some(id),
            Some(id) => return Err(StoreError::NotFound(format!("attendance record {}", id))),
            None if !enrollment_matches => return Err(StoreError::NotFound("Enrollment not found".into())),
            // One record per enrollment and session date.
            None => tables
                .attendance
                .values()
                .find(|a| a.enrollment_id == mark.enrollment_id && a.session_date == mark.session_date)
                .map(|a| a.id),
        };

        if let Some(id) = existing_id {
            let record = tables
                .attendance
                .get_mut(&id)
                .ok_or_else(|| StoreError::NotFound(format!("attendance record {}", id)))?;
            record.status = mark.status;
            record.notes = mark.notes;
            record.marked_by = Some(mark.marked_by);
            record.updated_at = now;
            return Ok(record.clone());
        }

        let record = Attendance {
            id: Uuid::new_v4(),
            enrollment_id: mark.enrollment_id,
            student_id: mark.student_id,
            course_id: mark.course_id,
            session_date: mark.session_date,
            status: mark.status,
            notes: mark.notes,
            marked_by: Some(mark.marked_by),
            created_at: now,
            updated_at: now,
        };
        tables.attendance.insert(record.id, record.clone());
        Ok(record)
    }

    async fn course_attendance(&self, course_ids: &[Uuid]) -> StoreResult<Vec<Attendance>> {
        let tables = self.tables.read().await;
        let mut records: Vec<Attendance> = tables
            .attendance
            .values()
            .filter(|a| course_ids.contains(&a.course_id))
            .cloned()
            .collect();
        records.sort_by_key(|a| (a.session_date, a.created_at));
        Ok(records)
    }

    async fn dashboard_stats(&self) -> StoreResult<DashboardStats> {
        let tables = self.tables.read().await;
        let scores: Vec<i64> = tables.live_students().map(|s| s.engagement_score as i64).collect();
        let avg_engagement = if scores.is_empty() {
            0
        } else {
            (scores.iter().sum::<i64>() as f64 / scores.len() as f64).round() as i64
        };

        Ok(DashboardStats {
            total_students: scores.len() as i64,
            total_courses: tables.courses.len() as i64,
            total_enrollments: tables.enrollments.len() as i64,
            active_courses: tables
                .courses
                .values()
                .filter(|c| c.status == CourseStatus::Active)
                .count() as i64,
            avg_engagement,
        })
    }

    async fn enrollments_per_course(&self) -> StoreResult<Vec<CourseEnrollmentCount>> {
        let tables = self.tables.read().await;
        let mut counts: Vec<CourseEnrollmentCount> = tables
            .courses
            .values()
            .map(|c| CourseEnrollmentCount {
                course_id: c.id,
                course_title: c.title.clone(),
                enrollment_count: tables.enrollment_count(c.id),
            })
            .collect();
        counts.sort_by(|a, b| {
            b.enrollment_count
                .cmp(&a.enrollment_count)
                .then_with(|| a.course_title.cmp(&b.course_title))
        });
        Ok(counts)
    }

    async fn daily_signups(&self) -> StoreResult<Vec<DailySignups>> {
        let tables = self.tables.read().await;
        let mut by_day: HashMap<NaiveDate, i64> = HashMap::new();
        for student in tables.live_students() {
            *by_day.entry(student.created_at.date_naive()).or_default() += 1;
        }
        let mut days: Vec<DailySignups> = by_day.into_iter().map(|(date, count)| DailySignups { date, count }).collect();
        days.sort_by_key(|d| d.date);
        Ok(days)
    }

    async fn top_students(&self, limit: i64) -> StoreResult<Vec<TopStudent>> {
        let tables = self.tables.read().await;
        let mut ranked: Vec<TopStudent> = tables
            .live_students()
            .map(|s| TopStudent {
                student_id: s.id,
                student_name: s.name.clone(),
                student_email: s.email.clone(),
                engagement_score: s.engagement_score,
                enrollments_count: tables.enrollments.values().filter(|e| e.student_id == s.id).count() as i64,
            })
            .collect();
        ranked.sort_by(|a, b| {
            b.engagement_score
                .cmp(&a.engagement_score)
                .then_with(|| a.student_name.cmp(&b.student_name))
        });
        ranked.truncate(limit.max(0) as usize);
        Ok(ranked)
    }

    async fn completion_rates(&self) -> StoreResult<Vec<CompletionRate>> {
        let tables = self.tables.read().await;
        let mut rates: Vec<CompletionRate> = tables
            .courses
            .values()
            .filter_map(|c| {
                let total = tables.enrollment_count(c.id);
                if total == 0 {
                    return None;
                }
                let completed = tables
                    .enrollments
                    .values()
                    .filter(|e| e.course_id == c.id && e.status == EnrollmentStatus::Completed)
                    .count() as i64;
                Some(CompletionRate {
                    course_id: c.id,
                    course_title: c.title.clone(),
                    total_enrollments: total,
                    completed_count: completed,
                    completion_rate: percentage(completed, total),
                })
            })
            .collect();
        rates.sort_by(|a, b| {
            b.completion_rate
                .total_cmp(&a.completion_rate)
                .then_with(|| a.course_title.cmp(&b.course_title))
        });
        Ok(rates)
    }
}
