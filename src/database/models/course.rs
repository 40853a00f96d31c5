use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

text_enum!(CourseStatus {
    Upcoming => "upcoming",
    Active => "active",
    Completed => "completed",
});

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Course {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub brand_id: Option<Uuid>,
    pub instructor_id: Option<Uuid>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub capacity: i32,
    pub price: Decimal,
    pub status: CourseStatus,
    pub current_enrolled: i32,
    pub created_at: DateTime<Utc>,
}

impl Course {
    pub fn is_full(&self) -> bool {
        self.current_enrolled >= self.capacity
    }

    pub fn seats_left(&self) -> i32 {
        (self.capacity - self.current_enrolled).max(0)
    }
}

/// Validated course fields for create and update.
#[derive(Debug, Clone)]
pub struct NewCourse {
    pub title: String,
    pub description: Option<String>,
    pub brand_id: Option<Uuid>,
    pub instructor_id: Option<Uuid>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub capacity: i32,
    pub price: Decimal,
    pub status: CourseStatus,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CourseOrder {
    #[default]
    Newest,
    Title,
}

#[derive(Debug, Clone, Default)]
pub struct CourseFilter {
    /// Case-insensitive substring of the title.
    pub search: Option<String>,
    pub instructor_id: Option<Uuid>,
    /// Empty means any status.
    pub statuses: Vec<CourseStatus>,
    pub order: CourseOrder,
}

impl CourseFilter {
    pub fn matches(&self, course: &Course) -> bool {
        if let Some(search) = self.search.as_deref() {
            if !course.title.to_lowercase().contains(&search.to_lowercase()) {
                return false;
            }
        }
        if let Some(instructor_id) = self.instructor_id {
            if course.instructor_id != Some(instructor_id) {
                return false;
            }
        }
        self.statuses.is_empty() || self.statuses.contains(&course.status)
    }
}
