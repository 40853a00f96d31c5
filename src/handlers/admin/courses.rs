// handlers/admin/courses.rs - Course management for admins

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use super::SearchQuery;
use crate::app::AppState;
use crate::database::models::{Brand, Course, CourseFilter, CourseOrder, CourseStatus, NewCourse, Profile};
use crate::error::ApiError;
use crate::handlers::non_blank;
use crate::middleware::{ApiResponse, ApiResult};

/// Course create/edit body. Everything is optional here so missing fields are
/// reported together instead of as a deserialization failure.
#[derive(Debug, Default, Deserialize)]
pub struct CourseForm {
    pub title: Option<String>,
    pub description: Option<String>,
    pub brand_id: Option<Uuid>,
    pub instructor_id: Option<Uuid>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub capacity: Option<i32>,
    pub price: Option<Decimal>,
    pub status: Option<CourseStatus>,
}

impl CourseForm {
    /// Validate into store input. `default_status` applies when the form has none.
    pub fn validate(self, default_status: CourseStatus) -> Result<NewCourse, ApiError> {
        let title = non_blank(self.title);

        let mut missing = Vec::new();
        if title.is_none() {
            missing.push("title");
        }
        if self.start_date.is_none() {
            missing.push("start_date");
        }
        if self.end_date.is_none() {
            missing.push("end_date");
        }
        if self.capacity.is_none() {
            missing.push("capacity");
        }

        let (Some(title), Some(start_date), Some(end_date), Some(capacity)) =
            (title, self.start_date, self.end_date, self.capacity)
        else {
            return Err(ApiError::invalid_fields(
                "Please fill in all required fields",
                missing.into_iter().map(|field| (field, "This field is required")),
            ));
        };

        if end_date <= start_date {
            return Err(ApiError::invalid_fields(
                "End date must be after start date",
                [("end_date", "Must be after start date")],
            ));
        }
        if capacity <= 0 {
            return Err(ApiError::invalid_fields(
                "Capacity must be greater than zero",
                [("capacity", "Must be greater than zero")],
            ));
        }
        let price = self.price.unwrap_or(Decimal::ZERO);
        if price.is_sign_negative() {
            return Err(ApiError::invalid_fields("Price cannot be negative", [("price", "Must not be negative")]));
        }

        Ok(NewCourse {
            title,
            description: non_blank(self.description),
            brand_id: self.brand_id,
            instructor_id: self.instructor_id,
            start_date,
            end_date,
            capacity,
            price: price.round_dp(2),
            status: self.status.unwrap_or(default_status),
        })
    }
}

/// GET /dashboard/admin/courses - newest first, `?search=` over title
pub async fn list_get(State(state): State<AppState>, Query(query): Query<SearchQuery>) -> ApiResult<Vec<Course>> {
    let filter = CourseFilter {
        search: query.term(),
        order: CourseOrder::Newest,
        ..Default::default()
    };
    let courses = state.learning.list_courses(filter).await?;
    Ok(ApiResponse::success(courses))
}

/// POST /dashboard/admin/courses - new courses start upcoming with no enrollments
pub async fn create_post(State(state): State<AppState>, Json(form): Json<CourseForm>) -> ApiResult<Course> {
    let course = form.validate(CourseStatus::Upcoming)?;
    let course = state.learning.create_course(course).await?;
    info!("Admin created course {} ({})", course.id, course.title);
    Ok(ApiResponse::created(course))
}

/// GET /dashboard/admin/courses/:id
pub async fn detail_get(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Course> {
    let course = state.learning.get_course(id).await?;
    Ok(ApiResponse::success(course))
}

/// PUT /dashboard/admin/courses/:id - status is kept unless the form sets one
pub async fn update_put(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(form): Json<CourseForm>,
) -> ApiResult<Course> {
    let existing = state.learning.get_course(id).await?;
    let course = form.validate(existing.status)?;
    let course = state.learning.update_course(id, course).await?;
    Ok(ApiResponse::success(course))
}

/// DELETE /dashboard/admin/courses/:id
pub async fn delete(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Value> {
    state.learning.delete_course(id).await?;
    info!("Admin deleted course {}", id);
    Ok(ApiResponse::success(json!({ "message": "Course deleted successfully" })))
}

#[derive(Debug, Serialize)]
pub struct CourseOptions {
    pub brands: Vec<Brand>,
    pub instructors: Vec<Profile>,
}

/// GET /dashboard/admin/courses/options - brand and instructor pickers for the course form
pub async fn options_get(State(state): State<AppState>) -> ApiResult<CourseOptions> {
    let brands = state.profiles.list_brands().await?;
    let instructors = state.profiles.list_instructors().await?;
    Ok(ApiResponse::success(CourseOptions { brands, instructors }))
}
