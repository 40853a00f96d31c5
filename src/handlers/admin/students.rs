// handlers/admin/students.rs - Student management for admins

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use super::SearchQuery;
use crate::app::AppState;
use crate::auth::{hash_password, normalize_email, validate_email_format, validate_password};
use crate::database::models::{
    CapacityRule, ContactDetails, Enrollment, EnrollmentDetail, EnrollmentFilter, NewAccount, Student, StudentUpdate,
};
use crate::error::ApiError;
use crate::handlers::non_blank;
use crate::middleware::{ApiResponse, ApiResult};
use crate::policy::Role;
use crate::store::StoreError;

const ALREADY_ENROLLED: &str = "Student is already enrolled in this course";

/// GET /dashboard/admin/students - live students, newest first
pub async fn list_get(State(state): State<AppState>, Query(query): Query<SearchQuery>) -> ApiResult<Vec<Student>> {
    let students = state.learning.list_students(query.term().as_deref()).await?;
    Ok(ApiResponse::success(students))
}

#[derive(Debug, Deserialize)]
pub struct CreateStudent {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub password: String,
    pub brand_id: Option<Uuid>,
    #[serde(flatten)]
    pub contact: ContactDetails,
}

/// POST /dashboard/admin/students - account, profile and student record in one unit
pub async fn create_post(State(state): State<AppState>, Json(body): Json<CreateStudent>) -> ApiResult<Student> {
    let email = normalize_email(&body.email);
    let name = body.name.trim().to_string();

    let missing: Vec<(&str, &str)> = [("email", email.is_empty()), ("name", name.is_empty()), ("password", body.password.is_empty())]
        .into_iter()
        .filter(|(_, blank)| *blank)
        .map(|(field, _)| (field, "This field is required"))
        .collect();
    if !missing.is_empty() {
        return Err(ApiError::invalid_fields("Email, name, and password are required", missing));
    }
    if !validate_email_format(&email) {
        return Err(ApiError::invalid_fields("Please enter a valid email address", [("email", "Invalid email")]));
    }
    validate_password(&body.password).map_err(|msg| ApiError::invalid_fields(msg.clone(), [("password", msg)]))?;

    let password_hash = hash_password(&body.password).map_err(|e| {
        tracing::error!("Password hashing failed: {}", e);
        ApiError::internal_server_error("Failed to create student")
    })?;

    let contact = ContactDetails {
        phone_number: non_blank(body.contact.phone_number),
        city: non_blank(body.contact.city),
        state: non_blank(body.contact.state),
    };

    let profile = state
        .profiles
        .register_account(NewAccount {
            email,
            name,
            password_hash,
            role: Role::Student,
            brand_id: body.brand_id,
            contact,
        })
        .await?;
    info!("Admin created student {}", profile.id);

    let student = state.learning.get_student(profile.id).await?;
    Ok(ApiResponse::created(student))
}

#[derive(Debug, Serialize)]
pub struct StudentDetail {
    pub student: Student,
    pub enrollments: Vec<EnrollmentDetail>,
}

/// GET /dashboard/admin/students/:id - student with enrollment history
pub async fn detail_get(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<StudentDetail> {
    let student = state.learning.get_student(id).await?;
    let enrollments = state
        .learning
        .list_enrollments(EnrollmentFilter {
            student_id: Some(id),
            ..Default::default()
        })
        .await?;
    Ok(ApiResponse::success(StudentDetail { student, enrollments }))
}

/// PUT /dashboard/admin/students/:id - edit contact details; name and email mirror to the profile
pub async fn update_put(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<StudentUpdate>,
) -> ApiResult<Student> {
    let update = StudentUpdate {
        name: body.name.trim().to_string(),
        email: normalize_email(&body.email),
        contact: ContactDetails {
            phone_number: non_blank(body.contact.phone_number),
            city: non_blank(body.contact.city),
            state: non_blank(body.contact.state),
        },
    };
    if update.name.is_empty() || !validate_email_format(&update.email) {
        return Err(ApiError::invalid_fields(
            "Name and a valid email are required",
            [("name", "Required"), ("email", "Must be a valid email")],
        ));
    }

    let student = state.learning.update_student(id, update).await?;
    Ok(ApiResponse::success(student))
}

/// DELETE /dashboard/admin/students/:id - soft delete
pub async fn delete(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Value> {
    state.learning.delete_student(id).await?;
    info!("Admin deleted student {}", id);
    Ok(ApiResponse::success(json!({ "message": "Student deleted successfully" })))
}

#[derive(Debug, Deserialize)]
pub struct EnrollStudent {
    pub course_id: Uuid,
}

/// POST /dashboard/admin/students/:id/enrollments - admins may enroll past capacity
pub async fn enroll_post(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<EnrollStudent>,
) -> ApiResult<Enrollment> {
    match state.learning.enroll(id, body.course_id, CapacityRule::Ignore).await {
        Ok(enrollment) => Ok(ApiResponse::created(enrollment)),
        Err(StoreError::Conflict(_)) => Err(ApiError::conflict(ALREADY_ENROLLED)),
        Err(e) => Err(e.into()),
    }
}
