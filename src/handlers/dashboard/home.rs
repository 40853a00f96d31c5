// handlers/dashboard/home.rs - GET /dashboard and GET /dashboard/unauthorized

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde::Serialize;
use serde_json::json;
use tracing::warn;

use crate::app::AppState;
use crate::database::models::{CourseEnrollmentCount, DailySignups};
use crate::middleware::{ApiResponse, ApiResult, Caller};
use crate::policy::{role_home, Role};
use crate::store::LearningStore;

pub const NO_BRAND: &str = "No Brand Assigned";

#[derive(Debug, Serialize)]
pub struct DashboardUser {
    pub email: String,
    pub name: Option<String>,
    pub role: Option<Role>,
    pub brand_name: String,
}

#[derive(Debug, Serialize)]
pub struct DashboardView {
    pub user: DashboardUser,
    pub enrollments_per_course: Vec<CourseEnrollmentCount>,
    pub student_growth_over_time: Vec<DailySignups>,
}

/// Chart data for the dashboard. A failed query renders as an empty chart.
pub(crate) async fn chart_data(store: &dyn LearningStore) -> (Vec<CourseEnrollmentCount>, Vec<DailySignups>) {
    let per_course = store.enrollments_per_course().await.unwrap_or_else(|e| {
        warn!("Error fetching enrollments per course: {}", e);
        Vec::new()
    });
    let growth = store.daily_signups().await.unwrap_or_else(|e| {
        warn!("Error fetching student growth data: {}", e);
        Vec::new()
    });
    (per_course, growth)
}

/// GET /dashboard - header details and enrollment charts
pub async fn dashboard_get(State(state): State<AppState>, Extension(caller): Extension<Caller>) -> ApiResult<DashboardView> {
    let identity = caller.require_identity()?;

    let brand_name = match caller.profile.as_ref().and_then(|p| p.brand_id) {
        Some(brand_id) => match state.profiles.get_brand(brand_id).await {
            Ok(Some(brand)) => brand.name,
            Ok(None) => NO_BRAND.to_string(),
            Err(e) => {
                warn!("Brand lookup failed for {}: {}", brand_id, e);
                NO_BRAND.to_string()
            }
        },
        None => NO_BRAND.to_string(),
    };

    let (enrollments_per_course, student_growth_over_time) = chart_data(state.learning.as_ref()).await;

    Ok(ApiResponse::success(DashboardView {
        user: DashboardUser {
            email: identity.email.clone(),
            name: caller.profile.as_ref().map(|p| p.name.clone()),
            role: caller.role(),
            brand_name,
        },
        enrollments_per_course,
        student_growth_over_time,
    }))
}

/// GET /dashboard/unauthorized - where the policy sends callers outside their area
pub async fn unauthorized_get(Extension(caller): Extension<Caller>) -> Response {
    (
        StatusCode::FORBIDDEN,
        Json(json!({
            "error": true,
            "code": "FORBIDDEN",
            "message": "You do not have permission to access this page.",
            "home": role_home(caller.role()),
        })),
    )
        .into_response()
}
