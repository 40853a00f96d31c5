// handlers/admin/mod.rs - Admin area (/dashboard/admin/*)
//
// Reachable by admins only. Student and course management plus analytics.

use axum::{
    extract::State,
    routing::{get, post},
    Router,
};
use serde::Deserialize;

use crate::app::AppState;
use crate::database::models::DashboardStats;
use crate::handlers::non_blank;
use crate::middleware::{ApiResponse, ApiResult};

pub mod analytics;
pub mod courses;
pub mod students;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/dashboard/admin", get(home_get))
        .route("/dashboard/admin/students", get(students::list_get).post(students::create_post))
        .route(
            "/dashboard/admin/students/:id",
            get(students::detail_get).put(students::update_put).delete(students::delete),
        )
        .route("/dashboard/admin/students/:id/enrollments", post(students::enroll_post))
        .route("/dashboard/admin/courses", get(courses::list_get).post(courses::create_post))
        .route("/dashboard/admin/courses/options", get(courses::options_get))
        .route(
            "/dashboard/admin/courses/:id",
            get(courses::detail_get).put(courses::update_put).delete(courses::delete),
        )
        .route("/dashboard/admin/analytics", get(analytics::analytics_get))
}

/// `?search=` on list pages
#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    pub search: Option<String>,
}

impl SearchQuery {
    fn term(self) -> Option<String> {
        non_blank(self.search)
    }
}

/// GET /dashboard/admin - summary counts
pub async fn home_get(State(state): State<AppState>) -> ApiResult<DashboardStats> {
    let stats = state.learning.dashboard_stats().await?;
    Ok(ApiResponse::success(stats))
}
