// handlers/dashboard/mod.rs - Pages any signed-in caller may reach
//
// The generic dashboard is also the home of callers without a role.

use axum::{
    routing::{get, post},
    Router,
};

use crate::app::AppState;
use crate::policy::{DASHBOARD_PATH, UNAUTHORIZED_PATH};

pub mod home;
pub mod insight;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route(DASHBOARD_PATH, get(home::dashboard_get))
        .route(UNAUTHORIZED_PATH, get(home::unauthorized_get))
        .route("/dashboard/insight", post(insight::insight_post))
}
