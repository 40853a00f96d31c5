// handlers/public/root.rs - GET / and GET /health

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Value};

use crate::app::AppState;

/// GET / - service info and route map
pub async fn root_get() -> Json<Value> {
    Json(json!({
        "success": true,
        "data": {
            "name": "BrandHub API",
            "version": env!("CARGO_PKG_VERSION"),
            "description": "Learning-management dashboard with role-gated admin, instructor and student areas",
            "endpoints": {
                "auth": "/login, /signup, /auth/signout (public)",
                "dashboard": "/dashboard, /dashboard/insight (any signed-in user)",
                "admin": "/dashboard/admin/* (admin)",
                "instructor": "/dashboard/instructor/* (instructor, admin)",
                "student": "/dashboard/student/* (student, admin)",
            }
        }
    }))
}

/// GET /health - store liveness
pub async fn health_get(State(state): State<AppState>) -> impl IntoResponse {
    let now = chrono::Utc::now();
    let backend = state.profiles.backend_name();

    match state.profiles.health_check().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "data": { "status": "ok", "timestamp": now, "store": backend }
            })),
        ),
        Err(e) => {
            tracing::warn!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "success": false,
                    "error": "store unavailable",
                    "data": { "status": "degraded", "timestamp": now, "store": backend }
                })),
            )
        }
    }
}
