// handlers/public/mod.rs - Public handlers (no session required)
//
// Service info, health, and the login/signup/signout form actions. Signed-in
// callers asking for /login or /signup are sent home by the access policy
// before these run.

use axum::{
    routing::{get, post},
    Router,
};

use crate::app::AppState;

pub mod auth;
pub mod root;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(root::root_get))
        .route("/health", get(root::health_get))
        .route("/login", get(auth::login_get).post(auth::login_post))
        .route("/signup", get(auth::signup_get).post(auth::signup_post))
        .route("/auth/signout", post(auth::signout_post))
}
