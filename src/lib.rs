pub mod app;
pub mod auth;
pub mod cli;
pub mod config;
pub mod database;
pub mod error;
pub mod handlers;
pub mod insight;
pub mod middleware;
pub mod policy;
pub mod store;

pub use app::{app, AppState};
