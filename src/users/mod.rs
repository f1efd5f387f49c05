use axum::{
    extract::DefaultBodyLimit,
    routing::{get, put},
    Router,
};

use crate::state::AppState;

pub mod dto;
pub mod handlers;
pub mod repo;

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/api/users/me",
            get(handlers::me).put(handlers::update_profile),
        )
        .route("/api/users/update-profile", put(handlers::update_profile))
        .route("/api/students/:user_id/profile", get(handlers::student_profile))
        .layer(DefaultBodyLimit::max(10 * 1024 * 1024)) // 10MB
}
