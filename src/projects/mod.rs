use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post},
    Router,
};

use crate::state::AppState;

pub mod dto;
pub mod handlers;
pub mod repo;
pub mod services;

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/api/projects",
            post(handlers::create_project).get(handlers::list_own),
        )
        .route("/api/projects/community", get(handlers::list_community))
        .route("/api/projects/all", get(handlers::list_community))
        .route(
            "/api/projects/:id",
            get(handlers::get_project).delete(handlers::delete_project),
        )
        .route(
            "/api/projects/:id/upvote",
            post(handlers::upvote).put(handlers::upvote),
        )
        .route(
            "/api/projects/:id/downvote",
            post(handlers::downvote).put(handlers::downvote),
        )
        .route("/api/projects/:id/comment", post(handlers::add_comment))
        .route("/api/projects/:id/comments", post(handlers::add_comment))
        .route(
            "/api/projects/:id/comment/:comment_id",
            delete(handlers::delete_comment),
        )
        .layer(DefaultBodyLimit::max(10 * 1024 * 1024)) // 10MB
}
