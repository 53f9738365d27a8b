//! Halaqa Hub Backend
//!
//! Class scheduling and live Q&A for a study group, with SQLite persistence
//! and server-sent invalidations.

pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod errors;
pub mod models;
pub mod qa;
pub mod realtime;

use std::sync::Arc;

use axum::{
    middleware,
    routing::{delete, get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use config::Config;
use db::Repository;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<Repository>,
    pub config: Arc<Config>,
}

/// Create the application router with all routes.
pub fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let admin_key = state.config.admin_key.clone();

    // API routes
    let api_routes = Router::new()
        .route("/revision", get(api::get_revision))
        // Classes
        .route("/classes", get(api::list_classes).post(api::create_class))
        .route(
            "/classes/{id}",
            get(api::get_class)
                .put(api::update_class)
                .delete(api::delete_class),
        )
        .route("/classes/{id}/qa/toggle", post(api::toggle_qa))
        // Q&A
        .route(
            "/classes/{id}/questions",
            get(api::get_snapshot).post(api::submit_question),
        )
        .route("/classes/{id}/questions/events", get(api::question_events))
        .route("/questions/{id}", delete(api::delete_question))
        .route("/questions/{id}/upvote/toggle", post(api::toggle_upvote))
        .route("/questions/{id}/answered/toggle", post(api::toggle_answered))
        .route("/questions/{id}/replies", post(api::post_reply))
        .route("/replies/{id}", delete(api::delete_reply))
        // Attendance
        .route(
            "/classes/{id}/attendance",
            get(api::list_attendance)
                .post(api::check_in)
                .delete(api::check_out),
        )
        // Speaker suggestions
        .route(
            "/classes/{id}/suggestions",
            get(api::list_suggestions).post(api::create_suggestion),
        )
        .route("/suggestions/{id}/vote", post(api::vote_suggestion))
        // Slides
        .route(
            "/classes/{id}/slides",
            get(api::list_slides).post(api::create_slide),
        )
        .route("/slides/{id}", delete(api::delete_slide))
        // Resolve the viewer for every API call
        .layer(middleware::from_fn(move |req, next| {
            auth::viewer_layer(admin_key.clone(), req, next)
        }));

    // Health check (no auth required)
    let health_routes = Router::new().route("/health", get(health_check));

    Router::new()
        .nest("/api", api_routes)
        .merge(health_routes)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint.
async fn health_check() -> &'static str {
    "OK"
}
