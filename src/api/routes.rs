use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::middleware::request_id_middleware;

use super::handlers;
use super::AppState;

/// Creates the main API router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        // Catalog
        .route("/items", get(handlers::get_items))
        .route("/items", post(handlers::create_item))
        .route("/items/batch", post(handlers::create_items_batch))
        .route("/items/:item_id/similar", get(handlers::get_similar_items))
        // Users
        .route("/users", post(handlers::subscribe))
        .route("/users/:user_id/profile", get(handlers::get_profile))
        // Feedback & matching
        .route("/feedback", post(handlers::submit_feedback))
        .route("/matches", get(handlers::get_matches))
        .layer(middleware::from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
