//! API routes

use axum::{routing::get, Router};
use tower_http::trace::TraceLayer;

use super::handlers::{self, AppState};

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::status))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
