//! API handlers for the HTTP endpoint

use std::sync::Arc;

use axum::{extract::State, Json};

use crate::models::StatusResponse;
use crate::monitor::CostMonitor;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Cost check workflow
    pub monitor: Arc<CostMonitor>,
}

/// Run a cost check and report it.
///
/// Always answers 200; failures show up inside the payload.
pub async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    Json(state.monitor.check().await)
}
