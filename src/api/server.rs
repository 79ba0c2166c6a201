//! HTTP server setup and routing
//!
//! Sets up the Axum HTTP server with routes for session control and SSE.

use crate::detect::DetectionEngine;
use crate::events::EventBus;
use crate::kb::FoodKb;
use crate::state::SessionState;
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

/// Shared application context passed to all handlers
///
/// AppContext implements Clone, which gives us `FromRef<AppContext>` for
/// free via Axum's blanket implementation.
#[derive(Clone)]
pub struct AppContext {
    pub state: Arc<SessionState>,
    pub engine: Arc<DetectionEngine>,
    pub kb: Arc<FoodKb>,
    pub event_bus: EventBus,
}

/// Build the API router with all routes
pub fn build_router(ctx: AppContext) -> Router {
    Router::new()
        // Health endpoint
        .route("/health", get(super::handlers::health))

        // Detection session control
        .route("/detection/start", post(super::handlers::start_detection))
        .route("/detection/stop", post(super::handlers::stop_detection))
        .route("/detection/state", get(super::handlers::get_detection_state))

        // Recipe catalog
        .route("/recipes", get(super::handlers::list_recipes))
        .route("/recipes/:name", get(super::handlers::get_recipe))

        // SSE event stream
        .route("/events", get(super::sse::event_stream))

        // Attach application context
        .with_state(ctx)

        // Enable CORS for the browser frontend
        .layer(CorsLayer::permissive())
}
