//! HTTP request handlers
//!
//! Implements REST API endpoints for detection session control and the
//! recipe catalog.

use crate::api::server::AppContext;
use crate::detect::AcceptedDetection;
use crate::kb::Recipe;
use crate::state::IngredientResolution;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use tracing::error;
use uuid::Uuid;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: String,
    module: String,
    version: String,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    status: String,
}

#[derive(Debug, Serialize)]
pub struct StartResponse {
    status: String,
    session_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct DetectionStateResponse {
    running: bool,
    session_id: Option<Uuid>,
    cycle: u64,
    current: Option<AcceptedDetection>,
    resolutions: Vec<IngredientResolution>,
}

#[derive(Debug, Serialize)]
pub struct RecipeListResponse {
    recipes: Vec<Recipe>,
}

// ============================================================================
// Health Endpoint
// ============================================================================

/// GET /health - Health check endpoint
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        module: "platemate".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============================================================================
// Detection Session Endpoints
// ============================================================================

/// POST /detection/start - Start a detection session
///
/// A camera acquisition failure is the one fatal error; it is returned to
/// the caller instead of being absorbed into session state.
pub async fn start_detection(
    State(ctx): State<AppContext>,
) -> Result<Json<StartResponse>, (StatusCode, Json<StatusResponse>)> {
    match ctx.engine.start().await {
        Ok(()) => {
            let session_id = ctx.state.get_session_id().await;
            Ok(Json(StartResponse {
                status: "started".to_string(),
                session_id,
            }))
        }
        Err(e) => {
            error!("Failed to start detection: {}", e);
            Err((
                StatusCode::SERVICE_UNAVAILABLE,
                Json(StatusResponse {
                    status: format!("error: {}", e),
                }),
            ))
        }
    }
}

/// POST /detection/stop - Stop the detection session
///
/// Always succeeds; stopping an idle engine is a no-op that still releases
/// the camera.
pub async fn stop_detection(State(ctx): State<AppContext>) -> Json<StatusResponse> {
    ctx.engine.stop().await;
    Json(StatusResponse {
        status: "stopped".to_string(),
    })
}

/// GET /detection/state - Current session snapshot
pub async fn get_detection_state(State(ctx): State<AppContext>) -> Json<DetectionStateResponse> {
    let running = ctx.engine.is_running().await;
    let snapshot = ctx.state.snapshot().await;
    Json(DetectionStateResponse {
        running,
        session_id: snapshot.session_id,
        cycle: snapshot.cycle,
        current: snapshot.current,
        resolutions: snapshot.resolutions,
    })
}

// ============================================================================
// Recipe Catalog Endpoints
// ============================================================================

/// GET /recipes - All recipes, sorted by name
pub async fn list_recipes(State(ctx): State<AppContext>) -> Json<RecipeListResponse> {
    let recipes = ctx.kb.all().into_iter().cloned().collect();
    Json(RecipeListResponse { recipes })
}

/// GET /recipes/:name - One recipe by label (case-insensitive)
pub async fn get_recipe(
    State(ctx): State<AppContext>,
    Path(name): Path<String>,
) -> Result<Json<Recipe>, (StatusCode, Json<StatusResponse>)> {
    match ctx.kb.lookup(&name) {
        Some(recipe) => Ok(Json(recipe.clone())),
        None => Err((
            StatusCode::NOT_FOUND,
            Json(StatusResponse {
                status: format!("error: no recipe named '{}'", name),
            }),
        )),
    }
}
