use axum::{
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::{
    db::PreferenceStore,
    services::{CuisineAdvisor, GenerationOrchestrator, Recommender},
};

pub mod cuisines;
pub mod generation;
pub mod preferences;
pub mod recommendations;

/// Shared handles used by the HTTP handlers
pub struct AppState {
    pub preferences: Arc<dyn PreferenceStore>,
    pub orchestrator: GenerationOrchestrator,
    pub recommender: Recommender,
    pub advisor: CuisineAdvisor,
}

/// Creates the application router with all routes
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .nest("/api/v1", api_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// API routes under /api/v1
fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/users/:user_id/preferences",
            get(preferences::get_preferences).put(preferences::put_preferences),
        )
        .route("/users/:user_id/generate", post(generation::generate))
        .route(
            "/users/:user_id/generation-status",
            get(generation::generation_status),
        )
        .route(
            "/users/:user_id/recommendations",
            get(recommendations::for_user),
        )
        .route("/recipes/search", post(recommendations::search))
        .route("/cuisines/recommend", post(cuisines::recommend))
}

/// Health check endpoint
async fn health_check() -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({ "status": "healthy" })))
}
