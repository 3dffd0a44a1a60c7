use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    routes::AppState,
    services::GenerationStatus,
};

const MAX_GENERATE_COUNT: usize = 20;

#[derive(Debug, Default, Deserialize)]
pub struct GenerateRequest {
    pub count: Option<usize>,
}

/// Starts a background generation job.
///
/// Responds 202 either way; `started` is false when a job for the user is
/// already running.
pub async fn generate(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<Uuid>,
    body: Option<Json<GenerateRequest>>,
) -> AppResult<(StatusCode, Json<Value>)> {
    let request = body.map(|Json(r)| r).unwrap_or_default();
    if let Some(count) = request.count {
        if count == 0 || count > MAX_GENERATE_COUNT {
            return Err(AppError::InvalidInput(format!(
                "count must be between 1 and {}",
                MAX_GENERATE_COUNT
            )));
        }
    }

    if state.preferences.get(user_id).await?.is_none() {
        return Err(AppError::NotFound(format!(
            "No preferences for user {}",
            user_id
        )));
    }

    let started = state.orchestrator.spawn_for_user(user_id, request.count);
    tracing::info!(user_id = %user_id, started, "Generation requested");

    Ok((StatusCode::ACCEPTED, Json(json!({ "started": started }))))
}

pub async fn generation_status(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<Uuid>,
) -> AppResult<Json<GenerationStatus>> {
    Ok(Json(state.orchestrator.status(user_id).await?))
}
