use axum::{extract::State, Json};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::CuisineRecommendation,
    routes::AppState,
};

const DEFAULT_CUISINE_LIMIT: usize = 5;

#[derive(Debug, Deserialize)]
pub struct CuisineRequest {
    pub query: String,
    pub limit: Option<usize>,
    /// Applies the user's restrictions and allergies when set
    pub user_id: Option<Uuid>,
}

/// Handler for cuisine advice endpoint
pub async fn recommend(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CuisineRequest>,
) -> AppResult<Json<Vec<CuisineRecommendation>>> {
    let profile = match request.user_id {
        Some(user_id) => state.preferences.get(user_id).await?,
        None => None,
    };

    let recommendations = state
        .advisor
        .recommend(
            &request.query,
            request.limit.unwrap_or(DEFAULT_CUISINE_LIMIT),
            profile.as_ref(),
        )
        .await?;
    Ok(Json(recommendations))
}
