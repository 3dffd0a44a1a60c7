use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{RecipeFilters, StoredRecipe},
    routes::AppState,
};

const DEFAULT_LIMIT: usize = 10;
const MAX_LIMIT: usize = 50;

fn clamp_limit(limit: Option<usize>) -> usize {
    limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
}

#[derive(Debug, Deserialize)]
pub struct LimitParams {
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    #[serde(default)]
    pub filters: RecipeFilters,
    pub limit: Option<usize>,
    /// Includes the user's own generated recipes when set
    pub user_id: Option<Uuid>,
}

/// Recommendations ranked against the user's stored preferences
pub async fn for_user(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<Uuid>,
    Query(params): Query<LimitParams>,
) -> AppResult<Json<Vec<StoredRecipe>>> {
    let profile = state
        .preferences
        .get(user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("No preferences for user {}", user_id)))?;

    let recipes = state
        .recommender
        .recommend_for_user(user_id, &profile, clamp_limit(params.limit))
        .await;
    Ok(Json(recipes))
}

/// Free-text recipe search with optional filters
pub async fn search(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SearchRequest>,
) -> AppResult<Json<Vec<StoredRecipe>>> {
    if request.query.trim().is_empty() {
        return Err(AppError::InvalidInput("query must not be empty".to_string()));
    }

    tracing::info!(query = %request.query, filtered = !request.filters.is_empty(), "Searching recipes");
    let recipes = state
        .recommender
        .recommend(
            &request.query,
            &request.filters,
            clamp_limit(request.limit),
            request.user_id,
        )
        .await;
    Ok(Json(recipes))
}
