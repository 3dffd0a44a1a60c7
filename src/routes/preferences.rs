use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::PreferenceProfile,
    routes::AppState,
};

#[derive(Debug, Serialize)]
pub struct PreferencesSaved {
    pub preferences: PreferenceProfile,
    /// False when a generation job for the user was already running
    pub generation_started: bool,
}

/// Stores the profile and starts generating the user's initial recipes
pub async fn put_preferences(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<Uuid>,
    Json(profile): Json<PreferenceProfile>,
) -> AppResult<Json<PreferencesSaved>> {
    if let Some(invalid) = profile.flavors.values().find(|v| !(1..=5).contains(*v)) {
        return Err(AppError::InvalidInput(format!(
            "Flavor intensity must be between 1 and 5, got {}",
            invalid
        )));
    }

    state.preferences.put(user_id, &profile).await?;
    tracing::info!(user_id = %user_id, cuisines = profile.cuisines.len(), "Saved preferences");

    let generation_started = state.orchestrator.spawn_for_user(user_id, None);

    Ok(Json(PreferencesSaved {
        preferences: profile,
        generation_started,
    }))
}

pub async fn get_preferences(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<Uuid>,
) -> AppResult<Json<PreferenceProfile>> {
    let profile = state
        .preferences
        .get(user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("No preferences for user {}", user_id)))?;
    Ok(Json(profile))
}
