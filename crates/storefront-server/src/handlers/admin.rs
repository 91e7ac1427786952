//! Progression Administration

use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};

use storefront_progression::{ActivityRule, ActivityRules, LevelTable, LevelThreshold};

use crate::auth::Admin;
use crate::error::ServerError;
use crate::state::AppState;

/// Largest leaderboard an admin may configure
pub const MAX_LEADERBOARD_ENTRIES: usize = 500;

#[derive(Debug, Serialize, Deserialize)]
pub struct LeaderboardSettings {
    pub max_entries: usize,
}

pub async fn get_levels(
    _admin: Admin,
    State(state): State<AppState>,
) -> Result<Json<Vec<LevelThreshold>>, ServerError> {
    let config = state.progression_config()?;
    Ok(Json(config.levels.thresholds().to_vec()))
}

/// Replace the level table. Viewer levels follow on their next read.
pub async fn put_levels(
    _admin: Admin,
    State(state): State<AppState>,
    Json(thresholds): Json<Vec<LevelThreshold>>,
) -> Result<Json<Vec<LevelThreshold>>, ServerError> {
    let table = LevelTable::new(thresholds)?;
    let config = state.update_progression(|config| config.levels = table)?;

    tracing::info!(levels = config.levels.thresholds().len(), "Level table replaced");
    Ok(Json(config.levels.thresholds().to_vec()))
}

pub async fn get_activities(
    _admin: Admin,
    State(state): State<AppState>,
) -> Result<Json<Vec<ActivityRule>>, ServerError> {
    let config = state.progression_config()?;
    Ok(Json(config.activities.iter().cloned().collect()))
}

pub async fn put_activities(
    _admin: Admin,
    State(state): State<AppState>,
    Json(rules): Json<Vec<ActivityRule>>,
) -> Result<Json<Vec<ActivityRule>>, ServerError> {
    let rules = ActivityRules::new(rules)?;
    let config = state.update_progression(|config| config.activities = rules)?;

    tracing::info!(activities = config.activities.len(), "Activity rules replaced");
    Ok(Json(config.activities.iter().cloned().collect()))
}

pub async fn put_leaderboard(
    _admin: Admin,
    State(state): State<AppState>,
    Json(settings): Json<LeaderboardSettings>,
) -> Result<Json<LeaderboardSettings>, ServerError> {
    if settings.max_entries == 0 || settings.max_entries > MAX_LEADERBOARD_ENTRIES {
        return Err(ServerError::BadRequest(format!(
            "max_entries must be between 1 and {MAX_LEADERBOARD_ENTRIES}"
        )));
    }

    state
        .leaderboard_max_entries
        .store(settings.max_entries, std::sync::atomic::Ordering::Relaxed);
    tracing::info!(max_entries = settings.max_entries, "Leaderboard size changed");
    Ok(Json(settings))
}
