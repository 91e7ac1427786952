//! Viewer Progress and Leaderboard Handlers

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};

use storefront_core::ViewerId;
use storefront_progression::{
    AwardResponse, LeaderboardEntry, LeaderboardStats, ProgressionError, ViewerProgress, progress,
    rank,
};

use crate::auth::Admin;
use crate::error::ServerError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct ActivityQuery {
    pub activity_type: String,
}

#[derive(Debug, Deserialize)]
pub struct LeaderboardQuery {
    #[serde(default)]
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LeaderboardResponse {
    pub entries: Vec<LeaderboardEntry>,
    pub max_entries: usize,
}

#[derive(Debug, Deserialize)]
pub struct PointsCorrection {
    pub points: u64,
    pub reason: String,
}

pub async fn register_viewer(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<ViewerProgress>), ServerError> {
    let viewer = state
        .viewers
        .register(&payload.username, &payload.email, state.clock.now())?;
    let config = state.progression_config()?;
    Ok((StatusCode::CREATED, Json(progress(&viewer, &config.levels))))
}

pub async fn get_viewer(
    State(state): State<AppState>,
    Path(viewer_id): Path<String>,
) -> Result<Json<ViewerProgress>, ServerError> {
    let id = ViewerId::from_string(viewer_id);
    let viewer = state
        .viewers
        .get(&id)?
        .ok_or_else(|| ProgressionError::ViewerNotFound(id.to_string()))?;
    let config = state.progression_config()?;
    Ok(Json(progress(&viewer, &config.levels)))
}

/// Award points for one activity
pub async fn record_activity(
    State(state): State<AppState>,
    Path(viewer_id): Path<String>,
    Query(query): Query<ActivityQuery>,
) -> Result<Json<AwardResponse>, ServerError> {
    let id = ViewerId::from_string(viewer_id);
    let config = state.progression_config()?;

    let outcome = state
        .viewers
        .award(&id, &query.activity_type, &config, state.clock.today())?;

    tracing::info!(
        viewer_id = %id,
        activity_type = %query.activity_type,
        points = outcome.points,
        "Awarded activity"
    );
    Ok(Json(outcome.into()))
}

pub async fn leaderboard_top(
    State(state): State<AppState>,
    Query(query): Query<LeaderboardQuery>,
) -> Result<Json<LeaderboardResponse>, ServerError> {
    let max_entries = state.leaderboard_max_entries();
    let limit = query.limit.map_or(max_entries, |l| l.min(max_entries));

    let viewers = state.viewers.list()?;
    let config = state.progression_config()?;
    let board = rank(&viewers, &config.levels, limit);

    Ok(Json(LeaderboardResponse {
        entries: board.iter().collect(),
        max_entries,
    }))
}

pub async fn leaderboard_stats(
    State(state): State<AppState>,
) -> Result<Json<LeaderboardStats>, ServerError> {
    let viewers = state.viewers.list()?;
    let config = state.progression_config()?;
    Ok(Json(LeaderboardStats::collect(&viewers, &config.levels)))
}

/// Administrative point correction
pub async fn correct_points(
    _admin: Admin,
    State(state): State<AppState>,
    Path(viewer_id): Path<String>,
    Json(payload): Json<PointsCorrection>,
) -> Result<Json<ViewerProgress>, ServerError> {
    if payload.reason.trim().is_empty() {
        return Err(ServerError::BadRequest("a reason is required".into()));
    }

    let id = ViewerId::from_string(viewer_id);
    let config = state.progression_config()?;
    let progress = state
        .viewers
        .correct_points(&id, payload.points, &payload.reason, &config)?;
    Ok(Json(progress))
}
