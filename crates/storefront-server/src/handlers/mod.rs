//! HTTP Handlers

pub mod admin;
pub mod license;
pub mod live;
pub mod payments;
pub mod viewer;

use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};

use crate::state::AppState;

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub stripe_configured: bool,
    pub live_connections: usize,
}

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".into(),
        version: env!("CARGO_PKG_VERSION").into(),
        stripe_configured: state.checkout.is_some(),
        live_connections: state.hub.connection_count(),
    })
}
