//! License Handlers

use axum::{Json, extract::State, http::StatusCode};
use serde::{Deserialize, Serialize};

use storefront_core::{LicenseKey, LicenseType, VerifyRequest, VerifyResponse, ViewerId};
use storefront_licensing::{IssueRequest, License, LicenseStats};

use crate::auth::Admin;
use crate::error::ServerError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    pub license_type: String,
    #[serde(default)]
    pub expires_in_days: Option<u32>,
    #[serde(default)]
    pub viewer_id: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DeactivateRequest {
    pub key: String,
}

#[derive(Debug, Serialize)]
pub struct LicenseList {
    pub licenses: Vec<License>,
    pub total: usize,
}

/// Verify a key and consume it for the calling client
pub async fn verify_license(
    State(state): State<AppState>,
    Json(payload): Json<VerifyRequest>,
) -> Result<Json<VerifyResponse>, ServerError> {
    let Ok(key) = LicenseKey::parse(&payload.key) else {
        return Ok(Json(VerifyResponse::invalid("invalid license key format")));
    };

    let response = state
        .licenses
        .verify_and_activate(&key, payload.client_id.as_deref(), state.clock.now())?;

    tracing::info!(
        license_key = %key,
        client_id = ?payload.client_id,
        valid = response.valid,
        "License verification"
    );
    Ok(Json(response))
}

pub async fn generate_license(
    _admin: Admin,
    State(state): State<AppState>,
    Json(payload): Json<GenerateRequest>,
) -> Result<(StatusCode, Json<License>), ServerError> {
    let license_type: LicenseType = payload.license_type.parse()?;
    let request = IssueRequest {
        license_type: Some(license_type),
        expires_in_days: payload.expires_in_days,
        assigned_viewer_id: payload.viewer_id.map(ViewerId::from_string),
        email: payload.email,
        external_ref: None,
    };

    let license = state.licenses.issue(request, state.clock.now())?;
    Ok((StatusCode::CREATED, Json(license)))
}

pub async fn deactivate_license(
    _admin: Admin,
    State(state): State<AppState>,
    Json(payload): Json<DeactivateRequest>,
) -> Result<Json<License>, ServerError> {
    let key = LicenseKey::parse(&payload.key)?;
    Ok(Json(state.licenses.deactivate(&key)?))
}

pub async fn list_licenses(
    _admin: Admin,
    State(state): State<AppState>,
) -> Result<Json<LicenseList>, ServerError> {
    let mut licenses = state.licenses.list()?;
    licenses.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(Json(LicenseList {
        total: licenses.len(),
        licenses,
    }))
}

pub async fn license_stats(
    _admin: Admin,
    State(state): State<AppState>,
) -> Result<Json<LicenseStats>, ServerError> {
    Ok(Json(state.licenses.stats(state.clock.now())?))
}
