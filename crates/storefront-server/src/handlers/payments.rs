//! Checkout and Stripe Webhook Handlers

use axum::{
    Json,
    extract::State,
    http::{HeaderMap, StatusCode},
};
use serde::{Deserialize, Serialize};

use storefront_core::{LicenseType, ViewerId};
use storefront_licensing::{CheckoutRequest as PaymentCheckoutRequest, WebhookHandler};

use crate::error::ServerError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CheckoutRequest {
    pub license_type: String,
    pub email: String,
    pub success_url: String,
    pub cancel_url: String,
    #[serde(default)]
    pub viewer_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CheckoutResponse {
    pub checkout_url: String,
    pub session_id: String,
}

/// Create Stripe checkout session
pub async fn create_checkout(
    State(state): State<AppState>,
    Json(payload): Json<CheckoutRequest>,
) -> Result<Json<CheckoutResponse>, ServerError> {
    let checkout = state.checkout.as_ref().ok_or(ServerError::PaymentsDisabled)?;
    let license_type: LicenseType = payload.license_type.parse()?;

    let request = PaymentCheckoutRequest {
        license_type,
        customer_email: payload.email,
        success_url: payload.success_url,
        cancel_url: payload.cancel_url,
        viewer_id: payload.viewer_id.map(ViewerId::from_string),
    };

    let session = checkout.create_checkout_session(request).await?;

    Ok(Json(CheckoutResponse {
        checkout_url: session.checkout_url,
        session_id: session.id,
    }))
}

/// Stripe webhook handler
pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> Result<StatusCode, ServerError> {
    let checkout = state.checkout.as_ref().ok_or(ServerError::PaymentsDisabled)?;

    let signature = headers
        .get("stripe-signature")
        .and_then(|v| v.to_str().ok())
        .ok_or(ServerError::MissingSignature)?;

    let handler = WebhookHandler::new(state.licenses.clone());
    let event = handler.parse_event(&body, signature, checkout.webhook_secret())?;

    if let Some(license) = handler.handle(&event, state.clock.now())? {
        tracing::info!(license_key = %license.key, "Checkout fulfilled");
    }

    Ok(StatusCode::OK)
}
