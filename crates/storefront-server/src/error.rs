//! Server Errors
//!
//! Every failure leaves the server as `(StatusCode, Json<ErrorResponse>)`
//! with a stable machine-readable `code`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use storefront_core::CoreError;
use storefront_licensing::LicenseError;
use storefront_progression::ProgressionError;

/// Error body sent with every non-2xx response
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

#[derive(Error, Debug)]
pub enum ServerError {
    #[error(transparent)]
    License(#[from] LicenseError),

    #[error(transparent)]
    Progression(#[from] ProgressionError),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Missing or invalid admin token")]
    Unauthorized,

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Payments not configured")]
    PaymentsDisabled,

    #[error("Missing Stripe signature")]
    MissingSignature,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        self.status_and_code().0
    }

    pub fn code(&self) -> &'static str {
        self.status_and_code().1
    }

    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::License(e) => match e {
                LicenseError::NotFound(_) => (StatusCode::NOT_FOUND, "LICENSE_NOT_FOUND"),
                LicenseError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "INVALID_REQUEST"),
                LicenseError::Core(core) => core_status(core),
                LicenseError::Stripe(_) => (StatusCode::BAD_GATEWAY, "CHECKOUT_ERROR"),
                LicenseError::WebhookSignature(_) => (StatusCode::BAD_REQUEST, "INVALID_SIGNATURE"),
                LicenseError::WebhookParse(_) => (StatusCode::BAD_REQUEST, "WEBHOOK_PARSE_ERROR"),
                LicenseError::Config(_) => (StatusCode::SERVICE_UNAVAILABLE, "PAYMENTS_DISABLED"),
                LicenseError::Storage(_) => (StatusCode::INTERNAL_SERVER_ERROR, "STORAGE_ERROR"),
            },
            Self::Progression(e) => match e {
                ProgressionError::UnknownActivity(_) => {
                    (StatusCode::BAD_REQUEST, "UNKNOWN_ACTIVITY")
                }
                ProgressionError::ActivityDisabled(_) => {
                    (StatusCode::FORBIDDEN, "ACTIVITY_DISABLED")
                }
                ProgressionError::AlreadyClaimedToday { .. } => {
                    (StatusCode::CONFLICT, "ALREADY_CLAIMED_TODAY")
                }
                ProgressionError::InvalidLevelTable(_) => {
                    (StatusCode::BAD_REQUEST, "INVALID_LEVEL_TABLE")
                }
                ProgressionError::InvalidActivityRules(_) => {
                    (StatusCode::BAD_REQUEST, "INVALID_ACTIVITY_RULES")
                }
                ProgressionError::ViewerNotFound(_) => (StatusCode::NOT_FOUND, "VIEWER_NOT_FOUND"),
                ProgressionError::InvalidViewer(_) => (StatusCode::BAD_REQUEST, "INVALID_VIEWER"),
                ProgressionError::Storage(_) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "STORAGE_ERROR")
                }
            },
            Self::Core(e) => core_status(e),
            Self::Unauthorized => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            Self::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            Self::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            Self::PaymentsDisabled => (StatusCode::SERVICE_UNAVAILABLE, "PAYMENTS_DISABLED"),
            Self::MissingSignature => (StatusCode::BAD_REQUEST, "MISSING_SIGNATURE"),
            Self::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }

    fn user_message(&self) -> String {
        match self {
            Self::License(e) => e.user_message().to_string(),
            Self::Progression(e) => e.user_message(),
            Self::Core(e) => e.user_message(),
            Self::Internal(_) => "An unexpected error occurred.".into(),
            other => other.to_string(),
        }
    }
}

const fn core_status(err: &CoreError) -> (StatusCode, &'static str) {
    match err {
        CoreError::InvalidFormat(_) => (StatusCode::BAD_REQUEST, "INVALID_FORMAT"),
        CoreError::UnknownLicenseType(_) => (StatusCode::BAD_REQUEST, "UNKNOWN_LICENSE_TYPE"),
        CoreError::UnknownChannel(_) => (StatusCode::NOT_FOUND, "UNKNOWN_CHANNEL"),
        CoreError::Json(_) => (StatusCode::BAD_REQUEST, "INVALID_JSON"),
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        if status.is_server_error() {
            tracing::error!(error = %self, code, "Request failed");
        } else {
            tracing::debug!(error = %self, code, "Request refused");
        }

        (
            status,
            Json(ErrorResponse {
                error: self.user_message(),
                code: code.into(),
            }),
        )
            .into_response()
    }
}
