//! Licensing Error Types

use storefront_core::CoreError;
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, LicenseError>;

/// Entitlement store errors
#[derive(Error, Debug)]
pub enum LicenseError {
    /// License not found
    #[error("License not found: {0}")]
    NotFound(String),

    /// Issue request violates a license invariant
    #[error("Invalid license request: {0}")]
    InvalidRequest(String),

    /// Malformed key or type
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Stripe API error
    #[error("Stripe error: {0}")]
    Stripe(String),

    /// Webhook signature verification failed
    #[error("Webhook signature invalid: {0}")]
    WebhookSignature(String),

    /// Webhook payload parsing failed
    #[error("Webhook parse error: {0}")]
    WebhookParse(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Storage error
    #[error("Storage error: {0}")]
    Storage(String),
}

impl LicenseError {
    /// Check if this error is retryable
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Stripe(_) | Self::Storage(_))
    }

    /// Get user-friendly message
    pub const fn user_message(&self) -> &str {
        match self {
            Self::NotFound(_) => "License key not found.",
            Self::InvalidRequest(_) => "That license cannot be issued.",
            Self::Core(_) => "The license key is not in the expected format.",
            Self::Stripe(_) => "Payment processing failed. Please try again.",
            Self::Config(_) => "Service configuration error.",
            _ => "An error occurred processing your request.",
        }
    }
}
