//! Error Types

use thiserror::Error;

/// Result type alias for core operations
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors raised while parsing or validating shared domain values
#[derive(Error, Debug)]
pub enum CoreError {
    /// Input did not match the expected shape (license keys, ids)
    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    /// License type outside of TRIAL / FULL / BASIC / PREMIUM
    #[error("Unknown license type: {0}")]
    UnknownLicenseType(String),

    /// Live channel name not recognised
    #[error("Unknown channel: {0}")]
    UnknownChannel(String),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CoreError {
    /// Convert to a user-friendly message
    pub fn user_message(&self) -> String {
        match self {
            Self::InvalidFormat(_) => "The value you entered is not in the expected format.".into(),
            Self::UnknownLicenseType(kind) => format!("'{kind}' is not a license type."),
            Self::UnknownChannel(name) => format!("'{name}' is not a live channel."),
            Self::Json(_) => "The data could not be read.".into(),
        }
    }
}
