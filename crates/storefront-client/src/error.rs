//! Client Error Types

use storefront_core::CoreError;
use storefront_progression::ProgressionError;
use thiserror::Error;

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, ClientError>;

/// Client error types
#[derive(Error, Debug)]
pub enum ClientError {
    /// Input failed local validation; nothing was sent
    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    /// The server looked at the key and refused it
    #[error("Rejected by server: {reason}")]
    RejectedByServer { reason: String },

    /// The server could not be asked or did not answer in time
    #[error("Verification unavailable: {0}")]
    VerificationUnavailable(String),

    /// The cached record failed validation
    #[error("Corrupted local state: {0}")]
    CorruptedLocalState(String),

    /// Progression rule refused the award
    #[error(transparent)]
    Progression(#[from] ProgressionError),

    /// A request got no answer in time
    #[error("Timed out: {0}")]
    Timeout(String),

    /// The server sent something the client cannot follow
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Durable storage failed
    #[error("Storage error: {0}")]
    Storage(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Transport error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Generic IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ClientError {
    /// Worth retrying later without different input
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::VerificationUnavailable(_)
                | Self::Timeout(_)
                | Self::Protocol(_)
                | Self::Http(_)
                | Self::Io(_)
                | Self::Storage(_)
        )
    }

    /// Convert to a user-friendly message
    pub fn user_message(&self) -> String {
        match self {
            Self::InvalidFormat(_) => {
                "License keys look like FULL-XXXXX-XXXXX-XXXXX. Please check the key.".into()
            }
            Self::RejectedByServer { reason } => format!("This key was not accepted: {reason}."),
            Self::VerificationUnavailable(_) => concat!(
                "We couldn't reach the license server. ",
                "Your current access is unchanged; please try again later."
            )
            .into(),
            Self::Progression(e) => e.user_message(),
            _ => "An unexpected error occurred.".into(),
        }
    }
}

impl From<CoreError> for ClientError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Json(e) => Self::Json(e),
            other => Self::InvalidFormat(other.to_string()),
        }
    }
}
