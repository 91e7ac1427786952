//! Error Types for the Progression Engine

use chrono::NaiveDate;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ProgressionError>;

#[derive(Error, Debug)]
pub enum ProgressionError {
    #[error("Unknown activity: {0}")]
    UnknownActivity(String),

    #[error("Activity disabled: {0}")]
    ActivityDisabled(String),

    #[error("Activity {activity_type} already claimed on {day}")]
    AlreadyClaimedToday {
        activity_type: String,
        day: NaiveDate,
    },

    #[error("Invalid level table: {0}")]
    InvalidLevelTable(String),

    #[error("Invalid activity rules: {0}")]
    InvalidActivityRules(String),

    #[error("Viewer not found: {0}")]
    ViewerNotFound(String),

    #[error("Invalid viewer: {0}")]
    InvalidViewer(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl ProgressionError {
    /// Expected outcomes of a well-behaved request, not system faults
    pub const fn is_expected(&self) -> bool {
        matches!(
            self,
            Self::ActivityDisabled(_) | Self::AlreadyClaimedToday { .. }
        )
    }

    pub fn user_message(&self) -> String {
        match self {
            Self::UnknownActivity(activity) => format!("'{activity}' does not earn points."),
            Self::ActivityDisabled(_) => "This activity is not earning points right now.".into(),
            Self::AlreadyClaimedToday { .. } => "You already earned points for this today.".into(),
            Self::ViewerNotFound(_) => "Viewer not found.".into(),
            Self::InvalidViewer(msg) => msg.clone(),
            Self::InvalidLevelTable(msg) | Self::InvalidActivityRules(msg) => msg.clone(),
            Self::Storage(_) => "An unexpected error occurred.".into(),
        }
    }
}
