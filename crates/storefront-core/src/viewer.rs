//! Viewer Records
//!
//! A viewer stores its point total and the day each activity was last
//! claimed. Level and unlocked features are always derived from `points`
//! against the current threshold table and are never stored here.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Unique viewer identifier
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ViewerId(String);

impl ViewerId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ViewerId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ViewerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A registered viewer
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Viewer {
    pub id: ViewerId,

    pub username: String,

    pub email: String,

    /// Accumulated points
    pub points: u64,

    /// Activity type -> day it was last awarded
    #[serde(default)]
    pub last_activity_by_type: HashMap<String, NaiveDate>,

    /// Registration timestamp, used for leaderboard tie-breaks
    pub created_at: DateTime<Utc>,
}

impl Viewer {
    /// Register a new viewer with zero points
    pub fn new(
        username: impl Into<String>,
        email: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: ViewerId::new(),
            username: username.into(),
            email: email.into(),
            points: 0,
            last_activity_by_type: HashMap::new(),
            created_at,
        }
    }

    /// Day the activity was last awarded, if ever
    pub fn last_claimed(&self, activity_type: &str) -> Option<NaiveDate> {
        self.last_activity_by_type.get(activity_type).copied()
    }
}
