//! Progression Models
//!
//! Level thresholds, activity rules and the configuration bundle an
//! administrator edits at runtime.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::error::{ProgressionError, Result};
use crate::levels::LevelTable;

/// One row of the level table
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelThreshold {
    /// Level index, 1-based
    pub level: u32,

    /// Points needed to reach this level
    pub required_points: u64,

    /// Features unlocked on reaching this level
    #[serde(default)]
    pub features: BTreeSet<String>,

    /// Name shown to viewers (e.g., "Regular")
    pub display_name: String,
}

impl LevelThreshold {
    pub fn new(
        level: u32,
        required_points: u64,
        display_name: impl Into<String>,
        features: &[&str],
    ) -> Self {
        Self {
            level,
            required_points,
            features: features.iter().map(|f| (*f).to_string()).collect(),
            display_name: display_name.into(),
        }
    }
}

/// Points awarded for one kind of viewer activity
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityRule {
    /// Activity identifier (e.g., "chat_message")
    pub activity_type: String,

    /// Points per award; negative values are penalties
    pub points_awarded: i64,

    pub enabled: bool,

    /// At most one award per calendar day
    pub daily_cap: bool,
}

impl ActivityRule {
    pub fn new(activity_type: impl Into<String>, points_awarded: i64, daily_cap: bool) -> Self {
        Self {
            activity_type: activity_type.into(),
            points_awarded,
            enabled: true,
            daily_cap,
        }
    }
}

/// Validated set of activity rules keyed by activity type
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<ActivityRule>", into = "Vec<ActivityRule>")]
pub struct ActivityRules {
    rules: BTreeMap<String, ActivityRule>,
}

impl ActivityRules {
    /// Build from a list, rejecting blank or duplicate activity types
    pub fn new(rules: Vec<ActivityRule>) -> Result<Self> {
        let mut by_type = BTreeMap::new();
        for rule in rules {
            let activity_type = rule.activity_type.trim().to_string();
            if activity_type.is_empty() {
                return Err(ProgressionError::InvalidActivityRules(
                    "activity type cannot be blank".into(),
                ));
            }
            if by_type.contains_key(&activity_type) {
                return Err(ProgressionError::InvalidActivityRules(format!(
                    "activity '{activity_type}' is defined twice"
                )));
            }
            by_type.insert(activity_type.clone(), ActivityRule { activity_type, ..rule });
        }
        Ok(Self { rules: by_type })
    }

    pub fn get(&self, activity_type: &str) -> Option<&ActivityRule> {
        self.rules.get(activity_type)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ActivityRule> {
        self.rules.values()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl Default for ActivityRules {
    fn default() -> Self {
        let rules = [
            ActivityRule::new("chat_message", 2, false),
            ActivityRule::new("watch_stream", 5, false),
            ActivityRule::new("daily_login", 5, true),
            ActivityRule::new("share_stream", 10, true),
            ActivityRule::new("follow", 25, true),
        ];
        Self {
            rules: rules
                .into_iter()
                .map(|rule| (rule.activity_type.clone(), rule))
                .collect(),
        }
    }
}

impl TryFrom<Vec<ActivityRule>> for ActivityRules {
    type Error = ProgressionError;

    fn try_from(rules: Vec<ActivityRule>) -> Result<Self> {
        Self::new(rules)
    }
}

impl From<ActivityRules> for Vec<ActivityRule> {
    fn from(rules: ActivityRules) -> Self {
        rules.rules.into_values().collect()
    }
}

/// Everything an administrator can tune about progression
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressionConfig {
    pub levels: LevelTable,
    pub activities: ActivityRules,
}
