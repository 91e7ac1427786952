//! Level Thresholds
//!
//! [`level_for`] works on any slice of thresholds, ordered or not.
//! [`LevelTable`] is the validated form an administrator can save.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};

use crate::error::{ProgressionError, Result};
use crate::model::LevelThreshold;

/// Highest threshold reached with `points`.
///
/// Thresholds are compared by `required_points`, never by position. Equal
/// `required_points` resolve to the higher `level`. When no threshold is
/// reached the lowest one is returned; `None` only for an empty slice.
pub fn level_for(points: u64, thresholds: &[LevelThreshold]) -> Option<&LevelThreshold> {
    let by_points_then_level = |a: &&LevelThreshold, b: &&LevelThreshold| {
        a.required_points
            .cmp(&b.required_points)
            .then(a.level.cmp(&b.level))
    };

    thresholds
        .iter()
        .filter(|t| t.required_points <= points)
        .max_by(by_points_then_level)
        .or_else(|| {
            thresholds.iter().min_by(|a, b| {
                a.required_points
                    .cmp(&b.required_points)
                    .then(b.level.cmp(&a.level))
            })
        })
}

/// A total-ordered, non-empty level table
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<LevelThreshold>", into = "Vec<LevelThreshold>")]
pub struct LevelTable {
    thresholds: Vec<LevelThreshold>,
}

impl LevelTable {
    /// Validate and sort a table.
    ///
    /// Levels must be unique, the lowest level must start at 0 points, and
    /// required points must strictly increase with level.
    pub fn new(mut thresholds: Vec<LevelThreshold>) -> Result<Self> {
        if thresholds.is_empty() {
            return Err(ProgressionError::InvalidLevelTable("table is empty".into()));
        }

        let mut seen = HashSet::new();
        for threshold in &thresholds {
            if !seen.insert(threshold.level) {
                return Err(ProgressionError::InvalidLevelTable(format!(
                    "level {} appears more than once",
                    threshold.level
                )));
            }
            if threshold.display_name.trim().is_empty() {
                return Err(ProgressionError::InvalidLevelTable(format!(
                    "level {} has no display name",
                    threshold.level
                )));
            }
        }

        thresholds.sort_by_key(|t| t.level);

        if thresholds[0].required_points != 0 {
            return Err(ProgressionError::InvalidLevelTable(format!(
                "lowest level {} must require 0 points",
                thresholds[0].level
            )));
        }

        for pair in thresholds.windows(2) {
            if pair[1].required_points <= pair[0].required_points {
                return Err(ProgressionError::InvalidLevelTable(format!(
                    "level {} needs more points than level {}",
                    pair[1].level, pair[0].level
                )));
            }
        }

        Ok(Self { thresholds })
    }

    /// Thresholds ordered by level
    pub fn thresholds(&self) -> &[LevelThreshold] {
        &self.thresholds
    }

    /// Threshold reached with `points`
    pub fn level_for(&self, points: u64) -> &LevelThreshold {
        level_for(points, &self.thresholds).unwrap_or(&self.thresholds[0])
    }

    /// Features of every level up to and including the one reached
    pub fn unlocked_features(&self, points: u64) -> BTreeSet<String> {
        let reached = self.level_for(points).level;
        self.thresholds
            .iter()
            .filter(|t| t.level <= reached)
            .flat_map(|t| t.features.iter().cloned())
            .collect()
    }

    /// Points required for the level after the one reached, if any
    pub fn next_threshold(&self, points: u64) -> Option<&LevelThreshold> {
        let reached = self.level_for(points).level;
        self.thresholds.iter().find(|t| t.level > reached)
    }
}

impl Default for LevelTable {
    fn default() -> Self {
        Self {
            thresholds: vec![
                LevelThreshold::new(1, 0, "Newcomer", &["chat"]),
                LevelThreshold::new(2, 100, "Regular", &["custom_emotes"]),
                LevelThreshold::new(3, 250, "Supporter", &["chat_color"]),
                LevelThreshold::new(4, 500, "Champion", &["highlighted_messages"]),
                LevelThreshold::new(5, 1000, "Legend", &["song_requests", "exclusive_badge"]),
            ],
        }
    }
}

impl TryFrom<Vec<LevelThreshold>> for LevelTable {
    type Error = ProgressionError;

    fn try_from(thresholds: Vec<LevelThreshold>) -> Result<Self> {
        Self::new(thresholds)
    }
}

impl From<LevelTable> for Vec<LevelThreshold> {
    fn from(table: LevelTable) -> Self {
        table.thresholds
    }
}
