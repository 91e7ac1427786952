//! Leaderboard Aggregator
//!
//! Pure read-side projection over viewers. Recomputed from scratch on every
//! request.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use storefront_core::{Viewer, ViewerId};

use crate::levels::LevelTable;

/// Default number of ranked entries
pub const DEFAULT_MAX_ENTRIES: usize = 50;

/// One ranked row
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub rank: usize,
    pub viewer_id: ViewerId,
    pub username: String,
    pub points: u64,
    pub level: u32,
}

/// Ranked viewers.
///
/// Ordering is computed once; entries are produced lazily by [`Self::iter`],
/// which can be called any number of times.
#[derive(Clone, Debug)]
pub struct Leaderboard<'a> {
    ranked: Vec<&'a Viewer>,
    table: &'a LevelTable,
}

/// Rank `viewers` by points, ties going to the older account, then by id.
pub fn rank<'a>(
    viewers: &'a [Viewer],
    table: &'a LevelTable,
    max_entries: usize,
) -> Leaderboard<'a> {
    let mut ranked: Vec<&Viewer> = viewers.iter().collect();
    ranked.sort_by(|a, b| {
        b.points
            .cmp(&a.points)
            .then(a.created_at.cmp(&b.created_at))
            .then_with(|| a.id.cmp(&b.id))
    });
    ranked.truncate(max_entries);

    Leaderboard { ranked, table }
}

impl<'a> Leaderboard<'a> {
    pub fn iter(&self) -> impl Iterator<Item = LeaderboardEntry> + '_ {
        self.ranked.iter().enumerate().map(|(i, viewer)| LeaderboardEntry {
            rank: i + 1,
            viewer_id: viewer.id.clone(),
            username: viewer.username.clone(),
            points: viewer.points,
            level: self.table.level_for(viewer.points).level,
        })
    }

    pub fn len(&self) -> usize {
        self.ranked.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranked.is_empty()
    }
}

/// Aggregate numbers shown next to the leaderboard
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardStats {
    pub total_viewers: usize,
    pub total_points: u64,
    pub average_points: f64,
    pub top_points: u64,
    /// Level -> number of viewers at that level
    pub level_distribution: BTreeMap<u32, usize>,
}

impl LeaderboardStats {
    pub fn collect(viewers: &[Viewer], table: &LevelTable) -> Self {
        let mut stats = Self {
            total_viewers: viewers.len(),
            ..Self::default()
        };

        for viewer in viewers {
            stats.total_points = stats.total_points.saturating_add(viewer.points);
            stats.top_points = stats.top_points.max(viewer.points);
            *stats
                .level_distribution
                .entry(table.level_for(viewer.points).level)
                .or_default() += 1;
        }

        if !viewers.is_empty() {
            #[allow(clippy::cast_precision_loss)]
            let average = stats.total_points as f64 / viewers.len() as f64;
            stats.average_points = average;
        }

        stats
    }
}
