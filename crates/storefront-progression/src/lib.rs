//! # storefront-progression
//!
//! Turns viewer activity into points, points into levels, and levels into
//! unlocked features.
//!
//! ## Rules
//!
//! - **Levels are derived** - a viewer's level is recomputed from its point
//!   total against the current table on every read, so table edits apply
//!   retroactively and consistently
//! - **Thresholds are compared by points** - lookups never trust the order
//!   of the table
//! - **Daily caps are atomic** - the cap check and the award happen under
//!   one per-viewer lock
//!
//! ## Example: default table
//!
//! ```text
//! ┌───────┬──────────┬────────────┬───────────────────────────────┐
//! │ Level │  Points  │ Name       │ Unlocks                       │
//! ├───────┼──────────┼────────────┼───────────────────────────────┤
//! │   1   │     0    │ Newcomer   │ chat                          │
//! │   2   │   100    │ Regular    │ custom_emotes                 │
//! │   3   │   250    │ Supporter  │ chat_color                    │
//! │   4   │   500    │ Champion   │ highlighted_messages          │
//! │   5   │  1000    │ Legend     │ song_requests, exclusive_badge│
//! └───────┴──────────┴────────────┴───────────────────────────────┘
//! ```

pub mod award;
pub mod error;
pub mod leaderboard;
pub mod levels;
pub mod model;
pub mod viewers;

pub use award::{
    AwardOutcome, AwardResponse, ViewerProgress, award_activity, correct_points, progress,
};
pub use error::{ProgressionError, Result};
pub use leaderboard::{DEFAULT_MAX_ENTRIES, Leaderboard, LeaderboardEntry, LeaderboardStats, rank};
pub use levels::{LevelTable, level_for};
pub use model::{ActivityRule, ActivityRules, LevelThreshold, ProgressionConfig};
pub use viewers::{MemoryViewerStore, ViewerStore};
