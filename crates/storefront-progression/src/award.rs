//! Awarding Points
//!
//! Applies one activity to one viewer. Callers that share viewers across
//! threads must serialize calls per viewer (see [`crate::viewers`]).

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use storefront_core::{Viewer, ViewerId};

use crate::error::{ProgressionError, Result};
use crate::levels::LevelTable;
use crate::model::ActivityRules;

/// What an accepted award did
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AwardOutcome {
    /// Point total after the award
    pub points: u64,
    pub level: u32,
    pub level_name: String,
    /// Rule value applied (negative for penalties)
    pub points_awarded: i64,
    pub previous_level: u32,
    pub leveled_up: bool,
    pub unlocked_features: BTreeSet<String>,
}

/// Body returned by `POST /viewer/activity/{viewer_id}`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AwardResponse {
    pub total_points: u64,
    pub level: u32,
    pub level_name: String,
    pub points_awarded: i64,
    pub leveled_up: bool,
}

impl From<AwardOutcome> for AwardResponse {
    fn from(outcome: AwardOutcome) -> Self {
        Self {
            total_points: outcome.points,
            level: outcome.level,
            level_name: outcome.level_name,
            points_awarded: outcome.points_awarded,
            leveled_up: outcome.leveled_up,
        }
    }
}

/// Read-side view of a viewer's standing
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewerProgress {
    pub viewer_id: ViewerId,
    pub username: String,
    pub points: u64,
    pub level: u32,
    pub level_name: String,
    pub unlocked_features: BTreeSet<String>,
    /// Points needed for the next level, None at the top
    pub next_level_points: Option<u64>,
}

/// Current standing of `viewer` against `table`
pub fn progress(viewer: &Viewer, table: &LevelTable) -> ViewerProgress {
    let reached = table.level_for(viewer.points);
    ViewerProgress {
        viewer_id: viewer.id.clone(),
        username: viewer.username.clone(),
        points: viewer.points,
        level: reached.level,
        level_name: reached.display_name.clone(),
        unlocked_features: table.unlocked_features(viewer.points),
        next_level_points: table.next_threshold(viewer.points).map(|t| t.required_points),
    }
}

/// Award `activity_type` to `viewer` for `clock_day`.
///
/// Disabled and already-claimed activities leave the viewer untouched.
/// Penalties go through the same enabled and cap checks as rewards, and the
/// point total saturates at zero.
pub fn award_activity(
    viewer: &mut Viewer,
    activity_type: &str,
    rules: &ActivityRules,
    clock_day: NaiveDate,
    table: &LevelTable,
) -> Result<AwardOutcome> {
    let rule = rules
        .get(activity_type)
        .ok_or_else(|| ProgressionError::UnknownActivity(activity_type.to_string()))?;

    if !rule.enabled {
        return Err(ProgressionError::ActivityDisabled(activity_type.to_string()));
    }

    if rule.daily_cap && viewer.last_claimed(activity_type) == Some(clock_day) {
        return Err(ProgressionError::AlreadyClaimedToday {
            activity_type: activity_type.to_string(),
            day: clock_day,
        });
    }

    let previous_level = table.level_for(viewer.points).level;

    viewer.points = viewer.points.saturating_add_signed(rule.points_awarded);
    viewer
        .last_activity_by_type
        .insert(activity_type.to_string(), clock_day);

    let reached = table.level_for(viewer.points);
    let leveled_up = reached.level > previous_level;

    if leveled_up {
        tracing::info!(
            viewer_id = %viewer.id,
            from = previous_level,
            to = reached.level,
            "Viewer leveled up"
        );
    }

    Ok(AwardOutcome {
        points: viewer.points,
        level: reached.level,
        level_name: reached.display_name.clone(),
        points_awarded: rule.points_awarded,
        previous_level,
        leveled_up,
        unlocked_features: table.unlocked_features(viewer.points),
    })
}

/// Administrative correction: set the point total directly.
///
/// The only path besides penalty rules that may lower a viewer's points.
pub fn correct_points(
    viewer: &mut Viewer,
    new_total: u64,
    reason: &str,
    table: &LevelTable,
) -> ViewerProgress {
    tracing::warn!(
        viewer_id = %viewer.id,
        from = viewer.points,
        to = new_total,
        reason = %reason,
        "Administrative point correction"
    );
    viewer.points = new_total;
    progress(viewer, table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ActivityRule, LevelThreshold};
    use chrono::Utc;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 5, d).unwrap()
    }

    fn viewer() -> Viewer {
        Viewer::new("nightowl", "owl@example.com", Utc::now())
    }

    #[test]
    fn test_chat_and_share_scenario() {
        let table = LevelTable::default();
        let rules = ActivityRules::default();
        let mut v = viewer();

        for _ in 0..10 {
            award_activity(&mut v, "chat_message", &rules, day(1), &table).unwrap();
        }
        assert_eq!(v.points, 20);
        assert_eq!(table.level_for(v.points).level, 1);

        let first = award_activity(&mut v, "share_stream", &rules, day(1), &table).unwrap();
        assert_eq!(first.points_awarded, 10);
        let second = award_activity(&mut v, "share_stream", &rules, day(1), &table);
        assert!(matches!(second, Err(ProgressionError::AlreadyClaimedToday { .. })));
        assert_eq!(v.points, 30);
    }

    #[test]
    fn test_daily_cap_resets_next_day() {
        let table = LevelTable::default();
        let rules = ActivityRules::default();
        let mut v = viewer();

        award_activity(&mut v, "share_stream", &rules, day(1), &table).unwrap();
        award_activity(&mut v, "share_stream", &rules, day(2), &table).unwrap();
        assert_eq!(v.points, 20);
        assert_eq!(v.last_claimed("share_stream"), Some(day(2)));
    }

    #[test]
    fn test_disabled_activity_rejected() {
        let table = LevelTable::default();
        let mut rule = ActivityRule::new("chat_message", 2, false);
        rule.enabled = false;
        let rules = ActivityRules::new(vec![rule]).unwrap();
        let mut v = viewer();

        let result = award_activity(&mut v, "chat_message", &rules, day(1), &table);
        assert!(matches!(result, Err(ProgressionError::ActivityDisabled(_))));
        assert_eq!(v.points, 0);
        assert!(v.last_claimed("chat_message").is_none());
    }

    #[test]
    fn test_unknown_activity_rejected() {
        let mut v = viewer();
        let result = award_activity(
            &mut v,
            "teleport",
            &ActivityRules::default(),
            day(1),
            &LevelTable::default(),
        );
        assert!(matches!(result, Err(ProgressionError::UnknownActivity(_))));
    }

    #[test]
    fn test_penalty_respects_cap_and_floor() {
        let table = LevelTable::default();
        let rules = ActivityRules::new(vec![
            ActivityRule::new("chat_message", 2, false),
            ActivityRule::new("spam_warning", -5, true),
        ])
        .unwrap();
        let mut v = viewer();
        v.points = 3;

        let outcome = award_activity(&mut v, "spam_warning", &rules, day(1), &table).unwrap();
        assert_eq!(outcome.points, 0);
        assert_eq!(outcome.points_awarded, -5);

        let again = award_activity(&mut v, "spam_warning", &rules, day(1), &table);
        assert!(matches!(again, Err(ProgressionError::AlreadyClaimedToday { .. })));
    }

    #[test]
    fn test_level_up_on_exact_boundary() {
        let table = LevelTable::new(vec![
            LevelThreshold::new(1, 0, "Newcomer", &[]),
            LevelThreshold::new(2, 10, "Regular", &["custom_emotes"]),
        ])
        .unwrap();
        let rules = ActivityRules::default();
        let mut v = viewer();
        v.points = 8;

        let outcome = award_activity(&mut v, "chat_message", &rules, day(1), &table).unwrap();
        assert_eq!(outcome.points, 10);
        assert_eq!(outcome.previous_level, 1);
        assert_eq!(outcome.level, 2);
        assert!(outcome.leveled_up);
        assert_eq!(outcome.level_name, "Regular");
        assert!(outcome.unlocked_features.contains("custom_emotes"));

        let next = award_activity(&mut v, "chat_message", &rules, day(1), &table).unwrap();
        assert!(!next.leveled_up);
    }

    #[test]
    fn test_correction_can_lower_points() {
        let table = LevelTable::default();
        let mut v = viewer();
        v.points = 600;

        let corrected = correct_points(&mut v, 150, "chargeback", &table);
        assert_eq!(corrected.points, 150);
        assert_eq!(corrected.level, 2);
        assert_eq!(corrected.next_level_points, Some(250));
    }
}
