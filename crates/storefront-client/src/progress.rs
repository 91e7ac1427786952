//! Viewer Progress Cache
//!
//! The server owns point totals. The tracker checks the local copy first
//! so obviously refused activities never leave the device, asks the server,
//! and adopts whatever total it reports. When the server cannot be reached
//! the award is applied locally and marked unconfirmed.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use storefront_core::{Clock, Viewer, ViewerId};
use storefront_progression::{
    AwardResponse, ProgressionConfig, ProgressionError, ViewerProgress, award_activity, progress,
};

use crate::error::{ClientError, Result};

const DEFAULT_AWARD_TIMEOUT: Duration = Duration::from_secs(5);

/// Server's answer to an activity submission
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RemoteAward {
    Accepted(AwardResponse),
    /// The server answered and refused; `code` is the error code it sent
    Refused { code: String, message: String },
    Unavailable { detail: String },
}

/// Server side of viewer progress
#[async_trait]
pub trait ProgressRemote: Send + Sync {
    async fn submit_activity(&self, viewer_id: &ViewerId, activity_type: &str) -> RemoteAward;

    async fn fetch_progress(&self, viewer_id: &ViewerId) -> Result<ViewerProgress>;
}

/// Result of recording one activity
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AwardReport {
    pub total_points: u64,
    pub level: u32,
    pub level_name: String,
    pub points_awarded: i64,
    pub leveled_up: bool,
    pub unlocked_features: BTreeSet<String>,
    /// False when the award was only applied locally
    pub confirmed: bool,
}

/// Local view of one viewer's progress
pub struct ProgressTracker {
    viewer: Viewer,
    config: ProgressionConfig,
    remote: Arc<dyn ProgressRemote>,
    clock: Arc<dyn Clock>,
    timeout: Duration,
}

impl ProgressTracker {
    pub fn new(
        viewer: Viewer,
        config: ProgressionConfig,
        remote: Arc<dyn ProgressRemote>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            viewer,
            config,
            remote,
            clock,
            timeout: DEFAULT_AWARD_TIMEOUT,
        }
    }

    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub const fn viewer(&self) -> &Viewer {
        &self.viewer
    }

    pub fn progress(&self) -> ViewerProgress {
        progress(&self.viewer, &self.config.levels)
    }

    /// Adopt an updated level table or rule set
    pub fn set_config(&mut self, config: ProgressionConfig) {
        self.config = config;
    }

    /// Record an activity.
    ///
    /// Refusals the local rules can already predict are returned without
    /// contacting the server.
    pub async fn record(&mut self, activity_type: &str) -> Result<AwardReport> {
        let today = self.clock.today();

        let mut local = self.viewer.clone();
        let predicted = award_activity(
            &mut local,
            activity_type,
            &self.config.activities,
            today,
            &self.config.levels,
        )?;

        let answer = tokio::time::timeout(
            self.timeout,
            self.remote.submit_activity(&self.viewer.id, activity_type),
        )
        .await
        .unwrap_or_else(|_| RemoteAward::Unavailable {
            detail: format!("no answer within {:?}", self.timeout),
        });

        match answer {
            RemoteAward::Accepted(response) => {
                let previous_level = self.config.levels.level_for(self.viewer.points).level;
                self.viewer.points = response.total_points;
                self.viewer
                    .last_activity_by_type
                    .insert(activity_type.to_string(), today);

                let reached = self.config.levels.level_for(response.total_points);
                Ok(AwardReport {
                    total_points: response.total_points,
                    level: reached.level,
                    level_name: reached.display_name.clone(),
                    points_awarded: response.points_awarded,
                    leveled_up: response.leveled_up || reached.level > previous_level,
                    unlocked_features: self.config.levels.unlocked_features(response.total_points),
                    confirmed: true,
                })
            }
            RemoteAward::Refused { code, message } => {
                let err = self.refusal(activity_type, today, &code, message);
                if matches!(
                    err,
                    ClientError::Progression(ProgressionError::AlreadyClaimedToday { .. })
                ) {
                    self.viewer
                        .last_activity_by_type
                        .insert(activity_type.to_string(), today);
                }
                Err(err)
            }
            RemoteAward::Unavailable { detail } => {
                tracing::warn!(
                    viewer_id = %self.viewer.id,
                    activity_type = %activity_type,
                    detail = %detail,
                    "Progress server unavailable; applied award locally"
                );
                self.viewer = local;
                Ok(AwardReport {
                    total_points: predicted.points,
                    level: predicted.level,
                    level_name: predicted.level_name,
                    points_awarded: predicted.points_awarded,
                    leveled_up: predicted.leveled_up,
                    unlocked_features: predicted.unlocked_features,
                    confirmed: false,
                })
            }
        }
    }

    /// Replace the cached total with the server's
    pub async fn refresh(&mut self) -> Result<ViewerProgress> {
        let remote = tokio::time::timeout(self.timeout, self.remote.fetch_progress(&self.viewer.id))
            .await
            .map_err(|_| ClientError::Timeout("progress refresh".into()))??;

        if remote.points != self.viewer.points {
            tracing::debug!(
                viewer_id = %self.viewer.id,
                local = self.viewer.points,
                server = remote.points,
                "Adopting server point total"
            );
            self.viewer.points = remote.points;
        }
        Ok(self.progress())
    }

    fn refusal(
        &self,
        activity_type: &str,
        day: chrono::NaiveDate,
        code: &str,
        message: String,
    ) -> ClientError {
        let activity_type = activity_type.to_string();
        match code {
            "ALREADY_CLAIMED_TODAY" => {
                ProgressionError::AlreadyClaimedToday { activity_type, day }.into()
            }
            "ACTIVITY_DISABLED" => ProgressionError::ActivityDisabled(activity_type).into(),
            "UNKNOWN_ACTIVITY" => ProgressionError::UnknownActivity(activity_type).into(),
            "VIEWER_NOT_FOUND" => {
                ProgressionError::ViewerNotFound(self.viewer.id.to_string()).into()
            }
            _ => ClientError::RejectedByServer { reason: message },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use storefront_core::FixedClock;

    struct ScriptedRemote {
        answers: Mutex<Vec<RemoteAward>>,
        calls: AtomicUsize,
    }

    impl ScriptedRemote {
        fn new(answers: Vec<RemoteAward>) -> Arc<Self> {
            Arc::new(Self {
                answers: Mutex::new(answers),
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ProgressRemote for ScriptedRemote {
        async fn submit_activity(
            &self,
            _viewer_id: &ViewerId,
            _activity_type: &str,
        ) -> RemoteAward {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut answers = self.answers.lock().unwrap();
            if answers.is_empty() {
                RemoteAward::Unavailable {
                    detail: "script exhausted".into(),
                }
            } else {
                answers.remove(0)
            }
        }

        async fn fetch_progress(&self, _viewer_id: &ViewerId) -> Result<ViewerProgress> {
            Err(ClientError::Timeout("not scripted".into()))
        }
    }

    fn clock() -> Arc<FixedClock> {
        let now = DateTime::parse_from_rfc3339("2026-05-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        Arc::new(FixedClock::new(now))
    }

    fn accepted(total_points: u64, points_awarded: i64) -> RemoteAward {
        RemoteAward::Accepted(AwardResponse {
            total_points,
            level: 1,
            level_name: "Newcomer".into(),
            points_awarded,
            leveled_up: false,
        })
    }

    fn tracker(remote: Arc<ScriptedRemote>) -> ProgressTracker {
        let viewer = Viewer::new("ana", "ana@example.com", Utc::now());
        ProgressTracker::new(viewer, ProgressionConfig::default(), remote, clock())
    }

    #[tokio::test]
    async fn test_server_total_is_adopted() {
        let remote = ScriptedRemote::new(vec![accepted(120, 2)]);
        let mut tracker = tracker(remote);

        let report = tracker.record("chat_message").await.unwrap();
        assert!(report.confirmed);
        assert_eq!(report.total_points, 120);
        assert_eq!(report.level, 2);
        assert!(report.leveled_up);
        assert_eq!(tracker.viewer().points, 120);
    }

    #[tokio::test]
    async fn test_locally_capped_activity_not_sent() {
        let remote = ScriptedRemote::new(vec![accepted(10, 10)]);
        let mut tracker = tracker(remote.clone());

        tracker.record("share_stream").await.unwrap();
        let second = tracker.record("share_stream").await;

        assert!(matches!(
            second,
            Err(ClientError::Progression(ProgressionError::AlreadyClaimedToday { .. }))
        ));
        assert_eq!(remote.calls(), 1);
    }

    #[tokio::test]
    async fn test_server_refusal_is_mapped() {
        let remote = ScriptedRemote::new(vec![RemoteAward::Refused {
            code: "ALREADY_CLAIMED_TODAY".into(),
            message: "already claimed".into(),
        }]);
        let mut tracker = tracker(remote.clone());

        let result = tracker.record("follow").await;
        assert!(matches!(
            result,
            Err(ClientError::Progression(ProgressionError::AlreadyClaimedToday { .. }))
        ));
        assert_eq!(tracker.viewer().points, 0);

        // Remembered locally, so the retry never leaves the device
        assert!(tracker.record("follow").await.is_err());
        assert_eq!(remote.calls(), 1);
    }

    #[tokio::test]
    async fn test_unavailable_applies_locally() {
        let remote = ScriptedRemote::new(vec![]);
        let mut tracker = tracker(remote);

        let report = tracker.record("watch_stream").await.unwrap();
        assert!(!report.confirmed);
        assert_eq!(report.total_points, 5);
        assert_eq!(tracker.viewer().points, 5);
    }

    #[tokio::test]
    async fn test_unknown_activity_fails_fast() {
        let remote = ScriptedRemote::new(vec![]);
        let mut tracker = tracker(remote.clone());

        let result = tracker.record("teleport").await;
        assert!(matches!(
            result,
            Err(ClientError::Progression(ProgressionError::UnknownActivity(_)))
        ));
        assert_eq!(remote.calls(), 0);
    }

    #[tokio::test]
    async fn test_refresh_timeout_keeps_cache() {
        let mut tracker = tracker(ScriptedRemote::new(vec![]));
        tracker.record("chat_message").await.unwrap();

        assert!(tracker.refresh().await.is_err());
        assert_eq!(tracker.viewer().points, 2);
    }
}
