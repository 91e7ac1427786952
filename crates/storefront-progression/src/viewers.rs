//! Viewer Storage
//!
//! Server-side home of viewer records. Each viewer sits behind its own
//! mutex so the daily-cap check and the award it guards run as one step.

use chrono::{DateTime, NaiveDate, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use storefront_core::{Viewer, ViewerId};

use crate::award::{AwardOutcome, ViewerProgress, award_activity, correct_points};
use crate::error::{ProgressionError, Result};
use crate::model::ProgressionConfig;

/// Viewer storage trait
pub trait ViewerStore: Send + Sync {
    /// Create a viewer with zero points
    fn register(&self, username: &str, email: &str, now: DateTime<Utc>) -> Result<Viewer>;

    fn get(&self, id: &ViewerId) -> Result<Option<Viewer>>;

    /// Snapshot of every viewer
    fn list(&self) -> Result<Vec<Viewer>>;

    /// Atomic cap check + award for one viewer
    fn award(
        &self,
        id: &ViewerId,
        activity_type: &str,
        config: &ProgressionConfig,
        day: NaiveDate,
    ) -> Result<AwardOutcome>;

    /// Administrative point correction
    fn correct_points(
        &self,
        id: &ViewerId,
        new_total: u64,
        reason: &str,
        config: &ProgressionConfig,
    ) -> Result<ViewerProgress>;
}

/// In-memory viewer store
#[derive(Default)]
pub struct MemoryViewerStore {
    viewers: RwLock<HashMap<ViewerId, Arc<Mutex<Viewer>>>>,
}

impl MemoryViewerStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&self, id: &ViewerId) -> Result<Arc<Mutex<Viewer>>> {
        self.viewers
            .read()
            .map_err(|_| poisoned())?
            .get(id)
            .cloned()
            .ok_or_else(|| ProgressionError::ViewerNotFound(id.to_string()))
    }
}

fn poisoned() -> ProgressionError {
    ProgressionError::Storage("viewer store lock poisoned".into())
}

impl ViewerStore for MemoryViewerStore {
    fn register(&self, username: &str, email: &str, now: DateTime<Utc>) -> Result<Viewer> {
        let username = username.trim();
        let email = email.trim();
        if username.is_empty() {
            return Err(ProgressionError::InvalidViewer("Username is required.".into()));
        }
        if !email.contains('@') {
            return Err(ProgressionError::InvalidViewer("A valid email is required.".into()));
        }

        let mut viewers = self.viewers.write().map_err(|_| poisoned())?;
        for existing in viewers.values() {
            let existing = existing.lock().map_err(|_| poisoned())?;
            if existing.username.eq_ignore_ascii_case(username) {
                return Err(ProgressionError::InvalidViewer(format!(
                    "Username '{username}' is taken."
                )));
            }
        }

        let viewer = Viewer::new(username, email, now);
        viewers.insert(viewer.id.clone(), Arc::new(Mutex::new(viewer.clone())));

        tracing::info!(viewer_id = %viewer.id, username = %viewer.username, "Registered viewer");
        Ok(viewer)
    }

    fn get(&self, id: &ViewerId) -> Result<Option<Viewer>> {
        let entry = match self.entry(id) {
            Ok(entry) => entry,
            Err(ProgressionError::ViewerNotFound(_)) => return Ok(None),
            Err(e) => return Err(e),
        };
        let viewer = entry.lock().map_err(|_| poisoned())?.clone();
        Ok(Some(viewer))
    }

    fn list(&self) -> Result<Vec<Viewer>> {
        let viewers = self.viewers.read().map_err(|_| poisoned())?;
        viewers
            .values()
            .map(|entry| entry.lock().map(|v| v.clone()).map_err(|_| poisoned()))
            .collect()
    }

    fn award(
        &self,
        id: &ViewerId,
        activity_type: &str,
        config: &ProgressionConfig,
        day: NaiveDate,
    ) -> Result<AwardOutcome> {
        let entry = self.entry(id)?;
        let mut viewer = entry.lock().map_err(|_| poisoned())?;
        award_activity(&mut viewer, activity_type, &config.activities, day, &config.levels)
    }

    fn correct_points(
        &self,
        id: &ViewerId,
        new_total: u64,
        reason: &str,
        config: &ProgressionConfig,
    ) -> Result<ViewerProgress> {
        let entry = self.entry(id)?;
        let mut viewer = entry.lock().map_err(|_| poisoned())?;
        Ok(correct_points(&mut viewer, new_total, reason, &config.levels))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 5, 1).unwrap()
    }

    #[test]
    fn test_register_and_get() {
        let store = MemoryViewerStore::new();
        let viewer = store.register("ana", "ana@example.com", Utc::now()).unwrap();

        let loaded = store.get(&viewer.id).unwrap().unwrap();
        assert_eq!(loaded.username, "ana");
        assert_eq!(loaded.points, 0);
        assert!(store.get(&ViewerId::new()).unwrap().is_none());
    }

    #[test]
    fn test_register_validation() {
        let store = MemoryViewerStore::new();
        store.register("ana", "ana@example.com", Utc::now()).unwrap();

        assert!(store.register("ANA", "other@example.com", Utc::now()).is_err());
        assert!(store.register("  ", "x@example.com", Utc::now()).is_err());
        assert!(store.register("ben", "not-an-email", Utc::now()).is_err());
    }

    #[test]
    fn test_award_unknown_viewer() {
        let store = MemoryViewerStore::new();
        let config = ProgressionConfig::default();
        let result = store.award(&ViewerId::new(), "chat_message", &config, today());
        assert!(matches!(result, Err(ProgressionError::ViewerNotFound(_))));
    }

    #[test]
    fn test_concurrent_capped_awards_apply_once() {
        let store = MemoryViewerStore::new();
        let config = ProgressionConfig::default();
        let viewer = store.register("ana", "ana@example.com", Utc::now()).unwrap();

        let accepted = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..16)
                .map(|_| {
                    scope.spawn(|| {
                        store
                            .award(&viewer.id, "share_stream", &config, today())
                            .is_ok()
                    })
                })
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().unwrap())
                .filter(|ok| *ok)
                .count()
        });

        assert_eq!(accepted, 1);
        assert_eq!(store.get(&viewer.id).unwrap().unwrap().points, 10);
    }

    #[test]
    fn test_correction() {
        let store = MemoryViewerStore::new();
        let config = ProgressionConfig::default();
        let viewer = store.register("ana", "ana@example.com", Utc::now()).unwrap();

        let progress = store.correct_points(&viewer.id, 260, "giveaway", &config).unwrap();
        assert_eq!(progress.level, 3);
        assert_eq!(store.get(&viewer.id).unwrap().unwrap().points, 260);
    }
}
