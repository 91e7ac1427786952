//! Entitlement State Machine
//!
//! ```text
//! UNINITIALIZED ──initialize──▶ TRIAL_ACTIVE ──7 days──▶ TRIAL_EXPIRED
//!       │                            │                        │
//!       └──────────activate──────────┴────────activate────────┴──▶ FULL_ACTIVE
//! ```
//!
//! Trial state is kept only on the device. Full activation is confirmed by
//! the server before it is recorded. Every transition is saved before the
//! call returns.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use storefront_core::{
    Clock, LicenseKey, LicenseType, VerifyResult, trial_expired, trial_remaining_days,
};

use crate::error::{ClientError, Result};
use crate::storage::EntitlementStorage;
use crate::verifier::LicenseVerifier;

const DEFAULT_VERIFY_TIMEOUT: Duration = Duration::from_secs(5);

/// Lifecycle position of this device's entitlement
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntitlementState {
    Uninitialized,
    TrialActive,
    TrialExpired,
    FullActive,
}

/// The persisted record
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedEntitlement {
    pub license_type: LicenseType,

    /// Set once when the trial starts, never changed
    #[serde(default)]
    pub trial_started_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub activated_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub license_key: Option<LicenseKey>,

    /// Activation was confirmed by the server
    #[serde(default)]
    pub backend_verified: bool,

    /// Client id this device identifies itself with. The server binds a
    /// consumed key to it, so it must survive restarts.
    #[serde(default)]
    pub device_id: Option<String>,
}

impl CachedEntitlement {
    fn trial(now: DateTime<Utc>, device_id: &str) -> Self {
        Self {
            license_type: LicenseType::Trial,
            trial_started_at: Some(now),
            activated_at: None,
            license_key: None,
            backend_verified: false,
            device_id: Some(device_id.to_string()),
        }
    }

    /// Parse and check a stored record
    fn decode(raw: &str) -> Result<Self> {
        let record: Self = serde_json::from_str(raw)
            .map_err(|e| ClientError::CorruptedLocalState(e.to_string()))?;

        if record.license_type.is_trial() {
            if record.trial_started_at.is_none() {
                return Err(ClientError::CorruptedLocalState(
                    "trial record has no start time".into(),
                ));
            }
        } else if record.activated_at.is_none() || record.license_key.is_none() {
            return Err(ClientError::CorruptedLocalState(
                "activated record is missing its key or activation time".into(),
            ));
        }

        Ok(record)
    }

    fn state(&self, now: DateTime<Utc>) -> EntitlementState {
        match (self.license_type, self.trial_started_at) {
            (LicenseType::Trial, Some(started)) if trial_expired(started, now) => {
                EntitlementState::TrialExpired
            }
            (LicenseType::Trial, _) => EntitlementState::TrialActive,
            _ => EntitlementState::FullActive,
        }
    }
}

/// What the UI needs to know about the entitlement
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LicenseStatus {
    pub state: EntitlementState,
    pub license_type: Option<LicenseType>,
    /// Only while on a trial
    pub remaining_days: Option<i64>,
    pub license_key: Option<LicenseKey>,
    pub backend_verified: bool,
    pub activated_at: Option<DateTime<Utc>>,
}

/// Per-device entitlement state machine
pub struct EntitlementClient {
    storage: Arc<dyn EntitlementStorage>,
    verifier: Arc<dyn LicenseVerifier>,
    clock: Arc<dyn Clock>,
    client_id: String,
    verify_timeout: Duration,
    record: Option<CachedEntitlement>,
}

impl EntitlementClient {
    /// Load the cached record.
    ///
    /// A record that fails validation is logged and ignored, leaving the
    /// client uninitialized so [`Self::initialize`] starts a fresh trial.
    /// A device id stored in the record takes precedence over `client_id`.
    pub fn open(
        storage: Arc<dyn EntitlementStorage>,
        verifier: Arc<dyn LicenseVerifier>,
        clock: Arc<dyn Clock>,
        client_id: impl Into<String>,
    ) -> Result<Self> {
        let record = match storage.load()? {
            None => None,
            Some(raw) => match CachedEntitlement::decode(&raw) {
                Ok(record) => Some(record),
                Err(e) => {
                    tracing::warn!(error = %e, "Discarding cached entitlement; will start over");
                    None
                }
            },
        };

        let mut client_id = client_id.into();
        if let Some(stored) = record.as_ref().and_then(|r| r.device_id.as_ref()) {
            if *stored != client_id {
                tracing::debug!(device_id = %stored, "Reusing stored device id");
                client_id.clone_from(stored);
            }
        }

        Ok(Self {
            storage,
            verifier,
            clock,
            client_id,
            verify_timeout: DEFAULT_VERIFY_TIMEOUT,
            record,
        })
    }

    /// Bound on how long activation waits for the server
    #[must_use]
    pub const fn with_verify_timeout(mut self, timeout: Duration) -> Self {
        self.verify_timeout = timeout;
        self
    }

    /// Start a trial unless a record already exists. Idempotent.
    pub fn initialize(&mut self) -> Result<&CachedEntitlement> {
        if self.record.is_none() {
            let record = CachedEntitlement::trial(self.clock.now(), &self.client_id);
            self.persist(record)?;
            tracing::info!(client_id = %self.client_id, "Started trial");
        }

        self.record
            .as_ref()
            .ok_or_else(|| ClientError::Storage("entitlement record missing after save".into()))
    }

    /// Id sent with every verification
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn record(&self) -> Option<&CachedEntitlement> {
        self.record.as_ref()
    }

    pub fn state(&self) -> EntitlementState {
        self.record
            .as_ref()
            .map_or(EntitlementState::Uninitialized, |r| r.state(self.clock.now()))
    }

    /// True only for a trial whose seven days have run out
    pub fn is_expired(&self) -> bool {
        self.state() == EntitlementState::TrialExpired
    }

    /// Days left on the trial; `None` when not on a trial
    pub fn remaining_days(&self) -> Option<i64> {
        let record = self.record.as_ref()?;
        if !record.license_type.is_trial() {
            return None;
        }
        record
            .trial_started_at
            .map(|started| trial_remaining_days(started, self.clock.now()))
    }

    pub fn status(&self) -> LicenseStatus {
        let record = self.record.as_ref();
        LicenseStatus {
            state: self.state(),
            license_type: record.map(|r| r.license_type),
            remaining_days: self.remaining_days(),
            license_key: record.and_then(|r| r.license_key.clone()),
            backend_verified: record.is_some_and(|r| r.backend_verified),
            activated_at: record.and_then(|r| r.activated_at),
        }
    }

    /// Activate a full license.
    ///
    /// The key format is checked before anything is sent. On rejection or
    /// when the server cannot be reached the current state is kept.
    pub async fn activate(&mut self, candidate_key: &str) -> Result<LicenseStatus> {
        let key = LicenseKey::parse_full(candidate_key)
            .map_err(|e| ClientError::InvalidFormat(e.to_string()))?;

        match self.ask_server(&key).await {
            VerifyResult::Valid { license_type } => {
                let now = self.clock.now();
                let record = CachedEntitlement {
                    license_type,
                    trial_started_at: self.record.as_ref().and_then(|r| r.trial_started_at),
                    activated_at: Some(now),
                    license_key: Some(key.clone()),
                    backend_verified: true,
                    device_id: Some(self.client_id.clone()),
                };
                self.persist(record)?;

                tracing::info!(
                    license_key = %key,
                    license_type = %license_type,
                    "License activated"
                );
                Ok(self.status())
            }
            VerifyResult::Rejected { reason } => {
                tracing::info!(
                    license_key = %key,
                    reason = %reason,
                    "License rejected by server"
                );
                Err(ClientError::RejectedByServer { reason })
            }
            VerifyResult::Unavailable { detail } => {
                tracing::warn!(
                    license_key = %key,
                    detail = %detail,
                    "License verification unavailable"
                );
                Err(ClientError::VerificationUnavailable(detail))
            }
        }
    }

    /// Re-confirm a cached full license with the server.
    ///
    /// The answer is reported but never changes the cached record; an
    /// offline device keeps its entitlement.
    pub async fn revalidate(&self) -> Option<VerifyResult> {
        let key = self.record.as_ref()?.license_key.clone()?;
        let result = self.ask_server(&key).await;
        if let VerifyResult::Rejected { reason } = &result {
            tracing::warn!(
                license_key = %key,
                reason = %reason,
                "Cached license no longer accepted by server"
            );
        }
        Some(result)
    }

    async fn ask_server(&self, key: &LicenseKey) -> VerifyResult {
        tokio::time::timeout(self.verify_timeout, self.verifier.verify(key, &self.client_id))
            .await
            .unwrap_or_else(|_| VerifyResult::Unavailable {
                detail: format!("no answer within {:?}", self.verify_timeout),
            })
    }

    /// Save first, then adopt, so memory never runs ahead of disk
    fn persist(&mut self, record: CachedEntitlement) -> Result<()> {
        let raw = serde_json::to_string(&record)?;
        self.storage.save(&raw)?;
        self.record = Some(record);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use async_trait::async_trait;
    use chrono::Duration as ChronoDuration;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use crate::storage::FileStorage;
    use storefront_core::FixedClock;
    use storefront_licensing::{IssueRequest, LicenseStore, MemoryLicenseStore};

    const GOOD_KEY: &str = "FULL-ABCDE-12345-XYZ12";

    struct ScriptedVerifier {
        result: VerifyResult,
        calls: AtomicUsize,
    }

    impl ScriptedVerifier {
        fn new(result: VerifyResult) -> Arc<Self> {
            Arc::new(Self {
                result,
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl LicenseVerifier for ScriptedVerifier {
        async fn verify(&self, _key: &LicenseKey, _client_id: &str) -> VerifyResult {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.result.clone()
        }
    }

    struct SilentVerifier;

    #[async_trait]
    impl LicenseVerifier for SilentVerifier {
        async fn verify(&self, _key: &LicenseKey, _client_id: &str) -> VerifyResult {
            std::future::pending().await
        }
    }

    /// Answers from a real license store, the way the server does
    struct StoreVerifier {
        store: Arc<MemoryLicenseStore>,
        clock: Arc<FixedClock>,
    }

    #[async_trait]
    impl LicenseVerifier for StoreVerifier {
        async fn verify(&self, key: &LicenseKey, client_id: &str) -> VerifyResult {
            self.store
                .verify_and_activate(key, Some(client_id), self.clock.now())
                .unwrap()
                .into()
        }
    }

    fn start() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-01-10T09:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn client(
        storage: &MemoryStorage,
        verifier: Arc<dyn LicenseVerifier>,
        clock: &Arc<FixedClock>,
    ) -> EntitlementClient {
        EntitlementClient::open(Arc::new(storage.clone()), verifier, clock.clone(), "device-1")
            .unwrap()
    }

    fn valid() -> VerifyResult {
        VerifyResult::Valid {
            license_type: LicenseType::Full,
        }
    }

    #[test]
    fn test_initialize_is_idempotent() {
        let storage = MemoryStorage::new();
        let clock = Arc::new(FixedClock::new(start()));
        let mut ent = client(&storage, ScriptedVerifier::new(valid()), &clock);

        assert_eq!(ent.state(), EntitlementState::Uninitialized);
        assert!(!ent.is_expired());

        let first = ent.initialize().unwrap().clone();
        clock.advance(ChronoDuration::days(2));
        let second = ent.initialize().unwrap().clone();

        assert_eq!(first, second);
        assert_eq!(first.trial_started_at, Some(start()));
        assert_eq!(ent.state(), EntitlementState::TrialActive);
    }

    #[test]
    fn test_trial_expiry_boundaries() {
        let storage = MemoryStorage::new();
        let clock = Arc::new(FixedClock::new(start()));
        let mut ent = client(&storage, ScriptedVerifier::new(valid()), &clock);
        ent.initialize().unwrap();

        clock.set(start() + ChronoDuration::days(6));
        assert!(!ent.is_expired());
        assert_eq!(ent.remaining_days(), Some(1));

        clock.set(start() + ChronoDuration::days(7) - ChronoDuration::milliseconds(1));
        assert!(!ent.is_expired());

        clock.set(start() + ChronoDuration::days(7));
        assert!(ent.is_expired());
        assert_eq!(ent.remaining_days(), Some(0));
        assert_eq!(ent.status().state, EntitlementState::TrialExpired);
    }

    #[tokio::test]
    async fn test_bad_format_never_calls_server() {
        let storage = MemoryStorage::new();
        let clock = Arc::new(FixedClock::new(start()));
        let verifier = ScriptedVerifier::new(valid());
        let mut ent = client(&storage, verifier.clone(), &clock);
        ent.initialize().unwrap();

        for candidate in [
            "",
            "FULL-ABCD-12345-XYZ12",
            "PREMIUM-ABCDE-12345-XYZ12",
            "FULL-ABCDE-12345-XYZ1!",
        ] {
            let result = ent.activate(candidate).await;
            assert!(matches!(result, Err(ClientError::InvalidFormat(_))), "{candidate}");
        }
        assert_eq!(verifier.calls(), 0);
        assert_eq!(ent.state(), EntitlementState::TrialActive);
    }

    #[tokio::test]
    async fn test_expired_trial_rejected_then_activated_and_persisted() {
        let storage = MemoryStorage::new();
        let clock = Arc::new(FixedClock::new(start()));
        let mut ent = client(&storage, ScriptedVerifier::new(valid()), &clock);
        ent.initialize().unwrap();
        clock.set(start() + ChronoDuration::days(7));
        assert_eq!(ent.status().state, EntitlementState::TrialExpired);

        let rejecting = ScriptedVerifier::new(VerifyResult::Rejected {
            reason: "license key has already been used".into(),
        });
        let mut ent = client(&storage, rejecting, &clock);
        let result = ent.activate(GOOD_KEY).await;
        assert!(matches!(result, Err(ClientError::RejectedByServer { .. })));
        assert_eq!(ent.status().state, EntitlementState::TrialExpired);

        let mut ent = client(&storage, ScriptedVerifier::new(valid()), &clock);
        let status = ent.activate(GOOD_KEY).await.unwrap();
        assert_eq!(status.state, EntitlementState::FullActive);
        assert!(status.backend_verified);
        assert_eq!(status.activated_at, Some(clock.now()));

        // Simulated restart
        let restarted = client(&storage, ScriptedVerifier::new(valid()), &clock);
        let status = restarted.status();
        assert_eq!(status.state, EntitlementState::FullActive);
        assert_eq!(status.license_key.unwrap().as_str(), GOOD_KEY);
        assert_eq!(restarted.record().unwrap().trial_started_at, Some(start()));
    }

    #[tokio::test]
    async fn test_full_never_expires() {
        let storage = MemoryStorage::new();
        let clock = Arc::new(FixedClock::new(start()));
        let mut ent = client(&storage, ScriptedVerifier::new(valid()), &clock);
        ent.initialize().unwrap();
        ent.activate(GOOD_KEY).await.unwrap();

        clock.set(start() + ChronoDuration::days(3650));
        assert!(!ent.is_expired());
        assert_eq!(ent.remaining_days(), None);
        assert_eq!(ent.state(), EntitlementState::FullActive);
    }

    #[tokio::test]
    async fn test_activation_without_trial() {
        let storage = MemoryStorage::new();
        let clock = Arc::new(FixedClock::new(start()));
        let mut ent = client(&storage, ScriptedVerifier::new(valid()), &clock);

        let status = ent.activate(GOOD_KEY).await.unwrap();
        assert_eq!(status.state, EntitlementState::FullActive);
        assert_eq!(ent.record().unwrap().trial_started_at, None);
    }

    #[tokio::test]
    async fn test_unavailable_keeps_trial() {
        let storage = MemoryStorage::new();
        let clock = Arc::new(FixedClock::new(start()));
        let verifier = ScriptedVerifier::new(VerifyResult::Unavailable {
            detail: "connection refused".into(),
        });
        let mut ent = client(&storage, verifier, &clock);
        let before = ent.initialize().unwrap().clone();

        let result = ent.activate(GOOD_KEY).await;
        assert!(matches!(result, Err(ClientError::VerificationUnavailable(_))));
        assert!(result.unwrap_err().is_retryable());
        assert_eq!(ent.record(), Some(&before));
        assert_eq!(storage.load().unwrap().unwrap(), serde_json::to_string(&before).unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_verification_timeout_is_unavailable() {
        let storage = MemoryStorage::new();
        let clock = Arc::new(FixedClock::new(start()));
        let mut ent = client(&storage, Arc::new(SilentVerifier), &clock)
            .with_verify_timeout(Duration::from_secs(3));
        ent.initialize().unwrap();

        let result = ent.activate(GOOD_KEY).await;
        assert!(matches!(result, Err(ClientError::VerificationUnavailable(_))));
        assert_eq!(ent.state(), EntitlementState::TrialActive);
    }

    #[test]
    fn test_corrupted_records_reinitialize() {
        let clock = Arc::new(FixedClock::new(start()));
        for raw in [
            "{not json",
            r#"{"license_type":"GOLD","trial_started_at":"2026-01-01T00:00:00Z"}"#,
            r#"{"license_type":"TRIAL"}"#,
            r#"{"license_type":"FULL","activated_at":"2026-01-01T00:00:00Z"}"#,
            r#"{"license_type":"FULL","activated_at":"2026-01-01T00:00:00Z","license_key":"bogus"}"#,
        ] {
            let storage = MemoryStorage::with_record(raw);
            let mut ent = client(&storage, ScriptedVerifier::new(valid()), &clock);
            assert_eq!(ent.state(), EntitlementState::Uninitialized, "{raw}");

            ent.initialize().unwrap();
            assert_eq!(ent.state(), EntitlementState::TrialActive);
            assert_eq!(ent.record().unwrap().trial_started_at, Some(start()));
        }
    }

    #[tokio::test]
    async fn test_revalidate_does_not_downgrade() {
        let storage = MemoryStorage::new();
        let clock = Arc::new(FixedClock::new(start()));
        let mut ent = client(&storage, ScriptedVerifier::new(valid()), &clock);
        ent.activate(GOOD_KEY).await.unwrap();

        let rejecting = ScriptedVerifier::new(VerifyResult::Rejected {
            reason: "license has been deactivated".into(),
        });
        let ent = client(&storage, rejecting, &clock);
        let result = ent.revalidate().await;
        assert!(matches!(result, Some(VerifyResult::Rejected { .. })));
        assert_eq!(ent.state(), EntitlementState::FullActive);
    }

    #[tokio::test]
    async fn test_revalidate_after_restart_keeps_device_binding() {
        let storage = MemoryStorage::new();
        let clock = Arc::new(FixedClock::new(start()));
        let store = Arc::new(MemoryLicenseStore::new());
        let license = store
            .issue(IssueRequest::of_type(LicenseType::Full), start())
            .unwrap();
        let verifier: Arc<dyn LicenseVerifier> = Arc::new(StoreVerifier {
            store: store.clone(),
            clock: clock.clone(),
        });

        let mut ent = client(&storage, verifier.clone(), &clock);
        ent.initialize().unwrap();
        ent.activate(license.key.as_str()).await.unwrap();

        // A restart without a configured id comes up with a fresh one
        let restarted = EntitlementClient::open(
            Arc::new(storage.clone()),
            verifier,
            clock.clone(),
            "fresh-process-id",
        )
        .unwrap();
        assert_eq!(restarted.client_id(), "device-1");
        assert!(matches!(
            restarted.revalidate().await,
            Some(VerifyResult::Valid { .. })
        ));
    }

    #[tokio::test]
    async fn test_file_backed_activation_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("entitlement.json");
        let clock = Arc::new(FixedClock::new(start()));

        let mut ent = EntitlementClient::open(
            Arc::new(FileStorage::new(&path)),
            ScriptedVerifier::new(valid()),
            clock.clone(),
            "device-1",
        )
        .unwrap();
        ent.initialize().unwrap();
        ent.activate(GOOD_KEY).await.unwrap();
        drop(ent);

        let reopened = EntitlementClient::open(
            Arc::new(FileStorage::new(&path)),
            ScriptedVerifier::new(valid()),
            clock.clone(),
            "device-2",
        )
        .unwrap();
        let status = reopened.status();
        assert_eq!(status.state, EntitlementState::FullActive);
        assert!(status.backend_verified);
        assert_eq!(status.license_key.unwrap().as_str(), GOOD_KEY);
        assert_eq!(reopened.record().unwrap().trial_started_at, Some(start()));
        assert_eq!(reopened.client_id(), "device-1");
    }
}
