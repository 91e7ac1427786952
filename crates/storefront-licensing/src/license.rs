//! License Records and Storage
//!
//! Handles license issuance, storage, verification and deactivation.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use storefront_core::{LicenseKey, LicenseType, VerifyResponse, ViewerId, trial_expired};

use crate::error::{LicenseError, Result};

/// What decides whether a license is still live. Exactly one applies.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Liveness {
    /// Trial running from the given start
    TrialClock(DateTime<Utc>),
    /// Fixed term
    ExpiresAt(DateTime<Utc>),
    /// No term
    Never,
}

/// Derived license status, never stored
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LicenseStatus {
    Active,
    Expired,
    Deactivated,
}

/// A license record
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct License {
    /// License key
    pub key: LicenseKey,

    /// Tier, fixed at issue
    pub license_type: LicenseType,

    /// Whether license is active (deactivation flips this, records are kept)
    pub active: bool,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Start of the trial clock, TRIAL licenses only
    pub trial_started_at: Option<DateTime<Utc>>,

    /// First successful verification
    pub activated_at: Option<DateTime<Utc>>,

    /// Client that consumed the key
    pub activated_by: Option<String>,

    /// Expiration (None = never expires)
    pub expires_at: Option<DateTime<Utc>>,

    /// Viewer this license was handed to
    pub assigned_viewer_id: Option<ViewerId>,

    /// Purchaser email
    pub email: Option<String>,

    /// Checkout session that produced this license
    pub external_ref: Option<String>,
}

/// Administrator's request to issue a license
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct IssueRequest {
    pub license_type: Option<LicenseType>,
    #[serde(default)]
    pub expires_in_days: Option<u32>,
    #[serde(default)]
    pub assigned_viewer_id: Option<ViewerId>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub external_ref: Option<String>,
}

impl IssueRequest {
    pub fn of_type(license_type: LicenseType) -> Self {
        Self {
            license_type: Some(license_type),
            ..Default::default()
        }
    }
}

impl License {
    /// Build a new license from an issue request
    pub fn issue(request: IssueRequest, now: DateTime<Utc>) -> Result<Self> {
        let license_type = request.license_type.unwrap_or(LicenseType::Full);

        if license_type.is_trial() && request.expires_in_days.is_some() {
            return Err(LicenseError::InvalidRequest(
                "trial licenses run on the trial clock and cannot carry a term".into(),
            ));
        }
        if request.expires_in_days == Some(0) {
            return Err(LicenseError::InvalidRequest("term must be at least one day".into()));
        }

        Ok(Self {
            key: LicenseKey::generate(license_type),
            license_type,
            active: true,
            created_at: now,
            trial_started_at: license_type.is_trial().then_some(now),
            activated_at: None,
            activated_by: None,
            expires_at: request
                .expires_in_days
                .map(|days| now + Duration::days(i64::from(days))),
            assigned_viewer_id: request.assigned_viewer_id,
            email: request.email,
            external_ref: request.external_ref,
        })
    }

    /// Which clock governs this license
    pub fn liveness(&self) -> Liveness {
        if self.license_type.is_trial() {
            return Liveness::TrialClock(self.trial_started_at.unwrap_or(self.created_at));
        }
        self.expires_at.map_or(Liveness::Never, Liveness::ExpiresAt)
    }

    /// Current status at `now`
    pub fn status(&self, now: DateTime<Utc>) -> LicenseStatus {
        if !self.active {
            return LicenseStatus::Deactivated;
        }

        let expired = match self.liveness() {
            Liveness::TrialClock(started) => trial_expired(started, now),
            Liveness::ExpiresAt(expires) => now >= expires,
            Liveness::Never => false,
        };

        if expired {
            LicenseStatus::Expired
        } else {
            LicenseStatus::Active
        }
    }

    /// Deactivate the license
    pub const fn deactivate(&mut self) {
        self.active = false;
    }

    /// Reactivate the license
    pub const fn reactivate(&mut self) {
        self.active = true;
    }

    /// Check the key and consume it for `client_id` if still unused
    fn try_activate(&mut self, client_id: Option<&str>, now: DateTime<Utc>) -> VerifyResponse {
        match self.status(now) {
            LicenseStatus::Deactivated => {
                return VerifyResponse::invalid("license has been deactivated");
            }
            LicenseStatus::Expired => return VerifyResponse::invalid("license has expired"),
            LicenseStatus::Active => {}
        }

        if self.activated_at.is_some() {
            let same_client = matches!(
                (self.activated_by.as_deref(), client_id),
                (Some(owner), Some(caller)) if owner == caller
            );
            if !same_client {
                return VerifyResponse::invalid("license key has already been used");
            }
        } else {
            self.activated_at = Some(now);
            self.activated_by = client_id.map(str::to_string);
        }

        VerifyResponse::valid(self.license_type)
    }
}

/// Aggregate counts for the admin console
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LicenseStats {
    pub total: usize,
    pub active: usize,
    pub expired: usize,
    pub deactivated: usize,
    pub activated: usize,
    pub by_type: BTreeMap<LicenseType, usize>,
}

impl LicenseStats {
    pub fn collect<'a>(
        licenses: impl IntoIterator<Item = &'a License>,
        now: DateTime<Utc>,
    ) -> Self {
        let mut stats = Self::default();
        for license in licenses {
            stats.total += 1;
            match license.status(now) {
                LicenseStatus::Active => stats.active += 1,
                LicenseStatus::Expired => stats.expired += 1,
                LicenseStatus::Deactivated => stats.deactivated += 1,
            }
            if license.activated_at.is_some() {
                stats.activated += 1;
            }
            *stats.by_type.entry(license.license_type).or_default() += 1;
        }
        stats
    }
}

/// Outcome of [`LicenseStore::issue_once`]
#[derive(Clone, Debug)]
pub enum Issued {
    New(License),
    /// A license was already issued for the same external reference
    Existing(License),
}

impl Issued {
    pub fn into_license(self) -> License {
        match self {
            Self::New(license) | Self::Existing(license) => license,
        }
    }

    pub const fn is_new(&self) -> bool {
        matches!(self, Self::New(_))
    }
}

/// License storage trait
pub trait LicenseStore: Send + Sync {
    /// Save or update a license
    fn save(&self, license: &License) -> Result<()>;

    /// Get license by key
    fn get(&self, key: &LicenseKey) -> Result<Option<License>>;

    /// Get license by checkout session reference
    fn get_by_external_ref(&self, external_ref: &str) -> Result<Option<License>>;

    /// All licenses, oldest first
    fn list(&self) -> Result<Vec<License>>;

    /// Verify and consume a key (atomic check + activation)
    fn verify_and_activate(
        &self,
        key: &LicenseKey,
        client_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<VerifyResponse>;

    /// Issue a license unless one already exists for the request's
    /// `external_ref`. The check and the insert are a single step.
    fn issue_once(&self, request: IssueRequest, now: DateTime<Utc>) -> Result<Issued>;

    /// Issue and persist a new license
    fn issue(&self, request: IssueRequest, now: DateTime<Utc>) -> Result<License> {
        Ok(self.issue_once(request, now)?.into_license())
    }

    /// Flip a license inactive
    fn deactivate(&self, key: &LicenseKey) -> Result<License> {
        let mut license = self
            .get(key)?
            .ok_or_else(|| LicenseError::NotFound(key.to_string()))?;
        license.deactivate();
        self.save(&license)?;

        tracing::info!(license_key = %key, "Deactivated license");
        Ok(license)
    }

    /// Counts by status and type
    fn stats(&self, now: DateTime<Utc>) -> Result<LicenseStats> {
        Ok(LicenseStats::collect(&self.list()?, now))
    }
}

/// Tables guarded together so lookups and inserts see one order
#[derive(Default)]
struct Tables {
    licenses: HashMap<LicenseKey, License>,
    by_external_ref: HashMap<String, LicenseKey>,
}

impl Tables {
    fn insert(&mut self, license: &License) {
        if let Some(external_ref) = &license.external_ref {
            self.by_external_ref
                .insert(external_ref.clone(), license.key.clone());
        }
        self.licenses.insert(license.key.clone(), license.clone());
    }

    fn by_external_ref(&self, external_ref: &str) -> Option<&License> {
        self.by_external_ref
            .get(external_ref)
            .and_then(|key| self.licenses.get(key))
    }
}

/// In-memory license store
#[derive(Default)]
pub struct MemoryLicenseStore {
    tables: RwLock<Tables>,
}

impl MemoryLicenseStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Tables>> {
        self.tables
            .read()
            .map_err(|_| LicenseError::Storage("license table lock poisoned".into()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Tables>> {
        self.tables
            .write()
            .map_err(|_| LicenseError::Storage("license table lock poisoned".into()))
    }
}

impl LicenseStore for MemoryLicenseStore {
    fn save(&self, license: &License) -> Result<()> {
        self.write()?.insert(license);
        Ok(())
    }

    fn get(&self, key: &LicenseKey) -> Result<Option<License>> {
        Ok(self.read()?.licenses.get(key).cloned())
    }

    fn get_by_external_ref(&self, external_ref: &str) -> Result<Option<License>> {
        Ok(self.read()?.by_external_ref(external_ref).cloned())
    }

    fn list(&self) -> Result<Vec<License>> {
        let mut all: Vec<_> = self.read()?.licenses.values().cloned().collect();
        all.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.key.as_str().cmp(b.key.as_str()))
        });
        Ok(all)
    }

    fn issue_once(&self, request: IssueRequest, now: DateTime<Utc>) -> Result<Issued> {
        let mut license = License::issue(request, now)?;
        let mut tables = self.write()?;

        if let Some(external_ref) = &license.external_ref {
            if let Some(existing) = tables.by_external_ref(external_ref) {
                tracing::debug!(
                    external_ref = %external_ref,
                    "License already issued for reference"
                );
                return Ok(Issued::Existing(existing.clone()));
            }
        }

        while tables.licenses.contains_key(&license.key) {
            license.key = LicenseKey::generate(license.license_type);
        }
        tables.insert(&license);

        tracing::info!(
            license_key = %license.key,
            license_type = %license.license_type,
            "Issued license"
        );
        Ok(Issued::New(license))
    }

    fn verify_and_activate(
        &self,
        key: &LicenseKey,
        client_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<VerifyResponse> {
        let mut tables = self.write()?;

        let Some(license) = tables.licenses.get_mut(key) else {
            return Ok(VerifyResponse::invalid("unknown license key"));
        };

        let response = license.try_activate(client_id, now);
        if response.valid {
            tracing::info!(license_key = %key, client_id = ?client_id, "License verified");
        } else {
            tracing::info!(license_key = %key, reason = ?response.reason, "License rejected");
        }
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-03-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn test_issue_full_license() {
        let store = MemoryLicenseStore::new();
        let license = store.issue(IssueRequest::of_type(LicenseType::Full), now()).unwrap();

        assert_eq!(license.key.license_type(), LicenseType::Full);
        assert_eq!(license.liveness(), Liveness::Never);
        assert_eq!(license.status(now()), LicenseStatus::Active);
        assert!(store.get(&license.key).unwrap().is_some());
    }

    #[test]
    fn test_trial_cannot_have_term() {
        let request = IssueRequest {
            license_type: Some(LicenseType::Trial),
            expires_in_days: Some(30),
            ..Default::default()
        };
        assert!(matches!(
            License::issue(request, now()),
            Err(LicenseError::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_trial_license_expires_on_clock() {
        let license = License::issue(IssueRequest::of_type(LicenseType::Trial), now()).unwrap();
        assert_eq!(license.liveness(), Liveness::TrialClock(now()));
        assert_eq!(license.status(now() + Duration::days(6)), LicenseStatus::Active);
        assert_eq!(license.status(now() + Duration::days(7)), LicenseStatus::Expired);
    }

    #[test]
    fn test_term_license_expires() {
        let request = IssueRequest {
            license_type: Some(LicenseType::Premium),
            expires_in_days: Some(30),
            ..Default::default()
        };
        let license = License::issue(request, now()).unwrap();
        assert_eq!(license.status(now() + Duration::days(29)), LicenseStatus::Active);
        assert_eq!(license.status(now() + Duration::days(30)), LicenseStatus::Expired);
    }

    #[test]
    fn test_key_is_consumed_once() {
        let store = MemoryLicenseStore::new();
        let license = store.issue(IssueRequest::of_type(LicenseType::Full), now()).unwrap();

        let first = store.verify_and_activate(&license.key, Some("device-a"), now()).unwrap();
        assert!(first.valid);
        assert_eq!(first.license_type, Some(LicenseType::Full));

        let retry = store.verify_and_activate(&license.key, Some("device-a"), now()).unwrap();
        assert!(retry.valid);

        let other = store.verify_and_activate(&license.key, Some("device-b"), now()).unwrap();
        assert!(!other.valid);
        assert_eq!(other.reason.as_deref(), Some("license key has already been used"));
    }

    #[test]
    fn test_anonymous_activation_cannot_be_repeated() {
        let store = MemoryLicenseStore::new();
        let license = store.issue(IssueRequest::of_type(LicenseType::Basic), now()).unwrap();

        assert!(store.verify_and_activate(&license.key, None, now()).unwrap().valid);
        assert!(!store.verify_and_activate(&license.key, None, now()).unwrap().valid);
    }

    #[test]
    fn test_unknown_and_deactivated_keys_rejected() {
        let store = MemoryLicenseStore::new();
        let unknown = LicenseKey::parse("FULL-AAAAA-BBBBB-CCCCC").unwrap();
        let response = store.verify_and_activate(&unknown, None, now()).unwrap();
        assert_eq!(response.reason.as_deref(), Some("unknown license key"));

        let license = store.issue(IssueRequest::of_type(LicenseType::Full), now()).unwrap();
        let deactivated = store.deactivate(&license.key).unwrap();
        assert_eq!(deactivated.status(now()), LicenseStatus::Deactivated);

        let response = store.verify_and_activate(&license.key, None, now()).unwrap();
        assert_eq!(response.reason.as_deref(), Some("license has been deactivated"));
        assert!(store.get(&license.key).unwrap().is_some());
    }

    #[test]
    fn test_deactivate_unknown_key() {
        let store = MemoryLicenseStore::new();
        let unknown = LicenseKey::parse("FULL-AAAAA-BBBBB-CCCCC").unwrap();
        assert!(matches!(store.deactivate(&unknown), Err(LicenseError::NotFound(_))));
    }

    #[test]
    fn test_stats() {
        let store = MemoryLicenseStore::new();
        let full = store.issue(IssueRequest::of_type(LicenseType::Full), now()).unwrap();
        store.issue(IssueRequest::of_type(LicenseType::Trial), now()).unwrap();
        let basic = store.issue(IssueRequest::of_type(LicenseType::Basic), now()).unwrap();

        store.verify_and_activate(&full.key, Some("device"), now()).unwrap();
        store.deactivate(&basic.key).unwrap();

        let stats = store.stats(now() + Duration::days(8)).unwrap();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.active, 1);
        assert_eq!(stats.expired, 1);
        assert_eq!(stats.deactivated, 1);
        assert_eq!(stats.activated, 1);
        assert_eq!(stats.by_type.get(&LicenseType::Trial), Some(&1));
    }

    #[test]
    fn test_lookup_by_external_ref() {
        let store = MemoryLicenseStore::new();
        let request = IssueRequest {
            license_type: Some(LicenseType::Premium),
            external_ref: Some("cs_test_123".into()),
            ..Default::default()
        };
        let license = store.issue(request, now()).unwrap();

        let found = store.get_by_external_ref("cs_test_123").unwrap().unwrap();
        assert_eq!(found.key, license.key);
        assert!(store.get_by_external_ref("cs_missing").unwrap().is_none());
    }

    fn paid(external_ref: &str) -> IssueRequest {
        IssueRequest {
            license_type: Some(LicenseType::Full),
            external_ref: Some(external_ref.into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_issue_once_returns_existing() {
        let store = MemoryLicenseStore::new();
        let first = store.issue_once(paid("cs_test_1"), now()).unwrap();
        let second = store.issue_once(paid("cs_test_1"), now()).unwrap();

        assert!(first.is_new());
        assert!(!second.is_new());
        assert_eq!(first.into_license().key, second.into_license().key);
        assert_eq!(store.list().unwrap().len(), 1);
    }

    #[test]
    fn test_concurrent_issue_once_issues_single_license() {
        let store = std::sync::Arc::new(MemoryLicenseStore::new());
        let workers: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                std::thread::spawn(move || store.issue_once(paid("cs_race"), now()).unwrap())
            })
            .collect();

        let outcomes: Vec<_> = workers.into_iter().map(|w| w.join().unwrap()).collect();
        assert_eq!(outcomes.iter().filter(|o| o.is_new()).count(), 1);
        assert_eq!(store.list().unwrap().len(), 1);
    }

    #[test]
    fn test_reference_lookups_run_alongside_issuance() {
        let store = std::sync::Arc::new(MemoryLicenseStore::new());
        let (done_tx, done_rx) = std::sync::mpsc::channel();

        for worker in 0..4 {
            let store = store.clone();
            let done_tx = done_tx.clone();
            std::thread::spawn(move || {
                for i in 0..2_000 {
                    let external_ref = format!("cs_{worker}_{i}");
                    if worker % 2 == 0 {
                        store.issue(paid(&external_ref), now()).unwrap();
                    } else {
                        let _ = store.get_by_external_ref(&external_ref).unwrap();
                    }
                }
                done_tx.send(()).unwrap();
            });
        }
        drop(done_tx);

        for _ in 0..4 {
            done_rx
                .recv_timeout(std::time::Duration::from_secs(20))
                .expect("store operations stalled");
        }
        assert_eq!(store.list().unwrap().len(), 4_000);
    }
}
