//! License Keys and Verification Types
//!
//! Key format is `{TYPE}-XXXXX-XXXXX-XXXXX` where every group is five
//! characters from `[A-Z0-9]`.

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::LazyLock;

use crate::error::{CoreError, Result};

/// Length of a trial before it expires, in whole days
pub const TRIAL_DURATION_DAYS: i64 = 7;

/// Whole days since a trial started, floored; never negative
pub fn trial_days_elapsed(trial_started_at: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (now - trial_started_at).num_days().max(0)
}

/// Whether a trial started at `trial_started_at` has run out at `now`
pub fn trial_expired(trial_started_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    trial_days_elapsed(trial_started_at, now) >= TRIAL_DURATION_DAYS
}

/// Days left on a trial, saturating at zero
pub fn trial_remaining_days(trial_started_at: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (TRIAL_DURATION_DAYS - trial_days_elapsed(trial_started_at, now)).max(0)
}

static KEY_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(TRIAL|FULL|BASIC|PREMIUM)-[A-Z0-9]{5}-[A-Z0-9]{5}-[A-Z0-9]{5}$")
        .expect("license key pattern compiles")
});

static FULL_KEY_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^FULL-[A-Z0-9]{5}-[A-Z0-9]{5}-[A-Z0-9]{5}$").expect("full key pattern compiles")
});

/// License tiers
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LicenseType {
    Trial,
    Full,
    Basic,
    Premium,
}

impl LicenseType {
    pub const ALL: [Self; 4] = [Self::Trial, Self::Full, Self::Basic, Self::Premium];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Trial => "TRIAL",
            Self::Full => "FULL",
            Self::Basic => "BASIC",
            Self::Premium => "PREMIUM",
        }
    }

    pub const fn is_trial(self) -> bool {
        matches!(self, Self::Trial)
    }
}

impl FromStr for LicenseType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_uppercase().as_str() {
            "TRIAL" => Ok(Self::Trial),
            "FULL" => Ok(Self::Full),
            "BASIC" => Ok(Self::Basic),
            "PREMIUM" => Ok(Self::Premium),
            other => Err(CoreError::UnknownLicenseType(other.to_string())),
        }
    }
}

impl std::fmt::Display for LicenseType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A well-formed license key
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct LicenseKey(String);

impl LicenseKey {
    /// Generate a fresh key for the given tier
    pub fn generate(license_type: LicenseType) -> Self {
        let hex = uuid::Uuid::new_v4().simple().to_string().to_uppercase();
        Self(format!(
            "{}-{}-{}-{}",
            license_type.as_str(),
            &hex[0..5],
            &hex[5..10],
            &hex[10..15]
        ))
    }

    /// Parse any tier's key, normalising case and surrounding whitespace
    pub fn parse(s: &str) -> Result<Self> {
        let normalized = normalize(s);
        if KEY_PATTERN.is_match(&normalized) {
            Ok(Self(normalized))
        } else {
            Err(CoreError::InvalidFormat(format!("'{}' is not a license key", s.trim())))
        }
    }

    /// Parse a key that may be used to activate a full license on a device
    pub fn parse_full(s: &str) -> Result<Self> {
        let normalized = normalize(s);
        if FULL_KEY_PATTERN.is_match(&normalized) {
            Ok(Self(normalized))
        } else {
            Err(CoreError::InvalidFormat(format!("'{}' is not a FULL license key", s.trim())))
        }
    }

    /// Tier encoded in the key prefix
    pub fn license_type(&self) -> LicenseType {
        self.0
            .split('-')
            .next()
            .and_then(|prefix| prefix.parse().ok())
            .unwrap_or(LicenseType::Trial)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn normalize(s: &str) -> String {
    s.trim().to_uppercase()
}

impl TryFrom<String> for LicenseKey {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<LicenseKey> for String {
    fn from(key: LicenseKey) -> Self {
        key.0
    }
}

impl std::fmt::Display for LicenseKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Body of `POST /license/verify`
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VerifyRequest {
    pub key: String,

    /// Device that wants to consume the key
    #[serde(default)]
    pub client_id: Option<String>,
}

/// Wire response of `POST /license/verify`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyResponse {
    pub valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license_type: Option<LicenseType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl VerifyResponse {
    pub const fn valid(license_type: LicenseType) -> Self {
        Self {
            valid: true,
            license_type: Some(license_type),
            reason: None,
        }
    }

    pub fn invalid(reason: impl Into<String>) -> Self {
        Self {
            valid: false,
            license_type: None,
            reason: Some(reason.into()),
        }
    }
}

/// Outcome of asking the entitlement store about a key.
///
/// `Rejected` means the store answered and said no. `Unavailable` means no
/// answer was obtained; callers must not treat it as a rejection.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum VerifyResult {
    Valid { license_type: LicenseType },
    Rejected { reason: String },
    Unavailable { detail: String },
}

impl From<VerifyResponse> for VerifyResult {
    fn from(response: VerifyResponse) -> Self {
        match (response.valid, response.license_type) {
            (true, Some(license_type)) => Self::Valid { license_type },
            (true, None) => Self::Unavailable {
                detail: "verification response is missing the license type".into(),
            },
            (false, _) => Self::Rejected {
                reason: response.reason.unwrap_or_else(|| "license rejected".into()),
            },
        }
    }
}
