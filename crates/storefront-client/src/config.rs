//! Client Configuration

use std::path::PathBuf;
use std::time::Duration;

use crate::sync::SyncConfig;

/// Client settings, usually read from the environment
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// Storefront API base URL
    pub api_url: String,

    /// Where the cached entitlement record lives
    pub state_path: PathBuf,

    /// Identifies this device to the push channel and license activation.
    /// Only used until an entitlement record stores its own.
    pub client_id: String,

    /// Reconciliation poll period
    pub poll_interval: Duration,

    /// Wait between push reconnect attempts
    pub reconnect_delay: Duration,

    /// Upper bound on any single request
    pub request_timeout: Duration,

    /// Push silence after which the stream is reopened
    pub push_idle_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:3000".into(),
            state_path: PathBuf::from("storefront-entitlement.json"),
            client_id: uuid::Uuid::new_v4().to_string(),
            poll_interval: Duration::from_secs(10),
            reconnect_delay: Duration::from_secs(5),
            request_timeout: Duration::from_secs(5),
            push_idle_timeout: Duration::from_secs(30),
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let secs = |name: &str, fallback: Duration| {
            std::env::var(name)
                .ok()
                .and_then(|v| v.parse().ok())
                .map_or(fallback, Duration::from_secs)
        };

        Self {
            api_url: std::env::var("STOREFRONT_API_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or(defaults.api_url),
            state_path: std::env::var("STOREFRONT_STATE_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.state_path),
            client_id: std::env::var("STOREFRONT_CLIENT_ID").unwrap_or(defaults.client_id),
            poll_interval: secs("STOREFRONT_POLL_SECS", defaults.poll_interval),
            reconnect_delay: secs("STOREFRONT_RECONNECT_SECS", defaults.reconnect_delay),
            request_timeout: secs("STOREFRONT_TIMEOUT_SECS", defaults.request_timeout),
            push_idle_timeout: secs("STOREFRONT_PUSH_IDLE_SECS", defaults.push_idle_timeout),
        }
    }

    /// Settings for the live sync loop
    pub fn sync_config(&self) -> SyncConfig {
        SyncConfig {
            client_id: self.client_id.clone(),
            poll_interval: self.poll_interval,
            reconnect_delay: self.reconnect_delay,
            request_timeout: self.request_timeout,
            idle_timeout: self.push_idle_timeout,
        }
    }
}
