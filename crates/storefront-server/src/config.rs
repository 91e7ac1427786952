//! Server Configuration

use storefront_progression::DEFAULT_MAX_ENTRIES;

/// Per-connection push queue length before a client counts as too slow
pub const DEFAULT_LIVE_QUEUE_CAPACITY: usize = 64;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_addr: String,

    /// Bearer token for admin routes; admin routes are open when unset
    pub admin_token: Option<String>,

    pub live_queue_capacity: usize,

    pub leaderboard_max_entries: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:3000".into(),
            admin_token: None,
            live_queue_capacity: DEFAULT_LIVE_QUEUE_CAPACITY,
            leaderboard_max_entries: DEFAULT_MAX_ENTRIES,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let positive = |name: &str, fallback: usize| {
            std::env::var(name)
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|n: &usize| *n > 0)
                .unwrap_or(fallback)
        };

        Self {
            bind_addr: std::env::var("BIND_ADDR").unwrap_or(defaults.bind_addr),
            admin_token: std::env::var("ADMIN_TOKEN")
                .ok()
                .filter(|token| !token.trim().is_empty()),
            live_queue_capacity: positive("LIVE_QUEUE_CAPACITY", defaults.live_queue_capacity),
            leaderboard_max_entries: positive(
                "LEADERBOARD_MAX_ENTRIES",
                defaults.leaderboard_max_entries,
            ),
        }
    }
}
