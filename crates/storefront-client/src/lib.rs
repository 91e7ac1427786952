//! # storefront-client
//!
//! Everything a viewer session runs locally.
//!
//! ## Components
//!
//! - **Entitlement** - trial/full state machine over a durable local record,
//!   reconciled with the server's verification endpoint
//! - **Progress** - cached point total that defers to the server and falls
//!   back to local awards when the server cannot be reached
//! - **Live sync** - one event loop fed by a push stream and a fixed-interval
//!   reconciliation poll
//!
//! ## Usage
//!
//! ```rust,ignore
//! use storefront_client::{
//!     ClientConfig, EntitlementClient, FileStorage, HttpApi, LiveSync, SyncConfig,
//! };
//!
//! let config = ClientConfig::from_env();
//! let api = Arc::new(HttpApi::new(&config)?);
//!
//! let mut entitlement = EntitlementClient::open(
//!     Arc::new(FileStorage::new(&config.state_path)),
//!     api.clone(),
//!     Arc::new(SystemClock),
//!     config.client_id.clone(),
//! )?;
//! entitlement.initialize()?;
//!
//! // The entitlement record remembers which id this device activated under
//! let sync_config = SyncConfig {
//!     client_id: entitlement.client_id().to_string(),
//!     ..config.sync_config()
//! };
//! let sync = LiveSync::spawn(api.clone(), api, sync_config);
//! // ... render from sync.subscribe()
//! sync.shutdown().await;
//! ```

pub mod config;
pub mod entitlement;
pub mod error;
pub mod http;
pub mod progress;
pub mod storage;
pub mod sync;
pub mod verifier;

pub use config::ClientConfig;
pub use entitlement::{CachedEntitlement, EntitlementClient, EntitlementState, LicenseStatus};
pub use error::{ClientError, Result};
pub use http::HttpApi;
pub use progress::{AwardReport, ProgressRemote, ProgressTracker, RemoteAward};
pub use storage::{EntitlementStorage, FileStorage, MemoryStorage};
pub use sync::{
    LiveSync, LiveSyncHandle, PushSource, Pushed, SnapshotSource, SyncConfig, SyncState,
};
pub use verifier::LicenseVerifier;
