//! # storefront-core
//!
//! Shared vocabulary for the storefront entitlement and live-sync engine.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                      storefront-server                        │
//! │  ┌──────────────┐  ┌────────────────┐  ┌──────────────────┐  │
//! │  │  Licensing   │  │  Progression   │  │    Live Hub      │  │
//! │  │  (store)     │  │  (levels/caps) │  │    (fan-out)     │  │
//! │  └──────┬───────┘  └───────┬────────┘  └────────┬─────────┘  │
//! └─────────┼──────────────────┼────────────────────┼────────────┘
//!           │ verify           │ award               │ SSE + poll
//! ┌─────────▼──────────────────▼────────────────────▼────────────┐
//! │                      storefront-client                        │
//! │   Entitlement state machine · progress cache · sync reducer   │
//! └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! Everything that crosses the wire between the two sides lives here so
//! both ends agree on one typed shape.

pub mod clock;
pub mod error;
pub mod license;
pub mod live;
pub mod viewer;

pub use clock::{Clock, FixedClock, SystemClock};
pub use error::{CoreError, Result};
pub use license::{
    LicenseKey, LicenseType, TRIAL_DURATION_DAYS, VerifyRequest, VerifyResponse, VerifyResult,
    trial_days_elapsed, trial_expired, trial_remaining_days,
};
pub use live::{Channel, LiveEvent, LiveSnapshot};
pub use viewer::{Viewer, ViewerId};
