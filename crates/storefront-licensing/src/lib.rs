//! # storefront-licensing
//!
//! The authoritative entitlement store: issues license keys, verifies and
//! consumes them, and flips them inactive when an administrator revokes one.
//!
//! ## Key lifecycle
//!
//! ```text
//! issue ──▶ unused ──verify(client)──▶ activated ──deactivate──▶ inactive
//!              │                           │
//!              └──────deactivate───────────┴──────────────────────▶ inactive
//! ```
//!
//! A key is consumed by the first device that verifies it. Verifying again
//! from that same device keeps succeeding, so a client that lost the first
//! response can retry safely.
//!
//! Payment is an opaque collaborator: [`CheckoutProvider`] returns a hosted
//! checkout URL, and [`WebhookHandler`] issues the purchased license once the
//! provider reports the session as paid.

mod checkout;
mod error;
mod license;
mod webhook;

pub use checkout::{CheckoutProvider, CheckoutRequest, CheckoutSession, StripeCheckout};
pub use error::{LicenseError, Result};
pub use license::{
    IssueRequest, Issued, License, LicenseStats, LicenseStatus, LicenseStore, Liveness,
    MemoryLicenseStore,
};
pub use webhook::{WebhookEvent, WebhookHandler};
