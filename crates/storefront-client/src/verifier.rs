//! License Verification Seam

use async_trait::async_trait;

use storefront_core::{LicenseKey, VerifyResult};

/// Asks the entitlement store whether a key may be activated by a client.
///
/// Implementations never fail: transport problems are reported as
/// [`VerifyResult::Unavailable`].
#[async_trait]
pub trait LicenseVerifier: Send + Sync {
    async fn verify(&self, key: &LicenseKey, client_id: &str) -> VerifyResult;
}
