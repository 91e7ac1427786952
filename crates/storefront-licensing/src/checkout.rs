//! Hosted Checkout
//!
//! Buying a license is delegated to a payment provider. The storefront only
//! needs a URL to send the buyer to; the license itself is issued later by
//! the webhook once payment completes.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use stripe::{
    CheckoutSession as StripeCheckoutSession, CheckoutSessionMode, Client,
    CreateCheckoutSession, CreateCheckoutSessionLineItems,
    CreateCheckoutSessionLineItemsPriceData,
    CreateCheckoutSessionLineItemsPriceDataProductData, Currency,
};

use storefront_core::{LicenseType, ViewerId};

use crate::error::{LicenseError, Result};

/// Anything that can open a checkout session and hand back its URL
#[async_trait]
pub trait CheckoutProvider: Send + Sync {
    async fn create_checkout_session(&self, request: CheckoutRequest) -> Result<CheckoutSession>;

    /// Secret used to authenticate provider callbacks
    fn webhook_secret(&self) -> &str;
}

/// Stripe hosted checkout
pub struct StripeCheckout {
    client: Client,
    webhook_secret: String,
}

impl StripeCheckout {
    pub fn new(secret_key: &str, webhook_secret: &str) -> Self {
        Self {
            client: Client::new(secret_key),
            webhook_secret: webhook_secret.to_string(),
        }
    }

    /// Create from environment variables
    pub fn from_env() -> Result<Self> {
        let secret_key = std::env::var("STRIPE_SECRET_KEY")
            .map_err(|_| LicenseError::Config("STRIPE_SECRET_KEY not set".into()))?;
        let webhook_secret = std::env::var("STRIPE_WEBHOOK_SECRET")
            .map_err(|_| LicenseError::Config("STRIPE_WEBHOOK_SECRET not set".into()))?;

        Ok(Self::new(&secret_key, &webhook_secret))
    }
}

#[async_trait]
impl CheckoutProvider for StripeCheckout {
    async fn create_checkout_session(&self, request: CheckoutRequest) -> Result<CheckoutSession> {
        let pricing = pricing(request.license_type)?;

        let mut params = CreateCheckoutSession::new();
        params.customer_email = Some(&request.customer_email);
        params.success_url = Some(&request.success_url);
        params.cancel_url = Some(&request.cancel_url);
        params.mode = Some(CheckoutSessionMode::Payment);

        // Read back by the webhook to issue the right tier
        let mut metadata = std::collections::HashMap::new();
        metadata.insert(
            "license_type".to_string(),
            request.license_type.as_str().to_string(),
        );
        if let Some(ref viewer_id) = request.viewer_id {
            metadata.insert("viewer_id".to_string(), viewer_id.to_string());
        }
        params.metadata = Some(metadata);

        params.line_items = Some(vec![CreateCheckoutSessionLineItems {
            quantity: Some(1),
            price_data: Some(CreateCheckoutSessionLineItemsPriceData {
                currency: Currency::USD,
                unit_amount: Some(pricing.cents),
                product_data: Some(CreateCheckoutSessionLineItemsPriceDataProductData {
                    name: pricing.name.to_string(),
                    description: Some(pricing.description.to_string()),
                    ..Default::default()
                }),
                ..Default::default()
            }),
            ..Default::default()
        }]);

        let session = StripeCheckoutSession::create(&self.client, params)
            .await
            .map_err(|e| LicenseError::Stripe(e.to_string()))?;

        let checkout_url = session
            .url
            .ok_or_else(|| LicenseError::Stripe("No checkout URL returned".into()))?;

        tracing::info!(
            session_id = %session.id,
            license_type = %request.license_type,
            "Created checkout session"
        );

        Ok(CheckoutSession {
            id: session.id.to_string(),
            checkout_url,
            license_type: request.license_type,
            customer_email: request.customer_email,
        })
    }

    fn webhook_secret(&self) -> &str {
        &self.webhook_secret
    }
}

/// Request to create a checkout session
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CheckoutRequest {
    /// Tier to purchase
    pub license_type: LicenseType,

    /// Customer email
    pub customer_email: String,

    /// URL to redirect after successful payment
    pub success_url: String,

    /// URL to redirect if checkout is cancelled
    pub cancel_url: String,

    /// Viewer the license should be assigned to
    #[serde(default)]
    pub viewer_id: Option<ViewerId>,
}

/// Result of creating a checkout session
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CheckoutSession {
    /// Provider session ID
    pub id: String,

    /// URL to redirect user to
    pub checkout_url: String,

    pub license_type: LicenseType,

    pub customer_email: String,
}

/// One-time price of a tier
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TierPricing {
    pub name: &'static str,
    pub description: &'static str,
    pub cents: i64,
}

/// Trials are free and issued locally, so they have no price
pub fn pricing(license_type: LicenseType) -> Result<TierPricing> {
    match license_type {
        LicenseType::Trial => Err(LicenseError::InvalidRequest(
            "trial licenses cannot be purchased".into(),
        )),
        LicenseType::Basic => Ok(TierPricing {
            name: "Storefront Basic",
            description: "Landing page, schedule and viewer chat",
            cents: 900,
        }),
        LicenseType::Full => Ok(TierPricing {
            name: "Storefront Full",
            description: "Everything in Basic plus points, levels and leaderboard",
            cents: 1900,
        }),
        LicenseType::Premium => Ok(TierPricing {
            name: "Storefront Premium",
            description: "Everything in Full plus custom themes and priority support",
            cents: 3900,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_pricing() {
        assert_eq!(pricing(LicenseType::Full).unwrap().cents, 1900);
        let premium = pricing(LicenseType::Premium).unwrap();
        let basic = pricing(LicenseType::Basic).unwrap();
        assert!(premium.cents > basic.cents);
        assert!(matches!(
            pricing(LicenseType::Trial),
            Err(LicenseError::InvalidRequest(_))
        ));
    }
}
