//! Stripe Webhook Handling
//!
//! Issues the purchased license when a checkout session completes.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use stripe::{Event, EventObject, EventType, Webhook};

use storefront_core::{LicenseType, ViewerId};

use crate::error::{LicenseError, Result};
use crate::license::{IssueRequest, License, LicenseStore};

/// Parsed webhook event
#[derive(Clone, Debug)]
pub enum WebhookEvent {
    /// Checkout completed - issue a license
    CheckoutCompleted {
        session_id: String,
        customer_email: Option<String>,
        license_type: LicenseType,
        viewer_id: Option<ViewerId>,
    },

    /// Unhandled event type
    Other { event_type: String },
}

/// Webhook handler
pub struct WebhookHandler<S: LicenseStore + ?Sized> {
    license_store: Arc<S>,
}

impl<S: LicenseStore + ?Sized> WebhookHandler<S> {
    pub fn new(license_store: Arc<S>) -> Self {
        Self { license_store }
    }

    /// Verify webhook signature and parse event
    pub fn parse_event(&self, payload: &str, signature: &str, secret: &str) -> Result<Event> {
        Webhook::construct_event(payload, signature, secret)
            .map_err(|e| LicenseError::WebhookSignature(e.to_string()))
    }

    /// Process a webhook event, returning the license it issued if any
    pub fn handle(&self, event: &Event, now: DateTime<Utc>) -> Result<Option<License>> {
        tracing::info!(event_type = ?event.type_, "Processing Stripe webhook");
        self.fulfill(Self::parse_webhook_event(event)?, now)
    }

    /// Act on a parsed event. Stripe redelivers events, so one checkout
    /// session always maps to the same license.
    pub fn fulfill(&self, event: WebhookEvent, now: DateTime<Utc>) -> Result<Option<License>> {
        match event {
            WebhookEvent::CheckoutCompleted {
                session_id,
                customer_email,
                license_type,
                viewer_id,
            } => {
                let issued = self.license_store.issue_once(
                    IssueRequest {
                        license_type: Some(license_type),
                        expires_in_days: None,
                        assigned_viewer_id: viewer_id,
                        email: customer_email,
                        external_ref: Some(session_id),
                    },
                    now,
                )?;
                Ok(Some(issued.into_license()))
            }

            WebhookEvent::Other { event_type } => {
                tracing::debug!(event_type = %event_type, "Unhandled webhook event");
                Ok(None)
            }
        }
    }

    /// Parse Stripe event into our event type
    fn parse_webhook_event(event: &Event) -> Result<WebhookEvent> {
        match event.type_ {
            EventType::CheckoutSessionCompleted => {
                let EventObject::CheckoutSession(session) = &event.data.object else {
                    return Err(LicenseError::WebhookParse("Invalid checkout session data".into()));
                };

                let metadata = session.metadata.as_ref();
                let license_type = metadata
                    .and_then(|m| m.get("license_type"))
                    .and_then(|t| t.parse().ok())
                    .unwrap_or(LicenseType::Full);
                let viewer_id = metadata
                    .and_then(|m| m.get("viewer_id"))
                    .map(ViewerId::from_string);

                Ok(WebhookEvent::CheckoutCompleted {
                    session_id: session.id.to_string(),
                    customer_email: session.customer_email.clone(),
                    license_type,
                    viewer_id,
                })
            }

            _ => Ok(WebhookEvent::Other {
                event_type: format!("{:?}", event.type_),
            }),
        }
    }
}
