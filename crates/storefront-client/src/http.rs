//! Storefront HTTP API Client
//!
//! Implementation of the client seams over the storefront's JSON API.

use async_trait::async_trait;
use futures::StreamExt;
use serde::Deserialize;
use std::time::Duration;

use storefront_core::{
    LicenseKey, LiveEvent, LiveSnapshot, VerifyRequest, VerifyResponse, VerifyResult, ViewerId,
};
use storefront_progression::{AwardResponse, ViewerProgress};

use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::progress::{ProgressRemote, RemoteAward};
use crate::sync::sse::{SseBlock, SseFrame, SseParser};
use crate::sync::{EventStream, PushSource, Pushed, SnapshotSource};
use crate::verifier::LicenseVerifier;

/// Error body returned by the server on refusals
#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
    code: String,
}

/// HTTP client for the storefront API
#[derive(Clone, Debug)]
pub struct HttpApi {
    client: reqwest::Client,
    base_url: String,
    request_timeout: Duration,
}

impl HttpApi {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        // Per-request timeouts are set on each call; the push stream has none
        let client = reqwest::Client::builder()
            .connect_timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: config.api_url.trim_end_matches('/').to_string(),
            request_timeout: config.request_timeout,
        })
    }

    pub fn from_env() -> Result<Self> {
        Self::new(&ClientConfig::from_env())
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    pub async fn health(&self) -> bool {
        match self
            .client
            .get(self.url("/health"))
            .timeout(self.request_timeout)
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                tracing::warn!("Storefront health check failed: {}", e);
                false
            }
        }
    }
}

#[async_trait]
impl LicenseVerifier for HttpApi {
    async fn verify(&self, key: &LicenseKey, client_id: &str) -> VerifyResult {
        let request = VerifyRequest {
            key: key.to_string(),
            client_id: Some(client_id.to_string()),
        };

        let response = match self
            .client
            .post(self.url("/license/verify"))
            .timeout(self.request_timeout)
            .json(&request)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                return VerifyResult::Unavailable {
                    detail: e.to_string(),
                };
            }
        };

        if !response.status().is_success() {
            return VerifyResult::Unavailable {
                detail: format!("license server answered {}", response.status()),
            };
        }

        match response.json::<VerifyResponse>().await {
            Ok(body) => body.into(),
            Err(e) => VerifyResult::Unavailable {
                detail: format!("unreadable verification response: {e}"),
            },
        }
    }
}

#[async_trait]
impl SnapshotSource for HttpApi {
    async fn snapshot(&self) -> Result<LiveSnapshot> {
        let snapshot = self
            .client
            .get(self.url("/live/snapshot"))
            .timeout(self.request_timeout)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(snapshot)
    }
}

#[async_trait]
impl PushSource for HttpApi {
    async fn connect(&self, client_id: &str) -> Result<EventStream> {
        let response = self
            .client
            .get(self.url(&format!("/events/{client_id}")))
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .send()
            .await?
            .error_for_status()?;

        let mut parser = SseParser::new();
        let events = response
            .bytes_stream()
            .map(move |chunk| -> Vec<Result<Pushed>> {
                let blocks = match chunk {
                    Ok(bytes) => parser.feed(&bytes),
                    Err(e) => Err(ClientError::from(e)),
                };
                match blocks {
                    Ok(blocks) => blocks.into_iter().map(|b| Ok(decode_block(b))).collect(),
                    Err(e) => vec![Err(e)],
                }
            })
            .flat_map(futures::stream::iter);

        Ok(Box::pin(events))
    }
}

/// Frames that are not live events still show the connection is alive
fn decode_block(block: SseBlock) -> Pushed {
    match block {
        SseBlock::Frame(frame) => decode_frame(frame),
        SseBlock::KeepAlive => Pushed::KeepAlive,
    }
}

fn decode_frame(frame: SseFrame) -> Pushed {
    match serde_json::from_str::<LiveEvent>(&frame.data) {
        Ok(event) => Pushed::Event(event),
        Err(e) => {
            tracing::debug!(event = ?frame.event, error = %e, "Skipping unreadable push frame");
            Pushed::KeepAlive
        }
    }
}

#[async_trait]
impl ProgressRemote for HttpApi {
    async fn submit_activity(&self, viewer_id: &ViewerId, activity_type: &str) -> RemoteAward {
        let response = match self
            .client
            .post(self.url(&format!("/viewer/activity/{viewer_id}")))
            .query(&[("activity_type", activity_type)])
            .timeout(self.request_timeout)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                return RemoteAward::Unavailable {
                    detail: e.to_string(),
                };
            }
        };

        let status = response.status();
        if status.is_success() {
            return match response.json::<AwardResponse>().await {
                Ok(body) => RemoteAward::Accepted(body),
                Err(e) => RemoteAward::Unavailable {
                    detail: format!("unreadable award response: {e}"),
                },
            };
        }

        if status.is_client_error() {
            if let Ok(body) = response.json::<ErrorBody>().await {
                return RemoteAward::Refused {
                    code: body.code,
                    message: body.error,
                };
            }
        }

        RemoteAward::Unavailable {
            detail: format!("progress server answered {status}"),
        }
    }

    async fn fetch_progress(&self, viewer_id: &ViewerId) -> Result<ViewerProgress> {
        let progress = self
            .client
            .get(self.url(&format!("/viewer/{viewer_id}")))
            .timeout(self.request_timeout)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(progress)
    }
}
