//! Live Event Hub
//!
//! ```text
//!   admin PUT ──▶ publish ──▶ current state per channel
//!                    │
//!                    ├──▶ [queue] ──▶ client A (SSE)
//!                    ├──▶ [queue] ──▶ client B (SSE)
//!                    └──▶ [full]  ──✗ client C dropped
//! ```
//!
//! Each client id holds at most one connection. Publishing never waits on
//! a connection: a client whose queue is full is disconnected and catches
//! up through its reconciliation poll.

use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc::{self, error::TrySendError};

use storefront_core::{Channel, LiveEvent, LiveSnapshot};

/// Fan-out result of one publish
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct PublishReport {
    pub delivered: usize,
    /// Connections cut off because their queue was full
    pub dropped: usize,
    /// Connections already gone
    pub pruned: usize,
}

/// A fresh connection: the current state, then every later event
pub struct Subscription {
    pub initial: Vec<LiveEvent>,
    pub events: mpsc::Receiver<LiveEvent>,
}

#[derive(Default)]
struct HubInner {
    current: BTreeMap<Channel, LiveEvent>,
    connections: HashMap<String, mpsc::Sender<LiveEvent>>,
}

pub struct LiveHub {
    inner: Mutex<HubInner>,
    capacity: usize,
}

impl LiveHub {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(HubInner::default()),
            capacity: capacity.max(1),
        }
    }

    // Every critical section leaves the maps consistent
    fn lock(&self) -> MutexGuard<'_, HubInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Open a connection for `client_id`, replacing any previous one.
    ///
    /// The replaced connection's stream ends when its sender is dropped here.
    pub fn connect(&self, client_id: &str) -> Subscription {
        let (sender, events) = mpsc::channel(self.capacity);
        let mut inner = self.lock();

        if inner.connections.insert(client_id.to_string(), sender).is_some() {
            tracing::info!(client_id = %client_id, "Replaced live connection");
        } else {
            tracing::info!(client_id = %client_id, "Live connection opened");
        }

        Subscription {
            initial: inner.current.values().cloned().collect(),
            events,
        }
    }

    /// Set a channel's state and push it to every connection.
    ///
    /// Publishes are serialized, so every connection sees a channel's
    /// events in publish order.
    pub fn publish(&self, channel: Channel, payload: serde_json::Value) -> PublishReport {
        let event = LiveEvent::new(channel, payload);
        let mut inner = self.lock();
        inner.current.insert(channel, event.clone());

        let mut report = PublishReport::default();
        inner.connections.retain(|client_id, sender| match sender.try_send(event.clone()) {
            Ok(()) => {
                report.delivered += 1;
                true
            }
            Err(TrySendError::Full(_)) => {
                tracing::warn!(client_id = %client_id, "Live queue full; dropping slow client");
                report.dropped += 1;
                false
            }
            Err(TrySendError::Closed(_)) => {
                report.pruned += 1;
                false
            }
        });

        tracing::info!(
            channel = %channel,
            delivered = report.delivered,
            dropped = report.dropped,
            "Published live event"
        );
        report
    }

    pub fn get(&self, channel: Channel) -> Option<serde_json::Value> {
        self.lock().current.get(&channel).map(|e| e.payload.clone())
    }

    pub fn snapshot(&self) -> LiveSnapshot {
        let inner = self.lock();
        LiveSnapshot {
            channels: inner
                .current
                .iter()
                .map(|(channel, event)| (*channel, event.payload.clone()))
                .collect(),
            taken_at: Some(chrono::Utc::now()),
        }
    }

    /// Connections whose client is still listening
    pub fn connection_count(&self) -> usize {
        self.lock()
            .connections
            .values()
            .filter(|sender| !sender.is_closed())
            .count()
    }
}
