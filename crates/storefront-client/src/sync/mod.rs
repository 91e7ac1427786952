//! Live Synchronization
//!
//! ```text
//!   push stream ──┐
//!                 ├──▶ event loop ──▶ SyncState ──▶ watch::Receiver
//!   10 s poll ────┘
//! ```
//!
//! Push gives low latency, the poll bounds staleness when push is down.
//! The loop keeps polling while push reconnects, and all of it stops when
//! the handle is shut down or dropped. A push stream that goes quiet for
//! longer than the idle timeout is treated as dropped, since a half-open
//! socket never reports an error.

pub mod sse;
mod state;

pub use state::SyncState;

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use storefront_core::{LiveEvent, LiveSnapshot};

use crate::error::{ClientError, Result};

/// Push reconnects are never attempted more often than this
pub const MIN_RECONNECT_DELAY: Duration = Duration::from_secs(3);

/// Something received on the push channel
#[derive(Clone, Debug, PartialEq)]
pub enum Pushed {
    Event(LiveEvent),
    /// Proof of life with nothing to apply
    KeepAlive,
}

/// Stream of pushed items
pub type EventStream = Pin<Box<dyn Stream<Item = Result<Pushed>> + Send>>;

/// Opens the push channel for a client
#[async_trait]
pub trait PushSource: Send + Sync {
    async fn connect(&self, client_id: &str) -> Result<EventStream>;
}

/// Full current state for reconciliation
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    async fn snapshot(&self) -> Result<LiveSnapshot>;
}

/// Loop settings
#[derive(Clone, Debug)]
pub struct SyncConfig {
    pub client_id: String,
    pub poll_interval: Duration,
    pub reconnect_delay: Duration,
    /// Bound on connecting and on each poll
    pub request_timeout: Duration,
    /// Silence on an open push stream after which it is reconnected.
    /// The server sends keep-alives every 15 s.
    pub idle_timeout: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            client_id: uuid::Uuid::new_v4().to_string(),
            poll_interval: Duration::from_secs(10),
            reconnect_delay: Duration::from_secs(5),
            request_timeout: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(30),
        }
    }
}

/// Entry point for a sync session
pub struct LiveSync {
    push: Arc<dyn PushSource>,
    poll: Arc<dyn SnapshotSource>,
    config: SyncConfig,
    state: watch::Sender<SyncState>,
    cancel: CancellationToken,
}

impl LiveSync {
    /// Start the event loop on the current runtime
    pub fn spawn(
        push: Arc<dyn PushSource>,
        poll: Arc<dyn SnapshotSource>,
        config: SyncConfig,
    ) -> LiveSyncHandle {
        let (state, receiver) = watch::channel(SyncState::default());
        let cancel = CancellationToken::new();

        let session = Self {
            push,
            poll,
            config,
            state,
            cancel: cancel.clone(),
        };
        let task = tokio::spawn(session.run());

        LiveSyncHandle {
            state: receiver,
            cancel,
            task: Some(task),
        }
    }

    async fn run(self) {
        let reconnect_delay = self.config.reconnect_delay.max(MIN_RECONNECT_DELAY);
        let mut ticker = tokio::time::interval(self.config.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let idle_timeout = self.config.idle_timeout;
        let mut stream: Option<EventStream> = None;
        let mut reconnect_at = Instant::now();
        let mut idle_deadline = Instant::now();

        tracing::info!(client_id = %self.config.client_id, "Live sync started");

        loop {
            tokio::select! {
                biased;

                () = self.cancel.cancelled() => break,

                _ = ticker.tick() => self.reconcile().await,

                () = tokio::time::sleep_until(reconnect_at), if stream.is_none() => {
                    match self.open_push().await {
                        Ok(opened) => {
                            stream = Some(opened);
                            idle_deadline = Instant::now() + idle_timeout;
                            self.state.send_if_modified(|s| s.set_push_connected(true));
                        }
                        Err(e) => {
                            tracing::debug!(error = %e, "Push connect failed; polling continues");
                            reconnect_at = Instant::now() + reconnect_delay;
                        }
                    }
                }

                item = next_event(&mut stream, idle_deadline) => match item {
                    Some(Ok(pushed)) => {
                        idle_deadline = Instant::now() + idle_timeout;
                        if let Pushed::Event(event) = pushed {
                            self.state.send_if_modified(|s| s.apply_event(&event));
                        }
                    }
                    Some(Err(e)) => {
                        tracing::warn!(error = %e, "Push stream failed; reconnecting later");
                        stream = None;
                        reconnect_at = Instant::now() + reconnect_delay;
                        self.state.send_if_modified(|s| s.set_push_connected(false));
                    }
                    None => {
                        tracing::info!("Push stream closed by server; reconnecting later");
                        stream = None;
                        reconnect_at = Instant::now() + reconnect_delay;
                        self.state.send_if_modified(|s| s.set_push_connected(false));
                    }
                },
            }
        }

        tracing::info!(client_id = %self.config.client_id, "Live sync stopped");
    }

    async fn open_push(&self) -> Result<EventStream> {
        tokio::time::timeout(
            self.config.request_timeout,
            self.push.connect(&self.config.client_id),
        )
        .await
        .map_err(|_| ClientError::Timeout("push connect".into()))?
    }

    async fn reconcile(&self) {
        match tokio::time::timeout(self.config.request_timeout, self.poll.snapshot()).await {
            Ok(Ok(snapshot)) => {
                self.state.send_modify(|s| {
                    s.apply_snapshot(&snapshot);
                });
            }
            Ok(Err(e)) => tracing::warn!(error = %e, "Reconciliation poll failed"),
            Err(_) => tracing::warn!("Reconciliation poll timed out"),
        }
    }
}

/// Next pushed item, or never when no stream is open. Silence past
/// `deadline` comes back as a timeout error.
async fn next_event(
    stream: &mut Option<EventStream>,
    deadline: Instant,
) -> Option<Result<Pushed>> {
    match stream {
        Some(s) => match tokio::time::timeout_at(deadline, s.next()).await {
            Ok(item) => item,
            Err(_) => Some(Err(ClientError::Timeout("push stream went silent".into()))),
        },
        None => std::future::pending().await,
    }
}

/// Owner of a running sync session.
///
/// Dropping the handle stops the loop; [`Self::shutdown`] also waits for
/// it to finish.
pub struct LiveSyncHandle {
    state: watch::Receiver<SyncState>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl LiveSyncHandle {
    pub fn subscribe(&self) -> watch::Receiver<SyncState> {
        self.state.clone()
    }

    pub fn current(&self) -> SyncState {
        self.state.borrow().clone()
    }

    /// Stop the loop and wait for it, closing the push stream
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "Live sync task ended abnormally");
            }
        }
    }
}

impl Drop for LiveSyncHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
