//! # Live Reconciler
//!
//! Owns at most one live subscription for a view.
//!
//! ```text
//!   Idle ──activate──▶ Subscribed
//!    ▲                    │
//!    └──deactivate / feed closed
//! ```
//!
//! Activation subscribes to every kind the domain watches and spawns one
//! pump task that merges the feeds and hands each decoded event to the
//! owner's handler, one at a time. Deactivation aborts the pump, which drops
//! the feeds and so unsubscribes. It is idempotent.

use crate::source::{EventFeed, LogSource};
use futures::stream::{self, BoxStream, StreamExt};
use ledgerview_core::{DecodedEvent, EventKind, ViewError};
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::task::JoinHandle;

/// Subscription state of a view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcilerState {
    Idle,
    Subscribed,
}

/// What the pump delivers to the view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LiveSignal {
    Event(DecodedEvent),
    /// A feed closed underneath an active subscription.
    Lost(String),
}

enum FeedItem {
    Event(ledgerview_core::RawEvent),
    Closed(EventKind),
}

fn feed_stream(feed: EventFeed) -> BoxStream<'static, FeedItem> {
    stream::unfold(Some(feed), |state| async move {
        let mut feed = state?;
        match feed.recv().await {
            Some(raw) => Some((FeedItem::Event(raw), Some(feed))),
            None => Some((FeedItem::Closed(feed.kind()), None)),
        }
    })
    .boxed()
}

/// Idle/Subscribed state machine around one pump task.
#[derive(Debug)]
pub struct LiveReconciler {
    pump: Option<JoinHandle<()>>,
    live: Arc<AtomicBool>,
}

impl Default for LiveReconciler {
    fn default() -> Self {
        Self::new()
    }
}

impl LiveReconciler {
    #[must_use]
    pub fn new() -> Self {
        Self {
            pump: None,
            live: Arc::new(AtomicBool::new(false)),
        }
    }

    #[must_use]
    pub fn state(&self) -> ReconcilerState {
        if self.pump.is_some() && self.live.load(Ordering::SeqCst) {
            ReconcilerState::Subscribed
        } else {
            ReconcilerState::Idle
        }
    }

    /// Subscribe to `kinds` and start delivering signals to `handler`.
    ///
    /// Does nothing if already subscribed.
    pub async fn activate<S, F, Fut>(
        &mut self,
        source: &S,
        kinds: &[EventKind],
        handler: F,
    ) -> Result<(), ViewError>
    where
        S: LogSource + ?Sized,
        F: Fn(LiveSignal) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        if self.state() == ReconcilerState::Subscribed {
            return Ok(());
        }
        // A pump whose feed closed is finished; release it before resubscribing.
        self.deactivate();

        let mut feeds = Vec::with_capacity(kinds.len());
        for kind in kinds {
            // On failure the feeds acquired so far drop here and unsubscribe.
            let feed = source.subscribe(*kind).await.map_err(|e| {
                ViewError::SubscriptionLost(format!("subscribe to {}: {}", kind, e))
            })?;
            feeds.push(feed);
        }

        let live = Arc::new(AtomicBool::new(true));
        let pump_live = Arc::clone(&live);
        let mut merged = stream::select_all(feeds.into_iter().map(feed_stream));

        let pump = tokio::spawn(async move {
            while let Some(item) = merged.next().await {
                match item {
                    FeedItem::Event(raw) => match raw.decode() {
                        Ok(event) => handler(LiveSignal::Event(event)).await,
                        Err(e) => {
                            tracing::debug!(error = %e, height = raw.height, "Skipped malformed live event");
                        }
                    },
                    FeedItem::Closed(kind) => {
                        pump_live.store(false, Ordering::SeqCst);
                        handler(LiveSignal::Lost(format!("{} feed closed", kind))).await;
                        break;
                    }
                }
            }
            pump_live.store(false, Ordering::SeqCst);
        });

        tracing::info!(kinds = kinds.len(), "Live subscription active");
        self.live = live;
        self.pump = Some(pump);
        Ok(())
    }

    /// Release the subscription. Returns `true` if one was held.
    pub fn deactivate(&mut self) -> bool {
        self.live.store(false, Ordering::SeqCst);
        match self.pump.take() {
            Some(pump) => {
                pump.abort();
                tracing::info!("Live subscription released");
                true
            }
            None => false,
        }
    }
}

impl Drop for LiveReconciler {
    fn drop(&mut self) {
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
