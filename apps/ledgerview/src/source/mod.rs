//! # Log Source
//!
//! The boundary to the external ledger: log height, filtered range queries,
//! live feeds, authoritative point queries, the per-account session index,
//! the username registry and confirmed writes.
//!
//! Every call here is a suspension point. Everything downstream of it is
//! synchronous transformation in `ledgerview-core`.

mod memory;

pub use memory::{Fixture, FixtureStep, MemoryLedger};

use async_trait::async_trait;
use ledgerview_core::{
    Address, Entity, EntityState, EventKind, LogQuery, RawEvent, Receipt, ScanWindow, Uint256,
    ViewError, WriteAction,
};
use thiserror::Error;
use tokio::sync::mpsc;

// =============================================================================
// ERRORS
// =============================================================================

/// Failures reported by a log source.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceError {
    /// The requested range is wider than the source serves in one call.
    #[error("range of {requested} heights exceeds the limit of {limit}")]
    RangeTooLarge { requested: u64, limit: u64 },

    /// Transient failure: network, node restart, rate limiting.
    #[error("source unavailable: {0}")]
    Unavailable(String),

    /// The ledger rejected a write.
    #[error("write reverted: {0}")]
    Reverted(String),

    #[error("feed closed: {0}")]
    FeedClosed(String),
}

impl From<SourceError> for ViewError {
    fn from(e: SourceError) -> Self {
        match e {
            SourceError::RangeTooLarge { .. } | SourceError::Unavailable(_) => {
                ViewError::ScanFailed(e.to_string())
            }
            SourceError::Reverted(reason) => ViewError::WriteRejected(reason),
            SourceError::FeedClosed(reason) => ViewError::SubscriptionLost(reason),
        }
    }
}

// =============================================================================
// LIVE FEED
// =============================================================================

/// Newly appended events of one kind. Dropping the feed unsubscribes.
#[derive(Debug)]
pub struct EventFeed {
    kind: EventKind,
    rx: mpsc::UnboundedReceiver<RawEvent>,
}

impl EventFeed {
    #[must_use]
    pub fn new(kind: EventKind, rx: mpsc::UnboundedReceiver<RawEvent>) -> Self {
        Self { kind, rx }
    }

    #[must_use]
    pub fn kind(&self) -> EventKind {
        self.kind
    }

    /// Next event, or `None` once the source has closed the feed.
    pub async fn recv(&mut self) -> Option<RawEvent> {
        self.rx.recv().await
    }
}

// =============================================================================
// LOG SOURCE TRAIT
// =============================================================================

/// Access to an append-only ledger event log.
#[async_trait]
pub trait LogSource: Send + Sync + 'static {
    /// Height of the latest appended log.
    async fn current_height(&self) -> Result<u64, SourceError>;

    /// Events matching `query` inside `window`, in append order.
    async fn query_range(
        &self,
        query: &LogQuery,
        window: ScanWindow,
    ) -> Result<Vec<RawEvent>, SourceError>;

    /// Feed of events of `kind` appended from now on.
    async fn subscribe(&self, kind: EventKind) -> Result<EventFeed, SourceError>;

    /// Current state of `entity` as seen by `account`, or `None` if the
    /// ledger reports it does not exist.
    async fn point_query(
        &self,
        account: &Address,
        entity: &Entity,
    ) -> Result<Option<EntityState>, SourceError>;

    /// Every session id `account` is a party to, open or closed.
    async fn sessions_of(&self, account: &Address) -> Result<Vec<Uint256>, SourceError>;

    /// The address registered under `username`. The zero address means the
    /// name is not registered.
    async fn address_of_username(&self, username: &str) -> Result<Address, SourceError>;

    /// Submit `action` as `account` and wait for its receipt.
    async fn confirm_write(
        &self,
        account: &Address,
        action: WriteAction,
    ) -> Result<Receipt, SourceError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_errors_map_to_view_taxonomy() {
        let too_large = SourceError::RangeTooLarge {
            requested: 10,
            limit: 5,
        };
        assert!(matches!(ViewError::from(too_large), ViewError::ScanFailed(_)));
        assert_eq!(
            ViewError::from(SourceError::Reverted("not friends".to_string())),
            ViewError::WriteRejected("not friends".to_string())
        );
        assert!(matches!(
            ViewError::from(SourceError::FeedClosed("x".to_string())),
            ViewError::SubscriptionLost(_)
        ));
    }

    #[tokio::test]
    async fn dropped_sender_closes_feed() {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut feed = EventFeed::new(EventKind::GroupDeleted, rx);
        drop(tx);
        assert_eq!(feed.kind(), EventKind::GroupDeleted);
        assert!(feed.recv().await.is_none());
    }
}
