//! # View Domains
//!
//! A domain says which events make an entity a candidate, how an entity's
//! state is classified into buckets, and how live events and local write
//! receipts patch a view.
//!
//! Four domains ship with the crate:
//! - [`Friends`]: counterpart accounts, bucketed by relation status
//! - [`Groups`]: groups the account created or was added to
//! - [`GroupMessages`]: messages logged to one group
//! - [`Sessions`]: open one-to-one sessions, listed by the ledger's
//!   per-account index
//!
//! Domains are pure: they never perform I/O. Whatever needs the ledger is
//! returned as an instruction (`LiveAction`, `OptimisticPlan`) for the live
//! layer to carry out.

mod friends;
mod groups;
mod messages;
mod sessions;

pub use friends::Friends;
pub use groups::Groups;
pub use messages::GroupMessages;
pub use sessions::Sessions;

use crate::pending::PendingEffect;
use crate::schema::{ActionKind, DecodedEvent, Emitted, EventKind, LogQuery, Receipt};
use crate::view::{Bucket, EntityState};
use crate::{Address, Entity};

/// How candidates are discovered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Discovery {
    /// Narrow-then-full scan of the event log.
    LogScan,
    /// The ledger keeps a per-account list of session ids. One point query
    /// returns every candidate and no log is scanned.
    SessionIndex,
}

/// Where an entity's authoritative state comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Ask the ledger's state accessor for each candidate.
    PointQuery,
    /// The log record is the state; no point query is made.
    FromLog,
}

/// What the live layer should do with one subscribed event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LiveAction {
    Ignore,
    /// Drop the entity from the confirmed tier.
    Remove(Entity),
    /// Point-query the entity and re-place it.
    Resolve(Entity),
    /// Point-query the entity again, but only if the view already holds it.
    Refetch(Entity),
    /// The event carries the entity's full state.
    Upsert { entity: Entity, state: EntityState },
    /// Run a full refresh.
    Refresh,
}

/// What the live layer should do with a confirmed local write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptimisticPlan {
    /// Stage this effect in the pending tier.
    Apply(PendingEffect),
    /// Point-query the entity, then stage it as pending.
    Resolve { entity: Entity, action: ActionKind },
    /// The receipt cannot be applied locally; run a full refresh.
    Refresh(String),
    /// The write does not concern this domain.
    Ignore,
}

/// A kind of materialized view.
pub trait Domain: Send + Sync {
    /// Short stable name, used in logs and output.
    fn name(&self) -> &'static str;

    /// Range queries whose results may name candidates for `account`.
    fn scan_queries(&self, account: &Address) -> Vec<LogQuery>;

    /// The candidate entity an event names for `account`, if any.
    fn candidate(&self, account: &Address, event: &DecodedEvent) -> Option<Entity>;

    fn discovery(&self) -> Discovery {
        Discovery::LogScan
    }

    fn resolution(&self) -> Resolution {
        Resolution::PointQuery
    }

    /// State carried by the log itself. Only consulted for
    /// [`Resolution::FromLog`] domains.
    fn log_state(&self, _event: &DecodedEvent) -> Option<EntityState> {
        None
    }

    /// Bucket for an entity in `state`, or `None` to leave it out.
    fn classify(&self, state: &EntityState) -> Option<Bucket>;

    /// Event kinds to subscribe to while live.
    fn live_kinds(&self) -> Vec<EventKind>;

    fn live_action(&self, account: &Address, event: &DecodedEvent) -> LiveAction;

    fn optimistic(&self, account: &Address, receipt: &Receipt) -> OptimisticPlan;
}

/// The event a receipt emitted, or why it cannot be applied locally.
fn emitted_or_refresh(receipt: &Receipt) -> Result<DecodedEvent, String> {
    let expected = receipt.action.expected_event();
    match receipt.emitted() {
        Emitted::Decoded(decoded) => Ok(decoded),
        Emitted::Missing => Err(format!("receipt carries no {} log", expected)),
        Emitted::Ambiguous(n) => Err(format!("receipt carries {} {} logs", n, expected)),
        Emitted::Undecodable(e) => Err(format!("receipt log undecodable: {}", e)),
    }
}
