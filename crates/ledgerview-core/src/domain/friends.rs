//! # Friends Domain
//!
//! Entity: the counterpart account. Buckets follow the relation status the
//! ledger reports for (viewer, counterpart).

use super::{Domain, LiveAction, OptimisticPlan, emitted_or_refresh};
use crate::pending::{Effect, PendingEffect};
use crate::schema::{DecodedEvent, EventKind, LedgerEvent, LogQuery, Receipt, WriteAction};
use crate::view::{Bucket, EntityState, RelationStatus};
use crate::{Address, Entity};

/// Friend requests and friendships of one account.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Friends;

/// The non-self party of a friend event that names `account`.
fn counterpart(account: &Address, event: &LedgerEvent) -> Option<Address> {
    let (a, b) = match event {
        LedgerEvent::FriendRequestSent { from, to }
        | LedgerEvent::FriendRequestAccepted { from, to }
        | LedgerEvent::FriendRequestDeclined { from, to } => (from, to),
        LedgerEvent::FriendRemoved { user, ex_friend } => (user, ex_friend),
        _ => return None,
    };
    if a == account && b != account {
        Some(b.clone())
    } else if b == account && a != account {
        Some(a.clone())
    } else {
        None
    }
}

impl Domain for Friends {
    fn name(&self) -> &'static str {
        "friends"
    }

    fn scan_queries(&self, account: &Address) -> Vec<LogQuery> {
        // Both directions for every kind: a relationship is discoverable from
        // either side.
        vec![
            LogQuery::new(EventKind::FriendRequestSent).topic(1, account),
            LogQuery::new(EventKind::FriendRequestSent).topic(0, account),
            LogQuery::new(EventKind::FriendRequestAccepted).topic(1, account),
            LogQuery::new(EventKind::FriendRequestAccepted).topic(0, account),
            LogQuery::new(EventKind::FriendRemoved).topic(0, account),
            LogQuery::new(EventKind::FriendRemoved).topic(1, account),
        ]
    }

    fn candidate(&self, account: &Address, event: &DecodedEvent) -> Option<Entity> {
        counterpart(account, &event.event).map(Entity::account)
    }

    fn classify(&self, state: &EntityState) -> Option<Bucket> {
        match state {
            EntityState::Relation { status } => match status {
                RelationStatus::Sent => Some(Bucket::Outgoing),
                RelationStatus::Received => Some(Bucket::Incoming),
                RelationStatus::Friends => Some(Bucket::Established),
                RelationStatus::None => None,
            },
            _ => None,
        }
    }

    fn live_kinds(&self) -> Vec<EventKind> {
        vec![
            EventKind::FriendRequestSent,
            EventKind::FriendRequestAccepted,
            EventKind::FriendRequestDeclined,
            EventKind::FriendRemoved,
        ]
    }

    fn live_action(&self, account: &Address, event: &DecodedEvent) -> LiveAction {
        let Some(other) = counterpart(account, &event.event) else {
            return LiveAction::Ignore;
        };
        let entity = Entity::account(other);
        match event.event {
            LedgerEvent::FriendRemoved { .. } => LiveAction::Remove(entity),
            _ => LiveAction::Resolve(entity),
        }
    }

    fn optimistic(&self, account: &Address, receipt: &Receipt) -> OptimisticPlan {
        let (target, effect) = match &receipt.action {
            WriteAction::SendFriendRequest { to } => (to, place(Bucket::Outgoing, RelationStatus::Sent)),
            WriteAction::AcceptFriendRequest { from } => {
                (from, place(Bucket::Established, RelationStatus::Friends))
            }
            WriteAction::DeclineFriendRequest { from } => (from, Effect::Remove),
            WriteAction::RemoveFriend { friend } => (friend, Effect::Remove),
            _ => return OptimisticPlan::Ignore,
        };

        let decoded = match emitted_or_refresh(receipt) {
            Ok(decoded) => decoded,
            Err(reason) => return OptimisticPlan::Refresh(reason),
        };

        match counterpart(account, &decoded.event) {
            Some(other) if other == *target => OptimisticPlan::Apply(PendingEffect {
                entity: Entity::account(other),
                action: receipt.action.kind(),
                effect,
                height: receipt.height,
            }),
            Some(other) => OptimisticPlan::Refresh(format!(
                "receipt names {} but the action targeted {}",
                other.short(),
                target.short()
            )),
            None => OptimisticPlan::Refresh("receipt does not name the viewing account".to_string()),
        }
    }
}

fn place(bucket: Bucket, status: RelationStatus) -> Effect {
    Effect::Place {
        bucket,
        state: EntityState::Relation { status },
    }
}

// =============================================================================
// TESTS
// =============================================================================
