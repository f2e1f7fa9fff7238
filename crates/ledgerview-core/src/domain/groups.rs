//! # Groups Domain
//!
//! Entity: a group id. Groups the account created or was added to are
//! candidates; the group record decides whether they are listed.

use super::{Domain, LiveAction, OptimisticPlan, emitted_or_refresh};
use crate::pending::{Effect, PendingEffect};
use crate::schema::{DecodedEvent, EventKind, LedgerEvent, LogQuery, Receipt, WriteAction};
use crate::view::{Bucket, EntityState};
use crate::{Address, Entity, Uint256};

/// Groups the account belongs to, newest first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Groups;

impl Groups {
    fn removal(receipt: &Receipt, group_id: Uint256, emitted_id: Uint256) -> OptimisticPlan {
        if emitted_id != group_id {
            return OptimisticPlan::Refresh(format!(
                "receipt names group #{} but the action targeted group #{}",
                emitted_id, group_id
            ));
        }
        OptimisticPlan::Apply(PendingEffect {
            entity: Entity::group(group_id),
            action: receipt.action.kind(),
            effect: Effect::Remove,
            height: receipt.height,
        })
    }
}

impl Domain for Groups {
    fn name(&self) -> &'static str {
        "groups"
    }

    fn scan_queries(&self, account: &Address) -> Vec<LogQuery> {
        // The member filter is applied at extraction, not in the query.
        vec![
            LogQuery::new(EventKind::GroupCreated).topic(1, account),
            LogQuery::new(EventKind::GroupMemberAdded),
        ]
    }

    fn candidate(&self, account: &Address, event: &DecodedEvent) -> Option<Entity> {
        match &event.event {
            LedgerEvent::GroupCreated {
                group_id, creator, ..
            } if creator == account => Some(Entity::group(*group_id)),
            LedgerEvent::GroupMemberAdded { group_id, added } if added == account => {
                Some(Entity::group(*group_id))
            }
            _ => None,
        }
    }

    fn classify(&self, state: &EntityState) -> Option<Bucket> {
        match state {
            EntityState::Group(info) if info.exists && info.member => Some(Bucket::Listed),
            _ => None,
        }
    }

    fn live_kinds(&self) -> Vec<EventKind> {
        vec![
            EventKind::GroupCreated,
            EventKind::GroupMemberAdded,
            EventKind::GroupMemberRemoved,
            EventKind::GroupDeleted,
        ]
    }

    fn live_action(&self, account: &Address, event: &DecodedEvent) -> LiveAction {
        match &event.event {
            LedgerEvent::GroupCreated { creator, .. } if creator == account => LiveAction::Refresh,
            LedgerEvent::GroupMemberAdded { added, .. } if added == account => LiveAction::Refresh,
            LedgerEvent::GroupMemberRemoved { group_id, removed } if removed == account => {
                LiveAction::Remove(Entity::group(*group_id))
            }
            LedgerEvent::GroupDeleted { group_id } => LiveAction::Remove(Entity::group(*group_id)),
            _ => LiveAction::Ignore,
        }
    }

    fn optimistic(&self, account: &Address, receipt: &Receipt) -> OptimisticPlan {
        let relevant = match &receipt.action {
            WriteAction::CreateGroup { .. } | WriteAction::DeleteGroup { .. } => true,
            WriteAction::AddMember { member, .. } | WriteAction::RemoveMember { member, .. } => {
                member == account
            }
            _ => false,
        };
        if !relevant {
            return OptimisticPlan::Ignore;
        }

        let decoded = match emitted_or_refresh(receipt) {
            Ok(decoded) => decoded,
            Err(reason) => return OptimisticPlan::Refresh(reason),
        };

        match (&receipt.action, decoded.event) {
            (WriteAction::CreateGroup { .. }, LedgerEvent::GroupCreated { group_id, creator, .. }) => {
                if creator != *account {
                    return OptimisticPlan::Refresh(format!(
                        "group #{} was created by {}",
                        group_id,
                        creator.short()
                    ));
                }
                // The record's timestamp is not in the log.
                OptimisticPlan::Resolve {
                    entity: Entity::group(group_id),
                    action: receipt.action.kind(),
                }
            }
            (WriteAction::AddMember { group_id, .. }, LedgerEvent::GroupMemberAdded { group_id: emitted, .. }) => {
                if emitted != *group_id {
                    return OptimisticPlan::Refresh(format!(
                        "receipt names group #{} but the action targeted group #{}",
                        emitted, group_id
                    ));
                }
                OptimisticPlan::Resolve {
                    entity: Entity::group(emitted),
                    action: receipt.action.kind(),
                }
            }
            (
                WriteAction::RemoveMember { group_id, .. },
                LedgerEvent::GroupMemberRemoved { group_id: emitted, .. },
            )
            | (WriteAction::DeleteGroup { group_id }, LedgerEvent::GroupDeleted { group_id: emitted }) => {
                Self::removal(receipt, *group_id, emitted)
            }
            _ => OptimisticPlan::Refresh("receipt event does not match the action".to_string()),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
