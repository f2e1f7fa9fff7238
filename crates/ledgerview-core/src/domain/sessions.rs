//! # Sessions Domain
//!
//! Entity: a one-to-one session id. The ledger indexes session ids per
//! account, so candidates come from that index rather than from a log scan.
//! Closed sessions are left out of the view.

use super::{Discovery, Domain, LiveAction, OptimisticPlan, emitted_or_refresh};
use crate::pending::{Effect, PendingEffect};
use crate::schema::{DecodedEvent, EventKind, LedgerEvent, LogQuery, Receipt, WriteAction};
use crate::view::{Bucket, EntityState};
use crate::{Address, Entity, Uint256};

/// Open sessions of one account, newest first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Sessions;

fn mismatch(emitted: Uint256, targeted: Uint256) -> OptimisticPlan {
    OptimisticPlan::Refresh(format!(
        "receipt names session #{} but the action targeted session #{}",
        emitted, targeted
    ))
}

impl Domain for Sessions {
    fn name(&self) -> &'static str {
        "sessions"
    }

    fn scan_queries(&self, _account: &Address) -> Vec<LogQuery> {
        Vec::new()
    }

    fn candidate(&self, _account: &Address, _event: &DecodedEvent) -> Option<Entity> {
        None
    }

    fn discovery(&self) -> Discovery {
        Discovery::SessionIndex
    }

    fn classify(&self, state: &EntityState) -> Option<Bucket> {
        match state {
            EntityState::Session(info) if info.participant && !info.closed => Some(Bucket::Listed),
            _ => None,
        }
    }

    fn live_kinds(&self) -> Vec<EventKind> {
        vec![
            EventKind::SessionCreated,
            EventKind::SessionMessage,
            EventKind::SessionEnded,
        ]
    }

    fn live_action(&self, account: &Address, event: &DecodedEvent) -> LiveAction {
        match &event.event {
            LedgerEvent::SessionCreated { session_id, .. } if event.event.involves(account) => {
                LiveAction::Resolve(Entity::session(*session_id))
            }
            // The sender alone does not say who the other party is.
            LedgerEvent::SessionMessage { session_id, .. } => {
                LiveAction::Refetch(Entity::session(*session_id))
            }
            LedgerEvent::SessionEnded { session_id, .. } => {
                LiveAction::Remove(Entity::session(*session_id))
            }
            _ => LiveAction::Ignore,
        }
    }

    fn optimistic(&self, account: &Address, receipt: &Receipt) -> OptimisticPlan {
        if !matches!(
            receipt.action,
            WriteAction::CreateSession { .. }
                | WriteAction::SendSessionMessage { .. }
                | WriteAction::EndSession { .. }
        ) {
            return OptimisticPlan::Ignore;
        }

        let decoded = match emitted_or_refresh(receipt) {
            Ok(decoded) => decoded,
            Err(reason) => return OptimisticPlan::Refresh(reason),
        };
        if !decoded.event.involves(account) {
            return OptimisticPlan::Refresh("receipt event names another account".to_string());
        }

        match (&receipt.action, decoded.event) {
            // The record's timestamp and last message are not in the log.
            (WriteAction::CreateSession { .. }, LedgerEvent::SessionCreated { session_id, .. }) => {
                OptimisticPlan::Resolve {
                    entity: Entity::session(session_id),
                    action: receipt.action.kind(),
                }
            }
            (
                WriteAction::SendSessionMessage { session_id, .. },
                LedgerEvent::SessionMessage {
                    session_id: emitted,
                    ..
                },
            ) => {
                if emitted != *session_id {
                    return mismatch(emitted, *session_id);
                }
                OptimisticPlan::Resolve {
                    entity: Entity::session(emitted),
                    action: receipt.action.kind(),
                }
            }
            (
                WriteAction::EndSession { session_id },
                LedgerEvent::SessionEnded {
                    session_id: emitted,
                    ..
                },
            ) => {
                if emitted != *session_id {
                    return mismatch(emitted, *session_id);
                }
                OptimisticPlan::Apply(PendingEffect {
                    entity: Entity::session(emitted),
                    action: receipt.action.kind(),
                    effect: Effect::Remove,
                    height: receipt.height,
                })
            }
            _ => OptimisticPlan::Refresh("receipt event does not match the action".to_string()),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
