//! # Group Messages Domain
//!
//! A listing of the messages logged to one group. Messages are immutable log
//! records, so each message's state is read straight from its event.

use super::{Domain, LiveAction, OptimisticPlan, Resolution, emitted_or_refresh};
use crate::pending::{Effect, PendingEffect};
use crate::schema::{DecodedEvent, EventKind, LedgerEvent, LogQuery, Receipt, WriteAction};
use crate::view::{Bucket, EntityState, MessageInfo};
use crate::{Address, Entity, Uint256};

/// Messages of the selected group, newest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupMessages {
    pub group: Uint256,
}

impl GroupMessages {
    #[must_use]
    pub const fn new(group: Uint256) -> Self {
        Self { group }
    }

    fn record(&self, event: &DecodedEvent) -> Option<(Entity, EntityState)> {
        match &event.event {
            LedgerEvent::GroupMessage {
                group_id,
                from,
                cid,
                ts,
            } if *group_id == self.group => Some((
                Entity::message(*group_id, event.height, event.log_index),
                EntityState::Message(MessageInfo {
                    group_id: *group_id,
                    from: from.clone(),
                    cid: cid.clone(),
                    ts: *ts,
                }),
            )),
            _ => None,
        }
    }
}

impl Domain for GroupMessages {
    fn name(&self) -> &'static str {
        "group_messages"
    }

    fn scan_queries(&self, _account: &Address) -> Vec<LogQuery> {
        vec![LogQuery::new(EventKind::GroupMessage).topic(0, self.group)]
    }

    fn candidate(&self, _account: &Address, event: &DecodedEvent) -> Option<Entity> {
        self.record(event).map(|(entity, _)| entity)
    }

    fn resolution(&self) -> Resolution {
        Resolution::FromLog
    }

    fn log_state(&self, event: &DecodedEvent) -> Option<EntityState> {
        self.record(event).map(|(_, state)| state)
    }

    fn classify(&self, state: &EntityState) -> Option<Bucket> {
        match state {
            EntityState::Message(info) if info.group_id == self.group => Some(Bucket::Listed),
            _ => None,
        }
    }

    fn live_kinds(&self) -> Vec<EventKind> {
        vec![EventKind::GroupMessage]
    }

    fn live_action(&self, _account: &Address, event: &DecodedEvent) -> LiveAction {
        match self.record(event) {
            Some((entity, state)) => LiveAction::Upsert { entity, state },
            None => LiveAction::Ignore,
        }
    }

    fn optimistic(&self, account: &Address, receipt: &Receipt) -> OptimisticPlan {
        let WriteAction::SendGroupMessage { group_id, .. } = &receipt.action else {
            return OptimisticPlan::Ignore;
        };
        if *group_id != self.group {
            return OptimisticPlan::Refresh(format!(
                "message sent to group #{} while viewing group #{}",
                group_id, self.group
            ));
        }

        let decoded = match emitted_or_refresh(receipt) {
            Ok(decoded) => decoded,
            Err(reason) => return OptimisticPlan::Refresh(reason),
        };
        let Some((entity, state)) = self.record(&decoded) else {
            return OptimisticPlan::Refresh("receipt message names another group".to_string());
        };
        if !decoded.event.involves(account) {
            return OptimisticPlan::Refresh("receipt message has another sender".to_string());
        }

        OptimisticPlan::Apply(PendingEffect {
            entity,
            action: receipt.action.kind(),
            effect: Effect::Place {
                bucket: Bucket::Listed,
                state,
            },
            height: receipt.height,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(n: u64) -> Address {
        Address::from_low_u64(n)
    }

    fn message(group: u64, from: u64, ts: u64) -> LedgerEvent {
        LedgerEvent::GroupMessage {
            group_id: Uint256::from(group),
            from: addr(from),
            cid: format!("cid-{}", ts),
            ts,
        }
    }

    #[test]
    fn state_comes_from_the_log() {
        let domain = GroupMessages::new(Uint256::from(4));
        let event = DecodedEvent {
            height: 70,
            log_index: 2,
            event: message(4, 1, 1_000),
        };

        assert_eq!(domain.resolution(), Resolution::FromLog);
        assert_eq!(
            domain.candidate(&addr(9), &event),
            Some(Entity::message(Uint256::from(4), 70, 2))
        );
        let state = domain.log_state(&event);
        assert_eq!(state.as_ref().map(EntityState::recency), Some(1_000));
        assert_eq!(state.and_then(|s| domain.classify(&s)), Some(Bucket::Listed));
    }

    #[test]
    fn other_groups_are_ignored_live() {
        let domain = GroupMessages::new(Uint256::from(4));
        let event = DecodedEvent {
            height: 70,
            log_index: 0,
            event: message(5, 1, 1_000),
        };
        assert_eq!(domain.live_action(&addr(1), &event), LiveAction::Ignore);
    }

    #[test]
    fn own_send_is_placed_at_its_log_position() {
        let me = addr(1);
        let domain = GroupMessages::new(Uint256::from(4));
        let receipt = Receipt {
            action: WriteAction::SendGroupMessage {
                group_id: Uint256::from(4),
                cid: "cid-9".to_string(),
            },
            height: 80,
            logs: vec![message(4, 1, 9).to_raw(80, 3)],
        };

        assert_eq!(
            domain.optimistic(&me, &receipt),
            OptimisticPlan::Apply(PendingEffect {
                entity: Entity::message(Uint256::from(4), 80, 3),
                action: crate::schema::ActionKind::SendGroupMessage,
                effect: Effect::Place {
                    bucket: Bucket::Listed,
                    state: EntityState::Message(MessageInfo {
                        group_id: Uint256::from(4),
                        from: me.clone(),
                        cid: "cid-9".to_string(),
                        ts: 9,
                    }),
                },
                height: 80,
            })
        );
    }

    #[test]
    fn send_to_another_group_refreshes() {
        let me = addr(1);
        let domain = GroupMessages::new(Uint256::from(4));
        let receipt = Receipt {
            action: WriteAction::SendGroupMessage {
                group_id: Uint256::from(6),
                cid: "x".to_string(),
            },
            height: 80,
            logs: vec![message(6, 1, 9).to_raw(80, 0)],
        };
        assert!(matches!(
            domain.optimistic(&me, &receipt),
            OptimisticPlan::Refresh(_)
        ));
    }
}
