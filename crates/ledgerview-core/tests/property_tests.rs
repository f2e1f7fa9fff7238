//! # Property-Based Tests
//!
//! Partitioning, corruption isolation and identifier normalization.

#![allow(clippy::unwrap_used, clippy::panic)]

use ledgerview_core::{
    ActionKind, Address, Bucket, CandidateExtractor, Domain, Effect, Entity, EntityState, EventKind,
    Friends, LedgerEvent, MaterializedView, PendingEffect, RawArg, RawEvent, RelationStatus,
    Uint256, ViewEntry, ViewState,
};
use proptest::collection::vec;
use proptest::prelude::*;
use std::collections::BTreeSet;

fn addr(n: u64) -> Address {
    Address::from_low_u64(n)
}

/// `None` models a point query that reports "not found".
fn status_strategy() -> impl Strategy<Value = Option<RelationStatus>> {
    prop_oneof![
        Just(None),
        (0u8..4).prop_map(RelationStatus::from_code),
    ]
}

fn friend_event(me: &Address, peer: u64, kind: u8, outbound: bool) -> LedgerEvent {
    let (a, b) = if outbound {
        (me.clone(), addr(peer))
    } else {
        (addr(peer), me.clone())
    };
    match kind % 3 {
        0 => LedgerEvent::FriendRequestSent { from: a, to: b },
        1 => LedgerEvent::FriendRequestAccepted { from: a, to: b },
        _ => LedgerEvent::FriendRemoved {
            user: a,
            ex_friend: b,
        },
    }
}

fn corrupt(height: u64, flavor: u8) -> RawEvent {
    let args = match flavor % 3 {
        0 => vec![],
        1 => vec![RawArg::Uint("12".to_string()), RawArg::Uint("13".to_string())],
        _ => vec![
            RawArg::Address("0x12".to_string()),
            RawArg::Address("0xzz".to_string()),
        ],
    };
    RawEvent {
        kind: EventKind::FriendRequestSent,
        height,
        log_index: u32::MAX,
        args,
    }
}

proptest! {
    /// Buckets are disjoint and cover exactly the found, classifiable
    /// candidates.
    #[test]
    fn resolve_partitions_candidates(statuses in vec(status_strategy(), 0..40)) {
        let resolved: Vec<(Entity, Option<EntityState>)> = statuses
            .iter()
            .enumerate()
            .map(|(i, s)| {
                (
                    Entity::account(addr(i as u64 + 2)),
                    s.map(|status| EntityState::Relation { status }),
                )
            })
            .collect();

        let view = MaterializedView::assemble(&Friends, 1, resolved.clone());

        let expected: BTreeSet<Entity> = resolved
            .iter()
            .filter(|(_, s)| matches!(s, Some(EntityState::Relation { status }) if *status != RelationStatus::None))
            .map(|(e, _)| e.clone())
            .collect();

        let membership = view.membership();
        let mut seen = BTreeSet::new();
        for members in membership.values() {
            for entity in members {
                prop_assert!(seen.insert(entity.clone()), "entity in two buckets");
            }
        }
        prop_assert_eq!(seen, expected);

        for entry in view.entries() {
            prop_assert_eq!(Friends.classify(&entry.state), Some(entry.bucket));
        }
    }

    /// A malformed event never removes candidates found by the valid ones.
    #[test]
    fn corruption_is_isolated(
        specs in vec((2u64..30, 0u8..3, any::<bool>()), 0..30),
        at in 0usize..31,
        flavor in 0u8..3,
    ) {
        let me = addr(1);
        let clean: Vec<RawEvent> = specs
            .iter()
            .enumerate()
            .map(|(i, (peer, kind, outbound))| {
                friend_event(&me, *peer, *kind, *outbound).to_raw(i as u64, 0)
            })
            .collect();

        let mut dirty = clean.clone();
        dirty.insert(at.min(dirty.len()), corrupt(7, flavor));

        let a = CandidateExtractor::extract(&Friends, &me, &clean);
        let b = CandidateExtractor::extract(&Friends, &me, &dirty);

        prop_assert_eq!(&a.candidates, &b.candidates);
        prop_assert_eq!(b.skipped.len(), 1);
        prop_assert_eq!(b.scanned, a.scanned + 1);
        prop_assert!(!a.candidates.contains(&Entity::account(me.clone())));
    }

    /// Address case never affects identity.
    #[test]
    fn address_case_is_normalized(bytes in vec(any::<u8>(), 20), mask in vec(any::<bool>(), 40)) {
        let lower: String = bytes.iter().map(|b| format!("{:02x}", b)).collect();
        let mixed: String = lower
            .chars()
            .zip(mask.iter())
            .map(|(c, up)| if *up { c.to_ascii_uppercase() } else { c })
            .collect();

        let a = Address::parse(&format!("0x{}", lower)).unwrap();
        let b = Address::parse(&format!("0x{}", mixed)).unwrap();
        prop_assert_eq!(&a, &b);
        prop_assert_eq!(a.as_str(), format!("0x{}", lower));
    }

    /// Decimal and hex spellings of an integer are the same identifier.
    #[test]
    fn integer_spellings_are_canonical(n in any::<u64>()) {
        let dec = Uint256::parse(&n.to_string()).unwrap();
        let hex = Uint256::parse(&format!("{:#x}", n)).unwrap();
        prop_assert_eq!(dec, hex);
        prop_assert_eq!(dec, Uint256::from(n));
        prop_assert_eq!(dec.to_string(), n.to_string());
    }

    /// Once the confirmed tier shows a staged effect, the merged view equals
    /// the confirmed view.
    #[test]
    fn pending_converges_with_confirmed(peer in 2u64..1000, receipt_height in 1u64..1000, lag in 0u64..5) {
        let entity = Entity::account(addr(peer));
        let state = EntityState::Relation { status: RelationStatus::Sent };

        let mut view_state = ViewState::new("friends");
        view_state.stage(PendingEffect {
            entity: entity.clone(),
            action: ActionKind::SendFriendRequest,
            effect: Effect::Place { bucket: Bucket::Outgoing, state: state.clone() },
            height: receipt_height,
        });
        let optimistic = view_state.merged().membership();

        let mut confirmed = MaterializedView::new("friends", receipt_height.saturating_sub(lag));
        confirmed.insert(ViewEntry { entity, bucket: Bucket::Outgoing, state });
        view_state.install(confirmed.clone());

        prop_assert!(view_state.pending().is_empty());
        prop_assert_eq!(view_state.merged(), confirmed);
        prop_assert_eq!(view_state.merged().membership(), optimistic);
    }
}
