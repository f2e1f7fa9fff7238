//! # Pending Tier
//!
//! Two-tier view state: a confirmed tier installed by full resolution and
//! patched by live events, and a pending tier staged from the local
//! account's own confirmed writes.
//!
//! The merged view is the confirmed tier overlaid by the pending tier. A
//! pending entry is discarded once the confirmed tier agrees with it, or once
//! the confirmed tier has caught up to the height the write landed at.
//!
//! Live patches are remembered with the height they were observed at. A
//! snapshot read below that height cannot know about them, so installing it
//! replays them on top.

use crate::schema::ActionKind;
use crate::view::{Bucket, EntityState, MaterializedView, ViewEntry};
use crate::Entity;
use std::collections::BTreeMap;

// =============================================================================
// PENDING EFFECTS
// =============================================================================

/// What a local write does to one entity's place in the view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Put the entity in `bucket` with `state`.
    Place { bucket: Bucket, state: EntityState },
    /// Take the entity out of the view.
    Remove,
}

impl Effect {
    fn apply(&self, entity: &Entity, view: &mut MaterializedView) {
        match self {
            Self::Place { bucket, state } => {
                view.insert(ViewEntry {
                    entity: entity.clone(),
                    bucket: *bucket,
                    state: state.clone(),
                });
            }
            Self::Remove => {
                view.remove(entity);
            }
        }
    }
}

/// A local write's expected effect, not yet observed by a fresh scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingEffect {
    pub entity: Entity,
    pub action: ActionKind,
    pub effect: Effect,
    /// Height of the receipt that produced this effect.
    pub height: u64,
}

impl PendingEffect {
    /// Whether `view` already shows this effect, state included.
    #[must_use]
    pub fn agrees_with(&self, view: &MaterializedView) -> bool {
        match &self.effect {
            Effect::Place { bucket, state } => view
                .get(&self.entity)
                .is_some_and(|entry| entry.bucket == *bucket && entry.state == *state),
            Effect::Remove => !view.contains(&self.entity),
        }
    }

    fn apply_to(&self, view: &mut MaterializedView) {
        self.effect.apply(&self.entity, view);
    }
}

/// Pending effects keyed by entity. A newer effect for the same entity
/// replaces the older one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingTier {
    entries: BTreeMap<Entity, PendingEffect>,
}

impl PendingTier {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stage(&mut self, effect: PendingEffect) {
        self.entries.insert(effect.entity.clone(), effect);
    }

    /// Drop every entry the confirmed tier has superseded.
    ///
    /// Returns the number of entries discarded.
    pub fn settle(&mut self, confirmed: &MaterializedView) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|_, p| !(p.agrees_with(confirmed) || confirmed.height() >= p.height));
        before - self.entries.len()
    }

    /// Drop the entry for `entity` if a confirmed observation at `height`
    /// is at least as new as it.
    pub fn settle_entity(&mut self, entity: &Entity, height: u64) -> bool {
        match self.entries.get(entity) {
            Some(p) if height >= p.height => self.entries.remove(entity).is_some(),
            _ => false,
        }
    }

    /// The confirmed view with every pending effect applied on top.
    #[must_use]
    pub fn overlay(&self, confirmed: &MaterializedView) -> MaterializedView {
        let mut merged = confirmed.clone();
        for pending in self.entries.values() {
            pending.apply_to(&mut merged);
        }
        merged
    }

    #[must_use]
    pub fn get(&self, entity: &Entity) -> Option<&PendingEffect> {
        self.entries.get(entity)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// =============================================================================
// LIVE PATCHES
// =============================================================================

/// A live event already folded into the confirmed tier.
#[derive(Debug, Clone, PartialEq, Eq)]
struct LivePatch {
    entity: Entity,
    effect: Effect,
    height: u64,
}

impl LivePatch {
    fn apply_to(&self, view: &mut MaterializedView) {
        self.effect.apply(&self.entity, view);
    }
}

// =============================================================================
// VIEW STATE
// =============================================================================

/// Everything one (account, domain) view owns.
#[derive(Debug, Clone, Default)]
pub struct ViewState {
    confirmed: MaterializedView,
    pending: PendingTier,
    /// Keyed by entity; the newest observation wins.
    patches: BTreeMap<Entity, LivePatch>,
}

impl ViewState {
    #[must_use]
    pub fn new(domain: &'static str) -> Self {
        Self {
            confirmed: MaterializedView::new(domain, 0),
            pending: PendingTier::new(),
            patches: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn confirmed(&self) -> &MaterializedView {
        &self.confirmed
    }

    #[must_use]
    pub fn pending(&self) -> &PendingTier {
        &self.pending
    }

    /// Replace the confirmed tier with a fresh full resolution.
    ///
    /// Live patches newer than the snapshot are applied on top of it; those
    /// it already covers are dropped. Returns the number of pending entries
    /// it superseded.
    pub fn install(&mut self, confirmed: MaterializedView) -> usize {
        let height = confirmed.height();
        self.confirmed = confirmed;
        self.patches.retain(|_, patch| patch.height > height);
        for patch in self.patches.values() {
            patch.apply_to(&mut self.confirmed);
        }
        self.pending.settle(&self.confirmed)
    }

    /// Live patches not yet covered by an installed snapshot.
    #[must_use]
    pub fn live_patches(&self) -> usize {
        self.patches.len()
    }

    fn record(&mut self, entity: &Entity, effect: Effect, height: u64) {
        let newer = self
            .patches
            .get(entity)
            .is_none_or(|existing| height >= existing.height);
        if newer {
            self.patches.insert(
                entity.clone(),
                LivePatch {
                    entity: entity.clone(),
                    effect,
                    height,
                },
            );
        }
        self.pending.settle_entity(entity, height);
    }

    /// Apply a live removal observed at `height`.
    pub fn patch_remove(&mut self, entity: &Entity, height: u64) -> bool {
        let removed = self.confirmed.remove(entity).is_some();
        self.record(entity, Effect::Remove, height);
        removed
    }

    /// Apply a live insert/update observed at `height`.
    pub fn patch_upsert(&mut self, entry: ViewEntry, height: u64) {
        let entity = entry.entity.clone();
        let effect = Effect::Place {
            bucket: entry.bucket,
            state: entry.state.clone(),
        };
        self.confirmed.insert(entry);
        self.record(&entity, effect, height);
    }

    pub fn stage(&mut self, effect: PendingEffect) {
        if effect.agrees_with(&self.confirmed) {
            // An older entry for the entity no longer describes the newest write.
            self.pending.entries.remove(&effect.entity);
            return;
        }
        self.pending.stage(effect);
    }

    /// The view callers should display.
    #[must_use]
    pub fn merged(&self) -> MaterializedView {
        self.pending.overlay(&self.confirmed)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view::RelationStatus;
    use crate::Address;

    fn peer(n: u64) -> Entity {
        Entity::account(Address::from_low_u64(n))
    }

    fn relation(status: RelationStatus) -> EntityState {
        EntityState::Relation { status }
    }

    fn confirmed_with(height: u64, entries: &[(u64, Bucket, RelationStatus)]) -> MaterializedView {
        let mut view = MaterializedView::new("friends", height);
        for (n, bucket, status) in entries {
            view.insert(ViewEntry {
                entity: peer(*n),
                bucket: *bucket,
                state: relation(*status),
            });
        }
        view
    }

    fn place_outgoing(n: u64, height: u64) -> PendingEffect {
        PendingEffect {
            entity: peer(n),
            action: ActionKind::SendFriendRequest,
            effect: Effect::Place {
                bucket: Bucket::Outgoing,
                state: relation(RelationStatus::Sent),
            },
            height,
        }
    }

    #[test]
    fn pending_takes_precedence_in_merge() {
        let mut state = ViewState::new("friends");
        state.install(confirmed_with(5, &[]));
        state.stage(place_outgoing(2, 9));

        let merged = state.merged();
        assert_eq!(merged.get(&peer(2)).map(|e| e.bucket), Some(Bucket::Outgoing));
        assert!(state.confirmed().is_empty());
    }

    #[test]
    fn same_bucket_with_changed_state_is_still_staged() {
        let mut state = ViewState::new("friends");
        state.install(confirmed_with(5, &[(2, Bucket::Outgoing, RelationStatus::Sent)]));

        let mut changed = place_outgoing(2, 9);
        changed.effect = Effect::Place {
            bucket: Bucket::Outgoing,
            state: relation(RelationStatus::None),
        };
        state.stage(changed);
        assert_eq!(state.pending().len(), 1);

        state.stage(place_outgoing(3, 9));
        state.stage(place_outgoing(2, 10));
        // The newest write for peer 2 matches the confirmed tier.
        assert_eq!(state.pending().len(), 1);
        assert!(state.pending().get(&peer(3)).is_some());
    }

    #[test]
    fn agreeing_confirmed_tier_discards_pending() {
        let mut state = ViewState::new("friends");
        state.stage(place_outgoing(2, 9));
        assert_eq!(state.pending().len(), 1);

        let discarded = state.install(confirmed_with(
            8,
            &[(2, Bucket::Outgoing, RelationStatus::Sent)],
        ));
        assert_eq!(discarded, 1);
        assert!(state.pending().is_empty());
    }

    #[test]
    fn stale_confirmed_tier_keeps_pending() {
        let mut state = ViewState::new("friends");
        state.stage(place_outgoing(2, 9));

        state.install(confirmed_with(8, &[]));
        assert_eq!(state.pending().len(), 1);
        assert!(state.merged().contains(&peer(2)));
    }

    #[test]
    fn caught_up_confirmed_tier_wins_over_pending() {
        let mut state = ViewState::new("friends");
        state.stage(place_outgoing(2, 9));

        // Confirmed at or past the receipt height is authoritative.
        state.install(confirmed_with(9, &[]));
        assert!(state.pending().is_empty());
        assert!(!state.merged().contains(&peer(2)));
    }

    #[test]
    fn pending_remove_hides_confirmed_entry() {
        let mut state = ViewState::new("friends");
        state.install(confirmed_with(
            5,
            &[(3, Bucket::Established, RelationStatus::Friends)],
        ));
        state.stage(PendingEffect {
            entity: peer(3),
            action: ActionKind::RemoveFriend,
            effect: Effect::Remove,
            height: 6,
        });

        assert!(state.confirmed().contains(&peer(3)));
        assert!(!state.merged().contains(&peer(3)));
    }

    #[test]
    fn live_patch_settles_older_pending_for_entity() {
        let mut state = ViewState::new("friends");
        state.stage(place_outgoing(2, 9));
        state.stage(place_outgoing(4, 9));

        assert!(!state.patch_remove(&peer(2), 10));
        assert!(state.pending().get(&peer(2)).is_none());
        assert!(state.pending().get(&peer(4)).is_some());
    }

    #[test]
    fn live_removal_survives_an_older_snapshot() {
        let mut state = ViewState::new("friends");
        state.install(confirmed_with(
            2,
            &[(2, Bucket::Established, RelationStatus::Friends)],
        ));
        state.patch_remove(&peer(2), 3);

        // Read at height 2, installed after the removal at 3.
        state.install(confirmed_with(
            2,
            &[(2, Bucket::Established, RelationStatus::Friends)],
        ));
        assert!(!state.merged().contains(&peer(2)));
        assert_eq!(state.live_patches(), 1);

        // A snapshot that has seen height 3 is authoritative.
        state.install(confirmed_with(3, &[]));
        assert_eq!(state.live_patches(), 0);
        assert!(!state.merged().contains(&peer(2)));
    }

    #[test]
    fn live_upsert_survives_an_older_snapshot() {
        let mut state = ViewState::new("friends");
        state.patch_upsert(
            ViewEntry {
                entity: peer(4),
                bucket: Bucket::Incoming,
                state: relation(RelationStatus::Received),
            },
            7,
        );

        state.install(confirmed_with(6, &[]));
        assert_eq!(
            state.merged().get(&peer(4)).map(|e| e.bucket),
            Some(Bucket::Incoming)
        );

        // Covered patches are dropped and the snapshot wins.
        state.install(confirmed_with(
            7,
            &[(4, Bucket::Established, RelationStatus::Friends)],
        ));
        assert_eq!(
            state.merged().get(&peer(4)).map(|e| e.bucket),
            Some(Bucket::Established)
        );
    }

    #[test]
    fn older_observation_does_not_replace_newer_patch() {
        let mut state = ViewState::new("friends");
        state.patch_remove(&peer(2), 9);
        state.patch_upsert(
            ViewEntry {
                entity: peer(2),
                bucket: Bucket::Established,
                state: relation(RelationStatus::Friends),
            },
            8,
        );

        state.install(confirmed_with(
            5,
            &[(2, Bucket::Established, RelationStatus::Friends)],
        ));
        assert!(!state.merged().contains(&peer(2)));
    }

    #[test]
    fn newer_effect_replaces_older_for_same_entity() {
        let mut tier = PendingTier::new();
        tier.stage(place_outgoing(2, 9));
        tier.stage(PendingEffect {
            entity: peer(2),
            action: ActionKind::DeclineFriendRequest,
            effect: Effect::Remove,
            height: 11,
        });
        assert_eq!(tier.len(), 1);
        assert_eq!(
            tier.get(&peer(2)).map(|p| p.action),
            Some(ActionKind::DeclineFriendRequest)
        );
    }

    #[test]
    fn staging_an_already_visible_effect_is_a_no_op() {
        let mut state = ViewState::new("friends");
        state.install(confirmed_with(
            5,
            &[(2, Bucket::Outgoing, RelationStatus::Sent)],
        ));
        state.stage(place_outgoing(2, 9));
        assert!(state.pending().is_empty());
    }
}
