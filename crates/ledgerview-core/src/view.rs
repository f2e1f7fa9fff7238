//! # Materialized View
//!
//! The bucketed, in-memory snapshot of an account's current relationships or
//! records, plus the authoritative state records it is built from.
//!
//! - A view is always assembled from authoritative state, never from the
//!   last-seen event kind
//! - Buckets are mutually exclusive: an entity appears at most once
//! - Entities whose state lookup reports "not found" are dropped here, at
//!   assembly time

use crate::domain::Domain;
use crate::{Address, Entity, Uint256};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

// =============================================================================
// AUTHORITATIVE STATE
// =============================================================================

/// Relation between the viewing account and a counterpart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationStatus {
    None,
    /// The viewing account sent a request.
    Sent,
    /// The counterpart sent a request to the viewing account.
    Received,
    Friends,
}

impl RelationStatus {
    /// Decode the ledger's numeric status code (0..=3).
    #[must_use]
    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::None),
            1 => Some(Self::Sent),
            2 => Some(Self::Received),
            3 => Some(Self::Friends),
            _ => None,
        }
    }

    /// The same relation seen from the other side.
    #[must_use]
    pub const fn mirrored(self) -> Self {
        match self {
            Self::Sent => Self::Received,
            Self::Received => Self::Sent,
            other => other,
        }
    }
}

/// A group record as the ledger reports it for one viewing account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupInfo {
    pub id: Uint256,
    pub name: String,
    pub creator: Address,
    pub created_at: u64,
    pub exists: bool,
    /// Whether the viewing account is currently a member.
    pub member: bool,
}

/// A logged group message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageInfo {
    pub group_id: Uint256,
    pub from: Address,
    pub cid: String,
    pub ts: u64,
}

/// A one-to-one session record as the ledger reports it for one viewing
/// account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionInfo {
    pub id: Uint256,
    /// The account that opened the session.
    pub a: Address,
    pub b: Address,
    pub closed: bool,
    /// Content id of the latest message, empty before the first one.
    pub last_cid: String,
    pub created_at: u64,
    /// Whether the viewing account is `a` or `b`.
    pub participant: bool,
}

impl SessionInfo {
    /// The other party, as seen by `account`.
    #[must_use]
    pub fn peer(&self, account: &Address) -> &Address {
        if self.a == *account { &self.b } else { &self.a }
    }
}

/// Current truth about one entity, as returned by a point query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EntityState {
    Relation { status: RelationStatus },
    Group(GroupInfo),
    Message(MessageInfo),
    Session(SessionInfo),
}

impl EntityState {
    /// Ordering key for listings: larger is newer.
    #[must_use]
    pub fn recency(&self) -> u64 {
        match self {
            Self::Relation { .. } => 0,
            Self::Group(info) => info.created_at,
            Self::Message(info) => info.ts,
            Self::Session(info) => info.created_at,
        }
    }
}

// =============================================================================
// BUCKETS & ENTRIES
// =============================================================================

/// The label an entity carries inside a view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Bucket {
    Outgoing,
    Incoming,
    Established,
    /// Flat listing domains (groups, messages, sessions).
    Listed,
}

impl Bucket {
    /// Settled buckets describe a relationship that is not waiting on anyone.
    #[must_use]
    pub const fn is_settled(self) -> bool {
        matches!(self, Self::Established | Self::Listed)
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Outgoing => "outgoing",
            Self::Incoming => "incoming",
            Self::Established => "established",
            Self::Listed => "listed",
        }
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One classified entity with its authoritative attributes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewEntry {
    pub entity: Entity,
    pub bucket: Bucket,
    pub state: EntityState,
}

// =============================================================================
// MATERIALIZED VIEW
// =============================================================================

/// A partition of resolved entities into buckets.
///
/// `height` is the log height observed by the scan this view was built from.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MaterializedView {
    domain: &'static str,
    height: u64,
    entries: BTreeMap<Entity, ViewEntry>,
}

impl MaterializedView {
    #[must_use]
    pub fn new(domain: &'static str, height: u64) -> Self {
        Self {
            domain,
            height,
            entries: BTreeMap::new(),
        }
    }

    /// Build a view from point-query results.
    ///
    /// `None` states (not found) and states the domain does not classify are
    /// dropped silently.
    pub fn assemble<D, I>(domain: &D, height: u64, resolved: I) -> Self
    where
        D: Domain + ?Sized,
        I: IntoIterator<Item = (Entity, Option<EntityState>)>,
    {
        let mut view = Self::new(domain.name(), height);
        for (entity, state) in resolved {
            let Some(state) = state else { continue };
            if let Some(bucket) = domain.classify(&state) {
                view.insert(ViewEntry {
                    entity,
                    bucket,
                    state,
                });
            }
        }
        view
    }

    /// Add `entity` if its state puts it in a settled bucket.
    ///
    /// Returns `true` if the view changed.
    pub fn inject_settled<D: Domain + ?Sized>(
        &mut self,
        domain: &D,
        entity: Entity,
        state: EntityState,
    ) -> bool {
        if self.entries.contains_key(&entity) {
            return false;
        }
        match domain.classify(&state) {
            Some(bucket) if bucket.is_settled() => {
                self.insert(ViewEntry {
                    entity,
                    bucket,
                    state,
                });
                true
            }
            _ => false,
        }
    }

    #[must_use]
    pub fn domain(&self) -> &'static str {
        self.domain
    }

    #[must_use]
    pub fn height(&self) -> u64 {
        self.height
    }

    /// Insert or replace the entry for its entity.
    pub fn insert(&mut self, entry: ViewEntry) -> Option<ViewEntry> {
        self.entries.insert(entry.entity.clone(), entry)
    }

    pub fn remove(&mut self, entity: &Entity) -> Option<ViewEntry> {
        self.entries.remove(entity)
    }

    #[must_use]
    pub fn get(&self, entity: &Entity) -> Option<&ViewEntry> {
        self.entries.get(entity)
    }

    #[must_use]
    pub fn contains(&self, entity: &Entity) -> bool {
        self.entries.contains_key(entity)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = &ViewEntry> {
        self.entries.values()
    }

    /// Entries in one bucket, in entity order.
    #[must_use]
    pub fn bucket(&self, bucket: Bucket) -> Vec<&ViewEntry> {
        self.entries
            .values()
            .filter(|e| e.bucket == bucket)
            .collect()
    }

    /// Bucket membership, ignoring attributes. Two views with equal
    /// membership show the same entities in the same places.
    #[must_use]
    pub fn membership(&self) -> BTreeMap<Bucket, BTreeSet<Entity>> {
        let mut out: BTreeMap<Bucket, BTreeSet<Entity>> = BTreeMap::new();
        for entry in self.entries.values() {
            out.entry(entry.bucket)
                .or_default()
                .insert(entry.entity.clone());
        }
        out
    }

    /// All entries, newest first. Ties fall back to reverse entity order so
    /// later log positions sort first.
    #[must_use]
    pub fn listing(&self) -> Vec<&ViewEntry> {
        let mut rows: Vec<&ViewEntry> = self.entries.values().collect();
        rows.sort_by(|a, b| {
            b.state
                .recency()
                .cmp(&a.state.recency())
                .then_with(|| b.entity.cmp(&a.entity))
        });
        rows
    }

    /// Serializable form for CLI and HTTP output.
    #[must_use]
    pub fn snapshot(&self) -> ViewSnapshot {
        let mut buckets: BTreeMap<Bucket, Vec<ViewEntry>> = BTreeMap::new();
        for entry in self.listing() {
            buckets.entry(entry.bucket).or_default().push(entry.clone());
        }
        ViewSnapshot {
            domain: self.domain.to_string(),
            height: self.height,
            buckets,
        }
    }
}

/// Owned, serializable copy of a view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewSnapshot {
    pub domain: String,
    pub height: u64,
    pub buckets: BTreeMap<Bucket, Vec<ViewEntry>>,
}

impl ViewSnapshot {
    #[must_use]
    pub fn total(&self) -> usize {
        self.buckets.values().map(Vec::len).sum()
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Friends, Groups};

    fn peer(n: u64) -> Entity {
        Entity::account(Address::from_low_u64(n))
    }

    fn relation(status: RelationStatus) -> Option<EntityState> {
        Some(EntityState::Relation { status })
    }

    fn group_state(id: u64, created_at: u64, exists: bool) -> EntityState {
        EntityState::Group(GroupInfo {
            id: Uint256::from(id),
            name: format!("g{}", id),
            creator: Address::from_low_u64(1),
            created_at,
            exists,
            member: true,
        })
    }

    #[test]
    fn assemble_partitions_and_drops_none() {
        let view = MaterializedView::assemble(
            &Friends,
            10,
            vec![
                (peer(2), relation(RelationStatus::Sent)),
                (peer(3), relation(RelationStatus::Received)),
                (peer(4), relation(RelationStatus::Friends)),
                (peer(5), relation(RelationStatus::None)),
                (peer(6), None),
            ],
        );

        assert_eq!(view.len(), 3);
        assert_eq!(view.height(), 10);
        assert_eq!(view.domain(), "friends");
        assert_eq!(view.bucket(Bucket::Outgoing).len(), 1);
        assert_eq!(view.bucket(Bucket::Incoming).len(), 1);
        assert_eq!(view.bucket(Bucket::Established).len(), 1);
        assert!(!view.contains(&peer(5)));
        assert!(!view.contains(&peer(6)));
    }

    #[test]
    fn inject_settled_only_adds_settled_buckets() {
        let mut view = MaterializedView::new("friends", 1);
        let friends = EntityState::Relation {
            status: RelationStatus::Friends,
        };
        let pending = EntityState::Relation {
            status: RelationStatus::Sent,
        };

        assert!(!view.inject_settled(&Friends, peer(2), pending));
        assert!(view.inject_settled(&Friends, peer(3), friends.clone()));
        assert!(!view.inject_settled(&Friends, peer(3), friends));
        assert_eq!(view.len(), 1);
    }

    #[test]
    fn listing_is_newest_first() {
        let view = MaterializedView::assemble(
            &Groups,
            100,
            vec![
                (Entity::group(Uint256::from(1)), Some(group_state(1, 10, true))),
                (Entity::group(Uint256::from(2)), Some(group_state(2, 30, true))),
                (Entity::group(Uint256::from(3)), Some(group_state(3, 20, true))),
                (Entity::group(Uint256::from(4)), Some(group_state(4, 40, false))),
            ],
        );

        let order: Vec<String> = view.listing().iter().map(|e| e.entity.to_string()).collect();
        assert_eq!(order, vec!["group #2", "group #3", "group #1"]);
    }

    #[test]
    fn snapshot_serializes_bucket_keys() {
        let view = MaterializedView::assemble(
            &Friends,
            3,
            vec![(peer(2), relation(RelationStatus::Friends))],
        );
        let snapshot = view.snapshot();
        assert_eq!(snapshot.total(), 1);
        let json = serde_json::to_value(&snapshot).expect("json");
        assert!(json["buckets"]["established"].is_array());
        assert_eq!(json["height"], 3);
    }

    #[test]
    fn session_peer_is_the_other_party() {
        let info = SessionInfo {
            id: Uint256::from(1),
            a: Address::from_low_u64(1),
            b: Address::from_low_u64(2),
            closed: false,
            last_cid: String::new(),
            created_at: 4,
            participant: true,
        };
        assert_eq!(info.peer(&Address::from_low_u64(1)), &Address::from_low_u64(2));
        assert_eq!(info.peer(&Address::from_low_u64(2)), &Address::from_low_u64(1));
        assert_eq!(EntityState::Session(info).recency(), 4);
    }

    #[test]
    fn relation_codes() {
        assert_eq!(RelationStatus::from_code(3), Some(RelationStatus::Friends));
        assert_eq!(RelationStatus::from_code(4), None);
        assert_eq!(RelationStatus::Sent.mirrored(), RelationStatus::Received);
        assert_eq!(RelationStatus::Friends.mirrored(), RelationStatus::Friends);
    }
}
