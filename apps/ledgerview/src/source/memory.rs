//! # In-Memory Ledger
//!
//! A `LogSource` backed by process memory. It keeps an append-only log plus
//! the contract state the log describes (friend relations, groups and their
//! members, one-to-one sessions, registered usernames), so point queries
//! answer from state and never from events.
//!
//! Used by the CLI, the HTTP server and the tests. Test hooks:
//! - `set_max_range` models a node that refuses oversized range requests
//! - `fail_heights` / `fail_ranges` / `fail_point_query` /
//!   `fail_session_index` inject transient failures
//! - `strip_receipts` returns receipts without logs
//! - `inject_raw` appends arbitrary, possibly malformed, log records
//! - `close_feeds` drops every live subscriber

use super::{EventFeed, LogSource, SourceError};
use async_trait::async_trait;
use ledgerview_core::primitives::MAX_TEXT_LENGTH;
use ledgerview_core::{
    Address, Entity, EntityState, EventKind, GroupInfo, LedgerEvent, LogQuery, MessageInfo, RawArg,
    RawEvent, Receipt, RelationStatus, ScanWindow, SessionInfo, Uint256, ViewError, WriteAction,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tokio::sync::mpsc;

// =============================================================================
// FIXTURES
// =============================================================================

/// One scripted ledger step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FixtureStep {
    /// Move the log height forward without emitting anything.
    Advance { advance: u64 },
    /// Append a raw log record as-is.
    Raw { raw: RawEvent },
    /// Submit a write as `actor`.
    Write { actor: Address, action: WriteAction },
}

/// A replayable ledger history.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fixture {
    /// Default viewing account for CLI commands.
    #[serde(default)]
    pub viewer: Option<Address>,
    /// Username registry contents.
    #[serde(default)]
    pub usernames: BTreeMap<String, Address>,
    pub steps: Vec<FixtureStep>,
}

impl Fixture {
    pub fn parse(json: &str) -> Result<Self, ViewError> {
        serde_json::from_str(json).map_err(|e| ViewError::Config(format!("Invalid fixture: {}", e)))
    }

    pub fn load(path: &Path) -> Result<Self, ViewError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ViewError::Io(format!("Cannot read fixture {}: {}", path.display(), e)))?;
        Self::parse(&contents)
    }
}

// =============================================================================
// LEDGER STATE
// =============================================================================

#[derive(Debug, Clone)]
struct GroupRecord {
    name: String,
    creator: Address,
    created_at: u64,
    members: BTreeSet<Address>,
    exists: bool,
}

#[derive(Debug, Clone)]
struct SessionRecord {
    a: Address,
    b: Address,
    closed: bool,
    last_cid: String,
    created_at: u64,
}

impl SessionRecord {
    fn has_party(&self, account: &Address) -> bool {
        self.a == *account || self.b == *account
    }
}

#[derive(Debug, Default)]
struct Failures {
    heights: bool,
    ranges: bool,
    points: BTreeSet<Entity>,
    sessions: bool,
    strip_receipts: bool,
}

#[derive(Debug, Default)]
struct LedgerState {
    height: u64,
    log: Vec<RawEvent>,
    /// Keyed (viewer, counterpart); both directions are stored.
    relations: BTreeMap<(Address, Address), RelationStatus>,
    groups: BTreeMap<Uint256, GroupRecord>,
    last_group: u64,
    sessions: BTreeMap<Uint256, SessionRecord>,
    last_session: u64,
    usernames: BTreeMap<String, Address>,
    subscribers: Vec<(EventKind, mpsc::UnboundedSender<RawEvent>)>,
    max_range: Option<u64>,
    failures: Failures,
    served: Vec<ScanWindow>,
}

fn reverted(reason: impl Into<String>) -> SourceError {
    SourceError::Reverted(reason.into())
}

impl LedgerState {
    fn relation(&self, viewer: &Address, other: &Address) -> RelationStatus {
        self.relations
            .get(&(viewer.clone(), other.clone()))
            .copied()
            .unwrap_or(RelationStatus::None)
    }

    fn set_relation(&mut self, viewer: &Address, other: &Address, status: RelationStatus) {
        let forward = (viewer.clone(), other.clone());
        let backward = (other.clone(), viewer.clone());
        if status == RelationStatus::None {
            self.relations.remove(&forward);
            self.relations.remove(&backward);
        } else {
            self.relations.insert(forward, status);
            self.relations.insert(backward, status.mirrored());
        }
    }

    fn require_relation(
        &self,
        viewer: &Address,
        other: &Address,
        expected: RelationStatus,
    ) -> Result<(), SourceError> {
        let actual = self.relation(viewer, other);
        if actual != expected {
            return Err(reverted(format!(
                "relation with {} is {:?}, expected {:?}",
                other.short(),
                actual,
                expected
            )));
        }
        Ok(())
    }

    fn live_group_mut(&mut self, id: &Uint256) -> Result<&mut GroupRecord, SourceError> {
        self.groups
            .get_mut(id)
            .filter(|g| g.exists)
            .ok_or_else(|| reverted(format!("group #{} does not exist", id)))
    }

    /// An open session `actor` is a party to.
    fn open_session_mut(
        &mut self,
        id: &Uint256,
        actor: &Address,
    ) -> Result<&mut SessionRecord, SourceError> {
        let session = self
            .sessions
            .get_mut(id)
            .ok_or_else(|| reverted(format!("session #{} does not exist", id)))?;
        if !session.has_party(actor) {
            return Err(reverted("not a party to this session"));
        }
        if session.closed {
            return Err(reverted(format!("session #{} is closed", id)));
        }
        Ok(session)
    }

    /// Validate and apply `action`. State is untouched when this fails.
    fn apply(
        &mut self,
        actor: &Address,
        action: &WriteAction,
        height: u64,
    ) -> Result<Vec<LedgerEvent>, SourceError> {
        match action {
            WriteAction::SendFriendRequest { to } => {
                if to == actor || to.is_zero() {
                    return Err(reverted("cannot send a request to this address"));
                }
                self.require_relation(actor, to, RelationStatus::None)?;
                self.set_relation(actor, to, RelationStatus::Sent);
                Ok(vec![LedgerEvent::FriendRequestSent {
                    from: actor.clone(),
                    to: to.clone(),
                }])
            }
            WriteAction::AcceptFriendRequest { from } => {
                self.require_relation(actor, from, RelationStatus::Received)?;
                self.set_relation(actor, from, RelationStatus::Friends);
                Ok(vec![LedgerEvent::FriendRequestAccepted {
                    from: from.clone(),
                    to: actor.clone(),
                }])
            }
            WriteAction::DeclineFriendRequest { from } => {
                self.require_relation(actor, from, RelationStatus::Received)?;
                self.set_relation(actor, from, RelationStatus::None);
                Ok(vec![LedgerEvent::FriendRequestDeclined {
                    from: from.clone(),
                    to: actor.clone(),
                }])
            }
            WriteAction::RemoveFriend { friend } => {
                self.require_relation(actor, friend, RelationStatus::Friends)?;
                self.set_relation(actor, friend, RelationStatus::None);
                Ok(vec![LedgerEvent::FriendRemoved {
                    user: actor.clone(),
                    ex_friend: friend.clone(),
                }])
            }
            WriteAction::CreateGroup { name, members } => {
                if name.is_empty() || name.len() > MAX_TEXT_LENGTH {
                    return Err(reverted("group name must be 1..=4096 bytes"));
                }
                self.last_group += 1;
                let group_id = Uint256::from(self.last_group);
                let mut record = GroupRecord {
                    name: name.clone(),
                    creator: actor.clone(),
                    created_at: height,
                    members: BTreeSet::from([actor.clone()]),
                    exists: true,
                };

                let mut events = vec![LedgerEvent::GroupCreated {
                    group_id,
                    creator: actor.clone(),
                    name: name.clone(),
                }];
                for member in members {
                    if record.members.insert(member.clone()) {
                        events.push(LedgerEvent::GroupMemberAdded {
                            group_id,
                            added: member.clone(),
                        });
                    }
                }
                self.groups.insert(group_id, record);
                Ok(events)
            }
            WriteAction::AddMember { group_id, member } => {
                let group = self.live_group_mut(group_id)?;
                if !group.members.contains(actor) {
                    return Err(reverted("only members can add members"));
                }
                if !group.members.insert(member.clone()) {
                    return Err(reverted(format!("{} is already a member", member.short())));
                }
                Ok(vec![LedgerEvent::GroupMemberAdded {
                    group_id: *group_id,
                    added: member.clone(),
                }])
            }
            WriteAction::RemoveMember { group_id, member } => {
                let group = self.live_group_mut(group_id)?;
                if actor != &group.creator && actor != member {
                    return Err(reverted("only the creator can remove other members"));
                }
                if member == &group.creator {
                    return Err(reverted("the creator cannot be removed"));
                }
                if !group.members.remove(member) {
                    return Err(reverted(format!("{} is not a member", member.short())));
                }
                Ok(vec![LedgerEvent::GroupMemberRemoved {
                    group_id: *group_id,
                    removed: member.clone(),
                }])
            }
            WriteAction::DeleteGroup { group_id } => {
                let group = self.live_group_mut(group_id)?;
                if actor != &group.creator {
                    return Err(reverted("only the creator can delete a group"));
                }
                group.exists = false;
                Ok(vec![LedgerEvent::GroupDeleted {
                    group_id: *group_id,
                }])
            }
            WriteAction::SendGroupMessage { group_id, cid } => {
                let group = self.live_group_mut(group_id)?;
                if !group.members.contains(actor) {
                    return Err(reverted("only members can post"));
                }
                if cid.is_empty() || cid.len() > MAX_TEXT_LENGTH {
                    return Err(reverted("content id must be 1..=4096 bytes"));
                }
                Ok(vec![LedgerEvent::GroupMessage {
                    group_id: *group_id,
                    from: actor.clone(),
                    cid: cid.clone(),
                    ts: height,
                }])
            }
            WriteAction::CreateSession { peer } => {
                if peer == actor || peer.is_zero() {
                    return Err(reverted("cannot open a session with this address"));
                }
                self.last_session += 1;
                let session_id = Uint256::from(self.last_session);
                self.sessions.insert(
                    session_id,
                    SessionRecord {
                        a: actor.clone(),
                        b: peer.clone(),
                        closed: false,
                        last_cid: String::new(),
                        created_at: height,
                    },
                );
                Ok(vec![LedgerEvent::SessionCreated {
                    session_id,
                    a: actor.clone(),
                    b: peer.clone(),
                }])
            }
            WriteAction::SendSessionMessage { session_id, cid } => {
                if cid.is_empty() || cid.len() > MAX_TEXT_LENGTH {
                    return Err(reverted("content id must be 1..=4096 bytes"));
                }
                let session = self.open_session_mut(session_id, actor)?;
                session.last_cid = cid.clone();
                Ok(vec![LedgerEvent::SessionMessage {
                    session_id: *session_id,
                    from: actor.clone(),
                    cid: cid.clone(),
                }])
            }
            WriteAction::EndSession { session_id } => {
                let session = self.open_session_mut(session_id, actor)?;
                session.closed = true;
                Ok(vec![LedgerEvent::SessionEnded {
                    session_id: *session_id,
                    by: actor.clone(),
                }])
            }
        }
    }

    /// Append records and fan them out to live subscribers.
    fn append(&mut self, records: &[RawEvent]) {
        for record in records {
            self.log.push(record.clone());
            // A failed send means the feed was dropped: unsubscribe it.
            self.subscribers
                .retain(|(kind, tx)| *kind != record.kind || tx.send(record.clone()).is_ok());
        }
    }

    fn write(&mut self, actor: &Address, action: WriteAction) -> Result<Receipt, SourceError> {
        let height = self.height + 1;
        let events = self.apply(actor, &action, height)?;
        self.height = height;

        let logs: Vec<RawEvent> = events
            .iter()
            .enumerate()
            .map(|(i, e)| e.to_raw(height, i as u32))
            .collect();
        self.append(&logs);

        Ok(Receipt {
            action,
            height,
            logs: if self.failures.strip_receipts {
                Vec::new()
            } else {
                logs
            },
        })
    }

    fn point_query(&self, account: &Address, entity: &Entity) -> Option<EntityState> {
        match entity {
            Entity::Account { address } if address == account => None,
            Entity::Account { address } => Some(EntityState::Relation {
                status: self.relation(account, address),
            }),
            Entity::Group { id } => self.groups.get(id).map(|g| {
                EntityState::Group(GroupInfo {
                    id: *id,
                    name: g.name.clone(),
                    creator: g.creator.clone(),
                    created_at: g.created_at,
                    exists: g.exists,
                    member: g.members.contains(account),
                })
            }),
            Entity::Message {
                group,
                height,
                log_index,
            } => self
                .log
                .iter()
                .find(|e| e.height == *height && e.log_index == *log_index)
                .and_then(|raw| raw.decode().ok())
                .and_then(|decoded| match decoded.event {
                    LedgerEvent::GroupMessage {
                        group_id,
                        from,
                        cid,
                        ts,
                    } if group_id == *group => Some(EntityState::Message(MessageInfo {
                        group_id,
                        from,
                        cid,
                        ts,
                    })),
                    _ => None,
                }),
            Entity::Session { id } => self.sessions.get(id).map(|s| {
                EntityState::Session(SessionInfo {
                    id: *id,
                    a: s.a.clone(),
                    b: s.b.clone(),
                    closed: s.closed,
                    last_cid: s.last_cid.clone(),
                    created_at: s.created_at,
                    participant: s.has_party(account),
                })
            }),
        }
    }

    fn sessions_of(&self, account: &Address) -> Vec<Uint256> {
        self.sessions
            .iter()
            .filter(|(_, s)| s.has_party(account))
            .map(|(id, _)| *id)
            .collect()
    }
}

// =============================================================================
// MEMORY LEDGER
// =============================================================================

/// An in-process ledger with simulated friend, group and session contracts.
#[derive(Debug, Default)]
pub struct MemoryLedger {
    inner: Mutex<LedgerState>,
}

impl MemoryLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a ledger by replaying every step of `fixture`.
    pub fn from_fixture(fixture: &Fixture) -> Result<Self, SourceError> {
        let ledger = Self::new();
        for (username, address) in &fixture.usernames {
            ledger.register_username(username, address.clone());
        }
        for step in &fixture.steps {
            ledger.apply_step(step)?;
        }
        Ok(ledger)
    }

    fn state(&self) -> MutexGuard<'_, LedgerState> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Run one fixture step. Returns the receipt for write steps.
    pub fn apply_step(&self, step: &FixtureStep) -> Result<Option<Receipt>, SourceError> {
        match step {
            FixtureStep::Advance { advance } => {
                self.advance(*advance);
                Ok(None)
            }
            FixtureStep::Raw { raw } => {
                self.inject_raw(raw.kind, raw.args.clone());
                Ok(None)
            }
            FixtureStep::Write { actor, action } => self.write(actor, action.clone()).map(Some),
        }
    }

    #[must_use]
    pub fn height(&self) -> u64 {
        self.state().height
    }

    /// Move the log height forward by `n` with no events.
    pub fn advance(&self, n: u64) {
        let mut state = self.state();
        state.height = state.height.saturating_add(n);
    }

    /// Submit a write at the next height.
    pub fn write(&self, actor: &Address, action: WriteAction) -> Result<Receipt, SourceError> {
        self.state().write(actor, action)
    }

    /// Append one raw record at the next height, bypassing contract state.
    pub fn inject_raw(&self, kind: EventKind, args: Vec<RawArg>) -> RawEvent {
        let mut state = self.state();
        state.height += 1;
        let record = RawEvent {
            kind,
            height: state.height,
            log_index: 0,
            args,
        };
        state.append(std::slice::from_ref(&record));
        record
    }

    /// Register `username` for `address`, replacing any earlier owner.
    pub fn register_username(&self, username: &str, address: Address) {
        self.state()
            .usernames
            .insert(username.trim().to_string(), address);
    }

    /// Refuse range queries wider than `limit` heights.
    pub fn set_max_range(&self, limit: Option<u64>) {
        self.state().max_range = limit;
    }

    pub fn fail_heights(&self, fail: bool) {
        self.state().failures.heights = fail;
    }

    pub fn fail_ranges(&self, fail: bool) {
        self.state().failures.ranges = fail;
    }

    /// Make point queries for `entity` fail until cleared.
    pub fn fail_point_query(&self, entity: Entity) {
        self.state().failures.points.insert(entity);
    }

    pub fn fail_session_index(&self, fail: bool) {
        self.state().failures.sessions = fail;
    }

    pub fn strip_receipts(&self, strip: bool) {
        self.state().failures.strip_receipts = strip;
    }

    pub fn clear_failures(&self) {
        self.state().failures = Failures::default();
    }

    /// Drop every live subscriber, closing their feeds.
    pub fn close_feeds(&self) {
        self.state().subscribers.clear();
    }

    /// Live subscribers whose feed has not been dropped.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        let mut state = self.state();
        state.subscribers.retain(|(_, tx)| !tx.is_closed());
        state.subscribers.len()
    }

    /// Every window a range query was served for, oldest first.
    #[must_use]
    pub fn served_windows(&self) -> Vec<ScanWindow> {
        self.state().served.clone()
    }
}

#[async_trait]
impl LogSource for MemoryLedger {
    async fn current_height(&self) -> Result<u64, SourceError> {
        let state = self.state();
        if state.failures.heights {
            return Err(SourceError::Unavailable("height read failed".to_string()));
        }
        Ok(state.height)
    }

    async fn query_range(
        &self,
        query: &LogQuery,
        window: ScanWindow,
    ) -> Result<Vec<RawEvent>, SourceError> {
        let mut state = self.state();
        if state.failures.ranges {
            return Err(SourceError::Unavailable("range query failed".to_string()));
        }
        let requested = (window.to() - window.from()).saturating_add(1);
        match state.max_range {
            Some(limit) if requested > limit => {
                return Err(SourceError::RangeTooLarge { requested, limit });
            }
            _ => {}
        }
        state.served.push(window);

        Ok(state
            .log
            .iter()
            .filter(|e| window.contains(e.height) && query.matches(e))
            .cloned()
            .collect())
    }

    async fn subscribe(&self, kind: EventKind) -> Result<EventFeed, SourceError> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.state().subscribers.push((kind, tx));
        Ok(EventFeed::new(kind, rx))
    }

    async fn point_query(
        &self,
        account: &Address,
        entity: &Entity,
    ) -> Result<Option<EntityState>, SourceError> {
        let state = self.state();
        if state.failures.points.contains(entity) {
            return Err(SourceError::Unavailable(format!("point query for {} failed", entity)));
        }
        Ok(state.point_query(account, entity))
    }

    async fn sessions_of(&self, account: &Address) -> Result<Vec<Uint256>, SourceError> {
        let state = self.state();
        if state.failures.sessions {
            return Err(SourceError::Unavailable("session index read failed".to_string()));
        }
        Ok(state.sessions_of(account))
    }

    async fn address_of_username(&self, username: &str) -> Result<Address, SourceError> {
        Ok(self
            .state()
            .usernames
            .get(username.trim())
            .cloned()
            .unwrap_or_else(|| Address::from_low_u64(0)))
    }

    async fn confirm_write(
        &self,
        account: &Address,
        action: WriteAction,
    ) -> Result<Receipt, SourceError> {
        self.write(account, action)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(n: u64) -> Address {
        Address::from_low_u64(n)
    }

    #[tokio::test]
    async fn friend_lifecycle_updates_both_sides() {
        let ledger = MemoryLedger::new();
        let (a, b) = (addr(1), addr(2));

        ledger
            .write(&a, WriteAction::SendFriendRequest { to: b.clone() })
            .expect("send");
        assert_eq!(
            ledger.point_query(&b, &Entity::account(a.clone())).await,
            Ok(Some(EntityState::Relation {
                status: RelationStatus::Received
            }))
        );

        let receipt = ledger
            .write(&b, WriteAction::AcceptFriendRequest { from: a.clone() })
            .expect("accept");
        assert_eq!(receipt.height, 2);
        assert_eq!(receipt.logs.len(), 1);
        assert_eq!(
            ledger.point_query(&a, &Entity::account(b.clone())).await,
            Ok(Some(EntityState::Relation {
                status: RelationStatus::Friends
            }))
        );
    }

    #[test]
    fn reverted_write_leaves_height_and_log_alone() {
        let ledger = MemoryLedger::new();
        let err = ledger
            .write(&addr(1), WriteAction::AcceptFriendRequest { from: addr(2) })
            .expect_err("no request pending");
        assert!(matches!(err, SourceError::Reverted(_)));
        assert_eq!(ledger.height(), 0);
    }

    #[tokio::test]
    async fn range_limit_is_enforced() {
        let ledger = MemoryLedger::new();
        ledger.advance(100);
        ledger.set_max_range(Some(50));

        let query = LogQuery::new(EventKind::GroupCreated);
        let err = ledger
            .query_range(&query, ScanWindow::full(100))
            .await
            .expect_err("too wide");
        assert_eq!(
            err,
            SourceError::RangeTooLarge {
                requested: 101,
                limit: 50
            }
        );
        assert!(ledger.query_range(&query, ScanWindow::narrow(100, 49)).await.is_ok());
        assert_eq!(ledger.served_windows().len(), 1);
    }

    #[tokio::test]
    async fn dropping_a_feed_unsubscribes() {
        let ledger = MemoryLedger::new();
        let feed = ledger.subscribe(EventKind::GroupCreated).await.expect("subscribe");
        assert_eq!(ledger.subscriber_count(), 1);
        drop(feed);
        assert_eq!(ledger.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn group_membership_drives_point_query() {
        let ledger = MemoryLedger::new();
        let (owner, guest) = (addr(1), addr(2));
        ledger
            .write(
                &owner,
                WriteAction::CreateGroup {
                    name: "club".to_string(),
                    members: vec![guest.clone()],
                },
            )
            .expect("create");
        let group = Entity::group(Uint256::from(1));

        let member_view = ledger.point_query(&guest, &group).await.expect("query");
        assert!(matches!(member_view, Some(EntityState::Group(ref g)) if g.member && g.exists));

        ledger
            .write(
                &guest,
                WriteAction::RemoveMember {
                    group_id: Uint256::from(1),
                    member: guest.clone(),
                },
            )
            .expect("leave");
        let after = ledger.point_query(&guest, &group).await.expect("query");
        assert!(matches!(after, Some(EntityState::Group(ref g)) if !g.member));
    }

    #[tokio::test]
    async fn session_lifecycle_and_index() {
        let ledger = MemoryLedger::new();
        let (a, b, c) = (addr(1), addr(2), addr(3));

        let opened = ledger
            .write(&a, WriteAction::CreateSession { peer: b.clone() })
            .expect("open");
        assert_eq!(opened.logs.len(), 1);
        ledger
            .write(&c, WriteAction::CreateSession { peer: a.clone() })
            .expect("open");
        let id = Uint256::from(1);

        assert_eq!(
            ledger.sessions_of(&a).await,
            Ok(vec![Uint256::from(1), Uint256::from(2)])
        );
        assert_eq!(ledger.sessions_of(&b).await, Ok(vec![id]));

        ledger
            .write(
                &b,
                WriteAction::SendSessionMessage {
                    session_id: id,
                    cid: "bafyhello".to_string(),
                },
            )
            .expect("send");
        let seen = ledger
            .point_query(&a, &Entity::session(id))
            .await
            .expect("query");
        assert!(matches!(
            seen,
            Some(EntityState::Session(ref s)) if s.last_cid == "bafyhello" && s.participant && !s.closed
        ));

        let outsider = ledger.point_query(&c, &Entity::session(id)).await.expect("query");
        assert!(matches!(outsider, Some(EntityState::Session(ref s)) if !s.participant));

        let err = ledger
            .write(&c, WriteAction::EndSession { session_id: id })
            .expect_err("not a party");
        assert!(matches!(err, SourceError::Reverted(_)));

        ledger
            .write(&a, WriteAction::EndSession { session_id: id })
            .expect("end");
        let err = ledger
            .write(
                &a,
                WriteAction::SendSessionMessage {
                    session_id: id,
                    cid: "late".to_string(),
                },
            )
            .expect_err("closed");
        assert!(matches!(err, SourceError::Reverted(_)));
        // Closed sessions stay in the index.
        assert_eq!(ledger.sessions_of(&b).await, Ok(vec![id]));
    }

    #[tokio::test]
    async fn unknown_username_is_the_zero_address() {
        let ledger = MemoryLedger::new();
        ledger.register_username("bob", addr(2));

        assert_eq!(ledger.address_of_username(" bob ").await, Ok(addr(2)));
        let missing = ledger.address_of_username("carol").await.expect("lookup");
        assert!(missing.is_zero());
    }

    #[test]
    fn fixture_steps_parse() {
        let fixture = Fixture::parse(
            r#"{
                "viewer": "0x0000000000000000000000000000000000000001",
                "usernames": { "bob": "0x0000000000000000000000000000000000000002" },
                "steps": [
                    { "advance": 9 },
                    {
                        "actor": "0x0000000000000000000000000000000000000002",
                        "action": { "type": "send_friend_request", "to": "0x0000000000000000000000000000000000000001" }
                    }
                ]
            }"#,
        )
        .expect("parse");
        assert_eq!(fixture.steps.len(), 2);

        let ledger = MemoryLedger::from_fixture(&fixture).expect("replay");
        assert_eq!(ledger.height(), 10);
        assert_eq!(ledger.state().usernames.get("bob"), Some(&addr(2)));
    }
}
