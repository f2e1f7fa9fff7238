//! # Event Schema
//!
//! The boundary between the ledger's positional log format and typed events.
//!
//! - `EventKind` is the closed set of kinds the ledger emits
//! - `EventKind::schema()` is the only place that names argument positions
//! - `RawEvent::decode()` turns positional arguments into a `LedgerEvent`
//! - Write actions and their receipts live here too, since a receipt is just
//!   the logs a write emitted
//!
//! Kind names and argument order must match the deployed contracts exactly.

use crate::{Address, Uint256};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// =============================================================================
// EVENT KINDS
// =============================================================================

/// Every event kind the ledger emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EventKind {
    FriendRequestSent,
    FriendRequestAccepted,
    FriendRequestDeclined,
    FriendRemoved,
    GroupCreated,
    GroupMemberAdded,
    GroupMemberRemoved,
    GroupDeleted,
    GroupMessage,
    SessionCreated,
    SessionMessage,
    SessionEnded,
}

/// The type of a single positional argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgType {
    Address,
    Uint,
    Text,
}

impl fmt::Display for ArgType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Address => "address",
            Self::Uint => "uint256",
            Self::Text => "string",
        };
        f.write_str(name)
    }
}

/// Role, type and indexing of one argument position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArgSpec {
    pub name: &'static str,
    pub ty: ArgType,
    /// Indexed arguments can be used as range-query filters.
    pub indexed: bool,
}

const fn arg(name: &'static str, ty: ArgType, indexed: bool) -> ArgSpec {
    ArgSpec { name, ty, indexed }
}

const FRIEND_PAIR: &[ArgSpec] = &[
    arg("from", ArgType::Address, true),
    arg("to", ArgType::Address, true),
];
const FRIEND_REMOVED: &[ArgSpec] = &[
    arg("user", ArgType::Address, true),
    arg("exFriend", ArgType::Address, true),
];
const GROUP_CREATED: &[ArgSpec] = &[
    arg("groupId", ArgType::Uint, true),
    arg("creator", ArgType::Address, true),
    arg("name", ArgType::Text, false),
];
const GROUP_MEMBER_ADDED: &[ArgSpec] = &[
    arg("groupId", ArgType::Uint, true),
    arg("added", ArgType::Address, true),
];
const GROUP_MEMBER_REMOVED: &[ArgSpec] = &[
    arg("groupId", ArgType::Uint, true),
    arg("removed", ArgType::Address, true),
];
const GROUP_DELETED: &[ArgSpec] = &[arg("groupId", ArgType::Uint, true)];
const GROUP_MESSAGE: &[ArgSpec] = &[
    arg("groupId", ArgType::Uint, true),
    arg("from", ArgType::Address, true),
    arg("cid", ArgType::Text, false),
    arg("ts", ArgType::Uint, false),
];
const SESSION_CREATED: &[ArgSpec] = &[
    arg("sessionId", ArgType::Uint, true),
    arg("a", ArgType::Address, true),
    arg("b", ArgType::Address, true),
];
const SESSION_MESSAGE: &[ArgSpec] = &[
    arg("sessionId", ArgType::Uint, true),
    arg("from", ArgType::Address, true),
    arg("cid", ArgType::Text, false),
];
const SESSION_ENDED: &[ArgSpec] = &[
    arg("sessionId", ArgType::Uint, true),
    arg("by", ArgType::Address, true),
];

impl EventKind {
    pub const ALL: [Self; 12] = [
        Self::FriendRequestSent,
        Self::FriendRequestAccepted,
        Self::FriendRequestDeclined,
        Self::FriendRemoved,
        Self::GroupCreated,
        Self::GroupMemberAdded,
        Self::GroupMemberRemoved,
        Self::GroupDeleted,
        Self::GroupMessage,
        Self::SessionCreated,
        Self::SessionMessage,
        Self::SessionEnded,
    ];

    /// The name the ledger uses for this kind.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::FriendRequestSent => "FriendRequestSent",
            Self::FriendRequestAccepted => "FriendRequestAccepted",
            Self::FriendRequestDeclined => "FriendRequestDeclined",
            Self::FriendRemoved => "FriendRemoved",
            Self::GroupCreated => "GroupCreated",
            Self::GroupMemberAdded => "GroupMemberAdded",
            Self::GroupMemberRemoved => "GroupMemberRemoved",
            Self::GroupDeleted => "GroupDeleted",
            Self::GroupMessage => "GroupMessage",
            Self::SessionCreated => "SessionCreated",
            Self::SessionMessage => "SessionMessage",
            Self::SessionEnded => "SessionEnded",
        }
    }

    /// Positional argument layout for this kind.
    #[must_use]
    pub const fn schema(self) -> &'static [ArgSpec] {
        match self {
            Self::FriendRequestSent | Self::FriendRequestAccepted | Self::FriendRequestDeclined => {
                FRIEND_PAIR
            }
            Self::FriendRemoved => FRIEND_REMOVED,
            Self::GroupCreated => GROUP_CREATED,
            Self::GroupMemberAdded => GROUP_MEMBER_ADDED,
            Self::GroupMemberRemoved => GROUP_MEMBER_REMOVED,
            Self::GroupDeleted => GROUP_DELETED,
            Self::GroupMessage => GROUP_MESSAGE,
            Self::SessionCreated => SESSION_CREATED,
            Self::SessionMessage => SESSION_MESSAGE,
            Self::SessionEnded => SESSION_ENDED,
        }
    }

    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.name() == name)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// =============================================================================
// RAW EVENTS
// =============================================================================

/// One positional argument as delivered by the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum RawArg {
    Address(String),
    Uint(String),
    Text(String),
}

impl RawArg {
    /// Compare two arguments after identifier normalization.
    ///
    /// Arguments that fail to normalize never match anything.
    #[must_use]
    pub fn matches(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Address(a), Self::Address(b)) => {
                matches!((Address::parse(a), Address::parse(b)), (Ok(x), Ok(y)) if x == y)
            }
            (Self::Uint(a), Self::Uint(b)) => {
                matches!((Uint256::parse(a), Uint256::parse(b)), (Ok(x), Ok(y)) if x == y)
            }
            (Self::Text(a), Self::Text(b)) => a == b,
            _ => false,
        }
    }
}

impl From<&Address> for RawArg {
    fn from(value: &Address) -> Self {
        Self::Address(value.as_str().to_string())
    }
}

impl From<Uint256> for RawArg {
    fn from(value: Uint256) -> Self {
        Self::Uint(value.to_string())
    }
}

/// A log entry exactly as the ledger reports it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawEvent {
    pub kind: EventKind,
    pub height: u64,
    pub log_index: u32,
    pub args: Vec<RawArg>,
}

/// Why a raw event could not be decoded.
///
/// During extraction this is the "decode skipped" outcome: the event is
/// dropped and counted, never propagated.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("{kind}: missing argument '{name}'")]
    MissingArgument { kind: EventKind, name: &'static str },

    #[error("{kind}: argument '{name}' is not a {expected}")]
    TypeMismatch {
        kind: EventKind,
        name: &'static str,
        expected: ArgType,
    },

    #[error("{kind}: argument '{name}' is invalid: {reason}")]
    InvalidValue {
        kind: EventKind,
        name: &'static str,
        reason: String,
    },
}

/// Positional reader over a raw event's arguments, driven by the schema.
struct Fields<'a> {
    raw: &'a RawEvent,
}

impl<'a> Fields<'a> {
    fn slot(&self, position: usize) -> Result<(&'static str, &'a RawArg), DecodeError> {
        let kind = self.raw.kind;
        let spec = kind.schema()[position];
        let value = self
            .raw
            .args
            .get(position)
            .ok_or(DecodeError::MissingArgument {
                kind,
                name: spec.name,
            })?;
        Ok((spec.name, value))
    }

    fn address(&self, position: usize) -> Result<Address, DecodeError> {
        let kind = self.raw.kind;
        match self.slot(position)? {
            (name, RawArg::Address(text)) => {
                Address::parse(text).map_err(|e| DecodeError::InvalidValue {
                    kind,
                    name,
                    reason: e.to_string(),
                })
            }
            (name, _) => Err(DecodeError::TypeMismatch {
                kind,
                name,
                expected: ArgType::Address,
            }),
        }
    }

    fn uint(&self, position: usize) -> Result<Uint256, DecodeError> {
        let kind = self.raw.kind;
        match self.slot(position)? {
            (name, RawArg::Uint(text)) => {
                Uint256::parse(text).map_err(|e| DecodeError::InvalidValue {
                    kind,
                    name,
                    reason: e.to_string(),
                })
            }
            (name, _) => Err(DecodeError::TypeMismatch {
                kind,
                name,
                expected: ArgType::Uint,
            }),
        }
    }

    fn small_uint(&self, position: usize) -> Result<u64, DecodeError> {
        let kind = self.raw.kind;
        let name = kind.schema()[position].name;
        self.uint(position)?
            .to_u64()
            .ok_or_else(|| DecodeError::InvalidValue {
                kind,
                name,
                reason: "does not fit in 64 bits".to_string(),
            })
    }

    /// Payload text is taken as-is. Only identifiers are validated here.
    fn text(&self, position: usize) -> Result<String, DecodeError> {
        let kind = self.raw.kind;
        match self.slot(position)? {
            (_, RawArg::Text(text)) => Ok(text.clone()),
            (name, _) => Err(DecodeError::TypeMismatch {
                kind,
                name,
                expected: ArgType::Text,
            }),
        }
    }
}

impl RawEvent {
    /// Decode into a typed event using the kind's schema.
    pub fn decode(&self) -> Result<DecodedEvent, DecodeError> {
        let f = Fields { raw: self };
        let event = match self.kind {
            EventKind::FriendRequestSent => LedgerEvent::FriendRequestSent {
                from: f.address(0)?,
                to: f.address(1)?,
            },
            EventKind::FriendRequestAccepted => LedgerEvent::FriendRequestAccepted {
                from: f.address(0)?,
                to: f.address(1)?,
            },
            EventKind::FriendRequestDeclined => LedgerEvent::FriendRequestDeclined {
                from: f.address(0)?,
                to: f.address(1)?,
            },
            EventKind::FriendRemoved => LedgerEvent::FriendRemoved {
                user: f.address(0)?,
                ex_friend: f.address(1)?,
            },
            EventKind::GroupCreated => LedgerEvent::GroupCreated {
                group_id: f.uint(0)?,
                creator: f.address(1)?,
                name: f.text(2)?,
            },
            EventKind::GroupMemberAdded => LedgerEvent::GroupMemberAdded {
                group_id: f.uint(0)?,
                added: f.address(1)?,
            },
            EventKind::GroupMemberRemoved => LedgerEvent::GroupMemberRemoved {
                group_id: f.uint(0)?,
                removed: f.address(1)?,
            },
            EventKind::GroupDeleted => LedgerEvent::GroupDeleted {
                group_id: f.uint(0)?,
            },
            EventKind::GroupMessage => LedgerEvent::GroupMessage {
                group_id: f.uint(0)?,
                from: f.address(1)?,
                cid: f.text(2)?,
                ts: f.small_uint(3)?,
            },
            EventKind::SessionCreated => LedgerEvent::SessionCreated {
                session_id: f.uint(0)?,
                a: f.address(1)?,
                b: f.address(2)?,
            },
            EventKind::SessionMessage => LedgerEvent::SessionMessage {
                session_id: f.uint(0)?,
                from: f.address(1)?,
                cid: f.text(2)?,
            },
            EventKind::SessionEnded => LedgerEvent::SessionEnded {
                session_id: f.uint(0)?,
                by: f.address(1)?,
            },
        };

        Ok(DecodedEvent {
            height: self.height,
            log_index: self.log_index,
            event,
        })
    }
}

// =============================================================================
// DECODED EVENTS
// =============================================================================

/// A typed event, one variant per kind, fields named by role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum LedgerEvent {
    FriendRequestSent { from: Address, to: Address },
    FriendRequestAccepted { from: Address, to: Address },
    FriendRequestDeclined { from: Address, to: Address },
    FriendRemoved { user: Address, ex_friend: Address },
    GroupCreated {
        group_id: Uint256,
        creator: Address,
        name: String,
    },
    GroupMemberAdded { group_id: Uint256, added: Address },
    GroupMemberRemoved { group_id: Uint256, removed: Address },
    GroupDeleted { group_id: Uint256 },
    GroupMessage {
        group_id: Uint256,
        from: Address,
        cid: String,
        ts: u64,
    },
    SessionCreated {
        session_id: Uint256,
        a: Address,
        b: Address,
    },
    SessionMessage {
        session_id: Uint256,
        from: Address,
        cid: String,
    },
    SessionEnded { session_id: Uint256, by: Address },
}

impl LedgerEvent {
    #[must_use]
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::FriendRequestSent { .. } => EventKind::FriendRequestSent,
            Self::FriendRequestAccepted { .. } => EventKind::FriendRequestAccepted,
            Self::FriendRequestDeclined { .. } => EventKind::FriendRequestDeclined,
            Self::FriendRemoved { .. } => EventKind::FriendRemoved,
            Self::GroupCreated { .. } => EventKind::GroupCreated,
            Self::GroupMemberAdded { .. } => EventKind::GroupMemberAdded,
            Self::GroupMemberRemoved { .. } => EventKind::GroupMemberRemoved,
            Self::GroupDeleted { .. } => EventKind::GroupDeleted,
            Self::GroupMessage { .. } => EventKind::GroupMessage,
            Self::SessionCreated { .. } => EventKind::SessionCreated,
            Self::SessionMessage { .. } => EventKind::SessionMessage,
            Self::SessionEnded { .. } => EventKind::SessionEnded,
        }
    }

    /// Encode back into the ledger's positional layout.
    #[must_use]
    pub fn to_raw(&self, height: u64, log_index: u32) -> RawEvent {
        let args = match self {
            Self::FriendRequestSent { from, to }
            | Self::FriendRequestAccepted { from, to }
            | Self::FriendRequestDeclined { from, to } => vec![from.into(), to.into()],
            Self::FriendRemoved { user, ex_friend } => vec![user.into(), ex_friend.into()],
            Self::GroupCreated {
                group_id,
                creator,
                name,
            } => vec![
                (*group_id).into(),
                creator.into(),
                RawArg::Text(name.clone()),
            ],
            Self::GroupMemberAdded { group_id, added } => vec![(*group_id).into(), added.into()],
            Self::GroupMemberRemoved { group_id, removed } => {
                vec![(*group_id).into(), removed.into()]
            }
            Self::GroupDeleted { group_id } => vec![(*group_id).into()],
            Self::GroupMessage {
                group_id,
                from,
                cid,
                ts,
            } => vec![
                (*group_id).into(),
                from.into(),
                RawArg::Text(cid.clone()),
                Uint256::from(*ts).into(),
            ],
            Self::SessionCreated { session_id, a, b } => {
                vec![(*session_id).into(), a.into(), b.into()]
            }
            Self::SessionMessage {
                session_id,
                from,
                cid,
            } => vec![(*session_id).into(), from.into(), RawArg::Text(cid.clone())],
            Self::SessionEnded { session_id, by } => vec![(*session_id).into(), by.into()],
        };

        RawEvent {
            kind: self.kind(),
            height,
            log_index,
            args,
        }
    }

    /// Whether `account` appears in any address role of this event.
    #[must_use]
    pub fn involves(&self, account: &Address) -> bool {
        match self {
            Self::FriendRequestSent { from, to }
            | Self::FriendRequestAccepted { from, to }
            | Self::FriendRequestDeclined { from, to } => from == account || to == account,
            Self::FriendRemoved { user, ex_friend } => user == account || ex_friend == account,
            Self::GroupCreated { creator, .. } => creator == account,
            Self::GroupMemberAdded { added, .. } => added == account,
            Self::GroupMemberRemoved { removed, .. } => removed == account,
            Self::GroupDeleted { .. } => false,
            Self::GroupMessage { from, .. } => from == account,
            Self::SessionCreated { a, b, .. } => a == account || b == account,
            Self::SessionMessage { from, .. } => from == account,
            Self::SessionEnded { by, .. } => by == account,
        }
    }
}

/// A decoded event with its log position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodedEvent {
    pub height: u64,
    pub log_index: u32,
    pub event: LedgerEvent,
}

// =============================================================================
// RANGE QUERIES
// =============================================================================

/// A range-query filter: one kind plus equality constraints on indexed
/// argument positions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogQuery {
    pub kind: EventKind,
    pub topics: Vec<(usize, RawArg)>,
}

impl LogQuery {
    /// Match every event of `kind`.
    #[must_use]
    pub fn new(kind: EventKind) -> Self {
        Self {
            kind,
            topics: Vec::new(),
        }
    }

    /// Constrain an indexed position. Non-indexed positions are ignored.
    #[must_use]
    pub fn topic(mut self, position: usize, value: impl Into<RawArg>) -> Self {
        let indexed = self
            .kind
            .schema()
            .get(position)
            .is_some_and(|spec| spec.indexed);
        if indexed {
            self.topics.push((position, value.into()));
        }
        self
    }

    /// Whether `event` passes this filter.
    #[must_use]
    pub fn matches(&self, event: &RawEvent) -> bool {
        event.kind == self.kind
            && self.topics.iter().all(|(position, expected)| {
                event
                    .args
                    .get(*position)
                    .is_some_and(|actual| actual.matches(expected))
            })
    }
}

impl fmt::Display for LogQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.kind)?;
        let schema = self.kind.schema();
        for (i, spec) in schema.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            match self.topics.iter().find(|(p, _)| *p == i) {
                Some((_, RawArg::Address(v) | RawArg::Uint(v) | RawArg::Text(v))) => {
                    write!(f, "{}={}", spec.name, v)?;
                }
                None => f.write_str("*")?,
            }
        }
        f.write_str(")")
    }
}

// =============================================================================
// WRITE ACTIONS & RECEIPTS
// =============================================================================

/// A write the local account can submit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WriteAction {
    SendFriendRequest { to: Address },
    AcceptFriendRequest { from: Address },
    DeclineFriendRequest { from: Address },
    RemoveFriend { friend: Address },
    CreateGroup {
        name: String,
        #[serde(default)]
        members: Vec<Address>,
    },
    AddMember { group_id: Uint256, member: Address },
    RemoveMember { group_id: Uint256, member: Address },
    DeleteGroup { group_id: Uint256 },
    SendGroupMessage { group_id: Uint256, cid: String },
    CreateSession { peer: Address },
    SendSessionMessage { session_id: Uint256, cid: String },
    EndSession { session_id: Uint256 },
}

/// Discriminant of a `WriteAction`, used to match pending effects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    SendFriendRequest,
    AcceptFriendRequest,
    DeclineFriendRequest,
    RemoveFriend,
    CreateGroup,
    AddMember,
    RemoveMember,
    DeleteGroup,
    SendGroupMessage,
    CreateSession,
    SendSessionMessage,
    EndSession,
}

impl WriteAction {
    #[must_use]
    pub const fn kind(&self) -> ActionKind {
        match self {
            Self::SendFriendRequest { .. } => ActionKind::SendFriendRequest,
            Self::AcceptFriendRequest { .. } => ActionKind::AcceptFriendRequest,
            Self::DeclineFriendRequest { .. } => ActionKind::DeclineFriendRequest,
            Self::RemoveFriend { .. } => ActionKind::RemoveFriend,
            Self::CreateGroup { .. } => ActionKind::CreateGroup,
            Self::AddMember { .. } => ActionKind::AddMember,
            Self::RemoveMember { .. } => ActionKind::RemoveMember,
            Self::DeleteGroup { .. } => ActionKind::DeleteGroup,
            Self::SendGroupMessage { .. } => ActionKind::SendGroupMessage,
            Self::CreateSession { .. } => ActionKind::CreateSession,
            Self::SendSessionMessage { .. } => ActionKind::SendSessionMessage,
            Self::EndSession { .. } => ActionKind::EndSession,
        }
    }

    /// The event kind a successful write of this action emits.
    #[must_use]
    pub const fn expected_event(&self) -> EventKind {
        match self {
            Self::SendFriendRequest { .. } => EventKind::FriendRequestSent,
            Self::AcceptFriendRequest { .. } => EventKind::FriendRequestAccepted,
            Self::DeclineFriendRequest { .. } => EventKind::FriendRequestDeclined,
            Self::RemoveFriend { .. } => EventKind::FriendRemoved,
            Self::CreateGroup { .. } => EventKind::GroupCreated,
            Self::AddMember { .. } => EventKind::GroupMemberAdded,
            Self::RemoveMember { .. } => EventKind::GroupMemberRemoved,
            Self::DeleteGroup { .. } => EventKind::GroupDeleted,
            Self::SendGroupMessage { .. } => EventKind::GroupMessage,
            Self::CreateSession { .. } => EventKind::SessionCreated,
            Self::SendSessionMessage { .. } => EventKind::SessionMessage,
            Self::EndSession { .. } => EventKind::SessionEnded,
        }
    }
}

/// Confirmation of a write: the height it landed at and the logs it emitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub action: WriteAction,
    pub height: u64,
    #[serde(default)]
    pub logs: Vec<RawEvent>,
}

/// What a receipt says about the event its action should have emitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Emitted {
    /// Exactly one log of the expected kind, decoded.
    Decoded(DecodedEvent),
    /// No log of the expected kind.
    Missing,
    /// More than one log of the expected kind.
    Ambiguous(usize),
    /// The single expected log failed to decode.
    Undecodable(DecodeError),
}

impl Receipt {
    /// Locate and decode the event this receipt's action was expected to emit.
    #[must_use]
    pub fn emitted(&self) -> Emitted {
        let expected = self.action.expected_event();
        let mut matching = self.logs.iter().filter(|log| log.kind == expected);

        match (matching.next(), matching.count()) {
            (None, _) => Emitted::Missing,
            (Some(log), 0) => match log.decode() {
                Ok(decoded) => Emitted::Decoded(decoded),
                Err(e) => Emitted::Undecodable(e),
            },
            (Some(_), rest) => Emitted::Ambiguous(rest + 1),
        }
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

    #[test]
    fn every_kind_round_trips_by_name() {
        for kind in EventKind::ALL {
            assert_eq!(EventKind::from_name(kind.name()), Some(kind));
        }
        assert_eq!(EventKind::from_name("Transfer"), None);
    }

    #[test]
    fn decode_inverts_encode() {
        let event = LedgerEvent::GroupMessage {
            group_id: Uint256::from(3),
            from: addr(1),
            cid: "bafy".to_string(),
            ts: 1_700_000_000,
        };
        let decoded = event.to_raw(42, 1).decode().expect("decode");
        assert_eq!(decoded.height, 42);
        assert_eq!(decoded.log_index, 1);
        assert_eq!(decoded.event, event);
    }

    #[test]
    fn decode_normalizes_mixed_case_addresses() {
        let raw = RawEvent {
            kind: EventKind::FriendRequestSent,
            height: 1,
            log_index: 0,
            args: vec![
                RawArg::Address("0xABCDEF0123456789ABCDEF0123456789ABCDEF01".to_string()),
                RawArg::Address(addr(2).to_string()),
            ],
        };
        let decoded = raw.decode().expect("decode");
        let expected_from =
            Address::parse("0xabcdef0123456789abcdef0123456789abcdef01").expect("parse");
        assert_eq!(
            decoded.event,
            LedgerEvent::FriendRequestSent {
                from: expected_from,
                to: addr(2),
            }
        );
    }

    #[test]
    fn decode_reports_missing_argument() {
        let raw = RawEvent {
            kind: EventKind::FriendRemoved,
            height: 1,
            log_index: 0,
            args: vec![RawArg::Address(addr(1).to_string())],
        };
        assert_eq!(
            raw.decode(),
            Err(DecodeError::MissingArgument {
                kind: EventKind::FriendRemoved,
                name: "exFriend"
            })
        );
    }

    #[test]
    fn decode_reports_type_mismatch() {
        let raw = RawEvent {
            kind: EventKind::GroupDeleted,
            height: 1,
            log_index: 0,
            args: vec![RawArg::Text("seven".to_string())],
        };
        assert!(matches!(
            raw.decode(),
            Err(DecodeError::TypeMismatch {
                expected: ArgType::Uint,
                ..
            })
        ));
    }

    #[test]
    fn long_payload_text_never_hides_the_identifier() {
        let name = "x".repeat(10_000);
        let raw = LedgerEvent::GroupCreated {
            group_id: Uint256::from(7),
            creator: addr(1),
            name: name.clone(),
        }
        .to_raw(3, 0);
        let decoded = raw.decode().expect("decode");
        assert!(matches!(
            decoded.event,
            LedgerEvent::GroupCreated { group_id, name: ref n, .. }
                if group_id == Uint256::from(7) && *n == name
        ));
    }

    #[test]
    fn session_events_decode_by_role() {
        let raw = RawEvent {
            kind: EventKind::SessionCreated,
            height: 4,
            log_index: 0,
            args: vec![
                RawArg::Uint("0x02".to_string()),
                RawArg::from(&addr(1)),
                RawArg::from(&addr(2)),
            ],
        };
        let decoded = raw.decode().expect("decode");
        assert_eq!(
            decoded.event,
            LedgerEvent::SessionCreated {
                session_id: Uint256::from(2),
                a: addr(1),
                b: addr(2),
            }
        );
        assert!(decoded.event.involves(&addr(2)));

        let ended = RawEvent {
            kind: EventKind::SessionEnded,
            height: 5,
            log_index: 0,
            args: vec![RawArg::Uint("2".to_string())],
        };
        assert_eq!(
            ended.decode(),
            Err(DecodeError::MissingArgument {
                kind: EventKind::SessionEnded,
                name: "by"
            })
        );
    }

    #[test]
    fn query_matches_normalized_topics() {
        let me = addr(9);
        let query = LogQuery::new(EventKind::FriendRequestSent).topic(1, &me);
        let hit = LedgerEvent::FriendRequestSent {
            from: addr(1),
            to: me.clone(),
        }
        .to_raw(1, 0);
        let miss = LedgerEvent::FriendRequestSent {
            from: me,
            to: addr(1),
        }
        .to_raw(1, 0);
        assert!(query.matches(&hit));
        assert!(!query.matches(&miss));
    }

    #[test]
    fn query_ignores_non_indexed_positions() {
        let query = LogQuery::new(EventKind::GroupCreated).topic(2, RawArg::Text("x".into()));
        assert!(query.topics.is_empty());
        assert_eq!(query.to_string(), "GroupCreated(*, *, *)");
    }

    #[test]
    fn receipt_emitted_variants() {
        let action = WriteAction::SendFriendRequest { to: addr(2) };
        let log = LedgerEvent::FriendRequestSent {
            from: addr(1),
            to: addr(2),
        }
        .to_raw(5, 0);

        let receipt = Receipt {
            action: action.clone(),
            height: 5,
            logs: vec![log.clone()],
        };
        assert!(matches!(receipt.emitted(), Emitted::Decoded(_)));

        let empty = Receipt {
            action: action.clone(),
            height: 5,
            logs: vec![],
        };
        assert_eq!(empty.emitted(), Emitted::Missing);

        let doubled = Receipt {
            action: action.clone(),
            height: 5,
            logs: vec![log.clone(), log],
        };
        assert_eq!(doubled.emitted(), Emitted::Ambiguous(2));

        let broken = Receipt {
            action,
            height: 5,
            logs: vec![RawEvent {
                kind: EventKind::FriendRequestSent,
                height: 5,
                log_index: 0,
                args: vec![],
            }],
        };
        assert!(matches!(broken.emitted(), Emitted::Undecodable(_)));
    }

    #[test]
    fn write_action_serde_shape() {
        let json = r#"{"type":"send_group_message","group_id":"4","cid":"Qm1"}"#;
        let action: WriteAction = serde_json::from_str(json).expect("parse");
        assert_eq!(action.kind(), ActionKind::SendGroupMessage);
        assert_eq!(action.expected_event(), EventKind::GroupMessage);
    }
}
