//! # ledgerview-core
//!
//! Deterministic reconstruction of an account's current relationships,
//! groups, sessions and messages from a write-only, append-only event log.
//!
//! The ledger exposes no "list everything for me" query. A view is rebuilt
//! by scanning logs for candidate entities, confirming each candidate's
//! current state, and partitioning the confirmed entities into buckets.
//!
//! ## Pipeline
//!
//! - `schema` decodes positional log records into typed events
//! - `extractor` turns decoded events into a `CandidateSet`
//! - `view` assembles resolved states into a `MaterializedView`
//! - `pending` overlays local, not-yet-scanned writes on the confirmed view
//! - `domain` supplies the per-domain rules (friends, groups, messages,
//!   sessions)
//!
//! ## Architectural Constraints
//!
//! - Has NO async, NO network dependencies (pure Rust)
//! - Deterministic: `BTreeMap`/`BTreeSet` only, no floats
//! - The ledger is the durable store; nothing here persists

// =============================================================================
// MODULES
// =============================================================================

pub mod domain;
pub mod extractor;
pub mod pending;
pub mod primitives;
pub mod schema;
pub mod types;
pub mod view;

// =============================================================================
// RE-EXPORTS: Core Types
// =============================================================================

pub use types::{Address, Entity, ScanWindow, Uint256, ViewError};

// =============================================================================
// RE-EXPORTS: Pipeline
// =============================================================================

pub use domain::{
    Discovery, Domain, Friends, GroupMessages, Groups, LiveAction, OptimisticPlan, Resolution,
    Sessions,
};
pub use extractor::{CandidateExtractor, CandidateSet, Extraction, SkippedEvent};
pub use pending::{Effect, PendingEffect, PendingTier, ViewState};
pub use schema::{
    ActionKind, DecodeError, DecodedEvent, Emitted, EventKind, LedgerEvent, LogQuery, RawArg,
    RawEvent, Receipt, WriteAction,
};
pub use view::{
    Bucket, EntityState, GroupInfo, MaterializedView, MessageInfo, RelationStatus, SessionInfo,
    ViewEntry, ViewSnapshot,
};
