//! # Candidate Extractor
//!
//! Turns raw range-query results into a set of candidate entities.
//!
//! Each event is decoded and handed to the domain, which names the entity it
//! implicates (if any). Results from every scan query are unioned: a
//! relationship can be discovered from either direction.
//!
//! A malformed event is skipped on its own. It is recorded in
//! [`Extraction::skipped`] and never aborts the rest of the scan.

use crate::domain::{Domain, Resolution};
use crate::schema::{DecodeError, EventKind, RawEvent};
use crate::view::EntityState;
use crate::{Address, Entity};
use std::collections::{BTreeMap, BTreeSet};

/// Entities suspected relevant to an account, pending authoritative
/// confirmation.
///
/// For log-resolved domains the set also carries each entity's state as
/// read from its event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CandidateSet {
    entities: BTreeSet<Entity>,
    log_states: BTreeMap<Entity, EntityState>,
}

impl CandidateSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entity. Returns `true` if it was not already present.
    pub fn insert(&mut self, entity: Entity) -> bool {
        self.entities.insert(entity)
    }

    /// Add an entity together with the state its log carries.
    pub fn insert_with_state(&mut self, entity: Entity, state: EntityState) -> bool {
        self.log_states.insert(entity.clone(), state);
        self.entities.insert(entity)
    }

    /// Union `other` into `self`.
    pub fn union(&mut self, other: Self) {
        self.entities.extend(other.entities);
        self.log_states.extend(other.log_states);
    }

    #[must_use]
    pub fn contains(&self, entity: &Entity) -> bool {
        self.entities.contains(entity)
    }

    #[must_use]
    pub fn log_state(&self, entity: &Entity) -> Option<&EntityState> {
        self.log_states.get(entity)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.entities.iter()
    }
}

/// A raw event that failed to decode and was left out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedEvent {
    pub kind: EventKind,
    pub height: u64,
    pub log_index: u32,
    pub error: DecodeError,
}

/// The result of extracting over one or more batches of raw events.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extraction {
    pub candidates: CandidateSet,
    /// Raw events examined.
    pub scanned: usize,
    pub skipped: Vec<SkippedEvent>,
}

impl Extraction {
    /// Fold another batch's result into this one.
    pub fn merge(&mut self, other: Self) {
        self.candidates.union(other.candidates);
        self.scanned += other.scanned;
        self.skipped.extend(other.skipped);
    }
}

/// Stateless candidate extraction over raw events.
#[derive(Debug, Clone, Copy, Default)]
pub struct CandidateExtractor;

impl CandidateExtractor {
    /// Extract the candidates `events` name for `account` under `domain`.
    pub fn extract<D: Domain + ?Sized>(
        domain: &D,
        account: &Address,
        events: &[RawEvent],
    ) -> Extraction {
        let mut out = Extraction {
            scanned: events.len(),
            ..Extraction::default()
        };

        for raw in events {
            let decoded = match raw.decode() {
                Ok(decoded) => decoded,
                Err(error) => {
                    out.skipped.push(SkippedEvent {
                        kind: raw.kind,
                        height: raw.height,
                        log_index: raw.log_index,
                        error,
                    });
                    continue;
                }
            };

            let Some(entity) = domain.candidate(account, &decoded) else {
                continue;
            };
            match domain.resolution() {
                Resolution::PointQuery => {
                    out.candidates.insert(entity);
                }
                Resolution::FromLog => {
                    if let Some(state) = domain.log_state(&decoded) {
                        out.candidates.insert_with_state(entity, state);
                    }
                }
            }
        }

        out
    }
}

// =============================================================================
// TESTS
// =============================================================================
