//! # State Resolver
//!
//! Confirms every candidate against authoritative state and assembles the
//! result into a `MaterializedView`.
//!
//! Point queries run concurrently, at most `max_in_flight` at a time. All of
//! them are awaited; if any one fails the whole resolve fails with
//! `ResolveFailed` and no partial view is produced.

use crate::source::LogSource;
use futures::stream::{self, StreamExt};
use ledgerview_core::{
    Address, CandidateSet, Domain, Entity, EntityState, MaterializedView, Resolution, ViewEntry,
    ViewError,
};
use std::sync::Arc;

/// Concurrent, bounded point-query fan-out.
#[derive(Debug)]
pub struct StateResolver<S> {
    source: Arc<S>,
    max_in_flight: usize,
}

impl<S: LogSource> StateResolver<S> {
    #[must_use]
    pub fn new(source: Arc<S>, max_in_flight: usize) -> Self {
        Self {
            source,
            max_in_flight: max_in_flight.max(1),
        }
    }

    /// Resolve `candidates` into a view at `height`.
    ///
    /// A `focus` entity outside the candidate set is queried too and
    /// injected when its state is settled.
    pub async fn resolve<D: Domain + ?Sized>(
        &self,
        domain: &D,
        account: &Address,
        candidates: &CandidateSet,
        height: u64,
        focus: Option<&Entity>,
    ) -> Result<MaterializedView, ViewError> {
        if domain.resolution() == Resolution::FromLog {
            let resolved = candidates
                .iter()
                .map(|entity| (entity.clone(), candidates.log_state(entity).cloned()));
            let view = MaterializedView::assemble(domain, height, resolved);
            tracing::debug!(
                domain = domain.name(),
                candidates = candidates.len(),
                entries = view.len(),
                "Resolved from log"
            );
            return Ok(view);
        }

        let extra = focus.filter(|f| !candidates.contains(f)).cloned();
        let entities: Vec<Entity> = candidates.iter().cloned().chain(extra.clone()).collect();
        let total = entities.len();

        let results = self.query_all(account, entities).await;

        let failed = results.iter().filter(|(_, r)| r.is_err()).count();
        if failed > 0 {
            for (entity, result) in &results {
                if let Err(e) = result {
                    tracing::warn!(entity = %entity, error = %e, "Point query failed");
                }
            }
            return Err(ViewError::ResolveFailed { failed, total });
        }

        let mut focused_state = None;
        let mut resolved = Vec::with_capacity(total);
        for (entity, result) in results {
            let state = result.ok().flatten();
            if extra.as_ref() == Some(&entity) {
                focused_state = state;
            } else {
                resolved.push((entity, state));
            }
        }

        let mut view = MaterializedView::assemble(domain, height, resolved);
        if let (Some(entity), Some(state)) = (extra, focused_state) {
            let injected = view.inject_settled(domain, entity.clone(), state);
            tracing::debug!(entity = %entity, injected, "Focus entity resolved");
        }

        tracing::debug!(
            domain = domain.name(),
            candidates = candidates.len(),
            entries = view.len(),
            "Resolved view"
        );
        Ok(view)
    }

    /// Point-query one entity and classify it.
    ///
    /// `Ok(None)` means the entity does not belong in the view.
    pub async fn resolve_one<D: Domain + ?Sized>(
        &self,
        domain: &D,
        account: &Address,
        entity: &Entity,
    ) -> Result<Option<ViewEntry>, ViewError> {
        let state = self
            .source
            .point_query(account, entity)
            .await
            .map_err(|e| {
                tracing::warn!(entity = %entity, error = %e, "Point query failed");
                ViewError::ResolveFailed {
                    failed: 1,
                    total: 1,
                }
            })?;

        Ok(state.and_then(|state| {
            domain.classify(&state).map(|bucket| ViewEntry {
                entity: entity.clone(),
                bucket,
                state,
            })
        }))
    }

    async fn query_all(
        &self,
        account: &Address,
        entities: Vec<Entity>,
    ) -> Vec<(Entity, Result<Option<EntityState>, crate::source::SourceError>)> {
        stream::iter(entities)
            .map(|entity| {
                let source = Arc::clone(&self.source);
                let account = account.clone();
                async move {
                    let result = source.point_query(&account, &entity).await;
                    (entity, result)
                }
            })
            .buffer_unordered(self.max_in_flight)
            .collect()
            .await
    }
}

// =============================================================================
// TESTS
// =============================================================================
