//! # Live View Controller
//!
//! `LiveView` is the surface a caller drives for one (account, domain) pair:
//!
//! - `refresh()`: scan, resolve and install a new confirmed tier
//! - `activate()` / `deactivate()`: live subscription lifecycle
//! - `apply_optimistic(receipt)`: fold a confirmed local write in at once
//! - `start_polling(every)`: re-query the focused entity on a timer
//!
//! Refreshes may overlap. Each takes a generation number when it starts and
//! only installs its result if no newer refresh has installed first. A failed
//! refresh never touches the installed view.

use crate::config::ViewConfig;
use crate::reconciler::{LiveReconciler, LiveSignal, ReconcilerState};
use crate::resolver::StateResolver;
use crate::scanner::WindowedScanner;
use crate::source::LogSource;
use ledgerview_core::{
    Address, Domain, Effect, Entity, LiveAction, MaterializedView, OptimisticPlan, PendingEffect,
    Receipt, ViewEntry, ViewError, ViewState, WriteAction,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

struct Installed {
    state: ViewState,
    generation: u64,
}

struct Inner<S, D> {
    account: Address,
    domain: D,
    source: Arc<S>,
    scanner: WindowedScanner<S>,
    resolver: StateResolver<S>,
    installed: RwLock<Installed>,
    generations: AtomicU64,
    focus: RwLock<Option<Entity>>,
    reconciler: tokio::sync::Mutex<LiveReconciler>,
    poller: Mutex<Option<JoinHandle<()>>>,
    last_error: Mutex<Option<ViewError>>,
}

impl<S, D> Drop for Inner<S, D> {
    fn drop(&mut self) {
        if let Some(task) = self.poller.get_mut().ok().and_then(Option::take) {
            task.abort();
        }
    }
}

/// A live, self-patching materialized view for one account and domain.
pub struct LiveView<S, D> {
    inner: Arc<Inner<S, D>>,
}

impl<S, D> Clone for LiveView<S, D> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: LogSource, D: Domain + 'static> LiveView<S, D> {
    pub fn new(source: Arc<S>, account: Address, domain: D, config: &ViewConfig) -> Self {
        let installed = Installed {
            state: ViewState::new(domain.name()),
            generation: 0,
        };
        Self {
            inner: Arc::new(Inner {
                scanner: WindowedScanner::new(Arc::clone(&source), config.narrow_window),
                resolver: StateResolver::new(Arc::clone(&source), config.max_in_flight),
                source,
                account,
                domain,
                installed: RwLock::new(installed),
                generations: AtomicU64::new(0),
                focus: RwLock::new(None),
                reconciler: tokio::sync::Mutex::new(LiveReconciler::new()),
                poller: Mutex::new(None),
                last_error: Mutex::new(None),
            }),
        }
    }

    #[must_use]
    pub fn account(&self) -> &Address {
        &self.inner.account
    }

    #[must_use]
    pub fn domain(&self) -> &D {
        &self.inner.domain
    }

    /// The merged view: confirmed tier overlaid by pending local effects.
    pub async fn view(&self) -> MaterializedView {
        self.inner.installed.read().await.state.merged()
    }

    /// Number of local effects not yet confirmed by a scan.
    pub async fn pending_len(&self) -> usize {
        self.inner.installed.read().await.state.pending().len()
    }

    /// Select the entity the caller is focused on. It takes effect on the
    /// next refresh.
    pub async fn set_focus(&self, focus: Option<Entity>) {
        *self.inner.focus.write().await = focus;
    }

    /// The most recent error raised by background work (live patches,
    /// subscription loss). Foreground calls return their errors directly.
    #[must_use]
    pub fn last_error(&self) -> Option<ViewError> {
        self.inner
            .last_error
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn record_error(&self, error: ViewError) {
        *self
            .inner
            .last_error
            .lock()
            .unwrap_or_else(|e| e.into_inner()) = Some(error);
    }

    // =========================================================================
    // REFRESH
    // =========================================================================

    /// Rebuild the confirmed tier from a fresh scan and resolve.
    ///
    /// Returns the merged view after installation. On failure the previous
    /// view stays installed.
    pub async fn refresh(&self) -> Result<MaterializedView, ViewError> {
        let inner = &self.inner;
        let generation = inner.generations.fetch_add(1, Ordering::SeqCst) + 1;
        let focus = inner.focus.read().await.clone();

        let scan = inner.scanner.scan(&inner.domain, &inner.account).await?;
        let view = inner
            .resolver
            .resolve(
                &inner.domain,
                &inner.account,
                &scan.extraction.candidates,
                scan.height,
                focus.as_ref(),
            )
            .await?;

        let mut installed = inner.installed.write().await;
        if generation <= installed.generation {
            tracing::debug!(
                generation,
                installed = installed.generation,
                "Discarding superseded refresh"
            );
            return Ok(installed.state.merged());
        }

        let entries = view.len();
        let settled = installed.state.install(view);
        installed.generation = generation;
        tracing::info!(
            domain = inner.domain.name(),
            account = %inner.account.short(),
            height = scan.height,
            fell_back = scan.fell_back,
            entries,
            settled,
            "Installed view"
        );
        Ok(installed.state.merged())
    }

    // =========================================================================
    // LIVE SUBSCRIPTION
    // =========================================================================

    #[must_use]
    pub async fn subscription(&self) -> ReconcilerState {
        self.inner.reconciler.lock().await.state()
    }

    /// Start patching the view from live events. Idempotent.
    pub async fn activate(&self) -> Result<(), ViewError> {
        let weak: Weak<Inner<S, D>> = Arc::downgrade(&self.inner);
        let kinds = self.inner.domain.live_kinds();

        let mut reconciler = self.inner.reconciler.lock().await;
        reconciler
            .activate(self.inner.source.as_ref(), &kinds, move |signal| {
                let weak = weak.clone();
                async move {
                    if let Some(inner) = weak.upgrade() {
                        LiveView { inner }.on_live(signal).await;
                    }
                }
            })
            .await
    }

    /// Stop live patching and focus polling. Safe to call when already idle.
    ///
    /// Returns whether a live subscription was released.
    pub async fn deactivate(&self) -> bool {
        self.stop_polling();
        self.inner.reconciler.lock().await.deactivate()
    }

    /// Point-query `entity` and patch the confirmed tier with the answer,
    /// recording the patch at `height`.
    async fn reresolve(&self, entity: &Entity, height: u64) -> Result<(), ViewError> {
        let inner = &self.inner;
        let entry = inner
            .resolver
            .resolve_one(&inner.domain, &inner.account, entity)
            .await?;

        let mut installed = inner.installed.write().await;
        match entry {
            Some(entry) => installed.state.patch_upsert(entry, height),
            None => {
                installed.state.patch_remove(entity, height);
            }
        }
        Ok(())
    }

    async fn on_live(&self, signal: LiveSignal) {
        let event = match signal {
            LiveSignal::Event(event) => event,
            LiveSignal::Lost(reason) => {
                tracing::warn!(reason = %reason, "Live subscription lost");
                self.record_error(ViewError::SubscriptionLost(reason));
                return;
            }
        };

        let inner = &self.inner;
        let action = inner.domain.live_action(&inner.account, &event);
        tracing::debug!(
            kind = %event.event.kind(),
            height = event.height,
            action = ?action,
            "Live event"
        );

        let shown = match &action {
            LiveAction::Refetch(entity) => {
                inner.installed.read().await.state.merged().contains(entity)
            }
            _ => true,
        };
        if !shown {
            return;
        }

        match action {
            LiveAction::Ignore => {}
            LiveAction::Remove(entity) => {
                let mut installed = inner.installed.write().await;
                installed.state.patch_remove(&entity, event.height);
            }
            LiveAction::Upsert { entity, state } => {
                let mut installed = inner.installed.write().await;
                match inner.domain.classify(&state) {
                    Some(bucket) => installed.state.patch_upsert(
                        ViewEntry {
                            entity,
                            bucket,
                            state,
                        },
                        event.height,
                    ),
                    None => {
                        installed.state.patch_remove(&entity, event.height);
                    }
                }
            }
            LiveAction::Resolve(entity) | LiveAction::Refetch(entity) => {
                if let Err(e) = self.reresolve(&entity, event.height).await {
                    tracing::warn!(entity = %entity, error = %e, "Live re-resolve failed");
                    self.record_error(e);
                }
            }
            LiveAction::Refresh => {
                if let Err(e) = self.refresh().await {
                    tracing::warn!(error = %e, "Live refresh failed");
                    self.record_error(e);
                }
            }
        }
    }

    // =========================================================================
    // FOCUS POLLING
    // =========================================================================

    /// Re-query the focused entity once, at the current log height.
    ///
    /// Returns `false` when nothing is focused.
    pub async fn poll_focus(&self) -> Result<bool, ViewError> {
        let Some(entity) = self.inner.focus.read().await.clone() else {
            return Ok(false);
        };
        let height = self
            .inner
            .source
            .current_height()
            .await
            .map_err(|e| ViewError::ScanFailed(format!("height read: {}", e)))?;
        self.reresolve(&entity, height).await?;
        tracing::trace!(entity = %entity, height, "Polled focus entity");
        Ok(true)
    }

    /// Poll the focused entity every `every` until stopped or deactivated.
    /// Replaces a poller that is already running.
    pub fn start_polling(&self, every: Duration) {
        let weak: Weak<Inner<S, D>> = Arc::downgrade(&self.inner);
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes at once.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(inner) = weak.upgrade() else { break };
                let view = LiveView { inner };
                if let Err(e) = view.poll_focus().await {
                    tracing::warn!(error = %e, "Focus poll failed");
                    view.record_error(e);
                }
            }
        });

        let previous = self
            .inner
            .poller
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .replace(task);
        if let Some(previous) = previous {
            previous.abort();
        }
        tracing::debug!(every_ms = every.as_millis() as u64, "Focus polling started");
    }

    /// Stop the focus poller. Returns whether one was running.
    pub fn stop_polling(&self) -> bool {
        let task = self
            .inner
            .poller
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        match task {
            Some(task) => {
                task.abort();
                true
            }
            None => false,
        }
    }

    // =========================================================================
    // OPTIMISTIC MERGE
    // =========================================================================

    /// Fold a confirmed local write into the view without waiting for the
    /// next scan or live event.
    pub async fn apply_optimistic(&self, receipt: &Receipt) -> Result<MaterializedView, ViewError> {
        let inner = &self.inner;
        let plan = inner.domain.optimistic(&inner.account, receipt);

        match plan {
            OptimisticPlan::Ignore => {}
            OptimisticPlan::Apply(effect) => {
                tracing::debug!(entity = %effect.entity, action = ?effect.action, "Staging pending effect");
                inner.installed.write().await.state.stage(effect);
            }
            OptimisticPlan::Resolve { entity, action } => {
                let effect = match inner
                    .resolver
                    .resolve_one(&inner.domain, &inner.account, &entity)
                    .await?
                {
                    Some(entry) => Effect::Place {
                        bucket: entry.bucket,
                        state: entry.state,
                    },
                    None => Effect::Remove,
                };
                inner.installed.write().await.state.stage(PendingEffect {
                    entity,
                    action,
                    effect,
                    height: receipt.height,
                });
            }
            OptimisticPlan::Refresh(reason) => {
                tracing::info!(reason = %reason, "Receipt not applicable locally, refreshing");
                return self.refresh().await;
            }
        }

        Ok(self.view().await)
    }

    /// Submit `action` as this view's account, then merge its receipt.
    ///
    /// Returns the receipt together with the merged view.
    pub async fn perform(
        &self,
        action: WriteAction,
    ) -> Result<(Receipt, MaterializedView), ViewError> {
        let receipt = self
            .inner
            .source
            .confirm_write(&self.inner.account, action)
            .await
            .map_err(ViewError::from)?;
        let view = self.apply_optimistic(&receipt).await?;
        Ok((receipt, view))
    }
}
