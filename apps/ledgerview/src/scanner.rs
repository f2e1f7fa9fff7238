//! # Windowed Scanner
//!
//! Bounded-cost candidate discovery. Scans the most recent `narrow_window`
//! heights first and falls back to the whole log only when the narrow scan
//! finds no candidates at all.
//!
//! Every scan query for the domain runs against the same window and the
//! extracted candidates are unioned. A failure of any query fails the scan
//! with `ScanFailed`; there is no retry here.
//!
//! Domains discovered through the session index skip the log entirely and
//! list the account's session ids in one read.

use crate::source::LogSource;
use futures::future::try_join_all;
use ledgerview_core::{
    Address, CandidateExtractor, Discovery, Domain, Entity, Extraction, ScanWindow, ViewError,
};
use std::sync::Arc;

/// Result of one narrow-then-fallback scan.
#[derive(Debug, Clone)]
pub struct ScanOutcome {
    /// Log height read at the start of the scan.
    pub height: u64,
    /// The window whose results were kept.
    pub window: ScanWindow,
    pub fell_back: bool,
    pub extraction: Extraction,
}

/// Narrow-then-full scanning over a `LogSource`.
#[derive(Debug)]
pub struct WindowedScanner<S> {
    source: Arc<S>,
    narrow_window: u64,
}

impl<S: LogSource> WindowedScanner<S> {
    #[must_use]
    pub fn new(source: Arc<S>, narrow_window: u64) -> Self {
        Self {
            source,
            narrow_window,
        }
    }

    #[must_use]
    pub fn narrow_window(&self) -> u64 {
        self.narrow_window
    }

    /// Discover candidates for `account` under `domain`.
    pub async fn scan<D: Domain + ?Sized>(
        &self,
        domain: &D,
        account: &Address,
    ) -> Result<ScanOutcome, ViewError> {
        let height = self
            .source
            .current_height()
            .await
            .map_err(|e| ViewError::ScanFailed(format!("height read: {}", e)))?;

        if domain.discovery() == Discovery::SessionIndex {
            let extraction = self.list_sessions(account).await?;
            return Ok(ScanOutcome {
                height,
                window: ScanWindow::full(height),
                fell_back: false,
                extraction,
            });
        }

        let narrow = ScanWindow::narrow(height, self.narrow_window);
        let extraction = self.scan_window(domain, account, narrow).await?;

        // A narrow window that already starts at genesis is the full window.
        if !extraction.candidates.is_empty() || narrow.is_full() {
            return Ok(ScanOutcome {
                height,
                window: narrow,
                fell_back: false,
                extraction,
            });
        }

        let full = ScanWindow::full(height);
        tracing::info!(
            domain = domain.name(),
            account = %account.short(),
            narrow = %narrow,
            full = %full,
            "Narrow scan found no candidates, falling back to full scan"
        );
        let extraction = self.scan_window(domain, account, full).await?;

        Ok(ScanOutcome {
            height,
            window: full,
            fell_back: true,
            extraction,
        })
    }

    async fn list_sessions(&self, account: &Address) -> Result<Extraction, ViewError> {
        let ids = self
            .source
            .sessions_of(account)
            .await
            .map_err(|e| ViewError::ScanFailed(format!("session index: {}", e)))?;

        let mut extraction = Extraction {
            scanned: ids.len(),
            ..Extraction::default()
        };
        for id in ids {
            extraction.candidates.insert(Entity::session(id));
        }
        tracing::debug!(
            account = %account.short(),
            candidates = extraction.candidates.len(),
            "Listed sessions from the index"
        );
        Ok(extraction)
    }

    async fn scan_window<D: Domain + ?Sized>(
        &self,
        domain: &D,
        account: &Address,
        window: ScanWindow,
    ) -> Result<Extraction, ViewError> {
        let queries = domain.scan_queries(account);
        let batches = try_join_all(queries.iter().cloned().map(|query| {
            let source = Arc::clone(&self.source);
            async move {
                source.query_range(&query, window).await.map_err(|e| {
                    ViewError::ScanFailed(format!("{} over {}: {}", query, window, e))
                })
            }
        }))
        .await?;

        let mut extraction = Extraction::default();
        for events in &batches {
            extraction.merge(CandidateExtractor::extract(domain, account, events));
        }

        for skipped in &extraction.skipped {
            tracing::debug!(
                kind = %skipped.kind,
                height = skipped.height,
                log_index = skipped.log_index,
                error = %skipped.error,
                "Skipped malformed event"
            );
        }
        tracing::debug!(
            domain = domain.name(),
            window = %window,
            queries = queries.len(),
            scanned = extraction.scanned,
            candidates = extraction.candidates.len(),
            skipped = extraction.skipped.len(),
            "Scanned window"
        );

        Ok(extraction)
    }
}

// =============================================================================
// TESTS
// =============================================================================
