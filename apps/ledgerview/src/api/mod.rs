//! # Ledgerview HTTP API Module
//!
//! Serves the friends, groups and sessions views of one account over an
//! in-memory ledger.
//!
//! ## Endpoints
//!
//! - `GET /health` - Health check
//! - `GET /view?domain=friends|groups|sessions` - Current merged view
//! - `POST /refresh?domain=friends|groups|sessions` - Rescan and re-resolve a view
//! - `GET /groups/{id}/messages` - Message listing for one group
//! - `POST /action` - Confirm a write and merge it optimistically

mod handlers;
mod types;

// Re-export handlers and types for integration tests (via `ledgerview::api::*`)
#[allow(unused_imports)]
pub use handlers::{
    action_handler, health_handler, messages_handler, refresh_handler, view_handler,
};
#[allow(unused_imports)]
pub use types::{
    ActionRequest, ActionResponse, DomainName, ErrorResponse, HealthResponse, ViewQuery,
    ViewResponse,
};

use crate::config::ViewConfig;
use crate::controller::LiveView;
use crate::source::MemoryLedger;
use axum::{
    Router,
    routing::{get, post},
};
use ledgerview_core::{Address, Friends, Groups, Sessions, ViewError};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

// =============================================================================
// SERVER STATE
// =============================================================================

/// Shared server state: the ledger and the served account's live views.
#[derive(Clone)]
pub struct AppState {
    pub ledger: Arc<MemoryLedger>,
    pub account: Address,
    pub view_config: ViewConfig,
    pub friends: LiveView<MemoryLedger, Friends>,
    pub groups: LiveView<MemoryLedger, Groups>,
    pub sessions: LiveView<MemoryLedger, Sessions>,
}

impl AppState {
    #[must_use]
    pub fn new(ledger: Arc<MemoryLedger>, account: Address, view_config: ViewConfig) -> Self {
        Self {
            friends: LiveView::new(ledger.clone(), account.clone(), Friends, &view_config),
            groups: LiveView::new(ledger.clone(), account.clone(), Groups, &view_config),
            sessions: LiveView::new(ledger.clone(), account.clone(), Sessions, &view_config),
            ledger,
            account,
            view_config,
        }
    }

    /// Build every account view and start live patching.
    pub async fn start(&self) -> Result<(), ViewError> {
        self.friends.refresh().await?;
        self.groups.refresh().await?;
        self.sessions.refresh().await?;
        self.friends.activate().await?;
        self.groups.activate().await?;
        self.sessions.activate().await?;
        Ok(())
    }
}

// =============================================================================
// ROUTER CREATION
// =============================================================================

/// Create the axum router with all endpoints and middleware.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_handler))
        .route("/view", get(handlers::view_handler))
        .route("/refresh", post(handlers::refresh_handler))
        .route("/groups/{id}/messages", get(handlers::messages_handler))
        .route("/action", post(handlers::action_handler))
        .layer(axum::extract::DefaultBodyLimit::max(2 * 1024 * 1024))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// =============================================================================
// SERVER STARTUP
// =============================================================================

/// Start the HTTP server.
pub async fn run_server(addr: &str, state: AppState) -> Result<(), ViewError> {
    state.start().await?;
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ViewError::Io(format!("Bind failed: {}", e)))?;

    tracing::info!("Ledgerview HTTP server listening on {}", addr);

    axum::serve(listener, router)
        .await
        .map_err(|e| ViewError::Io(format!("Server error: {}", e)))
}
