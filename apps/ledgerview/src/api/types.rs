//! # API Request/Response Types
//!
//! JSON structures for the HTTP API.

use ledgerview_core::{Address, ViewError, ViewSnapshot, WriteAction};
use serde::{Deserialize, Serialize};

// =============================================================================
// HEALTH RESPONSE
// =============================================================================

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

// =============================================================================
// VIEW SELECTION
// =============================================================================

/// Account-wide views served by the API.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DomainName {
    #[default]
    Friends,
    Groups,
    Sessions,
}

/// `?domain=friends|groups|sessions`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ViewQuery {
    #[serde(default)]
    pub domain: DomainName,
}

// =============================================================================
// VIEW RESPONSE
// =============================================================================

/// A merged view as seen by the served account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewResponse {
    pub account: Address,
    /// Whether the live subscription is currently held.
    pub live: bool,
    /// Local effects still waiting for confirmation by a scan.
    pub pending: usize,
    pub view: ViewSnapshot,
}

// =============================================================================
// ACTION REQUEST/RESPONSE
// =============================================================================

/// Submit a write as the served account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionRequest {
    pub action: WriteAction,
}

/// Receipt height plus every account view after the optimistic merge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionResponse {
    pub height: u64,
    pub friends: ViewSnapshot,
    pub groups: ViewSnapshot,
    pub sessions: ViewSnapshot,
}

// =============================================================================
// ERROR RESPONSE
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl From<&ViewError> for ErrorResponse {
    fn from(e: &ViewError) -> Self {
        Self {
            error: e.to_string(),
        }
    }
}
