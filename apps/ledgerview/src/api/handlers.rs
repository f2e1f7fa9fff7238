//! # API Endpoint Handlers

use super::{
    AppState,
    types::{
        ActionRequest, ActionResponse, DomainName, ErrorResponse, HealthResponse, ViewQuery,
        ViewResponse,
    },
};
use crate::controller::LiveView;
use crate::reconciler::ReconcilerState;
use crate::source::{LogSource, MemoryLedger};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use ledgerview_core::{Domain, GroupMessages, MaterializedView, Uint256, ViewError};

type ApiError = (StatusCode, Json<ErrorResponse>);

/// HTTP status for a failed view operation.
fn status_for(e: &ViewError) -> StatusCode {
    match e {
        ViewError::ScanFailed(_) | ViewError::ResolveFailed { .. } => StatusCode::BAD_GATEWAY,
        ViewError::WriteRejected(_) => StatusCode::UNPROCESSABLE_ENTITY,
        ViewError::InvalidIdentifier(_) => StatusCode::BAD_REQUEST,
        ViewError::SubscriptionLost(_) => StatusCode::SERVICE_UNAVAILABLE,
        ViewError::Config(_) | ViewError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn api_error(e: &ViewError) -> ApiError {
    (status_for(e), Json(ErrorResponse::from(e)))
}

async fn respond<D: Domain + 'static>(
    view: &LiveView<MemoryLedger, D>,
    merged: MaterializedView,
) -> ViewResponse {
    ViewResponse {
        account: view.account().clone(),
        live: view.subscription().await == ReconcilerState::Subscribed,
        pending: view.pending_len().await,
        view: merged.snapshot(),
    }
}

// =============================================================================
// HEALTH HANDLER
// =============================================================================

/// Health check endpoint.
pub async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse::default())
}

// =============================================================================
// VIEW HANDLERS
// =============================================================================

/// Current merged view, without rescanning.
pub async fn view_handler(
    State(state): State<AppState>,
    Query(query): Query<ViewQuery>,
) -> impl IntoResponse {
    let response = match query.domain {
        DomainName::Friends => respond(&state.friends, state.friends.view().await).await,
        DomainName::Groups => respond(&state.groups, state.groups.view().await).await,
        DomainName::Sessions => respond(&state.sessions, state.sessions.view().await).await,
    };
    (StatusCode::OK, Json(response))
}

/// Rescan and re-resolve one view.
pub async fn refresh_handler(
    State(state): State<AppState>,
    Query(query): Query<ViewQuery>,
) -> Result<(StatusCode, Json<ViewResponse>), ApiError> {
    let response = match query.domain {
        DomainName::Friends => {
            let merged = state.friends.refresh().await.map_err(|e| api_error(&e))?;
            respond(&state.friends, merged).await
        }
        DomainName::Groups => {
            let merged = state.groups.refresh().await.map_err(|e| api_error(&e))?;
            respond(&state.groups, merged).await
        }
        DomainName::Sessions => {
            let merged = state.sessions.refresh().await.map_err(|e| api_error(&e))?;
            respond(&state.sessions, merged).await
        }
    };
    Ok((StatusCode::OK, Json(response)))
}

/// Messages of one group, newest first.
pub async fn messages_handler(
    State(state): State<AppState>,
    Path(group): Path<String>,
) -> Result<(StatusCode, Json<ViewResponse>), ApiError> {
    let group = Uint256::parse(&group).map_err(|e| api_error(&e))?;
    let view = LiveView::new(
        state.ledger.clone(),
        state.account.clone(),
        GroupMessages::new(group),
        &state.view_config,
    );
    let merged = view.refresh().await.map_err(|e| api_error(&e))?;
    Ok((StatusCode::OK, Json(respond(&view, merged).await)))
}

// =============================================================================
// ACTION HANDLER
// =============================================================================

/// Confirm a write, then merge its receipt into every account view.
pub async fn action_handler(
    State(state): State<AppState>,
    Json(request): Json<ActionRequest>,
) -> Result<(StatusCode, Json<ActionResponse>), ApiError> {
    let receipt = state
        .ledger
        .confirm_write(&state.account, request.action)
        .await
        .map_err(|e| api_error(&ViewError::from(e)))?;

    let friends = state
        .friends
        .apply_optimistic(&receipt)
        .await
        .map_err(|e| api_error(&e))?;
    let groups = state
        .groups
        .apply_optimistic(&receipt)
        .await
        .map_err(|e| api_error(&e))?;
    let sessions = state
        .sessions
        .apply_optimistic(&receipt)
        .await
        .map_err(|e| api_error(&e))?;

    Ok((
        StatusCode::OK,
        Json(ActionResponse {
            height: receipt.height,
            friends: friends.snapshot(),
            groups: groups.snapshot(),
            sessions: sessions.snapshot(),
        }),
    ))
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failures_map_to_gateway_and_client_errors() {
        assert_eq!(
            status_for(&ViewError::ScanFailed("x".into())),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            status_for(&ViewError::ResolveFailed { failed: 1, total: 2 }),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            status_for(&ViewError::WriteRejected("x".into())),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            status_for(&ViewError::InvalidIdentifier("x".into())),
            StatusCode::BAD_REQUEST
        );
    }
}
