//! Integration tests for the Ledgerview HTTP API.
//!
//! Uses axum-test to exercise the handlers without binding a socket.

#![allow(clippy::unwrap_used, clippy::panic)]

use axum::http::StatusCode;
use axum_test::TestServer;
use ledgerview::ViewConfig;
use ledgerview::api::{
    ActionResponse, AppState, ErrorResponse, HealthResponse, ViewResponse, create_router,
};
use ledgerview::source::MemoryLedger;
use ledgerview_core::{Address, Bucket, WriteAction};
use serde_json::json;
use std::sync::Arc;

// =============================================================================
// HELPER FUNCTIONS
// =============================================================================

fn addr(n: u64) -> Address {
    Address::from_low_u64(n)
}

/// A server for account 1, with an incoming request from account 2.
async fn create_test_server() -> (TestServer, Arc<MemoryLedger>) {
    let ledger = Arc::new(MemoryLedger::new());
    ledger
        .write(&addr(2), WriteAction::SendFriendRequest { to: addr(1) })
        .unwrap();

    let state = AppState::new(ledger.clone(), addr(1), ViewConfig::default());
    state.start().await.unwrap();
    (TestServer::new(create_router(state)).unwrap(), ledger)
}

fn count(view: &ViewResponse, bucket: Bucket) -> usize {
    view.view.buckets.get(&bucket).map_or(0, Vec::len)
}

// =============================================================================
// HEALTH
// =============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let (server, _) = create_test_server().await;

    let response = server.get("/health").await;
    response.assert_status_ok();

    let body: HealthResponse = response.json();
    assert_eq!(body.status, "ok");
    assert_eq!(body.version, env!("CARGO_PKG_VERSION"));
}

// =============================================================================
// VIEWS
// =============================================================================

#[tokio::test]
async fn test_view_defaults_to_friends() {
    let (server, _) = create_test_server().await;

    let response = server.get("/view").await;
    response.assert_status_ok();

    let body: ViewResponse = response.json();
    assert_eq!(body.account, addr(1));
    assert!(body.live);
    assert_eq!(body.view.domain, "friends");
    assert_eq!(count(&body, Bucket::Incoming), 1);
}

#[tokio::test]
async fn test_groups_view_starts_empty() {
    let (server, _) = create_test_server().await;

    let response = server.get("/view").add_query_param("domain", "groups").await;
    response.assert_status_ok();

    let body: ViewResponse = response.json();
    assert_eq!(body.view.domain, "groups");
    assert_eq!(body.view.total(), 0);
}

#[tokio::test]
async fn test_unknown_domain_is_rejected() {
    let (server, _) = create_test_server().await;

    let response = server.get("/view").add_query_param("domain", "tokens").await;
    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_refresh_picks_up_new_history() {
    let (server, ledger) = create_test_server().await;
    ledger
        .write(&addr(3), WriteAction::SendFriendRequest { to: addr(1) })
        .unwrap();

    let response = server
        .post("/refresh")
        .add_query_param("domain", "friends")
        .await;
    response.assert_status_ok();

    let body: ViewResponse = response.json();
    assert_eq!(count(&body, Bucket::Incoming), 2);
}

#[tokio::test]
async fn test_refresh_failure_is_bad_gateway() {
    let (server, ledger) = create_test_server().await;
    ledger.fail_heights(true);

    let response = server.post("/refresh").await;
    response.assert_status(StatusCode::BAD_GATEWAY);

    let body: ErrorResponse = response.json();
    assert!(body.error.contains("height read"));
}

// =============================================================================
// ACTIONS
// =============================================================================

#[tokio::test]
async fn test_action_merges_optimistically() {
    let (server, _) = create_test_server().await;

    let response = server
        .post("/action")
        .json(&json!({
            "action": { "type": "accept_friend_request", "from": addr(2) }
        }))
        .await;
    response.assert_status_ok();

    let body: ActionResponse = response.json();
    assert_eq!(body.height, 2);
    assert_eq!(body.friends.buckets.get(&Bucket::Established).map(Vec::len), Some(1));
    assert!(!body.friends.buckets.contains_key(&Bucket::Incoming));
    assert_eq!(body.groups.total(), 0);
}

#[tokio::test]
async fn test_created_group_is_listed() {
    let (server, _) = create_test_server().await;

    let response = server
        .post("/action")
        .json(&json!({
            "action": { "type": "create_group", "name": "climbing" }
        }))
        .await;
    response.assert_status_ok();

    let body: ActionResponse = response.json();
    assert_eq!(body.groups.buckets.get(&Bucket::Listed).map(Vec::len), Some(1));
}

#[tokio::test]
async fn test_reverted_action_is_unprocessable() {
    let (server, _) = create_test_server().await;

    let response = server
        .post("/action")
        .json(&json!({
            "action": { "type": "remove_friend", "friend": addr(2) }
        }))
        .await;
    response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_session_lifecycle_through_actions() {
    let (server, _) = create_test_server().await;

    let response = server
        .post("/action")
        .json(&json!({
            "action": { "type": "create_session", "peer": addr(2) }
        }))
        .await;
    response.assert_status_ok();
    let body: ActionResponse = response.json();
    assert_eq!(body.sessions.buckets.get(&Bucket::Listed).map(Vec::len), Some(1));
    assert_eq!(body.friends.total(), 1);

    let listed = server.get("/view").add_query_param("domain", "sessions").await;
    listed.assert_status_ok();
    let view: ViewResponse = listed.json();
    assert_eq!(view.view.domain, "sessions");
    assert_eq!(count(&view, Bucket::Listed), 1);

    let response = server
        .post("/action")
        .json(&json!({
            "action": { "type": "end_session", "session_id": "1" }
        }))
        .await;
    response.assert_status_ok();
    let body: ActionResponse = response.json();
    assert_eq!(body.sessions.total(), 0);
}

#[tokio::test]
async fn test_message_to_unknown_session_is_unprocessable() {
    let (server, _) = create_test_server().await;

    let response = server
        .post("/action")
        .json(&json!({
            "action": { "type": "send_session_message", "session_id": "9", "cid": "bafy" }
        }))
        .await;
    response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
}

// =============================================================================
// MESSAGES
// =============================================================================

#[tokio::test]
async fn test_group_messages_listing() {
    let (server, _) = create_test_server().await;

    server
        .post("/action")
        .json(&json!({
            "action": { "type": "create_group", "name": "climbing" }
        }))
        .await
        .assert_status_ok();
    server
        .post("/action")
        .json(&json!({
            "action": { "type": "send_group_message", "group_id": "1", "cid": "bafkreihello" }
        }))
        .await
        .assert_status_ok();

    let response = server.get("/groups/1/messages").await;
    response.assert_status_ok();

    let body: ViewResponse = response.json();
    assert_eq!(body.view.domain, "group_messages");
    assert_eq!(body.view.total(), 1);
}

#[tokio::test]
async fn test_invalid_group_id_is_bad_request() {
    let (server, _) = create_test_server().await;

    let response = server.get("/groups/not-a-number/messages").await;
    response.assert_status(StatusCode::BAD_REQUEST);
}
