//! Gateway integration tests
//!
//! Each test runs a gateway on an ephemeral port, talks to it over real
//! WebSocket connections and, where a backend is involved, points it at a
//! fake service.
//!
//! Run with: cargo test -p integration-tests --test gateway_tests

use std::time::Duration;

use config::FileFormat;
use integration_tests::{
    fixtures::*, unused_addr, wait_until, FakeService, TestClient, TestGateway, RECV_TIMEOUT,
};
use serde_json::json;
use switchboard_common::{HeartbeatConfig, ServiceEndpoint, TransactionConfig};
use switchboard_gateway::{GatewayState, ReconnectPolicy, RoutingDescriptor, ServiceState};

const QUIET: Duration = Duration::from_millis(300);

fn endpoint(name: &str, url: String) -> ServiceEndpoint {
    ServiceEndpoint {
        name: name.to_string(),
        url,
    }
}

fn fast_reconnect() -> ReconnectPolicy {
    ReconnectPolicy::new(Duration::from_millis(50), None)
}

/// Gateway with one backend named `orders`
async fn gateway_with_orders() -> (TestGateway, FakeService) {
    let service = FakeService::start().await.expect("Failed to start fake service");
    let gateway = TestGateway::start_with(
        GatewayState::builder()
            .services(vec![endpoint("orders", service.url())])
            .reconnect(fast_reconnect()),
    )
    .await
    .expect("Failed to start gateway");

    gateway
        .wait_for_service("orders")
        .await
        .expect("Service never connected");

    (gateway, service)
}

// ============================================================================
// Health Check Tests
// ============================================================================

#[tokio::test]
async fn test_health_check() {
    let gateway = TestGateway::start().await.expect("Failed to start gateway");

    let response = reqwest::get(format!("{}/health", gateway.base_url()))
        .await
        .expect("Request failed");

    assert_eq!(response.status(), reqwest::StatusCode::OK);
    assert_eq!(response.text().await.unwrap(), "OK");
}

// ============================================================================
// Validation Tests
// ============================================================================

#[tokio::test]
async fn test_unknown_service_rejected() {
    let gateway = TestGateway::start().await.expect("Failed to start gateway");
    let mut client = gateway.connect().await.unwrap();

    client
        .send_json(&request("t1", "orders", "order", "retrieve"))
        .await
        .unwrap();

    let reply = client.recv_json().await.unwrap();
    assert_eq!(reply["trans_id"], "t1");
    assert_eq!(reply["action"], "RETRIEVE_FAIL");
    assert_eq!(reply["service"], "orders");
    assert_eq!(reply["response"]["code"], 500);
    assert_eq!(reply["response"]["message"], "Unknown service orders");
    assert!(gateway.state.transactions.is_empty());
}

#[tokio::test]
async fn test_missing_fields_rejected() {
    let gateway = TestGateway::start().await.expect("Failed to start gateway");
    let mut client = gateway.connect().await.unwrap();

    client
        .send_json(&json!({"service": "orders", "action": "retrieve"}))
        .await
        .unwrap();
    let reply = client.recv_json().await.unwrap();
    assert_eq!(reply["response"]["code"], 500);
    assert_eq!(reply["response"]["message"], "Missing trans_id");
    assert_eq!(reply["action"], "RETRIEVE_FAIL");

    client
        .send_json(&json!({"trans_id": "t2", "action": "delete"}))
        .await
        .unwrap();
    let reply = client.recv_json().await.unwrap();
    assert_eq!(reply["trans_id"], "t2");
    assert_eq!(reply["response"]["message"], "Missing service");
    assert_eq!(reply["action"], "DELETE_FAIL");

    client.send_json(&json!({"action": "patch"})).await.unwrap();
    let reply = client.recv_json().await.unwrap();
    assert_eq!(reply["response"]["message"], "Missing trans_id, service");

    assert!(gateway.state.transactions.is_empty());
}

#[tokio::test]
async fn test_malformed_json_rejected() {
    let gateway = TestGateway::start().await.expect("Failed to start gateway");
    let mut client = gateway.connect().await.unwrap();

    client.send_text("{not json".to_string()).await.unwrap();

    let reply = client.recv_json().await.unwrap();
    assert_eq!(reply["response"]["code"], 500);
    assert!(reply["response"]["message"]
        .as_str()
        .unwrap()
        .starts_with("Malformed envelope"));
    assert!(reply["action"].is_null());

    // The connection stays usable
    client
        .send_json(&local_request("t1", "gateway", "retrieve"))
        .await
        .unwrap();
    let reply = client.recv_json().await.unwrap();
    assert_eq!(reply["response"]["code"], 200);
}

// ============================================================================
// Forwarding Tests
// ============================================================================

#[tokio::test]
async fn test_reply_routed_to_originating_client() {
    let (gateway, mut service) = gateway_with_orders().await;
    let mut client = gateway.connect().await.unwrap();

    let mut req = request("t1", "orders", "order", "retrieve");
    req["order_id"] = json!(42);
    req["user"] = json!({"role": "Admin", "id": "forged"});
    client.send_json(&req).await.unwrap();

    let forwarded = service.recv_json().await.unwrap();
    assert_eq!(forwarded["trans_id"], "t1");
    assert_eq!(forwarded["order_id"], 42);
    assert_eq!(forwarded["user"]["role"], "Anonymous");
    assert!(forwarded["user"]["id"].is_null());
    assert!(gateway.state.transactions.contains("t1"));

    let reply = json!({
        "trans_id": "t1",
        "action": "RETRIEVED",
        "response": {"code": 200, "order": {"id": 42}},
    });
    service.send_json(&reply).unwrap();

    let received = client.recv_json().await.unwrap();
    assert_eq!(received["trans_id"], "t1");
    assert_eq!(received["action"], "RETRIEVED");
    assert_eq!(received["response"]["order"]["id"], 42);
    assert!(received["service_tstamp"].is_i64());
    assert!(received.get("connection_latency").is_some());
    assert!(!gateway.state.transactions.contains("t1"));

    // A second reply for the same transaction goes nowhere
    service.send_json(&reply).unwrap();
    client.expect_silence(QUIET).await.unwrap();
}

#[tokio::test]
async fn test_replies_reach_their_own_clients() {
    let (gateway, mut service) = gateway_with_orders().await;
    let mut alice = gateway.connect().await.unwrap();
    let mut bob = gateway.connect().await.unwrap();

    alice
        .send_json(&request("a1", "orders", "order", "retrieve"))
        .await
        .unwrap();
    bob.send_json(&request("b1", "orders", "order", "delete"))
        .await
        .unwrap();
    service.recv_json().await.unwrap();
    service.recv_json().await.unwrap();

    service
        .send_json(&json!({"trans_id": "b1", "action": "DELETED", "response": {"code": 200}}))
        .unwrap();
    service
        .send_json(&json!({"trans_id": "a1", "action": "RETRIEVED", "response": {"code": 200}}))
        .unwrap();

    assert_eq!(bob.recv_json().await.unwrap()["trans_id"], "b1");
    assert_eq!(alice.recv_json().await.unwrap()["trans_id"], "a1");
}

#[tokio::test]
async fn test_duplicate_trans_id_keeps_first_owner() {
    let (gateway, mut service) = gateway_with_orders().await;
    let mut first = gateway.connect().await.unwrap();
    let mut second = gateway.connect().await.unwrap();

    first
        .send_json(&request("dup", "orders", "order", "retrieve"))
        .await
        .unwrap();
    service.recv_json().await.unwrap();

    second
        .send_json(&request("dup", "orders", "order", "retrieve"))
        .await
        .unwrap();
    service.recv_json().await.unwrap();

    service
        .send_json(&json!({"trans_id": "dup", "response": {"code": 200}}))
        .unwrap();

    assert_eq!(first.recv_json().await.unwrap()["trans_id"], "dup");
    second.expect_silence(QUIET).await.unwrap();
}

#[tokio::test]
async fn test_reply_without_trans_id_dropped() {
    let (gateway, mut service) = gateway_with_orders().await;
    let mut client = gateway.connect().await.unwrap();

    client
        .send_json(&request("t1", "orders", "order", "retrieve"))
        .await
        .unwrap();
    service.recv_json().await.unwrap();

    service.send_json(&json!({"response": {"code": 200}})).unwrap();
    client.expect_silence(QUIET).await.unwrap();
    assert!(gateway.state.transactions.contains("t1"));
}

#[tokio::test]
async fn test_disconnect_purges_transactions() {
    let (gateway, mut service) = gateway_with_orders().await;
    let mut client = gateway.connect().await.unwrap();

    for id in ["p1", "p2"] {
        client
            .send_json(&request(id, "orders", "order", "retrieve"))
            .await
            .unwrap();
        service.recv_json().await.unwrap();
    }
    assert_eq!(gateway.state.transactions.len(), 2);

    client.close().await.unwrap();

    let state = gateway.state.clone();
    wait_until(RECV_TIMEOUT, || {
        state.transactions.is_empty() && state.connections.connection_count() == 0
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn test_unanswered_transaction_times_out() {
    let service = FakeService::start().await.unwrap();
    let gateway = TestGateway::start_with(
        GatewayState::builder()
            .services(vec![endpoint("orders", service.url())])
            .reconnect(fast_reconnect())
            .transaction_config(TransactionConfig {
                timeout_secs: 1,
                sweep_interval_secs: 1,
            }),
    )
    .await
    .unwrap();
    gateway.wait_for_service("orders").await.unwrap();

    let mut client = gateway.connect().await.unwrap();
    client
        .send_json(&request("slow", "orders", "order", "crt_updt"))
        .await
        .unwrap();

    let reply = client.recv_json().await.unwrap();
    assert_eq!(reply["trans_id"], "slow");
    assert_eq!(reply["action"], "CRT_UPDT_FAIL");
    assert_eq!(reply["response"]["code"], 504);
    assert_eq!(reply["response"]["message"], "Transaction slow timed out");
    assert!(!gateway.state.transactions.contains("slow"));
}

// ============================================================================
// Service Connection Tests
// ============================================================================

#[tokio::test]
async fn test_service_reconnects_after_close() {
    let (gateway, mut service) = gateway_with_orders().await;
    assert_eq!(service.accepted(), 1);

    service.close_connection().unwrap();

    wait_until(RECV_TIMEOUT, || service.accepted() == 2)
        .await
        .expect("Gateway did not reconnect");
    gateway.wait_for_service("orders").await.unwrap();

    let mut client = gateway.connect().await.unwrap();
    client
        .send_json(&request("after", "orders", "order", "retrieve"))
        .await
        .unwrap();
    assert_eq!(service.recv_json().await.unwrap()["trans_id"], "after");
}

#[tokio::test]
async fn test_service_reconnects_once_after_delay() {
    let delay = Duration::from_millis(400);
    let service = FakeService::start().await.unwrap();
    let gateway = TestGateway::start_with(
        GatewayState::builder()
            .services(vec![endpoint("orders", service.url())])
            .reconnect(ReconnectPolicy::new(delay, None)),
    )
    .await
    .unwrap();
    gateway.wait_for_service("orders").await.unwrap();
    assert_eq!(service.accepted(), 1);

    service.close_connection().unwrap();
    let services = gateway.state.services.clone();
    wait_until(RECV_TIMEOUT, || !services.is_open("orders"))
        .await
        .expect("Session never ended");

    tokio::time::sleep(delay / 2).await;
    assert_eq!(service.accepted(), 1, "reconnected before the delay elapsed");

    wait_until(RECV_TIMEOUT, || service.accepted() == 2)
        .await
        .expect("Gateway did not reconnect");
    gateway.wait_for_service("orders").await.unwrap();

    tokio::time::sleep(delay * 3).await;
    assert_eq!(service.accepted(), 2);
    assert_eq!(gateway.state.services.attempts("orders"), Some(2));
}

#[tokio::test]
async fn test_unreachable_service_gives_up() {
    let addr = unused_addr().unwrap();
    let gateway = TestGateway::start_with(
        GatewayState::builder()
            .services(vec![endpoint("ledger", format!("ws://{addr}/"))])
            .reconnect(ReconnectPolicy::new(Duration::from_millis(20), Some(2))),
    )
    .await
    .unwrap();

    let services = gateway.state.services.clone();
    wait_until(RECV_TIMEOUT, || {
        services.attempts("ledger") == Some(2) && services.state("ledger") == Some(ServiceState::Closed)
    })
    .await
    .unwrap();

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(services.attempts("ledger"), Some(2));

    // Requests to a configured but closed service are rejected like unknown ones
    let mut client = gateway.connect().await.unwrap();
    client
        .send_json(&request("t1", "ledger", "entry", "retrieve"))
        .await
        .unwrap();
    let reply = client.recv_json().await.unwrap();
    assert_eq!(reply["response"]["message"], "Unknown service ledger");
}

// ============================================================================
// Local Dispatch Tests
// ============================================================================

#[tokio::test]
async fn test_builtin_connection_info() {
    let gateway = TestGateway::start().await.expect("Failed to start gateway");
    let mut client = gateway.connect().await.unwrap();

    client
        .send_json(&local_request("c1", "connection", "retrieve"))
        .await
        .unwrap();

    let reply = client.recv_json().await.unwrap();
    assert_eq!(reply["trans_id"], "c1");
    assert_eq!(reply["action"], "RETRIEVED");
    assert_eq!(reply["service"], "_server_");
    assert_eq!(reply["response"]["code"], 200);
    assert_eq!(reply["response"]["role"], "Anonymous");
    assert!(reply["response"]["connection_id"].is_string());
    assert!(gateway.state.transactions.is_empty());
}

#[tokio::test]
async fn test_custom_local_handler_invoked_once() {
    let recorder = Recorder::new();
    let routes = RoutingDescriptor::parse(PROFILE_ROUTES, FileFormat::Yaml).unwrap();
    let gateway = TestGateway::start_with(
        GatewayState::builder()
            .routes(routes)
            .handler("profiles", "show", recorder.clone())
            .verifier(TokenTable::new().with("alice", "Bidder", "alice")),
    )
    .await
    .unwrap();
    let mut client = gateway.connect().await.unwrap();

    let mut login = local_request(&unique_trans_id(), "session", "crt_updt");
    login["token"] = json!("alice");
    client.send_json(&login).await.unwrap();
    let reply = client.recv_json().await.unwrap();
    assert_eq!(reply["action"], "CRT_UPDTD");

    client
        .send_json(&local_request("show-1", "profile", "retrieve"))
        .await
        .unwrap();
    let reply = client.recv_json().await.unwrap();
    assert_eq!(reply["trans_id"], "show-1");
    assert_eq!(reply["action"], "RETRIEVED");
    assert_eq!(reply["response"]["handled"], true);

    assert_eq!(recorder.calls(), 1);
    let user = recorder.last_user().unwrap();
    assert_eq!(user.role.as_str(), "Bidder");
    assert_eq!(user.id.as_deref(), Some("alice"));
}

#[tokio::test]
async fn test_unrouted_local_request_rejected() {
    let gateway = TestGateway::start().await.expect("Failed to start gateway");
    let mut client = gateway.connect().await.unwrap();

    client
        .send_json(&local_request("x1", "invoice", "flush"))
        .await
        .unwrap();

    let reply = client.recv_json().await.unwrap();
    assert_eq!(reply["action"], "FLUSH_FAIL");
    assert_eq!(reply["response"]["code"], 500);
    assert_eq!(reply["response"]["message"], "No local handler for invoice/flush");
}

// ============================================================================
// Authentication Tests
// ============================================================================

#[tokio::test]
async fn test_authenticated_role_forwarded() {
    let mut service = FakeService::start().await.unwrap();
    let gateway = TestGateway::start_with(
        GatewayState::builder()
            .services(vec![endpoint("orders", service.url())])
            .reconnect(fast_reconnect())
            .verifier(TokenTable::new().with("alice", "Bidder", "alice")),
    )
    .await
    .unwrap();
    gateway.wait_for_service("orders").await.unwrap();
    let mut client = gateway.connect().await.unwrap();

    let mut login = local_request("login", "session", "crt_updt");
    login["token"] = json!("alice");
    client.send_json(&login).await.unwrap();

    let reply = client.recv_json().await.unwrap();
    assert_eq!(reply["response"]["code"], 200);
    assert_eq!(reply["response"]["role"], "Bidder");
    assert_eq!(gateway.state.connections.authenticated_count(), 1);

    client
        .send_json(&request("t1", "orders", "order", "retrieve"))
        .await
        .unwrap();
    let forwarded = service.recv_json().await.unwrap();
    assert_eq!(forwarded["user"]["role"], "Bidder");
    assert_eq!(forwarded["user"]["id"], "alice");
}

#[tokio::test]
async fn test_invalid_token_rejected() {
    let gateway = TestGateway::start_with(
        GatewayState::builder().verifier(TokenTable::new().with("alice", "Bidder", "alice")),
    )
    .await
    .unwrap();
    let mut client = gateway.connect().await.unwrap();

    let mut login = local_request("login", "session", "crt_updt");
    login["token"] = json!("mallory");
    client.send_json(&login).await.unwrap();

    let reply = client.recv_json().await.unwrap();
    assert_eq!(reply["action"], "CRT_UPDT_FAIL");
    assert_eq!(reply["response"]["code"], 401);
    assert_eq!(gateway.state.connections.authenticated_count(), 0);
}

// ============================================================================
// Heartbeat Tests
// ============================================================================

#[tokio::test]
async fn test_heartbeat_records_latency() {
    let gateway = TestGateway::start_with(GatewayState::builder().heartbeat(HeartbeatConfig {
        interval_secs: 1,
        latency_log_interval_secs: 600,
        terminate_unresponsive: false,
    }))
    .await
    .unwrap();
    let mut client = gateway.connect().await.unwrap();

    // tungstenite answers pings while the stream is polled
    client.recv_ping().await.unwrap();
    client.expect_silence(Duration::from_millis(200)).await.unwrap();

    let connections = gateway.state.connections.clone();
    wait_until(RECV_TIMEOUT, || {
        connections
            .all_connections()
            .iter()
            .any(|c| c.latency_ms().is_some())
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn test_unresponsive_client_terminated_when_enabled() {
    let gateway = TestGateway::start_with(GatewayState::builder().heartbeat(HeartbeatConfig {
        interval_secs: 1,
        latency_log_interval_secs: 600,
        terminate_unresponsive: true,
    }))
    .await
    .unwrap();

    // A client that never reads never answers pings
    let mut silent: TestClient = gateway.connect().await.unwrap();

    let connections = gateway.state.connections.clone();
    wait_until(Duration::from_secs(10), || connections.connection_count() == 0)
        .await
        .expect("Unresponsive client was not closed");

    // The writer is given a bounded window to flush the close frame
    silent
        .wait_closed(RECV_TIMEOUT)
        .await
        .expect("Socket still open after reaping");
}
