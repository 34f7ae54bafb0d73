// crates/ado-bridge-mcp/tests/http_transport.rs
// ============================================================================
// Module: HTTP Transport Tests
// Description: End-to-end JSON-RPC over HTTP against stubbed upstreams.
// Purpose: Exercise config, exchange, remote call, response, and audit together.
// ============================================================================

//! HTTP transport end-to-end tests for ado-bridge-mcp.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only assertions use unwrap for clarity."
)]

mod common;

use std::net::SocketAddr;
use std::path::Path;

use ado_bridge_mcp::McpServer;
use ado_bridge_mcp::config::AdoBridgeConfig;
use serde_json::Value;
use serde_json::json;
use tokio::net::TcpListener;

use crate::common::HttpStub;
use crate::common::form_value;

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Builds a config routing identity and remote traffic to the stubs.
fn bridge_config(idp: &HttpStub, remote: &HttpStub, audit_path: &Path) -> AdoBridgeConfig {
    let toml = format!(
        r#"
[server]
bind = "127.0.0.1:0"
max_body_bytes = 4096

[server.audit]
enabled = true
path = "{audit}"

[identity]
tenant_id = "tenant-1"
client_id = "client-1"
client_secret = "secret-1"
authority_host = "{idp}"

[remote]
base_url = "{remote}"
organization = "contoso"
"#,
        audit = audit_path.display(),
        idp = idp.base_url,
        remote = remote.base_url,
    );
    AdoBridgeConfig::from_toml_str(&toml).unwrap()
}

/// Starts the server on an ephemeral port.
async fn start(config: &AdoBridgeConfig) -> SocketAddr {
    let server = McpServer::from_config(config).unwrap();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(server.serve_with_listener(listener));
    addr
}

/// Posts a JSON-RPC body and returns status and parsed body.
async fn post(addr: SocketAddr, auth: Option<&str>, body: &Value) -> (u16, Value) {
    let client = reqwest::Client::new();
    let mut request = client.post(format!("http://{addr}/mcp")).json(body);
    if let Some(auth) = auth {
        request = request.header("Authorization", auth);
    }
    let response = request.send().await.unwrap();
    let status = response.status().as_u16();
    let text = response.text().await.unwrap();
    let value = if text.is_empty() { Value::Null } else { serde_json::from_str(&text).unwrap() };
    (status, value)
}

/// Reads audit JSON lines.
fn audit_lines(path: &Path) -> Vec<Value> {
    std::fs::read_to_string(path)
        .unwrap_or_default()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[tokio::test(flavor = "multi_thread")]
async fn list_projects_round_trip_over_http() {
    let idp = HttpStub::start(vec![(200, r#"{"access_token":"downstream-1"}"#.to_string())]);
    let remote = HttpStub::start(vec![(
        200,
        r#"{"count":1,"value":[{"id":"p-1","name":"Alpha"}]}"#.to_string(),
    )]);
    let dir = tempfile::tempdir().unwrap();
    let audit_path = dir.path().join("audit.log");
    let addr = start(&bridge_config(&idp, &remote, &audit_path)).await;

    let (status, body) = post(
        addr,
        Some("Bearer inbound-assertion"),
        &json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "tools/call",
            "params": { "name": "ado_list_projects", "arguments": {} }
        }),
    )
    .await;
    assert_eq!(status, 200, "{body}");
    assert_eq!(body["id"], 1);
    assert_eq!(
        body["result"]["structuredContent"],
        json!({ "projects": [{ "id": "p-1", "name": "Alpha" }] })
    );
    assert_eq!(body["result"]["content"][0]["type"], "text");

    let idp_requests = idp.requests();
    assert_eq!(idp_requests.len(), 1);
    assert_eq!(form_value(&idp_requests[0].body, "assertion").as_deref(), Some("inbound-assertion"));
    let remote_requests = remote.requests();
    assert_eq!(remote_requests.len(), 1);
    assert_eq!(remote_requests[0].authorization.as_deref(), Some("Bearer downstream-1"));

    let events: Vec<Value> = audit_lines(&audit_path)
        .into_iter()
        .filter(|event| event["event"] == "mcp_request")
        .collect();
    assert_eq!(events.len(), 1);
    let event = &events[0];
    assert_eq!(event["tool"], "ado_list_projects");
    assert_eq!(event["stage"], "responded");
    assert_eq!(event["outcome"], "success");
    let rendered = event.to_string();
    assert!(!rendered.contains("inbound-assertion"));
    assert!(!rendered.contains("downstream-1"));
}

#[tokio::test(flavor = "multi_thread")]
async fn query_round_trip_over_http() {
    let idp = HttpStub::start(vec![(200, r#"{"access_token":"downstream-2"}"#.to_string())]);
    let remote = HttpStub::start(vec![(
        200,
        r#"{"workItems":[{"id":101},{"id":102}]}"#.to_string(),
    )]);
    let dir = tempfile::tempdir().unwrap();
    let addr = start(&bridge_config(&idp, &remote, &dir.path().join("audit.log"))).await;
    let (status, body) = post(
        addr,
        Some("Bearer inbound"),
        &json!({
            "jsonrpc": "2.0",
            "id": "q",
            "method": "tools/call",
            "params": { "name": "ado_query_wiql", "arguments": { "wiql": "SELECT [System.Id] FROM WorkItems" } }
        }),
    )
    .await;
    assert_eq!(status, 200, "{body}");
    assert_eq!(body["result"]["structuredContent"], json!({ "ids": [101, 102] }));
}

#[tokio::test(flavor = "multi_thread")]
async fn invalid_input_never_reaches_upstreams() {
    let idp = HttpStub::start(vec![(200, r#"{"access_token":"unused"}"#.to_string())]);
    let remote = HttpStub::start(vec![(200, "{}".to_string())]);
    let dir = tempfile::tempdir().unwrap();
    let addr = start(&bridge_config(&idp, &remote, &dir.path().join("audit.log"))).await;
    let (status, body) = post(
        addr,
        Some("Bearer inbound"),
        &json!({
            "jsonrpc": "2.0",
            "id": 2,
            "method": "tools/call",
            "params": { "name": "ado_query_wiql", "arguments": {} }
        }),
    )
    .await;
    assert_eq!(status, 400);
    assert_eq!(body["error"]["code"], -32602);
    assert_eq!(body["error"]["data"]["kind"], "input_validation_error");
    assert!(idp.requests().is_empty());
    assert!(remote.requests().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn missing_credential_is_unauthorized() {
    let idp = HttpStub::start(Vec::new());
    let remote = HttpStub::start(Vec::new());
    let dir = tempfile::tempdir().unwrap();
    let addr = start(&bridge_config(&idp, &remote, &dir.path().join("audit.log"))).await;
    let (status, body) = post(
        addr,
        None,
        &json!({
            "jsonrpc": "2.0",
            "id": 3,
            "method": "tools/call",
            "params": { "name": "ado_list_projects" }
        }),
    )
    .await;
    assert_eq!(status, 401);
    assert_eq!(body["error"]["code"], -32001);
    assert_eq!(body["error"]["data"]["kind"], "authentication_error");
}

#[tokio::test(flavor = "multi_thread")]
async fn oversized_body_is_rejected() {
    let idp = HttpStub::start(Vec::new());
    let remote = HttpStub::start(Vec::new());
    let dir = tempfile::tempdir().unwrap();
    let addr = start(&bridge_config(&idp, &remote, &dir.path().join("audit.log"))).await;
    let padding = "x".repeat(8192);
    let (status, body) = post(
        addr,
        Some("Bearer inbound"),
        &json!({ "jsonrpc": "2.0", "id": 4, "method": "ping", "params": { "pad": padding } }),
    )
    .await;
    assert_eq!(status, 413);
    assert_eq!(body["error"]["code"], -32070);
}

#[tokio::test(flavor = "multi_thread")]
async fn initialize_and_notification_flow() {
    let idp = HttpStub::start(Vec::new());
    let remote = HttpStub::start(Vec::new());
    let dir = tempfile::tempdir().unwrap();
    let addr = start(&bridge_config(&idp, &remote, &dir.path().join("audit.log"))).await;
    let (status, body) = post(
        addr,
        None,
        &json!({
            "jsonrpc": "2.0",
            "id": 0,
            "method": "initialize",
            "params": { "protocolVersion": "2025-06-18", "capabilities": {}, "clientInfo": { "name": "t", "version": "1" } }
        }),
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(body["result"]["protocolVersion"], "2025-06-18");
    assert!(body["result"]["capabilities"]["tools"].is_object());

    let (status, body) =
        post(addr, None, &json!({ "jsonrpc": "2.0", "method": "notifications/initialized" })).await;
    assert_eq!(status, 202);
    assert_eq!(body, Value::Null);
}

#[tokio::test(flavor = "multi_thread")]
async fn health_probe_answers() {
    let idp = HttpStub::start(Vec::new());
    let remote = HttpStub::start(Vec::new());
    let dir = tempfile::tempdir().unwrap();
    let addr = start(&bridge_config(&idp, &remote, &dir.path().join("audit.log"))).await;
    let response = reqwest::get(format!("http://{addr}/healthz")).await.unwrap();
    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "ok");
}
