// crates/ado-bridge-mcp/tests/remote_client.rs
// ============================================================================
// Module: Remote API Client Tests
// Description: REST client wire format and response handling.
// Purpose: Ensure calls carry the downstream token and fail closed on bad replies.
// ============================================================================

//! Remote API client tests for ado-bridge-mcp.

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

use ado_bridge_mcp::AdoRestClient;
use ado_bridge_mcp::DownstreamToken;
use ado_bridge_mcp::RemoteApi;
use ado_bridge_mcp::config::AdoBridgeConfig;
use ado_bridge_mcp::config::RemoteApiConfig;
use ado_bridge_mcp::remote::MAX_ERROR_EXCERPT_CHARS;
use ado_bridge_mcp::remote::Project;
use ado_bridge_mcp::remote::RemoteError;
use serde_json::Value;

use crate::common::HttpStub;

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Remote config pointing at `base_url` for organization `contoso`.
fn remote_config(base_url: &str, extra: &str) -> RemoteApiConfig {
    let toml = format!(
        r#"
[remote]
base_url = "{base_url}"
organization = "contoso"
{extra}
"#
    );
    AdoBridgeConfig::from_toml_str(&toml).unwrap().remote
}

/// Client against a stub with the given script.
fn client_for(stub: &HttpStub) -> AdoRestClient {
    AdoRestClient::from_config(&remote_config(&stub.base_url, "")).unwrap()
}

fn token() -> DownstreamToken {
    DownstreamToken::new("downstream-token")
}

// ============================================================================
// SECTION: Projects
// ============================================================================

#[tokio::test]
async fn list_projects_uses_org_path_and_bearer() {
    let stub = HttpStub::start(vec![(
        200,
        r#"{"count":2,"value":[{"id":"p-1","name":"Alpha","state":"wellFormed"},{"id":"p-2","name":"Beta"}]}"#
            .to_string(),
    )]);
    let projects = client_for(&stub).list_projects(&token()).await.unwrap();
    assert_eq!(
        projects,
        vec![
            Project { id: "p-1".to_string(), name: "Alpha".to_string() },
            Project { id: "p-2".to_string(), name: "Beta".to_string() },
        ]
    );
    let request = &stub.requests()[0];
    assert_eq!(request.method, "GET");
    assert_eq!(request.url, "/contoso/_apis/projects?api-version=7.2");
    assert_eq!(request.authorization.as_deref(), Some("Bearer downstream-token"));
}

#[tokio::test]
async fn list_projects_without_value_is_empty() {
    let stub = HttpStub::start(vec![(200, r#"{"count":0}"#.to_string())]);
    assert!(client_for(&stub).list_projects(&token()).await.unwrap().is_empty());
}

#[tokio::test]
async fn error_status_carries_truncated_body() {
    let long_body = format!(r#"{{"message":"{}"}}"#, "x".repeat(MAX_ERROR_EXCERPT_CHARS * 2));
    let stub = HttpStub::start(vec![(401, long_body)]);
    let err = client_for(&stub).list_projects(&token()).await.unwrap_err();
    let RemoteError::Status { status, body } = err else {
        panic!("expected status error, got {err:?}");
    };
    assert_eq!(status, 401);
    assert_eq!(body.chars().count(), MAX_ERROR_EXCERPT_CHARS);
}

#[tokio::test]
async fn non_json_success_is_unexpected_shape() {
    let stub = HttpStub::start(vec![(200, "<html></html>".to_string())]);
    let err = client_for(&stub).list_projects(&token()).await.unwrap_err();
    assert!(matches!(err, RemoteError::UnexpectedShape(_)), "{err:?}");
}

#[tokio::test]
async fn oversized_response_is_rejected() {
    let stub = HttpStub::start(vec![(200, format!(r#"{{"value":[],"pad":"{}"}}"#, "x".repeat(4096)))]);
    let config = remote_config(&stub.base_url, "max_response_bytes = 1024");
    let client = AdoRestClient::from_config(&config).unwrap();
    let err = client.list_projects(&token()).await.unwrap_err();
    assert!(matches!(err, RemoteError::Transport(_)), "{err:?}");
}

// ============================================================================
// SECTION: Queries
// ============================================================================

#[tokio::test]
async fn run_query_posts_query_body() {
    let stub = HttpStub::start(vec![(
        200,
        r#"{"queryType":"flat","workItems":[{"id":101,"url":"a"},{"id":102,"url":"b"}]}"#
            .to_string(),
    )]);
    let query = "SELECT [System.Id] FROM WorkItems";
    let ids = client_for(&stub).run_query(&token(), query).await.unwrap();
    assert_eq!(ids, vec![101, 102]);
    let request = &stub.requests()[0];
    assert_eq!(request.method, "POST");
    assert_eq!(request.url, "/contoso/_apis/wit/wiql?api-version=7.2");
    assert_eq!(request.authorization.as_deref(), Some("Bearer downstream-token"));
    let body: Value = serde_json::from_str(&request.body).unwrap();
    assert_eq!(body, serde_json::json!({ "query": query }));
}

#[tokio::test]
async fn run_query_without_work_items_is_empty() {
    let stub = HttpStub::start(vec![(200, r#"{"queryType":"flat"}"#.to_string())]);
    assert!(client_for(&stub).run_query(&token(), "SELECT").await.unwrap().is_empty());
}

#[tokio::test]
async fn missing_organization_fails_before_any_request() {
    let config = AdoBridgeConfig::from_toml_str("").unwrap().remote;
    let client = AdoRestClient::from_config(&config).unwrap();
    let err = client.list_projects(&token()).await.unwrap_err();
    assert!(matches!(err, RemoteError::NotConfigured(_)), "{err:?}");
}

#[tokio::test]
async fn api_version_is_configurable() {
    let config = remote_config("https://dev.example", "api_version = \"7.1\"");
    let client = AdoRestClient::from_config(&config).unwrap();
    assert_eq!(
        client.endpoint("_apis/projects").unwrap(),
        "https://dev.example/contoso/_apis/projects?api-version=7.1"
    );
}
