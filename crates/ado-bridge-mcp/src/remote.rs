// crates/ado-bridge-mcp/src/remote.rs
// ============================================================================
// Module: Remote API Client
// Description: Typed access to the project and work item query endpoints.
// Purpose: Call the remote REST API with a per-request downstream token.
// Dependencies: async-trait, reqwest, serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! [`RemoteApi`] is the seam between tool handlers and the remote service.
//! [`AdoRestClient`] calls the organization-scoped REST endpoints with the
//! downstream token as a bearer credential. Response shapes are checked
//! strictly: a missing collection is an empty result, but a malformed entry
//! is an error.

// ============================================================================
// SECTION: Imports
// ============================================================================

use ado_bridge_config::RemoteApiConfig;
use async_trait::async_trait;
use reqwest::Client;
use reqwest::RequestBuilder;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use serde_json::json;
use thiserror::Error;

use crate::broker::DownstreamToken;
use crate::http::build_client;
use crate::http::describe_send_error;
use crate::http::read_limited_body;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum characters of a remote error body kept in errors.
pub const MAX_ERROR_EXCERPT_CHARS: usize = 512;

/// Projects listing path under the organization.
const PROJECTS_PATH: &str = "_apis/projects";

/// WIQL query path under the organization.
const WIQL_PATH: &str = "_apis/wit/wiql";

// ============================================================================
// SECTION: Types
// ============================================================================

/// A project visible to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    /// Project identifier.
    pub id: String,
    /// Project display name.
    pub name: String,
}

/// Remote API failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    /// The remote API answered with a non-success status.
    #[error("remote api returned status {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Truncated response body.
        body: String,
    },
    /// The remote API could not be reached.
    #[error("remote api unreachable: {0}")]
    Transport(String),
    /// The response did not have the expected shape.
    #[error("remote api returned an unexpected response: {0}")]
    UnexpectedShape(String),
    /// The client is missing required settings.
    #[error("remote api not configured: {0}")]
    NotConfigured(String),
}

// ============================================================================
// SECTION: Remote API Interface
// ============================================================================

/// Operations the tool handlers need from the remote service.
#[async_trait]
pub trait RemoteApi: Send + Sync {
    /// Lists projects visible to the token holder.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError`] when the call fails or the response is malformed.
    async fn list_projects(&self, token: &DownstreamToken) -> Result<Vec<Project>, RemoteError>;

    /// Runs a work item query and returns matching work item ids in order.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError`] when the call fails or the response is malformed.
    async fn run_query(&self, token: &DownstreamToken, query: &str)
    -> Result<Vec<u64>, RemoteError>;
}

// ============================================================================
// SECTION: REST Client
// ============================================================================

/// HTTP implementation of [`RemoteApi`].
#[derive(Debug, Clone)]
pub struct AdoRestClient {
    /// HTTP client with configured timeouts.
    client: Client,
    /// Service base URL without trailing slash.
    base_url: String,
    /// Organization segment, when configured.
    organization: Option<String>,
    /// API version query value.
    api_version: String,
    /// Maximum response body size in bytes.
    max_response_bytes: usize,
}

impl AdoRestClient {
    /// Builds a client from remote API configuration.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError::Transport`] when the HTTP client cannot be built.
    pub fn from_config(config: &RemoteApiConfig) -> Result<Self, RemoteError> {
        let client =
            build_client(config.timeouts).map_err(|err| RemoteError::Transport(err.to_string()))?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            organization: config.organization().map(str::to_string),
            api_version: config.api_version.trim().to_string(),
            max_response_bytes: config.max_response_bytes,
        })
    }

    /// Returns the organization-scoped URL for `path`.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError::NotConfigured`] when no organization is set.
    pub fn endpoint(&self, path: &str) -> Result<String, RemoteError> {
        let organization = self
            .organization
            .as_deref()
            .ok_or_else(|| RemoteError::NotConfigured("organization is not set".to_string()))?;
        Ok(format!(
            "{}/{organization}/{path}?api-version={}",
            self.base_url, self.api_version
        ))
    }

    /// Sends a request and parses a JSON success body.
    async fn send_json(&self, request: RequestBuilder) -> Result<Value, RemoteError> {
        let response =
            request.send().await.map_err(|err| RemoteError::Transport(describe_send_error(&err)))?;
        let status = response.status();
        let body = read_limited_body(response, self.max_response_bytes)
            .await
            .map_err(|err| RemoteError::Transport(err.describe()))?;
        if !status.is_success() {
            return Err(RemoteError::Status {
                status: status.as_u16(),
                body: error_excerpt(&body),
            });
        }
        serde_json::from_slice(&body)
            .map_err(|_| RemoteError::UnexpectedShape("response body is not json".to_string()))
    }
}

#[async_trait]
impl RemoteApi for AdoRestClient {
    async fn list_projects(&self, token: &DownstreamToken) -> Result<Vec<Project>, RemoteError> {
        let url = self.endpoint(PROJECTS_PATH)?;
        let request = self.client.get(url).bearer_auth(token.as_str());
        let body = self.send_json(request).await?;
        parse_projects(&body)
    }

    async fn run_query(
        &self,
        token: &DownstreamToken,
        query: &str,
    ) -> Result<Vec<u64>, RemoteError> {
        let url = self.endpoint(WIQL_PATH)?;
        let request =
            self.client.post(url).bearer_auth(token.as_str()).json(&json!({ "query": query }));
        let body = self.send_json(request).await?;
        parse_work_item_ids(&body)
    }
}

// ============================================================================
// SECTION: Response Parsing
// ============================================================================

/// Extracts projects from a `{ "value": [...] }` envelope.
///
/// # Errors
///
/// Returns [`RemoteError::UnexpectedShape`] when the envelope or an entry is
/// malformed.
pub fn parse_projects(body: &Value) -> Result<Vec<Project>, RemoteError> {
    let Some(entries) = collection(body, "value")? else {
        return Ok(Vec::new());
    };
    entries
        .iter()
        .enumerate()
        .map(|(index, entry)| {
            let id = string_field(entry, "id");
            let name = string_field(entry, "name");
            match (id, name) {
                (Some(id), Some(name)) => Ok(Project { id: id.to_string(), name: name.to_string() }),
                _ => Err(RemoteError::UnexpectedShape(format!(
                    "project entry {index} lacks string id and name"
                ))),
            }
        })
        .collect()
}

/// Extracts work item ids from a `{ "workItems": [...] }` envelope.
///
/// # Errors
///
/// Returns [`RemoteError::UnexpectedShape`] when the envelope or an entry is
/// malformed.
pub fn parse_work_item_ids(body: &Value) -> Result<Vec<u64>, RemoteError> {
    let Some(entries) = collection(body, "workItems")? else {
        return Ok(Vec::new());
    };
    entries
        .iter()
        .enumerate()
        .map(|(index, entry)| {
            entry.get("id").and_then(Value::as_u64).ok_or_else(|| {
                RemoteError::UnexpectedShape(format!("work item entry {index} lacks integer id"))
            })
        })
        .collect()
}

/// Returns the named array, `None` when absent or null.
fn collection<'a>(body: &'a Value, key: &str) -> Result<Option<&'a Vec<Value>>, RemoteError> {
    let object = body
        .as_object()
        .ok_or_else(|| RemoteError::UnexpectedShape("response is not a json object".to_string()))?;
    match object.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Array(entries)) => Ok(Some(entries)),
        Some(_) => Err(RemoteError::UnexpectedShape(format!("`{key}` is not an array"))),
    }
}

/// Returns a string field from a JSON object.
fn string_field<'a>(entry: &'a Value, key: &str) -> Option<&'a str> {
    entry.get(key).and_then(Value::as_str)
}

/// Returns a lossy, truncated excerpt of an error body.
fn error_excerpt(body: &[u8]) -> String {
    String::from_utf8_lossy(body).chars().take(MAX_ERROR_EXCERPT_CHARS).collect()
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(
        clippy::unwrap_used,
        clippy::expect_used,
        reason = "Test-only assertions use unwrap for clarity."
    )]

    use serde_json::json;

    use super::*;

    #[test]
    fn missing_collections_are_empty() {
        assert!(parse_projects(&json!({ "count": 0 })).unwrap().is_empty());
        assert!(parse_work_item_ids(&json!({ "workItems": null })).unwrap().is_empty());
    }

    #[test]
    fn extra_project_fields_are_dropped() {
        let body = json!({
            "count": 1,
            "value": [{ "id": "p-1", "name": "Alpha", "state": "wellFormed", "url": "x" }]
        });
        let projects = parse_projects(&body).unwrap();
        assert_eq!(projects, vec![Project { id: "p-1".to_string(), name: "Alpha".to_string() }]);
    }

    #[test]
    fn malformed_entries_are_rejected() {
        let err = parse_projects(&json!({ "value": [{ "id": 7 }] })).unwrap_err();
        assert!(matches!(err, RemoteError::UnexpectedShape(_)));
        let err = parse_work_item_ids(&json!({ "workItems": [{ "id": "x" }] })).unwrap_err();
        assert!(matches!(err, RemoteError::UnexpectedShape(_)));
        let err = parse_work_item_ids(&json!({ "workItems": {} })).unwrap_err();
        assert!(matches!(err, RemoteError::UnexpectedShape(_)));
    }

    #[test]
    fn work_item_order_is_preserved() {
        let body = json!({ "workItems": [{ "id": 102, "url": "a" }, { "id": 101 }] });
        assert_eq!(parse_work_item_ids(&body).unwrap(), vec![102, 101]);
    }

    #[test]
    fn error_excerpt_is_bounded() {
        let long = "x".repeat(MAX_ERROR_EXCERPT_CHARS * 2);
        assert_eq!(error_excerpt(long.as_bytes()).len(), MAX_ERROR_EXCERPT_CHARS);
    }
}
