// crates/ado-bridge-mcp/tests/common/mod.rs
// ============================================================================
// Module: MCP Test Helpers
// Description: Recording fakes and scripted HTTP stubs.
// Purpose: Observe identity provider and remote API traffic in tests.
// ============================================================================

#![allow(dead_code, reason = "Test helpers are selectively used across suites.")]
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test helpers fail fast on setup errors."
)]

use std::sync::Arc;
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

use ado_bridge_mcp::DownstreamToken;
use ado_bridge_mcp::RemoteApi;
use ado_bridge_mcp::TokenBroker;
use ado_bridge_mcp::TokenExchanger;
use ado_bridge_mcp::ToolRouter;
use ado_bridge_mcp::broker::ExchangeFailure;
use ado_bridge_mcp::default_registry;
use ado_bridge_mcp::remote::Project;
use ado_bridge_mcp::remote::RemoteError;
use async_trait::async_trait;
use axum::http::HeaderMap;
use axum::http::HeaderValue;
use axum::http::header::AUTHORIZATION;
use tiny_http::Header;
use tiny_http::Response;
use tiny_http::Server;

/// Scope used by test brokers.
pub const TEST_SCOPE: &str = "499b84ac-1321-427f-aa17-267ca6975798/.default";

// ============================================================================
// SECTION: Request Helpers
// ============================================================================

/// Returns headers carrying `Authorization: <value>`.
pub fn auth_headers(value: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
    headers
}

// ============================================================================
// SECTION: Recording Exchanger
// ============================================================================

/// Token exchanger that records every call and returns a scripted reply.
pub struct RecordingExchanger {
    /// `(assertion, scope)` pairs in call order.
    calls: Mutex<Vec<(String, String)>>,
    /// Reply returned on every call.
    reply: Result<Option<String>, ExchangeFailure>,
}

impl RecordingExchanger {
    /// Issues `token` on every exchange.
    pub fn issuing(token: &str) -> Arc<Self> {
        Arc::new(Self { calls: Mutex::new(Vec::new()), reply: Ok(Some(token.to_string())) })
    }

    /// Answers every exchange with `reply`.
    pub fn replying(reply: Result<Option<String>, ExchangeFailure>) -> Arc<Self> {
        Arc::new(Self { calls: Mutex::new(Vec::new()), reply })
    }

    /// Returns recorded calls.
    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl TokenExchanger for RecordingExchanger {
    async fn exchange_on_behalf_of(
        &self,
        assertion: &str,
        scope: &str,
    ) -> Result<Option<String>, ExchangeFailure> {
        self.calls.lock().unwrap().push((assertion.to_string(), scope.to_string()));
        self.reply.clone()
    }
}

// ============================================================================
// SECTION: Recording Remote
// ============================================================================

/// One observed remote API call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteCall {
    /// `list_projects` with the bearer token used.
    ListProjects {
        /// Downstream token.
        token: String,
    },
    /// `run_query` with the bearer token and query text used.
    RunQuery {
        /// Downstream token.
        token: String,
        /// Query text.
        query: String,
    },
}

/// Remote API fake that records calls and returns scripted data.
pub struct RecordingRemote {
    /// Calls in order.
    calls: Mutex<Vec<RemoteCall>>,
    /// Projects returned by `list_projects`.
    projects: Vec<Project>,
    /// Ids returned by `run_query`.
    ids: Vec<u64>,
    /// Failure returned instead of data, when set.
    failure: Option<RemoteError>,
}

impl RecordingRemote {
    /// Returns the given data on success.
    pub fn with_data(projects: Vec<Project>, ids: Vec<u64>) -> Arc<Self> {
        Arc::new(Self { calls: Mutex::new(Vec::new()), projects, ids, failure: None })
    }

    /// Fails every call with `failure`.
    pub fn failing(failure: RemoteError) -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            projects: Vec::new(),
            ids: Vec::new(),
            failure: Some(failure),
        })
    }

    /// Returns recorded calls.
    pub fn calls(&self) -> Vec<RemoteCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Records a call and returns the scripted failure, if any.
    fn observe(&self, call: RemoteCall) -> Result<(), RemoteError> {
        self.calls.lock().unwrap().push(call);
        self.failure.clone().map_or(Ok(()), Err)
    }
}

#[async_trait]
impl RemoteApi for RecordingRemote {
    async fn list_projects(&self, token: &DownstreamToken) -> Result<Vec<Project>, RemoteError> {
        self.observe(RemoteCall::ListProjects { token: token.as_str().to_string() })?;
        Ok(self.projects.clone())
    }

    async fn run_query(
        &self,
        token: &DownstreamToken,
        query: &str,
    ) -> Result<Vec<u64>, RemoteError> {
        self.observe(RemoteCall::RunQuery {
            token: token.as_str().to_string(),
            query: query.to_string(),
        })?;
        Ok(self.ids.clone())
    }
}

/// Returns two sample projects.
pub fn sample_projects() -> Vec<Project> {
    vec![
        Project { id: "p-1".to_string(), name: "Alpha".to_string() },
        Project { id: "p-2".to_string(), name: "Beta".to_string() },
    ]
}

/// Builds a router over the built-in tools and the given fakes.
pub fn router_with(exchanger: Arc<RecordingExchanger>, remote: Arc<RecordingRemote>) -> ToolRouter {
    let broker = TokenBroker::new(exchanger, TEST_SCOPE);
    ToolRouter::new(Arc::new(default_registry().unwrap()), Arc::new(broker), remote)
}

// ============================================================================
// SECTION: HTTP Stub
// ============================================================================

/// Request observed by an [`HttpStub`].
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    /// HTTP method.
    pub method: String,
    /// Request target (path and query).
    pub url: String,
    /// Authorization header value.
    pub authorization: Option<String>,
    /// Content-Type header value.
    pub content_type: Option<String>,
    /// Request body as text.
    pub body: String,
}

/// Scripted HTTP server answering a fixed sequence of responses.
pub struct HttpStub {
    /// Base URL, e.g. `http://127.0.0.1:1234`.
    pub base_url: String,
    /// Requests observed so far.
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl HttpStub {
    /// Starts a stub answering each request with the next `(status, body)`.
    ///
    /// The stub stops after the script is exhausted or after ten idle seconds.
    pub fn start(script: Vec<(u16, String)>) -> Self {
        let server = Server::http("127.0.0.1:0").unwrap();
        let addr = server.server_addr().to_ip().unwrap();
        let requests = Arc::new(Mutex::new(Vec::new()));
        let recorded = Arc::clone(&requests);
        thread::spawn(move || {
            for (status, body) in script {
                let Ok(Some(mut request)) = server.recv_timeout(Duration::from_secs(10)) else {
                    break;
                };
                let mut text = String::new();
                let _ = request.as_reader().read_to_string(&mut text);
                let header = |name: &'static str| {
                    request
                        .headers()
                        .iter()
                        .find(|header| header.field.equiv(name))
                        .map(|header| header.value.as_str().to_string())
                };
                let entry = RecordedRequest {
                    method: request.method().to_string(),
                    url: request.url().to_string(),
                    authorization: header("Authorization"),
                    content_type: header("Content-Type"),
                    body: text,
                };
                recorded.lock().unwrap().push(entry);
                let content_type =
                    Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..]).unwrap();
                let response =
                    Response::from_string(body).with_status_code(status).with_header(content_type);
                let _ = request.respond(response);
            }
        });
        Self { base_url: format!("http://{addr}"), requests }
    }

    /// Returns requests observed so far.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }
}

/// Parses an `application/x-www-form-urlencoded` body into pairs.
pub fn form_pairs(body: &str) -> Vec<(String, String)> {
    url::form_urlencoded::parse(body.as_bytes())
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect()
}

/// Returns the value of `key` in a form body.
pub fn form_value(body: &str, key: &str) -> Option<String> {
    form_pairs(body).into_iter().find(|(name, _)| name == key).map(|(_, value)| value)
}
