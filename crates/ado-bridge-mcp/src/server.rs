// crates/ado-bridge-mcp/src/server.rs
// ============================================================================
// Module: MCP Server
// Description: Streamable HTTP JSON-RPC transport for bridge tools.
// Purpose: Expose the tool router to upstream MCP clients.
// Dependencies: ado-bridge-config, axum, serde, serde_json, tokio
// ============================================================================

//! ## Overview
//! The server accepts JSON-RPC 2.0 messages on `POST /mcp` and answers
//! liveness probes on `GET /healthz`. Each HTTP request is handled in
//! isolation: the delegated credential comes from that request's
//! Authorization header and nothing is retained once the response is sent.
//! Security posture: request bodies are untrusted and size-limited; every
//! request produces one redacted audit event.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Write;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use ado_bridge_config::AdoBridgeConfig;
use ado_bridge_config::ServerAuditConfig;
use axum::Json;
use axum::Router;
use axum::body::Body;
use axum::body::to_bytes;
use axum::extract::ConnectInfo;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::http::HeaderValue;
use axum::http::StatusCode;
use axum::http::header::CONTENT_LENGTH;
use axum::http::header::CONTENT_TYPE;
use axum::http::header::WWW_AUTHENTICATE;
use axum::response::IntoResponse;
use axum::response::Response;
use axum::routing::get;
use axum::routing::post;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use serde_json::json;
use tokio::net::TcpListener;

use crate::audit::McpAuditEvent;
use crate::audit::McpAuditEventParams;
use crate::audit::McpAuditSink;
use crate::audit::McpFileAuditSink;
use crate::audit::McpMethod;
use crate::audit::McpNoopAuditSink;
use crate::audit::McpOutcome;
use crate::audit::McpStderrAuditSink;
use crate::audit::StartupAuditEvent;
use crate::auth::RequestContext;
use crate::broker::EntraOboClient;
use crate::broker::TokenBroker;
use crate::handlers::default_registry;
use crate::registry::ToolDefinition;
use crate::remote::AdoRestClient;
use crate::tools::CallStage;
use crate::tools::ToolError;
use crate::tools::ToolRouter;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Server name reported during `initialize`.
pub const SERVER_NAME: &str = "ado-mcp-server";

/// Protocol revisions this server can speak, newest first.
pub const SUPPORTED_PROTOCOL_VERSIONS: &[&str] = &["2025-06-18", "2025-03-26", "2024-11-05"];

/// JSON-RPC path.
pub const MCP_PATH: &str = "/mcp";

/// Liveness probe path.
pub const HEALTH_PATH: &str = "/healthz";

// ============================================================================
// SECTION: MCP Server
// ============================================================================

/// MCP server instance.
pub struct McpServer {
    /// Listen address.
    bind: SocketAddr,
    /// Shared handler state.
    state: Arc<ServerState>,
}

impl McpServer {
    /// Builds a server from validated configuration.
    ///
    /// Under the `warn` startup policy, missing identity settings are
    /// reported and the server still starts; every tool call then fails at
    /// the token exchange stage.
    ///
    /// # Errors
    ///
    /// Returns [`McpServerError`] when configuration is invalid or a client
    /// cannot be built.
    pub fn from_config(config: &AdoBridgeConfig) -> Result<Self, McpServerError> {
        config.validate().map_err(|err| McpServerError::Config(err.to_string()))?;
        let bind = config.server.bind_addr().map_err(|err| McpServerError::Config(err.to_string()))?;
        let audit = build_audit_sink(&config.server.audit)?;
        emit_missing_settings_warning(config, audit.as_ref());
        let exchanger = EntraOboClient::from_config(&config.identity)
            .map_err(|err| McpServerError::Init(err.to_string()))?;
        let broker = TokenBroker::new(Arc::new(exchanger), config.identity.scope.clone());
        let remote = AdoRestClient::from_config(&config.remote)
            .map_err(|err| McpServerError::Init(err.to_string()))?;
        let registry = default_registry().map_err(|err| McpServerError::Init(err.to_string()))?;
        let router = ToolRouter::new(Arc::new(registry), Arc::new(broker), Arc::new(remote));
        Ok(Self::new(bind, router, audit, config.server.max_body_bytes))
    }

    /// Builds a server from explicit parts.
    #[must_use]
    pub fn new(
        bind: SocketAddr,
        router: ToolRouter,
        audit: Arc<dyn McpAuditSink>,
        max_body_bytes: usize,
    ) -> Self {
        Self { bind, state: Arc::new(ServerState { router, audit, max_body_bytes }) }
    }

    /// Returns the configured listen address.
    #[must_use]
    pub const fn bind_addr(&self) -> SocketAddr {
        self.bind
    }

    /// Builds the HTTP application.
    #[must_use]
    pub fn app(&self) -> Router {
        Router::new()
            .route(MCP_PATH, post(handle_mcp))
            .route(HEALTH_PATH, get(handle_health))
            .with_state(Arc::clone(&self.state))
    }

    /// Binds the configured address and serves until Ctrl-C.
    ///
    /// # Errors
    ///
    /// Returns [`McpServerError::Transport`] when binding or serving fails.
    pub async fn serve(self) -> Result<(), McpServerError> {
        let listener = TcpListener::bind(self.bind)
            .await
            .map_err(|err| McpServerError::Transport(format!("http bind failed: {err}")))?;
        self.serve_with_listener(listener).await
    }

    /// Serves on an already bound listener until Ctrl-C.
    ///
    /// # Errors
    ///
    /// Returns [`McpServerError::Transport`] when serving fails.
    pub async fn serve_with_listener(self, listener: TcpListener) -> Result<(), McpServerError> {
        if let Ok(local) = listener.local_addr() {
            self.state.audit.record_startup(&StartupAuditEvent::new(
                "listening",
                format!("listening on {local}"),
                Vec::new(),
            ));
        }
        let app = self.app();
        axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|err| McpServerError::Transport(format!("http server failed: {err}")))
    }
}

/// Resolves when the process receives Ctrl-C.
async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

/// Builds the configured audit sink.
fn build_audit_sink(config: &ServerAuditConfig) -> Result<Arc<dyn McpAuditSink>, McpServerError> {
    if !config.enabled {
        return Ok(Arc::new(McpNoopAuditSink));
    }
    match &config.path {
        Some(path) => {
            let sink = McpFileAuditSink::new(Path::new(path))
                .map_err(|err| McpServerError::Init(format!("audit log open failed: {err}")))?;
            Ok(Arc::new(sink))
        }
        None => Ok(Arc::new(McpStderrAuditSink)),
    }
}

/// Reports missing required settings without stopping startup.
fn emit_missing_settings_warning(config: &AdoBridgeConfig, audit: &dyn McpAuditSink) {
    let missing = config.missing_settings();
    if missing.is_empty() {
        return;
    }
    let message = format!(
        "missing required settings: {}; tool calls will fail until they are provided",
        missing.join(", ")
    );
    let _ = writeln!(std::io::stderr(), "ado-bridge: WARNING: {message}");
    audit.record_startup(&StartupAuditEvent::new("missing_settings", message, missing));
}

// ============================================================================
// SECTION: HTTP Handlers
// ============================================================================

/// Shared server state for HTTP handlers.
struct ServerState {
    /// Tool router for request dispatch.
    router: ToolRouter,
    /// Audit sink for request events.
    audit: Arc<dyn McpAuditSink>,
    /// Maximum allowed request body size.
    max_body_bytes: usize,
}

/// Handles liveness probes.
async fn handle_health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Handles JSON-RPC requests.
async fn handle_mcp(
    State(state): State<Arc<ServerState>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    body: Body,
) -> Response {
    let started = Instant::now();
    let context = RequestContext::http(Some(peer.ip()), headers);
    let (handled, request_bytes) = match read_body(&context.headers, body, state.max_body_bytes).await
    {
        Ok(bytes) => (handle_payload(&state.router, &context, &bytes).await, bytes.len()),
        Err(declared) => (Handled::payload_too_large(), declared),
    };
    let (response, response_bytes) = handled.reply.render();
    state.audit.record(&McpAuditEvent::new(McpAuditEventParams {
        request_id: handled.request_id,
        peer_ip: Some(peer.ip().to_string()),
        method: handled.method,
        tool: handled.tool,
        outcome: handled.reply.outcome(),
        stage: handled.stage,
        error_code: handled.reply.error_code(),
        error_kind: handled.error_kind,
        credential_fingerprint: handled.credential_fingerprint,
        request_bytes,
        response_bytes,
        latency_ms: started.elapsed().as_millis(),
    }));
    response
}

/// Reads the request body, failing with the observed size when over limit.
async fn read_body(headers: &HeaderMap, body: Body, max_body_bytes: usize) -> Result<Vec<u8>, usize> {
    let declared = headers
        .get(CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<usize>().ok());
    if let Some(length) = declared
        && length > max_body_bytes
    {
        return Err(length);
    }
    to_bytes(body, max_body_bytes)
        .await
        .map(|bytes| bytes.to_vec())
        .map_err(|_| declared.unwrap_or(max_body_bytes.saturating_add(1)))
}

// ============================================================================
// SECTION: JSON-RPC Types
// ============================================================================

/// Incoming JSON-RPC request payload.
#[derive(Debug, Deserialize)]
struct JsonRpcRequest {
    /// JSON-RPC protocol version.
    jsonrpc: String,
    /// Request identifier.
    #[serde(default)]
    id: Value,
    /// Method name.
    method: String,
    /// Optional parameters payload.
    #[serde(default)]
    params: Option<Value>,
}

/// JSON-RPC response envelope.
#[derive(Debug, Serialize)]
struct JsonRpcResponse {
    /// JSON-RPC protocol version.
    jsonrpc: &'static str,
    /// Request identifier.
    id: Value,
    /// Successful result payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    /// Error payload when the request fails.
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<JsonRpcError>,
}

/// JSON-RPC error payload.
#[derive(Debug, Serialize)]
struct JsonRpcError {
    /// Error code.
    code: i64,
    /// Human-readable error message.
    message: String,
    /// Structured error details.
    data: Value,
}

/// Tool call parameters.
#[derive(Debug, Deserialize)]
struct ToolCallParams {
    /// Tool name.
    name: String,
    /// Raw JSON arguments; absent or null means `{}`.
    #[serde(default)]
    arguments: Option<Value>,
}

/// Tool list response payload.
#[derive(Debug, Serialize)]
struct ToolListResult {
    /// Registered tool definitions.
    tools: Vec<ToolDefinition>,
}

/// Initialize request parameters.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InitializeParams {
    /// Protocol revision requested by the client.
    #[serde(default)]
    protocol_version: Option<String>,
}

// ============================================================================
// SECTION: Replies
// ============================================================================

/// Transport-level reply.
#[derive(Debug)]
enum RpcReply {
    /// JSON-RPC response body.
    Response(StatusCode, JsonRpcResponse),
    /// Notification accepted without a body.
    Accepted,
}

impl RpcReply {
    /// Successful result reply.
    fn success(id: Value, result: Value) -> Self {
        Self::Response(
            StatusCode::OK,
            JsonRpcResponse { jsonrpc: "2.0", id, result: Some(result), error: None },
        )
    }

    /// Protocol error reply.
    fn error(id: Value, status: StatusCode, code: i64, message: String, kind: &str) -> Self {
        Self::Response(
            status,
            JsonRpcResponse {
                jsonrpc: "2.0",
                id,
                result: None,
                error: Some(JsonRpcError { code, message, data: json!({ "kind": kind }) }),
            },
        )
    }

    /// Outcome classification for auditing.
    const fn outcome(&self) -> McpOutcome {
        match self {
            Self::Accepted => McpOutcome::Accepted,
            Self::Response(_, JsonRpcResponse { error: Some(_), .. }) => McpOutcome::Error,
            Self::Response(..) => McpOutcome::Success,
        }
    }

    /// JSON-RPC error code, when the reply is an error.
    fn error_code(&self) -> Option<i64> {
        match self {
            Self::Response(_, response) => response.error.as_ref().map(|error| error.code),
            Self::Accepted => None,
        }
    }

    /// Renders the reply, returning the response and its body size.
    fn render(&self) -> (Response, usize) {
        match self {
            Self::Accepted => (StatusCode::ACCEPTED.into_response(), 0),
            Self::Response(status, body) => {
                let payload = serde_json::to_vec(body).unwrap_or_else(|_| {
                    br#"{"jsonrpc":"2.0","id":null,"error":{"code":-32603,"message":"serialization failed","data":{"kind":"internal_error"}}}"#
                        .to_vec()
                });
                let size = payload.len();
                let mut response =
                    (*status, [(CONTENT_TYPE, HeaderValue::from_static("application/json"))], payload)
                        .into_response();
                if *status == StatusCode::UNAUTHORIZED {
                    response
                        .headers_mut()
                        .insert(WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
                }
                (response, size)
            }
        }
    }
}

/// Reply plus the facts recorded in the audit event.
#[derive(Debug)]
struct Handled {
    /// Transport reply.
    reply: RpcReply,
    /// JSON-RPC id rendered as a string.
    request_id: Option<String>,
    /// Method classification.
    method: McpMethod,
    /// Tool name for `tools/call`.
    tool: Option<String>,
    /// Lifecycle stage reached for `tools/call`.
    stage: Option<CallStage>,
    /// Delegated credential fingerprint.
    credential_fingerprint: Option<String>,
    /// Normalized error kind label.
    error_kind: Option<&'static str>,
}

impl Handled {
    /// Wraps a reply with no request-specific facts.
    fn bare(reply: RpcReply, method: McpMethod) -> Self {
        Self {
            reply,
            request_id: None,
            method,
            tool: None,
            stage: None,
            credential_fingerprint: None,
            error_kind: None,
        }
    }

    /// Protocol error before a request could be identified.
    fn invalid(status: StatusCode, code: i64, message: &str, kind: &'static str) -> Self {
        let mut handled = Self::bare(
            RpcReply::error(Value::Null, status, code, message.to_string(), kind),
            McpMethod::Invalid,
        );
        handled.error_kind = Some(kind);
        handled
    }

    /// Oversized request body.
    fn payload_too_large() -> Self {
        Self::invalid(StatusCode::PAYLOAD_TOO_LARGE, -32070, "request body too large", "payload_too_large")
    }
}

// ============================================================================
// SECTION: JSON-RPC Handling
// ============================================================================

/// Parses and dispatches one JSON-RPC message.
async fn handle_payload(router: &ToolRouter, context: &RequestContext, bytes: &[u8]) -> Handled {
    let Ok(raw) = serde_json::from_slice::<Value>(bytes) else {
        return Handled::invalid(StatusCode::BAD_REQUEST, -32700, "parse error", "parse_error");
    };
    let is_notification = raw.get("id").is_none();
    let Ok(request) = serde_json::from_value::<JsonRpcRequest>(raw) else {
        return Handled::invalid(
            StatusCode::BAD_REQUEST,
            -32600,
            "invalid json-rpc request",
            "invalid_request",
        );
    };
    if request.jsonrpc != "2.0" {
        return Handled::invalid(
            StatusCode::BAD_REQUEST,
            -32600,
            "invalid json-rpc version",
            "invalid_request",
        );
    }
    let method = McpMethod::from_name(&request.method);
    if is_notification {
        return Handled::bare(RpcReply::Accepted, method);
    }
    let id = request.id;
    let request_id = id.to_string();
    let context = context.clone().with_request_id(request_id.clone());
    let mut handled = match method {
        McpMethod::Initialize => {
            Handled::bare(RpcReply::success(id, initialize_result(request.params)), method)
        }
        McpMethod::Ping => Handled::bare(RpcReply::success(id, json!({})), method),
        McpMethod::ToolsList => {
            let listing = ToolListResult { tools: router.list_tools() };
            let reply = serde_json::to_value(listing).map_or_else(
                |_| internal_error(id.clone()),
                |value| RpcReply::success(id.clone(), value),
            );
            Handled::bare(reply, method)
        }
        McpMethod::ToolsCall => handle_tool_call(router, &context, id, request.params).await,
        McpMethod::Notification | McpMethod::Other | McpMethod::Invalid => {
            let mut handled = Handled::bare(
                RpcReply::error(
                    id,
                    StatusCode::BAD_REQUEST,
                    -32601,
                    "method not found".to_string(),
                    "method_not_found",
                ),
                method,
            );
            handled.error_kind = Some("method_not_found");
            handled
        }
    };
    handled.request_id = Some(request_id);
    handled
}

/// Dispatches a `tools/call` request.
async fn handle_tool_call(
    router: &ToolRouter,
    context: &RequestContext,
    id: Value,
    params: Option<Value>,
) -> Handled {
    let params = params.unwrap_or(Value::Null);
    let Ok(call) = serde_json::from_value::<ToolCallParams>(params) else {
        let mut handled = Handled::bare(
            RpcReply::error(
                id,
                StatusCode::BAD_REQUEST,
                -32602,
                "invalid tool params".to_string(),
                "invalid_params",
            ),
            McpMethod::ToolsCall,
        );
        handled.error_kind = Some("invalid_params");
        return handled;
    };
    let arguments = match call.arguments {
        None | Some(Value::Null) => json!({}),
        Some(arguments) => arguments,
    };
    let report = router.execute(context, &call.name, arguments).await;
    let (reply, error_kind) = match report.outcome {
        Ok(result) => match serde_json::to_value(&result) {
            Ok(value) => (RpcReply::success(id, value), None),
            Err(_) => (internal_error(id), Some("internal_error")),
        },
        Err(error) => {
            let kind = error.kind();
            (jsonrpc_error(id, &error), Some(kind))
        }
    };
    Handled {
        reply,
        request_id: None,
        method: McpMethod::ToolsCall,
        tool: Some(call.name),
        stage: Some(report.stage),
        credential_fingerprint: report.credential_fingerprint,
        error_kind,
    }
}

/// Builds the `initialize` result, echoing a supported requested revision.
fn initialize_result(params: Option<Value>) -> Value {
    let requested = params
        .and_then(|params| serde_json::from_value::<InitializeParams>(params).ok())
        .unwrap_or_default()
        .protocol_version;
    let latest = SUPPORTED_PROTOCOL_VERSIONS.first().copied().unwrap_or_default();
    let version = requested
        .as_deref()
        .filter(|requested| SUPPORTED_PROTOCOL_VERSIONS.contains(requested))
        .unwrap_or(latest);
    json!({
        "protocolVersion": version,
        "capabilities": { "tools": { "listChanged": false } },
        "serverInfo": { "name": SERVER_NAME, "version": env!("CARGO_PKG_VERSION") },
    })
}

/// Internal error reply.
fn internal_error(id: Value) -> RpcReply {
    RpcReply::error(
        id,
        StatusCode::INTERNAL_SERVER_ERROR,
        -32603,
        "serialization failed".to_string(),
        "internal_error",
    )
}

/// Builds a JSON-RPC error reply for a tool failure.
fn jsonrpc_error(id: Value, error: &ToolError) -> RpcReply {
    let status = match error {
        ToolError::Authentication(_) => StatusCode::UNAUTHORIZED,
        ToolError::ToolNotFound(_) | ToolError::InputValidation(_) => StatusCode::BAD_REQUEST,
        ToolError::TokenExchange(_) | ToolError::Handler(_) => StatusCode::OK,
    };
    RpcReply::Response(
        status,
        JsonRpcResponse {
            jsonrpc: "2.0",
            id,
            result: None,
            error: Some(JsonRpcError {
                code: error.code(),
                message: error.to_string(),
                data: error.data(),
            }),
        },
    )
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// MCP server errors.
#[derive(Debug, thiserror::Error)]
pub enum McpServerError {
    /// Configuration errors.
    #[error("config error: {0}")]
    Config(String),
    /// Initialization errors.
    #[error("init error: {0}")]
    Init(String),
    /// Transport errors.
    #[error("transport error: {0}")]
    Transport(String),
}

// ============================================================================
// SECTION: Tests
// ============================================================================
