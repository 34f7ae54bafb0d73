// crates/ado-bridge-mcp/src/audit.rs
// ============================================================================
// Module: MCP Audit Logging
// Description: Structured audit events for bridge request handling.
// Purpose: Emit redacted JSON-line audit records without a logging framework.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! Every JSON-RPC request yields one [`McpAuditEvent`]; startup posture is
//! reported through [`StartupAuditEvent`]. Events never carry raw
//! credentials or tokens, only SHA-256 fingerprints. Sinks are pluggable so
//! deployments can route the JSON lines wherever they collect logs.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::File;
use std::fs::OpenOptions;
use std::io;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde::Serialize;

use crate::tools::CallStage;

// ============================================================================
// SECTION: Classification
// ============================================================================

/// JSON-RPC method classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum McpMethod {
    /// `initialize`.
    Initialize,
    /// `ping`.
    Ping,
    /// `tools/list`.
    ToolsList,
    /// `tools/call`.
    ToolsCall,
    /// Any `notifications/*` message.
    Notification,
    /// Unrecognized method.
    Other,
    /// Body could not be parsed as a request.
    Invalid,
}

impl McpMethod {
    /// Classifies a JSON-RPC method name.
    #[must_use]
    pub fn from_name(method: &str) -> Self {
        match method {
            "initialize" => Self::Initialize,
            "ping" => Self::Ping,
            "tools/list" => Self::ToolsList,
            "tools/call" => Self::ToolsCall,
            name if name.starts_with("notifications/") => Self::Notification,
            _ => Self::Other,
        }
    }
}

/// Request outcome classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum McpOutcome {
    /// Request produced a result.
    Success,
    /// Notification accepted without a response body.
    Accepted,
    /// Request produced an error.
    Error,
}

// ============================================================================
// SECTION: Events
// ============================================================================

/// Per-request audit event payload.
#[derive(Debug, Clone, Serialize)]
pub struct McpAuditEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// JSON-RPC request identifier when provided.
    pub request_id: Option<String>,
    /// Peer IP address when available.
    pub peer_ip: Option<String>,
    /// JSON-RPC method classification.
    pub method: McpMethod,
    /// Tool name for `tools/call`.
    pub tool: Option<String>,
    /// Request outcome.
    pub outcome: McpOutcome,
    /// Last lifecycle stage reached for `tools/call`.
    pub stage: Option<CallStage>,
    /// JSON-RPC error code when present.
    pub error_code: Option<i64>,
    /// Normalized error kind label.
    pub error_kind: Option<&'static str>,
    /// SHA-256 fingerprint of the delegated credential.
    pub credential_fingerprint: Option<String>,
    /// Request body size in bytes.
    pub request_bytes: usize,
    /// Response body size in bytes.
    pub response_bytes: usize,
    /// Handling latency in milliseconds.
    pub latency_ms: u128,
}

/// Inputs required to construct a request audit event.
#[derive(Debug, Clone)]
pub struct McpAuditEventParams {
    /// JSON-RPC request identifier when provided.
    pub request_id: Option<String>,
    /// Peer IP address if known.
    pub peer_ip: Option<String>,
    /// JSON-RPC method classification.
    pub method: McpMethod,
    /// Tool name for `tools/call`.
    pub tool: Option<String>,
    /// Request outcome.
    pub outcome: McpOutcome,
    /// Last lifecycle stage reached for `tools/call`.
    pub stage: Option<CallStage>,
    /// JSON-RPC error code when present.
    pub error_code: Option<i64>,
    /// Normalized error kind label.
    pub error_kind: Option<&'static str>,
    /// SHA-256 fingerprint of the delegated credential.
    pub credential_fingerprint: Option<String>,
    /// Request body size in bytes.
    pub request_bytes: usize,
    /// Response body size in bytes.
    pub response_bytes: usize,
    /// Handling latency in milliseconds.
    pub latency_ms: u128,
}

impl McpAuditEvent {
    /// Creates a new audit event with a consistent timestamp.
    #[must_use]
    pub fn new(params: McpAuditEventParams) -> Self {
        Self {
            event: "mcp_request",
            timestamp_ms: now_ms(),
            request_id: params.request_id,
            peer_ip: params.peer_ip,
            method: params.method,
            tool: params.tool,
            outcome: params.outcome,
            stage: params.stage,
            error_code: params.error_code,
            error_kind: params.error_kind,
            credential_fingerprint: params.credential_fingerprint,
            request_bytes: params.request_bytes,
            response_bytes: params.response_bytes,
            latency_ms: params.latency_ms,
        }
    }
}

/// Startup posture audit event payload.
#[derive(Debug, Clone, Serialize)]
pub struct StartupAuditEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Startup event kind.
    pub kind: &'static str,
    /// Human-readable message.
    pub message: String,
    /// Labels of missing settings, if any.
    pub missing: Vec<&'static str>,
}

impl StartupAuditEvent {
    /// Creates a new startup event with a consistent timestamp.
    #[must_use]
    pub fn new(kind: &'static str, message: impl Into<String>, missing: Vec<&'static str>) -> Self {
        Self { event: "startup", timestamp_ms: now_ms(), kind, message: message.into(), missing }
    }
}

/// Milliseconds since the Unix epoch.
fn now_ms() -> u128 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis()
}

// ============================================================================
// SECTION: Trait
// ============================================================================

/// Audit sink for bridge events.
pub trait McpAuditSink: Send + Sync {
    /// Record a request audit event.
    fn record(&self, event: &McpAuditEvent);

    /// Record a startup audit event.
    fn record_startup(&self, _event: &StartupAuditEvent) {}
}

/// Audit sink that logs JSON lines to stderr.
pub struct McpStderrAuditSink;

impl McpStderrAuditSink {
    /// Writes one JSON line to stderr.
    fn emit<T: Serialize>(event: &T) {
        if let Ok(payload) = serde_json::to_string(event) {
            let _ = writeln!(std::io::stderr(), "{payload}");
        }
    }
}

impl McpAuditSink for McpStderrAuditSink {
    fn record(&self, event: &McpAuditEvent) {
        Self::emit(event);
    }

    fn record_startup(&self, event: &StartupAuditEvent) {
        Self::emit(event);
    }
}

/// Audit sink that logs JSON lines to a file.
pub struct McpFileAuditSink {
    /// File handle used for append-only logging.
    file: Mutex<File>,
}

impl McpFileAuditSink {
    /// Opens the audit log file in append mode.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn new(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self { file: Mutex::new(file) })
    }

    /// Appends one JSON line and flushes.
    fn emit<T: Serialize>(&self, event: &T) {
        if let Ok(payload) = serde_json::to_string(event)
            && let Ok(mut file) = self.file.lock()
        {
            let _ = writeln!(file, "{payload}");
            let _ = file.flush();
        }
    }
}

impl McpAuditSink for McpFileAuditSink {
    fn record(&self, event: &McpAuditEvent) {
        self.emit(event);
    }

    fn record_startup(&self, event: &StartupAuditEvent) {
        self.emit(event);
    }
}

/// No-op audit sink.
pub struct McpNoopAuditSink;

impl McpAuditSink for McpNoopAuditSink {
    fn record(&self, _event: &McpAuditEvent) {}
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

    use serde_json::Value;

    use super::*;

    fn sample_params() -> McpAuditEventParams {
        McpAuditEventParams {
            request_id: Some("7".to_string()),
            peer_ip: None,
            method: McpMethod::ToolsCall,
            tool: Some("ado_list_projects".to_string()),
            outcome: McpOutcome::Error,
            stage: Some(CallStage::TokenExchanged),
            error_code: Some(-32010),
            error_kind: Some("handler_error"),
            credential_fingerprint: Some("ab".repeat(32)),
            request_bytes: 10,
            response_bytes: 20,
            latency_ms: 3,
        }
    }

    #[test]
    fn method_classification() {
        assert_eq!(McpMethod::from_name("tools/call"), McpMethod::ToolsCall);
        assert_eq!(McpMethod::from_name("notifications/initialized"), McpMethod::Notification);
        assert_eq!(McpMethod::from_name("resources/list"), McpMethod::Other);
    }

    #[test]
    fn file_sink_appends_json_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.log");
        let sink = McpFileAuditSink::new(&path).unwrap();
        sink.record(&McpAuditEvent::new(sample_params()));
        sink.record_startup(&StartupAuditEvent::new("missing_identity", "warn", vec!["x"]));
        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<Value> =
            content.lines().map(|line| serde_json::from_str(line).unwrap()).collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["event"], "mcp_request");
        assert_eq!(lines[0]["stage"], "token_exchanged");
        assert_eq!(lines[0]["method"], "tools_call");
        assert_eq!(lines[1]["event"], "startup");
    }
}
