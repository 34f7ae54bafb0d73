// crates/ado-bridge-mcp/src/tools.rs
// ============================================================================
// Module: Tool Router
// Description: Per-request tool call lifecycle.
// Purpose: Drive credential extraction, validation, exchange, and invocation.
// Dependencies: serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! [`ToolRouter`] owns the per-call lifecycle:
//!
//! `Received -> CredentialExtracted -> InputValidated -> TokenExchanged ->
//! HandlerInvoked -> Responded`
//!
//! Tool lookup and schema validation run before the token exchange, so an
//! unknown tool or invalid input never reaches the identity provider or the
//! remote API. Each call performs exactly one exchange and the downstream
//! token is dropped when the call returns.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use serde_json::json;
use thiserror::Error;

use crate::auth::AuthenticationError;
use crate::auth::RequestContext;
use crate::broker::ExchangeFailure;
use crate::broker::TokenBroker;
use crate::broker::TokenExchangeError;
use crate::registry::HandlerError;
use crate::registry::ToolContext;
use crate::registry::ToolDefinition;
use crate::registry::ToolRegistry;
use crate::registry::ToolResult;
use crate::remote::RemoteApi;
use crate::remote::RemoteError;

// ============================================================================
// SECTION: Lifecycle
// ============================================================================

/// Last lifecycle stage a tool call reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CallStage {
    /// Request accepted for dispatch.
    Received,
    /// Delegated credential extracted.
    CredentialExtracted,
    /// Tool resolved and arguments validated.
    InputValidated,
    /// Downstream token obtained.
    TokenExchanged,
    /// Handler invoked with validated input and a downstream token.
    HandlerInvoked,
    /// Result ready for the client.
    Responded,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Tool call failures surfaced as JSON-RPC errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ToolError {
    /// Delegated credential missing or malformed.
    #[error("authentication required: {0}")]
    Authentication(#[from] AuthenticationError),
    /// On-behalf-of exchange failed.
    #[error("token exchange failed: {0}")]
    TokenExchange(#[from] TokenExchangeError),
    /// No tool with the requested name.
    #[error("unknown tool: {0}")]
    ToolNotFound(String),
    /// Arguments did not satisfy the tool schema.
    #[error("invalid tool arguments: {0}")]
    InputValidation(String),
    /// Tool handler failed.
    #[error("tool failed: {0}")]
    Handler(#[from] HandlerError),
}

impl ToolError {
    /// Stable error kind label.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Authentication(_) => "authentication_error",
            Self::TokenExchange(_) => "token_exchange_error",
            Self::ToolNotFound(_) => "tool_not_found",
            Self::InputValidation(_) => "input_validation_error",
            Self::Handler(_) => "handler_error",
        }
    }

    /// JSON-RPC error code.
    #[must_use]
    pub const fn code(&self) -> i64 {
        match self {
            Self::Authentication(_) => -32001,
            Self::TokenExchange(_) => -32002,
            Self::ToolNotFound(_) => -32601,
            Self::InputValidation(_) => -32602,
            Self::Handler(_) => -32010,
        }
    }

    /// Structured error data for the JSON-RPC `error.data` member.
    #[must_use]
    pub fn data(&self) -> Value {
        let mut data = json!({ "kind": self.kind() });
        match self {
            Self::TokenExchange(TokenExchangeError::Exchange(ExchangeFailure::Rejected {
                code,
                ..
            })) => {
                data["provider_error"] = json!(code);
            }
            Self::Handler(HandlerError::Remote(RemoteError::Status { status, .. })) => {
                data["remote_status"] = json!(status);
            }
            Self::ToolNotFound(name) => {
                data["tool"] = json!(name);
            }
            _ => {}
        }
        data
    }
}

// ============================================================================
// SECTION: Call Report
// ============================================================================

/// Outcome of one tool call plus the facts needed for auditing.
#[derive(Debug, Clone)]
pub struct ToolCallReport {
    /// Last stage reached.
    pub stage: CallStage,
    /// Fingerprint of the delegated credential, when one was extracted.
    pub credential_fingerprint: Option<String>,
    /// Tool result or failure.
    pub outcome: Result<ToolResult, ToolError>,
}

// ============================================================================
// SECTION: Tool Router
// ============================================================================

/// Dispatches tool calls against the registry.
#[derive(Clone)]
pub struct ToolRouter {
    /// Read-only tool registry.
    registry: Arc<ToolRegistry>,
    /// On-behalf-of token broker.
    broker: Arc<TokenBroker>,
    /// Remote API client.
    remote: Arc<dyn RemoteApi>,
}

impl ToolRouter {
    /// Creates a router.
    #[must_use]
    pub fn new(
        registry: Arc<ToolRegistry>,
        broker: Arc<TokenBroker>,
        remote: Arc<dyn RemoteApi>,
    ) -> Self {
        Self { registry, broker, remote }
    }

    /// Returns published tool definitions sorted by name.
    #[must_use]
    pub fn list_tools(&self) -> Vec<ToolDefinition> {
        self.registry.definitions()
    }

    /// Handles one tool call.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError`] for the first failing lifecycle stage.
    pub async fn handle_tool_call(
        &self,
        context: &RequestContext,
        name: &str,
        arguments: Value,
    ) -> Result<ToolResult, ToolError> {
        self.execute(context, name, arguments).await.outcome
    }

    /// Handles one tool call and reports the stage reached.
    pub async fn execute(
        &self,
        context: &RequestContext,
        name: &str,
        arguments: Value,
    ) -> ToolCallReport {
        let mut progress = CallProgress { stage: CallStage::Received, credential_fingerprint: None };
        let outcome = self.run(context, name, arguments, &mut progress).await;
        let stage = if outcome.is_ok() { CallStage::Responded } else { progress.stage };
        ToolCallReport { stage, credential_fingerprint: progress.credential_fingerprint, outcome }
    }

    /// Runs lifecycle stages, advancing `progress` after each success.
    async fn run(
        &self,
        context: &RequestContext,
        name: &str,
        arguments: Value,
        progress: &mut CallProgress,
    ) -> Result<ToolResult, ToolError> {
        let credential = context.credential()?;
        progress.credential_fingerprint = Some(credential.fingerprint());
        progress.stage = CallStage::CredentialExtracted;

        let tool = self.registry.lookup(name).map_err(|err| ToolError::ToolNotFound(err.0))?;
        tool.validate(&arguments).map_err(|err| ToolError::InputValidation(err.to_string()))?;
        progress.stage = CallStage::InputValidated;

        let token = self.broker.exchange(credential.as_str()).await?;
        progress.stage = CallStage::TokenExchanged;

        let ctx = ToolContext { request: context, token: &token, remote: self.remote.as_ref() };
        progress.stage = CallStage::HandlerInvoked;
        Ok(tool.handler().call(arguments, &ctx).await?)
    }
}

/// Mutable lifecycle state for one call.
struct CallProgress {
    /// Last stage reached.
    stage: CallStage,
    /// Fingerprint of the delegated credential.
    credential_fingerprint: Option<String>,
}

// ============================================================================
// SECTION: Tests
// ============================================================================
