// crates/ado-bridge-mcp/src/lib.rs
// ============================================================================
// Module: ADO Bridge MCP
// Description: On-behalf-of token exchange and tool dispatch over MCP.
// Purpose: Bind an inbound delegated credential to typed remote operations.
// Dependencies: ado-bridge-config, axum, reqwest, jsonschema, tokio
// ============================================================================

//! ## Overview
//! ADO Bridge MCP accepts a delegated bearer assertion from an upstream MCP
//! client, exchanges it for a downstream access token through the
//! on-behalf-of flow, and uses that token to run a small set of
//! schema-validated tools against the remote REST API.
//!
//! ## Request Lifecycle
//! `Received -> CredentialExtracted -> InputValidated -> TokenExchanged ->
//! HandlerInvoked -> Responded`, with a terminal failure reachable from every
//! non-terminal stage. See [`tools::ToolRouter`].
//!
//! ## Invariants
//! - No state is shared between in-flight requests except the read-only
//!   registry and immutable client configuration.
//! - One token exchange per tool call; tokens are never cached.
//! - Every domain failure becomes a protocol-visible JSON-RPC error.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod audit;
pub mod auth;
pub mod broker;
pub mod config;
pub mod handlers;
mod http;
pub mod registry;
pub mod remote;
pub mod schema;
pub mod server;
pub mod tools;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use audit::McpAuditEvent;
pub use audit::McpAuditSink;
pub use audit::McpFileAuditSink;
pub use audit::McpNoopAuditSink;
pub use audit::McpStderrAuditSink;
pub use auth::AuthenticationError;
pub use auth::RequestContext;
pub use auth::extract_bearer;
pub use broker::DownstreamToken;
pub use broker::EntraOboClient;
pub use broker::TokenBroker;
pub use broker::TokenExchangeError;
pub use broker::TokenExchanger;
pub use config::AdoBridgeConfig;
pub use handlers::default_registry;
pub use registry::ToolContext;
pub use registry::ToolHandler;
pub use registry::ToolRegistry;
pub use registry::ToolResult;
pub use remote::AdoRestClient;
pub use remote::RemoteApi;
pub use schema::InputSchema;
pub use server::McpServer;
pub use tools::ToolError;
pub use tools::ToolRouter;
