// crates/ado-bridge-mcp/src/registry.rs
// ============================================================================
// Module: Tool Registry
// Description: Named tool definitions with compiled input validators.
// Purpose: Resolve tool names to handlers and validate tool arguments.
// Dependencies: async-trait, serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! The registry is built once at startup and shared read-only across
//! requests. Each entry pairs a [`ToolDefinition`] with a compiled input
//! validator and a [`ToolHandler`]. Duplicate names are rejected at
//! registration time.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::auth::RequestContext;
use crate::broker::DownstreamToken;
use crate::remote::RemoteApi;
use crate::remote::RemoteError;
use crate::schema::CompiledSchema;
use crate::schema::InputSchema;
use crate::schema::SchemaError;

// ============================================================================
// SECTION: Tool Results
// ============================================================================

/// Content block returned to MCP clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    /// Plain text content.
    Text {
        /// Text payload.
        text: String,
    },
}

/// Successful tool output.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolResult {
    /// Human-readable content blocks.
    pub content: Vec<ContentBlock>,
    /// Machine-readable payload.
    pub structured_content: Value,
}

impl ToolResult {
    /// Builds a result carrying `payload` as structured content and as
    /// pretty-printed JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`HandlerError::Serialization`] when `payload` cannot be
    /// serialized.
    pub fn structured<T: Serialize>(payload: &T) -> Result<Self, HandlerError> {
        let structured_content =
            serde_json::to_value(payload).map_err(|_| HandlerError::Serialization)?;
        let text = serde_json::to_string_pretty(&structured_content)
            .map_err(|_| HandlerError::Serialization)?;
        Ok(Self { content: vec![ContentBlock::Text { text }], structured_content })
    }
}

// ============================================================================
// SECTION: Handler Interface
// ============================================================================

/// Errors raised by tool handlers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HandlerError {
    /// The remote API call failed.
    #[error(transparent)]
    Remote(#[from] RemoteError),
    /// Validated input could not be decoded.
    #[error("invalid tool input: {0}")]
    Input(String),
    /// The handler output could not be serialized.
    #[error("tool result serialization failed")]
    Serialization,
}

/// Per-call context handed to a tool handler.
#[derive(Clone, Copy)]
pub struct ToolContext<'a> {
    /// Inbound request context.
    pub request: &'a RequestContext,
    /// Downstream token obtained for this call.
    pub token: &'a DownstreamToken,
    /// Remote API client.
    pub remote: &'a dyn RemoteApi,
}

impl fmt::Debug for ToolContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolContext")
            .field("request_id", &self.request.request_id)
            .field("token", self.token)
            .finish_non_exhaustive()
    }
}

/// Executes one tool against validated input.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    /// Runs the tool. `input` has already passed the tool's schema.
    ///
    /// # Errors
    ///
    /// Returns [`HandlerError`] when the remote call or result encoding fails.
    async fn call(&self, input: Value, ctx: &ToolContext<'_>) -> Result<ToolResult, HandlerError>;
}

// ============================================================================
// SECTION: Definitions
// ============================================================================

/// Tool metadata published through `tools/list`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDefinition {
    /// Unique tool name.
    pub name: String,
    /// Tool description.
    pub description: String,
    /// JSON Schema for tool arguments.
    pub input_schema: Value,
}

/// A registered tool.
pub struct RegisteredTool {
    /// Published definition.
    definition: ToolDefinition,
    /// Compiled argument validator.
    validator: CompiledSchema,
    /// Tool implementation.
    handler: Arc<dyn ToolHandler>,
}

impl RegisteredTool {
    /// Returns the published definition.
    #[must_use]
    pub const fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    /// Validates tool arguments against the compiled schema.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::Violations`] listing every violation.
    pub fn validate(&self, input: &Value) -> Result<(), SchemaError> {
        self.validator.validate(input)
    }

    /// Returns the tool implementation.
    #[must_use]
    pub fn handler(&self) -> Arc<dyn ToolHandler> {
        Arc::clone(&self.handler)
    }
}

impl fmt::Debug for RegisteredTool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisteredTool").field("definition", &self.definition).finish_non_exhaustive()
    }
}

// ============================================================================
// SECTION: Registry
// ============================================================================

/// Registration failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// Tool names must be non-empty.
    #[error("tool name must be non-empty")]
    EmptyName,
    /// A tool with the same name is already registered.
    #[error("duplicate tool name: {0}")]
    DuplicateTool(String),
    /// The tool's input schema does not compile.
    #[error("tool {name} has an invalid input schema: {message}")]
    InvalidSchema {
        /// Tool name.
        name: String,
        /// Compilation failure.
        message: String,
    },
}

/// Lookup failure for an unregistered tool name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown tool: {0}")]
pub struct ToolNotFound(pub String);

/// Read-only map of tool names to tools.
#[derive(Debug, Default)]
pub struct ToolRegistry {
    /// Tools keyed by name.
    tools: BTreeMap<String, RegisteredTool>,
}

impl ToolRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a tool.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError`] when the name is empty or taken, or the
    /// schema does not compile.
    pub fn register(
        &mut self,
        name: &str,
        description: &str,
        schema: &InputSchema,
        handler: Arc<dyn ToolHandler>,
    ) -> Result<(), RegistryError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(RegistryError::EmptyName);
        }
        if self.tools.contains_key(name) {
            return Err(RegistryError::DuplicateTool(name.to_string()));
        }
        let validator = schema.compile().map_err(|err| RegistryError::InvalidSchema {
            name: name.to_string(),
            message: err.to_string(),
        })?;
        let definition = ToolDefinition {
            name: name.to_string(),
            description: description.to_string(),
            input_schema: validator.document().clone(),
        };
        self.tools.insert(name.to_string(), RegisteredTool { definition, validator, handler });
        Ok(())
    }

    /// Resolves a tool by exact name.
    ///
    /// # Errors
    ///
    /// Returns [`ToolNotFound`] when no tool has that name.
    pub fn lookup(&self, name: &str) -> Result<&RegisteredTool, ToolNotFound> {
        self.tools.get(name).ok_or_else(|| ToolNotFound(name.to_string()))
    }

    /// Returns tool definitions sorted by name.
    #[must_use]
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|tool| tool.definition.clone()).collect()
    }

    /// Returns the number of registered tools.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Returns true when no tools are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
