// crates/ado-bridge-mcp/src/handlers.rs
// ============================================================================
// Module: Built-in Tools
// Description: Project listing and work item query tools.
// Purpose: Map validated tool input onto remote API calls.
// Dependencies: async-trait, serde, serde_json
// ============================================================================

//! ## Overview
//! Two tools ship with the bridge:
//! - `ado_list_projects` takes no arguments and returns `{ "projects": [...] }`.
//! - `ado_query_wiql` takes a query string and returns `{ "ids": [...] }`.
//!
//! Handlers are stateless; everything per-call arrives via [`ToolContext`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::registry::HandlerError;
use crate::registry::RegistryError;
use crate::registry::ToolContext;
use crate::registry::ToolHandler;
use crate::registry::ToolRegistry;
use crate::registry::ToolResult;
use crate::remote::Project;
use crate::schema::FieldKind;
use crate::schema::FieldSpec;
use crate::schema::InputSchema;

// ============================================================================
// SECTION: Tool Names
// ============================================================================

/// Lists projects visible to the caller.
pub const LIST_PROJECTS_TOOL: &str = "ado_list_projects";

/// Runs a WIQL query and returns matching work item ids.
pub const QUERY_WIQL_TOOL: &str = "ado_query_wiql";

// ============================================================================
// SECTION: Payloads
// ============================================================================

/// Output of the project listing tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectListOutput {
    /// Projects in the order returned by the remote API.
    pub projects: Vec<Project>,
}

/// Input of the query tool.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QueryInput {
    /// WIQL query text.
    #[serde(default)]
    pub wiql: Option<String>,
    /// Alias for `wiql`.
    #[serde(default)]
    pub query: Option<String>,
}

impl QueryInput {
    /// Returns the query text, preferring `wiql` over `query`.
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        [self.wiql.as_deref(), self.query.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .find(|text| !text.is_empty())
    }
}

/// Output of the query tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryOutput {
    /// Matching work item ids in the order returned.
    pub ids: Vec<u64>,
}

// ============================================================================
// SECTION: Schemas
// ============================================================================

/// Input schema for the project listing tool.
#[must_use]
pub fn list_projects_schema() -> InputSchema {
    InputSchema::empty()
}

/// Input schema for the query tool.
#[must_use]
pub fn query_wiql_schema() -> InputSchema {
    InputSchema::empty()
        .field(FieldSpec::optional(
            "wiql",
            "WIQL query text, e.g. SELECT [System.Id] FROM WorkItems",
            FieldKind::text(),
        ))
        .field(FieldSpec::optional("query", "Alias for wiql.", FieldKind::text()))
        .require_any(&["wiql", "query"])
}

// ============================================================================
// SECTION: Handlers
// ============================================================================

/// Lists projects through the remote API.
#[derive(Debug, Clone, Copy, Default)]
pub struct ListProjects;

#[async_trait]
impl ToolHandler for ListProjects {
    async fn call(&self, _input: Value, ctx: &ToolContext<'_>) -> Result<ToolResult, HandlerError> {
        let projects = ctx.remote.list_projects(ctx.token).await?;
        ToolResult::structured(&ProjectListOutput { projects })
    }
}

/// Runs a WIQL query through the remote API.
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryWiql;

#[async_trait]
impl ToolHandler for QueryWiql {
    async fn call(&self, input: Value, ctx: &ToolContext<'_>) -> Result<ToolResult, HandlerError> {
        let input: QueryInput =
            serde_json::from_value(input).map_err(|err| HandlerError::Input(err.to_string()))?;
        let query = input
            .text()
            .ok_or_else(|| HandlerError::Input("wiql must be a non-empty string".to_string()))?;
        let ids = ctx.remote.run_query(ctx.token, query).await?;
        ToolResult::structured(&QueryOutput { ids })
    }
}

// ============================================================================
// SECTION: Registration
// ============================================================================

/// Registers the built-in tools.
///
/// # Errors
///
/// Returns [`RegistryError`] when a built-in collides with an existing tool.
pub fn register_builtin_tools(registry: &mut ToolRegistry) -> Result<(), RegistryError> {
    registry.register(
        LIST_PROJECTS_TOOL,
        "List projects in the configured organization visible to the caller.",
        &list_projects_schema(),
        Arc::new(ListProjects),
    )?;
    registry.register(
        QUERY_WIQL_TOOL,
        "Run a WIQL query and return the matching work item ids.",
        &query_wiql_schema(),
        Arc::new(QueryWiql),
    )
}

/// Builds a registry holding only the built-in tools.
///
/// # Errors
///
/// Returns [`RegistryError`] when a built-in schema fails to compile.
pub fn default_registry() -> Result<ToolRegistry, RegistryError> {
    let mut registry = ToolRegistry::new();
    register_builtin_tools(&mut registry)?;
    Ok(registry)
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
    fn query_text_prefers_wiql() {
        let input = QueryInput { wiql: Some(" A ".to_string()), query: Some("B".to_string()) };
        assert_eq!(input.text(), Some("A"));
        let alias = QueryInput { wiql: None, query: Some("B".to_string()) };
        assert_eq!(alias.text(), Some("B"));
        assert_eq!(QueryInput::default().text(), None);
    }

    #[test]
    fn builtin_tools_register_once() {
        let mut registry = default_registry().unwrap();
        assert_eq!(registry.len(), 2);
        let err = register_builtin_tools(&mut registry).unwrap_err();
        assert_eq!(err, RegistryError::DuplicateTool(LIST_PROJECTS_TOOL.to_string()));
    }

    #[test]
    fn builtin_schemas_gate_input() {
        let registry = default_registry().unwrap();
        let list = registry.lookup(LIST_PROJECTS_TOOL).unwrap();
        list.validate(&json!({})).unwrap();
        assert!(list.validate(&json!({ "top": 5 })).is_err());
        let query = registry.lookup(QUERY_WIQL_TOOL).unwrap();
        assert!(query.validate(&json!({})).is_err());
        query.validate(&json!({ "query": "SELECT [System.Id] FROM WorkItems" })).unwrap();
    }
}
