// crates/ado-bridge-mcp/src/config.rs
// ============================================================================
// Module: MCP Configuration (Re-export)
// Description: Re-export canonical ADO bridge config types.
// Purpose: Preserve MCP public API while centralizing config logic.
// Dependencies: ado-bridge-config
// ============================================================================

//! ## Overview
//! This module re-exports the canonical configuration model from
//! `ado-bridge-config` to keep MCP callers stable while enforcing a single
//! source of truth.

/// Re-export canonical config types and helpers.
pub use ado_bridge_config::*;
