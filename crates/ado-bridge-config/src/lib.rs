// crates/ado-bridge-config/src/lib.rs
// ============================================================================
// Module: ADO Bridge Config Library
// Description: Canonical config model, environment overrides, and validation.
// Purpose: Single source of truth for ado-bridge.toml semantics.
// Dependencies: serde, toml, secrecy, url
// ============================================================================

//! ## Overview
//! `ado-bridge-config` defines the canonical configuration model for the ADO
//! bridge. Settings come from an optional TOML file and are then overridden by
//! the process environment. Validation is strict and fail-closed, except for
//! missing identity settings, which follow the configured startup policy.
//!
//! Security posture: config inputs are untrusted; the client secret is held
//! in a redacted wrapper and never rendered through `Debug`.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::*;
