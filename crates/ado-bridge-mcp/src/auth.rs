// crates/ado-bridge-mcp/src/auth.rs
// ============================================================================
// Module: Credential Extraction
// Description: Delegated bearer extraction from inbound HTTP requests.
// Purpose: Turn the Authorization header into a delegated credential.
// Dependencies: axum, sha2, thiserror
// ============================================================================

//! ## Overview
//! The bridge never validates the inbound bearer itself. The identity
//! provider validates it during the on-behalf-of exchange; this module only
//! extracts it from the request, fail-closed, and derives a non-reversible
//! fingerprint for audit records.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::net::IpAddr;

use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use sha2::Digest;
use sha2::Sha256;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum accepted Authorization header size in bytes.
pub const MAX_AUTH_HEADER_BYTES: usize = 8 * 1024;

/// Number of hex characters kept when a fingerprint is shortened for logs.
const SHORT_FINGERPRINT_CHARS: usize = 16;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Credential extraction failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthenticationError {
    /// No Authorization header was supplied.
    #[error("missing authorization header")]
    MissingAuthorization,
    /// The header is not a usable bearer credential.
    #[error("invalid authorization header: {0}")]
    MalformedAuthorization(&'static str),
    /// The header exceeds the accepted size.
    #[error("authorization header too large")]
    HeaderTooLarge,
}

// ============================================================================
// SECTION: Delegated Credential
// ============================================================================

/// Opaque delegated bearer assertion taken from an inbound request.
///
/// The raw value is only reachable through [`DelegatedCredential::as_str`];
/// `Debug` shows a short fingerprint only.
#[derive(Clone, PartialEq, Eq)]
pub struct DelegatedCredential(String);

impl DelegatedCredential {
    /// Returns the raw assertion for the exchange request.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the SHA-256 fingerprint of the assertion.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        token_fingerprint(&self.0)
    }
}

impl fmt::Debug for DelegatedCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fingerprint = self.fingerprint();
        f.debug_struct("DelegatedCredential")
            .field("fingerprint", &short_fingerprint(&fingerprint))
            .finish_non_exhaustive()
    }
}

// ============================================================================
// SECTION: Request Context
// ============================================================================

/// Per-request context carried through tool dispatch.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    /// Inbound request headers.
    pub headers: HeaderMap,
    /// Peer IP address when available.
    pub peer_ip: Option<IpAddr>,
    /// Optional request identifier for auditing.
    pub request_id: Option<String>,
}

impl RequestContext {
    /// Builds a context from bare headers.
    #[must_use]
    pub fn new(headers: HeaderMap) -> Self {
        Self { headers, peer_ip: None, request_id: None }
    }

    /// Builds an HTTP request context.
    #[must_use]
    pub const fn http(peer_ip: Option<IpAddr>, headers: HeaderMap) -> Self {
        Self { headers, peer_ip, request_id: None }
    }

    /// Attaches a request identifier.
    #[must_use]
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    /// Extracts the delegated credential from the Authorization header.
    ///
    /// # Errors
    ///
    /// Returns [`AuthenticationError`] when the header is absent or malformed.
    pub fn credential(&self) -> Result<DelegatedCredential, AuthenticationError> {
        extract_bearer(&self.headers).map(DelegatedCredential)
    }
}

// ============================================================================
// SECTION: Extraction
// ============================================================================

/// Extracts the bearer token from request headers.
///
/// The scheme is matched case-insensitively and must be followed by
/// whitespace and a non-empty token. The returned token is trimmed.
///
/// # Errors
///
/// Returns [`AuthenticationError`] when the header is missing, oversized,
/// not visible ASCII, uses another scheme, or carries an empty token.
pub fn extract_bearer(headers: &HeaderMap) -> Result<String, AuthenticationError> {
    let value = headers.get(AUTHORIZATION).ok_or(AuthenticationError::MissingAuthorization)?;
    if value.len() > MAX_AUTH_HEADER_BYTES {
        return Err(AuthenticationError::HeaderTooLarge);
    }
    let header = value
        .to_str()
        .map_err(|_| AuthenticationError::MalformedAuthorization("non-ascii header value"))?;
    let (scheme, token) = header
        .trim()
        .split_once(char::is_whitespace)
        .ok_or(AuthenticationError::MalformedAuthorization("expected `Bearer <token>`"))?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(AuthenticationError::MalformedAuthorization("unsupported scheme"));
    }
    let token = token.trim();
    if token.is_empty() {
        return Err(AuthenticationError::MalformedAuthorization("empty bearer token"));
    }
    Ok(token.to_string())
}

/// Returns the lowercase hex SHA-256 digest of a token.
#[must_use]
pub fn token_fingerprint(token: &str) -> String {
    let digest = Sha256::digest(token.as_bytes());
    hex_encode(&digest)
}

/// Returns a shortened fingerprint suitable for log lines.
#[must_use]
pub fn short_fingerprint(fingerprint: &str) -> &str {
    fingerprint.get(.. SHORT_FINGERPRINT_CHARS).unwrap_or(fingerprint)
}

/// Encodes bytes as lowercase hex.
fn hex_encode(bytes: &[u8]) -> String {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        out.push(char::from(HEX[usize::from(byte >> 4)]));
        out.push(char::from(HEX[usize::from(byte & 0x0f)]));
    }
    out
}

// ============================================================================
// SECTION: Tests
// ============================================================================
