// crates/ado-bridge-mcp/src/http.rs
// ============================================================================
// Module: Outbound HTTP Helpers
// Description: Shared reqwest client construction and bounded body reads.
// Purpose: Keep identity and remote API calls under the same transport limits.
// Dependencies: reqwest
// ============================================================================

//! ## Overview
//! Outbound calls share one client policy: explicit connect and request
//! timeouts, no redirects, and response bodies read with a hard size cap.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::Duration;

use ado_bridge_config::TimeoutConfig;
use reqwest::Client;
use reqwest::Response;
use reqwest::redirect::Policy;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// User agent sent on outbound requests.
const USER_AGENT: &str = concat!("ado-bridge/", env!("CARGO_PKG_VERSION"));

// ============================================================================
// SECTION: Client Construction
// ============================================================================

/// Builds an async HTTP client with the configured timeouts.
pub(crate) fn build_client(timeouts: TimeoutConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .connect_timeout(Duration::from_millis(timeouts.connect_timeout_ms))
        .timeout(Duration::from_millis(timeouts.request_timeout_ms))
        .redirect(Policy::none())
        .user_agent(USER_AGENT)
        .build()
}

// ============================================================================
// SECTION: Body Reads
// ============================================================================

/// Failure while reading a bounded response body.
#[derive(Debug)]
pub(crate) enum BodyReadError {
    /// Body exceeded the configured limit.
    TooLarge(usize),
    /// Body read timed out.
    Timeout,
    /// Body read failed.
    Failed(String),
}

impl BodyReadError {
    /// Renders the failure for error messages.
    pub(crate) fn describe(&self) -> String {
        match self {
            Self::TooLarge(limit) => format!("response body exceeds {limit} bytes"),
            Self::Timeout => "response body read timed out".to_string(),
            Self::Failed(message) => format!("response body read failed: {message}"),
        }
    }
}

/// Reads a response body, enforcing a maximum size.
pub(crate) async fn read_limited_body(
    mut response: Response,
    max_bytes: usize,
) -> Result<Vec<u8>, BodyReadError> {
    let limit = u64::try_from(max_bytes).unwrap_or(u64::MAX);
    if response.content_length().is_some_and(|len| len > limit) {
        return Err(BodyReadError::TooLarge(max_bytes));
    }
    let mut body = Vec::new();
    loop {
        let chunk = response.chunk().await.map_err(|err| {
            if err.is_timeout() {
                BodyReadError::Timeout
            } else {
                BodyReadError::Failed(err.to_string())
            }
        })?;
        let Some(chunk) = chunk else {
            break;
        };
        if body.len().saturating_add(chunk.len()) > max_bytes {
            return Err(BodyReadError::TooLarge(max_bytes));
        }
        body.extend_from_slice(&chunk);
    }
    Ok(body)
}

/// Describes a send failure without leaking request details.
pub(crate) fn describe_send_error(err: &reqwest::Error) -> String {
    if err.is_timeout() {
        "request timed out".to_string()
    } else if err.is_connect() {
        "connection failed".to_string()
    } else {
        "request failed".to_string()
    }
}
