// crates/ado-bridge-mcp/src/broker.rs
// ============================================================================
// Module: Token Broker
// Description: On-behalf-of exchange of delegated credentials.
// Purpose: Convert an inbound assertion into a downstream access token.
// Dependencies: async-trait, reqwest, secrecy, serde, thiserror
// ============================================================================

//! ## Overview
//! [`TokenBroker`] performs exactly one on-behalf-of exchange per call and
//! never caches the result. The identity provider call sits behind
//! [`TokenExchanger`] so tests can substitute a recording fake;
//! [`EntraOboClient`] is the production implementation.
//!
//! Security posture: the assertion and the issued token are secrets. Neither
//! is rendered through `Debug` or placed in error messages.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use ado_bridge_config::IdentityConfig;
use async_trait::async_trait;
use reqwest::Client;
use secrecy::ExposeSecret;
use secrecy::SecretString;
use serde::Deserialize;
use thiserror::Error;

use crate::auth::short_fingerprint;
use crate::auth::token_fingerprint;
use crate::http::build_client;
use crate::http::describe_send_error;
use crate::http::read_limited_body;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// OAuth grant type for the on-behalf-of flow.
pub const JWT_BEARER_GRANT_TYPE: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// Requested token use marker for the on-behalf-of flow.
pub const ON_BEHALF_OF_TOKEN_USE: &str = "on_behalf_of";

/// Maximum token endpoint response size in bytes.
const MAX_TOKEN_RESPONSE_BYTES: usize = 64 * 1024;

/// Maximum characters of a provider error description kept in errors.
const MAX_PROVIDER_DESCRIPTION_CHARS: usize = 512;

// ============================================================================
// SECTION: Downstream Token
// ============================================================================

/// Access token issued by the identity provider for the remote API.
///
/// Lives for one request only. `Debug` shows a short fingerprint only.
#[derive(Clone, PartialEq, Eq)]
pub struct DownstreamToken(String);

impl DownstreamToken {
    /// Wraps a raw access token.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Returns the raw token for the outbound Authorization header.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the SHA-256 fingerprint of the token.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        token_fingerprint(&self.0)
    }
}

impl fmt::Debug for DownstreamToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fingerprint = self.fingerprint();
        f.debug_struct("DownstreamToken")
            .field("fingerprint", &short_fingerprint(&fingerprint))
            .finish_non_exhaustive()
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Failures reported by a [`TokenExchanger`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExchangeFailure {
    /// The identity provider rejected the request.
    #[error("identity provider rejected the exchange: {code}: {description}")]
    Rejected {
        /// OAuth error code, or `http_<status>` when none was returned.
        code: String,
        /// Provider error description, truncated.
        description: String,
    },
    /// The identity provider could not be reached.
    #[error("identity provider unreachable: {0}")]
    Transport(String),
    /// The identity provider response could not be understood.
    #[error("identity provider returned an invalid response: {0}")]
    InvalidResponse(String),
    /// The exchanger could not be constructed.
    #[error("identity client unavailable: {0}")]
    Client(String),
}

/// Token exchange failures surfaced to the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenExchangeError {
    /// The delegated credential was empty.
    #[error("token exchange requires a non-empty assertion")]
    EmptyAssertion,
    /// The provider answered without an access token.
    #[error("identity provider returned no access token")]
    MissingAccessToken,
    /// The exchange itself failed.
    #[error(transparent)]
    Exchange(#[from] ExchangeFailure),
}

// ============================================================================
// SECTION: Exchanger Interface
// ============================================================================

/// Performs the identity provider side of an on-behalf-of exchange.
#[async_trait]
pub trait TokenExchanger: Send + Sync {
    /// Exchanges `assertion` for a token scoped to `scope`.
    ///
    /// Returns `Ok(None)` when the provider answered successfully without an
    /// access token.
    ///
    /// # Errors
    ///
    /// Returns [`ExchangeFailure`] when the provider rejects the request or
    /// cannot be reached.
    async fn exchange_on_behalf_of(
        &self,
        assertion: &str,
        scope: &str,
    ) -> Result<Option<String>, ExchangeFailure>;
}

// ============================================================================
// SECTION: Token Broker
// ============================================================================

/// Exchanges delegated credentials for downstream tokens.
#[derive(Clone)]
pub struct TokenBroker {
    /// Identity provider client.
    exchanger: Arc<dyn TokenExchanger>,
    /// Scope requested for the downstream token.
    scope: String,
}

impl TokenBroker {
    /// Creates a broker requesting `scope` through `exchanger`.
    #[must_use]
    pub fn new(exchanger: Arc<dyn TokenExchanger>, scope: impl Into<String>) -> Self {
        Self { exchanger, scope: scope.into() }
    }

    /// Returns the requested downstream scope.
    #[must_use]
    pub fn scope(&self) -> &str {
        &self.scope
    }

    /// Performs one on-behalf-of exchange.
    ///
    /// No retry is attempted and the resulting token is not cached.
    ///
    /// # Errors
    ///
    /// Returns [`TokenExchangeError`] when the assertion is empty, the
    /// exchange fails, or the provider returns no access token.
    pub async fn exchange(&self, assertion: &str) -> Result<DownstreamToken, TokenExchangeError> {
        let assertion = assertion.trim();
        if assertion.is_empty() {
            return Err(TokenExchangeError::EmptyAssertion);
        }
        let token = self.exchanger.exchange_on_behalf_of(assertion, &self.scope).await?;
        match token {
            Some(token) if !token.trim().is_empty() => Ok(DownstreamToken(token)),
            _ => Err(TokenExchangeError::MissingAccessToken),
        }
    }
}

impl fmt::Debug for TokenBroker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenBroker").field("scope", &self.scope).finish_non_exhaustive()
    }
}

// ============================================================================
// SECTION: Entra ID Client
// ============================================================================

/// Confidential client performing on-behalf-of exchanges over HTTP.
pub struct EntraOboClient {
    /// HTTP client with configured timeouts.
    client: Client,
    /// v2.0 token endpoint URL.
    token_endpoint: String,
    /// Confidential client identifier.
    client_id: String,
    /// Confidential client secret.
    client_secret: SecretString,
}

impl EntraOboClient {
    /// Builds a client from identity configuration.
    ///
    /// Missing identity settings are sent as empty values; the provider
    /// rejects them at exchange time.
    ///
    /// # Errors
    ///
    /// Returns [`ExchangeFailure::Client`] when the HTTP client cannot be built.
    pub fn from_config(config: &IdentityConfig) -> Result<Self, ExchangeFailure> {
        let client =
            build_client(config.timeouts).map_err(|err| ExchangeFailure::Client(err.to_string()))?;
        Ok(Self {
            client,
            token_endpoint: config.token_endpoint(),
            client_id: config.client_id.clone().unwrap_or_default(),
            client_secret: SecretString::new(
                config.client_secret_value().to_string().into_boxed_str(),
            ),
        })
    }

    /// Returns the token endpoint this client posts to.
    #[must_use]
    pub fn token_endpoint(&self) -> &str {
        &self.token_endpoint
    }
}

impl fmt::Debug for EntraOboClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntraOboClient")
            .field("token_endpoint", &self.token_endpoint)
            .field("client_id", &self.client_id)
            .finish_non_exhaustive()
    }
}

/// Token endpoint response body.
#[derive(Debug, Deserialize)]
struct TokenEndpointResponse {
    /// Issued access token.
    #[serde(default)]
    access_token: Option<String>,
    /// OAuth error code.
    #[serde(default)]
    error: Option<String>,
    /// OAuth error description.
    #[serde(default)]
    error_description: Option<String>,
}

#[async_trait]
impl TokenExchanger for EntraOboClient {
    async fn exchange_on_behalf_of(
        &self,
        assertion: &str,
        scope: &str,
    ) -> Result<Option<String>, ExchangeFailure> {
        let form = [
            ("grant_type", JWT_BEARER_GRANT_TYPE),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.expose_secret()),
            ("assertion", assertion),
            ("scope", scope),
            ("requested_token_use", ON_BEHALF_OF_TOKEN_USE),
        ];
        let response = self
            .client
            .post(&self.token_endpoint)
            .form(&form)
            .send()
            .await
            .map_err(|err| ExchangeFailure::Transport(describe_send_error(&err)))?;
        let status = response.status();
        let body = read_limited_body(response, MAX_TOKEN_RESPONSE_BYTES)
            .await
            .map_err(|err| ExchangeFailure::Transport(err.describe()))?;
        let parsed: TokenEndpointResponse = serde_json::from_slice(&body).map_err(|_| {
            ExchangeFailure::InvalidResponse(format!("status {}: body is not json", status.as_u16()))
        })?;
        if parsed.error.is_some() || !status.is_success() {
            let code = parsed.error.unwrap_or_else(|| format!("http_{}", status.as_u16()));
            let description = parsed
                .error_description
                .unwrap_or_default()
                .chars()
                .take(MAX_PROVIDER_DESCRIPTION_CHARS)
                .collect();
            return Err(ExchangeFailure::Rejected { code, description });
        }
        Ok(parsed.access_token)
    }
}
