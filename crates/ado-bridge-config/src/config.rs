// crates/ado-bridge-config/src/config.rs
// ============================================================================
// Module: ADO Bridge Configuration
// Description: Configuration loading, environment overrides, and validation.
// Purpose: Provide strict config parsing with hard limits for the OBO bridge.
// Dependencies: serde, toml, secrecy, url
// ============================================================================

//! ## Overview
//! Configuration is loaded from an optional TOML file, then overridden by the
//! process environment (`TENANT_ID`, `MCP_API_CLIENT_ID`,
//! `MCP_API_CLIENT_SECRET`, `ADO_ORG`, `ADO_API_VERSION`, `PORT`). Structural
//! problems always fail closed. Missing identity settings either fail or are
//! reported as warnings, depending on [`MissingIdentityPolicy`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;
use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::path::PathBuf;

use secrecy::ExposeSecret;
use secrecy::SecretString;
use serde::Deserialize;
use serde::Deserializer;
use thiserror::Error;
use url::Url;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
const DEFAULT_CONFIG_NAME: &str = "ado-bridge.toml";
/// Environment variable used to override the config path.
pub const CONFIG_ENV_VAR: &str = "ADO_BRIDGE_CONFIG";
/// Environment variable carrying the identity tenant identifier.
pub const ENV_TENANT_ID: &str = "TENANT_ID";
/// Environment variable carrying the confidential client identifier.
pub const ENV_CLIENT_ID: &str = "MCP_API_CLIENT_ID";
/// Environment variable carrying the confidential client secret.
pub const ENV_CLIENT_SECRET: &str = "MCP_API_CLIENT_SECRET";
/// Environment variable carrying the remote organization.
pub const ENV_ORGANIZATION: &str = "ADO_ORG";
/// Environment variable carrying the remote API version.
pub const ENV_API_VERSION: &str = "ADO_API_VERSION";
/// Environment variable carrying the listen port.
pub const ENV_PORT: &str = "PORT";
/// Maximum configuration file size in bytes.
pub(crate) const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum length of a single path component.
pub(crate) const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
pub(crate) const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Maximum accepted inbound request body size in bytes.
pub(crate) const MAX_BODY_BYTES_LIMIT: usize = 16 * 1024 * 1024;
/// Maximum accepted remote response body size in bytes.
pub(crate) const MAX_REMOTE_RESPONSE_BYTES_LIMIT: usize = 64 * 1024 * 1024;
/// Maximum length of identifiers embedded in URLs (tenant, organization).
pub(crate) const MAX_URL_SEGMENT_LENGTH: usize = 256;
/// Minimum outbound connect timeout in milliseconds.
pub(crate) const MIN_CONNECT_TIMEOUT_MS: u64 = 100;
/// Maximum outbound connect timeout in milliseconds.
pub(crate) const MAX_CONNECT_TIMEOUT_MS: u64 = 10_000;
/// Minimum outbound request timeout in milliseconds.
pub(crate) const MIN_REQUEST_TIMEOUT_MS: u64 = 500;
/// Maximum outbound request timeout in milliseconds.
pub(crate) const MAX_REQUEST_TIMEOUT_MS: u64 = 60_000;
/// Resource scope for the Azure DevOps REST surface.
pub const DEFAULT_DOWNSTREAM_SCOPE: &str = "499b84ac-1321-427f-aa17-267ca6975798/.default";

// ============================================================================
// SECTION: Configuration Types
// ============================================================================

/// ADO bridge configuration.
#[derive(Debug, Default, Deserialize)]
pub struct AdoBridgeConfig {
    /// Inbound server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Identity-provider (on-behalf-of) configuration.
    #[serde(default)]
    pub identity: IdentityConfig,
    /// Remote REST API configuration.
    #[serde(default)]
    pub remote: RemoteApiConfig,
    /// Startup policy configuration.
    #[serde(default)]
    pub startup: StartupConfig,
}

impl AdoBridgeConfig {
    /// Loads configuration using the default resolution rules and applies
    /// process environment overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading, overriding, or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match resolve_path(path)? {
            ConfigSource::Explicit(path) => Self::from_file(&path)?,
            ConfigSource::Default(path) => {
                if path.is_file() {
                    Self::from_file(&path)?
                } else {
                    Self::default()
                }
            }
        };
        config.apply_env_overrides(|key| env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Parses configuration from a TOML string without validation.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the TOML is malformed.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Reads and parses a configuration file with size and path limits.
    fn from_file(path: &Path) -> Result<Self, ConfigError> {
        validate_path(path)?;
        let bytes = fs::read(path).map_err(|err| ConfigError::Io(err.to_string()))?;
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        Self::from_toml_str(content)
    }

    /// Applies environment overrides using the supplied lookup function.
    ///
    /// Blank values are ignored so an exported-but-empty variable does not
    /// clobber file configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when `PORT` is not a valid port or the
    /// configured bind address cannot be rebound.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| {
            lookup(key).map(|value| value.trim().to_string()).filter(|value| !value.is_empty())
        };
        if let Some(value) = read(ENV_TENANT_ID) {
            self.identity.tenant_id = Some(value);
        }
        if let Some(value) = read(ENV_CLIENT_ID) {
            self.identity.client_id = Some(value);
        }
        if let Some(value) = read(ENV_CLIENT_SECRET) {
            self.identity.client_secret = Some(SecretString::new(value.into_boxed_str()));
        }
        if let Some(value) = read(ENV_ORGANIZATION) {
            self.remote.organization = Some(value);
        }
        if let Some(value) = read(ENV_API_VERSION) {
            self.remote.api_version = value;
        }
        if let Some(value) = read(ENV_PORT) {
            let port = value
                .parse::<u16>()
                .map_err(|_| ConfigError::Invalid(format!("{ENV_PORT} must be a valid port")))?;
            self.server.bind = rebind_port(&self.server.bind, port)?;
        }
        Ok(())
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration is invalid, or when
    /// required settings are missing under [`MissingIdentityPolicy::Fail`].
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.validate()?;
        self.identity.validate()?;
        self.remote.validate()?;
        if self.startup.missing_identity == MissingIdentityPolicy::Fail {
            let missing = self.missing_settings();
            if !missing.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "missing required settings: {}",
                    missing.join(", ")
                )));
            }
        }
        Ok(())
    }

    /// Returns labels for essential settings that are absent.
    #[must_use]
    pub fn missing_settings(&self) -> Vec<&'static str> {
        let mut missing = self.identity.missing_fields();
        if self.remote.organization().is_none() {
            missing.push("remote.organization (ADO_ORG)");
        }
        missing
    }
}

/// Inbound server configuration.
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    /// Socket address the HTTP transport binds to.
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Maximum request body size in bytes.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
    /// Audit logging configuration.
    #[serde(default)]
    pub audit: ServerAuditConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            max_body_bytes: default_max_body_bytes(),
            audit: ServerAuditConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Returns the parsed bind address.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the bind address is malformed.
    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.bind
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid("server.bind is not a valid address".to_string()))
    }

    /// Validates server configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        self.bind_addr()?;
        if self.max_body_bytes == 0 || self.max_body_bytes > MAX_BODY_BYTES_LIMIT {
            return Err(ConfigError::Invalid(format!(
                "server.max_body_bytes must be between 1 and {MAX_BODY_BYTES_LIMIT}"
            )));
        }
        self.audit.validate()
    }
}

/// Audit logging configuration.
#[derive(Debug, Deserialize)]
pub struct ServerAuditConfig {
    /// Enable structured audit logging.
    #[serde(default = "default_audit_enabled")]
    pub enabled: bool,
    /// Optional audit log path (JSON lines). Stderr is used when unset.
    #[serde(default)]
    pub path: Option<String>,
}

impl Default for ServerAuditConfig {
    fn default() -> Self {
        Self {
            enabled: default_audit_enabled(),
            path: None,
        }
    }
}

impl ServerAuditConfig {
    /// Validates audit configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(path) = &self.path {
            validate_path_string("server.audit.path", path)?;
        }
        Ok(())
    }
}

/// Identity-provider configuration for the on-behalf-of exchange.
#[derive(Debug, Deserialize)]
pub struct IdentityConfig {
    /// Directory tenant identifier.
    #[serde(default)]
    pub tenant_id: Option<String>,
    /// Confidential client identifier of this service.
    #[serde(default)]
    pub client_id: Option<String>,
    /// Confidential client secret of this service.
    #[serde(default, deserialize_with = "deserialize_secret")]
    pub client_secret: Option<SecretString>,
    /// Authority host, without tenant path.
    #[serde(default = "default_authority_host")]
    pub authority_host: String,
    /// Fixed downstream resource scope requested on every exchange.
    #[serde(default = "default_downstream_scope")]
    pub scope: String,
    /// Outbound timeouts for the token endpoint.
    #[serde(default)]
    pub timeouts: TimeoutConfig,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            tenant_id: None,
            client_id: None,
            client_secret: None,
            authority_host: default_authority_host(),
            scope: default_downstream_scope(),
            timeouts: TimeoutConfig::default(),
        }
    }
}

impl IdentityConfig {
    /// Returns the tenant-qualified authority URL.
    #[must_use]
    pub fn authority(&self) -> String {
        let host = self.authority_host.trim_end_matches('/');
        let tenant = self.tenant_id.as_deref().unwrap_or_default();
        format!("{host}/{tenant}")
    }

    /// Returns the v2.0 token endpoint for the configured authority.
    #[must_use]
    pub fn token_endpoint(&self) -> String {
        format!("{}/oauth2/v2.0/token", self.authority())
    }

    /// Returns the exposed client secret, or an empty string when unset.
    #[must_use]
    pub fn client_secret_value(&self) -> &str {
        self.client_secret.as_ref().map_or("", |secret| secret.expose_secret())
    }

    /// Returns labels for essential identity settings that are absent.
    #[must_use]
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if is_blank(self.tenant_id.as_deref()) {
            missing.push("identity.tenant_id (TENANT_ID)");
        }
        if is_blank(self.client_id.as_deref()) {
            missing.push("identity.client_id (MCP_API_CLIENT_ID)");
        }
        if self.client_secret.as_ref().is_none_or(|secret| secret.expose_secret().trim().is_empty())
        {
            missing.push("identity.client_secret (MCP_API_CLIENT_SECRET)");
        }
        missing
    }

    /// Validates identity configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        validate_http_url("identity.authority_host", &self.authority_host)?;
        if let Some(tenant) = &self.tenant_id {
            validate_url_segment("identity.tenant_id", tenant)?;
        }
        let scope = self.scope.trim();
        if scope.is_empty() || scope.chars().any(char::is_whitespace) {
            return Err(ConfigError::Invalid(
                "identity.scope must be a single non-empty scope".to_string(),
            ));
        }
        self.timeouts.validate("identity.timeouts")
    }
}

/// Remote REST API configuration.
#[derive(Debug, Deserialize)]
pub struct RemoteApiConfig {
    /// Base URL of the remote service.
    #[serde(default = "default_remote_base_url")]
    pub base_url: String,
    /// Organization the tools operate against.
    #[serde(default)]
    pub organization: Option<String>,
    /// Pinned REST API version.
    #[serde(default = "default_api_version")]
    pub api_version: String,
    /// Outbound timeouts for remote calls.
    #[serde(default)]
    pub timeouts: TimeoutConfig,
    /// Maximum accepted response body size in bytes.
    #[serde(default = "default_max_response_bytes")]
    pub max_response_bytes: usize,
}

impl Default for RemoteApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_remote_base_url(),
            organization: None,
            api_version: default_api_version(),
            timeouts: TimeoutConfig::default(),
            max_response_bytes: default_max_response_bytes(),
        }
    }
}

impl RemoteApiConfig {
    /// Returns the trimmed organization when configured.
    #[must_use]
    pub fn organization(&self) -> Option<&str> {
        self.organization.as_deref().map(str::trim).filter(|value| !value.is_empty())
    }

    /// Validates remote API configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        validate_http_url("remote.base_url", &self.base_url)?;
        if let Some(organization) = &self.organization {
            validate_url_segment("remote.organization", organization)?;
        }
        let version = self.api_version.trim();
        if version.is_empty() || version.chars().any(|ch| ch.is_whitespace() || ch == '&') {
            return Err(ConfigError::Invalid(
                "remote.api_version must be a non-empty version token".to_string(),
            ));
        }
        if self.max_response_bytes == 0
            || self.max_response_bytes > MAX_REMOTE_RESPONSE_BYTES_LIMIT
        {
            return Err(ConfigError::Invalid(format!(
                "remote.max_response_bytes must be between 1 and \
                 {MAX_REMOTE_RESPONSE_BYTES_LIMIT}"
            )));
        }
        self.timeouts.validate("remote.timeouts")
    }
}

/// Timeout configuration for outbound HTTP requests.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct TimeoutConfig {
    /// Maximum time to establish the HTTP connection.
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// Maximum end-to-end request time (connect + body).
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: default_connect_timeout_ms(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

impl TimeoutConfig {
    /// Validates timeout ranges under the given field prefix.
    fn validate(&self, prefix: &str) -> Result<(), ConfigError> {
        validate_timeout_range(
            &format!("{prefix}.connect_timeout_ms"),
            self.connect_timeout_ms,
            MIN_CONNECT_TIMEOUT_MS,
            MAX_CONNECT_TIMEOUT_MS,
        )?;
        validate_timeout_range(
            &format!("{prefix}.request_timeout_ms"),
            self.request_timeout_ms,
            MIN_REQUEST_TIMEOUT_MS,
            MAX_REQUEST_TIMEOUT_MS,
        )?;
        if self.request_timeout_ms < self.connect_timeout_ms {
            return Err(ConfigError::Invalid(format!(
                "{prefix}.request_timeout_ms must be >= connect_timeout_ms"
            )));
        }
        Ok(())
    }
}

/// Startup policy configuration.
#[derive(Debug, Default, Deserialize)]
pub struct StartupConfig {
    /// Behavior when essential identity settings are absent.
    #[serde(default)]
    pub missing_identity: MissingIdentityPolicy,
}

/// Policy applied when essential identity settings are absent at startup.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MissingIdentityPolicy {
    /// Start anyway and emit a warning; every exchange will then fail.
    #[default]
    Warn,
    /// Refuse to start.
    Fail,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration loading or validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O failure while reading configuration.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Resolved configuration file location.
enum ConfigSource {
    /// Path supplied by the caller or environment; must exist.
    Explicit(PathBuf),
    /// Default path; optional.
    Default(PathBuf),
}

/// Resolves the config path from CLI or environment defaults.
fn resolve_path(path: Option<&Path>) -> Result<ConfigSource, ConfigError> {
    if let Some(path) = path {
        return Ok(ConfigSource::Explicit(path.to_path_buf()));
    }
    if let Ok(env_path) = env::var(CONFIG_ENV_VAR)
        && !env_path.trim().is_empty()
    {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
        }
        return Ok(ConfigSource::Explicit(PathBuf::from(env_path)));
    }
    Ok(ConfigSource::Default(PathBuf::from(DEFAULT_CONFIG_NAME)))
}

/// Validates the resolved path against security limits.
fn validate_path(path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
    }
    for component in path.components() {
        let value = component.as_os_str().to_string_lossy();
        if value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid("config path component too long".to_string()));
        }
    }
    Ok(())
}

/// Validates a path string against length constraints.
fn validate_path_string(field: &str, value: &str) -> Result<(), ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    if trimmed.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid(format!("{field} exceeds max length")));
    }
    for component in Path::new(trimmed).components() {
        if component.as_os_str().len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid(format!("{field} path component too long")));
        }
    }
    Ok(())
}

/// Validates that a value is an absolute http(s) URL.
fn validate_http_url(field: &str, value: &str) -> Result<(), ConfigError> {
    let url = Url::parse(value.trim())
        .map_err(|_| ConfigError::Invalid(format!("{field} must be a valid url")))?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        _ => Err(ConfigError::Invalid(format!("{field} must use http or https"))),
    }
}

/// Validates an identifier that is interpolated into a URL path.
fn validate_url_segment(field: &str, value: &str) -> Result<(), ConfigError> {
    let trimmed = value.trim();
    if trimmed.len() > MAX_URL_SEGMENT_LENGTH {
        return Err(ConfigError::Invalid(format!("{field} exceeds max length")));
    }
    if trimmed.chars().any(|ch| ch.is_whitespace() || matches!(ch, '/' | '?' | '#' | '\\')) {
        return Err(ConfigError::Invalid(format!("{field} must be a single path segment")));
    }
    Ok(())
}

/// Validates a timeout value against an inclusive range.
fn validate_timeout_range(
    field: &str,
    value_ms: u64,
    min_ms: u64,
    max_ms: u64,
) -> Result<(), ConfigError> {
    if value_ms < min_ms || value_ms > max_ms {
        return Err(ConfigError::Invalid(format!(
            "{field} must be between {min_ms} and {max_ms} milliseconds",
        )));
    }
    Ok(())
}

/// Replaces the port of a bind address.
fn rebind_port(bind: &str, port: u16) -> Result<String, ConfigError> {
    let mut addr: SocketAddr = bind
        .trim()
        .parse()
        .map_err(|_| ConfigError::Invalid("server.bind is not a valid address".to_string()))?;
    addr.set_port(port);
    Ok(addr.to_string())
}

/// Returns true when an optional string is absent or whitespace.
fn is_blank(value: Option<&str>) -> bool {
    value.is_none_or(|value| value.trim().is_empty())
}

/// Deserializes an optional secret string.
fn deserialize_secret<'de, D>(deserializer: D) -> Result<Option<SecretString>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.map(|secret| SecretString::new(secret.into_boxed_str())))
}

/// Default bind address for the HTTP transport.
fn default_bind() -> String {
    "0.0.0.0:3000".to_string()
}

/// Default maximum request body size in bytes.
const fn default_max_body_bytes() -> usize {
    1024 * 1024
}

/// Default audit logging toggle.
const fn default_audit_enabled() -> bool {
    true
}

/// Default identity authority host.
fn default_authority_host() -> String {
    "https://login.microsoftonline.com".to_string()
}

/// Default downstream resource scope.
fn default_downstream_scope() -> String {
    DEFAULT_DOWNSTREAM_SCOPE.to_string()
}

/// Default remote base URL.
fn default_remote_base_url() -> String {
    "https://dev.azure.com".to_string()
}

/// Default remote API version.
fn default_api_version() -> String {
    "7.2".to_string()
}

/// Default remote response size limit in bytes.
const fn default_max_response_bytes() -> usize {
    4 * 1024 * 1024
}

/// Default outbound connect timeout in milliseconds.
const fn default_connect_timeout_ms() -> u64 {
    2_000
}

/// Default outbound request timeout in milliseconds.
const fn default_request_timeout_ms() -> u64 {
    10_000
}

// ============================================================================
// SECTION: Tests
// ============================================================================
