// crates/ado-bridge-config/tests/common/mod.rs
// =============================================================================
// Module: Config Test Helpers
// Description: Shared helpers for config validation tests.
// Purpose: Reduce duplication across integration tests for ado-bridge-config.
// =============================================================================

#![allow(dead_code, reason = "Test helpers are selectively used across suites.")]

use std::collections::BTreeMap;

use ado_bridge_config::AdoBridgeConfig;
use ado_bridge_config::ConfigError;

/// Parses a TOML string into an `AdoBridgeConfig` for tests.
pub fn config_from_toml(toml_str: &str) -> Result<AdoBridgeConfig, ConfigError> {
    AdoBridgeConfig::from_toml_str(toml_str)
}

/// Returns a minimal config with all defaults applied.
pub fn minimal_config() -> Result<AdoBridgeConfig, ConfigError> {
    config_from_toml("")
}

/// Returns a config with every essential identity and remote setting present.
pub fn complete_config() -> Result<AdoBridgeConfig, ConfigError> {
    config_from_toml(
        r#"
[identity]
tenant_id = "tenant-1"
client_id = "client-1"
client_secret = "secret-1"

[remote]
organization = "contoso"
"#,
    )
}

/// Builds an environment lookup backed by a fixed map.
pub fn env_lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: BTreeMap<String, String> =
        pairs.iter().map(|(key, value)| ((*key).to_string(), (*value).to_string())).collect();
    move |key: &str| map.get(key).cloned()
}

/// Asserts that a validation result fails with a message containing `needle`.
pub fn assert_invalid(result: Result<(), ConfigError>, needle: &str) -> Result<(), String> {
    match result {
        Err(error) => {
            let message = error.to_string();
            if message.contains(needle) {
                Ok(())
            } else {
                Err(format!("error {message} did not contain {needle}"))
            }
        }
        Ok(()) => Err("expected invalid config".to_string()),
    }
}
