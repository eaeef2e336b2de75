//! Module configuration
//!
//! Loaded from TOML (or JSON by file extension), then overridden by
//! `SMART_ACCOUNT_*` environment variables, then validated.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use smart_account_authenticator::{AuthenticatorManager, DEFAULT_MAX_COMPOSITE_DEPTH};
use smart_account_core::{AccountAddress, Result, SmartAccountError};

use crate::params::Params;

/// Prefix of environment overrides
pub const ENV_PREFIX: &str = "SMART_ACCOUNT_";

/// Registry settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthenticatorSettings {
    /// Deepest accepted combinator nesting
    pub max_composite_depth: usize,
}

impl Default for AuthenticatorSettings {
    fn default() -> Self {
        Self {
            max_composite_depth: DEFAULT_MAX_COMPOSITE_DEPTH,
        }
    }
}

/// Complete module configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmartAccountConfig {
    /// Sole identity allowed to activate the module
    #[serde(skip_serializing_if = "Option::is_none")]
    pub governor: Option<AccountAddress>,
    /// Initial module params
    pub params: Params,
    /// Registry settings
    pub authenticators: AuthenticatorSettings,
}

impl SmartAccountConfig {
    /// Parse a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| SmartAccountError::malformed_request(format!("Invalid TOML: {e}")))
    }

    /// Parse a JSON document
    pub fn from_json_str(content: &str) -> Result<Self> {
        serde_json::from_str(content)
            .map_err(|e| SmartAccountError::malformed_request(format!("Invalid JSON: {e}")))
    }

    /// Render as TOML
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| SmartAccountError::serialization(e.to_string()))
    }

    /// Load from a `.json` or TOML file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            SmartAccountError::storage(format!(
                "Failed to read config file {}: {e}",
                path.display()
            ))
        })?;
        let is_json = path
            .extension()
            .is_some_and(|extension| extension.eq_ignore_ascii_case("json"));
        if is_json {
            Self::from_json_str(&content)
        } else {
            Self::from_toml_str(&content)
        }
    }

    /// Apply overrides from the process environment
    pub fn merge_with_env(&mut self) -> Result<()> {
        self.merge_with_vars(std::env::vars())
    }

    /// Apply `SMART_ACCOUNT_*` overrides from `vars`
    pub fn merge_with_vars<I>(&mut self, vars: I) -> Result<()>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (key, value) in vars {
            let Some(name) = key.strip_prefix(ENV_PREFIX) else {
                continue;
            };
            match name {
                "GOVERNOR" => self.governor = Some(value.parse()?),
                "MAXIMUM_UNAUTHENTICATED_GAS" => {
                    self.params.maximum_unauthenticated_gas = parse_env(&key, &value)?;
                }
                "IS_SMART_ACCOUNT_ACTIVE" => {
                    self.params.is_smart_account_active = parse_env(&key, &value)?;
                }
                "CIRCUIT_BREAKER_CONTROLLERS" => {
                    self.params.circuit_breaker_controllers = value
                        .split(',')
                        .map(str::trim)
                        .filter(|entry| !entry.is_empty())
                        .map(str::parse)
                        .collect::<Result<_>>()?;
                }
                "MAX_COMPOSITE_DEPTH" => {
                    self.authenticators.max_composite_depth = parse_env(&key, &value)?;
                }
                _ => debug!(variable = %key, "Ignoring unknown configuration override"),
            }
        }
        Ok(())
    }

    /// Validate params and registry settings
    pub fn validate(&self) -> Result<()> {
        self.params.validate()?;
        if self.authenticators.max_composite_depth == 0 {
            return Err(SmartAccountError::malformed_request(
                "max_composite_depth must be positive",
            ));
        }
        Ok(())
    }

    /// Empty registry honoring these settings
    pub fn authenticator_manager(&self) -> AuthenticatorManager {
        AuthenticatorManager::new().with_max_composite_depth(self.authenticators.max_composite_depth)
    }
}

fn parse_env<T>(key: &str, value: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e| {
        SmartAccountError::malformed_request(format!("invalid value for {key}: {e}"))
    })
}
