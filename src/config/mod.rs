//! # Configuration
//!
//! Process-level settings loaded from environment variables.

use crate::constants::DEFAULT_MANAGEMENT_ENDPOINT;
use crate::model::SecretValue;
use anyhow::{Context, Result};
use std::time::Duration;

/// Application configuration
///
/// Every setting has a default and can be overridden via environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// Subscription searched by legacy imports (`ARM_SUBSCRIPTION_ID`)
    pub subscription_id: Option<String>,
    /// Client ID for Workload Identity (`AZURE_CLIENT_ID`)
    /// Managed Identity is used when unset
    pub client_id: Option<String>,
    /// Fixed bearer token for mock endpoints (`AZUREKV_ACCESS_TOKEN`)
    pub access_token: Option<SecretValue>,
    /// Override for every vault's data-plane base URL (`AZUREKV_KEY_VAULT_ENDPOINT`)
    pub key_vault_endpoint: Option<String>,
    /// Resource Manager base URL (`AZUREKV_MANAGEMENT_ENDPOINT`)
    pub management_endpoint: String,
    /// Per-request HTTP timeout in seconds (`AZUREKV_HTTP_TIMEOUT_SECS`)
    pub http_timeout_secs: Option<u64>,
    /// Log level (`LOG_LEVEL`)
    pub log_level: String,
    /// Log format, `text` or `json` (`LOG_FORMAT`)
    pub log_format: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            subscription_id: None,
            client_id: None,
            access_token: None,
            key_vault_endpoint: None,
            management_endpoint: DEFAULT_MANAGEMENT_ENDPOINT.to_string(),
            http_timeout_secs: None,
            log_level: "info".to_string(),
            log_format: "text".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables with defaults
    ///
    /// # Errors
    /// Returns an error if a numeric setting is set but not a number
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            subscription_id: env_var_non_empty("ARM_SUBSCRIPTION_ID"),
            client_id: env_var_non_empty("AZURE_CLIENT_ID"),
            access_token: env_var_non_empty("AZUREKV_ACCESS_TOKEN").map(SecretValue::new),
            key_vault_endpoint: env_var_non_empty("AZUREKV_KEY_VAULT_ENDPOINT"),
            management_endpoint: env_var_or_default_str(
                "AZUREKV_MANAGEMENT_ENDPOINT",
                DEFAULT_MANAGEMENT_ENDPOINT,
            ),
            http_timeout_secs: parse_timeout_secs(env_var_non_empty("AZUREKV_HTTP_TIMEOUT_SECS"))?,
            log_level: env_var_or_default_str("LOG_LEVEL", "info"),
            log_format: env_var_or_default_str("LOG_FORMAT", "text"),
        })
    }

    #[must_use]
    pub fn http_timeout(&self) -> Option<Duration> {
        self.http_timeout_secs.map(Duration::from_secs)
    }

    #[must_use]
    pub fn json_logs(&self) -> bool {
        self.log_format.eq_ignore_ascii_case("json")
    }
}

/// Read environment variable as string or return default
fn env_var_or_default_str(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Read environment variable, treating an empty value as unset
fn env_var_non_empty(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_timeout_secs(raw: Option<String>) -> Result<Option<u64>> {
    raw.map(|v| {
        v.trim()
            .parse()
            .with_context(|| format!("AZUREKV_HTTP_TIMEOUT_SECS must be whole seconds, got {v:?}"))
    })
    .transpose()
}
