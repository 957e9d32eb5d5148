//! # Constants
//!
//! Shared constants used throughout the reconciler.
//!
//! Endpoint values can be overridden via configuration or environment
//! variables where applicable (see [`crate::config::AppConfig`]).

/// Key Vault data-plane REST API version
pub const KEY_VAULT_API_VERSION: &str = "7.4";

/// Azure Resource Manager API version used for the resources listing
pub const RESOURCE_MANAGER_API_VERSION: &str = "2021-04-01";

/// DNS suffix of Key Vault data-plane endpoints in the public cloud
pub const KEY_VAULT_DNS_SUFFIX: &str = "vault.azure.net";

/// OAuth scope for the Key Vault data plane
pub const KEY_VAULT_SCOPE: &str = "https://vault.azure.net/.default";

/// Default Azure Resource Manager endpoint
pub const DEFAULT_MANAGEMENT_ENDPOINT: &str = "https://management.azure.com";

/// OAuth scope for Azure Resource Manager
pub const MANAGEMENT_SCOPE: &str = "https://management.azure.com/.default";

/// ARM resource type of a Key Vault
pub const KEY_VAULT_RESOURCE_TYPE: &str = "Microsoft.KeyVault/vaults";

/// Permission needed to find a vault by name through Resource Manager
pub const KEY_VAULT_READ_PERMISSION: &str = "Microsoft.KeyVault/vaults/read";

/// Rotation counter written to state after an import.
/// The caller's real counter is unknowable, so imports start a fresh baseline.
pub const IMPORTED_ROTATION_COUNTER: i32 = 1;

/// Metric label for the Key Vault collaborator
pub const PROVIDER_LABEL: &str = "azure";

/// Environment variable the CLI reads the write-only value from by default
pub const DEFAULT_VALUE_ENV: &str = "AZUREKV_SECRET_VALUE";
