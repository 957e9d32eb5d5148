//! Common test utilities
//!
//! Rustls setup, fixture identifiers and wiremock-backed Azure clients.

#![allow(dead_code, reason = "not every test binary uses every helper")]

use azurekv::config::AppConfig;
use azurekv::provider::azure::{AzureKeyVaultApi, AzureResourceDirectory, StaticTokenCredential};
use serde_json::{json, Value};
use std::sync::{Arc, Once};
use wiremock::MockServer;

pub const SUBSCRIPTION: &str = "00000000-0000-0000-0000-000000000000";
pub const VAULT_ID: &str = "/subscriptions/00000000-0000-0000-0000-000000000000/resourceGroups/rg/providers/Microsoft.KeyVault/vaults/myvault";
pub const TEST_TOKEN: &str = "test-token";

static RUSTLS_INIT: Once = Once::new();

/// Install the ring crypto provider once per test binary
pub fn init_rustls() {
    RUSTLS_INIT.call_once(|| {
        rustls::crypto::ring::default_provider()
            .install_default()
            .expect("Failed to install rustls crypto provider");
    });
}

/// Configuration routing both Azure clients to `server`
pub fn mock_config(server: &MockServer) -> AppConfig {
    AppConfig {
        key_vault_endpoint: Some(server.uri()),
        management_endpoint: server.uri(),
        ..AppConfig::default()
    }
}

pub fn key_vault_api(server: &MockServer) -> AzureKeyVaultApi {
    init_rustls();
    AzureKeyVaultApi::new(
        reqwest::Client::new(),
        Arc::new(StaticTokenCredential::new(TEST_TOKEN)),
        &mock_config(server),
    )
}

pub fn resource_directory(server: &MockServer) -> AzureResourceDirectory {
    init_rustls();
    AzureResourceDirectory::new(
        reqwest::Client::new(),
        Arc::new(StaticTokenCredential::new(TEST_TOKEN)),
        &mock_config(server),
    )
}

/// Secret bundle as Key Vault returns it
pub fn secret_item(name: &str, version: &str, created: i64) -> Value {
    json!({
        "id": format!("https://myvault.vault.azure.net/secrets/{name}/{version}"),
        "contentType": "text/plain",
        "attributes": {
            "enabled": true,
            "created": created,
            "updated": created,
            "recoveryLevel": "Recoverable+Purgeable"
        },
        "tags": { "env": "test" }
    })
}
