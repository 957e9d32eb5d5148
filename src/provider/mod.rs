//! # Provider Modules
//!
//! Collaborator contracts the reconciler talks to, and their implementations.
//!
//! - `VaultSecretsApi`: secret versions inside a vault
//! - `ResourceDirectoryApi`: finds a vault's resource ID by name
//!
//! `azure` talks to the real services over REST; `memory` keeps everything
//! in process for tests and dry runs.

use crate::constants::KEY_VAULT_READ_PERMISSION;
use crate::error::{Result, SecretError};
use crate::model::{SecretProperties, SetSecretParameters, UpdateSecretPropertiesParameters};
use async_trait::async_trait;
use futures::stream::BoxStream;

/// Lazily fetched pages of secret versions, one item per page
///
/// Finite and not restartable: a fresh listing needs a fresh call.
pub type VersionPages<'a> = BoxStream<'a, Result<Vec<SecretProperties>>>;

/// Secret operations scoped to a vault identified by its resource ID
#[async_trait]
pub trait VaultSecretsApi: Send + Sync {
    /// List every version of a secret, page by page
    fn list_secret_versions<'a>(&'a self, key_vault_id: &'a str, name: &'a str)
        -> VersionPages<'a>;

    /// Mint a new version holding `parameters.value`
    async fn set_secret(
        &self,
        key_vault_id: &str,
        name: &str,
        parameters: SetSecretParameters,
    ) -> Result<SecretProperties>;

    /// Change content type, validity window and tags of an existing version
    async fn update_secret_properties(
        &self,
        key_vault_id: &str,
        name: &str,
        version: &str,
        parameters: UpdateSecretPropertiesParameters,
    ) -> Result<SecretProperties>;

    /// Delete the secret together with all of its versions
    async fn delete_secret(&self, key_vault_id: &str, name: &str) -> Result<()>;
}

/// Resource lookups within a subscription
#[async_trait]
pub trait ResourceDirectoryApi: Send + Sync {
    /// Resource ID of the vault whose name is exactly `vault_name`
    async fn find_vault_resource_id(&self, subscription_id: &str, vault_name: &str)
        -> Result<String>;
}

/// Directory miss for `vault_name`, with the permission needed to see it
pub(crate) fn vault_not_found(vault_name: &str) -> SecretError {
    SecretError::not_found(
        format!("the key vault {vault_name:?} not found"),
        format!(
            "make sure that the key vault name is correct and that you have the {KEY_VAULT_READ_PERMISSION:?} permission"
        ),
    )
}

pub mod azure;
pub mod memory;
