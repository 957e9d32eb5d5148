//! # Azure Key Vault Client
//!
//! Key Vault secrets REST API (`api-version=7.4`).
//!
//! One bound client per vault name is created on first use and cached for
//! the lifetime of the [`AzureKeyVaultApi`].

use super::auth::bearer_token;
use super::wire::{Page, SecretItem, SetSecretRequest, UpdateSecretRequest, WireAttributes};
use super::send;
use crate::config::AppConfig;
use crate::constants::{KEY_VAULT_API_VERSION, KEY_VAULT_SCOPE};
use crate::error::{Result, SecretError};
use crate::identity::{derive_vault_name, vault_url};
use crate::model::{SecretProperties, SetSecretParameters, UpdateSecretPropertiesParameters};
use crate::provider::{VaultSecretsApi, VersionPages};
use async_trait::async_trait;
use azure_core::credentials::TokenCredential;
use futures::stream::{self, StreamExt};
use reqwest::Url;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info, info_span, Instrument};

const SECRET_HINT: &str = "make sure that the secret exists and that you have the \
    \"Microsoft.KeyVault/vaults/secrets/readMetadata/action\" permission";

/// Secrets client bound to one vault
struct VaultClient {
    vault_url: String,
    http: reqwest::Client,
    credential: Arc<dyn TokenCredential>,
}

impl VaultClient {
    /// `{vault_url}/{segments...}?api-version=...`, each segment percent-encoded
    fn url(&self, segments: &[&str]) -> Result<Url> {
        let invalid = || {
            SecretError::InvalidIdentifier(format!(
                "vault URL {:?} cannot carry a path",
                self.vault_url
            ))
        };
        let mut url = Url::parse(&self.vault_url).map_err(|e| {
            SecretError::InvalidIdentifier(format!("invalid vault URL {:?}: {e}", self.vault_url))
        })?;
        url.path_segments_mut()
            .map_err(|()| invalid())?
            .pop_if_empty()
            .extend(segments);
        url.query_pairs_mut()
            .append_pair("api-version", KEY_VAULT_API_VERSION);
        Ok(url)
    }

    async fn token(&self) -> Result<String> {
        bearer_token(self.credential.as_ref(), KEY_VAULT_SCOPE).await
    }

    async fn versions_page(&self, url: String) -> Result<Page<SecretItem>> {
        debug!(http.method = "GET", http.url = %url, "Listing secret versions");
        let token = self.token().await?;
        let response =
            send(self.http.get(url), &token, "list_secret_versions", SECRET_HINT).await?;
        Ok(response.json().await?)
    }
}

/// Key Vault data-plane client implementing [`VaultSecretsApi`]
pub struct AzureKeyVaultApi {
    http: reqwest::Client,
    credential: Arc<dyn TokenCredential>,
    /// Replaces every vault's URL, for mock servers
    endpoint_override: Option<String>,
    clients: Mutex<HashMap<String, Arc<VaultClient>>>,
}

impl std::fmt::Debug for AzureKeyVaultApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AzureKeyVaultApi")
            .field("endpoint_override", &self.endpoint_override)
            .finish_non_exhaustive()
    }
}

impl AzureKeyVaultApi {
    #[must_use]
    pub fn new(
        http: reqwest::Client,
        credential: Arc<dyn TokenCredential>,
        config: &AppConfig,
    ) -> Self {
        if let Some(endpoint) = &config.key_vault_endpoint {
            info!("Routing Azure Key Vault requests to {}", endpoint);
        }
        Self {
            http,
            credential,
            endpoint_override: config
                .key_vault_endpoint
                .as_ref()
                .map(|endpoint| with_trailing_slash(endpoint)),
            clients: Mutex::new(HashMap::new()),
        }
    }

    /// Bound client for the vault named in `key_vault_id`, created on first use
    fn client_for(&self, key_vault_id: &str) -> Result<Arc<VaultClient>> {
        let vault_name = derive_vault_name(key_vault_id)?;

        // The lock is never held across an await
        let mut clients = self.clients.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(client) = clients.get(&vault_name) {
            return Ok(Arc::clone(client));
        }

        let client = Arc::new(VaultClient {
            vault_url: self
                .endpoint_override
                .clone()
                .unwrap_or_else(|| vault_url(&vault_name)),
            http: self.http.clone(),
            credential: Arc::clone(&self.credential),
        });
        debug!(vault.name = %vault_name, vault.url = %client.vault_url, "Created Key Vault client");
        clients.insert(vault_name, Arc::clone(&client));
        Ok(client)
    }

    #[cfg(test)]
    fn cached_clients(&self) -> usize {
        self.clients.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

fn with_trailing_slash(url: &str) -> String {
    if url.ends_with('/') {
        url.to_string()
    } else {
        format!("{url}/")
    }
}

#[async_trait]
impl VaultSecretsApi for AzureKeyVaultApi {
    fn list_secret_versions<'a>(&'a self, key_vault_id: &'a str, name: &'a str) -> VersionPages<'a> {
        let client = match self.client_for(key_vault_id) {
            Ok(client) => client,
            Err(e) => return stream::once(async move { Err(e) }).boxed(),
        };
        let first = match client.url(&["secrets", name, "versions"]) {
            Ok(url) => url.to_string(),
            Err(e) => return stream::once(async move { Err(e) }).boxed(),
        };

        stream::try_unfold(Some(first), move |next| {
            let client = Arc::clone(&client);
            async move {
                let Some(url) = next else {
                    return Ok(None);
                };
                let page = client.versions_page(url).await?;
                let following = page.next();
                let items: Vec<SecretProperties> =
                    page.value.into_iter().map(SecretProperties::from).collect();
                Ok(Some((items, following)))
            }
        })
        .boxed()
    }

    async fn set_secret(
        &self,
        key_vault_id: &str,
        name: &str,
        parameters: SetSecretParameters,
    ) -> Result<SecretProperties> {
        let client = self.client_for(key_vault_id)?;
        let span = info_span!("azure.keyvault.secret.set", secret.name = name);

        async move {
            let url = client.url(&["secrets", name])?;
            debug!(http.method = "PUT", http.url = %url, "Setting secret");
            let body = SetSecretRequest {
                value: parameters.value.expose(),
                content_type: parameters.content_type.as_deref(),
                attributes: WireAttributes::from(&parameters.attributes),
                tags: &parameters.tags,
            };
            let token = client.token().await?;
            let response =
                send(client.http.put(url).json(&body), &token, "set_secret", SECRET_HINT).await?;
            let item: SecretItem = response.json().await?;
            Ok(SecretProperties::from(item))
        }
        .instrument(span)
        .await
    }

    async fn update_secret_properties(
        &self,
        key_vault_id: &str,
        name: &str,
        version: &str,
        parameters: UpdateSecretPropertiesParameters,
    ) -> Result<SecretProperties> {
        let client = self.client_for(key_vault_id)?;
        let span = info_span!(
            "azure.keyvault.secret.update_properties",
            secret.name = name,
            secret.version = version
        );

        async move {
            let url = client.url(&["secrets", name, version])?;
            debug!(http.method = "PATCH", http.url = %url, "Updating secret properties");
            let body = UpdateSecretRequest {
                content_type: parameters.content_type.as_deref(),
                attributes: WireAttributes::from(&parameters.attributes),
                tags: &parameters.tags,
            };
            let token = client.token().await?;
            let response = send(
                client.http.patch(url).json(&body),
                &token,
                "update_secret_properties",
                SECRET_HINT,
            )
            .await?;
            let item: SecretItem = response.json().await?;
            Ok(SecretProperties::from(item))
        }
        .instrument(span)
        .await
    }

    async fn delete_secret(&self, key_vault_id: &str, name: &str) -> Result<()> {
        let client = self.client_for(key_vault_id)?;
        let url = client.url(&["secrets", name])?;
        info!("Deleting Azure secret: {}", name);
        debug!(http.method = "DELETE", http.url = %url, "Deleting secret");

        let token = client.token().await?;
        send(client.http.delete(url), &token, "delete_secret", SECRET_HINT).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::azure::StaticTokenCredential;

    const VAULT_A: &str =
        "/subscriptions/0000/resourceGroups/rg/providers/Microsoft.KeyVault/vaults/vault-a";
    const VAULT_B: &str =
        "/subscriptions/0000/resourceGroups/rg/providers/Microsoft.KeyVault/vaults/vault-b";

    fn api(config: &AppConfig) -> AzureKeyVaultApi {
        AzureKeyVaultApi::new(
            reqwest::Client::new(),
            Arc::new(StaticTokenCredential::new("test-token")),
            config,
        )
    }

    #[test]
    fn test_clients_are_cached_per_vault() {
        let api = api(&AppConfig::default());
        let first = api.client_for(VAULT_A).unwrap();
        let again = api.client_for(VAULT_A).unwrap();
        api.client_for(VAULT_B).unwrap();

        assert!(Arc::ptr_eq(&first, &again));
        assert_eq!(api.cached_clients(), 2);
        assert_eq!(first.vault_url, "https://vault-a.vault.azure.net/");
    }

    #[test]
    fn test_endpoint_override() {
        let config = AppConfig {
            key_vault_endpoint: Some("http://127.0.0.1:8080".to_string()),
            ..AppConfig::default()
        };
        let client = api(&config).client_for(VAULT_A).unwrap();
        assert_eq!(
            client.url(&["secrets", "s1"]).unwrap().as_str(),
            "http://127.0.0.1:8080/secrets/s1?api-version=7.4"
        );
    }

    #[test]
    fn test_path_segments_are_encoded() {
        let client = api(&AppConfig::default()).client_for(VAULT_A).unwrap();
        let url = client.url(&["secrets", "../keys/k1", "v1"]).unwrap();
        assert_eq!(url.host_str(), Some("vault-a.vault.azure.net"));
        assert_eq!(url.path(), "/secrets/..%2Fkeys%2Fk1/v1");
    }

    #[test]
    fn test_concurrent_first_use_shares_one_client() {
        let api = api(&AppConfig::default());
        let clients: Vec<Arc<VaultClient>> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| scope.spawn(|| api.client_for(VAULT_A).unwrap()))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(api.cached_clients(), 1);
        assert!(clients.iter().all(|c| Arc::ptr_eq(c, &clients[0])));
    }

    #[test]
    fn test_malformed_vault_id_is_rejected_before_any_request() {
        let api = api(&AppConfig::default());
        assert!(api.client_for("vault-a").is_err());
        assert_eq!(api.cached_clients(), 0);
    }
}
