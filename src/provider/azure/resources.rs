//! # Azure Resource Directory
//!
//! Finds a vault's resource ID by name through the Resource Manager
//! resources listing (`api-version=2021-04-01`).

use super::auth::bearer_token;
use super::send;
use super::wire::{GenericResource, Page};
use crate::config::AppConfig;
use crate::constants::{
    KEY_VAULT_READ_PERMISSION, KEY_VAULT_RESOURCE_TYPE, MANAGEMENT_SCOPE,
    RESOURCE_MANAGER_API_VERSION,
};
use crate::error::Result;
use crate::provider::{vault_not_found, ResourceDirectoryApi};
use async_trait::async_trait;
use azure_core::credentials::TokenCredential;
use std::sync::Arc;
use tracing::{debug, info_span, Instrument};

/// Resource Manager client implementing [`ResourceDirectoryApi`]
pub struct AzureResourceDirectory {
    http: reqwest::Client,
    credential: Arc<dyn TokenCredential>,
    endpoint: String,
}

impl std::fmt::Debug for AzureResourceDirectory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AzureResourceDirectory")
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

impl AzureResourceDirectory {
    #[must_use]
    pub fn new(
        http: reqwest::Client,
        credential: Arc<dyn TokenCredential>,
        config: &AppConfig,
    ) -> Self {
        Self {
            http,
            credential,
            endpoint: config.management_endpoint.trim_end_matches('/').to_string(),
        }
    }

    /// OData filter; quotes inside the literal are doubled
    fn filter(vault_name: &str) -> String {
        let literal = vault_name.replace('\'', "''");
        format!("resourceType eq '{KEY_VAULT_RESOURCE_TYPE}' and name eq '{literal}'")
    }
}

#[async_trait]
impl ResourceDirectoryApi for AzureResourceDirectory {
    async fn find_vault_resource_id(&self, subscription_id: &str, vault_name: &str) -> Result<String> {
        let span = info_span!("azure.resources.find_vault", vault.name = vault_name);
        let hint = format!(
            "make sure that the subscription is correct and that you have the {KEY_VAULT_READ_PERMISSION:?} permission"
        );

        async move {
            let token = bearer_token(self.credential.as_ref(), MANAGEMENT_SCOPE).await?;
            let first = self
                .http
                .get(format!("{}/subscriptions/{subscription_id}/resources", self.endpoint))
                .query(&[
                    ("$filter", Self::filter(vault_name).as_str()),
                    ("api-version", RESOURCE_MANAGER_API_VERSION),
                ]);

            let mut request = Some(first);
            let mut pages = 0usize;
            while let Some(current) = request.take() {
                pages += 1;
                let page: Page<GenericResource> = send(current, &token, "list_resources", &hint)
                    .await?
                    .json()
                    .await?;

                let next = page.next();
                if let Some(resource) = page
                    .value
                    .into_iter()
                    .find(|r| r.name.as_deref() == Some(vault_name))
                {
                    debug!(vault.id = %resource.id, pages, "Found key vault");
                    return Ok(resource.id);
                }
                request = next.map(|link| self.http.get(link));
            }

            debug!(pages, "Key vault not found in subscription");
            Err(vault_not_found(vault_name))
        }
        .instrument(span)
        .await
    }
}
