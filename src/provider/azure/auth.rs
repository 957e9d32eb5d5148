//! # Azure Authentication
//!
//! Credential selection and bearer token acquisition.

use crate::config::AppConfig;
use crate::error::{Result, SecretError};
use anyhow::Context;
use async_trait::async_trait;
use azure_core::credentials::{AccessToken, Secret, TokenCredential, TokenRequestOptions};
use azure_identity::{ManagedIdentityCredential, WorkloadIdentityCredential};
use std::sync::Arc;
use tracing::{debug, info};

/// Fixed bearer token, for mock endpoints that do not validate tokens
pub struct StaticTokenCredential {
    token: String,
}

impl StaticTokenCredential {
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

impl std::fmt::Debug for StaticTokenCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticTokenCredential").finish_non_exhaustive()
    }
}

#[async_trait]
impl TokenCredential for StaticTokenCredential {
    async fn get_token(
        &self,
        _scopes: &[&str],
        _options: Option<TokenRequestOptions<'_>>,
    ) -> azure_core::Result<AccessToken> {
        use typespec_client_core::time::{Duration, OffsetDateTime};

        Ok(AccessToken::new(
            Secret::new(self.token.clone()),
            OffsetDateTime::now_utc() + Duration::seconds(3600),
        ))
    }
}

/// Pick the credential for this process
///
/// - `access_token` set: a [`StaticTokenCredential`]
/// - `client_id` set: Workload Identity
/// - otherwise: Managed Identity
///
/// # Errors
/// Returns an error if the Azure credential cannot be constructed
pub fn build_credential(config: &AppConfig) -> anyhow::Result<Arc<dyn TokenCredential>> {
    if let Some(token) = &config.access_token {
        debug!("Using a static access token");
        return Ok(Arc::new(StaticTokenCredential::new(token.expose())));
    }

    let credential: Arc<dyn TokenCredential> = match &config.client_id {
        Some(client_id) => {
            info!(
                "Using Azure Workload Identity authentication with client ID: {}",
                client_id
            );
            let options = azure_identity::WorkloadIdentityCredentialOptions {
                client_id: Some(client_id.clone()),
                ..Default::default()
            };
            WorkloadIdentityCredential::new(Some(options))
                .context("Failed to create WorkloadIdentityCredential")?
        }
        None => {
            info!("No client ID configured, using Managed Identity");
            ManagedIdentityCredential::new(None)
                .context("Failed to create ManagedIdentityCredential")?
        }
    };
    Ok(credential)
}

/// Bearer token for `scope`
pub(super) async fn bearer_token(credential: &dyn TokenCredential, scope: &str) -> Result<String> {
    let token = credential
        .get_token(&[scope], None)
        .await
        .map_err(|e| SecretError::Upstream(format!("failed to get an access token for {scope}: {e}")))?;
    Ok(token.token.secret().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SecretValue;

    #[tokio::test]
    async fn test_static_token_credential() {
        let credential = StaticTokenCredential::new("test-token");
        let token = bearer_token(&credential, "https://vault.azure.net/.default")
            .await
            .unwrap();
        assert_eq!(token, "test-token");
        assert!(!format!("{credential:?}").contains("test-token"));
    }

    #[test]
    fn test_build_credential_prefers_static_token() {
        let config = AppConfig {
            access_token: Some(SecretValue::new("t")),
            client_id: Some("12345678-1234-1234-1234-123456789012".to_string()),
            ..AppConfig::default()
        };
        assert!(build_credential(&config).is_ok());
    }
}
