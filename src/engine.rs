//! # Reconciliation Engine
//!
//! Applies create, read, update, delete and import against the vault.
//!
//! The engine owns the mint-versus-metadata decision:
//! - create always mints a version
//! - update mints only when `value_wo_version` changed, otherwise it patches
//!   the metadata of the version recorded in state
//!
//! Prior state is only ever borrowed. A failed operation returns an error and
//! no state, so the caller keeps what it had.

use crate::constants::IMPORTED_ROTATION_COUNTER;
use crate::error::{Result, SecretError};
use crate::identity::{derive_vault_and_secret_name, validate_identity};
use crate::model::{
    ConfigValue, DataSourceQuery, ImportRequest, SecretConfig, SecretIdentity, SecretProperties,
    SecretRecord, SecretResourceModel, SecretValue, SetSecretParameters,
    UpdateSecretPropertiesParameters,
};
use crate::observability::metrics;
use crate::provider::{ResourceDirectoryApi, VaultSecretsApi};
use crate::record::set_secret_data;
use crate::resolver;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, field, info, info_span, warn, Instrument};

/// New state plus the identity to record alongside it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Applied {
    pub state: SecretResourceModel,
    pub identity: SecretIdentity,
}

impl Applied {
    fn new(state: SecretResourceModel) -> Self {
        let identity = state.identity();
        Self { state, identity }
    }
}

/// Drives the secret lifecycle through the collaborators
pub struct SecretReconciler {
    secrets: Arc<dyn VaultSecretsApi>,
    directory: Arc<dyn ResourceDirectoryApi>,
    subscription_id: Option<String>,
}

impl std::fmt::Debug for SecretReconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretReconciler")
            .field("subscription_id", &self.subscription_id)
            .finish_non_exhaustive()
    }
}

impl SecretReconciler {
    pub fn new(
        secrets: Arc<dyn VaultSecretsApi>,
        directory: Arc<dyn ResourceDirectoryApi>,
        subscription_id: Option<String>,
    ) -> Self {
        Self {
            secrets,
            directory,
            subscription_id: subscription_id.filter(|s| !s.is_empty()),
        }
    }

    #[must_use]
    pub fn subscription_id(&self) -> Option<&str> {
        self.subscription_id.as_deref()
    }

    /// Mint the first version of a secret
    ///
    /// # Errors
    /// - `InvalidIdentifier` for a malformed `key_vault_id` or secret name
    /// - `MissingConfiguration` when the value or its counter is not known
    /// - collaborator errors from setting the secret
    pub async fn create(&self, config: &SecretConfig) -> Result<Applied> {
        let span = info_span!(
            "azurekv.secret.create",
            secret.name = %config.name,
            vault.id = %config.key_vault_id,
            resource_id = field::Empty,
        );
        let span_clone = span.clone();
        let start = Instant::now();

        let result: Result<Applied> = async move {
            validate_identity(&config.key_vault_id, &config.name)?;
            let value = known_value(config)?;
            if config.value_wo_version.known().is_none() {
                return Err(SecretError::MissingConfiguration(
                    "value_wo_version must be known when creating a secret".to_string(),
                ));
            }

            let properties = self.mint(config, value).await?;
            let mut state = config.planned_model(None);
            set_secret_data(&mut state, &properties)?;

            span_clone.record("resource_id", state.record.id.as_str());
            info!(version = %state.record.version, "Created secret");
            Ok(Applied::new(state))
        }
        .instrument(span)
        .await;

        finish("create", start, result)
    }

    /// Refresh state from the latest version
    ///
    /// # Errors
    /// - `NotFound` when the secret no longer exists
    /// - collaborator errors from listing versions
    pub async fn read(&self, prior: &SecretResourceModel) -> Result<Applied> {
        let span = info_span!("azurekv.secret.read", resource_id = %prior.record.id);
        let start = Instant::now();

        let result: Result<Applied> = async move {
            validate_identity(&prior.record.key_vault_id, &prior.record.name)?;
            let properties = self
                .latest(&prior.record.key_vault_id, &prior.record.name)
                .await?;
            let mut state = prior.clone();
            set_secret_data(&mut state, &properties)?;

            if state.record.version != prior.record.version {
                debug!(
                    previous = %prior.record.version,
                    current = %state.record.version,
                    "Secret has a newer version than state"
                );
            }
            Ok(Applied::new(state))
        }
        .instrument(span)
        .await;

        finish("read", start, result)
    }

    /// Mint a new version or patch metadata, depending on the counter
    ///
    /// A `Null` counter means the caller ignores value changes, so only
    /// metadata is updated.
    ///
    /// # Errors
    /// - `InvalidIdentifier` when `name` or `key_vault_id` differ from state
    /// - `MissingConfiguration` when rotating without a known value, or with
    ///   an unknown counter
    /// - collaborator errors
    pub async fn update(
        &self,
        prior: &SecretResourceModel,
        config: &SecretConfig,
    ) -> Result<SecretResourceModel> {
        let span = info_span!(
            "azurekv.secret.update",
            resource_id = %prior.record.id,
            operation.type = field::Empty,
        );
        let span_clone = span.clone();
        let start = Instant::now();

        let result: Result<SecretResourceModel> = async move {
            validate_identity(&config.key_vault_id, &config.name)?;
            if config.name != prior.record.name || config.key_vault_id != prior.record.key_vault_id {
                return Err(SecretError::InvalidIdentifier(format!(
                    "name and key_vault_id cannot change in place (state has {:?} in {:?}); delete and recreate the secret",
                    prior.record.name, prior.record.key_vault_id
                )));
            }

            let rotate = match &config.value_wo_version {
                ConfigValue::Null => false,
                ConfigValue::Known(counter) => *counter != prior.value_wo_version,
                ConfigValue::Unknown => {
                    return Err(SecretError::MissingConfiguration(
                        "value_wo_version must be known when updating a secret".to_string(),
                    ))
                }
            };

            let properties = if rotate {
                span_clone.record("operation.type", "rotate");
                let value = known_value(config)?;
                let properties = self.mint(config, value).await?;
                info!(
                    from = prior.value_wo_version,
                    to = ?config.value_wo_version.known(),
                    version = %properties.version(),
                    "Rotated secret value"
                );
                properties
            } else {
                span_clone.record("operation.type", "metadata");
                let properties = self.patch_metadata(prior, config).await?;
                metrics::increment_metadata_updates();
                info!(version = %prior.record.version, "Updated secret metadata");
                properties
            };

            let mut state = config.planned_model(Some(prior));
            set_secret_data(&mut state, &properties)?;
            Ok(state)
        }
        .instrument(span)
        .await;

        finish("update", start, result)
    }

    /// Delete the secret and every version of it
    ///
    /// # Errors
    /// Collaborator errors, including `NotFound` if it is already gone
    pub async fn delete(&self, prior: &SecretResourceModel) -> Result<()> {
        let span = info_span!("azurekv.secret.delete", resource_id = %prior.record.id);
        let start = Instant::now();

        let result: Result<()> = async move {
            validate_identity(&prior.record.key_vault_id, &prior.record.name)?;
            self.secrets
                .delete_secret(&prior.record.key_vault_id, &prior.record.name)
                .await?;
            info!(secret.name = %prior.record.name, "Deleted secret");
            Ok(())
        }
        .instrument(span)
        .await;

        finish("delete", start, result)
    }

    /// Adopt an existing secret into state
    ///
    /// The counter is pinned to `1` in both modes since the caller's real
    /// counter cannot be recovered from the vault.
    ///
    /// # Errors
    /// - `MissingConfiguration` for a legacy ID without a subscription
    /// - `InvalidIdentifier` for a malformed ID
    /// - `NotFound` when the vault or the secret does not exist
    pub async fn import(&self, request: &ImportRequest) -> Result<SecretResourceModel> {
        let span = info_span!("azurekv.secret.import", resource_id = field::Empty);
        let span_clone = span.clone();
        let start = Instant::now();

        let result: Result<SecretResourceModel> = async move {
            let identity = match request {
                ImportRequest::Identity(identity) => {
                    validate_identity(&identity.key_vault_id, &identity.name)?;
                    identity.clone()
                }
                ImportRequest::LegacyId(id) => {
                    span_clone.record("resource_id", id.as_str());
                    self.identity_from_legacy_id(id).await?
                }
            };

            let properties = self.latest(&identity.key_vault_id, &identity.name).await?;
            let mut state = SecretResourceModel {
                record: SecretRecord::new(identity.key_vault_id, identity.name),
                value_wo_version: IMPORTED_ROTATION_COUNTER,
            };
            set_secret_data(&mut state, &properties)?;

            span_clone.record("resource_id", state.record.id.as_str());
            info!(version = %state.record.version, "Imported secret");
            Ok(state)
        }
        .instrument(span)
        .await;

        finish("import", start, result)
    }

    /// Read-only lookup of a specific or the latest version
    ///
    /// # Errors
    /// - `InvalidIdentifier` for a malformed `key_vault_id` or secret name
    /// - `NotFound` when no version matches
    pub async fn read_data_source(&self, query: &DataSourceQuery) -> Result<SecretRecord> {
        let span = tracing::debug_span!(
            "azurekv.secret.data",
            secret.name = %query.name,
            vault.id = %query.key_vault_id,
            resource_id = field::Empty,
        );
        let span_clone = span.clone();
        let start = Instant::now();

        let result: Result<SecretRecord> = async move {
            validate_identity(&query.key_vault_id, &query.name)?;
            let properties = resolver::resolve(
                self.secrets.as_ref(),
                &query.key_vault_id,
                &query.name,
                query.version.as_deref(),
            )
            .await?;

            let mut record = SecretRecord::new(query.key_vault_id.clone(), query.name.clone());
            set_secret_data(&mut record, &properties)?;
            span_clone.record("resource_id", record.id.as_str());
            Ok(record)
        }
        .instrument(span)
        .await;

        finish("data_source", start, result)
    }

    async fn identity_from_legacy_id(&self, id: &str) -> Result<SecretIdentity> {
        let subscription_id = self.subscription_id.as_deref().ok_or_else(|| {
            SecretError::MissingConfiguration(
                "subscription ID is required to import a secret".to_string(),
            )
        })?;
        let (vault_name, name) = derive_vault_and_secret_name(id)?;
        let key_vault_id = self
            .directory
            .find_vault_resource_id(subscription_id, &vault_name)
            .await?;
        debug!(vault.name = %vault_name, vault.id = %key_vault_id, "Resolved key vault");

        Ok(SecretIdentity { name, key_vault_id })
    }

    async fn latest(&self, key_vault_id: &str, name: &str) -> Result<SecretProperties> {
        resolver::resolve(self.secrets.as_ref(), key_vault_id, name, None).await
    }

    async fn mint(&self, config: &SecretConfig, value: &SecretValue) -> Result<SecretProperties> {
        let parameters = SetSecretParameters {
            value: value.clone(),
            content_type: Some(config.content_type.clone()),
            attributes: config.secret_attributes(),
            tags: config.tags.clone(),
        };
        let properties = self
            .secrets
            .set_secret(&config.key_vault_id, &config.name, parameters)
            .await?;
        metrics::increment_versions_minted();
        Ok(properties)
    }

    async fn patch_metadata(
        &self,
        prior: &SecretResourceModel,
        config: &SecretConfig,
    ) -> Result<SecretProperties> {
        let parameters = UpdateSecretPropertiesParameters {
            content_type: Some(config.content_type.clone()),
            attributes: config.secret_attributes(),
            tags: config.tags.clone(),
        };
        self.secrets
            .update_secret_properties(
                &prior.record.key_vault_id,
                &prior.record.name,
                &prior.record.version,
                parameters,
            )
            .await
    }
}

fn known_value(config: &SecretConfig) -> Result<&SecretValue> {
    config.value_wo.known().ok_or_else(|| {
        SecretError::MissingConfiguration("value_wo must be known when setting a secret".to_string())
    })
}

fn finish<T>(operation: &'static str, start: Instant, result: Result<T>) -> Result<T> {
    metrics::record_operation(operation, start.elapsed().as_secs_f64());
    if let Err(e) = &result {
        metrics::increment_operation_errors(operation, e.kind());
        warn!(operation, error.kind = e.kind(), error.message = %e, "Secret operation failed");
    }
    result
}
