//! # In-Memory Vault
//!
//! Versioned, process-local implementation of both collaborator contracts.
//!
//! Behaves like a real vault where it matters to the reconciler:
//! - every `set_secret` mints a fresh opaque version ID
//! - `created` timestamps are strictly increasing per vault
//! - listings are paginated
//! - unknown secrets, versions and vaults are `NotFound`
//!
//! Data lives in process memory. [`InMemoryVault::load`] and
//! [`InMemoryVault::save`] carry it between CLI runs through a JSON file,
//! which holds secret values in plain text.

use super::{vault_not_found, ResourceDirectoryApi, VaultSecretsApi, VersionPages};
use crate::error::{Result, SecretError};
use crate::identity::{self, derive_vault_name};
use crate::model::{
    SecretAttributes, SecretProperties, SecretValue, SetSecretParameters, Tags,
    UpdateSecretPropertiesParameters,
};
use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use futures::stream;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

const DEFAULT_PAGE_SIZE: usize = 25;

#[derive(Debug, Clone)]
struct StoredVersion {
    version: String,
    value: SecretValue,
    content_type: Option<String>,
    attributes: SecretAttributes,
    tags: Tags,
}

#[derive(Debug, Default)]
struct State {
    /// `(vault name, secret name)` to versions, oldest first
    secrets: HashMap<(String, String), Vec<StoredVersion>>,
    /// `(subscription ID, vault resource ID)` known to the directory
    vaults: Vec<(String, String)>,
    last_created: Option<DateTime<Utc>>,
}

/// File form of the vault
#[derive(Debug, Default, Serialize, Deserialize)]
struct Snapshot {
    #[serde(default)]
    vaults: Vec<VaultEntry>,
    #[serde(default)]
    secrets: Vec<SecretEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
struct VaultEntry {
    subscription_id: String,
    key_vault_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct SecretEntry {
    vault: String,
    name: String,
    versions: Vec<VersionEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
struct VersionEntry {
    version: String,
    value: String,
    #[serde(default)]
    content_type: Option<String>,
    #[serde(default)]
    enabled: Option<bool>,
    #[serde(default)]
    created: Option<DateTime<Utc>>,
    #[serde(default)]
    updated: Option<DateTime<Utc>>,
    #[serde(default)]
    not_before: Option<DateTime<Utc>>,
    #[serde(default)]
    expires: Option<DateTime<Utc>>,
    #[serde(default)]
    tags: Tags,
}

impl From<&StoredVersion> for VersionEntry {
    fn from(stored: &StoredVersion) -> Self {
        Self {
            version: stored.version.clone(),
            value: stored.value.expose().to_string(),
            content_type: stored.content_type.clone(),
            enabled: stored.attributes.enabled,
            created: stored.attributes.created,
            updated: stored.attributes.updated,
            not_before: stored.attributes.not_before,
            expires: stored.attributes.expires,
            tags: stored.tags.clone(),
        }
    }
}

impl From<VersionEntry> for StoredVersion {
    fn from(entry: VersionEntry) -> Self {
        Self {
            version: entry.version,
            value: SecretValue::new(entry.value),
            content_type: entry.content_type,
            attributes: SecretAttributes {
                enabled: entry.enabled,
                created: entry.created,
                updated: entry.updated,
                not_before: entry.not_before,
                expires: entry.expires,
            },
            tags: entry.tags,
        }
    }
}

/// In-memory vault and resource directory
#[derive(Debug)]
pub struct InMemoryVault {
    state: Mutex<State>,
    page_size: usize,
}

impl Default for InMemoryVault {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryVault {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Use smaller pages to exercise pagination
    #[must_use]
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Make `key_vault_id` discoverable in `subscription_id`
    #[must_use]
    pub fn with_vault(self, subscription_id: &str, key_vault_id: &str) -> Self {
        {
            let mut state = self.lock();
            if !state.vaults.iter().any(|(_, id)| id == key_vault_id) {
                state
                    .vaults
                    .push((subscription_id.to_string(), key_vault_id.to_string()));
            }
        }
        self
    }

    /// Load a vault saved by [`InMemoryVault::save`]; a missing file is an empty vault
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "No vault file yet, starting empty");
            return Ok(Self::new());
        }
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read vault file {}", path.display()))?;
        let snapshot: Snapshot = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse vault file {}", path.display()))?;

        let vault = Self::new();
        {
            let mut state = vault.lock();
            state.vaults = snapshot
                .vaults
                .into_iter()
                .map(|v| (v.subscription_id, v.key_vault_id))
                .collect();
            for entry in snapshot.secrets {
                let versions: Vec<StoredVersion> =
                    entry.versions.into_iter().map(StoredVersion::from).collect();
                let newest = versions
                    .iter()
                    .filter_map(|v| v.attributes.created.max(v.attributes.updated))
                    .max();
                state.last_created = state.last_created.max(newest);
                state.secrets.insert((entry.vault, entry.name), versions);
            }
            info!(
                path = %path.display(),
                secrets = state.secrets.len(),
                "Loaded in-memory vault"
            );
        }
        Ok(vault)
    }

    /// Write every vault, secret and version to `path` as JSON
    ///
    /// # Errors
    /// Returns an error if the file cannot be written
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let snapshot = {
            let state = self.lock();
            let mut secrets: Vec<SecretEntry> = state
                .secrets
                .iter()
                .map(|((vault, name), versions)| SecretEntry {
                    vault: vault.clone(),
                    name: name.clone(),
                    versions: versions.iter().map(VersionEntry::from).collect(),
                })
                .collect();
            secrets.sort_by(|a, b| (&a.vault, &a.name).cmp(&(&b.vault, &b.name)));
            Snapshot {
                vaults: state
                    .vaults
                    .iter()
                    .map(|(subscription_id, key_vault_id)| VaultEntry {
                        subscription_id: subscription_id.clone(),
                        key_vault_id: key_vault_id.clone(),
                    })
                    .collect(),
                secrets,
            }
        };
        let raw = serde_json::to_string_pretty(&snapshot)?;
        std::fs::write(path, raw)
            .with_context(|| format!("Failed to write vault file {}", path.display()))?;
        debug!(path = %path.display(), "Saved in-memory vault");
        Ok(())
    }

    /// Current value of the latest version, if any
    #[must_use]
    pub fn latest_value(&self, key_vault_id: &str, name: &str) -> Option<String> {
        let vault_name = derive_vault_name(key_vault_id).ok()?;
        self.lock()
            .secrets
            .get(&(vault_name, name.to_string()))
            .and_then(|versions| versions.last())
            .map(|v| v.value.expose().to_string())
    }

    /// Number of versions stored for a secret
    #[must_use]
    pub fn version_count(&self, key_vault_id: &str, name: &str) -> usize {
        let Ok(vault_name) = derive_vault_name(key_vault_id) else {
            return 0;
        };
        self.lock()
            .secrets
            .get(&(vault_name, name.to_string()))
            .map_or(0, Vec::len)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        // A poisoned lock only means another test thread panicked
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn secret_key(key_vault_id: &str, name: &str) -> Result<(String, String)> {
        Ok((derive_vault_name(key_vault_id)?, name.to_string()))
    }
}

impl State {
    /// A vault holding secrets is visible to the directory of its subscription
    fn register_vault(&mut self, key_vault_id: &str) {
        let Some(subscription_id) = key_vault_id
            .strip_prefix("/subscriptions/")
            .and_then(|rest| rest.split('/').next())
        else {
            return;
        };
        if !self.vaults.iter().any(|(_, id)| id == key_vault_id) {
            self.vaults
                .push((subscription_id.to_string(), key_vault_id.to_string()));
        }
    }

    /// Strictly increasing creation clock
    fn next_created(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        let created = match self.last_created {
            Some(last) if now <= last => last + Duration::milliseconds(1),
            _ => now,
        };
        self.last_created = Some(created);
        created
    }
}

fn to_properties(vault_name: &str, name: &str, stored: &StoredVersion) -> SecretProperties {
    SecretProperties {
        id: format!(
            "{}secrets/{name}/{}",
            identity::vault_url(vault_name),
            stored.version
        ),
        content_type: stored.content_type.clone(),
        attributes: stored.attributes.clone(),
        tags: Some(
            stored
                .tags
                .iter()
                .map(|(k, v)| (k.clone(), Some(v.clone())))
                .collect(),
        ),
    }
}

fn secret_not_found(name: &str, vault_name: &str) -> SecretError {
    SecretError::not_found(
        format!("secret {name:?} not found in vault {vault_name:?}"),
        "make sure that the secret exists",
    )
}

#[async_trait]
impl VaultSecretsApi for InMemoryVault {
    fn list_secret_versions<'a>(&'a self, key_vault_id: &'a str, name: &'a str) -> VersionPages<'a> {
        let pages: Vec<Result<Vec<SecretProperties>>> = match Self::secret_key(key_vault_id, name) {
            Err(e) => vec![Err(e)],
            Ok(key) => match self.lock().secrets.get(&key) {
                None => vec![Err(secret_not_found(name, &key.0))],
                Some(versions) => versions
                    .chunks(self.page_size)
                    .map(|chunk| {
                        Ok(chunk
                            .iter()
                            .map(|v| to_properties(&key.0, name, v))
                            .collect())
                    })
                    .collect(),
            },
        };
        debug!(secret_name = name, pages = pages.len(), "Listing in-memory secret versions");
        Box::pin(stream::iter(pages))
    }

    async fn set_secret(
        &self,
        key_vault_id: &str,
        name: &str,
        parameters: SetSecretParameters,
    ) -> Result<SecretProperties> {
        let key = Self::secret_key(key_vault_id, name)?;
        let mut state = self.lock();
        let created = state.next_created();

        let stored = StoredVersion {
            version: Uuid::new_v4().simple().to_string(),
            value: parameters.value,
            content_type: parameters.content_type,
            attributes: SecretAttributes {
                enabled: Some(true),
                created: Some(created),
                updated: Some(created),
                not_before: parameters.attributes.not_before,
                expires: parameters.attributes.expires,
            },
            tags: parameters.tags,
        };
        let properties = to_properties(&key.0, name, &stored);
        info!(secret_name = name, version = %stored.version, "Added in-memory secret version");
        state.secrets.entry(key).or_default().push(stored);
        state.register_vault(key_vault_id);
        Ok(properties)
    }

    async fn update_secret_properties(
        &self,
        key_vault_id: &str,
        name: &str,
        version: &str,
        parameters: UpdateSecretPropertiesParameters,
    ) -> Result<SecretProperties> {
        let key = Self::secret_key(key_vault_id, name)?;
        let mut state = self.lock();
        let updated = state.next_created();

        let stored = state
            .secrets
            .get_mut(&key)
            .and_then(|versions| versions.iter_mut().find(|v| v.version == version))
            .ok_or_else(|| {
                SecretError::not_found(
                    format!("version {version:?} of secret {name:?} not found in vault {:?}", key.0),
                    "make sure that the version exists",
                )
            })?;

        // Omitted fields keep their current value, tags are replaced
        if let Some(content_type) = parameters.content_type {
            stored.content_type = Some(content_type);
        }
        if let Some(not_before) = parameters.attributes.not_before {
            stored.attributes.not_before = Some(not_before);
        }
        if let Some(expires) = parameters.attributes.expires {
            stored.attributes.expires = Some(expires);
        }
        stored.tags = parameters.tags;
        stored.attributes.updated = Some(updated);

        Ok(to_properties(&key.0, name, stored))
    }

    async fn delete_secret(&self, key_vault_id: &str, name: &str) -> Result<()> {
        let key = Self::secret_key(key_vault_id, name)?;
        match self.lock().secrets.remove(&key) {
            Some(versions) => {
                info!(secret_name = name, versions = versions.len(), "Deleted in-memory secret");
                Ok(())
            }
            None => Err(secret_not_found(name, &key.0)),
        }
    }
}

#[async_trait]
impl ResourceDirectoryApi for InMemoryVault {
    async fn find_vault_resource_id(&self, subscription_id: &str, vault_name: &str) -> Result<String> {
        self.lock()
            .vaults
            .iter()
            .filter(|(subscription, _)| subscription == subscription_id)
            .map(|(_, id)| id)
            .find(|id| derive_vault_name(id).is_ok_and(|name| name == vault_name))
            .cloned()
            .ok_or_else(|| vault_not_found(vault_name))
    }
}
