//! # Vault Shapes
//!
//! Request and response shapes of the Vault Secrets API collaborator.

use super::config::SecretValue;
use super::secret::Tags;
use crate::error::Result;
use crate::identity::SecretId;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// Validity window and bookkeeping timestamps of a secret version
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SecretAttributes {
    pub enabled: Option<bool>,
    pub created: Option<DateTime<Utc>>,
    pub updated: Option<DateTime<Utc>>,
    pub not_before: Option<DateTime<Utc>>,
    pub expires: Option<DateTime<Utc>>,
}

/// Properties of one secret version, without its value
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SecretProperties {
    /// Versioned secret URI minted by the vault
    pub id: String,
    pub content_type: Option<String>,
    pub attributes: SecretAttributes,
    /// Tag values may come back as `null` on the wire
    pub tags: Option<HashMap<String, Option<String>>>,
}

impl SecretProperties {
    /// # Errors
    /// Returns `InvalidIdentifier` if `id` is not a secret URI
    pub fn secret_id(&self) -> Result<SecretId> {
        SecretId::parse(&self.id)
    }

    /// Version segment of `id`, empty if `id` is malformed
    #[must_use]
    pub fn version(&self) -> String {
        self.secret_id()
            .map(|id| id.version().to_string())
            .unwrap_or_default()
    }
}

/// Mints a new version
#[derive(Debug, Clone)]
pub struct SetSecretParameters {
    pub value: SecretValue,
    pub content_type: Option<String>,
    pub attributes: SecretAttributes,
    pub tags: Tags,
}

/// Updates metadata of an existing version
#[derive(Debug, Clone, Default)]
pub struct UpdateSecretPropertiesParameters {
    pub content_type: Option<String>,
    pub attributes: SecretAttributes,
    pub tags: Tags,
}
