//! # Proposed Configuration
//!
//! What the caller asks for. Unlike state, configuration may contain the
//! write-only secret value and attributes that are not known yet.

use super::secret::{SecretResourceModel, Tags};
use super::vault::SecretAttributes;
use chrono::{DateTime, Utc};
use std::fmt;
use zeroize::Zeroizing;

/// An attribute as seen during planning
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ConfigValue<T> {
    /// Not set, or its changes are ignored by the caller
    #[default]
    Null,
    /// Set, but only resolvable at apply time
    Unknown,
    Known(T),
}

impl<T> ConfigValue<T> {
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, ConfigValue::Null)
    }

    #[must_use]
    pub fn is_unknown(&self) -> bool {
        matches!(self, ConfigValue::Unknown)
    }

    #[must_use]
    pub fn known(&self) -> Option<&T> {
        match self {
            ConfigValue::Known(value) => Some(value),
            ConfigValue::Null | ConfigValue::Unknown => None,
        }
    }
}

impl<T> From<Option<T>> for ConfigValue<T> {
    fn from(value: Option<T>) -> Self {
        value.map_or(ConfigValue::Null, ConfigValue::Known)
    }
}

/// The write-only secret value
///
/// Wiped from memory on drop and never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretValue(Zeroizing<String>);

impl SecretValue {
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(Zeroizing::new(value.into()))
    }

    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SecretValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretValue(<redacted>)")
    }
}

/// Proposed configuration of a secret resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretConfig {
    pub name: String,
    pub key_vault_id: String,
    pub content_type: String,
    pub not_before_date: Option<DateTime<Utc>>,
    pub expiration_date: Option<DateTime<Utc>>,
    pub tags: Tags,
    pub value_wo: ConfigValue<SecretValue>,
    pub value_wo_version: ConfigValue<i32>,
}

impl SecretConfig {
    #[must_use]
    pub fn new(key_vault_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            key_vault_id: key_vault_id.into(),
            content_type: String::new(),
            not_before_date: None,
            expiration_date: None,
            tags: Tags::new(),
            value_wo: ConfigValue::Null,
            value_wo_version: ConfigValue::Null,
        }
    }

    #[must_use]
    pub fn with_value(mut self, value: impl Into<String>, version: i32) -> Self {
        self.value_wo = ConfigValue::Known(SecretValue::new(value));
        self.value_wo_version = ConfigValue::Known(version);
        self
    }

    #[must_use]
    pub fn secret_attributes(&self) -> SecretAttributes {
        SecretAttributes {
            not_before: self.not_before_date,
            expires: self.expiration_date,
            ..Default::default()
        }
    }

    /// Planned state: configured attributes over the computed ones from `prior`
    #[must_use]
    pub fn planned_model(&self, prior: Option<&SecretResourceModel>) -> SecretResourceModel {
        let mut model = prior.cloned().unwrap_or_default();
        model.record.name.clone_from(&self.name);
        model.record.key_vault_id.clone_from(&self.key_vault_id);
        model.record.content_type = Some(self.content_type.clone());
        model.record.not_before_date = self.not_before_date;
        model.record.expiration_date = self.expiration_date;
        model.record.tags.clone_from(&self.tags);
        if let Some(version) = self.value_wo_version.known() {
            model.value_wo_version = *version;
        }
        model
    }
}

/// Lookup performed by the read-only data source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataSourceQuery {
    pub name: String,
    pub key_vault_id: String,
    /// Specific version, latest when absent or empty
    pub version: Option<String>,
}

/// Import entry points
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportRequest {
    /// Structured `{name, key_vault_id}` identity
    Identity(super::secret::SecretIdentity),
    /// Legacy composite ID, i.e. a secret URI
    LegacyId(String),
}
