//! # Secret State
//!
//! Persisted record shapes. Neither shape has a field for the secret value.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Tag mapping as persisted in state
pub type Tags = BTreeMap<String, String>;

/// Setters the record builder needs, shared by the resource and data-source shapes
pub trait SecretModel {
    fn key_vault_id(&self) -> &str;
    fn set_id(&mut self, id: String);
    fn set_versionless_id(&mut self, id: String);
    fn set_version(&mut self, version: String);
    fn set_resource_versionless_id(&mut self, id: String);
    fn set_resource_id(&mut self, id: String);
    fn set_content_type(&mut self, content_type: String);
    fn set_not_before_date(&mut self, date: DateTime<Utc>);
    fn set_expiration_date(&mut self, date: DateTime<Utc>);
    fn set_tags(&mut self, tags: Tags);
}

/// One logical secret within one vault
///
/// This is also the data-source shape: `version` may be set by the caller to
/// ask for a specific version.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretRecord {
    pub name: String,
    pub key_vault_id: String,
    /// Versioned secret URI
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub versionless_id: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub resource_id: String,
    #[serde(default)]
    pub resource_versionless_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub not_before_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiration_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub tags: Tags,
}

impl SecretRecord {
    #[must_use]
    pub fn new(key_vault_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            key_vault_id: key_vault_id.into(),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn identity(&self) -> SecretIdentity {
        SecretIdentity {
            name: self.name.clone(),
            key_vault_id: self.key_vault_id.clone(),
        }
    }
}

impl SecretModel for SecretRecord {
    fn key_vault_id(&self) -> &str {
        &self.key_vault_id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn set_versionless_id(&mut self, id: String) {
        self.versionless_id = id;
    }

    fn set_version(&mut self, version: String) {
        self.version = version;
    }

    fn set_resource_versionless_id(&mut self, id: String) {
        self.resource_versionless_id = id;
    }

    fn set_resource_id(&mut self, id: String) {
        self.resource_id = id;
    }

    fn set_content_type(&mut self, content_type: String) {
        self.content_type = Some(content_type);
    }

    fn set_not_before_date(&mut self, date: DateTime<Utc>) {
        self.not_before_date = Some(date);
    }

    fn set_expiration_date(&mut self, date: DateTime<Utc>) {
        self.expiration_date = Some(date);
    }

    fn set_tags(&mut self, tags: Tags) {
        self.tags = tags;
    }
}

/// Resource state: the record plus the caller's rotation counter
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretResourceModel {
    #[serde(flatten)]
    pub record: SecretRecord,
    /// Bumped by the caller to request a new version of the value
    pub value_wo_version: i32,
}

impl SecretResourceModel {
    #[must_use]
    pub fn identity(&self) -> SecretIdentity {
        self.record.identity()
    }
}

impl SecretModel for SecretResourceModel {
    fn key_vault_id(&self) -> &str {
        self.record.key_vault_id()
    }

    fn set_id(&mut self, id: String) {
        self.record.set_id(id);
    }

    fn set_versionless_id(&mut self, id: String) {
        self.record.set_versionless_id(id);
    }

    fn set_version(&mut self, version: String) {
        self.record.set_version(version);
    }

    fn set_resource_versionless_id(&mut self, id: String) {
        self.record.set_resource_versionless_id(id);
    }

    fn set_resource_id(&mut self, id: String) {
        self.record.set_resource_id(id);
    }

    fn set_content_type(&mut self, content_type: String) {
        self.record.set_content_type(content_type);
    }

    fn set_not_before_date(&mut self, date: DateTime<Utc>) {
        self.record.set_not_before_date(date);
    }

    fn set_expiration_date(&mut self, date: DateTime<Utc>) {
        self.record.set_expiration_date(date);
    }

    fn set_tags(&mut self, tags: Tags) {
        self.record.set_tags(tags);
    }
}

/// Structured import identity, also emitted after create and read
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretIdentity {
    pub name: String,
    pub key_vault_id: String,
}
