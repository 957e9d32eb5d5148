//! JSON bodies of the Key Vault and Resource Manager REST APIs.

use crate::model::{SecretAttributes, SecretProperties, Tags};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Attribute timestamps are Unix seconds on the wire
#[derive(Debug, Default, Serialize, Deserialize)]
pub(super) struct WireAttributes {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nbf: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
    #[serde(default, skip_serializing)]
    pub created: Option<i64>,
    #[serde(default, skip_serializing)]
    pub updated: Option<i64>,
}

impl From<&SecretAttributes> for WireAttributes {
    fn from(attributes: &SecretAttributes) -> Self {
        Self {
            enabled: attributes.enabled,
            nbf: attributes.not_before.map(|t| t.timestamp()),
            exp: attributes.expires.map(|t| t.timestamp()),
            created: None,
            updated: None,
        }
    }
}

impl From<WireAttributes> for SecretAttributes {
    fn from(wire: WireAttributes) -> Self {
        Self {
            enabled: wire.enabled,
            created: wire.created.and_then(from_unix),
            updated: wire.updated.and_then(from_unix),
            not_before: wire.nbf.and_then(from_unix),
            expires: wire.exp.and_then(from_unix),
        }
    }
}

fn from_unix(secs: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(secs, 0)
}

/// A secret item from a listing, or a secret bundle from set/update
///
/// Any `value` in the body is ignored.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct SecretItem {
    pub id: String,
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(default)]
    pub attributes: WireAttributes,
    #[serde(default)]
    pub tags: Option<HashMap<String, Option<String>>>,
}

impl From<SecretItem> for SecretProperties {
    fn from(item: SecretItem) -> Self {
        Self {
            id: item.id,
            content_type: item.content_type,
            attributes: item.attributes.into(),
            tags: item.tags,
        }
    }
}

/// One page of a paginated listing
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct Page<T> {
    #[serde(default = "Vec::new")]
    pub value: Vec<T>,
    #[serde(default)]
    pub next_link: Option<String>,
}

impl<T> Page<T> {
    /// Follow-up URL, `None` on the last page
    pub fn next(&self) -> Option<String> {
        self.next_link.clone().filter(|link| !link.is_empty())
    }
}

/// `PUT {vault}/secrets/{name}`
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct SetSecretRequest<'a> {
    pub value: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<&'a str>,
    pub attributes: WireAttributes,
    pub tags: &'a Tags,
}

/// `PATCH {vault}/secrets/{name}/{version}`
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct UpdateSecretRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<&'a str>,
    pub attributes: WireAttributes,
    pub tags: &'a Tags,
}

/// Generic resource from the Resource Manager listing
#[derive(Debug, Deserialize)]
pub(super) struct GenericResource {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// `code: message` from an Azure error body, when it has one
pub(super) fn error_message(body: &str) -> Option<String> {
    let ErrorBody { error } = serde_json::from_str(body).ok()?;
    match (error.code, error.message) {
        (Some(code), Some(message)) => Some(format!("{code}: {message}")),
        (None, Some(message)) => Some(message),
        (Some(code), None) => Some(code),
        (None, None) => None,
    }
}
