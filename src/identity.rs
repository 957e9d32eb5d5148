//! # Identity Codec
//!
//! Parses and derives vault names, secret names and identifiers from strings.
//!
//! Two namespaces are involved:
//! - data-plane URIs minted by the vault:
//!   `https://{vault}.vault.azure.net/secrets/{name}/{version}`. Legacy IDs
//!   may use any DNS suffix, only the first host label names the vault.
//! - Resource Manager IDs of the vault itself:
//!   `/subscriptions/{s}/resourceGroups/{g}/providers/Microsoft.KeyVault/vaults/{vault}`

use crate::constants::KEY_VAULT_DNS_SUFFIX;
use crate::error::{Result, SecretError};
use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

static KEY_VAULT_ID_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\A/subscriptions/[^/]+/resourceGroups/[^/]+/providers/Microsoft\.KeyVault/vaults/([^/]+)\z",
    )
    .expect("KEY_VAULT_ID_REGEX is a valid pattern")
});

static SECRET_NAME_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\A[0-9a-zA-Z-]{1,127}\z").expect("SECRET_NAME_REGEX is a valid pattern")
});

static SECRET_URI_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\Ahttps://([^/.]+)\.[^/]+/secrets/([^/]+)")
        .expect("SECRET_URI_REGEX is a valid pattern")
});

/// Extract the vault name from a vault resource ID
///
/// # Errors
/// Returns `InvalidIdentifier` if the ID is not a Key Vault resource ID
pub fn derive_vault_name(key_vault_id: &str) -> Result<String> {
    KEY_VAULT_ID_REGEX
        .captures(key_vault_id)
        .map(|caps| caps[1].to_string())
        .ok_or_else(|| {
            SecretError::InvalidIdentifier(format!(
                "invalid key vault ID: {key_vault_id:?} doesn't match {:?}",
                KEY_VAULT_ID_REGEX.as_str()
            ))
        })
}

/// Extract `(vault_name, secret_name)` from a secret URI
///
/// Anything after the secret name (typically the version) is ignored.
///
/// # Errors
/// Returns `InvalidIdentifier` if the URI is not a secret URI
pub fn derive_vault_and_secret_name(id: &str) -> Result<(String, String)> {
    let (vault_name, name) = SECRET_URI_REGEX
        .captures(id)
        .map(|caps| (caps[1].to_string(), caps[2].to_string()))
        .ok_or_else(|| {
            SecretError::InvalidIdentifier(format!(
                "invalid ID: {id:?} doesn't match {:?}",
                SECRET_URI_REGEX.as_str()
            ))
        })?;
    validate_secret_name(&name)?;
    Ok((vault_name, name))
}

/// Secret names are 1-127 alphanumerics and dashes
///
/// # Errors
/// Returns `InvalidIdentifier` for any other name, including an empty one
pub fn validate_secret_name(name: &str) -> Result<()> {
    if SECRET_NAME_REGEX.is_match(name) {
        Ok(())
    } else {
        Err(SecretError::InvalidIdentifier(format!(
            "invalid secret name: {name:?} doesn't match {:?}",
            SECRET_NAME_REGEX.as_str()
        )))
    }
}

/// Reject a malformed `key_vault_id` before anything touches the network
///
/// # Errors
/// Returns `InvalidIdentifier` if the ID is not a Key Vault resource ID
pub fn validate_key_vault_id(key_vault_id: &str) -> Result<()> {
    derive_vault_name(key_vault_id).map(|_| ())
}

/// Validate a `{name, key_vault_id}` pair before any request is built
///
/// # Errors
/// Returns `InvalidIdentifier` if either part is malformed
pub fn validate_identity(key_vault_id: &str, name: &str) -> Result<()> {
    validate_key_vault_id(key_vault_id)?;
    validate_secret_name(name)
}

/// Data-plane base URL for a vault, with trailing slash
#[must_use]
pub fn vault_url(vault_name: &str) -> String {
    format!("https://{vault_name}.{KEY_VAULT_DNS_SUFFIX}/")
}

/// A secret URI returned by the vault, split into its parts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretId {
    raw: String,
    vault_url: String,
    name: String,
    version: String,
}

impl SecretId {
    /// Parse `{vault_url}/secrets/{name}[/{version}]`
    ///
    /// # Errors
    /// Returns `InvalidIdentifier` when there is no `/secrets/{name}` segment
    pub fn parse(raw: &str) -> Result<Self> {
        let invalid = || SecretError::InvalidIdentifier(format!("invalid secret ID: {raw:?}"));

        let (vault_url, rest) = raw.split_once("/secrets/").ok_or_else(invalid)?;
        let mut segments = rest.split('/');
        let name = segments.next().filter(|s| !s.is_empty()).ok_or_else(invalid)?;
        let version = segments.next().unwrap_or_default();

        Ok(Self {
            raw: raw.to_string(),
            vault_url: format!("{vault_url}/"),
            name: name.to_string(),
            version: version.to_string(),
        })
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    #[must_use]
    pub fn vault_url(&self) -> &str {
        &self.vault_url
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Version segment, empty for a versionless URI
    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }

    /// The URI with its trailing `/{version}` removed
    #[must_use]
    pub fn versionless(&self) -> String {
        self.raw
            .strip_suffix(&format!("/{}", self.version))
            .unwrap_or(&self.raw)
            .to_string()
    }
}

impl fmt::Display for SecretId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Resource-scoped versionless ID: `{key_vault_id}/secrets/{name}`
#[must_use]
pub fn resource_versionless_id(key_vault_id: &str, name: &str) -> String {
    format!("{key_vault_id}/secrets/{name}")
}

/// Resource-scoped versioned ID: `{key_vault_id}/secrets/{name}/versions/{version}`
#[must_use]
pub fn resource_id(key_vault_id: &str, name: &str, version: &str) -> String {
    format!(
        "{}/versions/{version}",
        resource_versionless_id(key_vault_id, name)
    )
}
