//! # Secret Record Builder
//!
//! Fills any [`SecretModel`] from properties returned by the vault.

use crate::error::{Result, SecretError};
use crate::identity;
use crate::model::{SecretModel, SecretProperties, Tags};

/// Copy vault properties into `model`, deriving every identifier
///
/// Content type, validity dates and tags are only overwritten when the vault
/// returned them, so an unset content type stays distinct from an empty one.
///
/// # Errors
/// - `InvalidIdentifier` if the vault returned a malformed secret URI
/// - `Serialization` if a tag value cannot be represented as a string
pub fn set_secret_data<M>(model: &mut M, properties: &SecretProperties) -> Result<()>
where
    M: SecretModel + ?Sized,
{
    let id = properties.secret_id()?;
    let tags = properties.tags.as_ref().map(convert_tags).transpose()?;

    model.set_id(id.as_str().to_string());
    model.set_versionless_id(id.versionless());
    model.set_version(id.version().to_string());

    let key_vault_id = model.key_vault_id().to_string();
    model.set_resource_versionless_id(identity::resource_versionless_id(&key_vault_id, id.name()));
    model.set_resource_id(identity::resource_id(&key_vault_id, id.name(), id.version()));

    if let Some(content_type) = &properties.content_type {
        model.set_content_type(content_type.clone());
    }

    // DateTime<Utc> is already normalised to UTC
    if let Some(not_before) = properties.attributes.not_before {
        model.set_not_before_date(not_before);
    }
    if let Some(expires) = properties.attributes.expires {
        model.set_expiration_date(expires);
    }

    if let Some(tags) = tags {
        model.set_tags(tags);
    }

    Ok(())
}

fn convert_tags(tags: &std::collections::HashMap<String, Option<String>>) -> Result<Tags> {
    tags.iter()
        .map(|(key, value)| {
            value
                .clone()
                .map(|value| (key.clone(), value))
                .ok_or_else(|| {
                    SecretError::Serialization(format!(
                        "tag {key:?} has a null value and cannot be stored as a string"
                    ))
                })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{SecretAttributes, SecretRecord, SecretResourceModel};
    use chrono::{TimeZone, Utc};
    use std::collections::HashMap;

    const VAULT_ID: &str =
        "/subscriptions/0000/resourceGroups/rg/providers/Microsoft.KeyVault/vaults/myvault";

    fn properties() -> SecretProperties {
        SecretProperties {
            id: "https://myvault.vault.azure.net/secrets/s1/abcd".to_string(),
            content_type: Some("text/plain".to_string()),
            attributes: SecretAttributes {
                not_before: Some(Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()),
                expires: Some(Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap()),
                ..Default::default()
            },
            tags: Some(HashMap::from([("env".to_string(), Some("prod".to_string()))])),
        }
    }

    #[test]
    fn test_set_secret_data_derives_identifiers() {
        let mut record = SecretRecord::new(VAULT_ID, "s1");
        set_secret_data(&mut record, &properties()).unwrap();

        assert_eq!(record.id, "https://myvault.vault.azure.net/secrets/s1/abcd");
        assert_eq!(record.versionless_id, "https://myvault.vault.azure.net/secrets/s1");
        assert_eq!(record.version, "abcd");
        assert_eq!(record.resource_versionless_id, format!("{VAULT_ID}/secrets/s1"));
        assert_eq!(record.resource_id, format!("{VAULT_ID}/secrets/s1/versions/abcd"));
        assert_eq!(record.id, format!("{}/{}", record.versionless_id, record.version));
        assert_eq!(record.content_type.as_deref(), Some("text/plain"));
        assert_eq!(record.tags.get("env").map(String::as_str), Some("prod"));
        assert_eq!(
            record.expiration_date,
            Some(Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_absent_fields_leave_model_untouched() {
        let mut model = SecretResourceModel {
            record: SecretRecord {
                content_type: Some(String::new()),
                tags: Tags::from([("keep".to_string(), "me".to_string())]),
                ..SecretRecord::new(VAULT_ID, "s1")
            },
            value_wo_version: 1,
        };
        let props = SecretProperties {
            id: "https://myvault.vault.azure.net/secrets/s1/v2".to_string(),
            ..Default::default()
        };

        set_secret_data(&mut model, &props).unwrap();

        assert_eq!(model.record.version, "v2");
        assert_eq!(model.record.content_type.as_deref(), Some(""));
        assert_eq!(model.record.tags.len(), 1);
        assert!(model.record.not_before_date.is_none());
    }

    #[test]
    fn test_null_tag_value_is_a_serialization_error() {
        let mut record = SecretRecord::new(VAULT_ID, "s1");
        let mut props = properties();
        props.tags = Some(HashMap::from([("broken".to_string(), None)]));

        let err = set_secret_data(&mut record, &props).unwrap_err();
        assert!(matches!(err, SecretError::Serialization(_)));
        // Nothing is written when conversion fails
        assert!(record.id.is_empty());
    }

    #[test]
    fn test_malformed_id_is_rejected() {
        let mut record = SecretRecord::new(VAULT_ID, "s1");
        let props = SecretProperties {
            id: "not-a-uri".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            set_secret_data(&mut record, &props),
            Err(SecretError::InvalidIdentifier(_))
        ));
    }
}
