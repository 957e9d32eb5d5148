//! # Version Resolver
//!
//! Locates one version of a secret from the paginated versions listing.
//!
//! With an explicit version the entry whose version equals it exactly is
//! returned. Without one, the entry created last wins; ties keep the entry
//! seen first.

use crate::error::{Result, SecretError};
use crate::model::SecretProperties;
use crate::provider::VaultSecretsApi;
use futures::TryStreamExt;
use tracing::debug;

const READ_METADATA_PERMISSION: &str = "Microsoft.KeyVault/vaults/secrets/readMetadata/action";

/// Resolve `version` (or the latest version) of `name` in `key_vault_id`
///
/// An empty `version` is treated as absent.
///
/// # Errors
/// - `NotFound` when no listed entry matches
/// - the collaborator's error when any page fetch fails; nothing partial is returned
pub async fn resolve(
    api: &dyn VaultSecretsApi,
    key_vault_id: &str,
    name: &str,
    version: Option<&str>,
) -> Result<SecretProperties> {
    let version = version.filter(|v| !v.is_empty());
    let mut pages = api.list_secret_versions(key_vault_id, name);
    let mut latest: Option<SecretProperties> = None;
    let mut page_count = 0usize;

    while let Some(page) = pages.try_next().await? {
        page_count += 1;
        for secret in page {
            match version {
                Some(wanted) => {
                    if secret.version() == wanted {
                        debug!(
                            secret_name = name,
                            version = wanted,
                            pages = page_count,
                            "Resolved explicit secret version"
                        );
                        return Ok(secret);
                    }
                }
                None => {
                    if is_newer(&secret, latest.as_ref()) {
                        latest = Some(secret);
                    }
                }
            }
        }
    }

    debug!(
        secret_name = name,
        pages = page_count,
        found = latest.is_some(),
        "Finished listing secret versions"
    );

    match (version, latest) {
        (None, Some(secret)) => Ok(secret),
        (Some(wanted), _) => Err(SecretError::not_found(
            format!("the version {wanted:?} of the secret {name:?} was not found in the key vault {key_vault_id:?}"),
            format!("make sure that the version exists and that you have the {READ_METADATA_PERMISSION:?} permission"),
        )),
        (None, None) => Err(SecretError::not_found(
            format!("the secret {name:?} was not found in the key vault {key_vault_id:?}"),
            format!("make sure that the secret name is correct and that you have the {READ_METADATA_PERMISSION:?} permission"),
        )),
    }
}

/// Strictly later `created` than the current pick
fn is_newer(candidate: &SecretProperties, current: Option<&SecretProperties>) -> bool {
    let Some(current) = current else {
        return true;
    };
    match (candidate.attributes.created, current.attributes.created) {
        (Some(candidate), Some(current)) => candidate > current,
        (Some(_), None) => true,
        (None, _) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{SecretAttributes, SetSecretParameters, UpdateSecretPropertiesParameters};
    use crate::provider::VersionPages;
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use futures::stream;

    const VAULT_ID: &str =
        "/subscriptions/0000/resourceGroups/rg/providers/Microsoft.KeyVault/vaults/myvault";

    /// Serves canned pages; a `None` page fails the fetch
    struct PagedApi {
        pages: Vec<Option<Vec<SecretProperties>>>,
    }

    #[async_trait]
    impl VaultSecretsApi for PagedApi {
        fn list_secret_versions<'a>(&'a self, _: &'a str, _: &'a str) -> VersionPages<'a> {
            Box::pin(stream::iter(self.pages.clone().into_iter().map(|page| {
                page.ok_or_else(|| SecretError::Upstream("HTTP 500 - page failed".to_string()))
            })))
        }

        async fn set_secret(&self, _: &str, _: &str, _: SetSecretParameters) -> Result<SecretProperties> {
            unimplemented!("not used by the resolver")
        }

        async fn update_secret_properties(
            &self,
            _: &str,
            _: &str,
            _: &str,
            _: UpdateSecretPropertiesParameters,
        ) -> Result<SecretProperties> {
            unimplemented!("not used by the resolver")
        }

        async fn delete_secret(&self, _: &str, _: &str) -> Result<()> {
            unimplemented!("not used by the resolver")
        }
    }

    fn version(id: &str, created_secs: Option<i64>) -> SecretProperties {
        SecretProperties {
            id: format!("https://myvault.vault.azure.net/secrets/s1/{id}"),
            attributes: SecretAttributes {
                created: created_secs.map(|s| Utc.timestamp_opt(s, 0).unwrap()),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_latest_is_max_created_across_pages() {
        let api = PagedApi {
            pages: vec![
                Some(vec![version("a", Some(100)), version("b", Some(300))]),
                Some(vec![version("c", Some(200))]),
                Some(vec![]),
            ],
        };
        let secret = resolve(&api, VAULT_ID, "s1", None).await.unwrap();
        assert_eq!(secret.version(), "b");
    }

    #[tokio::test]
    async fn test_latest_tie_keeps_first_seen() {
        let api = PagedApi {
            pages: vec![Some(vec![version("first", Some(100))]), Some(vec![version("second", Some(100))])],
        };
        let secret = resolve(&api, VAULT_ID, "s1", Some("")).await.unwrap();
        assert_eq!(secret.version(), "first");
    }

    #[tokio::test]
    async fn test_undated_version_loses_to_later_dated_one() {
        let api = PagedApi {
            pages: vec![
                Some(vec![version("undated", None)]),
                Some(vec![version("dated", Some(100))]),
            ],
        };
        let secret = resolve(&api, VAULT_ID, "s1", None).await.unwrap();
        assert_eq!(secret.version(), "dated");
    }

    #[tokio::test]
    async fn test_undated_version_never_replaces_dated_one() {
        let api = PagedApi {
            pages: vec![
                Some(vec![version("dated", Some(100))]),
                Some(vec![version("undated", None)]),
            ],
        };
        let secret = resolve(&api, VAULT_ID, "s1", None).await.unwrap();
        assert_eq!(secret.version(), "dated");
    }

    #[tokio::test]
    async fn test_only_undated_versions_keep_the_first() {
        let api = PagedApi {
            pages: vec![Some(vec![version("first", None), version("second", None)])],
        };
        let secret = resolve(&api, VAULT_ID, "s1", None).await.unwrap();
        assert_eq!(secret.version(), "first");
    }

    #[tokio::test]
    async fn test_explicit_version_is_exact_match() {
        // Regression: a non-matching first entry must be skipped, not returned
        let api = PagedApi {
            pages: vec![
                Some(vec![version("abc", Some(300)), version("abcd0", Some(200))]),
                Some(vec![version("abcd", Some(100))]),
            ],
        };
        let secret = resolve(&api, VAULT_ID, "s1", Some("abcd")).await.unwrap();
        assert_eq!(secret.version(), "abcd");
    }

    #[tokio::test]
    async fn test_explicit_version_missing_is_not_found() {
        let api = PagedApi {
            pages: vec![Some(vec![version("abc", Some(300))])],
        };
        let err = resolve(&api, VAULT_ID, "s1", Some("abcd")).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_empty_listing_is_not_found() {
        let api = PagedApi { pages: vec![Some(vec![])] };
        let err = resolve(&api, VAULT_ID, "s1", None).await.unwrap_err();
        assert!(err.is_not_found());
        assert!(err.to_string().contains("readMetadata"));
    }

    #[tokio::test]
    async fn test_page_failure_discards_partial_results() {
        let api = PagedApi {
            pages: vec![Some(vec![version("a", Some(100))]), None],
        };
        let err = resolve(&api, VAULT_ID, "s1", None).await.unwrap_err();
        assert!(matches!(err, SecretError::Upstream(_)));
    }
}
