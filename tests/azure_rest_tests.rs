//! # Azure REST Client Tests
//!
//! Drives the Key Vault and Resource Manager clients against a wiremock
//! server standing in for both services.

mod common;

use azurekv::model::{
    ImportRequest, SecretAttributes, SecretValue, SetSecretParameters, Tags,
    UpdateSecretPropertiesParameters,
};
use azurekv::provider::{ResourceDirectoryApi, VaultSecretsApi};
use azurekv::{resolver, SecretError, SecretReconciler};
use common::{key_vault_api, resource_directory, secret_item, SUBSCRIPTION, TEST_TOKEN, VAULT_ID};
use futures::TryStreamExt;
use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const BEARER: &str = "Bearer test-token";
const VAULT_FILTER: &str = "resourceType eq 'Microsoft.KeyVault/vaults' and name eq 'myvault'";

#[tokio::test]
async fn test_list_versions_follows_next_link() {
    let server = MockServer::start().await;
    let next_link = format!("{}/secrets/s1/versions?api-version=7.4&$skiptoken=page2", server.uri());

    Mock::given(method("GET"))
        .and(path("/secrets/s1/versions"))
        .and(query_param("$skiptoken", "page2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": [secret_item("s1", "v3", 1_700_000_300)],
            "nextLink": null
        })))
        .with_priority(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/secrets/s1/versions"))
        .and(query_param("api-version", "7.4"))
        .and(header("authorization", BEARER))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": [
                secret_item("s1", "v1", 1_700_000_100),
                secret_item("s1", "v2", 1_700_000_200)
            ],
            "nextLink": next_link
        })))
        .expect(1)
        .mount(&server)
        .await;

    let api = key_vault_api(&server);
    let pages: Vec<_> = api
        .list_secret_versions(VAULT_ID, "s1")
        .try_collect()
        .await
        .unwrap();
    assert_eq!(pages.len(), 2);
    assert_eq!(pages[0].len(), 2);
    assert_eq!(pages[1][0].version(), "v3");
}

#[tokio::test]
async fn test_resolve_latest_across_pages() {
    let server = MockServer::start().await;
    let next_link = format!("{}/secrets/s1/versions?api-version=7.4&$skiptoken=page2", server.uri());

    Mock::given(method("GET"))
        .and(path("/secrets/s1/versions"))
        .and(query_param("$skiptoken", "page2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": [secret_item("s1", "older", 1_700_000_000)]
        })))
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/secrets/s1/versions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": [secret_item("s1", "newest", 1_700_000_500)],
            "nextLink": next_link
        })))
        .mount(&server)
        .await;

    let api = key_vault_api(&server);
    let latest = resolver::resolve(&api, VAULT_ID, "s1", None).await.unwrap();
    assert_eq!(latest.version(), "newest");

    let pinned = resolver::resolve(&api, VAULT_ID, "s1", Some("older")).await.unwrap();
    assert_eq!(pinned.version(), "older");
}

#[tokio::test]
async fn test_set_secret_sends_value_and_metadata() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/secrets/s1"))
        .and(query_param("api-version", "7.4"))
        .and(header("authorization", BEARER))
        .and(body_partial_json(json!({
            "value": "hunter2",
            "contentType": "text/plain",
            "attributes": { "exp": 1_767_225_600 },
            "tags": { "env": "test" }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(secret_item("s1", "v1", 1_700_000_000)))
        .expect(1)
        .mount(&server)
        .await;

    let mut tags = Tags::new();
    tags.insert("env".to_string(), "test".to_string());
    let parameters = SetSecretParameters {
        value: SecretValue::new("hunter2"),
        content_type: Some("text/plain".to_string()),
        attributes: SecretAttributes {
            expires: chrono::DateTime::from_timestamp(1_767_225_600, 0),
            ..SecretAttributes::default()
        },
        tags,
    };

    let properties = key_vault_api(&server)
        .set_secret(VAULT_ID, "s1", parameters)
        .await
        .unwrap();
    assert_eq!(properties.version(), "v1");
    assert_eq!(properties.content_type.as_deref(), Some("text/plain"));
}

#[tokio::test]
async fn test_update_properties_patches_the_given_version() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/secrets/s1/v1"))
        .and(query_param("api-version", "7.4"))
        .and(body_partial_json(json!({ "contentType": "application/json" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(secret_item("s1", "v1", 1_700_000_000)))
        .expect(1)
        .mount(&server)
        .await;

    let properties = key_vault_api(&server)
        .update_secret_properties(
            VAULT_ID,
            "s1",
            "v1",
            UpdateSecretPropertiesParameters {
                content_type: Some("application/json".to_string()),
                ..UpdateSecretPropertiesParameters::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(properties.version(), "v1");
}

#[tokio::test]
async fn test_delete_secret() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/secrets/s1"))
        .and(header("authorization", BEARER))
        .respond_with(ResponseTemplate::new(200).set_body_json(secret_item("s1", "v1", 1_700_000_000)))
        .expect(1)
        .mount(&server)
        .await;

    key_vault_api(&server).delete_secret(VAULT_ID, "s1").await.unwrap();
}

#[tokio::test]
async fn test_http_404_maps_to_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/secrets/gone/versions"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "error": { "code": "SecretNotFound", "message": "A secret with (name/id) gone was not found in this key vault." }
        })))
        .mount(&server)
        .await;

    let err = resolver::resolve(&key_vault_api(&server), VAULT_ID, "gone", None)
        .await
        .unwrap_err();
    assert!(err.is_not_found());
    assert!(err.to_string().contains("SecretNotFound"));
}

#[tokio::test]
async fn test_server_error_maps_to_upstream() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/secrets/s1"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "error": { "code": "Forbidden", "message": "The user does not have secrets set permission." }
        })))
        .mount(&server)
        .await;

    let err = key_vault_api(&server)
        .set_secret(
            VAULT_ID,
            "s1",
            SetSecretParameters {
                value: SecretValue::new("v"),
                content_type: None,
                attributes: SecretAttributes::default(),
                tags: Tags::new(),
            },
        )
        .await
        .unwrap_err();
    match err {
        SecretError::Upstream(message) => {
            assert!(message.contains("403"), "{message}");
            assert!(message.contains("Forbidden: The user does not have secrets set permission."));
        }
        other => panic!("expected Upstream, got {other:?}"),
    }
}

#[tokio::test]
async fn test_find_vault_resource_id() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("/subscriptions/{SUBSCRIPTION}/resources")))
        .and(query_param("api-version", "2021-04-01"))
        .and(query_param("$filter", VAULT_FILTER))
        .and(header("authorization", format!("Bearer {TEST_TOKEN}").as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": [{ "id": VAULT_ID, "name": "myvault", "type": "Microsoft.KeyVault/vaults" }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let id = resource_directory(&server)
        .find_vault_resource_id(SUBSCRIPTION, "myvault")
        .await
        .unwrap();
    assert_eq!(id, VAULT_ID);
}

#[tokio::test]
async fn test_find_vault_follows_next_link() {
    let server = MockServer::start().await;
    let next_link = format!("{}/subscriptions/{SUBSCRIPTION}/resources?page=2", server.uri());

    Mock::given(method("GET"))
        .and(path(format!("/subscriptions/{SUBSCRIPTION}/resources")))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": [{ "id": VAULT_ID, "name": "myvault" }]
        })))
        .with_priority(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/subscriptions/{SUBSCRIPTION}/resources")))
        .and(query_param("api-version", "2021-04-01"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": [],
            "nextLink": next_link
        })))
        .expect(1)
        .mount(&server)
        .await;

    let id = resource_directory(&server)
        .find_vault_resource_id(SUBSCRIPTION, "myvault")
        .await
        .unwrap();
    assert_eq!(id, VAULT_ID);
}

#[tokio::test]
async fn test_find_vault_skips_nameless_and_case_variant_entries() {
    let server = MockServer::start().await;
    let decoy = "/subscriptions/00000000-0000-0000-0000-000000000000/resourceGroups/other/providers/Microsoft.KeyVault/vaults/MyVault";
    Mock::given(method("GET"))
        .and(path(format!("/subscriptions/{SUBSCRIPTION}/resources")))
        .and(query_param("$filter", VAULT_FILTER))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": [
                { "id": "/subscriptions/00000000-0000-0000-0000-000000000000/resourceGroups/other/providers/Microsoft.KeyVault/vaults/unnamed" },
                { "id": decoy, "name": "MyVault" },
                { "id": VAULT_ID, "name": "myvault" }
            ]
        })))
        .mount(&server)
        .await;

    let id = resource_directory(&server)
        .find_vault_resource_id(SUBSCRIPTION, "myvault")
        .await
        .unwrap();
    assert_eq!(id, VAULT_ID);
}

#[tokio::test]
async fn test_only_decoys_is_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("/subscriptions/{SUBSCRIPTION}/resources")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": [
                { "id": "/subscriptions/00000000-0000-0000-0000-000000000000/resourceGroups/other/providers/Microsoft.KeyVault/vaults/unnamed" },
                { "id": VAULT_ID, "name": "MYVAULT" }
            ]
        })))
        .mount(&server)
        .await;

    let err = resource_directory(&server)
        .find_vault_resource_id(SUBSCRIPTION, "myvault")
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_missing_vault_is_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("/subscriptions/{SUBSCRIPTION}/resources")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "value": [] })))
        .mount(&server)
        .await;

    let err = resource_directory(&server)
        .find_vault_resource_id(SUBSCRIPTION, "myvault")
        .await
        .unwrap_err();
    assert!(err.is_not_found());
    assert!(err.to_string().contains("\"Microsoft.KeyVault/vaults/read\""));
}

#[tokio::test]
async fn test_legacy_import_through_azure_clients() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("/subscriptions/{SUBSCRIPTION}/resources")))
        .and(query_param("$filter", VAULT_FILTER))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": [{ "id": VAULT_ID, "name": "myvault" }]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/secrets/s1/versions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": [
                secret_item("s1", "v1", 1_700_000_000),
                secret_item("s1", "v2", 1_700_000_100)
            ]
        })))
        .mount(&server)
        .await;

    let engine = SecretReconciler::new(
        Arc::new(key_vault_api(&server)),
        Arc::new(resource_directory(&server)),
        Some(SUBSCRIPTION.to_string()),
    );
    let state = engine
        .import(&ImportRequest::LegacyId(
            "https://myvault.vault.azure.net/secrets/s1/v1".to_string(),
        ))
        .await
        .unwrap();

    assert_eq!(state.record.key_vault_id, VAULT_ID);
    assert_eq!(state.record.version, "v2");
    assert_eq!(state.record.resource_id, format!("{VAULT_ID}/secrets/s1/versions/v2"));
    assert_eq!(state.record.tags.get("env").map(String::as_str), Some("test"));
    assert_eq!(state.value_wo_version, 1);
}
