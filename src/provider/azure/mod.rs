//! # Azure Collaborators
//!
//! REST clients for the Key Vault data plane and the Resource Manager
//! resources listing, authenticated with an Azure `TokenCredential`.
//!
//! - `key_vault`: [`AzureKeyVaultApi`], secret versions inside vaults
//! - `resources`: [`AzureResourceDirectory`], vault lookup by name

mod auth;
mod key_vault;
mod resources;
mod wire;

pub use auth::{build_credential, StaticTokenCredential};
pub use key_vault::AzureKeyVaultApi;
pub use resources::AzureResourceDirectory;

use crate::config::AppConfig;
use crate::constants::PROVIDER_LABEL;
use crate::error::{Result, SecretError};
use crate::observability::metrics;
use reqwest::{RequestBuilder, Response, StatusCode};
use std::time::Instant;
use tracing::debug;

/// Shared HTTP client honouring the configured timeout
///
/// # Errors
/// Returns `Upstream` if the TLS backend cannot be initialised
pub fn http_client(config: &AppConfig) -> Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder();
    if let Some(timeout) = config.http_timeout() {
        builder = builder.timeout(timeout);
    }
    Ok(builder.build()?)
}

/// Send `request` with a bearer token and map failures
///
/// 404 becomes `NotFound` carrying `not_found_hint`; every other
/// non-success status becomes `Upstream` with the service message.
async fn send(
    request: RequestBuilder,
    token: &str,
    operation: &'static str,
    not_found_hint: &str,
) -> Result<Response> {
    let start = Instant::now();
    let result = request.bearer_auth(token).send().await;
    let elapsed = start.elapsed();
    metrics::record_provider_request(PROVIDER_LABEL, operation, elapsed.as_secs_f64());

    let response = result.map_err(|e| {
        metrics::increment_provider_request_errors(PROVIDER_LABEL);
        SecretError::Upstream(format!("{operation} request failed: {e}"))
    })?;

    let status = response.status();
    debug!(
        http.request = operation,
        http.status = status.as_u16(),
        elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
        "Azure REST response"
    );
    if status.is_success() {
        return Ok(response);
    }

    metrics::increment_provider_request_errors(PROVIDER_LABEL);
    let body = response.text().await.unwrap_or_default();
    let message = wire::error_message(&body).unwrap_or(body);
    if status == StatusCode::NOT_FOUND {
        Err(SecretError::not_found(
            format!("{operation} returned HTTP 404 - {message}"),
            not_found_hint,
        ))
    } else {
        Err(SecretError::Upstream(format!(
            "{operation} returned HTTP {status} - {message}"
        )))
    }
}
