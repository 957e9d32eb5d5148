//! # azurekv
//!
//! Write-only Azure Key Vault secret reconciler.
//!
//! Each invocation runs one lifecycle operation (plan, create, read, update,
//! delete, import, or a data-source read) and prints the resulting state as
//! JSON. Secret values are sent to the vault and never written to state.
//!
//! ## Usage
//!
//! See `azurekv --help` and the [`azurekv::cli`] module.

use anyhow::{Context, Result};
use azurekv::cli::{self, Cli};
use azurekv::config::AppConfig;
use azurekv::observability::init_logging;
use clap::Parser;
use tracing::{debug, info};

#[tokio::main]
async fn main() -> Result<()> {
    // Configure rustls crypto provider FIRST, before any async operations
    // Use ring as the crypto provider (default, more compatible)
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    let cli = Cli::parse();
    let config = AppConfig::from_env().context("Invalid configuration")?;
    init_logging(&config);

    info!(
        "azurekv {} (built {}, git {})",
        env!("CARGO_PKG_VERSION"),
        env!("AZUREKV_BUILD_DATETIME"),
        env!("AZUREKV_BUILD_GIT_HASH")
    );
    debug!(?config, "Loaded configuration");

    cli::run(cli, &config)
        .await
        .context("azurekv operation failed")
}
