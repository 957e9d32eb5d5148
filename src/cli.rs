//! # azurekv CLI
//!
//! Runs one reconciler operation against JSON state and configuration files
//! and prints the result as JSON on stdout.
//!
//! ## Usage
//!
//! ```bash
//! # Predict what an apply would change
//! azurekv plan --config secret.json --state state.json
//!
//! # Mint the first version, reading the value from $AZUREKV_SECRET_VALUE
//! azurekv create --config secret.json > state.json
//!
//! # Rotate or update metadata
//! azurekv update --config secret.json --state state.json --value-stdin < value.txt
//!
//! # Adopt an existing secret by its legacy ID
//! azurekv import --id https://myvault.vault.azure.net/secrets/s1/abcd
//!
//! # Try the flow locally, keeping the vault between runs
//! azurekv --in-memory --vault-file vault.json create --config secret.json
//! ```
//!
//! The secret value is never accepted as a plain argument.

use crate::config::AppConfig;
use crate::constants::DEFAULT_VALUE_ENV;
use crate::engine::SecretReconciler;
use crate::model::{
    ConfigValue, DataSourceQuery, ImportRequest, SecretConfig, SecretIdentity,
    SecretResourceModel, SecretValue, Tags,
};
use crate::observability::metrics;
use crate::plan::modify_plan;
use crate::provider::azure::{
    build_credential, http_client, AzureKeyVaultApi, AzureResourceDirectory,
};
use crate::provider::memory::InMemoryVault;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// Write-only Azure Key Vault secret reconciler
#[derive(Debug, Parser)]
#[command(name = "azurekv", version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Subscription searched when importing by legacy ID
    #[arg(long, global = true, env = "ARM_SUBSCRIPTION_ID")]
    pub subscription_id: Option<String>,

    /// Use a process-local vault instead of Azure
    #[arg(long, global = true)]
    pub in_memory: bool,

    /// Load the in-memory vault from FILE and save it back after a successful run
    #[arg(long, global = true, value_name = "FILE", requires = "in_memory")]
    pub vault_file: Option<PathBuf>,

    /// Print Prometheus metrics to stderr on exit
    #[arg(long, global = true)]
    pub metrics: bool,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Predict which computed attributes an apply would change
    Plan {
        /// Proposed configuration (omit to plan a destroy)
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,
        /// Prior state (omit to plan a create)
        #[arg(long, value_name = "FILE")]
        state: Option<PathBuf>,
        /// Treat the value as only known at apply time
        #[arg(long)]
        value_unknown: bool,
        #[command(flatten)]
        value: ValueSource,
    },
    /// Mint the first version of a secret
    Create {
        #[arg(long, value_name = "FILE")]
        config: PathBuf,
        #[command(flatten)]
        value: ValueSource,
    },
    /// Refresh state from the latest version
    Read {
        #[arg(long, value_name = "FILE")]
        state: PathBuf,
    },
    /// Rotate the value or update metadata
    Update {
        #[arg(long, value_name = "FILE")]
        config: PathBuf,
        #[arg(long, value_name = "FILE")]
        state: PathBuf,
        #[command(flatten)]
        value: ValueSource,
    },
    /// Delete the secret and all of its versions
    Delete {
        #[arg(long, value_name = "FILE")]
        state: PathBuf,
    },
    /// Adopt an existing secret
    Import {
        /// Legacy ID: a versioned or versionless secret URI
        #[arg(long, conflicts_with_all = ["name", "key_vault_id"], required_unless_present = "name")]
        id: Option<String>,
        #[arg(long, requires = "key_vault_id")]
        name: Option<String>,
        #[arg(long, requires = "name")]
        key_vault_id: Option<String>,
    },
    /// Read a specific or the latest version without managing it
    Data {
        #[arg(long)]
        key_vault_id: String,
        #[arg(long)]
        name: String,
        /// Version to read, latest when omitted
        #[arg(long)]
        version: Option<String>,
    },
}

/// Where the write-only value comes from
#[derive(Debug, Clone, Args)]
pub struct ValueSource {
    /// Environment variable holding the value
    #[arg(long, value_name = "VAR", default_value = DEFAULT_VALUE_ENV)]
    pub value_env: String,
    /// Read the value from stdin instead
    #[arg(long, conflicts_with = "value_env")]
    pub value_stdin: bool,
}

impl ValueSource {
    /// The value, or `Null` when the variable is unset
    fn read(&self) -> Result<ConfigValue<SecretValue>> {
        if self.value_stdin {
            let mut value = String::new();
            std::io::stdin()
                .read_to_string(&mut value)
                .context("Failed to read the secret value from stdin")?;
            let value = value.strip_suffix('\n').unwrap_or(&value);
            return Ok(ConfigValue::Known(SecretValue::new(value)));
        }
        Ok(std::env::var(&self.value_env)
            .ok()
            .map(SecretValue::new)
            .into())
    }
}

/// Configuration file shape, the value aside
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigFile {
    pub name: String,
    pub key_vault_id: String,
    #[serde(default)]
    pub content_type: String,
    #[serde(default)]
    pub not_before_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub expiration_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub tags: Tags,
    /// `null` or absent means the caller ignores value changes
    #[serde(default)]
    pub value_wo_version: Option<i32>,
}

impl ConfigFile {
    #[must_use]
    pub fn into_config(self, value_wo: ConfigValue<SecretValue>) -> SecretConfig {
        SecretConfig {
            name: self.name,
            key_vault_id: self.key_vault_id,
            content_type: self.content_type,
            not_before_date: self.not_before_date,
            expiration_date: self.expiration_date,
            tags: self.tags,
            value_wo,
            value_wo_version: self.value_wo_version.into(),
        }
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Failed to parse {}", path.display()))
}

fn load_config(path: &Path, value: &ValueSource, value_unknown: bool) -> Result<SecretConfig> {
    let file: ConfigFile = read_json(path)?;
    let value_wo = if value_unknown {
        ConfigValue::Unknown
    } else {
        value.read()?
    };
    Ok(file.into_config(value_wo))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// A known counter without a value would plan as ignored and hide a rotation
fn ensure_plannable(config: &SecretConfig) -> Result<()> {
    if config.value_wo.is_null() && config.value_wo_version.known().is_some() {
        anyhow::bail!(
            "value_wo_version is set but no value was provided; set the value environment variable, pass --value-stdin, or pass --value-unknown"
        );
    }
    Ok(())
}

/// Open the in-memory vault when `--in-memory` is set
///
/// # Errors
/// Returns an error if `--vault-file` exists but cannot be loaded
pub fn open_memory_vault(cli: &Cli) -> Result<Option<Arc<InMemoryVault>>> {
    if !cli.in_memory {
        return Ok(None);
    }
    let vault = match &cli.vault_file {
        Some(path) => InMemoryVault::load(path)?,
        None => InMemoryVault::new(),
    };
    Ok(Some(Arc::new(vault)))
}

/// Build the reconciler for this invocation
///
/// `memory` replaces the Azure clients when present.
///
/// # Errors
/// Returns an error if the Azure credential or HTTP client cannot be built
pub fn build_reconciler(
    cli: &Cli,
    config: &AppConfig,
    memory: Option<&Arc<InMemoryVault>>,
) -> Result<SecretReconciler> {
    let subscription_id = cli
        .subscription_id
        .clone()
        .or_else(|| config.subscription_id.clone());

    if let Some(vault) = memory {
        info!("Using the in-memory vault");
        let secrets: Arc<InMemoryVault> = Arc::clone(vault);
        let directory: Arc<InMemoryVault> = Arc::clone(vault);
        return Ok(SecretReconciler::new(secrets, directory, subscription_id));
    }

    let credential = build_credential(config)?;
    let http = http_client(config).context("Failed to create HTTP client")?;
    let secrets = AzureKeyVaultApi::new(http.clone(), Arc::clone(&credential), config);
    let directory = AzureResourceDirectory::new(http, credential, config);
    Ok(SecretReconciler::new(
        Arc::new(secrets),
        Arc::new(directory),
        subscription_id,
    ))
}

/// Run the parsed command
///
/// # Errors
/// Returns the failed operation's error with context
pub async fn run(cli: Cli, config: &AppConfig) -> Result<()> {
    if cli.metrics {
        metrics::register_metrics().context("Failed to register metrics")?;
    }

    let memory = open_memory_vault(&cli)?;
    let result = execute(&cli, config, memory.as_ref()).await;

    if let (Ok(()), Some(vault), Some(path)) = (&result, &memory, &cli.vault_file) {
        vault.save(path)?;
    }

    if cli.metrics {
        eprintln!("{}", metrics::gather_metrics()?);
    }
    result
}

async fn execute(
    cli: &Cli,
    config: &AppConfig,
    memory: Option<&Arc<InMemoryVault>>,
) -> Result<()> {
    match &cli.command {
        Commands::Plan {
            config: config_path,
            state,
            value_unknown,
            value,
        } => {
            let prior = state
                .as_deref()
                .map(read_json::<SecretResourceModel>)
                .transpose()?;
            let proposed = config_path
                .as_deref()
                .map(|path| load_config(path, value, *value_unknown))
                .transpose()?;
            if let Some(config) = &proposed {
                ensure_plannable(config)?;
            }

            let decision = modify_plan(prior.as_ref(), proposed.as_ref());
            let planned = proposed.as_ref().map(|c| {
                let mut model = c.planned_model(prior.as_ref());
                if let Some(outputs) = &decision.outputs {
                    outputs.apply_to(&mut model);
                }
                model
            });
            let unknown: Vec<&str> = match &decision.outputs {
                Some(outputs) if outputs.is_unknown() => vec!["id", "resource_id", "version"],
                _ => Vec::new(),
            };

            print_json(&json!({
                "reason": decision.reason,
                "rotates": decision.reason.rotates(),
                "unknown": unknown,
                "planned_state": planned,
            }))
        }
        Commands::Create {
            config: config_path,
            value,
        } => {
            let proposed = load_config(config_path, value, false)?;
            let engine = build_reconciler(cli, config, memory)?;
            let applied = engine
                .create(&proposed)
                .await
                .with_context(|| format!("Failed to create secret {:?}", proposed.name))?;
            print_json(&applied)
        }
        Commands::Read { state } => {
            let prior: SecretResourceModel = read_json(state)?;
            let engine = build_reconciler(cli, config, memory)?;
            let applied = engine
                .read(&prior)
                .await
                .with_context(|| format!("Failed to read secret {:?}", prior.record.name))?;
            print_json(&applied)
        }
        Commands::Update {
            config: config_path,
            state,
            value,
        } => {
            let prior: SecretResourceModel = read_json(state)?;
            let proposed = load_config(config_path, value, false)?;
            let engine = build_reconciler(cli, config, memory)?;
            let updated = engine
                .update(&prior, &proposed)
                .await
                .with_context(|| format!("Failed to update secret {:?}", prior.record.name))?;
            print_json(&updated)
        }
        Commands::Delete { state } => {
            let prior: SecretResourceModel = read_json(state)?;
            let engine = build_reconciler(cli, config, memory)?;
            engine
                .delete(&prior)
                .await
                .with_context(|| format!("Failed to delete secret {:?}", prior.record.name))?;
            print_json(&json!({ "deleted": prior.identity() }))
        }
        Commands::Import {
            id,
            name,
            key_vault_id,
        } => {
            let request = match (id, name, key_vault_id) {
                (Some(id), _, _) => ImportRequest::LegacyId(id.clone()),
                (None, Some(name), Some(key_vault_id)) => ImportRequest::Identity(SecretIdentity {
                    name: name.clone(),
                    key_vault_id: key_vault_id.clone(),
                }),
                _ => anyhow::bail!("either --id or both --name and --key-vault-id are required"),
            };
            let engine = build_reconciler(cli, config, memory)?;
            let imported = engine
                .import(&request)
                .await
                .context("Failed to import secret")?;
            print_json(&imported)
        }
        Commands::Data {
            key_vault_id,
            name,
            version,
        } => {
            let engine = build_reconciler(cli, config, memory)?;
            let record = engine
                .read_data_source(&DataSourceQuery {
                    name: name.clone(),
                    key_vault_id: key_vault_id.clone(),
                    version: version.clone(),
                })
                .await
                .with_context(|| format!("Failed to read secret {name:?}"))?;
            print_json(&record)
        }
    }
}
