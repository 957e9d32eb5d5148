//! # Model
//!
//! Shapes exchanged with the orchestrator and with the vault collaborators.
//!
//! - `secret`: persisted state (resource and data-source shapes)
//! - `config`: proposed configuration, including the write-only value
//! - `vault`: request/response shapes of the Vault Secrets API

pub mod config;
pub mod secret;
pub mod vault;

pub use config::{ConfigValue, DataSourceQuery, ImportRequest, SecretConfig, SecretValue};
pub use secret::{SecretIdentity, SecretModel, SecretRecord, SecretResourceModel, Tags};
pub use vault::{
    SecretAttributes, SecretProperties, SetSecretParameters, UpdateSecretPropertiesParameters,
};
