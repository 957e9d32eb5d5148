//! # azurekv
//!
//! Lifecycle logic for a write-only Azure Key Vault secret.
//!
//! The secret value travels from configuration to the vault and is never
//! persisted. Rotation is driven by a caller-owned integer counter
//! (`value_wo_version`): bumping it mints a new version, leaving it alone
//! only updates metadata on the current one.
//!
//! - [`plan`]: decides which computed attributes an apply will change
//! - [`engine`]: create, read, update, delete, import, and data-source reads
//! - [`resolver`]: finds the latest or a specific version of a secret
//! - [`provider`]: the vault collaborators (Azure REST or in-memory)

pub mod cli;
pub mod config;
pub mod constants;
pub mod engine;
pub mod error;
pub mod identity;
pub mod model;
pub mod observability;
pub mod plan;
pub mod provider;
pub mod record;
pub mod resolver;

pub use engine::{Applied, SecretReconciler};
pub use error::{Result, SecretError};
pub use plan::{modify_plan, PlanDecision, PlanReason};
