//! # Plan Reconciler
//!
//! Predicts, before apply, which computed attributes will change.
//!
//! Only `id`, `resource_id` and `version` depend on whether a new version is
//! minted. Everything else is decided by configuration alone.

use crate::model::{ConfigValue, SecretConfig, SecretResourceModel};
use serde::Serialize;
use tracing::debug;

/// Why the plan came out the way it did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanReason {
    /// The resource is being destroyed
    Destroy,
    /// The resource is being created
    Create,
    /// `value_wo` or `value_wo_version` is null, so its changes are ignored
    ValueIgnored,
    /// `value_wo` is only known at apply time
    ValueUnknown,
    /// `value_wo_version` differs from state
    CounterChanged,
    /// Same counter, so only metadata can change
    CounterUnchanged,
}

impl PlanReason {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanReason::Destroy => "destroy",
            PlanReason::Create => "create",
            PlanReason::ValueIgnored => "value_ignored",
            PlanReason::ValueUnknown => "value_unknown",
            PlanReason::CounterChanged => "counter_changed",
            PlanReason::CounterUnchanged => "counter_unchanged",
        }
    }

    /// Whether apply will mint a new version
    #[must_use]
    pub fn rotates(&self) -> bool {
        matches!(self, PlanReason::ValueUnknown | PlanReason::CounterChanged)
    }
}

/// Predicted values of the version-dependent attributes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedOutputs {
    pub id: ConfigValue<String>,
    pub resource_id: ConfigValue<String>,
    pub version: ConfigValue<String>,
}

impl PlannedOutputs {
    fn unknown() -> Self {
        Self {
            id: ConfigValue::Unknown,
            resource_id: ConfigValue::Unknown,
            version: ConfigValue::Unknown,
        }
    }

    fn pinned(state: &SecretResourceModel) -> Self {
        Self {
            id: ConfigValue::Known(state.record.id.clone()),
            resource_id: ConfigValue::Known(state.record.resource_id.clone()),
            version: ConfigValue::Known(state.record.version.clone()),
        }
    }

    /// Whether all three attributes are left unknown
    #[must_use]
    pub fn is_unknown(&self) -> bool {
        self.id.is_unknown() && self.resource_id.is_unknown() && self.version.is_unknown()
    }

    /// Overlay known predictions on `model`; unknown ones are cleared
    pub fn apply_to(&self, model: &mut SecretResourceModel) {
        model.record.id = self.id.known().cloned().unwrap_or_default();
        model.record.resource_id = self.resource_id.known().cloned().unwrap_or_default();
        model.record.version = self.version.known().cloned().unwrap_or_default();
    }
}

/// Outcome of [`modify_plan`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanDecision {
    pub reason: PlanReason,
    /// `None` when no prediction is needed (create or destroy)
    pub outputs: Option<PlannedOutputs>,
}

/// Decide the planned version-dependent attributes
///
/// Pure: it never touches the network.
#[must_use]
pub fn modify_plan(
    prior: Option<&SecretResourceModel>,
    config: Option<&SecretConfig>,
) -> PlanDecision {
    let decision = decide(prior, config);
    debug!(
        resource_id = prior.map_or("", |state| state.record.id.as_str()),
        reason = decision.reason.as_str(),
        "Planned secret changes"
    );
    decision
}

fn decide(prior: Option<&SecretResourceModel>, config: Option<&SecretConfig>) -> PlanDecision {
    let (state, config) = match (prior, config) {
        (_, None) => {
            return PlanDecision {
                reason: PlanReason::Destroy,
                outputs: None,
            }
        }
        (None, Some(_)) => {
            return PlanDecision {
                reason: PlanReason::Create,
                outputs: None,
            }
        }
        (Some(state), Some(config)) => (state, config),
    };

    // The caller ignores changes to the value, so nothing rotates
    if config.value_wo.is_null() || config.value_wo_version.is_null() {
        return PlanDecision {
            reason: PlanReason::ValueIgnored,
            outputs: Some(PlannedOutputs::pinned(state)),
        };
    }

    if config.value_wo.is_unknown() {
        return PlanDecision {
            reason: PlanReason::ValueUnknown,
            outputs: Some(PlannedOutputs::unknown()),
        };
    }

    if config.value_wo_version != ConfigValue::Known(state.value_wo_version) {
        return PlanDecision {
            reason: PlanReason::CounterChanged,
            outputs: Some(PlannedOutputs::unknown()),
        };
    }

    PlanDecision {
        reason: PlanReason::CounterUnchanged,
        outputs: Some(PlannedOutputs::pinned(state)),
    }
}
