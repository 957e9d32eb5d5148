//! # Errors
//!
//! Error taxonomy surfaced at every operation boundary.
//!
//! Nothing here is retried internally. A failed operation never yields a new
//! state, so the caller's prior state stays authoritative.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SecretError {
    /// Secret or vault is absent
    #[error("{message}; {hint}")]
    NotFound { message: String, hint: String },

    /// Malformed structured or string identity
    #[error("invalid identifier: {0}")]
    InvalidIdentifier(String),

    /// Collaborator call failed, upstream message passed through verbatim
    #[error("{0}")]
    Upstream(String),

    /// Required configuration is absent
    #[error("missing configuration: {0}")]
    MissingConfiguration(String),

    /// Tag or attribute conversion failure
    #[error("serialization error: {0}")]
    Serialization(String),
}

pub type Result<T, E = SecretError> = std::result::Result<T, E>;

impl SecretError {
    pub fn not_found(message: impl Into<String>, hint: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
            hint: hint.into(),
        }
    }

    /// Short label used for metrics and log fields
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            SecretError::NotFound { .. } => "not_found",
            SecretError::InvalidIdentifier(_) => "invalid_identifier",
            SecretError::Upstream(_) => "upstream",
            SecretError::MissingConfiguration(_) => "missing_configuration",
            SecretError::Serialization(_) => "serialization",
        }
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, SecretError::NotFound { .. })
    }
}

impl From<reqwest::Error> for SecretError {
    fn from(e: reqwest::Error) -> Self {
        SecretError::Upstream(e.to_string())
    }
}

impl From<azure_core::Error> for SecretError {
    fn from(e: azure_core::Error) -> Self {
        SecretError::Upstream(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_message_carries_hint() {
        let err = SecretError::not_found(
            "the key vault \"kv\" not found",
            "make sure that you have the \"Microsoft.KeyVault/vaults/read\" permission",
        );
        let msg = err.to_string();
        assert!(msg.starts_with("the key vault \"kv\" not found"));
        assert!(msg.contains("Microsoft.KeyVault/vaults/read"));
        assert!(err.is_not_found());
    }

    #[test]
    fn test_upstream_message_is_verbatim() {
        let err = SecretError::Upstream("HTTP 500 - boom".to_string());
        assert_eq!(err.to_string(), "HTTP 500 - boom");
        assert_eq!(err.kind(), "upstream");
    }
}
