use thiserror::Error;

use crate::config::ConfigError;

/// Core error type for the wiregraph resolver
///
/// These errors signal a defect in the resolver itself or unusable input.
/// Problems with the user's declarations are reported as
/// [`Finding`](crate::validation::Finding)s and never through this type.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Internal invariant violated: {message}")]
    InvariantViolation { message: String },

    #[error("Emission failed for component '{component}': {message}")]
    Emission { component: String, message: String },
}

impl CoreError {
    /// Create a new validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create a new configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a new invariant violation
    pub fn invariant(message: impl Into<String>) -> Self {
        Self::InvariantViolation {
            message: message.into(),
        }
    }

    /// Create a new emission error
    pub fn emission(component: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Emission {
            component: component.into(),
            message: message.into(),
        }
    }

    /// Check if the error is a validation error
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }

    /// Check if the error signals a resolver defect
    pub fn is_invariant_violation(&self) -> bool {
        matches!(self, Self::InvariantViolation { .. })
    }
}
