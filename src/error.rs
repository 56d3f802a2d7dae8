//! Error types for vendor onboarding.

use crate::onboarding::state::{OnboardingPhase, Operation};
use crate::onboarding::validation::Violations;

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Collaborator error: {0}")]
    Collaborator(#[from] CollaboratorError),

    #[error("Onboarding error: {0}")]
    Onboarding(#[from] OnboardingError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Failed to build HTTP client: {0}")]
    HttpClient(String),
}

/// Failures reported by (or while talking to) an external collaborator.
///
/// Adapters normalize every transport or response problem into one of these
/// before anything reaches the onboarding manager.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CollaboratorError {
    #[error("{service} request failed: {reason}")]
    RequestFailed { service: String, reason: String },

    #[error("{message}")]
    Rejected {
        service: String,
        status: u16,
        message: String,
    },

    #[error("Invalid response from {service}: {reason}")]
    InvalidResponse { service: String, reason: String },

    #[error("Could not find location for \"{area}\". Please try a different area name.")]
    NoMatch { area: String },
}

impl CollaboratorError {
    /// Name of the collaborator that produced the error.
    pub fn service(&self) -> &str {
        match self {
            Self::RequestFailed { service, .. }
            | Self::Rejected { service, .. }
            | Self::InvalidResponse { service, .. } => service,
            Self::NoMatch { .. } => "geocoding",
        }
    }
}

/// Errors surfaced by the onboarding state machine.
///
/// None of these are fatal: the flow stays in (or returns to) an interactive
/// phase after every one of them.
#[derive(Debug, thiserror::Error)]
pub enum OnboardingError {
    #[error("Validation failed: {0}")]
    Validation(Violations),

    #[error(transparent)]
    Collaborator(#[from] CollaboratorError),

    #[error("Cannot {action} while in phase {phase}")]
    InvalidTransition {
        phase: OnboardingPhase,
        action: &'static str,
    },

    #[error("A {operation} request is already in flight")]
    Busy { operation: Operation },

    #[error("The {operation} result was discarded because the flow changed while it was in flight")]
    Superseded { operation: Operation },
}

impl From<Violations> for OnboardingError {
    fn from(violations: Violations) -> Self {
        Self::Validation(violations)
    }
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, Error>;
