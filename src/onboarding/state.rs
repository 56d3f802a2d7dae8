//! Onboarding phases, their transitions, and the operations each phase permits.

use serde::{Deserialize, Serialize};

/// The phases of vendor onboarding.
///
/// Progresses linearly: CollectingProfile → AwaitingCode → VerifyingCode →
/// CollectingIdentity → Complete. Failures never leave a phase; they keep the
/// flow where it is so the operator can retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnboardingPhase {
    CollectingProfile,
    AwaitingCode,
    VerifyingCode,
    CollectingIdentity,
    Complete,
}

impl OnboardingPhase {
    /// Check if a transition from `self` to `target` is valid.
    pub fn can_transition_to(&self, target: OnboardingPhase) -> bool {
        use OnboardingPhase::*;
        matches!(
            (self, target),
            (CollectingProfile, AwaitingCode)
                | (AwaitingCode, VerifyingCode)
                | (VerifyingCode, CollectingIdentity)
                | (CollectingIdentity, Complete)
        )
    }

    /// Whether this phase is terminal (onboarding is done).
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete)
    }

    /// Whether `operation` may be started while in this phase.
    pub fn permits(&self, operation: Operation) -> bool {
        use OnboardingPhase::*;
        use Operation::*;
        matches!(
            (self, operation),
            (CollectingProfile, LoadServices)
                | (CollectingProfile, Geocode)
                | (CollectingProfile, SendCode)
                | (AwaitingCode, SendCode)
                | (VerifyingCode, SendCode)
                | (VerifyingCode, VerifyCode)
                | (CollectingIdentity, UploadIdentity)
        )
    }
}

impl Default for OnboardingPhase {
    fn default() -> Self {
        Self::CollectingProfile
    }
}

impl std::fmt::Display for OnboardingPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::CollectingProfile => "collecting_profile",
            Self::AwaitingCode => "awaiting_code",
            Self::VerifyingCode => "verifying_code",
            Self::CollectingIdentity => "collecting_identity",
            Self::Complete => "complete",
        };
        write!(f, "{s}")
    }
}

/// Asynchronous collaborator calls the flow can have outstanding.
///
/// At most one is in flight at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    LoadServices,
    Geocode,
    SendCode,
    VerifyCode,
    UploadIdentity,
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::LoadServices => "load_services",
            Self::Geocode => "geocode",
            Self::SendCode => "send_code",
            Self::VerifyCode => "verify_code",
            Self::UploadIdentity => "upload_identity",
        };
        write!(f, "{s}")
    }
}
