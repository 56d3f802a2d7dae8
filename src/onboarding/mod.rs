//! Vendor onboarding, the multi-step registration flow run from the admin console.
//!
//! An operator fills in a vendor profile, the vendor's phone receives a
//! one-time code, the code creates the account, and identity document fields
//! are attached to it. The workflow crosses the profile → verification page
//! boundary only as a URL-safe transport token (`codec`), so the verification
//! step always re-validates what it decoded before calling the backend.

pub mod codec;
pub mod manager;
pub mod model;
pub mod routes;
pub mod state;
pub mod validation;

pub use codec::{DecodeIssue, Decoded};
pub use manager::{Collaborators, OnboardingManager, OnboardingStatus};
pub use model::{IdentityRecord, Location, ProfileUpdate, WorkflowState, WorkflowView};
pub use routes::{OnboardingRouteState, onboarding_routes};
pub use state::{OnboardingPhase, Operation};
pub use validation::{Field, Violation, Violations};
