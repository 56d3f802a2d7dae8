//! External collaborators the onboarding flow calls but does not own.
//!
//! Each collaborator is a trait so the flow can be driven against stubs;
//! the reqwest-backed implementations live in the submodules.

pub mod accounts;
pub mod backend;
pub mod catalog;
pub mod geocoding;

use async_trait::async_trait;

use crate::error::CollaboratorError;
use crate::onboarding::model::{IdentityRecord, Location};

pub use accounts::VerifyCodeRequest;
pub use backend::BackendClient;
pub use catalog::{CatalogService, VendorCategory};
pub use geocoding::GoogleGeocoder;

/// Resolves a free-text area name to a location.
#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn geocode(&self, area_name: &str) -> Result<Location, CollaboratorError>;
}

/// Issues one-time codes and creates the vendor account once a code is accepted.
#[async_trait]
pub trait VerificationService: Send + Sync {
    /// Ask the backend to send a fresh code to `phone`.
    async fn send_verification_code(&self, phone: &str) -> Result<(), CollaboratorError>;

    /// Exchange the workflow and code for a created account.
    async fn verify_code_and_create_user(
        &self,
        request: &VerifyCodeRequest<'_>,
    ) -> Result<(), CollaboratorError>;
}

/// Accepts identity document fields for the newly created account.
#[async_trait]
pub trait IdentityService: Send + Sync {
    async fn upload_identity(&self, record: &IdentityRecord) -> Result<(), CollaboratorError>;
}

/// Read-only access to vendor categories and their services.
#[async_trait]
pub trait Catalog: Send + Sync {
    async fn list_categories(&self) -> Result<Vec<VendorCategory>, CollaboratorError>;

    async fn list_services(&self) -> Result<Vec<CatalogService>, CollaboratorError>;
}
