//! Account collaborator: phone verification, account creation and identity upload.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::Value;

use super::backend::BackendClient;
use super::{IdentityService, VerificationService};
use crate::error::CollaboratorError;
use crate::onboarding::model::{IdentityRecord, Location, WorkflowState};
use crate::onboarding::validation::{Field, Violations};

const VERIFICATION: &str = "verification";
const IDENTITY: &str = "identity";

/// Backend reply that counts as a successful registration when `success` is absent.
pub const REGISTERED_MESSAGE: &str = "User verified and registered.";

/// Role every onboarded account is created with.
pub const VENDOR_ROLE: &str = "vendor";

/// A priced service as sent to the backend.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PricedService {
    pub service_id: i64,
    pub price: Decimal,
}

/// Body of `POST /users/verify-code-and-create-user`.
///
/// Deliberately not `Debug`: it carries the password.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyCodeRequest<'a> {
    pub name: &'a str,
    pub phone: &'a str,
    pub password: &'a str,
    pub location: &'a Location,
    pub role: &'static str,
    pub code: &'a str,
    pub service_area: u8,
    pub vendor_category_id: i64,
    pub service_prices: Vec<PricedService>,
    pub has_smartphone: bool,
    pub phone_for_calls: &'a str,
}

impl<'a> VerifyCodeRequest<'a> {
    /// Build the request from a workflow. Fails with the violations for any
    /// field the wire format cannot represent.
    pub fn from_workflow(state: &'a WorkflowState, code: &'a str) -> Result<Self, Violations> {
        let mut violations = Violations::new();

        let location = state.location();
        if location.is_none() {
            violations.add(Field::Location, "Please enter and verify the area name");
        }
        let category = state.vendor_category_id.filter(|id| *id > 0);
        if category.is_none() {
            violations.add(Field::VendorCategoryId, "Please select a vendor category");
        }
        let service_prices: Option<Vec<PricedService>> = state
            .service_prices
            .iter()
            .map(|sp| {
                sp.positive_price().map(|price| PricedService {
                    service_id: sp.service_id,
                    price,
                })
            })
            .collect();
        if service_prices.is_none() {
            violations.add(Field::ServicePrices, "Please enter valid prices for all services");
        }

        match (location, category, service_prices) {
            (Some(location), Some(vendor_category_id), Some(service_prices)) => Ok(Self {
                name: &state.name,
                phone: &state.phone,
                password: state.password.expose(),
                location,
                role: VENDOR_ROLE,
                code,
                service_area: state.service_area,
                vendor_category_id,
                service_prices,
                has_smartphone: state.has_smartphone,
                phone_for_calls: &state.phone_for_calls,
            }),
            _ => Err(violations),
        }
    }
}

#[derive(Serialize)]
struct SendCodeBody<'a> {
    phone: &'a str,
}

fn success_flag(body: &Value) -> Option<bool> {
    body.get("success").and_then(Value::as_bool)
}

fn message(body: &Value) -> Option<&str> {
    body.get("message").and_then(Value::as_str)
}

#[async_trait]
impl VerificationService for BackendClient {
    async fn send_verification_code(&self, phone: &str) -> Result<(), CollaboratorError> {
        self.post_json(
            VERIFICATION,
            "/users/send-verification-code",
            &SendCodeBody { phone },
            "Failed to send verification code. Please try again.",
        )
        .await?;
        tracing::info!("Verification code requested");
        Ok(())
    }

    async fn verify_code_and_create_user(
        &self,
        request: &VerifyCodeRequest<'_>,
    ) -> Result<(), CollaboratorError> {
        let body = self
            .post_json(
                VERIFICATION,
                "/users/verify-code-and-create-user",
                request,
                "Failed to verify code. Please try again.",
            )
            .await?;

        let accepted =
            success_flag(&body) == Some(true) || message(&body) == Some(REGISTERED_MESSAGE);
        if accepted {
            tracing::info!("Vendor account created");
            return Ok(());
        }

        Err(CollaboratorError::Rejected {
            service: VERIFICATION.to_string(),
            status: 200,
            message: message(&body).unwrap_or("Verification failed").to_string(),
        })
    }
}

#[async_trait]
impl IdentityService for BackendClient {
    async fn upload_identity(&self, record: &IdentityRecord) -> Result<(), CollaboratorError> {
        let body = self
            .post_json(
                IDENTITY,
                "/users/upload-cnic",
                record,
                "Failed to upload CNIC details. Please try again.",
            )
            .await?;

        if success_flag(&body) == Some(true) {
            tracing::info!("Identity details uploaded");
            return Ok(());
        }

        Err(CollaboratorError::Rejected {
            service: IDENTITY.to_string(),
            status: 200,
            message: message(&body)
                .unwrap_or("Failed to upload CNIC details")
                .to_string(),
        })
    }
}
