//! OnboardingManager drives one vendor registration at a time through its
//! phases.
//!
//! A collaborator call is only issued once the phase allows it, the step
//! gate passes and the single in-flight slot is claimed. The flow lock is
//! released while the call is awaited; its result is applied only if the
//! flow has not moved on in the meantime.

use std::sync::{Arc, Mutex};

use chrono::NaiveDate;
use serde::Serialize;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::collaborators::catalog::services_in_category;
use crate::collaborators::{
    BackendClient, Catalog, Geocoder, IdentityService, VendorCategory, VerificationService,
    VerifyCodeRequest,
};
use crate::error::{CollaboratorError, OnboardingError};

use super::codec::{self, DecodeIssue};
use super::model::{IdentityRecord, Location, ProfileUpdate, WorkflowState, WorkflowView};
use super::state::{OnboardingPhase, Operation};
use super::validation::{
    Field, Violations, validate_code, validate_identity, validate_profile, validate_workflow,
};

/// The external services the flow talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub geocoder: Arc<dyn Geocoder>,
    pub verification: Arc<dyn VerificationService>,
    pub identity: Arc<dyn IdentityService>,
    pub catalog: Arc<dyn Catalog>,
}

impl Collaborators {
    /// Wire every backend-owned collaborator to the same REST client.
    pub fn from_backend(backend: BackendClient, geocoder: Arc<dyn Geocoder>) -> Self {
        let backend = Arc::new(backend);
        Self {
            geocoder,
            verification: backend.clone(),
            identity: backend.clone(),
            catalog: backend,
        }
    }
}

/// Phase-specific data. Each variant owns exactly what its step needs.
enum Stage {
    Profile(WorkflowState),
    /// The workflow now lives only in the handoff token.
    AwaitingCode { handoff: String, phone: String },
    VerifyingCode {
        workflow: WorkflowState,
        code: String,
        decode_issues: Vec<DecodeIssue>,
    },
    CollectingIdentity,
    Complete,
}

impl Stage {
    fn phase(&self) -> OnboardingPhase {
        match self {
            Self::Profile(_) => OnboardingPhase::CollectingProfile,
            Self::AwaitingCode { .. } => OnboardingPhase::AwaitingCode,
            Self::VerifyingCode { .. } => OnboardingPhase::VerifyingCode,
            Self::CollectingIdentity => OnboardingPhase::CollectingIdentity,
            Self::Complete => OnboardingPhase::Complete,
        }
    }
}

struct Flow {
    id: Uuid,
    stage: Stage,
    banner: Option<String>,
    violations: Violations,
}

impl Flow {
    fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            stage: Stage::Profile(WorkflowState::default()),
            banner: None,
            violations: Violations::new(),
        }
    }

    fn phase(&self) -> OnboardingPhase {
        self.stage.phase()
    }

    fn advance(&mut self, next: Stage) {
        let (from, to) = (self.stage.phase(), next.phase());
        debug_assert!(from.can_transition_to(to), "{from} -> {to}");
        tracing::info!(flow_id = %self.id, %from, %to, "Onboarding phase advanced");
        self.stage = next;
    }

    fn start(&mut self) {
        self.banner = None;
        self.violations = Violations::new();
    }

    fn reject(&mut self, violations: Violations) -> OnboardingError {
        tracing::debug!(flow_id = %self.id, count = violations.len(), "Step gate rejected input");
        self.violations = violations.clone();
        OnboardingError::Validation(violations)
    }

    fn fail(&mut self, operation: Operation, error: CollaboratorError) -> OnboardingError {
        tracing::warn!(flow_id = %self.id, %operation, service = error.service(), error = %error, "Collaborator call failed");
        self.banner = Some(error.to_string());
        OnboardingError::Collaborator(error)
    }
}

/// Slot holding the one outstanding collaborator call, keyed by flow.
type InFlightSlot = Mutex<Option<(Uuid, Operation)>>;

/// Releases the in-flight slot when the call resolves or its future is dropped.
struct InFlight<'a> {
    slot: &'a InFlightSlot,
    flow_id: Uuid,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        let mut slot = self.slot.lock().unwrap_or_else(|e| e.into_inner());
        if matches!(*slot, Some((id, _)) if id == self.flow_id) {
            *slot = None;
        }
    }
}

/// Status snapshot for the console.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OnboardingStatus {
    pub flow_id: Uuid,
    pub phase: OnboardingPhase,
    /// Call currently outstanding for this flow.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub in_flight: Option<Operation>,
    /// False while a call is outstanding; the console disables its submit button.
    pub submit_enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub banner: Option<String>,
    pub violations: Violations,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workflow: Option<WorkflowView>,
    pub code_entered: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub decode_issues: Vec<DecodeIssue>,
}

/// Coordinates the vendor onboarding flow.
pub struct OnboardingManager {
    collaborators: Collaborators,
    flow: RwLock<Flow>,
    in_flight: InFlightSlot,
    today: Box<dyn Fn() -> NaiveDate + Send + Sync>,
}

impl OnboardingManager {
    pub fn new(collaborators: Collaborators) -> Self {
        Self {
            collaborators,
            flow: RwLock::new(Flow::new()),
            in_flight: Mutex::new(None),
            today: Box::new(|| chrono::Local::now().date_naive()),
        }
    }

    /// Override the clock used for identity expiry checks.
    pub fn with_clock(mut self, today: impl Fn() -> NaiveDate + Send + Sync + 'static) -> Self {
        self.today = Box::new(today);
        self
    }

    /// Get the current phase.
    pub async fn current_phase(&self) -> OnboardingPhase {
        self.flow.read().await.phase()
    }

    /// Get the status snapshot (for the REST endpoint).
    pub async fn status(&self) -> OnboardingStatus {
        let flow = self.flow.read().await;
        let in_flight = self.outstanding(flow.id);
        let (workflow, code_entered, decode_issues) = match &flow.stage {
            Stage::Profile(state) => (Some(state.view()), false, Vec::new()),
            Stage::VerifyingCode {
                workflow,
                code,
                decode_issues,
            } => (Some(workflow.view()), !code.is_empty(), decode_issues.clone()),
            _ => (None, false, Vec::new()),
        };
        OnboardingStatus {
            flow_id: flow.id,
            phase: flow.phase(),
            in_flight,
            submit_enabled: in_flight.is_none() && !flow.phase().is_terminal(),
            banner: flow.banner.clone(),
            violations: flow.violations.clone(),
            workflow,
            code_entered,
            decode_issues,
        }
    }

    /// Clear the error banner.
    pub async fn dismiss_banner(&self) {
        self.flow.write().await.banner = None;
    }

    /// Abandon the current flow and start a fresh one.
    ///
    /// An outstanding call is not cancelled remotely; its result is discarded
    /// when it resolves.
    pub async fn reset(&self) {
        let mut flow = self.flow.write().await;
        let abandoned = flow.id;
        *flow = Flow::new();
        *self.in_flight.lock().unwrap_or_else(|e| e.into_inner()) = None;
        tracing::info!(flow_id = %flow.id, %abandoned, "Onboarding flow reset");
    }

    /// Vendor categories available for selection.
    pub async fn categories(&self) -> Result<Vec<VendorCategory>, OnboardingError> {
        Ok(self.collaborators.catalog.list_categories().await?)
    }

    // ── Profile step ────────────────────────────────────────────────────

    /// Apply field edits to the profile.
    ///
    /// Rejected while the profile submit is outstanding: the submitted
    /// snapshot must be what gets transported.
    pub async fn update_profile(&self, update: ProfileUpdate) -> Result<WorkflowView, OnboardingError> {
        let mut flow = self.flow.write().await;
        let phase = flow.phase();
        if let Some(Operation::SendCode) = self.outstanding(flow.id) {
            return Err(OnboardingError::Busy {
                operation: Operation::SendCode,
            });
        }
        let Stage::Profile(state) = &mut flow.stage else {
            return Err(OnboardingError::InvalidTransition {
                phase,
                action: "edit the profile",
            });
        };

        let mut unknown = Violations::new();
        for sp in &update.prices {
            if !state.service_prices.iter().any(|e| e.service_id == sp.service_id) {
                unknown.add(
                    Field::ServicePrices,
                    format!("Service {} is not part of the selected category", sp.service_id),
                );
            }
        }
        if !unknown.is_empty() {
            return Err(flow.reject(unknown));
        }

        update.apply(state);
        Ok(state.view())
    }

    /// Select a vendor category and reset prices to its services.
    pub async fn select_category(&self, category_id: i64) -> Result<Vec<i64>, OnboardingError> {
        let operation = Operation::LoadServices;
        let (flow_id, _guard) = {
            let mut flow = self.flow.write().await;
            self.ensure_permitted(&flow, operation, "select a category")?;
            if category_id <= 0 {
                return Err(flow.reject(Violations::single(
                    Field::VendorCategoryId,
                    "Please select a vendor category",
                )));
            }
            let guard = self.begin(flow.id, operation)?;
            flow.start();
            (flow.id, guard)
        };

        let result = self.collaborators.catalog.list_services().await;

        let mut flow = self.flow.write().await;
        let services = match result {
            Ok(services) => services,
            Err(e) => return Err(self.fail_if_current(&mut flow, flow_id, operation, e)),
        };
        if flow.id != flow_id {
            return Err(OnboardingError::Superseded { operation });
        }
        let Stage::Profile(state) = &mut flow.stage else {
            return Err(OnboardingError::Superseded { operation });
        };
        let service_ids = services_in_category(&services, category_id);
        state.select_category(category_id, &service_ids);
        tracing::debug!(%flow_id, category_id, services = service_ids.len(), "Category selected");
        Ok(service_ids)
    }

    /// Geocode the current area name and attach the location.
    ///
    /// The result is discarded if the area name changed while the call was
    /// outstanding.
    pub async fn geocode(&self) -> Result<Location, OnboardingError> {
        let operation = Operation::Geocode;
        let (flow_id, area_name, _guard) = {
            let mut flow = self.flow.write().await;
            self.ensure_permitted(&flow, operation, "geocode the area")?;
            let area_name = match &flow.stage {
                Stage::Profile(state) => state.area_name().to_string(),
                _ => String::new(),
            };
            if area_name.trim().is_empty() {
                return Err(flow.reject(Violations::single(
                    Field::AreaName,
                    "Please enter an area name",
                )));
            }
            let guard = self.begin(flow.id, operation)?;
            flow.start();
            (flow.id, area_name, guard)
        };

        let result = self.collaborators.geocoder.geocode(area_name.trim()).await;

        let mut flow = self.flow.write().await;
        let location = match result {
            Ok(location) => location,
            Err(e) => return Err(self.fail_if_current(&mut flow, flow_id, operation, e)),
        };
        if flow.id != flow_id {
            return Err(OnboardingError::Superseded { operation });
        }
        let Stage::Profile(state) = &mut flow.stage else {
            return Err(OnboardingError::Superseded { operation });
        };
        if !state.attach_location(&area_name, location.clone()) {
            tracing::debug!(%flow_id, area = %area_name, "Area changed during geocode, result dropped");
            return Err(OnboardingError::Superseded { operation });
        }
        tracing::info!(%flow_id, area = %area_name, "Area verified");
        Ok(location)
    }

    /// Validate the profile, request a verification code, and hand the
    /// workflow off as a transport token.
    ///
    /// On success the flow is in `AwaitingCode` and the returned token is the
    /// only copy of the workflow.
    pub async fn submit_profile(&self, confirm_password: &str) -> Result<String, OnboardingError> {
        let operation = Operation::SendCode;
        let (flow_id, snapshot, _guard) = {
            let mut flow = self.flow.write().await;
            let phase = flow.phase();
            let Stage::Profile(state) = &flow.stage else {
                return Err(OnboardingError::InvalidTransition {
                    phase,
                    action: "submit the profile",
                });
            };
            let snapshot = state.clone();
            let guard = self.begin(flow.id, operation)?;
            let violations = validate_profile(&snapshot, confirm_password);
            if !violations.is_empty() {
                return Err(flow.reject(violations));
            }
            flow.start();
            (flow.id, snapshot, guard)
        };

        let result = self
            .collaborators
            .verification
            .send_verification_code(&snapshot.phone)
            .await;

        let mut flow = self.flow.write().await;
        if let Err(e) = result {
            return Err(self.fail_if_current(&mut flow, flow_id, operation, e));
        }
        if flow.id != flow_id || flow.phase() != OnboardingPhase::CollectingProfile {
            return Err(OnboardingError::Superseded { operation });
        }

        let handoff = codec::encode(&snapshot);
        flow.advance(Stage::AwaitingCode {
            handoff: handoff.clone(),
            phone: snapshot.phone.clone(),
        });
        Ok(handoff)
    }

    /// Request a fresh code for the phone in the workflow.
    pub async fn resend_code(&self) -> Result<(), OnboardingError> {
        let operation = Operation::SendCode;
        let (flow_id, phone, _guard) = {
            let mut flow = self.flow.write().await;
            self.ensure_permitted(&flow, operation, "resend the code")?;
            let phone = match &flow.stage {
                Stage::AwaitingCode { phone, .. } => phone.clone(),
                Stage::VerifyingCode { workflow, .. } => workflow.phone.clone(),
                _ => {
                    return Err(OnboardingError::InvalidTransition {
                        phase: flow.phase(),
                        action: "resend the code",
                    });
                }
            };
            if phone.trim().is_empty() {
                return Err(flow.reject(Violations::single(Field::Phone, "Phone number is required")));
            }
            let guard = self.begin(flow.id, operation)?;
            flow.start();
            (flow.id, phone, guard)
        };

        let result = self.collaborators.verification.send_verification_code(&phone).await;

        let mut flow = self.flow.write().await;
        match result {
            Ok(()) if flow.id == flow_id => Ok(()),
            Ok(()) => Err(OnboardingError::Superseded { operation }),
            Err(e) => Err(self.fail_if_current(&mut flow, flow_id, operation, e)),
        }
    }

    // ── Verification step ───────────────────────────────────────────────

    /// Enter the verification step from a transport token.
    ///
    /// An empty token reuses the one issued by the profile submit. Decoding
    /// never fails; fields that were missing or unreadable are returned and
    /// the defaulted workflow will be stopped by the gate before the
    /// verification call.
    pub async fn open_verification(&self, token: &str) -> Result<Vec<DecodeIssue>, OnboardingError> {
        let mut flow = self.flow.write().await;
        let phase = flow.phase();
        let Stage::AwaitingCode { handoff, .. } = &flow.stage else {
            return Err(OnboardingError::InvalidTransition {
                phase,
                action: "open verification",
            });
        };

        let token = token.trim_start_matches('?');
        let decoded = codec::decode(if token.is_empty() { handoff } else { token });
        if !decoded.is_clean() {
            tracing::warn!(flow_id = %flow.id, issues = decoded.issues.len(), "Handoff token decoded with defaults");
        }
        let issues = decoded.issues.clone();
        flow.start();
        flow.advance(Stage::VerifyingCode {
            workflow: decoded.state,
            code: String::new(),
            decode_issues: decoded.issues,
        });
        Ok(issues)
    }

    /// Submit the verification code. On success the account exists and the
    /// workflow is discarded; on failure only the code is cleared.
    pub async fn submit_code(&self, code: &str) -> Result<(), OnboardingError> {
        let operation = Operation::VerifyCode;
        let code = code.trim().to_string();
        let (flow_id, snapshot, _guard) = {
            let mut flow = self.flow.write().await;
            self.ensure_permitted(&flow, operation, "submit the code")?;
            let phase = flow.phase();
            let guard = self.begin(flow.id, operation)?;
            let Stage::VerifyingCode {
                workflow,
                code: entered,
                ..
            } = &mut flow.stage
            else {
                return Err(OnboardingError::InvalidTransition {
                    phase,
                    action: "submit the code",
                });
            };
            let mut violations = validate_code(&code);
            for v in validate_workflow(workflow).iter() {
                violations.add(v.field, format!("Please fill missing fields: {}", v.message));
            }
            if !violations.is_empty() {
                return Err(flow.reject(violations));
            }
            *entered = code.clone();
            let snapshot = workflow.clone();
            flow.start();
            (flow.id, snapshot, guard)
        };

        let request = VerifyCodeRequest::from_workflow(&snapshot, &code)?;
        let result = self
            .collaborators
            .verification
            .verify_code_and_create_user(&request)
            .await;

        let mut flow = self.flow.write().await;
        if flow.id != flow_id || flow.phase() != OnboardingPhase::VerifyingCode {
            return Err(match result {
                Ok(()) => OnboardingError::Superseded { operation },
                Err(e) => OnboardingError::Collaborator(e),
            });
        }
        match result {
            Ok(()) => {
                flow.advance(Stage::CollectingIdentity);
                Ok(())
            }
            Err(e) => {
                if let Stage::VerifyingCode { code, .. } = &mut flow.stage {
                    code.clear();
                }
                Err(flow.fail(operation, e))
            }
        }
    }

    // ── Identity step ───────────────────────────────────────────────────

    /// Submit identity document fields for the created account.
    pub async fn submit_identity(&self, record: IdentityRecord) -> Result<(), OnboardingError> {
        let operation = Operation::UploadIdentity;
        let record = record.normalized();
        let (flow_id, _guard) = {
            let mut flow = self.flow.write().await;
            self.ensure_permitted(&flow, operation, "submit identity details")?;
            let violations = validate_identity(&record, (self.today)());
            if !violations.is_empty() {
                return Err(flow.reject(violations));
            }
            let guard = self.begin(flow.id, operation)?;
            flow.start();
            (flow.id, guard)
        };

        let result = self.collaborators.identity.upload_identity(&record).await;

        let mut flow = self.flow.write().await;
        match result {
            Ok(()) if flow.id == flow_id && flow.phase() == OnboardingPhase::CollectingIdentity => {
                flow.advance(Stage::Complete);
                Ok(())
            }
            Ok(()) => Err(OnboardingError::Superseded { operation }),
            Err(e) => Err(self.fail_if_current(&mut flow, flow_id, operation, e)),
        }
    }

    // ── Helpers ─────────────────────────────────────────────────────────

    fn ensure_permitted(
        &self,
        flow: &Flow,
        operation: Operation,
        action: &'static str,
    ) -> Result<(), OnboardingError> {
        let phase = flow.phase();
        if phase.permits(operation) {
            Ok(())
        } else {
            Err(OnboardingError::InvalidTransition { phase, action })
        }
    }

    /// Claim the in-flight slot for `flow_id`.
    fn begin(&self, flow_id: Uuid, operation: Operation) -> Result<InFlight<'_>, OnboardingError> {
        let mut slot = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        if let Some((id, current)) = *slot {
            if id == flow_id {
                tracing::debug!(%flow_id, %current, requested = %operation, "Call already in flight");
                return Err(OnboardingError::Busy { operation: current });
            }
        }
        *slot = Some((flow_id, operation));
        Ok(InFlight {
            slot: &self.in_flight,
            flow_id,
        })
    }

    fn outstanding(&self, flow_id: Uuid) -> Option<Operation> {
        match *self.in_flight.lock().unwrap_or_else(|e| e.into_inner()) {
            Some((id, operation)) if id == flow_id => Some(operation),
            _ => None,
        }
    }

    /// Record a collaborator failure on the flow if it is still the one
    /// that issued the call.
    fn fail_if_current(
        &self,
        flow: &mut Flow,
        flow_id: Uuid,
        operation: Operation,
        error: CollaboratorError,
    ) -> OnboardingError {
        if flow.id == flow_id {
            flow.fail(operation, error)
        } else {
            OnboardingError::Collaborator(error)
        }
    }
}
