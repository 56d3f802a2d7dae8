//! REST endpoints driving the onboarding flow from the admin console.

use std::sync::Arc;

use axum::extract::{RawQuery, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;

use super::manager::OnboardingManager;
use super::model::{IdentityRecord, ProfileUpdate};
use crate::error::{CollaboratorError, OnboardingError};

/// Shared state for onboarding routes.
#[derive(Clone)]
pub struct OnboardingRouteState {
    pub manager: Arc<OnboardingManager>,
}

impl IntoResponse for OnboardingError {
    fn into_response(self) -> Response {
        let message = self.to_string();
        match self {
            Self::Validation(violations) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(json!({"error": "Validation failed", "violations": violations})),
            )
                .into_response(),
            Self::Collaborator(CollaboratorError::NoMatch { .. }) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(json!({"error": message})),
            )
                .into_response(),
            Self::Collaborator(_) => {
                (StatusCode::BAD_GATEWAY, Json(json!({"error": message}))).into_response()
            }
            Self::InvalidTransition { .. } | Self::Busy { .. } | Self::Superseded { .. } => {
                (StatusCode::CONFLICT, Json(json!({"error": message}))).into_response()
            }
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CategoryRequest {
    vendor_category_id: i64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubmitRequest {
    #[serde(default)]
    confirm_password: String,
}

#[derive(Debug, Deserialize)]
struct CodeRequest {
    #[serde(default)]
    code: String,
}

// ── Health / status ─────────────────────────────────────────────────────

async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "vendor-onboard"
    }))
}

/// GET /api/onboarding/status
async fn get_status(State(state): State<OnboardingRouteState>) -> impl IntoResponse {
    Json(state.manager.status().await)
}

/// GET /api/onboarding/categories
async fn list_categories(
    State(state): State<OnboardingRouteState>,
) -> Result<impl IntoResponse, OnboardingError> {
    Ok(Json(state.manager.categories().await?))
}

// ── Profile ─────────────────────────────────────────────────────────────

/// POST /api/onboarding/profile
///
/// Partial edit; absent fields are left as they are.
async fn update_profile(
    State(state): State<OnboardingRouteState>,
    Json(update): Json<ProfileUpdate>,
) -> Result<impl IntoResponse, OnboardingError> {
    Ok(Json(state.manager.update_profile(update).await?))
}

/// POST /api/onboarding/category
async fn select_category(
    State(state): State<OnboardingRouteState>,
    Json(request): Json<CategoryRequest>,
) -> Result<impl IntoResponse, OnboardingError> {
    let service_ids = state
        .manager
        .select_category(request.vendor_category_id)
        .await?;
    Ok(Json(json!({
        "vendorCategoryId": request.vendor_category_id,
        "serviceIds": service_ids,
    })))
}

/// POST /api/onboarding/geocode
async fn geocode(
    State(state): State<OnboardingRouteState>,
) -> Result<impl IntoResponse, OnboardingError> {
    Ok(Json(state.manager.geocode().await?))
}

/// POST /api/onboarding/submit
///
/// On success the response carries the transport token the console appends
/// to the verification page URL.
async fn submit_profile(
    State(state): State<OnboardingRouteState>,
    Json(request): Json<SubmitRequest>,
) -> Result<impl IntoResponse, OnboardingError> {
    let handoff = state.manager.submit_profile(&request.confirm_password).await?;
    Ok(Json(json!({
        "next": format!("/api/onboarding/verification?{handoff}"),
        "handoff": handoff,
    })))
}

// ── Verification ────────────────────────────────────────────────────────

/// GET /api/onboarding/verification?<token>
async fn open_verification(
    State(state): State<OnboardingRouteState>,
    RawQuery(query): RawQuery,
) -> Result<impl IntoResponse, OnboardingError> {
    let issues = state
        .manager
        .open_verification(query.as_deref().unwrap_or_default())
        .await?;
    Ok(Json(json!({
        "phase": state.manager.current_phase().await,
        "decodeIssues": issues,
    })))
}

/// POST /api/onboarding/resend-code
async fn resend_code(
    State(state): State<OnboardingRouteState>,
) -> Result<impl IntoResponse, OnboardingError> {
    state.manager.resend_code().await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/onboarding/code
async fn submit_code(
    State(state): State<OnboardingRouteState>,
    Json(request): Json<CodeRequest>,
) -> Result<impl IntoResponse, OnboardingError> {
    state.manager.submit_code(&request.code).await?;
    Ok(Json(json!({"phase": state.manager.current_phase().await})))
}

// ── Identity ────────────────────────────────────────────────────────────

/// POST /api/onboarding/identity
async fn submit_identity(
    State(state): State<OnboardingRouteState>,
    Json(record): Json<IdentityRecord>,
) -> Result<impl IntoResponse, OnboardingError> {
    state.manager.submit_identity(record).await?;
    Ok(Json(json!({"phase": state.manager.current_phase().await})))
}

// ── Flow control ────────────────────────────────────────────────────────

/// POST /api/onboarding/dismiss
async fn dismiss_banner(State(state): State<OnboardingRouteState>) -> impl IntoResponse {
    state.manager.dismiss_banner().await;
    StatusCode::NO_CONTENT
}

/// POST /api/onboarding/reset
async fn reset(State(state): State<OnboardingRouteState>) -> impl IntoResponse {
    state.manager.reset().await;
    Json(state.manager.status().await)
}

/// Build the onboarding REST routes.
pub fn onboarding_routes(state: OnboardingRouteState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/onboarding/status", get(get_status))
        .route("/api/onboarding/categories", get(list_categories))
        .route("/api/onboarding/profile", post(update_profile))
        .route("/api/onboarding/category", post(select_category))
        .route("/api/onboarding/geocode", post(geocode))
        .route("/api/onboarding/submit", post(submit_profile))
        .route("/api/onboarding/verification", get(open_verification))
        .route("/api/onboarding/resend-code", post(resend_code))
        .route("/api/onboarding/code", post(submit_code))
        .route("/api/onboarding/identity", post(submit_identity))
        .route("/api/onboarding/dismiss", post(dismiss_banner))
        .route("/api/onboarding/reset", post(reset))
        .with_state(state)
}
