use std::sync::Arc;

use anyhow::Context;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use vendor_onboard::collaborators::{BackendClient, GoogleGeocoder};
use vendor_onboard::config::OnboardConfig;
use vendor_onboard::onboarding::{
    Collaborators, OnboardingManager, OnboardingRouteState, onboarding_routes,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = OnboardConfig::from_env().context("Failed to load configuration")?;

    eprintln!("Vendor Onboard v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Backend: {}", config.api_base_url);
    eprintln!(
        "   Admin token: {}",
        if config.admin_token.is_some() { "set" } else { "not set" }
    );
    eprintln!("   API: http://0.0.0.0:{}/api/onboarding/status\n", config.port);

    // ── Collaborators ────────────────────────────────────────────────────
    let backend = BackendClient::from_config(&config)?;
    let geocoder = Arc::new(GoogleGeocoder::from_config(&config)?);
    let manager = Arc::new(OnboardingManager::new(Collaborators::from_backend(
        backend, geocoder,
    )));

    // ── HTTP server ──────────────────────────────────────────────────────
    let app = onboarding_routes(OnboardingRouteState { manager }).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive()),
    );

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port))
        .await
        .with_context(|| format!("Failed to bind port {}", config.port))?;
    tracing::info!(port = config.port, "Onboarding API started");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            tracing::info!("Shutdown requested");
        })
        .await
        .context("Server error")?;

    Ok(())
}
