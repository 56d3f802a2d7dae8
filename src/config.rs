//! Configuration types.

use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;

/// Default Google geocoding endpoint.
pub const DEFAULT_GEOCODE_URL: &str = "https://maps.googleapis.com/maps/api/geocode/json";

/// Onboarding service configuration, built from environment variables.
#[derive(Debug, Clone)]
pub struct OnboardConfig {
    /// Base URL of the marketplace REST backend (no trailing slash).
    pub api_base_url: String,
    /// Admin bearer token attached to backend calls, if any.
    pub admin_token: Option<SecretString>,
    /// Geocoding endpoint.
    pub geocode_url: String,
    /// Geocoding API key.
    pub geocode_api_key: SecretString,
    /// Timeout applied to every outbound HTTP call.
    pub http_timeout: Duration,
    /// Port the console API listens on.
    pub port: u16,
}

impl OnboardConfig {
    /// Build config from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from an arbitrary key lookup (used by `from_env` and tests).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_base_url = lookup("ONBOARD_API_BASE_URL")
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingEnvVar("ONBOARD_API_BASE_URL".to_string()))?;
        url::Url::parse(&api_base_url).map_err(|e| ConfigError::InvalidValue {
            key: "ONBOARD_API_BASE_URL".to_string(),
            message: e.to_string(),
        })?;

        let admin_token = lookup("ONBOARD_ADMIN_TOKEN")
            .filter(|s| !s.is_empty())
            .map(SecretString::from);

        let geocode_api_key = lookup("GOOGLE_MAPS_API_KEY")
            .filter(|s| !s.is_empty())
            .map(SecretString::from)
            .ok_or_else(|| ConfigError::MissingEnvVar("GOOGLE_MAPS_API_KEY".to_string()))?;

        let geocode_url =
            lookup("ONBOARD_GEOCODE_URL").unwrap_or_else(|| DEFAULT_GEOCODE_URL.to_string());

        let http_timeout_secs: u64 = parse_or("ONBOARD_HTTP_TIMEOUT_SECS", &lookup, 15)?;
        let port: u16 = parse_or("ONBOARD_PORT", &lookup, 8080)?;

        Ok(Self {
            api_base_url: api_base_url.trim_end_matches('/').to_string(),
            admin_token,
            geocode_url,
            geocode_api_key,
            http_timeout: Duration::from_secs(http_timeout_secs),
            port,
        })
    }

    /// Build the shared reqwest client with the configured timeout.
    pub fn http_client(&self) -> Result<reqwest::Client, ConfigError> {
        reqwest::Client::builder()
            .timeout(self.http_timeout)
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))
    }
}

fn parse_or<T, F>(key: &str, lookup: &F, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        }),
        None => Ok(default),
    }
}
