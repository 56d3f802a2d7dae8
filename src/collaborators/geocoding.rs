//! Geocoding adapter for the Google Geocoding API.

use async_trait::async_trait;
use chrono::Utc;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use super::Geocoder;
use crate::config::OnboardConfig;
use crate::error::{CollaboratorError, ConfigError};
use crate::onboarding::model::Location;

const SERVICE: &str = "geocoding";

#[derive(Debug, Deserialize)]
struct GeocodeResponse {
    status: String,
    #[serde(default)]
    results: Vec<GeocodeResult>,
}

#[derive(Debug, Deserialize)]
struct GeocodeResult {
    geometry: Geometry,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    location: LatLng,
}

#[derive(Debug, Deserialize)]
struct LatLng {
    lat: f64,
    lng: f64,
}

/// Geocoder backed by the Google Geocoding JSON endpoint.
pub struct GoogleGeocoder {
    client: reqwest::Client,
    endpoint: String,
    api_key: SecretString,
}

impl GoogleGeocoder {
    pub fn new(client: reqwest::Client, endpoint: &str, api_key: SecretString) -> Self {
        Self {
            client,
            endpoint: endpoint.to_string(),
            api_key,
        }
    }

    pub fn from_config(config: &OnboardConfig) -> Result<Self, ConfigError> {
        Ok(Self::new(
            config.http_client()?,
            &config.geocode_url,
            config.geocode_api_key.clone(),
        ))
    }
}

#[async_trait]
impl Geocoder for GoogleGeocoder {
    async fn geocode(&self, area_name: &str) -> Result<Location, CollaboratorError> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("address", area_name), ("key", self.api_key.expose_secret())])
            .send()
            .await
            // the request URL carries the API key
            .map_err(|e| CollaboratorError::RequestFailed {
                service: SERVICE.to_string(),
                reason: e.without_url().to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(CollaboratorError::Rejected {
                service: SERVICE.to_string(),
                status: status.as_u16(),
                message: "Error geocoding location. Please try again.".to_string(),
            });
        }

        let body: GeocodeResponse =
            response
                .json()
                .await
                .map_err(|e| CollaboratorError::InvalidResponse {
                    service: SERVICE.to_string(),
                    reason: e.without_url().to_string(),
                })?;

        match body.results.first() {
            Some(first) if body.status == "OK" => {
                let LatLng { lat, lng } = first.geometry.location;
                tracing::debug!(area = area_name, lat, lng, "Area geocoded");
                Ok(Location::geocoded(lat, lng, Utc::now()))
            }
            _ => {
                tracing::info!(area = area_name, status = %body.status, "No geocoding match");
                Err(CollaboratorError::NoMatch {
                    area: area_name.to_string(),
                })
            }
        }
    }
}
