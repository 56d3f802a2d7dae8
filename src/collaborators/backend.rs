//! Shared HTTP client for the marketplace REST backend.

use reqwest::RequestBuilder;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::config::OnboardConfig;
use crate::error::{CollaboratorError, ConfigError};

/// Thin wrapper around `reqwest::Client` that knows the backend base URL,
/// attaches the admin token, and normalizes failures.
#[derive(Clone)]
pub struct BackendClient {
    client: reqwest::Client,
    base_url: String,
    admin_token: Option<SecretString>,
}

impl BackendClient {
    pub fn new(client: reqwest::Client, base_url: &str, admin_token: Option<SecretString>) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            admin_token,
        }
    }

    pub fn from_config(config: &OnboardConfig) -> Result<Self, ConfigError> {
        Ok(Self::new(
            config.http_client()?,
            &config.api_base_url,
            config.admin_token.clone(),
        ))
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.admin_token {
            Some(token) => request.bearer_auth(token.expose_secret()),
            None => request,
        }
    }

    /// POST a JSON body; returns the response body as JSON (`{}` when empty).
    ///
    /// Non-2xx responses become `Rejected` with the body's `message` when
    /// present, `fallback` otherwise.
    pub async fn post_json<B: Serialize + ?Sized>(
        &self,
        service: &str,
        path: &str,
        body: &B,
        fallback: &str,
    ) -> Result<Value, CollaboratorError> {
        let request = self.authorize(self.client.post(self.url(path)).json(body));
        self.execute(service, path, request, fallback).await
    }

    /// GET and deserialize a JSON response.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        service: &str,
        path: &str,
        fallback: &str,
    ) -> Result<T, CollaboratorError> {
        let request = self.authorize(self.client.get(self.url(path)));
        let value = self.execute(service, path, request, fallback).await?;
        serde_json::from_value(value).map_err(|e| CollaboratorError::InvalidResponse {
            service: service.to_string(),
            reason: e.to_string(),
        })
    }

    async fn execute(
        &self,
        service: &str,
        path: &str,
        request: RequestBuilder,
        fallback: &str,
    ) -> Result<Value, CollaboratorError> {
        let response = request.send().await.map_err(|e| {
            tracing::warn!(service, path, error = %e, "Backend request failed");
            CollaboratorError::RequestFailed {
                service: service.to_string(),
                reason: e.to_string(),
            }
        })?;

        let status = response.status();
        let text = match response.text().await {
            Ok(text) => text,
            Err(e) if status.is_success() => {
                tracing::warn!(service, path, error = %e, "Backend response body unreadable");
                return Err(CollaboratorError::InvalidResponse {
                    service: service.to_string(),
                    reason: format!("failed to read response body: {e}"),
                });
            }
            // the rejection below falls back to the generic message
            Err(_) => String::new(),
        };
        let body = parse_body(&text);

        if !status.is_success() {
            let message = error_message(&body).unwrap_or(fallback).to_string();
            tracing::info!(service, path, status = status.as_u16(), %message, "Backend rejected request");
            return Err(CollaboratorError::Rejected {
                service: service.to_string(),
                status: status.as_u16(),
                message,
            });
        }

        match body {
            Some(value) => Ok(value),
            None if text.trim().is_empty() => Ok(Value::Object(Default::default())),
            None => Err(CollaboratorError::InvalidResponse {
                service: service.to_string(),
                reason: "response body is not JSON".to_string(),
            }),
        }
    }
}

fn parse_body(text: &str) -> Option<Value> {
    if text.trim().is_empty() {
        return None;
    }
    serde_json::from_str(text).ok()
}

/// The `message` field of a backend JSON body, if any.
pub(crate) fn error_message(body: &Option<Value>) -> Option<&str> {
    body.as_ref()?
        .get("message")?
        .as_str()
        .filter(|m| !m.trim().is_empty())
}
