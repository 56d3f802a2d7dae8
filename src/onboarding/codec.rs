//! Page-transport codec for `WorkflowState`.
//!
//! The workflow is flattened into a URL query string. Scalars are written as
//! plain parameters; `servicePrices` and `location` are JSON documents carried
//! as single parameter values. Decoding is total: anything missing or
//! malformed falls back to the documented default and is reported as a
//! `DecodeIssue` instead of failing.

use std::collections::HashMap;

use serde::Serialize;
use url::form_urlencoded;

use super::model::{
    DEFAULT_SERVICE_AREA_KM, Location, Password, SERVICE_AREA_RANGE_KM, ServicePrice,
    WorkflowState,
};

/// Query parameter names.
pub mod keys {
    pub const NAME: &str = "name";
    pub const PHONE: &str = "phoneNumber";
    pub const PASSWORD: &str = "password";
    pub const SERVICE_AREA: &str = "serviceArea";
    pub const VENDOR_CATEGORY_ID: &str = "vendorCategoryId";
    pub const SERVICE_PRICES: &str = "servicePrices";
    pub const HAS_SMARTPHONE: &str = "hasSmartphone";
    pub const PHONE_FOR_CALLS: &str = "phoneForCalls";
    pub const AREA_NAME: &str = "areaName";
    pub const LOCATION: &str = "location";
}

/// A field that was absent or unreadable and got its default value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DecodeIssue {
    pub field: &'static str,
    pub reason: String,
}

/// Result of decoding a transport token.
#[derive(Debug, Clone)]
pub struct Decoded {
    pub state: WorkflowState,
    pub issues: Vec<DecodeIssue>,
}

impl Decoded {
    /// True when every field was present and readable.
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }
}

/// Encode a workflow into a query string (without the leading `?`).
pub fn encode(state: &WorkflowState) -> String {
    let mut query = form_urlencoded::Serializer::new(String::new());
    query
        .append_pair(keys::NAME, &state.name)
        .append_pair(keys::PHONE, &state.phone)
        .append_pair(keys::PASSWORD, state.password.expose())
        .append_pair(keys::SERVICE_AREA, &state.service_area.to_string());

    if let Some(id) = state.vendor_category_id {
        query.append_pair(keys::VENDOR_CATEGORY_ID, &id.to_string());
    }

    query
        .append_pair(keys::SERVICE_PRICES, &json_param(&state.service_prices))
        .append_pair(keys::HAS_SMARTPHONE, if state.has_smartphone { "true" } else { "false" })
        .append_pair(keys::PHONE_FOR_CALLS, &state.phone_for_calls)
        .append_pair(keys::AREA_NAME, state.area_name());

    if let Some(location) = state.location() {
        query.append_pair(keys::LOCATION, &json_param(location));
    }

    query.finish()
}

fn json_param<T: Serialize + ?Sized>(value: &T) -> String {
    // Plain data structs with string keys; serialization cannot fail.
    serde_json::to_string(value).unwrap_or_default()
}

/// Decode a query string (with or without a leading `?`). Never fails.
pub fn decode(token: &str) -> Decoded {
    let token = token.strip_prefix('?').unwrap_or(token);

    let mut params: HashMap<String, String> = HashMap::new();
    for (key, value) in form_urlencoded::parse(token.as_bytes()) {
        // first occurrence wins
        params.entry(key.into_owned()).or_insert_with(|| value.into_owned());
    }

    let mut issues = Vec::new();
    let mut state = WorkflowState::default();

    let text = |key: &'static str, issues: &mut Vec<DecodeIssue>| match params.get(key) {
        Some(v) => v.clone(),
        None => {
            issues.push(missing(key));
            String::new()
        }
    };
    state.name = text(keys::NAME, &mut issues);
    state.phone = text(keys::PHONE, &mut issues);
    state.password = Password::new(text(keys::PASSWORD, &mut issues));
    state.phone_for_calls = text(keys::PHONE_FOR_CALLS, &mut issues);
    let area_name = text(keys::AREA_NAME, &mut issues);

    state.service_area = match params.get(keys::SERVICE_AREA) {
        None => {
            issues.push(missing(keys::SERVICE_AREA));
            DEFAULT_SERVICE_AREA_KM
        }
        Some(raw) => match raw.trim().parse::<u8>() {
            Ok(km) if SERVICE_AREA_RANGE_KM.contains(&km) => km,
            _ => {
                issues.push(malformed(keys::SERVICE_AREA, raw));
                DEFAULT_SERVICE_AREA_KM
            }
        },
    };

    state.vendor_category_id = match params.get(keys::VENDOR_CATEGORY_ID) {
        None => None,
        Some(raw) => match raw.trim().parse::<i64>() {
            Ok(id) if id > 0 => Some(id),
            _ => {
                issues.push(malformed(keys::VENDOR_CATEGORY_ID, raw));
                None
            }
        },
    };

    state.service_prices = match params.get(keys::SERVICE_PRICES) {
        None => {
            issues.push(missing(keys::SERVICE_PRICES));
            Vec::new()
        }
        Some(raw) => match serde_json::from_str::<Vec<ServicePrice>>(raw) {
            Ok(prices) => prices,
            Err(e) => {
                issues.push(DecodeIssue {
                    field: keys::SERVICE_PRICES,
                    reason: format!("invalid JSON: {e}"),
                });
                Vec::new()
            }
        },
    };

    state.has_smartphone = match params.get(keys::HAS_SMARTPHONE).map(|s| s.trim()) {
        Some("true") => true,
        Some("false") => false,
        None => {
            issues.push(missing(keys::HAS_SMARTPHONE));
            true
        }
        Some(raw) => {
            issues.push(malformed(keys::HAS_SMARTPHONE, raw));
            true
        }
    };

    let location = match params.get(keys::LOCATION).map(|s| s.trim()) {
        None | Some("") | Some("null") => None,
        Some(raw) => match serde_json::from_str::<Location>(raw) {
            Ok(location) => Some(location),
            Err(e) => {
                issues.push(DecodeIssue {
                    field: keys::LOCATION,
                    reason: format!("invalid JSON: {e}"),
                });
                None
            }
        },
    };
    state.restore_area(area_name, location);

    if !issues.is_empty() {
        tracing::debug!(
            fields = ?issues.iter().map(|i| i.field).collect::<Vec<_>>(),
            "Workflow transport decoded with defaults"
        );
    }

    Decoded { state, issues }
}

fn missing(field: &'static str) -> DecodeIssue {
    DecodeIssue {
        field,
        reason: "missing".to_string(),
    }
}

fn malformed(field: &'static str, raw: &str) -> DecodeIssue {
    let preview: String = raw.chars().take(32).collect();
    DecodeIssue {
        field,
        reason: format!("unreadable value {preview:?}"),
    }
}
