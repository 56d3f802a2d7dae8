//! Vendor onboarding data models.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer, Serialize};

/// Default service radius in kilometers.
pub const DEFAULT_SERVICE_AREA_KM: u8 = 5;
/// Allowed service radius range in kilometers.
pub const SERVICE_AREA_RANGE_KM: std::ops::RangeInclusive<u8> = 1..=20;

/// A password held for the lifetime of the flow.
///
/// `Debug` is redacted; the raw value is only reachable through `expose`.
#[derive(Debug, Clone)]
pub struct Password(SecretString);

impl Password {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(SecretString::from(raw.into()))
    }

    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }

    pub fn is_empty(&self) -> bool {
        self.expose().is_empty()
    }
}

impl Default for Password {
    fn default() -> Self {
        Self::new(String::new())
    }
}

impl PartialEq for Password {
    fn eq(&self, other: &Self) -> bool {
        self.expose() == other.expose()
    }
}

impl<'de> Deserialize<'de> for Password {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        String::deserialize(deserializer).map(Self::new)
    }
}

impl From<&str> for Password {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

/// Price entered for one service of the selected category.
///
/// `price` keeps the raw text the operator typed; it is only turned into a
/// `Decimal` when the account is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServicePrice {
    pub service_id: i64,
    #[serde(deserialize_with = "price_text")]
    pub price: String,
}

impl ServicePrice {
    pub fn unpriced(service_id: i64) -> Self {
        Self {
            service_id,
            price: String::new(),
        }
    }

    /// The price as a positive decimal, or `None` if empty, malformed or ≤ 0.
    /// Exponent forms such as `1e3` are accepted.
    pub fn positive_price(&self) -> Option<Decimal> {
        let text = self.price.trim();
        let value = text
            .parse::<Decimal>()
            .or_else(|_| Decimal::from_scientific(text))
            .ok()?;
        (value > Decimal::ZERO).then_some(value)
    }
}

/// Accept either a JSON string or a JSON number for a price.
fn price_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        serde_json::Value::Null => Ok(String::new()),
        other => Err(serde::de::Error::custom(format!(
            "expected price as string or number, got {other}"
        ))),
    }
}

/// Device-style coordinates attached to a vendor location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy: f64,
    pub altitude: f64,
    pub altitude_accuracy: f64,
    pub heading: f64,
    pub speed: f64,
}

/// A verified vendor location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub coords: Coordinates,
    /// Capture time in milliseconds since the Unix epoch.
    pub timestamp: i64,
}

impl Location {
    /// Build the location recorded for a successful geocode.
    pub fn geocoded(latitude: f64, longitude: f64, captured_at: DateTime<Utc>) -> Self {
        Self {
            coords: Coordinates {
                latitude,
                longitude,
                accuracy: 10.0,
                altitude: 0.0,
                altitude_accuracy: 30.0,
                heading: -1.0,
                speed: -1.0,
            },
            timestamp: captured_at.timestamp_millis(),
        }
    }
}

/// The in-progress vendor registration carried across onboarding steps.
///
/// `area_name` and `location` are private: a location is only ever attached
/// for the area name currently set, and changing the area name drops it.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowState {
    pub name: String,
    pub phone: String,
    pub password: Password,
    pub service_area: u8,
    pub vendor_category_id: Option<i64>,
    pub service_prices: Vec<ServicePrice>,
    pub has_smartphone: bool,
    pub phone_for_calls: String,
    area_name: String,
    location: Option<Location>,
}

impl Default for WorkflowState {
    fn default() -> Self {
        Self {
            name: String::new(),
            phone: String::new(),
            password: Password::default(),
            service_area: DEFAULT_SERVICE_AREA_KM,
            vendor_category_id: None,
            service_prices: Vec::new(),
            has_smartphone: true,
            phone_for_calls: String::new(),
            area_name: String::new(),
            location: None,
        }
    }
}

impl WorkflowState {
    /// A default workflow with the account fields filled in.
    #[cfg(test)]
    pub(crate) fn with_identity(name: &str, phone: &str, password: &str) -> Self {
        Self {
            name: name.to_string(),
            phone: phone.to_string(),
            password: Password::from(password),
            ..Default::default()
        }
    }

    pub fn area_name(&self) -> &str {
        &self.area_name
    }

    pub fn location(&self) -> Option<&Location> {
        self.location.as_ref()
    }

    /// Set the free-text area name. A different name invalidates any
    /// previously geocoded location.
    pub fn set_area_name(&mut self, area_name: impl Into<String>) {
        let area_name = area_name.into();
        if area_name != self.area_name {
            self.area_name = area_name;
            if self.location.take().is_some() {
                tracing::debug!("Area name changed, geocoded location cleared");
            }
        }
    }

    /// Attach a geocoded location if it was resolved for the current area name.
    ///
    /// Returns `false` (and attaches nothing) when the area name has changed
    /// since the lookup was issued.
    pub fn attach_location(&mut self, resolved_for: &str, location: Location) -> bool {
        if resolved_for != self.area_name {
            return false;
        }
        self.location = Some(location);
        true
    }

    /// Restore area and location together, as carried by the page transport.
    pub(crate) fn restore_area(&mut self, area_name: String, location: Option<Location>) {
        self.area_name = area_name;
        self.location = location;
    }

    /// Replace the category and reset prices to one empty entry per service.
    pub fn select_category(&mut self, category_id: i64, service_ids: &[i64]) {
        self.vendor_category_id = Some(category_id);
        self.service_prices = service_ids.iter().copied().map(ServicePrice::unpriced).collect();
    }

    /// Set the price text for one service. Returns `false` if the service is
    /// not part of the selected category.
    pub fn set_price(&mut self, service_id: i64, price: impl Into<String>) -> bool {
        match self
            .service_prices
            .iter_mut()
            .find(|sp| sp.service_id == service_id)
        {
            Some(entry) => {
                entry.price = price.into();
                true
            }
            None => false,
        }
    }

    /// Display-safe view of the workflow (no password).
    pub fn view(&self) -> WorkflowView {
        WorkflowView {
            name: self.name.clone(),
            phone: self.phone.clone(),
            password_set: !self.password.is_empty(),
            service_area: self.service_area,
            vendor_category_id: self.vendor_category_id,
            service_prices: self.service_prices.clone(),
            has_smartphone: self.has_smartphone,
            phone_for_calls: self.phone_for_calls.clone(),
            area_name: self.area_name.clone(),
            location: self.location.clone(),
        }
    }
}

/// Redacted projection of a `WorkflowState` for status responses.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowView {
    pub name: String,
    pub phone: String,
    pub password_set: bool,
    pub service_area: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vendor_category_id: Option<i64>,
    pub service_prices: Vec<ServicePrice>,
    pub has_smartphone: bool,
    pub phone_for_calls: String,
    pub area_name: String,
    pub location: Option<Location>,
}

/// Field edits made while collecting the profile. Absent fields are untouched.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    pub name: Option<String>,
    #[serde(alias = "phoneNumber")]
    pub phone: Option<String>,
    pub password: Option<Password>,
    pub service_area: Option<u8>,
    pub has_smartphone: Option<bool>,
    pub phone_for_calls: Option<String>,
    pub area_name: Option<String>,
    #[serde(default)]
    pub prices: Vec<ServicePrice>,
}

impl ProfileUpdate {
    /// Apply the edits. Returns the service ids whose price could not be set
    /// because they do not belong to the selected category.
    pub fn apply(self, state: &mut WorkflowState) -> Vec<i64> {
        if let Some(name) = self.name {
            state.name = name;
        }
        if let Some(phone) = self.phone {
            state.phone = phone;
        }
        if let Some(password) = self.password {
            state.password = password;
        }
        if let Some(service_area) = self.service_area {
            state.service_area = service_area;
        }
        if let Some(has_smartphone) = self.has_smartphone {
            state.has_smartphone = has_smartphone;
        }
        if let Some(phone_for_calls) = self.phone_for_calls {
            state.phone_for_calls = phone_for_calls;
        }
        if let Some(area_name) = self.area_name {
            state.set_area_name(area_name);
        }
        self.prices
            .into_iter()
            .filter_map(|sp| (!state.set_price(sp.service_id, sp.price)).then_some(sp.service_id))
            .collect()
    }
}

/// Gender as printed on the identity document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Gender {
    Male,
    Female,
    Other,
}

impl std::fmt::Display for Gender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Male => write!(f, "Male"),
            Self::Female => write!(f, "Female"),
            Self::Other => write!(f, "Other"),
        }
    }
}

/// National identity document fields captured after the account exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityRecord {
    /// Formatted as `NNNNN-NNNNNNN-N`.
    pub identity_number: String,
    pub name: String,
    pub father_name: String,
    pub date_of_birth: NaiveDate,
    pub date_of_expiry: NaiveDate,
    pub gender: Gender,
}

impl IdentityRecord {
    /// Trim the free-text fields as typed into the form.
    pub fn normalized(self) -> Self {
        Self {
            identity_number: self.identity_number.trim().to_string(),
            name: self.name.trim().to_string(),
            father_name: self.father_name.trim().to_string(),
            ..self
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    use super::*;

    fn lahore() -> Location {
        Location::geocoded(31.5204, 74.3587, Utc.timestamp_millis_opt(1_700_000_000_000).unwrap())
    }

    #[test]
    fn default_workflow_has_documented_defaults() {
        let state = WorkflowState::default();
        assert_eq!(state.service_area, 5);
        assert!(state.has_smartphone);
        assert!(state.service_prices.is_empty());
        assert!(state.vendor_category_id.is_none());
        assert!(state.location().is_none());
    }

    #[test]
    fn changing_area_name_drops_location() {
        let mut state = WorkflowState::default();
        state.set_area_name("Lahore");
        assert!(state.attach_location("Lahore", lahore()));
        assert!(state.location().is_some());

        state.set_area_name("Lahore");
        assert!(state.location().is_some(), "same name keeps the location");

        state.set_area_name("Karachi");
        assert!(state.location().is_none());
    }

    #[test]
    fn stale_geocode_result_is_not_attached() {
        let mut state = WorkflowState::default();
        state.set_area_name("Karachi");
        assert!(!state.attach_location("Lahore", lahore()));
        assert!(state.location().is_none());
    }

    #[test]
    fn geocoded_location_uses_fixed_accuracy() {
        let loc = lahore();
        assert_eq!(loc.coords.accuracy, 10.0);
        assert_eq!(loc.coords.altitude_accuracy, 30.0);
        assert_eq!(loc.coords.speed, -1.0);
        assert_eq!(loc.timestamp, 1_700_000_000_000);

        let json = serde_json::to_value(&loc).unwrap();
        assert_eq!(json["coords"]["altitudeAccuracy"], 30.0);
        assert_eq!(json["coords"]["latitude"], 31.5204);
    }

    #[test]
    fn positive_price_parsing() {
        let mut sp = ServicePrice::unpriced(7);
        assert_eq!(sp.positive_price(), None);
        sp.price = "0".to_string();
        assert_eq!(sp.positive_price(), None);
        sp.price = "-3".to_string();
        assert_eq!(sp.positive_price(), None);
        sp.price = "abc".to_string();
        assert_eq!(sp.positive_price(), None);
        sp.price = " 499.50 ".to_string();
        assert_eq!(sp.positive_price(), Some(dec!(499.50)));
        sp.price = "1e3".to_string();
        assert_eq!(sp.positive_price(), Some(dec!(1000)));
        sp.price = "2.5e-1".to_string();
        assert_eq!(sp.positive_price(), Some(dec!(0.25)));
        sp.price = "-1e3".to_string();
        assert_eq!(sp.positive_price(), None);
    }

    #[test]
    fn service_price_accepts_numeric_json() {
        let parsed: Vec<ServicePrice> =
            serde_json::from_str(r#"[{"serviceId":7,"price":500},{"serviceId":8,"price":"12.5"}]"#)
                .unwrap();
        assert_eq!(parsed[0].price, "500");
        assert_eq!(parsed[1].price, "12.5");
    }

    #[test]
    fn select_category_resets_prices() {
        let mut state = WorkflowState::default();
        state.select_category(2, &[7, 9]);
        assert!(state.set_price(7, "500"));
        state.select_category(3, &[11]);
        assert_eq!(state.vendor_category_id, Some(3));
        assert_eq!(state.service_prices, vec![ServicePrice::unpriced(11)]);
        assert!(!state.set_price(7, "500"));
    }

    #[test]
    fn profile_update_applies_only_present_fields() {
        let mut state = WorkflowState::default();
        state.select_category(2, &[7]);
        state.set_area_name("Lahore");
        state.attach_location("Lahore", lahore());

        let update: ProfileUpdate = serde_json::from_value(serde_json::json!({
            "name": "Ali",
            "phoneNumber": "03001234567",
            "password": "pass123",
            "prices": [{"serviceId": 7, "price": "500"}, {"serviceId": 99, "price": "1"}]
        }))
        .unwrap();
        let rejected = update.apply(&mut state);

        assert_eq!(rejected, vec![99]);
        assert_eq!(state.name, "Ali");
        assert_eq!(state.phone, "03001234567");
        assert_eq!(state.password.expose(), "pass123");
        assert_eq!(state.service_prices[0].price, "500");
        assert!(state.location().is_some(), "area untouched keeps the location");
    }

    #[test]
    fn password_is_redacted_in_debug_and_view() {
        let state = WorkflowState {
            password: Password::from("pass123"),
            ..Default::default()
        };
        assert!(!format!("{:?}", state).contains("pass123"));
        let view = serde_json::to_string(&state.view()).unwrap();
        assert!(!view.contains("pass123"));
        assert!(view.contains("\"passwordSet\":true"));
    }

    #[test]
    fn identity_record_normalization_trims_text_fields() {
        let record = IdentityRecord {
            identity_number: " 42201-1234567-1\n".to_string(),
            name: "Ali ".to_string(),
            father_name: "\tAhmed".to_string(),
            date_of_birth: NaiveDate::from_ymd_opt(1990, 1, 31).unwrap(),
            date_of_expiry: NaiveDate::from_ymd_opt(2030, 12, 31).unwrap(),
            gender: Gender::Female,
        }
        .normalized();
        assert_eq!(record.identity_number, "42201-1234567-1");
        assert_eq!(record.name, "Ali");
        assert_eq!(record.father_name, "Ahmed");
        assert_eq!(record.gender, Gender::Female);
    }

    #[test]
    fn identity_record_wire_format() {
        let record: IdentityRecord = serde_json::from_value(serde_json::json!({
            "identityNumber": "42201-1234567-1",
            "name": "Ali",
            "fatherName": "Ahmed",
            "dateOfBirth": "1990-01-31",
            "dateOfExpiry": "2030-12-31",
            "gender": "Male"
        }))
        .unwrap();
        assert_eq!(record.gender, Gender::Male);
        assert_eq!(record.date_of_birth, NaiveDate::from_ymd_opt(1990, 1, 31).unwrap());
        let back = serde_json::to_value(&record).unwrap();
        assert_eq!(back["dateOfExpiry"], "2030-12-31");
    }
}
