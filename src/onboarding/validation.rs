//! Step gates: pure checks run before any collaborator call is issued.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use serde::Serialize;

use super::model::{IdentityRecord, SERVICE_AREA_RANGE_KM, WorkflowState};

static IDENTITY_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]{5}-[0-9]{7}-[0-9]$").expect("identity number pattern is valid"));

/// Minimum password length.
pub const MIN_PASSWORD_LEN: usize = 6;

/// A form field a violation is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Field {
    Name,
    Phone,
    Password,
    ConfirmPassword,
    VendorCategoryId,
    ServicePrices,
    ServiceArea,
    PhoneForCalls,
    AreaName,
    Location,
    Code,
    IdentityNumber,
    FatherName,
    DateOfBirth,
    DateOfExpiry,
}

impl std::fmt::Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Name => "name",
            Self::Phone => "phone",
            Self::Password => "password",
            Self::ConfirmPassword => "confirmPassword",
            Self::VendorCategoryId => "vendorCategoryId",
            Self::ServicePrices => "servicePrices",
            Self::ServiceArea => "serviceArea",
            Self::PhoneForCalls => "phoneForCalls",
            Self::AreaName => "areaName",
            Self::Location => "location",
            Self::Code => "code",
            Self::IdentityNumber => "identityNumber",
            Self::FatherName => "fatherName",
            Self::DateOfBirth => "dateOfBirth",
            Self::DateOfExpiry => "dateOfExpiry",
        };
        write!(f, "{s}")
    }
}

/// One failed rule on one field.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Violation {
    pub field: Field,
    pub message: String,
}

/// The set of violations found by a gate. Empty means the step may proceed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Violations(BTreeSet<Violation>);

impl Violations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(field: Field, message: impl Into<String>) -> Self {
        let mut v = Self::new();
        v.add(field, message);
        v
    }

    pub fn add(&mut self, field: Field, message: impl Into<String>) {
        self.0.insert(Violation {
            field,
            message: message.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn has(&self, field: Field) -> bool {
        self.0.iter().any(|v| v.field == field)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Violation> {
        self.0.iter()
    }

    /// `Ok(())` when empty, otherwise the violations as an error value.
    pub fn into_result(self) -> Result<(), Violations> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

impl std::fmt::Display for Violations {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<String> = self
            .0
            .iter()
            .map(|v| format!("{}: {}", v.field, v.message))
            .collect();
        write!(f, "{}", parts.join("; "))
    }
}

fn blank(s: &str) -> bool {
    s.trim().is_empty()
}

/// Password rules: minimum length and at least one digit.
pub fn check_password(password: &str, violations: &mut Violations) {
    if password.is_empty() {
        violations.add(Field::Password, "Password is required");
        return;
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        violations.add(
            Field::Password,
            format!("Password must be at least {MIN_PASSWORD_LEN} characters long"),
        );
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        violations.add(Field::Password, "Password must contain at least one number");
    }
}

/// Rules that hold for a workflow at every point after the profile step.
///
/// Used again on the decoded state before the verification call, so a
/// truncated or tampered transport never reaches the account collaborator.
pub fn validate_workflow(state: &WorkflowState) -> Violations {
    let mut violations = Violations::new();

    if blank(&state.name) {
        violations.add(Field::Name, "Name is required");
    }
    if blank(&state.phone) {
        violations.add(Field::Phone, "Phone number is required");
    }
    check_password(state.password.expose(), &mut violations);

    match state.vendor_category_id {
        Some(id) if id > 0 => {}
        _ => violations.add(Field::VendorCategoryId, "Please select a vendor category"),
    }

    if state
        .service_prices
        .iter()
        .any(|sp| sp.positive_price().is_none())
    {
        violations.add(
            Field::ServicePrices,
            "Please enter valid prices for all services",
        );
    }

    if !SERVICE_AREA_RANGE_KM.contains(&state.service_area) {
        violations.add(
            Field::ServiceArea,
            format!(
                "Service area must be between {} and {} km",
                SERVICE_AREA_RANGE_KM.start(),
                SERVICE_AREA_RANGE_KM.end()
            ),
        );
    }

    if !state.has_smartphone && blank(&state.phone_for_calls) {
        violations.add(
            Field::PhoneForCalls,
            "Please provide a phone number for calls",
        );
    }

    if blank(state.area_name()) {
        violations.add(Field::AreaName, "Area name is required");
    }
    if state.location().is_none() {
        violations.add(Field::Location, "Please enter and verify the area name");
    }

    violations
}

/// Gate for the profile step submit.
///
/// `confirm_password` is only compared here; it is never stored.
pub fn validate_profile(state: &WorkflowState, confirm_password: &str) -> Violations {
    let mut violations = validate_workflow(state);
    if state.password.expose() != confirm_password {
        violations.add(Field::ConfirmPassword, "Passwords do not match");
    }
    violations
}

/// Gate for the verification code entry.
pub fn validate_code(code: &str) -> Violations {
    let mut violations = Violations::new();
    if blank(code) {
        violations.add(Field::Code, "Please enter the verification code");
    }
    violations
}

/// Gate for the identity document step.
pub fn validate_identity(record: &IdentityRecord, today: NaiveDate) -> Violations {
    let mut violations = Violations::new();

    if !IDENTITY_NUMBER.is_match(&record.identity_number) {
        violations.add(
            Field::IdentityNumber,
            "CNIC number must be in format: 42201-1234567-1",
        );
    }
    if blank(&record.name) {
        violations.add(Field::Name, "Name is required");
    }
    if blank(&record.father_name) {
        violations.add(Field::FatherName, "Father's name is required");
    }
    if record.date_of_birth >= today {
        violations.add(Field::DateOfBirth, "Date of birth must be in the past");
    }
    if record.date_of_expiry < today {
        violations.add(Field::DateOfExpiry, "Identity document has expired");
    }

    violations
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::onboarding::model::{Gender, Location, ServicePrice};

    fn valid_state() -> WorkflowState {
        let mut state = WorkflowState::with_identity("Ali", "03001234567", "pass123");
        state.select_category(2, &[7]);
        state.set_price(7, "500");
        state.set_area_name("Lahore");
        state.attach_location("Lahore", Location::geocoded(31.52, 74.35, Utc::now()));
        state
    }

    fn password_violations(pw: &str) -> Violations {
        let mut v = Violations::new();
        check_password(pw, &mut v);
        v
    }

    #[test]
    fn valid_profile_passes() {
        let violations = validate_profile(&valid_state(), "pass123");
        assert!(violations.is_empty(), "unexpected: {violations}");
    }

    #[test]
    fn password_rules() {
        assert!(password_violations("abcde").has(Field::Password));
        assert!(password_violations("abcde1").is_empty());
        assert!(password_violations("a1").has(Field::Password));
        assert!(password_violations("").has(Field::Password));
        // both rules reported for a short, digit-less password
        assert_eq!(password_violations("abc").len(), 2);
    }

    #[test]
    fn confirm_password_mismatch() {
        let violations = validate_profile(&valid_state(), "pass124");
        assert!(violations.has(Field::ConfirmPassword));
        assert_eq!(violations.len(), 1);
    }

    #[test]
    fn required_fields() {
        let mut state = valid_state();
        state.name = "  ".to_string();
        state.phone.clear();
        state.vendor_category_id = None;
        let violations = validate_workflow(&state);
        assert!(violations.has(Field::Name));
        assert!(violations.has(Field::Phone));
        assert!(violations.has(Field::VendorCategoryId));
    }

    #[test]
    fn zero_or_empty_price_fails() {
        for bad in ["0", "", "-1", "abc"] {
            let mut state = valid_state();
            state.service_prices = vec![
                ServicePrice {
                    service_id: 7,
                    price: "500".to_string(),
                },
                ServicePrice {
                    service_id: 8,
                    price: bad.to_string(),
                },
            ];
            assert!(
                validate_workflow(&state).has(Field::ServicePrices),
                "price {bad:?} should be rejected"
            );
        }

        let mut state = valid_state();
        state.service_prices = vec![
            ServicePrice {
                service_id: 7,
                price: "500".to_string(),
            },
            ServicePrice {
                service_id: 8,
                price: "0.5".to_string(),
            },
        ];
        assert!(validate_workflow(&state).is_empty());
    }

    #[test]
    fn phone_for_calls_required_without_smartphone() {
        let mut state = valid_state();
        state.has_smartphone = false;
        assert!(validate_workflow(&state).has(Field::PhoneForCalls));

        state.phone_for_calls = "042111222333".to_string();
        assert!(validate_workflow(&state).is_empty());
    }

    #[test]
    fn location_required_and_cleared_by_area_change() {
        let mut state = valid_state();
        state.set_area_name("Karachi");
        let violations = validate_workflow(&state);
        assert!(violations.has(Field::Location));
        assert!(!violations.has(Field::AreaName));
    }

    #[test]
    fn service_area_out_of_range() {
        let mut state = valid_state();
        state.service_area = 21;
        assert!(validate_workflow(&state).has(Field::ServiceArea));
        state.service_area = 0;
        assert!(validate_workflow(&state).has(Field::ServiceArea));
        state.service_area = 20;
        assert!(validate_workflow(&state).is_empty());
    }

    #[test]
    fn default_state_fails_validation() {
        let violations = validate_workflow(&WorkflowState::default());
        assert!(violations.has(Field::Name));
        assert!(violations.has(Field::Password));
        assert!(violations.has(Field::Location));
    }

    #[test]
    fn empty_code_rejected() {
        assert!(validate_code(" ").has(Field::Code));
        assert!(validate_code("1234").is_empty());
    }

    fn identity() -> IdentityRecord {
        IdentityRecord {
            identity_number: "42201-1234567-1".to_string(),
            name: "Ali".to_string(),
            father_name: "Ahmed".to_string(),
            date_of_birth: NaiveDate::from_ymd_opt(1990, 1, 31).unwrap(),
            date_of_expiry: NaiveDate::from_ymd_opt(2030, 12, 31).unwrap(),
            gender: Gender::Male,
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 18).unwrap()
    }

    #[test]
    fn valid_identity_passes() {
        assert!(validate_identity(&identity(), today()).is_empty());
    }

    #[test]
    fn identity_number_format() {
        for bad in [
            "4220112345671",
            "42201-123456-1",
            "42201-1234567-12",
            "abcde-1234567-1",
            "٤٢٢٠١-١٢٣٤٥٦٧-١",
            " 42201-1234567-1\n",
        ] {
            let record = IdentityRecord {
                identity_number: bad.to_string(),
                ..identity()
            };
            assert!(
                validate_identity(&record, today()).has(Field::IdentityNumber),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn expiry_today_is_accepted_yesterday_is_not() {
        let record = IdentityRecord {
            date_of_expiry: today(),
            ..identity()
        };
        assert!(validate_identity(&record, today()).is_empty());

        let record = IdentityRecord {
            date_of_expiry: today().pred_opt().unwrap(),
            ..identity()
        };
        assert!(validate_identity(&record, today()).has(Field::DateOfExpiry));
    }

    #[test]
    fn identity_names_required() {
        let record = IdentityRecord {
            name: String::new(),
            father_name: " ".to_string(),
            ..identity()
        };
        let violations = validate_identity(&record, today());
        assert!(violations.has(Field::Name));
        assert!(violations.has(Field::FatherName));
    }

    #[test]
    fn violations_serialize_as_list() {
        let v = Violations::single(Field::AreaName, "Please enter an area name");
        let json = serde_json::to_value(&v).unwrap();
        assert_eq!(json[0]["field"], "areaName");
        assert_eq!(json[0]["message"], "Please enter an area name");
    }
}
