//! Vendor Onboard: onboarding core of the marketplace admin console.

pub mod collaborators;
pub mod config;
pub mod error;
pub mod onboarding;
