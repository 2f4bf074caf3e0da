//! E.164 phone number validation.

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

static E164: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\+[1-9]\d{6,14}$").unwrap());

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PhoneValidationError {
    #[error("Phone number is empty")]
    Empty,

    #[error("Phone number must be in E.164 format (e.g. +14255550100), got: {0}")]
    NotE164(String),
}

/// Validate an E.164 number and return it trimmed.
pub fn validate_phone_number(number: &str) -> Result<String, PhoneValidationError> {
    let trimmed = number.trim();
    if trimmed.is_empty() {
        return Err(PhoneValidationError::Empty);
    }
    if !E164.is_match(trimmed) {
        return Err(PhoneValidationError::NotE164(trimmed.to_string()));
    }
    Ok(trimmed.to_string())
}
