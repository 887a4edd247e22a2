//! Centralized validation for identities and secrets.
//!
//! A single source of truth for the checks applied at every boundary, so
//! that registration, login, and storage agree on what a valid identity
//! looks like.

use crate::error::ValidationError;
use regex::Regex;
use std::sync::LazyLock;

/// Practical subset of RFC 5322, loaded once.
static EMAIL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$")
        .expect("Invalid email regex pattern")
});

/// Phone-like contact number: optional leading `+`, 7 to 15 digits.
static PHONE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+?[0-9]{7,15}$").expect("Invalid phone regex pattern"));

/// Validates an email address.
pub fn validate_email(email: &str) -> Result<(), ValidationError> {
    if email.is_empty() {
        return Err(ValidationError::MissingField(
            "Email is required".to_string(),
        ));
    }

    if email.len() > 254 {
        return Err(ValidationError::InvalidEmail(
            "Email is too long".to_string(),
        ));
    }

    if EMAIL_REGEX.is_match(email) {
        Ok(())
    } else {
        Err(ValidationError::InvalidEmail(format!(
            "Invalid email format: {email}"
        )))
    }
}

/// Validates a phone-like contact number.
pub fn validate_phone(phone: &str) -> Result<(), ValidationError> {
    if phone.is_empty() {
        return Err(ValidationError::MissingField(
            "Phone is required".to_string(),
        ));
    }

    if PHONE_REGEX.is_match(phone) {
        Ok(())
    } else {
        Err(ValidationError::InvalidPhone(format!(
            "Invalid phone number: {phone}"
        )))
    }
}

/// Validates a password according to security requirements.
///
/// - Minimum 8 characters
/// - Maximum 128 characters
/// - Cannot be empty or whitespace only
pub fn validate_password(password: &str) -> Result<(), ValidationError> {
    if password.is_empty() {
        return Err(ValidationError::MissingField(
            "Password is required".to_string(),
        ));
    }

    if password.trim().is_empty() {
        return Err(ValidationError::InvalidPassword(
            "Password cannot be whitespace only".to_string(),
        ));
    }

    if password.len() < 8 {
        return Err(ValidationError::InvalidPassword(
            "Password must be at least 8 characters".to_string(),
        ));
    }

    if password.len() > 128 {
        return Err(ValidationError::InvalidPassword(
            "Password must be at most 128 characters".to_string(),
        ));
    }

    Ok(())
}
