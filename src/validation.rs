//! Pure input checks run before any write.

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use rust_decimal::Decimal;

use crate::error::ClinicError;

pub const MIN_RATING: u8 = 1;
pub const MAX_RATING: u8 = 5;

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9-]+(\.[A-Za-z0-9-]+)*\.[A-Za-z]{2,}$").unwrap()
});
static CONTACT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+?[0-9 ()-]{7,20}$").unwrap());

/// Trimmed value of a mandatory text field.
pub fn require_text(field: &str, value: &str) -> Result<String, ClinicError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ClinicError::validation(format!("{field} is required")));
    }
    Ok(trimmed.to_string())
}

/// Blank optional text collapses to `None`.
pub fn optional_text(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

pub fn validate_email(value: &str) -> Result<String, ClinicError> {
    let email = require_text("email", value)?;
    if !EMAIL_RE.is_match(&email) {
        return Err(ClinicError::validation(format!("invalid email address: {email}")));
    }
    Ok(email)
}

/// Optional leading `+`, then 7 to 20 digits, spaces, dashes or parentheses.
pub fn validate_contact(value: &str) -> Result<String, ClinicError> {
    let contact = require_text("contact", value)?;
    if !CONTACT_RE.is_match(&contact) {
        return Err(ClinicError::validation(format!("invalid contact number: {contact}")));
    }
    Ok(contact)
}

pub fn validate_rating(rating: i64) -> Result<u8, ClinicError> {
    if rating < MIN_RATING as i64 || rating > MAX_RATING as i64 {
        return Err(ClinicError::validation(format!(
            "rating must be between {MIN_RATING} and {MAX_RATING}, got {rating}"
        )));
    }
    Ok(rating as u8)
}

pub fn validate_price(price: Decimal) -> Result<Decimal, ClinicError> {
    if price.is_sign_negative() && !price.is_zero() {
        return Err(ClinicError::validation("price cannot be negative"));
    }
    Ok(price.normalize())
}

pub fn validate_duration(minutes: i64) -> Result<u32, ClinicError> {
    if minutes <= 0 || minutes > u32::MAX as i64 {
        return Err(ClinicError::validation("duration must be a positive number of minutes"));
    }
    Ok(minutes as u32)
}

/// Appointments must be strictly after `now`.
pub fn validate_future(
    appointment: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Result<DateTime<Utc>, ClinicError> {
    if appointment <= now {
        return Err(ClinicError::validation("appointment date must be in the future"));
    }
    Ok(appointment)
}
