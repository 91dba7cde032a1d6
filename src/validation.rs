//! Input validation shared by the HTTP handlers.
//!
//! Functions return a human-readable message on failure; handlers wrap it
//! in `ApiError::BadRequest`.

use std::sync::LazyLock;

use chrono::{DateTime, Local, NaiveDate, TimeZone, Utc};
use regex::Regex;

use crate::models::MedicalCard;

pub const MIN_PASSWORD_LEN: usize = 6;
pub const MIN_NAME_LEN: usize = 2;
pub const MAX_SYMPTOM_LEVEL: u8 = 10;
pub const MAX_CHAT_MESSAGE_LEN: usize = 2000;

static EMAIL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid regex"));

/// Lower-case and trim an email, rejecting anything not shaped like one.
pub fn normalize_email(raw: &str) -> Result<String, String> {
    let email = raw.trim().to_lowercase();
    if email.is_empty() {
        return Err("email is required".into());
    }
    if !EMAIL_PATTERN.is_match(&email) {
        return Err("invalid email format".into());
    }
    Ok(email)
}

pub fn validate_password(password: &str) -> Result<(), String> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        ));
    }
    Ok(())
}

/// Trimmed display name of at least two characters.
pub fn normalize_name(raw: &str) -> Result<String, String> {
    let name = raw.trim();
    if name.chars().count() < MIN_NAME_LEN {
        return Err(format!("name must be at least {MIN_NAME_LEN} characters"));
    }
    Ok(name.to_string())
}

/// Cut a string to at most `max` characters.
pub fn truncate_chars(value: &str, max: usize) -> String {
    value.chars().take(max).collect()
}

/// Medical card with every field clipped to its stored maximum.
pub fn clamp_medical_card(card: MedicalCard) -> MedicalCard {
    MedicalCard {
        full_name: truncate_chars(&card.full_name, 100),
        birth_date: truncate_chars(&card.birth_date, 20),
        blood_type: truncate_chars(&card.blood_type, 10),
        allergies: truncate_chars(&card.allergies, 500),
        chronic_diseases: truncate_chars(&card.chronic_diseases, 500),
        emergency_contact: truncate_chars(&card.emergency_contact, 50),
        insurance_number: truncate_chars(&card.insurance_number, 50),
        additional_info: truncate_chars(&card.additional_info, 1000),
    }
}

pub fn validate_symptom_level(level: Option<i64>) -> Result<Option<u8>, String> {
    match level {
        None => Ok(None),
        Some(l) if (0..=MAX_SYMPTOM_LEVEL as i64).contains(&l) => Ok(Some(l as u8)),
        Some(l) => Err(format!(
            "symptom level must be between 0 and {MAX_SYMPTOM_LEVEL}, got {l}"
        )),
    }
}

/// Parse an RFC 3339 timestamp or a bare `YYYY-MM-DD` (local midnight).
pub fn parse_timestamp(field: &str, raw: &str) -> Result<DateTime<Utc>, String> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(day) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        let midnight = day.and_hms_opt(0, 0, 0).ok_or_else(|| invalid_date(field, raw))?;
        return Local
            .from_local_datetime(&midnight)
            .earliest()
            .map(|dt| dt.with_timezone(&Utc))
            .ok_or_else(|| invalid_date(field, raw));
    }
    Err(invalid_date(field, raw))
}

fn invalid_date(field: &str, raw: &str) -> String {
    format!("{field} is not a valid date: {raw}")
}

/// Server-local calendar day of a timestamp.
pub fn local_day(at: &DateTime<Utc>) -> NaiveDate {
    at.with_timezone(&Local).date_naive()
}

/// Trimmed notes; blank becomes `None`.
pub fn normalize_notes(notes: Option<String>) -> Option<String> {
    notes
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
}

/// Trimmed chat message content within the length limit.
pub fn validate_chat_message(raw: &str) -> Result<String, String> {
    let content = raw.trim();
    if content.is_empty() {
        return Err("message must not be empty".into());
    }
    if content.chars().count() > MAX_CHAT_MESSAGE_LEN {
        return Err(format!(
            "message must be at most {MAX_CHAT_MESSAGE_LEN} characters"
        ));
    }
    Ok(content.to_string())
}
