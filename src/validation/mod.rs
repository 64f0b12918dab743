//! Field validation for raw lead input.
//!
//! Raw input arrives as a loose string mapping — a form post or a parsed CSV
//! row — and either normalizes into a fully-typed [`ValidatedLead`] or comes
//! back as a [`FieldErrors`] map. Every rule runs on every call: a failure on
//! one field never hides a failure on another, and the cross-field rules
//! (budget ordering, conditional BHK) append to the per-field results rather
//! than replacing them.
//!
//! Empty strings are treated as absent values throughout, so a blank CSV
//! cell or an unfilled form field is "not provided" rather than an error on
//! optional fields.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::FieldErrors;
use crate::models::{Bhk, City, PropertyType, Purpose, Source, Status, Timeline};

static PHONE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{10,15}$").expect("phone regex"));
static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}$").expect("email regex"));

/// Trimmed name length bounds.
const NAME_MIN: usize = 2;
const NAME_MAX: usize = 80;

/// Notes length cap.
const NOTES_MAX: usize = 1000;

// =============================================================================
// Raw input
// =============================================================================

/// A raw field mapping as it arrives from the form layer or a CSV row.
///
/// All fields are optional strings; coercion and enum parsing happen in
/// [`validate_lead`]. `tags` is already split into entries (use
/// [`split_tags`] for the comma-joined wire form).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawLead {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub city: Option<String>,
    pub property_type: Option<String>,
    pub bhk: Option<String>,
    pub purpose: Option<String>,
    pub budget_min: Option<String>,
    pub budget_max: Option<String>,
    pub timeline: Option<String>,
    pub source: Option<String>,
    pub status: Option<String>,
    pub notes: Option<String>,
    pub tags: Option<Vec<String>>,
}

/// A lead that passed validation: fully typed, trimmed, and coerced.
///
/// `status` stays `None` when the input omitted it; the create path defaults
/// it to [`Status::New`] and the update path preserves the stored value.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedLead {
    pub full_name: String,
    pub email: Option<String>,
    pub phone: String,
    pub city: City,
    pub property_type: PropertyType,
    pub bhk: Option<Bhk>,
    pub purpose: Purpose,
    pub budget_min: Option<i64>,
    pub budget_max: Option<i64>,
    pub timeline: Timeline,
    pub source: Source,
    pub status: Option<Status>,
    pub notes: Option<String>,
    pub tags: Vec<String>,
}

/// Split a comma-joined tag string into trimmed, non-empty entries.
pub fn split_tags(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

// =============================================================================
// Validator
// =============================================================================

/// Validate a raw lead mapping.
///
/// Returns the normalized record, or the full per-field error map. Per-field
/// rules run first in field order; the cross-field rules run afterwards and
/// append to whatever is already collected.
pub fn validate_lead(raw: &RawLead) -> Result<ValidatedLead, FieldErrors> {
    let mut errors = FieldErrors::new();

    let full_name = check_full_name(&mut errors, raw.full_name.as_deref());
    let email = check_email(&mut errors, raw.email.as_deref());
    let phone = check_phone(&mut errors, raw.phone.as_deref());

    let city = required_enum(&mut errors, "city", raw.city.as_deref(), City::from_value, City::values());
    let property_type = required_enum(
        &mut errors,
        "propertyType",
        raw.property_type.as_deref(),
        PropertyType::from_value,
        PropertyType::values(),
    );
    let bhk = optional_enum(&mut errors, "bhk", raw.bhk.as_deref(), Bhk::from_value, Bhk::values());
    let purpose = required_enum(
        &mut errors,
        "purpose",
        raw.purpose.as_deref(),
        Purpose::from_value,
        Purpose::values(),
    );
    let budget_min = check_budget(&mut errors, "budgetMin", raw.budget_min.as_deref());
    let budget_max = check_budget(&mut errors, "budgetMax", raw.budget_max.as_deref());
    let timeline = required_enum(
        &mut errors,
        "timeline",
        raw.timeline.as_deref(),
        Timeline::from_value,
        Timeline::values(),
    );
    let source = required_enum(
        &mut errors,
        "source",
        raw.source.as_deref(),
        Source::from_value,
        Source::values(),
    );
    let status = optional_enum(&mut errors, "status", raw.status.as_deref(), Status::from_value, Status::values());
    let notes = check_notes(&mut errors, raw.notes.as_deref());
    let tags = normalize_tags(raw.tags.as_deref());

    // Cross-field rules append after the per-field pass.
    if let (Some(min), Some(max)) = (budget_min, budget_max) {
        if max < min {
            errors.push("budgetMax", "budgetMax must be ≥ budgetMin");
        }
    }
    if let Some(property_type) = property_type {
        if property_type.requires_bhk() && bhk.is_none() && !errors_mention(&errors, "bhk") {
            errors.push("bhk", "bhk is required for Apartment/Villa");
        }
    }

    // Every `None` among the required fields pushed a message above.
    let (Some(full_name), Some(phone), Some(city), Some(property_type), Some(purpose), Some(timeline), Some(source)) =
        (full_name, phone, city, property_type, purpose, timeline, source)
    else {
        return Err(errors);
    };
    if !errors.is_empty() {
        return Err(errors);
    }

    Ok(ValidatedLead {
        full_name,
        email,
        phone,
        city,
        property_type,
        bhk,
        purpose,
        budget_min,
        budget_max,
        timeline,
        source,
        status,
        notes,
        tags,
    })
}

/// Empty or whitespace-only strings count as absent.
fn present(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn errors_mention(errors: &FieldErrors, field: &str) -> bool {
    errors.get(field).is_some()
}

fn check_full_name(errors: &mut FieldErrors, raw: Option<&str>) -> Option<String> {
    let Some(name) = present(raw) else {
        errors.push("fullName", "fullName is required");
        return None;
    };
    let len = name.chars().count();
    if !(NAME_MIN..=NAME_MAX).contains(&len) {
        errors.push("fullName", format!("must be between {} and {} characters", NAME_MIN, NAME_MAX));
        return None;
    }
    Some(name.to_string())
}

fn check_phone(errors: &mut FieldErrors, raw: Option<&str>) -> Option<String> {
    let Some(phone) = present(raw) else {
        errors.push("phone", "phone is required");
        return None;
    };
    if !PHONE_RE.is_match(phone) {
        errors.push("phone", "must be 10-15 digits");
        return None;
    }
    Some(phone.to_string())
}

fn check_email(errors: &mut FieldErrors, raw: Option<&str>) -> Option<String> {
    // An empty email is absent, not an error.
    let email = present(raw)?;
    if !EMAIL_RE.is_match(email) {
        errors.push("email", "must be a valid email address");
        return None;
    }
    Some(email.to_string())
}

fn check_budget(errors: &mut FieldErrors, field: &str, raw: Option<&str>) -> Option<i64> {
    let value = present(raw)?;
    let Ok(amount) = value.parse::<i64>() else {
        errors.push(field, "must be a whole number");
        return None;
    };
    if amount <= 0 {
        errors.push(field, "must be a positive number");
        return None;
    }
    Some(amount)
}

fn check_notes(errors: &mut FieldErrors, raw: Option<&str>) -> Option<String> {
    let notes = raw.filter(|n| !n.trim().is_empty())?;
    if notes.chars().count() > NOTES_MAX {
        errors.push("notes", format!("must be at most {} characters", NOTES_MAX));
        return None;
    }
    Some(notes.to_string())
}

fn normalize_tags(raw: Option<&[String]>) -> Vec<String> {
    raw.unwrap_or_default()
        .iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

fn required_enum<T>(
    errors: &mut FieldErrors,
    field: &str,
    raw: Option<&str>,
    parse: impl Fn(&str) -> Option<T>,
    accepted: &[&str],
) -> Option<T> {
    let Some(value) = present(raw) else {
        errors.push(field, format!("{} is required", field));
        return None;
    };
    match parse(value) {
        Some(parsed) => Some(parsed),
        None => {
            errors.push(field, format!("must be one of {}", accepted.join(", ")));
            None
        }
    }
}

fn optional_enum<T>(
    errors: &mut FieldErrors,
    field: &str,
    raw: Option<&str>,
    parse: impl Fn(&str) -> Option<T>,
    accepted: &[&str],
) -> Option<T> {
    let value = present(raw)?;
    match parse(value) {
        Some(parsed) => Some(parsed),
        None => {
            errors.push(field, format!("must be one of {}", accepted.join(", ")));
            None
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
