//! REST API types for frontend integration.
//!
//! Incoming payloads mirror the form surface: every field is a raw string
//! (budgets are numeric strings, tags a comma-joined list) and coercion is
//! the validator's job. Failures go out as data, shaped so the frontend can
//! render them field-by-field or row-by-row.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::{FieldErrors, RowError};
use crate::models::{HistoryEntry, Lead};
use crate::validation::{split_tags, RawLead};

// =============================================================================
// Requests
// =============================================================================

/// Raw create/update payload, straight off the form.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LeadPayload {
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
    /// Comma-joined, as the form posts it.
    pub tags: Option<String>,
    /// Concurrency stamp the client last read (RFC 3339); update only.
    pub updated_at: Option<String>,
}

impl LeadPayload {
    /// Hand the payload to the validator in its raw-mapping form.
    pub fn to_raw(&self) -> RawLead {
        RawLead {
            full_name: self.full_name.clone(),
            email: self.email.clone(),
            phone: self.phone.clone(),
            city: self.city.clone(),
            property_type: self.property_type.clone(),
            bhk: self.bhk.clone(),
            purpose: self.purpose.clone(),
            budget_min: self.budget_min.clone(),
            budget_max: self.budget_max.clone(),
            timeline: self.timeline.clone(),
            source: self.source.clone(),
            status: self.status.clone(),
            notes: self.notes.clone(),
            tags: self.tags.as_deref().map(split_tags),
        }
    }
}

// =============================================================================
// Responses
// =============================================================================

/// A lead together with its most recent history entries.
#[derive(Debug, Clone, Serialize)]
pub struct LeadDetail {
    pub lead: Lead,
    pub history: Vec<HistoryEntry>,
}

/// Outcome of a CSV import.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportResponse {
    pub success: bool,
    pub imported: usize,
}

/// Generic error body.
pub fn error_response(message: &str) -> Value {
    json!({ "error": message })
}

/// Validation failure body carrying the per-field error map.
pub fn validation_response(errors: &FieldErrors) -> Value {
    json!({ "error": "validation failed", "fieldErrors": errors })
}

/// Import failure body carrying the per-row rejections.
pub fn row_errors_response(errors: &[RowError]) -> Value {
    json!({ "success": false, "imported": 0, "errors": errors })
}
