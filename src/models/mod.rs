//! Domain models for the lead intake pipeline.
//!
//! This module contains the core data structures used throughout the crate:
//!
//! - [`Lead`] - A buyer lead record with owner and concurrency stamp
//! - [`HistoryEntry`] - Append-only audit record for a lead
//! - [`City`], [`PropertyType`], [`Bhk`], [`Purpose`], [`Timeline`],
//!   [`Source`], [`Status`] - Closed enumerations with their wire literals

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

/// Generates `from_value` / `as_str` / `values` for a closed string enum.
///
/// `from_value` returns `None` for an unrecognized literal so callers can
/// turn it into a validation error instead of a parse crash.
macro_rules! string_enum {
    ($name:ident { $($variant:ident => $literal:literal),+ $(,)? }) => {
        impl $name {
            /// Parse the wire literal. `None` if unrecognized.
            pub fn from_value(value: &str) -> Option<Self> {
                match value.trim() {
                    $($literal => Some(Self::$variant),)+
                    _ => None,
                }
            }

            /// The wire literal for this variant.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $literal,)+
                }
            }

            /// All accepted literals, for error messages.
            pub fn values() -> &'static [&'static str] {
                &[$($literal),+]
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

// =============================================================================
// City
// =============================================================================

/// City the lead is interested in.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum City {
    Chandigarh,
    Mohali,
    Zirakpur,
    Panchkula,
    Other,
}

string_enum!(City {
    Chandigarh => "Chandigarh",
    Mohali => "Mohali",
    Zirakpur => "Zirakpur",
    Panchkula => "Panchkula",
    Other => "Other",
});

// =============================================================================
// Property Type
// =============================================================================

/// Type of property the lead is looking for.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum PropertyType {
    Apartment,
    Villa,
    Plot,
    Office,
    Retail,
}

string_enum!(PropertyType {
    Apartment => "Apartment",
    Villa => "Villa",
    Plot => "Plot",
    Office => "Office",
    Retail => "Retail",
});

impl PropertyType {
    /// Residential property types carry a mandatory BHK configuration.
    pub fn requires_bhk(&self) -> bool {
        matches!(self, PropertyType::Apartment | PropertyType::Villa)
    }
}

// =============================================================================
// BHK
// =============================================================================

/// Bedroom configuration, only meaningful for residential property types.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Bhk {
    #[serde(rename = "1")]
    One,
    #[serde(rename = "2")]
    Two,
    #[serde(rename = "3")]
    Three,
    #[serde(rename = "4")]
    Four,
    Studio,
}

string_enum!(Bhk {
    One => "1",
    Two => "2",
    Three => "3",
    Four => "4",
    Studio => "Studio",
});

// =============================================================================
// Purpose
// =============================================================================

/// Whether the lead wants to buy or rent.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Purpose {
    Buy,
    Rent,
}

string_enum!(Purpose {
    Buy => "Buy",
    Rent => "Rent",
});

// =============================================================================
// Timeline
// =============================================================================

/// Purchase timeline the lead indicated.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Timeline {
    #[serde(rename = "0-3m")]
    UnderThreeMonths,
    #[serde(rename = "3-6m")]
    ThreeToSixMonths,
    #[serde(rename = ">6m")]
    OverSixMonths,
    Exploring,
}

string_enum!(Timeline {
    UnderThreeMonths => "0-3m",
    ThreeToSixMonths => "3-6m",
    OverSixMonths => ">6m",
    Exploring => "Exploring",
});

// =============================================================================
// Source
// =============================================================================

/// How the lead reached us.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Source {
    Website,
    Referral,
    #[serde(rename = "Walk-in")]
    WalkIn,
    Call,
    Other,
}

string_enum!(Source {
    Website => "Website",
    Referral => "Referral",
    WalkIn => "Walk-in",
    Call => "Call",
    Other => "Other",
});

// =============================================================================
// Status
// =============================================================================

/// Pipeline status of a lead. New records default to [`Status::New`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum Status {
    #[default]
    New,
    Qualified,
    Contacted,
    Visited,
    Negotiation,
    Converted,
    Dropped,
}

string_enum!(Status {
    New => "New",
    Qualified => "Qualified",
    Contacted => "Contacted",
    Visited => "Visited",
    Negotiation => "Negotiation",
    Converted => "Converted",
    Dropped => "Dropped",
});

// =============================================================================
// Lead
// =============================================================================

/// A buyer lead record.
///
/// `id` and `owner_id` are immutable after creation. `updated_at` is
/// server-assigned on every mutation and doubles as the optimistic
/// concurrency stamp: update requests must echo the value they last read.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Lead {
    pub id: Uuid,
    pub full_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub phone: String,
    pub city: City,
    pub property_type: PropertyType,
    /// Present iff `property_type.requires_bhk()`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bhk: Option<Bhk>,
    pub purpose: Purpose,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub budget_min: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub budget_max: Option<i64>,
    pub timeline: Timeline,
    pub source: Source,
    pub status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub tags: Vec<String>,
    pub owner_id: String,
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// History Entry
// =============================================================================

/// Append-only audit record for a lead.
///
/// The `diff` payload maps changed field names to their new values. A
/// creation entry uses the sentinel `{"created": true, "by": <owner>}`.
/// History rows are never mutated; they are deleted only by cascade when
/// their owning lead is deleted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub id: Uuid,
    pub lead_id: Uuid,
    pub changed_by: String,
    pub changed_at: DateTime<Utc>,
    pub diff: Value,
}

impl HistoryEntry {
    /// A change entry carrying a field diff.
    pub fn change(lead_id: Uuid, changed_by: &str, diff: Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            lead_id,
            changed_by: changed_by.to_string(),
            changed_at: Utc::now(),
            diff,
        }
    }

    /// The creation sentinel entry.
    pub fn created(lead_id: Uuid, changed_by: &str) -> Self {
        Self::change(lead_id, changed_by, json!({ "created": true, "by": changed_by }))
    }

    /// Whether this is the creation sentinel rather than a field diff.
    pub fn is_creation(&self) -> bool {
        self.diff.get("created").and_then(Value::as_bool) == Some(true)
    }
}

// =============================================================================
// Tests
// =============================================================================
