//! Error types for the lead intake pipeline.
//!
//! This module defines a hierarchy of error types:
//!
//! - [`FieldErrors`] - per-field validation messages, returned as data
//! - [`StoreError`] - storage-layer faults (the only unexpected class)
//! - [`LeadError`] - terminal outcomes of create/update/delete requests
//! - [`RowError`] / [`ImportError`] - bulk import failures
//!
//! Validation and row errors are always returned as values so callers can
//! render them field-by-field or row-by-row; they never unwind through
//! persistence code. Error conversion is automatic via `From`
//! implementations, allowing `?` to work across error boundaries.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;

// =============================================================================
// Field Errors
// =============================================================================

/// Validation messages grouped per offending field.
///
/// Multiple independent failures across different fields all surface in one
/// validator call; each field maps to a non-empty ordered list of messages.
/// Backed by a `BTreeMap` so serialization order is stable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message to a field, creating the field entry if needed.
    pub fn push(&mut self, field: &str, message: impl Into<String>) {
        self.0.entry(field.to_string()).or_default().push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Messages for one field, if any failed.
    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<String>)> {
        self.0.iter()
    }

    /// One-line rendering, `field: msg, msg; field: msg`, used for row errors.
    pub fn summary(&self) -> String {
        self.0
            .iter()
            .map(|(field, messages)| format!("{}: {}", field, messages.join(", ")))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

impl std::fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.summary())
    }
}

// =============================================================================
// Storage Errors
// =============================================================================

/// Storage-layer faults. Unlike validation outcomes these are system errors:
/// surfaced with the underlying message attached, never as partial writes.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying SQLite failure.
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// A stored column no longer parses as its domain type.
    #[error("corrupt column '{column}': unrecognized value '{value}'")]
    Decode { column: String, value: String },

    /// JSON (de)serialization of a stored payload failed.
    #[error("stored payload error: {0}")]
    Json(#[from] serde_json::Error),
}

// =============================================================================
// Lead Operation Errors
// =============================================================================

/// Terminal outcomes of a create/update/delete request, minus success.
///
/// The gates short-circuit in order: ownership, rate, concurrency,
/// validation. None of them mutate anything.
#[derive(Debug, Error)]
pub enum LeadError {
    /// No record with the requested id.
    #[error("lead not found")]
    NotFound,

    /// Requester is not the record owner.
    #[error("you can only modify your own leads")]
    NotOwner,

    /// The client-supplied `updatedAt` no longer matches the stored one.
    #[error("record changed, please refresh")]
    Conflict,

    /// Too many operations in the current window; retryable after reset.
    #[error("too many requests, please try again later")]
    RateLimited { reset_at: DateTime<Utc> },

    /// Field-level validation failed; carries the full error map.
    #[error("validation failed: {0}")]
    Validation(FieldErrors),

    /// Storage fault.
    #[error(transparent)]
    Store(#[from] StoreError),
}

// =============================================================================
// Import Errors
// =============================================================================

/// A single rejected import row. Collected, not thrown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowError {
    /// 1-based data row number (the first row after the header is row 1).
    pub row: usize,
    pub message: String,
}

impl std::fmt::Display for RowError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "row {}: {}", self.row, self.message)
    }
}

/// Batch-level import failures. Structural variants abort before any row
/// processing; `Rows` aggregates per-row rejections after a full pass.
#[derive(Debug, Error)]
pub enum ImportError {
    /// Payload exceeds the size cap, checked before parsing.
    #[error("file too large (max 1MB)")]
    TooLarge,

    /// Fewer than a header line plus one data row.
    #[error("CSV must have at least a header and one data row")]
    Empty,

    /// Expected columns absent from the header, regardless of order.
    #[error("missing headers: {}", .0.join(", "))]
    MissingHeaders(Vec<String>),

    /// More validated rows than the batch cap allows.
    #[error("too many rows (max {max}, got {got})")]
    TooManyRows { max: usize, got: usize },

    /// Header was fine but every data row was blank.
    #[error("no valid data to import")]
    NoValidRows,

    /// One or more rows failed; nothing was imported.
    #[error("{} row(s) failed validation", .0.len())]
    Rows(Vec<RowError>),

    /// Too many import attempts in the current window.
    #[error("too many import requests, please try again later")]
    RateLimited { reset_at: DateTime<Utc> },

    /// Storage fault while persisting the batch.
    #[error(transparent)]
    Store(#[from] StoreError),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for storage operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Result type for lead create/update/delete operations.
pub type LeadResult<T> = Result<T, LeadError>;

/// Result type for bulk import operations.
pub type ImportResult<T> = Result<T, ImportError>;
