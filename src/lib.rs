//! # leadbase - Lead intake with validated CRUD and a change-history log
//!
//! leadbase is the backend of a buyer-lead intake app: authenticated users
//! create, edit, and bulk import/export lead records. Every mutation is
//! validated field-by-field, guarded by ownership and optimistic-concurrency
//! checks, and mirrored into an append-only history log.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐     ┌────────────┐     ┌────────────┐     ┌────────────┐
//! │ Form / CSV │────▶│ Validation │────▶│    Diff    │────▶│   SQLite   │
//! │ (raw text) │     │ (typed or  │     │ (changed   │     │ (lead +    │
//! │            │     │  field map)│     │  fields)   │     │  history)  │
//! └────────────┘     └────────────┘     └────────────┘     └────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use leadbase::{Database, LeadService, Requester, RawLead};
//!
//! let db = Database::open("leadbase.db").unwrap();
//! let service = LeadService::new(db);
//! let lead = service.create_lead(&Requester::new("u1", "127.0.0.1"), &raw).unwrap();
//! println!("created {}", lead.id);
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Hierarchical error types and the field-error map
//! - [`models`] - Domain models (Lead, HistoryEntry, the closed enums)
//! - [`validation`] - Field validator: raw mapping in, typed lead out
//! - [`diff`] - Field-level diff feeding the history log
//! - [`store`] - SQLite persistence with transactional lead+history writes
//! - [`ratelimit`] - In-process fixed-window rate limiting
//! - [`service`] - Create/update/delete orchestration and its gates
//! - [`import`] - Bulk CSV import (all-or-nothing) and export
//! - [`api`] - HTTP API server

// Core modules
pub mod error;
pub mod models;

// Validation & diffing
pub mod diff;
pub mod validation;

// Persistence
pub mod store;

// Orchestration
pub mod ratelimit;
pub mod service;

// Bulk CSV
pub mod import;

// HTTP API
pub mod api;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{
    FieldErrors,
    ImportError,
    ImportResult,
    LeadError,
    LeadResult,
    RowError,
    StoreError,
    StoreResult,
};

// =============================================================================
// Re-exports - Models
// =============================================================================

pub use models::{
    Bhk,
    City,
    HistoryEntry,
    Lead,
    PropertyType,
    Purpose,
    Source,
    Status,
    Timeline,
};

// =============================================================================
// Re-exports - Validation & diff
// =============================================================================

pub use validation::{split_tags, validate_lead, RawLead, ValidatedLead};

pub use diff::{lead_diff, Diff};

// =============================================================================
// Re-exports - Persistence & orchestration
// =============================================================================

pub use store::Database;

pub use ratelimit::{rate_limit_key, RateDecision, RateLimiter};

pub use service::{LeadService, Requester};

// =============================================================================
// Re-exports - Bulk CSV
// =============================================================================

pub use import::{detect_encoding, leads_to_csv, parse_leads, EXPECTED_HEADERS, MAX_BYTES, MAX_ROWS};

// =============================================================================
// Re-exports - API
// =============================================================================

pub use api::types::{error_response, ImportResponse, LeadDetail, LeadPayload};

// Server
pub mod server {
    pub use crate::api::server::start_server;
}
