//! Lead lifecycle orchestration.
//!
//! [`LeadService`] is the only path through which leads are created, edited,
//! or deleted. Each mutating call walks its gates in a fixed order and stops
//! at the first failure, before anything is written:
//!
//! 1. ownership - requester must own the record
//! 2. rate - per-client, per-action fixed window
//! 3. concurrency - the client echoes the `updatedAt` it last read; any
//!    mismatch is a conflict (last writer with a matching stamp wins,
//!    losers refetch and retry themselves)
//! 4. validation - field errors returned as data
//!
//! Persistence then writes the record and its history entry in one
//! transaction. Creation skips the ownership and concurrency gates since no
//! prior record exists.

use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

use crate::diff::lead_diff;
use crate::error::{ImportError, LeadError, LeadResult, StoreResult};
use crate::models::{HistoryEntry, Lead, Status};
use crate::ratelimit::{rate_limit_key, RateLimiter};
use crate::store::Database;
use crate::validation::{validate_lead, RawLead, ValidatedLead};

/// Per-minute action budgets.
const CREATE_LIMIT: u32 = 5;
const UPDATE_LIMIT: u32 = 10;
const DELETE_LIMIT: u32 = 5;
const IMPORT_LIMIT: u32 = 3;

fn window() -> Duration {
    Duration::minutes(1)
}

/// Who is asking, and under which rate-limit identity.
///
/// `id` is the authenticated user identity used for ownership checks and
/// history attribution; `client_key` is the throttling identity (client IP
/// for HTTP callers).
#[derive(Debug, Clone)]
pub struct Requester {
    pub id: String,
    pub client_key: String,
}

impl Requester {
    pub fn new(id: impl Into<String>, client_key: impl Into<String>) -> Self {
        Self { id: id.into(), client_key: client_key.into() }
    }
}

/// Orchestrates validation, diffing, and transactional persistence.
#[derive(Clone)]
pub struct LeadService {
    db: Database,
    limiter: Arc<RateLimiter>,
}

impl LeadService {
    pub fn new(db: Database) -> Self {
        Self { db, limiter: Arc::new(RateLimiter::new()) }
    }

    /// Swap in a shared limiter (tests, or a future cross-process store).
    pub fn with_limiter(db: Database, limiter: Arc<RateLimiter>) -> Self {
        Self { db, limiter }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    // =========================================================================
    // Reads
    // =========================================================================

    pub fn get_lead(&self, id: Uuid) -> StoreResult<Option<Lead>> {
        self.db.get_lead(id)
    }

    pub fn list_leads(&self) -> StoreResult<Vec<Lead>> {
        self.db.list_leads()
    }

    pub fn history_for(&self, id: Uuid, limit: u32) -> StoreResult<Vec<HistoryEntry>> {
        self.db.history_for(id, limit)
    }

    // =========================================================================
    // Create
    // =========================================================================

    /// Validate and persist a new lead with its "created" history entry.
    /// Status defaults to `New` when the input omits it.
    pub fn create_lead(&self, requester: &Requester, raw: &RawLead) -> LeadResult<Lead> {
        self.rate_gate(requester, "create-lead", CREATE_LIMIT)?;

        let validated = validate_lead(raw).map_err(LeadError::Validation)?;
        let lead = build_new_lead(validated, &requester.id);
        let entry = HistoryEntry::created(lead.id, &requester.id);
        self.db.insert_lead(&lead, &entry)?;
        Ok(lead)
    }

    // =========================================================================
    // Update
    // =========================================================================

    /// Apply a validated update to an existing lead.
    ///
    /// `expected_updated_at` is the stamp the client last observed; any
    /// mismatch with the stored stamp fails with [`LeadError::Conflict`]
    /// before validation runs. A successful update with an empty diff writes
    /// the fresh stamp but appends no history.
    pub fn update_lead(
        &self,
        requester: &Requester,
        id: Uuid,
        expected_updated_at: DateTime<Utc>,
        raw: &RawLead,
    ) -> LeadResult<Lead> {
        let stored = self.db.get_lead(id)?.ok_or(LeadError::NotFound)?;
        if stored.owner_id != requester.id {
            return Err(LeadError::NotOwner);
        }
        self.rate_gate(requester, "update-lead", UPDATE_LIMIT)?;
        if stored.updated_at != expected_updated_at {
            return Err(LeadError::Conflict);
        }

        let validated = validate_lead(raw).map_err(LeadError::Validation)?;
        let updated = apply_update(&stored, validated);
        let diff = lead_diff(&stored, &updated);

        let entry = if diff.is_empty() {
            None
        } else {
            Some(HistoryEntry::change(id, &requester.id, Value::Object(diff)))
        };
        self.db.update_lead(&updated, entry.as_ref())?;
        Ok(updated)
    }

    // =========================================================================
    // Delete
    // =========================================================================

    /// Delete an owned lead. History rows disappear via the store's cascade,
    /// not as an explicit step here.
    pub fn delete_lead(&self, requester: &Requester, id: Uuid) -> LeadResult<()> {
        let stored = self.db.get_lead(id)?.ok_or(LeadError::NotFound)?;
        if stored.owner_id != requester.id {
            return Err(LeadError::NotOwner);
        }
        self.rate_gate(requester, "delete-lead", DELETE_LIMIT)?;

        self.db.delete_lead(id)?;
        Ok(())
    }

    // =========================================================================
    // Bulk import
    // =========================================================================

    /// Persist a fully validated import batch through the creation path:
    /// every row becomes a new lead with its own "created" entry, written in
    /// a single transaction. Returns the number of imported leads.
    pub fn import_leads(
        &self,
        requester: &Requester,
        validated: Vec<ValidatedLead>,
    ) -> Result<usize, ImportError> {
        let decision = self.limiter.check(
            &rate_limit_key(&requester.client_key, "import-csv"),
            IMPORT_LIMIT,
            window(),
        );
        if !decision.allowed {
            return Err(ImportError::RateLimited { reset_at: decision.reset_at });
        }

        let batch: Vec<(Lead, HistoryEntry)> = validated
            .into_iter()
            .map(|v| {
                let lead = build_new_lead(v, &requester.id);
                let entry = HistoryEntry::created(lead.id, &requester.id);
                (lead, entry)
            })
            .collect();
        self.db.insert_leads(&batch)?;
        Ok(batch.len())
    }

    fn rate_gate(&self, requester: &Requester, action: &str, limit: u32) -> LeadResult<()> {
        let decision = self
            .limiter
            .check(&rate_limit_key(&requester.client_key, action), limit, window());
        if decision.allowed {
            Ok(())
        } else {
            Err(LeadError::RateLimited { reset_at: decision.reset_at })
        }
    }
}

/// Materialize a brand-new lead from validated input.
fn build_new_lead(validated: ValidatedLead, owner_id: &str) -> Lead {
    Lead {
        id: Uuid::new_v4(),
        full_name: validated.full_name,
        email: validated.email,
        phone: validated.phone,
        city: validated.city,
        property_type: validated.property_type,
        bhk: validated.bhk,
        purpose: validated.purpose,
        budget_min: validated.budget_min,
        budget_max: validated.budget_max,
        timeline: validated.timeline,
        source: validated.source,
        status: validated.status.unwrap_or(Status::New),
        notes: validated.notes,
        tags: validated.tags,
        owner_id: owner_id.to_string(),
        updated_at: Utc::now(),
    }
}

/// Overlay validated fields onto the stored record. Identity and owner are
/// immutable; an omitted status preserves the stored one; the concurrency
/// stamp is refreshed.
fn apply_update(stored: &Lead, validated: ValidatedLead) -> Lead {
    Lead {
        id: stored.id,
        full_name: validated.full_name,
        email: validated.email,
        phone: validated.phone,
        city: validated.city,
        property_type: validated.property_type,
        bhk: validated.bhk,
        purpose: validated.purpose,
        budget_min: validated.budget_min,
        budget_max: validated.budget_max,
        timeline: validated.timeline,
        source: validated.source,
        status: validated.status.unwrap_or(stored.status),
        notes: validated.notes,
        tags: validated.tags,
        owner_id: stored.owner_id.clone(),
        updated_at: Utc::now(),
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Bhk;

    fn service() -> LeadService {
        LeadService::new(Database::open_in_memory().unwrap())
    }

    fn requester(id: &str) -> Requester {
        // Distinct client key per test identity keeps rate windows apart.
        Requester::new(id, format!("ip-{}", id))
    }

    fn apartment_raw() -> RawLead {
        RawLead {
            full_name: Some("John Doe".into()),
            phone: Some("1234567890".into()),
            city: Some("Chandigarh".into()),
            property_type: Some("Apartment".into()),
            bhk: Some("2".into()),
            purpose: Some("Buy".into()),
            timeline: Some("0-3m".into()),
            source: Some("Website".into()),
            ..RawLead::default()
        }
    }

    #[test]
    fn test_create_defaults_status_and_logs_creation() {
        let svc = service();
        let lead = svc.create_lead(&requester("u1"), &apartment_raw()).unwrap();

        assert_eq!(lead.status, Status::New);
        assert_eq!(lead.owner_id, "u1");

        let history = svc.history_for(lead.id, 10).unwrap();
        assert_eq!(history.len(), 1);
        assert!(history[0].is_creation());
        assert_eq!(history[0].changed_by, "u1");
    }

    #[test]
    fn test_create_validation_errors_returned_as_data() {
        let svc = service();
        let mut raw = apartment_raw();
        raw.phone = Some("123".into());
        raw.bhk = None;

        match svc.create_lead(&requester("u1"), &raw) {
            Err(LeadError::Validation(errors)) => {
                assert!(errors.get("phone").is_some());
                assert!(errors.get("bhk").is_some());
            }
            other => panic!("expected validation error, got {:?}", other.map(|l| l.id)),
        }
        assert!(svc.list_leads().unwrap().is_empty(), "no mutation on validation failure");
    }

    #[test]
    fn test_update_happy_path_appends_diff_history() {
        let svc = service();
        let owner = requester("u1");
        // Plot lead without bhk, then switch nothing but status.
        let mut raw = apartment_raw();
        raw.property_type = Some("Plot".into());
        raw.bhk = None;
        let lead = svc.create_lead(&owner, &raw).unwrap();

        let mut update = raw.clone();
        update.status = Some("Contacted".into());
        let updated = svc.update_lead(&owner, lead.id, lead.updated_at, &update).unwrap();

        assert_eq!(updated.status, Status::Contacted);
        assert!(updated.updated_at > lead.updated_at);

        let history = svc.history_for(lead.id, 10).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].diff["status"], "Contacted");
    }

    #[test]
    fn test_update_adding_bhk_produces_bhk_diff() {
        let svc = service();
        let owner = requester("u1");
        let lead = svc.create_lead(&owner, &apartment_raw()).unwrap();

        // Same apartment, different configuration.
        let mut update = apartment_raw();
        update.bhk = Some("3".into());
        let updated = svc.update_lead(&owner, lead.id, lead.updated_at, &update).unwrap();

        assert_eq!(updated.bhk, Some(Bhk::Three));
        let history = svc.history_for(lead.id, 10).unwrap();
        assert_eq!(history[0].diff, serde_json::json!({ "bhk": "3" }));
    }

    #[test]
    fn test_update_to_apartment_records_added_bhk() {
        let svc = service();
        let owner = requester("u1");
        let mut raw = apartment_raw();
        raw.property_type = Some("Plot".into());
        raw.bhk = None;
        let lead = svc.create_lead(&owner, &raw).unwrap();
        assert_eq!(lead.bhk, None);

        let update = apartment_raw(); // Apartment with bhk 2
        let updated = svc.update_lead(&owner, lead.id, lead.updated_at, &update).unwrap();
        assert_eq!(updated.bhk, Some(Bhk::Two));

        let diff = &svc.history_for(lead.id, 10).unwrap()[0].diff;
        assert_eq!(diff["bhk"], "2");
        assert_eq!(diff["propertyType"], "Apartment");
    }

    #[test]
    fn test_update_omitted_status_preserved() {
        let svc = service();
        let owner = requester("u1");
        let mut raw = apartment_raw();
        raw.status = Some("Qualified".into());
        let lead = svc.create_lead(&owner, &raw).unwrap();

        let update = apartment_raw(); // status omitted
        let updated = svc.update_lead(&owner, lead.id, lead.updated_at, &update).unwrap();
        assert_eq!(updated.status, Status::Qualified);
    }

    #[test]
    fn test_noop_update_writes_no_history() {
        let svc = service();
        let owner = requester("u1");
        let lead = svc.create_lead(&owner, &apartment_raw()).unwrap();

        let updated = svc.update_lead(&owner, lead.id, lead.updated_at, &apartment_raw()).unwrap();
        assert!(updated.updated_at > lead.updated_at, "stamp still refreshed");
        assert_eq!(svc.history_for(lead.id, 10).unwrap().len(), 1, "creation entry only");
    }

    #[test]
    fn test_stale_stamp_conflicts_and_leaves_record_unchanged() {
        let svc = service();
        let owner = requester("u1");
        let lead = svc.create_lead(&owner, &apartment_raw()).unwrap();

        let stale = lead.updated_at - Duration::seconds(30);
        let mut update = apartment_raw();
        update.full_name = Some("Someone Else".into());

        assert!(matches!(
            svc.update_lead(&owner, lead.id, stale, &update),
            Err(LeadError::Conflict)
        ));
        let stored = svc.get_lead(lead.id).unwrap().unwrap();
        assert_eq!(stored, lead, "conflict leaves the record untouched");
    }

    #[test]
    fn test_non_owner_update_rejected_before_anything_else() {
        let svc = service();
        let owner = requester("u1");
        let lead = svc.create_lead(&owner, &apartment_raw()).unwrap();

        let intruder = requester("u2");
        assert!(matches!(
            svc.update_lead(&intruder, lead.id, lead.updated_at, &apartment_raw()),
            Err(LeadError::NotOwner)
        ));
        assert_eq!(svc.get_lead(lead.id).unwrap().unwrap(), lead);
    }

    #[test]
    fn test_update_missing_lead_not_found() {
        let svc = service();
        assert!(matches!(
            svc.update_lead(&requester("u1"), Uuid::new_v4(), Utc::now(), &apartment_raw()),
            Err(LeadError::NotFound)
        ));
    }

    #[test]
    fn test_update_validation_failure_leaves_record_unchanged() {
        let svc = service();
        let owner = requester("u1");
        let lead = svc.create_lead(&owner, &apartment_raw()).unwrap();

        let mut update = apartment_raw();
        update.budget_min = Some("200".into());
        update.budget_max = Some("100".into());
        match svc.update_lead(&owner, lead.id, lead.updated_at, &update) {
            Err(LeadError::Validation(errors)) => {
                assert_eq!(errors.get("budgetMax").unwrap(), &["budgetMax must be ≥ budgetMin".to_string()]);
            }
            other => panic!("expected validation error, got {:?}", other.map(|l| l.id)),
        }
        assert_eq!(svc.get_lead(lead.id).unwrap().unwrap(), lead);
    }

    #[test]
    fn test_delete_by_owner_cascades() {
        let svc = service();
        let owner = requester("u1");
        let lead = svc.create_lead(&owner, &apartment_raw()).unwrap();

        svc.delete_lead(&owner, lead.id).unwrap();
        assert!(svc.get_lead(lead.id).unwrap().is_none());
        assert!(svc.history_for(lead.id, 10).unwrap().is_empty());
    }

    #[test]
    fn test_delete_by_non_owner_rejected() {
        let svc = service();
        let owner = requester("u1");
        let lead = svc.create_lead(&owner, &apartment_raw()).unwrap();

        assert!(matches!(svc.delete_lead(&requester("u2"), lead.id), Err(LeadError::NotOwner)));
        assert!(svc.get_lead(lead.id).unwrap().is_some());
    }

    #[test]
    fn test_create_rate_limit_enforced() {
        let svc = service();
        let owner = requester("u1");
        for _ in 0..CREATE_LIMIT {
            svc.create_lead(&owner, &apartment_raw()).unwrap();
        }
        assert!(matches!(
            svc.create_lead(&owner, &apartment_raw()),
            Err(LeadError::RateLimited { .. })
        ));
        assert_eq!(svc.list_leads().unwrap().len(), CREATE_LIMIT as usize);
    }

    #[test]
    fn test_import_batch_creates_all_with_history() {
        let svc = service();
        let owner = requester("importer");
        let validated: Vec<_> = (0..3)
            .map(|i| {
                let mut raw = apartment_raw();
                raw.full_name = Some(format!("Lead {}", i));
                validate_lead(&raw).unwrap()
            })
            .collect();

        let imported = svc.import_leads(&owner, validated).unwrap();
        assert_eq!(imported, 3);

        let leads = svc.list_leads().unwrap();
        assert_eq!(leads.len(), 3);
        for lead in leads {
            let history = svc.history_for(lead.id, 5).unwrap();
            assert_eq!(history.len(), 1);
            assert!(history[0].is_creation());
        }
    }
}
