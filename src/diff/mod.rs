//! Field-level diff between a stored lead and its updated version.
//!
//! The diff is what gets written to the history log: a JSON object mapping
//! each changed field name to its new value, nothing else. Identity and
//! bookkeeping fields (`id`, `ownerId`, `updatedAt`) never appear. Tags are
//! compared by full-sequence equality, so a reorder counts as a change.

use serde_json::{json, Map, Value};

use crate::models::Lead;

/// A minimal field-level diff: changed field name → new value.
pub type Diff = Map<String, Value>;

/// Compare two versions of the same lead and collect the changed fields.
///
/// An empty result is a meaningful no-op update; callers skip the history
/// entry in that case. `diff(x, x)` is always empty.
pub fn lead_diff(before: &Lead, after: &Lead) -> Diff {
    let mut diff = Diff::new();

    if before.full_name != after.full_name {
        diff.insert("fullName".into(), json!(after.full_name));
    }
    if before.email != after.email {
        diff.insert("email".into(), json!(after.email));
    }
    if before.phone != after.phone {
        diff.insert("phone".into(), json!(after.phone));
    }
    if before.city != after.city {
        diff.insert("city".into(), json!(after.city));
    }
    if before.property_type != after.property_type {
        diff.insert("propertyType".into(), json!(after.property_type));
    }
    if before.bhk != after.bhk {
        diff.insert("bhk".into(), json!(after.bhk));
    }
    if before.purpose != after.purpose {
        diff.insert("purpose".into(), json!(after.purpose));
    }
    if before.budget_min != after.budget_min {
        diff.insert("budgetMin".into(), json!(after.budget_min));
    }
    if before.budget_max != after.budget_max {
        diff.insert("budgetMax".into(), json!(after.budget_max));
    }
    if before.timeline != after.timeline {
        diff.insert("timeline".into(), json!(after.timeline));
    }
    if before.source != after.source {
        diff.insert("source".into(), json!(after.source));
    }
    if before.status != after.status {
        diff.insert("status".into(), json!(after.status));
    }
    if before.notes != after.notes {
        diff.insert("notes".into(), json!(after.notes));
    }
    // Order-sensitive: ["a","b"] vs ["b","a"] is a change.
    if before.tags != after.tags {
        diff.insert("tags".into(), json!(after.tags));
    }

    diff
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Bhk, City, PropertyType, Purpose, Source, Status, Timeline};
    use chrono::Utc;
    use uuid::Uuid;

    fn sample_lead() -> Lead {
        Lead {
            id: Uuid::new_v4(),
            full_name: "Asha Verma".into(),
            email: Some("asha@example.com".into()),
            phone: "9876543210".into(),
            city: City::Mohali,
            property_type: PropertyType::Apartment,
            bhk: Some(Bhk::Two),
            purpose: Purpose::Buy,
            budget_min: Some(1_000_000),
            budget_max: Some(2_000_000),
            timeline: Timeline::UnderThreeMonths,
            source: Source::Website,
            status: Status::New,
            notes: None,
            tags: vec!["hot".into()],
            owner_id: "u1".into(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_identical_leads_diff_empty() {
        let lead = sample_lead();
        assert!(lead_diff(&lead, &lead).is_empty());
    }

    #[test]
    fn test_changed_fields_only() {
        let before = sample_lead();
        let mut after = before.clone();
        after.status = Status::Qualified;
        after.budget_max = Some(2_500_000);

        let diff = lead_diff(&before, &after);
        assert_eq!(diff.len(), 2);
        assert_eq!(diff["status"], "Qualified");
        assert_eq!(diff["budgetMax"], 2_500_000);
    }

    #[test]
    fn test_bhk_added_appears_with_wire_literal() {
        let mut before = sample_lead();
        before.bhk = None;
        let mut after = before.clone();
        after.bhk = Some(Bhk::Two);

        let diff = lead_diff(&before, &after);
        assert_eq!(diff.len(), 1);
        assert_eq!(diff["bhk"], "2");
    }

    #[test]
    fn test_cleared_optional_recorded_as_null() {
        let before = sample_lead();
        let mut after = before.clone();
        after.email = None;

        let diff = lead_diff(&before, &after);
        assert_eq!(diff["email"], Value::Null);
    }

    #[test]
    fn test_tags_order_sensitive() {
        let mut before = sample_lead();
        before.tags = vec!["a".into(), "b".into()];
        let mut after = before.clone();
        after.tags = vec!["b".into(), "a".into()];

        let diff = lead_diff(&before, &after);
        assert_eq!(diff["tags"], json!(["b", "a"]));
    }

    #[test]
    fn test_bookkeeping_fields_never_diffed() {
        let before = sample_lead();
        let mut after = before.clone();
        after.updated_at = Utc::now();
        after.id = before.id;

        assert!(lead_diff(&before, &after).is_empty());
    }

    #[test]
    fn test_diff_idempotent() {
        let before = sample_lead();
        let mut after = before.clone();
        after.city = City::Zirakpur;

        assert!(!lead_diff(&before, &after).is_empty());
        assert!(lead_diff(&after, &after).is_empty());
    }
}
