//! SQLite persistence for leads and their history log.
//!
//! The schema is embedded at compile time from `schema.sql`. A lead mutation
//! and its history entry are always written in one transaction so the pair
//! can never drift apart; history deletion happens only through the
//! `ON DELETE CASCADE` foreign key, never as an explicit statement.
//!
//! [`Database`] is cheap to clone and safe to share across request handlers:
//! it wraps a single connection behind a mutex, which is plenty for this
//! workload.

use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

use crate::error::{StoreError, StoreResult};
use crate::models::{Bhk, City, HistoryEntry, Lead, PropertyType, Purpose, Source, Status, Timeline};

const SCHEMA: &str = include_str!("schema.sql");

/// Handle to the lead store.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open (or create) the database file and apply the schema.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        Self::from_connection(Connection::open(path)?)
    }

    /// Fresh in-memory database, used by tests and dry runs.
    pub fn open_in_memory() -> StoreResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> StoreResult<Self> {
        // Cascade deletes depend on this pragma; SQLite defaults it off.
        conn.pragma_update(None, "foreign_keys", true)?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn: Arc::new(Mutex::new(conn)) })
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    // =========================================================================
    // Leads
    // =========================================================================

    /// Insert a new lead together with its creation history entry.
    pub fn insert_lead(&self, lead: &Lead, entry: &HistoryEntry) -> StoreResult<()> {
        let mut conn = self.lock();
        let tx = conn.transaction()?;
        insert_lead_tx(&tx, lead)?;
        insert_history_tx(&tx, entry)?;
        tx.commit()?;
        Ok(())
    }

    /// Insert a whole import batch in one transaction: either every lead and
    /// its creation entry land, or none do.
    pub fn insert_leads(&self, batch: &[(Lead, HistoryEntry)]) -> StoreResult<()> {
        let mut conn = self.lock();
        let tx = conn.transaction()?;
        for (lead, entry) in batch {
            insert_lead_tx(&tx, lead)?;
            insert_history_tx(&tx, entry)?;
        }
        tx.commit()?;
        Ok(())
    }

    pub fn get_lead(&self, id: Uuid) -> StoreResult<Option<Lead>> {
        let conn = self.lock();
        conn.query_row(
            &format!("SELECT {} FROM leads WHERE id = ?1", LEAD_COLUMNS),
            params![id.to_string()],
            row_to_lead,
        )
        .optional()
        .map_err(StoreError::from)
    }

    /// All leads, most recently updated first.
    pub fn list_leads(&self) -> StoreResult<Vec<Lead>> {
        let conn = self.lock();
        let mut stmt =
            conn.prepare(&format!("SELECT {} FROM leads ORDER BY updated_at DESC, id", LEAD_COLUMNS))?;
        let rows = stmt.query_map([], row_to_lead)?;
        let mut leads = Vec::new();
        for row in rows {
            leads.push(row?);
        }
        Ok(leads)
    }

    /// Write all fields of an updated lead and, when a diff was recorded,
    /// its history entry — atomically.
    pub fn update_lead(&self, lead: &Lead, entry: Option<&HistoryEntry>) -> StoreResult<()> {
        let mut conn = self.lock();
        let tx = conn.transaction()?;
        tx.execute(
            r#"
            UPDATE leads SET
                full_name = ?1, email = ?2, phone = ?3, city = ?4, property_type = ?5,
                bhk = ?6, purpose = ?7, budget_min = ?8, budget_max = ?9, timeline = ?10,
                source = ?11, status = ?12, notes = ?13, tags = ?14, updated_at = ?15
            WHERE id = ?16
            "#,
            params![
                lead.full_name,
                lead.email,
                lead.phone,
                lead.city.as_str(),
                lead.property_type.as_str(),
                lead.bhk.map(|b| b.as_str()),
                lead.purpose.as_str(),
                lead.budget_min,
                lead.budget_max,
                lead.timeline.as_str(),
                lead.source.as_str(),
                lead.status.as_str(),
                lead.notes,
                serde_json::to_string(&lead.tags)?,
                lead.updated_at,
                lead.id.to_string(),
            ],
        )?;
        if let Some(entry) = entry {
            insert_history_tx(&tx, entry)?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Delete a lead. History rows go with it via the cascade.
    /// Returns whether a row existed.
    pub fn delete_lead(&self, id: Uuid) -> StoreResult<bool> {
        let conn = self.lock();
        let affected = conn.execute("DELETE FROM leads WHERE id = ?1", params![id.to_string()])?;
        Ok(affected > 0)
    }

    // =========================================================================
    // History
    // =========================================================================

    /// History entries for a lead, newest first.
    pub fn history_for(&self, lead_id: Uuid, limit: u32) -> StoreResult<Vec<HistoryEntry>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            r#"
            SELECT id, lead_id, changed_by, changed_at, diff
            FROM lead_history
            WHERE lead_id = ?1
            ORDER BY changed_at DESC, id
            LIMIT ?2
            "#,
        )?;
        let rows = stmt.query_map(params![lead_id.to_string(), limit], row_to_history)?;
        let mut entries = Vec::new();
        for row in rows {
            entries.push(row?);
        }
        Ok(entries)
    }
}

const LEAD_COLUMNS: &str = "id, full_name, email, phone, city, property_type, bhk, purpose, \
     budget_min, budget_max, timeline, source, status, notes, tags, owner_id, updated_at";

fn insert_lead_tx(tx: &Connection, lead: &Lead) -> StoreResult<()> {
    tx.execute(
        r#"
        INSERT INTO leads (
            id, full_name, email, phone, city, property_type, bhk, purpose,
            budget_min, budget_max, timeline, source, status, notes, tags,
            owner_id, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)
        "#,
        params![
            lead.id.to_string(),
            lead.full_name,
            lead.email,
            lead.phone,
            lead.city.as_str(),
            lead.property_type.as_str(),
            lead.bhk.map(|b| b.as_str()),
            lead.purpose.as_str(),
            lead.budget_min,
            lead.budget_max,
            lead.timeline.as_str(),
            lead.source.as_str(),
            lead.status.as_str(),
            lead.notes,
            serde_json::to_string(&lead.tags)?,
            lead.owner_id,
            lead.updated_at,
        ],
    )?;
    Ok(())
}

fn insert_history_tx(tx: &Connection, entry: &HistoryEntry) -> StoreResult<()> {
    tx.execute(
        r#"
        INSERT INTO lead_history (id, lead_id, changed_by, changed_at, diff)
        VALUES (?1, ?2, ?3, ?4, ?5)
        "#,
        params![
            entry.id.to_string(),
            entry.lead_id.to_string(),
            entry.changed_by,
            entry.changed_at,
            serde_json::to_string(&entry.diff)?,
        ],
    )?;
    Ok(())
}

/// Turn a stored text column back into its domain type, reporting the
/// offending column and value when the stored data no longer parses.
fn decode<T>(index: usize, column: &str, value: String, parse: impl Fn(&str) -> Option<T>) -> rusqlite::Result<T> {
    parse(&value).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            index,
            Type::Text,
            Box::new(StoreError::Decode { column: column.to_string(), value }),
        )
    })
}

fn decode_json<T: serde::de::DeserializeOwned>(index: usize, value: String) -> rusqlite::Result<T> {
    serde_json::from_str(&value).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(index, Type::Text, Box::new(StoreError::Json(e)))
    })
}

fn row_to_lead(row: &Row<'_>) -> rusqlite::Result<Lead> {
    let bhk = match row.get::<_, Option<String>>(6)? {
        Some(value) => Some(decode(6, "bhk", value, Bhk::from_value)?),
        None => None,
    };
    Ok(Lead {
        id: decode(0, "id", row.get(0)?, |v| Uuid::parse_str(v).ok())?,
        full_name: row.get(1)?,
        email: row.get(2)?,
        phone: row.get(3)?,
        city: decode(4, "city", row.get(4)?, City::from_value)?,
        property_type: decode(5, "property_type", row.get(5)?, PropertyType::from_value)?,
        bhk,
        purpose: decode(7, "purpose", row.get(7)?, Purpose::from_value)?,
        budget_min: row.get(8)?,
        budget_max: row.get(9)?,
        timeline: decode(10, "timeline", row.get(10)?, Timeline::from_value)?,
        source: decode(11, "source", row.get(11)?, Source::from_value)?,
        status: decode(12, "status", row.get(12)?, Status::from_value)?,
        notes: row.get(13)?,
        tags: decode_json(14, row.get(14)?)?,
        owner_id: row.get(15)?,
        updated_at: row.get(16)?,
    })
}

fn row_to_history(row: &Row<'_>) -> rusqlite::Result<HistoryEntry> {
    Ok(HistoryEntry {
        id: decode(0, "id", row.get(0)?, |v| Uuid::parse_str(v).ok())?,
        lead_id: decode(1, "lead_id", row.get(1)?, |v| Uuid::parse_str(v).ok())?,
        changed_by: row.get(2)?,
        changed_at: row.get(3)?,
        diff: decode_json(4, row.get(4)?)?,
    })
}

// =============================================================================
// Tests
// =============================================================================
