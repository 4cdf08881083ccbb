//! Collaborator interfaces the engine consumes.
//!
//! The engine never talks to a backend directly: records come in through
//! [`EventSource`] and the durable "last cleared" marker lives behind
//! [`ClearMarkerStore`]. `storage` provides file-backed implementations.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::records::{Call, Contact, Deal, Note, Rep};
use crate::task::TaskKind;

/// Read access to the CRM's records plus the one write the engine issues.
pub trait EventSource {
    /// Calls, optionally restricted to one owner.
    fn fetch_calls(&self, owner_id: Option<&str>) -> Result<Vec<Call>>;

    /// Notes grouped by contact id.
    fn fetch_notes(&self) -> Result<BTreeMap<String, Vec<Note>>>;

    fn fetch_deals(&self) -> Result<Vec<Deal>>;

    fn fetch_contacts(&self) -> Result<Vec<Contact>>;

    fn fetch_reps(&self) -> Result<Vec<Rep>>;

    /// Persist a completion: `completed_at` on notes, `todo_completed_at` on
    /// deals.
    fn mark_task_complete(&self, kind: TaskKind, id: &str, at: DateTime<Utc>) -> Result<()>;
}

/// Durable per-representative "last cleared" marker.
pub trait ClearMarkerStore {
    fn last_cleared(&self, rep_id: &str) -> Result<Option<DateTime<Utc>>>;

    fn set_last_cleared(&self, rep_id: &str, at: DateTime<Utc>) -> Result<()>;
}

/// Everything one load of the event store returns.
#[derive(Debug, Clone, Default)]
pub struct SourceData {
    pub calls: Vec<Call>,
    pub notes: BTreeMap<String, Vec<Note>>,
    pub deals: Vec<Deal>,
    pub contacts: Vec<Contact>,
    pub reps: Vec<Rep>,
}

impl SourceData {
    /// Load every record kind in one pass.
    pub fn load(source: &dyn EventSource) -> Result<Self> {
        Ok(Self {
            calls: source.fetch_calls(None)?,
            notes: source.fetch_notes()?,
            deals: source.fetch_deals()?,
            contacts: source.fetch_contacts()?,
            reps: source.fetch_reps()?,
        })
    }
}
