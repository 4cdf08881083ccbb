//! File-backed event store and clear markers.
//!
//! # Directory Structure
//!
//! ```text
//! <root>/
//!   .repdesk.toml               # Configuration
//!   .repdesk/                   # Data directory
//!     reps.jsonl                # Representatives
//!     calls.jsonl               # Logged calls
//!     notes.jsonl               # Contact notes, some with reminders
//!     deals.jsonl               # Deals with next actions
//!     contacts.jsonl            # Contacts
//!     store.lock                # Held for every read-modify-write
//!
//! <state dir>/
//!   cleared.json                # {rep_id: last cleared timestamp}
//! ```
//!
//! Reads are lenient: a line that is not a valid record is logged and
//! skipped. Writes rewrite the whole file atomically under the store lock
//! and leave lines they do not touch byte-for-byte intact.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};

use crate::error::{Error, Result};
use crate::lock::{self, FileLock, DEFAULT_LOCK_TIMEOUT_MS};
use crate::records::{Call, Contact, Deal, Note, Rep};
use crate::source::{ClearMarkerStore, EventSource};
use crate::task::{TaskKind, TaskUid};

/// Name of the data directory under the root
pub const DATA_DIR: &str = ".repdesk";

const REPS_FILE: &str = "reps.jsonl";
const CALLS_FILE: &str = "calls.jsonl";
const NOTES_FILE: &str = "notes.jsonl";
const DEALS_FILE: &str = "deals.jsonl";
const CONTACTS_FILE: &str = "contacts.jsonl";
const LOCK_FILE: &str = "store.lock";

/// Name of the clear-marker file inside the state directory
pub const CLEARED_FILE: &str = "cleared.json";

/// Event store over JSONL files
#[derive(Debug, Clone)]
pub struct Storage {
    root: PathBuf,
}

impl Storage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Open an initialized store, failing when the data directory is missing.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let storage = Self::new(root);
        if !storage.is_initialized() {
            return Err(Error::StoreNotFound(storage.data_dir()));
        }
        Ok(storage)
    }

    // =========================================================================
    // Path accessors
    // =========================================================================

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn data_dir(&self) -> PathBuf {
        self.root.join(DATA_DIR)
    }

    pub fn reps_file(&self) -> PathBuf {
        self.data_dir().join(REPS_FILE)
    }

    pub fn calls_file(&self) -> PathBuf {
        self.data_dir().join(CALLS_FILE)
    }

    pub fn notes_file(&self) -> PathBuf {
        self.data_dir().join(NOTES_FILE)
    }

    pub fn deals_file(&self) -> PathBuf {
        self.data_dir().join(DEALS_FILE)
    }

    pub fn contacts_file(&self) -> PathBuf {
        self.data_dir().join(CONTACTS_FILE)
    }

    pub fn lock_file(&self) -> PathBuf {
        self.data_dir().join(LOCK_FILE)
    }

    // =========================================================================
    // Directory initialization
    // =========================================================================

    /// Create the data directory and empty record files. Existing files are
    /// left untouched.
    pub fn init(&self) -> Result<()> {
        fs::create_dir_all(self.data_dir())?;
        for path in [
            self.reps_file(),
            self.calls_file(),
            self.notes_file(),
            self.deals_file(),
            self.contacts_file(),
        ] {
            if !path.exists() {
                File::create(&path)?;
            }
        }
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.data_dir().is_dir()
    }

    // =========================================================================
    // File I/O helpers
    // =========================================================================

    /// Append one record. The caller decides whether to hold the lock.
    pub fn append_jsonl<T: Serialize>(&self, path: &Path, record: &T) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string(record)?;
        let mut file = fs::OpenOptions::new().create(true).append(true).open(path)?;
        writeln!(file, "{}", json)?;
        file.sync_all()?;
        Ok(())
    }

    /// Read every well-formed record; bad lines are skipped with a warning.
    pub fn read_jsonl<T: DeserializeOwned>(&self, path: &Path) -> Result<Vec<T>> {
        if !path.exists() {
            return Ok(Vec::new());
        }

        let reader = BufReader::new(File::open(path)?);
        let mut records = Vec::new();
        for (index, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str(&line) {
                Ok(record) => records.push(record),
                Err(err) => {
                    tracing::warn!(
                        file = %path.display(),
                        line = index + 1,
                        error = %err,
                        "skipping invalid record"
                    );
                }
            }
        }
        Ok(records)
    }

    /// Stamp `field` on the record with `id`, rewriting the file atomically.
    ///
    /// Returns whether a record matched. Other lines, malformed ones
    /// included, are written back unchanged.
    fn stamp_record(&self, path: &Path, id: &str, field: &str, at: DateTime<Utc>) -> Result<bool> {
        let _lock = FileLock::acquire(self.lock_file(), DEFAULT_LOCK_TIMEOUT_MS)?;
        if !path.exists() {
            return Ok(false);
        }

        let content = fs::read_to_string(path)?;
        let mut found = false;
        let mut out = String::with_capacity(content.len() + 40);
        for line in content.lines() {
            let stamped = match serde_json::from_str::<serde_json::Value>(line) {
                Ok(serde_json::Value::Object(mut record))
                    if !found && record.get("id").and_then(|v| v.as_str()) == Some(id) =>
                {
                    found = true;
                    record.insert(
                        field.to_string(),
                        serde_json::Value::String(at.to_rfc3339()),
                    );
                    Some(serde_json::to_string(&record)?)
                }
                _ => None,
            };
            out.push_str(stamped.as_deref().unwrap_or(line));
            out.push('\n');
        }

        if found {
            lock::write_atomic(path, out.as_bytes())?;
        }
        Ok(found)
    }
}

impl EventSource for Storage {
    fn fetch_calls(&self, owner_id: Option<&str>) -> Result<Vec<Call>> {
        let mut calls: Vec<Call> = self.read_jsonl(&self.calls_file())?;
        if let Some(owner_id) = owner_id {
            calls.retain(|call| call.owner_id == owner_id);
        }
        Ok(calls)
    }

    fn fetch_notes(&self) -> Result<BTreeMap<String, Vec<Note>>> {
        let notes: Vec<Note> = self.read_jsonl(&self.notes_file())?;
        let mut grouped: BTreeMap<String, Vec<Note>> = BTreeMap::new();
        for note in notes {
            grouped.entry(note.contact_id.clone()).or_default().push(note);
        }
        Ok(grouped)
    }

    fn fetch_deals(&self) -> Result<Vec<Deal>> {
        self.read_jsonl(&self.deals_file())
    }

    fn fetch_contacts(&self) -> Result<Vec<Contact>> {
        self.read_jsonl(&self.contacts_file())
    }

    fn fetch_reps(&self) -> Result<Vec<Rep>> {
        self.read_jsonl(&self.reps_file())
    }

    fn mark_task_complete(&self, kind: TaskKind, id: &str, at: DateTime<Utc>) -> Result<()> {
        let (path, field) = match kind {
            TaskKind::Note => (self.notes_file(), "completed_at"),
            TaskKind::Deal => (self.deals_file(), "todo_completed_at"),
        };
        if !self.stamp_record(&path, id, field, at)? {
            return Err(Error::TaskNotFound(TaskUid::new(kind, id).to_string()));
        }
        tracing::info!(kind = %kind, id, "completion recorded");
        Ok(())
    }
}

/// Per-representative "last cleared" markers in one small JSON map.
#[derive(Debug, Clone)]
pub struct ClearMarkers {
    path: PathBuf,
}

impl ClearMarkers {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Markers stored as `cleared.json` inside `dir`.
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        Self::new(dir.as_ref().join(CLEARED_FILE))
    }

    /// The platform state directory, falling back to local data where the
    /// platform has no state directory.
    pub fn default_location() -> Result<Self> {
        let dirs = directories::ProjectDirs::from("", "", "repdesk").ok_or_else(|| {
            Error::OperationFailed("could not determine a home directory".to_string())
        })?;
        let dir = dirs.state_dir().unwrap_or_else(|| dirs.data_local_dir());
        Ok(Self::in_dir(dir))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock_path(&self) -> PathBuf {
        PathBuf::from(format!("{}.lock", self.path.display()))
    }

    /// All markers. A corrupt file reads as empty so a bad marker can only
    /// make more tasks visible, never fewer.
    pub fn read_all(&self) -> Result<BTreeMap<String, DateTime<Utc>>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let content = fs::read_to_string(&self.path)?;
        match serde_json::from_str(&content) {
            Ok(markers) => Ok(markers),
            Err(err) => {
                tracing::warn!(path = %self.path.display(), error = %err, "ignoring corrupt clear markers");
                Ok(BTreeMap::new())
            }
        }
    }
}

impl ClearMarkerStore for ClearMarkers {
    fn last_cleared(&self, rep_id: &str) -> Result<Option<DateTime<Utc>>> {
        Ok(self.read_all()?.get(rep_id).copied())
    }

    fn set_last_cleared(&self, rep_id: &str, at: DateTime<Utc>) -> Result<()> {
        let _lock = FileLock::acquire(self.lock_path(), DEFAULT_LOCK_TIMEOUT_MS)?;
        let mut markers = self.read_all()?;
        markers.insert(rep_id.to_string(), at);
        let json = serde_json::to_string_pretty(&markers)?;
        lock::write_atomic(&self.path, json.as_bytes())?;
        tracing::debug!(rep = rep_id, at = %at, "clear marker saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::When;
    use tempfile::TempDir;

    fn at(raw: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(raw).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn test_storage_paths() {
        let storage = Storage::new("/data/crm");
        assert_eq!(storage.data_dir(), PathBuf::from("/data/crm/.repdesk"));
        assert_eq!(storage.deals_file(), PathBuf::from("/data/crm/.repdesk/deals.jsonl"));
        assert_eq!(storage.lock_file(), PathBuf::from("/data/crm/.repdesk/store.lock"));
    }

    #[test]
    fn open_requires_init() {
        let temp_dir = TempDir::new().unwrap();
        assert!(matches!(Storage::open(temp_dir.path()), Err(Error::StoreNotFound(_))));

        let storage = Storage::new(temp_dir.path());
        storage.init().unwrap();
        assert!(storage.notes_file().exists());
        assert!(Storage::open(temp_dir.path()).is_ok());
    }

    #[test]
    fn invalid_lines_are_skipped() {
        let temp_dir = TempDir::new().unwrap();
        let storage = Storage::new(temp_dir.path());
        storage.init().unwrap();
        fs::write(
            storage.reps_file(),
            "{\"id\":\"r1\",\"name\":\"Ana\"}\nnot json\n\n{\"name\":\"no id\"}\n{\"id\":\"r2\"}\n",
        )
        .unwrap();

        let reps = storage.fetch_reps().unwrap();
        let ids: Vec<&str> = reps.iter().map(|rep| rep.id.as_str()).collect();
        assert_eq!(ids, vec!["r1", "r2"]);
    }

    #[test]
    fn notes_are_grouped_by_contact() {
        let temp_dir = TempDir::new().unwrap();
        let storage = Storage::new(temp_dir.path());
        storage.init().unwrap();
        for (id, contact) in [("n1", "c1"), ("n2", "c2"), ("n3", "c1")] {
            storage
                .append_jsonl(
                    &storage.notes_file(),
                    &serde_json::json!({"id": id, "contact_id": contact, "text": "x"}),
                )
                .unwrap();
        }

        let notes = storage.fetch_notes().unwrap();
        assert_eq!(notes["c1"].len(), 2);
        assert_eq!(notes["c2"].len(), 1);
    }

    #[test]
    fn mark_complete_stamps_only_the_target() {
        let temp_dir = TempDir::new().unwrap();
        let storage = Storage::new(temp_dir.path());
        storage.init().unwrap();
        fs::write(
            storage.deals_file(),
            "{\"id\":\"d1\",\"owner_id\":\"r1\",\"stage\":\"discovery\",\"custom\":7}\n\
             garbage line\n\
             {\"id\":\"d2\",\"owner_id\":\"r1\",\"stage\":\"quote_sent\"}\n",
        )
        .unwrap();

        let now = at("2026-10-19T09:00:00Z");
        storage.mark_task_complete(TaskKind::Deal, "d1", now).unwrap();

        let content = fs::read_to_string(storage.deals_file()).unwrap();
        assert!(content.contains("garbage line"));
        assert!(content.contains("\"custom\":7"));
        let deals = storage.fetch_deals().unwrap();
        assert_eq!(deals[0].todo_completed_at, Some(When::At(now)));
        assert_eq!(deals[1].todo_completed_at, None);
    }

    #[test]
    fn mark_complete_unknown_record_fails() {
        let temp_dir = TempDir::new().unwrap();
        let storage = Storage::new(temp_dir.path());
        storage.init().unwrap();

        let result = storage.mark_task_complete(TaskKind::Note, "missing", at("2026-10-19T09:00:00Z"));
        assert!(matches!(result, Err(Error::TaskNotFound(uid)) if uid == "note-missing"));
    }

    #[test]
    fn fetch_calls_filters_by_owner() {
        let temp_dir = TempDir::new().unwrap();
        let storage = Storage::new(temp_dir.path());
        storage.init().unwrap();
        fs::write(
            storage.calls_file(),
            "{\"id\":\"k1\",\"owner_id\":\"r1\"}\n{\"id\":\"k2\",\"owner_id\":\"r2\"}\n",
        )
        .unwrap();

        assert_eq!(storage.fetch_calls(None).unwrap().len(), 2);
        assert_eq!(storage.fetch_calls(Some("r2")).unwrap()[0].id, "k2");
    }

    #[test]
    fn clear_markers_persist_per_rep() {
        let temp_dir = TempDir::new().unwrap();
        let markers = ClearMarkers::in_dir(temp_dir.path().join("state"));
        assert_eq!(markers.last_cleared("r1").unwrap(), None);

        markers.set_last_cleared("r1", at("2026-10-19T09:00:00Z")).unwrap();
        markers.set_last_cleared("r2", at("2026-10-18T09:00:00Z")).unwrap();
        markers.set_last_cleared("r1", at("2026-10-19T10:00:00Z")).unwrap();

        let reopened = ClearMarkers::new(markers.path());
        assert_eq!(reopened.last_cleared("r1").unwrap(), Some(at("2026-10-19T10:00:00Z")));
        assert_eq!(reopened.last_cleared("r2").unwrap(), Some(at("2026-10-18T09:00:00Z")));
    }

    #[test]
    fn corrupt_markers_read_as_empty() {
        let temp_dir = TempDir::new().unwrap();
        let markers = ClearMarkers::in_dir(temp_dir.path());
        fs::write(markers.path(), "{oops").unwrap();
        assert_eq!(markers.last_cleared("r1").unwrap(), None);
    }
}
