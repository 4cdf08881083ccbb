#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use repdesk::storage::{ClearMarkers, Storage};
use serde_json::{json, Value};
use tempfile::TempDir;

/// Config pinning the calendar to UTC so dates in tests are stable.
pub const UTC_CONFIG: &str = r#"
[calendar]
utc_offset = "Z"
week_start = "monday"
"#;

/// A data directory plus a separate state directory for clear markers.
pub struct TestStore {
    dir: TempDir,
    state: TempDir,
    storage: Storage,
}

impl TestStore {
    pub fn init() -> std::io::Result<Self> {
        let dir = tempfile::tempdir()?;
        let state = tempfile::tempdir()?;
        let storage = Storage::new(dir.path());
        storage.init().map_err(std::io::Error::other)?;
        fs::write(dir.path().join(".repdesk.toml"), UTC_CONFIG)?;
        Ok(Self { dir, state, storage })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn state_dir(&self) -> &Path {
        self.state.path()
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    pub fn markers(&self) -> ClearMarkers {
        ClearMarkers::in_dir(self.state.path())
    }

    pub fn write_config(&self, contents: &str) -> std::io::Result<PathBuf> {
        let path = self.dir.path().join(".repdesk.toml");
        fs::write(&path, contents)?;
        Ok(path)
    }

    fn append(&self, path: PathBuf, record: Value) {
        self.storage.append_jsonl(&path, &record).expect("append record");
    }

    pub fn add_rep(&self, id: &str, name: &str) {
        self.append(self.storage.reps_file(), json!({"id": id, "name": name}));
    }

    pub fn add_contact(&self, id: &str, owner: &str, name: &str, created_at: Option<&str>) {
        self.append(
            self.storage.contacts_file(),
            json!({"id": id, "owner_id": owner, "name": name, "company": "Acme", "created_at": created_at}),
        );
    }

    pub fn add_note(&self, id: &str, contact: &str, reminder_at: &str, completed_at: Option<&str>) {
        self.append(
            self.storage.notes_file(),
            json!({"id": id, "contact_id": contact, "text": format!("note {id}"),
                   "reminder_at": reminder_at, "completed_at": completed_at}),
        );
    }

    pub fn add_deal(&self, record: Value) {
        self.append(self.storage.deals_file(), record);
    }

    pub fn add_call(&self, id: &str, owner: &str, called_at: &str, outcome: &str) {
        self.append(
            self.storage.calls_file(),
            json!({"id": id, "owner_id": owner, "called_at": called_at, "outcome": outcome}),
        );
    }

    /// `repdesk` pointed at this store, acting as `rep`.
    pub fn cmd(&self, rep: &str) -> Command {
        let mut cmd = repdesk_cmd();
        cmd.env("REPDESK_ROOT", self.path())
            .env("REPDESK_STATE_DIR", self.state_dir())
            .env("REPDESK_REP", rep);
        cmd
    }
}

pub fn repdesk_cmd() -> Command {
    let mut cmd = Command::cargo_bin("repdesk").expect("binary");
    cmd.env_remove("REPDESK_ROOT")
        .env_remove("REPDESK_STATE_DIR")
        .env_remove("REPDESK_REP")
        .env_remove("RUST_LOG");
    cmd
}

pub fn at(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .expect("timestamp")
        .with_timezone(&Utc)
}

/// UTC calendar day `offset` days from today, as `YYYY-MM-DD`.
pub fn day(offset: i64) -> String {
    today()
        .checked_add_signed(Duration::days(offset))
        .expect("date in range")
        .format("%Y-%m-%d")
        .to_string()
}

pub fn today() -> NaiveDate {
    Utc::now().date_naive()
}

/// Instant `hours` before now, RFC 3339.
pub fn hours_ago(hours: i64) -> String {
    (Utc::now() - Duration::hours(hours)).to_rfc3339()
}

pub fn parse_stdout(output: &std::process::Output) -> Value {
    serde_json::from_slice(&output.stdout).expect("json stdout")
}
