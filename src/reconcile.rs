//! Completion reconciliation.
//!
//! Completion state has two tiers: the authoritative `remote_completed_at`
//! returned by the store, and a set of local overrides recorded the moment a
//! user ticks a task off. Overrides only hide latency: every reload discards
//! them, so a confirmed write shows through its remote timestamp and a write
//! that never landed shows the task as pending again.
//!
//! Clearing hides completed tasks in two ways: immediately, through the
//! session-hidden set, and durably, through the `last_cleared_at` threshold
//! that survives restarts. Completed tasks older than the retention window
//! are dropped regardless.

use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::task::{Task, TaskKind, TaskUid};

/// Days a remotely completed task stays visible when never cleared.
pub const DEFAULT_RETENTION_DAYS: i64 = 14;

/// Upper bound accepted for a configured retention window.
pub const MAX_RETENTION_DAYS: i64 = 36_500;

/// A durable write the caller should hand to the event store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompletionRequest {
    pub uid: TaskUid,
    pub kind: TaskKind,
    pub source_id: String,
    pub at: DateTime<Utc>,
}

/// Result of a clear action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClearOutcome {
    pub cleared_at: DateTime<Utc>,
    /// Uids newly hidden by this clear.
    pub hidden: usize,
}

/// Per-representative completion state for one session.
#[derive(Debug, Clone)]
pub struct CompletionLedger {
    local_overrides: HashSet<TaskUid>,
    session_hidden: HashSet<TaskUid>,
    last_cleared_at: Option<DateTime<Utc>>,
    retention: Duration,
}

impl CompletionLedger {
    pub fn new(last_cleared_at: Option<DateTime<Utc>>) -> Self {
        Self::with_retention(last_cleared_at, Duration::days(DEFAULT_RETENTION_DAYS))
    }

    pub fn with_retention(last_cleared_at: Option<DateTime<Utc>>, retention: Duration) -> Self {
        Self {
            local_overrides: HashSet::new(),
            session_hidden: HashSet::new(),
            last_cleared_at,
            retention,
        }
    }

    pub fn last_cleared_at(&self) -> Option<DateTime<Utc>> {
        self.last_cleared_at
    }

    pub fn retention(&self) -> Duration {
        self.retention
    }

    pub fn has_override(&self, uid: &TaskUid) -> bool {
        self.local_overrides.contains(uid)
    }

    pub fn is_session_hidden(&self, uid: &TaskUid) -> bool {
        self.session_hidden.contains(uid)
    }

    /// Remote truth first, then the optimistic override.
    pub fn is_completed(&self, task: &Task) -> bool {
        task.remote_completed_at.is_some() || self.local_overrides.contains(&task.uid)
    }

    /// Mark a task done locally. Completion is one-directional, so an
    /// already-completed task yields no request.
    pub fn toggle_complete(&mut self, task: &Task, now: DateTime<Utc>) -> Option<CompletionRequest> {
        if self.is_completed(task) {
            return None;
        }
        self.local_overrides.insert(task.uid.clone());
        Some(CompletionRequest {
            uid: task.uid.clone(),
            kind: task.kind,
            source_id: task.source_id.clone(),
            at: now,
        })
    }

    /// Hide everything currently completed and advance the clear marker.
    ///
    /// The caller persists `cleared_at` and reloads afterwards.
    pub fn clear_completed(&mut self, tasks: &[Task], now: DateTime<Utc>) -> ClearOutcome {
        self.last_cleared_at = Some(now);

        let completed: Vec<TaskUid> = tasks
            .iter()
            .filter(|task| self.is_completed(task))
            .map(|task| task.uid.clone())
            .collect();
        let mut hidden = 0;
        for uid in completed {
            if self.session_hidden.insert(uid) {
                hidden += 1;
            }
        }

        self.local_overrides.clear();
        ClearOutcome {
            cleared_at: now,
            hidden,
        }
    }

    /// Reload hook: remote state becomes authoritative again.
    ///
    /// Every override is dropped. Confirmed completions now carry their
    /// remote timestamp; a task whose write never landed reads as pending.
    /// Returns the uids whose override the store did not confirm.
    pub fn reconcile(&mut self, tasks: &[Task]) -> Vec<TaskUid> {
        let confirmed: HashSet<&TaskUid> = tasks
            .iter()
            .filter(|task| task.remote_completed_at.is_some())
            .map(|task| &task.uid)
            .collect();
        let mut unconfirmed: Vec<TaskUid> = self
            .local_overrides
            .drain()
            .filter(|uid| !confirmed.contains(uid))
            .collect();
        unconfirmed.sort();
        self.session_hidden.clear();
        unconfirmed
    }

    pub fn is_visible(&self, task: &Task, now: DateTime<Utc>) -> bool {
        if self.session_hidden.contains(&task.uid) {
            return false;
        }
        let Some(completed_at) = task.remote_completed_at else {
            return true;
        };
        if self.last_cleared_at.is_some_and(|cleared| completed_at <= cleared) {
            return false;
        }
        // A retention reaching past the first representable instant expires nothing.
        now.checked_sub_signed(self.retention)
            .map_or(true, |oldest| completed_at >= oldest)
    }

    /// Visible tasks, each paired with its resolved completion state.
    pub fn visible<'a>(&self, tasks: &'a [Task], now: DateTime<Utc>) -> Vec<TaskEntry<'a>> {
        tasks
            .iter()
            .filter(|task| self.is_visible(task, now))
            .map(|task| TaskEntry {
                task,
                completed: self.is_completed(task),
            })
            .collect()
    }
}

impl Default for CompletionLedger {
    fn default() -> Self {
        Self::new(None)
    }
}

/// A task together with its reconciled completion state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TaskEntry<'a> {
    #[serde(flatten)]
    pub task: &'a Task,
    pub completed: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(raw: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(raw).expect("timestamp").with_timezone(&Utc)
    }

    fn task(id: &str, completed_at: Option<&str>) -> Task {
        Task {
            uid: TaskUid::new(TaskKind::Note, id),
            kind: TaskKind::Note,
            source_id: id.to_string(),
            owner_id: "r1".to_string(),
            due_at: Some(at("2026-10-18T09:00:00Z")),
            remote_completed_at: completed_at.map(at),
            text: String::new(),
            subject_name: None,
            subject_company: None,
        }
    }

    #[test]
    fn remote_completion_wins_over_missing_override() {
        let ledger = CompletionLedger::default();
        assert!(ledger.is_completed(&task("n1", Some("2026-10-18T10:00:00Z"))));
        assert!(!ledger.is_completed(&task("n2", None)));
    }

    #[test]
    fn toggle_sets_override_once() {
        let mut ledger = CompletionLedger::default();
        let pending = task("n1", None);
        let now = at("2026-10-19T09:00:00Z");

        let request = ledger.toggle_complete(&pending, now).expect("request");
        assert_eq!(request.uid.as_str(), "note-n1");
        assert_eq!(request.kind, TaskKind::Note);
        assert!(ledger.is_completed(&pending));
        assert!(ledger.toggle_complete(&pending, now).is_none());

        let remote = task("n2", Some("2026-10-18T10:00:00Z"));
        assert!(ledger.toggle_complete(&remote, now).is_none());
    }

    #[test]
    fn reload_supersedes_overrides() {
        let mut ledger = CompletionLedger::default();
        let now = at("2026-10-19T09:00:00Z");
        ledger.toggle_complete(&task("n1", None), now);
        ledger.toggle_complete(&task("n2", None), now);

        let reloaded = vec![task("n1", Some("2026-10-19T09:00:00Z")), task("n2", None)];
        let unconfirmed = ledger.reconcile(&reloaded);
        assert_eq!(unconfirmed, vec![TaskUid::new(TaskKind::Note, "n2")]);
        assert!(!ledger.has_override(&TaskUid::new(TaskKind::Note, "n1")));
        assert!(!ledger.has_override(&TaskUid::new(TaskKind::Note, "n2")));
        // The lost write shows up as pending again.
        assert!(ledger.is_completed(&reloaded[0]));
        assert!(!ledger.is_completed(&reloaded[1]));
    }

    #[test]
    fn clear_hides_completed_until_reload_then_threshold_takes_over() {
        let mut ledger = CompletionLedger::default();
        let toggle_time = at("2026-10-19T09:00:00Z");
        let clear_time = at("2026-10-19T09:05:00Z");
        let tasks = vec![task("n1", None), task("n2", None)];
        ledger.toggle_complete(&tasks[0], toggle_time);

        let outcome = ledger.clear_completed(&tasks, clear_time);
        assert_eq!(outcome.hidden, 1);
        assert_eq!(ledger.last_cleared_at(), Some(clear_time));
        assert!(ledger.is_session_hidden(&tasks[0].uid));
        assert!(!ledger.is_visible(&tasks[0], clear_time));
        assert!(ledger.is_visible(&tasks[1], clear_time));

        // The write landed before the clear, so the threshold keeps it hidden.
        let reloaded = vec![task("n1", Some("2026-10-19T09:00:00Z")), task("n2", None)];
        ledger.reconcile(&reloaded);
        assert!(!ledger.is_session_hidden(&reloaded[0].uid));
        assert!(!ledger.is_visible(&reloaded[0], clear_time));
        assert!(ledger.is_visible(&reloaded[1], clear_time));
    }

    #[test]
    fn clear_is_idempotent_apart_from_marker() {
        let mut ledger = CompletionLedger::default();
        let tasks = vec![task("n1", Some("2026-10-19T08:00:00Z")), task("n2", None)];
        let first = ledger.clear_completed(&tasks, at("2026-10-19T09:00:00Z"));
        let second = ledger.clear_completed(&tasks, at("2026-10-19T09:01:00Z"));
        assert_eq!(first.hidden, 1);
        assert_eq!(second.hidden, 0);
        assert_eq!(ledger.last_cleared_at(), Some(at("2026-10-19T09:01:00Z")));
        let visible = ledger.visible(&tasks, at("2026-10-19T09:02:00Z"));
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].task.uid.as_str(), "note-n2");
    }

    #[test]
    fn completed_tasks_expire_after_retention() {
        let ledger = CompletionLedger::default();
        let now = at("2026-10-19T12:00:00Z");
        let fresh = task("n1", Some("2026-10-06T12:00:00Z"));
        let stale = task("n2", Some("2026-10-04T12:00:00Z"));
        assert!(ledger.is_visible(&fresh, now));
        assert!(!ledger.is_visible(&stale, now));
    }

    #[test]
    fn retention_past_the_calendar_range_expires_nothing() {
        let retention = Duration::try_days(100_000_000).expect("in TimeDelta range");
        let ledger = CompletionLedger::with_retention(None, retention);
        let now = at("2026-10-19T12:00:00Z");
        assert!(ledger.is_visible(&task("n1", Some("1970-01-01T00:00:00Z")), now));
    }

    #[test]
    fn completions_after_the_last_clear_stay_visible() {
        let ledger = CompletionLedger::new(Some(at("2026-10-18T00:00:00Z")));
        let now = at("2026-10-19T12:00:00Z");
        assert!(!ledger.is_visible(&task("n1", Some("2026-10-17T12:00:00Z")), now));
        assert!(ledger.is_visible(&task("n2", Some("2026-10-18T12:00:00Z")), now));
    }
}
