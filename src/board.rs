//! One representative's task list over a live event source.
//!
//! The board owns the session state: the unified tasks from the last load
//! and the completion ledger. Completing a task updates the ledger first
//! and writes through to the source second; a failed write is logged and
//! left for the next reload to surface.

use chrono::{DateTime, Utc};

use crate::error::{Error, Result};
use crate::filter::{self, DueWindow};
use crate::metrics::TaskTally;
use crate::reconcile::{ClearOutcome, CompletionLedger, TaskEntry};
use crate::source::{ClearMarkerStore, EventSource};
use crate::task::{self, Task, TaskUid};
use crate::window::Calendar;

/// What `toggle_complete` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// Newly marked done; `persisted` tells whether the write landed.
    Marked { persisted: bool },
    /// Already complete, nothing written.
    AlreadyComplete,
}

pub struct TaskBoard<'a> {
    rep_id: String,
    source: &'a dyn EventSource,
    markers: &'a dyn ClearMarkerStore,
    calendar: Calendar,
    ledger: CompletionLedger,
    tasks: Vec<Task>,
}

impl<'a> TaskBoard<'a> {
    /// Read the durable clear marker once, then load tasks.
    pub fn open(
        rep_id: impl Into<String>,
        source: &'a dyn EventSource,
        markers: &'a dyn ClearMarkerStore,
        calendar: Calendar,
        retention: chrono::Duration,
    ) -> Result<Self> {
        let rep_id = rep_id.into();
        let last_cleared = markers.last_cleared(&rep_id)?;
        let mut board = Self {
            rep_id,
            source,
            markers,
            calendar,
            ledger: CompletionLedger::with_retention(last_cleared, retention),
            tasks: Vec::new(),
        };
        board.reload()?;
        Ok(board)
    }

    pub fn rep_id(&self) -> &str {
        &self.rep_id
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn ledger(&self) -> &CompletionLedger {
        &self.ledger
    }

    /// Fetch fresh records and let the store's completion state take over.
    pub fn reload(&mut self) -> Result<()> {
        let notes = self.source.fetch_notes()?;
        let deals = self.source.fetch_deals()?;
        let contacts = self.source.fetch_contacts()?;
        self.tasks = task::unify(&self.rep_id, &notes, &deals, &contacts, &self.calendar);

        for uid in self.ledger.reconcile(&self.tasks) {
            tracing::warn!(rep = %self.rep_id, %uid, "completion was not persisted; task is pending again");
        }
        tracing::debug!(rep = %self.rep_id, tasks = self.tasks.len(), "tasks loaded");
        Ok(())
    }

    /// Mark a task done and write it through to the source.
    pub fn toggle_complete(&mut self, uid: &TaskUid, now: DateTime<Utc>) -> Result<Completion> {
        let task = self
            .tasks
            .iter()
            .find(|task| &task.uid == uid)
            .ok_or_else(|| Error::TaskNotFound(uid.to_string()))?;

        let Some(request) = self.ledger.toggle_complete(task, now) else {
            return Ok(Completion::AlreadyComplete);
        };

        let persisted = match self
            .source
            .mark_task_complete(request.kind, &request.source_id, request.at)
        {
            Ok(()) => {
                tracing::info!(rep = %self.rep_id, uid = %request.uid, "task completed");
                true
            }
            Err(err) => {
                tracing::warn!(rep = %self.rep_id, uid = %request.uid, error = %err, "completion write failed");
                false
            }
        };
        Ok(Completion::Marked { persisted })
    }

    /// Hide completed tasks now and across restarts.
    ///
    /// The marker is saved before the reload so a crash in between still
    /// leaves the tasks hidden on the next start.
    ///
    /// The reload also empties the ledger's session-hidden set, so once this
    /// returns only the `last_cleared_at` threshold hides anything. A task
    /// whose completion write never landed has no remote timestamp under
    /// that threshold and shows as pending again.
    pub fn clear_completed(&mut self, now: DateTime<Utc>) -> Result<ClearOutcome> {
        let outcome = self.ledger.clear_completed(&self.tasks, now);
        self.markers.set_last_cleared(&self.rep_id, outcome.cleared_at)?;
        tracing::info!(rep = %self.rep_id, hidden = outcome.hidden, "completed tasks cleared");
        self.reload()?;
        Ok(outcome)
    }

    pub fn visible(&self, now: DateTime<Utc>) -> Vec<TaskEntry<'_>> {
        self.ledger.visible(&self.tasks, now)
    }

    /// Visible tasks in `window`, pending first and earliest due first.
    pub fn list(&self, window: DueWindow, now: DateTime<Utc>) -> Vec<TaskEntry<'_>> {
        filter::apply(self.visible(now), window, &self.calendar, now)
    }

    pub fn tally(&self, now: DateTime<Utc>) -> TaskTally {
        TaskTally::from_entries(&self.visible(now))
    }
}
