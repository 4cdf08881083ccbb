//! Due-window filtering and ordering of reconciled tasks.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::reconcile::TaskEntry;
use crate::window::{self, Calendar};

/// Rolling due-date windows offered by the task list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DueWindow {
    Overdue,
    DueToday,
    #[serde(rename = "due-in-3")]
    DueIn3,
    #[serde(rename = "due-in-7")]
    DueIn7,
    #[serde(rename = "due-in-14")]
    DueIn14,
}

impl DueWindow {
    pub const ALL: [DueWindow; 5] = [
        DueWindow::Overdue,
        DueWindow::DueToday,
        DueWindow::DueIn3,
        DueWindow::DueIn7,
        DueWindow::DueIn14,
    ];

    /// Day offset from today; `overdue` is -1.
    pub fn days(self) -> i64 {
        match self {
            DueWindow::Overdue => -1,
            DueWindow::DueToday => 0,
            DueWindow::DueIn3 => 3,
            DueWindow::DueIn7 => 7,
            DueWindow::DueIn14 => 14,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DueWindow::Overdue => "overdue",
            DueWindow::DueToday => "due-today",
            DueWindow::DueIn3 => "due-in-3",
            DueWindow::DueIn7 => "due-in-7",
            DueWindow::DueIn14 => "due-in-14",
        }
    }

    /// Resolve this window's boundaries for the calendar day of `now`.
    ///
    /// Both bounds are local midnights, so a window keeps its calendar-day
    /// length across a DST change.
    pub fn bounds(self, calendar: &Calendar, now: DateTime<Utc>) -> WindowBounds {
        let today = calendar.date_of(now);
        let span = u64::try_from(self.days() + 1).unwrap_or(0);
        WindowBounds {
            start_of_today: calendar.start_of(today),
            cutoff: calendar.start_of(window::days_after(today, span)),
        }
    }

    /// Whether a task passes this window.
    pub fn admits(self, entry: &TaskEntry<'_>, bounds: &WindowBounds) -> bool {
        if entry.completed {
            return true;
        }
        let due_at = entry.task.due_at;
        match self {
            DueWindow::Overdue => due_at.is_some_and(|due| due < bounds.start_of_today),
            _ => match due_at {
                None => true,
                // Overdue tasks fall under the cutoff as well.
                Some(due) => due < bounds.cutoff,
            },
        }
    }
}

/// Instants a due window compares against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowBounds {
    pub start_of_today: DateTime<Utc>,
    /// Local midnight ending day N of the window.
    pub cutoff: DateTime<Utc>,
}

impl Default for DueWindow {
    fn default() -> Self {
        DueWindow::DueIn7
    }
}

impl FromStr for DueWindow {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let key = s.trim().to_ascii_lowercase();
        DueWindow::ALL
            .into_iter()
            .find(|window| window.as_str() == key)
            .ok_or_else(|| Error::InvalidWindow(s.to_string()))
    }
}

impl fmt::Display for DueWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Keep the entries a window admits, preserving order.
pub fn filter_tasks<'a>(
    entries: Vec<TaskEntry<'a>>,
    window: DueWindow,
    calendar: &Calendar,
    now: DateTime<Utc>,
) -> Vec<TaskEntry<'a>> {
    let bounds = window.bounds(calendar, now);
    entries
        .into_iter()
        .filter(|entry| window.admits(entry, &bounds))
        .collect()
}

/// Pending before completed, then earliest due first, undated last.
/// The sort is stable, so ties keep their source order.
pub fn sort_tasks(entries: &mut [TaskEntry<'_>]) {
    entries.sort_by(|left, right| {
        left.completed
            .cmp(&right.completed)
            .then_with(|| due_rank(left).cmp(&due_rank(right)))
    });
}

fn due_rank(entry: &TaskEntry<'_>) -> DueRank {
    match entry.task.due_at {
        Some(due) => DueRank::Dated(due),
        None => DueRank::Undated,
    }
}

#[derive(Debug, PartialEq, Eq)]
enum DueRank {
    Dated(DateTime<Utc>),
    Undated,
}

impl Ord for DueRank {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (DueRank::Dated(left), DueRank::Dated(right)) => left.cmp(right),
            (DueRank::Dated(_), DueRank::Undated) => Ordering::Less,
            (DueRank::Undated, DueRank::Dated(_)) => Ordering::Greater,
            (DueRank::Undated, DueRank::Undated) => Ordering::Equal,
        }
    }
}

impl PartialOrd for DueRank {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Filter then sort; the usual path for a task list.
pub fn apply<'a>(
    entries: Vec<TaskEntry<'a>>,
    window: DueWindow,
    calendar: &Calendar,
    now: DateTime<Utc>,
) -> Vec<TaskEntry<'a>> {
    let mut entries = filter_tasks(entries, window, calendar, now);
    sort_tasks(&mut entries);
    entries
}

/// Parse an optional window key, falling back to a configured default.
pub fn parse_window(raw: Option<&str>, fallback: DueWindow) -> Result<DueWindow> {
    match raw {
        Some(raw) => raw.parse(),
        None => Ok(fallback),
    }
}
