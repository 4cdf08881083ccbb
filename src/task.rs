//! Task unification.
//!
//! Notes with reminders and active deals with a next-date are merged into
//! one task stream per representative. Each task carries a uid derived only
//! from the source record's kind and id, so the same record yields the same
//! uid on every reload.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::records::{Contact, Deal, Note};
use crate::window::Calendar;

const DEFAULT_DEAL_ACTION: &str = "Follow up";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    Note,
    Deal,
}

impl TaskKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskKind::Note => "note",
            TaskKind::Deal => "deal",
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stable task identity: `note-{id}` or `deal-{id}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskUid(String);

impl TaskUid {
    pub fn new(kind: TaskKind, source_id: &str) -> Self {
        TaskUid(format!("{}-{}", kind.as_str(), source_id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Split a uid back into its kind and source id.
    pub fn parts(&self) -> Option<(TaskKind, &str)> {
        let (kind, id) = self.0.split_once('-')?;
        let kind = match kind {
            "note" => TaskKind::Note,
            "deal" => TaskKind::Deal,
            _ => return None,
        };
        if id.is_empty() {
            return None;
        }
        Some((kind, id))
    }
}

impl FromStr for TaskUid {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let uid = TaskUid(s.trim().to_string());
        if uid.parts().is_none() {
            return Err(Error::InvalidArgument(format!(
                "task uid must look like note-<id> or deal-<id>, got '{s}'"
            )));
        }
        Ok(uid)
    }
}

impl fmt::Display for TaskUid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A unit of follow-up work derived from a note or a deal.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Task {
    pub uid: TaskUid,
    pub kind: TaskKind,
    pub source_id: String,
    pub owner_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_completed_at: Option<DateTime<Utc>>,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject_company: Option<String>,
}

impl Task {
    pub fn from_note(note: &Note, contact: &Contact, calendar: &Calendar) -> Option<Self> {
        let due_at = note.reminder_at?.resolve(calendar);
        Some(Self {
            uid: TaskUid::new(TaskKind::Note, &note.id),
            kind: TaskKind::Note,
            source_id: note.id.clone(),
            owner_id: contact.owner_id.clone(),
            due_at: Some(due_at),
            remote_completed_at: note.completed_at.map(|at| at.resolve(calendar)),
            text: note.text.clone(),
            subject_name: non_empty(&contact.name),
            subject_company: contact.company.as_deref().and_then(non_empty),
        })
    }

    pub fn from_deal(deal: &Deal, contact: Option<&Contact>, calendar: &Calendar) -> Option<Self> {
        if deal.stage.is_terminal() {
            return None;
        }
        let due_at = deal.next_date?.resolve(calendar);
        let text = deal
            .next_action
            .as_deref()
            .and_then(non_empty)
            .unwrap_or_else(|| DEFAULT_DEAL_ACTION.to_string());
        let subject_name = contact
            .and_then(|contact| non_empty(&contact.name))
            .or_else(|| deal.title.as_deref().and_then(non_empty));
        Some(Self {
            uid: TaskUid::new(TaskKind::Deal, &deal.id),
            kind: TaskKind::Deal,
            source_id: deal.id.clone(),
            owner_id: deal.owner_id.clone(),
            due_at: Some(due_at),
            remote_completed_at: deal.todo_completed_at.map(|at| at.resolve(calendar)),
            text,
            subject_name,
            subject_company: contact.and_then(|contact| contact.company.as_deref().and_then(non_empty)),
        })
    }
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Build the task stream for one representative.
///
/// A note belongs to the owner of its contact; notes on unknown contacts are
/// skipped. Records repeated by the source collapse to their first copy.
pub fn unify(
    rep_id: &str,
    notes_by_contact: &BTreeMap<String, Vec<Note>>,
    deals: &[Deal],
    contacts: &[Contact],
    calendar: &Calendar,
) -> Vec<Task> {
    let contacts_by_id: HashMap<&str, &Contact> = contacts
        .iter()
        .map(|contact| (contact.id.as_str(), contact))
        .collect();

    let mut seen: HashSet<TaskUid> = HashSet::new();
    let mut tasks = Vec::new();
    let mut push = |task: Task| {
        if seen.insert(task.uid.clone()) {
            tasks.push(task);
        } else {
            tracing::warn!(uid = %task.uid, "duplicate source record ignored");
        }
    };

    for (contact_id, notes) in notes_by_contact {
        let Some(contact) = contacts_by_id.get(contact_id.as_str()) else {
            tracing::debug!(contact = %contact_id, "notes on unknown contact skipped");
            continue;
        };
        if contact.owner_id != rep_id {
            continue;
        }
        for note in notes {
            if let Some(task) = Task::from_note(note, contact, calendar) {
                push(task);
            }
        }
    }

    for deal in deals.iter().filter(|deal| deal.owner_id == rep_id) {
        let contact = deal
            .contact_id
            .as_deref()
            .and_then(|id| contacts_by_id.get(id).copied());
        if let Some(task) = Task::from_deal(deal, contact, calendar) {
            push(task);
        }
    }

    tasks
}
