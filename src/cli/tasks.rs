//! `repdesk tasks` commands

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::board::{Completion, TaskBoard};
use crate::error::Result;
use crate::filter::{self, DueWindow};
use crate::output::{emit_success, HumanOutput};
use crate::reconcile::TaskEntry;
use crate::task::TaskUid;

use super::Context;

#[derive(Serialize)]
struct ListReport<'a> {
    rep: String,
    window: DueWindow,
    pending: usize,
    completed: usize,
    tasks: Vec<TaskEntry<'a>>,
}

#[derive(Serialize)]
struct DoneReport {
    rep: String,
    uid: TaskUid,
    already_complete: bool,
    persisted: bool,
}

#[derive(Serialize)]
struct ClearReport {
    rep: String,
    cleared_at: DateTime<Utc>,
    hidden: usize,
}

fn open_board(ctx: &Context) -> Result<(String, TaskBoard<'_>)> {
    let rep = ctx.require_rep()?;
    let board = TaskBoard::open(
        rep.id.clone(),
        &ctx.storage,
        &ctx.markers,
        ctx.calendar,
        ctx.config.retention(),
    )?;
    Ok((rep.display_name().to_string(), board))
}

pub fn run_list(ctx: &Context, window: Option<&str>) -> Result<()> {
    let window = filter::parse_window(window, ctx.config.tasks.default_window)?;
    let (rep_name, board) = open_board(ctx)?;
    let now = Utc::now();
    let entries = board.list(window, now);

    let completed = entries.iter().filter(|entry| entry.completed).count();
    let pending = entries.len() - completed;

    let mut human = HumanOutput::new(format!("repdesk tasks: {} {window} for {rep_name}", entries.len()));
    human.push_summary("pending", pending.to_string());
    human.push_summary("completed", completed.to_string());
    for entry in &entries {
        human.push_detail(format_entry(ctx, entry));
    }
    if completed > 0 {
        human.push_next_step("repdesk tasks clear");
    } else if let Some(first) = entries.first() {
        human.push_next_step(format!("repdesk tasks done {}", first.task.uid));
    }

    let report = ListReport {
        rep: board.rep_id().to_string(),
        window,
        pending,
        completed,
        tasks: entries,
    };
    emit_success(ctx.output, "tasks list", &report, Some(&human))
}

fn format_entry(ctx: &Context, entry: &TaskEntry<'_>) -> String {
    let task = entry.task;
    let mark = if entry.completed { "[x]" } else { "[ ]" };
    let due = task
        .due_at
        .map(|due| ctx.calendar.date_of(due).to_string())
        .unwrap_or_else(|| "-".to_string());
    let subject = match (&task.subject_name, &task.subject_company) {
        (Some(name), Some(company)) => format!(" ({name}, {company})"),
        (Some(name), None) => format!(" ({name})"),
        (None, Some(company)) => format!(" ({company})"),
        (None, None) => String::new(),
    };
    format!("{mark} {} {due} {}{subject}", task.uid, task.text)
}

pub fn run_done(ctx: &Context, uid: &str) -> Result<()> {
    let uid: TaskUid = uid.parse()?;
    let (_, mut board) = open_board(ctx)?;
    let completion = board.toggle_complete(&uid, Utc::now())?;

    let (already_complete, persisted) = match completion {
        Completion::Marked { persisted } => (false, persisted),
        Completion::AlreadyComplete => (true, true),
    };

    let header = if already_complete {
        format!("repdesk tasks: {uid} was already complete")
    } else {
        format!("repdesk tasks: completed {uid}")
    };
    let mut human = HumanOutput::new(header);
    if !persisted {
        human.push_warning("the completion was not saved; the task will show as pending on the next load");
    }

    let report = DoneReport {
        rep: board.rep_id().to_string(),
        uid,
        already_complete,
        persisted,
    };
    emit_success(ctx.output, "tasks done", &report, Some(&human))
}

pub fn run_clear(ctx: &Context) -> Result<()> {
    let (_, mut board) = open_board(ctx)?;
    let outcome = board.clear_completed(Utc::now())?;

    let mut human = HumanOutput::new(format!("repdesk tasks: cleared {} completed", outcome.hidden));
    human.push_summary("cleared at", outcome.cleared_at.to_rfc3339());

    let report = ClearReport {
        rep: board.rep_id().to_string(),
        cleared_at: outcome.cleared_at,
        hidden: outcome.hidden,
    };
    emit_success(ctx.output, "tasks clear", &report, Some(&human))
}
