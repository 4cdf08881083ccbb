//! `repdesk metrics` and `repdesk report`

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::{Error, Result};
use crate::export::{self, ReportRow};
use crate::metrics::{
    compute_metrics, compute_team, MetricsContext, RepActivity, RepSelection, RepSnapshot,
    TaskTally, TeamTotals,
};
use crate::output::{emit_success, HumanOutput};
use crate::reconcile::CompletionLedger;
use crate::records::Rep;
use crate::source::{ClearMarkerStore, SourceData};
use crate::task;
use crate::window::{MetricsWindow, Preset};

use super::{Context, RangeArgs};

#[derive(Serialize)]
struct MetricsReport<'a> {
    range: &'a MetricsWindow,
    #[serde(flatten)]
    snapshot: &'a RepSnapshot,
}

#[derive(Serialize)]
struct TeamOutput<'a> {
    window: &'a MetricsWindow,
    generated_at: DateTime<Utc>,
    reps: Vec<ReportRow>,
    snapshots: &'a [RepSnapshot],
    totals: &'a TeamTotals,
}

fn resolve_window(ctx: &Context, range: &RangeArgs, now: DateTime<Utc>) -> Result<MetricsWindow> {
    let preset = Preset::from_args(
        range.preset.as_deref(),
        range.from.as_deref(),
        range.to.as_deref(),
    )?;
    Ok(ctx.calendar.resolve(&preset, now))
}

/// Visible-task tally for one rep, computed the way the task list sees it.
fn tally_for(ctx: &Context, data: &SourceData, rep: &Rep, now: DateTime<Utc>) -> Result<TaskTally> {
    let tasks = task::unify(&rep.id, &data.notes, &data.deals, &data.contacts, &ctx.calendar);
    let ledger = CompletionLedger::with_retention(
        ctx.markers.last_cleared(&rep.id)?,
        ctx.config.retention(),
    );
    Ok(TaskTally::from_entries(&ledger.visible(&tasks, now)))
}

pub fn run_metrics(ctx: &Context, range: &RangeArgs) -> Result<()> {
    let now = Utc::now();
    let window = resolve_window(ctx, range, now)?;
    let rep = ctx.require_rep()?;
    let data = SourceData::load(&ctx.storage)?;

    let activity = RepActivity {
        calls: &data.calls,
        deals: &data.deals,
        contacts: &data.contacts,
        tasks: tally_for(ctx, &data, &rep, now)?,
    };
    let metrics_ctx = MetricsContext {
        calendar: &ctx.calendar,
        now,
        weights: &ctx.config.pipeline.weights,
        targets: &ctx.config.targets,
    };
    let snapshot = compute_metrics(&rep, &activity, &window, &metrics_ctx);

    let mut human = HumanOutput::new(format!(
        "repdesk metrics: {} ({})",
        snapshot.rep_name, window.label
    ));
    human.push_summary("status", snapshot.status.label());
    human.push_summary("calls in range", snapshot.calls_in_range.to_string());
    human.push_summary("calls today", snapshot.calls_today.to_string());
    human.push_summary("calls this week", snapshot.calls_this_week.to_string());
    human.push_summary("meetings set", snapshot.meetings_set.to_string());
    human.push_summary("new contacts", snapshot.new_contacts.to_string());
    human.push_summary("quotes requested", snapshot.quotes_requested.to_string());
    human.push_summary("quotes sent", snapshot.quotes_sent.to_string());
    human.push_summary(
        "avg quote turnaround",
        snapshot
            .avg_turnaround_hours
            .map(|hours| format!("{hours:.1}h"))
            .unwrap_or_else(|| "-".to_string()),
    );
    human.push_summary("crm compliance", format!("{:.1}%", snapshot.crm_compliance));
    human.push_summary(
        "opportunity progression",
        format!("{:.1}%", snapshot.opportunity_progression),
    );
    human.push_summary("weighted pipeline", format!("{:.2}", snapshot.weighted_pipeline));
    human.push_summary("pipeline clean", if snapshot.pipeline_clean { "yes" } else { "no" });
    if !snapshot.pipeline_clean {
        human.push_next_step("repdesk tasks list --window overdue");
    }

    let report = MetricsReport {
        range: &window,
        snapshot: &snapshot,
    };
    emit_success(ctx.output, "metrics", &report, Some(&human))
}

pub fn run_report(ctx: &Context, range: &RangeArgs, reps: &[String], csv: bool) -> Result<()> {
    let now = Utc::now();
    let window = resolve_window(ctx, range, now)?;
    let selection = RepSelection::parse(reps)?;
    let data = SourceData::load(&ctx.storage)?;

    let mut tallies = HashMap::new();
    for rep in data.reps.iter().filter(|rep| selection.matches(&rep.id)) {
        tallies.insert(rep.id.clone(), tally_for(ctx, &data, rep, now)?);
    }
    if tallies.is_empty() && !reps.is_empty() {
        return Err(Error::RepNotFound(reps.join(", ")));
    }

    let metrics_ctx = MetricsContext {
        calendar: &ctx.calendar,
        now,
        weights: &ctx.config.pipeline.weights,
        targets: &ctx.config.targets,
    };
    let team = compute_team(&data, &selection, &tallies, &window, &metrics_ctx);
    let rows = export::rows(&team);

    if csv && !ctx.output.json {
        print!("{}", export::to_csv(&rows));
        return Ok(());
    }

    let mut human = HumanOutput::new(format!(
        "repdesk report: {} reps ({})",
        team.totals.reps, window.label
    ));
    human.push_summary("calls", team.totals.calls_in_range.to_string());
    human.push_summary("meetings", team.totals.meetings_set.to_string());
    human.push_summary("new contacts", team.totals.new_contacts.to_string());
    human.push_summary("quotes sent", team.totals.quotes_sent.to_string());
    human.push_summary("weighted pipeline", format!("{:.2}", team.totals.weighted_pipeline));
    for row in &rows {
        human.push_detail(format!(
            "{}: {} calls, {} meetings, {}% compliance, pipeline clean {}, {}",
            row.rep, row.calls, row.meetings, row.compliance, row.pipeline_clean, row.status
        ));
    }

    let output = TeamOutput {
        window: &team.window,
        generated_at: team.generated_at,
        reps: rows,
        snapshots: &team.snapshots,
        totals: &team.totals,
    };
    emit_success(ctx.output, "report", &output, Some(&human))
}
