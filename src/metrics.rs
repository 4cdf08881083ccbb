//! Per-representative KPI snapshots and team roll-ups.
//!
//! Every figure is a pure function of the raw records, the window and the
//! calendar. Records with unset or malformed dates never fall inside a
//! window, so one bad row lowers a count rather than failing the report.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::{StageWeights, TargetsConfig};
use crate::error::{Error, Result};
use crate::reconcile::TaskEntry;
use crate::records::{Call, CallOutcome, Contact, Deal, DealStage, Rep, When};
use crate::source::SourceData;
use crate::window::{Calendar, MetricsWindow};

/// Inputs shared by every snapshot in one computation.
#[derive(Debug, Clone, Copy)]
pub struct MetricsContext<'a> {
    pub calendar: &'a Calendar,
    pub now: DateTime<Utc>,
    pub weights: &'a StageWeights,
    pub targets: &'a TargetsConfig,
}

/// Visible tasks of one representative, reduced to what compliance needs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TaskTally {
    pub total: usize,
    pub completed: usize,
}

impl TaskTally {
    pub fn from_entries(entries: &[TaskEntry<'_>]) -> Self {
        Self {
            total: entries.len(),
            completed: entries.iter().filter(|entry| entry.completed).count(),
        }
    }
}

/// Raw records to aggregate. Records owned by other reps are ignored.
#[derive(Debug, Clone, Copy)]
pub struct RepActivity<'a> {
    pub calls: &'a [Call],
    pub deals: &'a [Deal],
    pub contacts: &'a [Contact],
    pub tasks: TaskTally,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RepStatus {
    Red,
    Amber,
    Green,
}

impl RepStatus {
    pub fn demote(self) -> Self {
        match self {
            RepStatus::Green => RepStatus::Amber,
            RepStatus::Amber | RepStatus::Red => RepStatus::Red,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            RepStatus::Green => "green",
            RepStatus::Amber => "amber",
            RepStatus::Red => "red",
        }
    }
}

/// Green when every enforced target is met; each miss demotes one tier.
pub fn derive_status(
    targets: &TargetsConfig,
    calls_today: usize,
    calls_this_week: usize,
    compliance: f64,
) -> RepStatus {
    let misses = [
        targets.daily_calls.is_some_and(|target| calls_today < target as usize),
        targets.weekly_calls.is_some_and(|target| calls_this_week < target as usize),
        targets.min_compliance.is_some_and(|min| compliance < min),
    ];
    misses
        .iter()
        .filter(|missed| **missed)
        .fold(RepStatus::Green, |status, _| status.demote())
}

/// One representative's figures for one window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RepSnapshot {
    pub rep_id: String,
    pub rep_name: String,
    pub window: String,
    pub calls_in_range: usize,
    /// Calendar today, whatever the window.
    pub calls_today: usize,
    /// Calendar week, whatever the window.
    pub calls_this_week: usize,
    pub meetings_set: usize,
    pub new_contacts: usize,
    pub quotes_requested: usize,
    pub quotes_sent: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avg_turnaround_hours: Option<f64>,
    pub crm_compliance: f64,
    pub opportunity_progression: f64,
    pub weighted_pipeline: f64,
    pub pipeline_clean: bool,
    pub status: RepStatus,
}

pub fn compute_metrics(
    rep: &Rep,
    activity: &RepActivity<'_>,
    window: &MetricsWindow,
    ctx: &MetricsContext<'_>,
) -> RepSnapshot {
    let calendar = ctx.calendar;
    let resolve = |when: Option<When>| when.map(|when| when.resolve(calendar));

    let start_of_today = calendar.start_of_today(ctx.now);
    let start_of_week = calendar.start_of_week(ctx.now);

    let rep_calls: Vec<(Option<DateTime<Utc>>, CallOutcome)> = activity
        .calls
        .iter()
        .filter(|call| call.owner_id == rep.id)
        .map(|call| (resolve(call.called_at), call.outcome))
        .collect();
    let calls_in_range = rep_calls
        .iter()
        .filter(|(at, _)| window.contains_opt(*at))
        .count();
    let calls_today = rep_calls
        .iter()
        .filter(|(at, _)| at.is_some_and(|at| at >= start_of_today))
        .count();
    let calls_this_week = rep_calls
        .iter()
        .filter(|(at, _)| at.is_some_and(|at| at >= start_of_week))
        .count();
    let meetings_set = rep_calls
        .iter()
        .filter(|(at, outcome)| *outcome == CallOutcome::Meeting && window.contains_opt(*at))
        .count();

    let new_contacts = activity
        .contacts
        .iter()
        .filter(|contact| contact.owner_id == rep.id)
        .filter(|contact| window.contains_opt(resolve(contact.created_at)))
        .count();

    let rep_deals: Vec<&Deal> = activity
        .deals
        .iter()
        .filter(|deal| deal.owner_id == rep.id)
        .collect();

    let quotes_requested = rep_deals
        .iter()
        .filter(|deal| window.contains_opt(resolve(deal.quote_requested_at)))
        .count();
    let turnarounds: Vec<f64> = rep_deals
        .iter()
        .filter_map(|deal| {
            let requested = resolve(deal.quote_requested_at)?;
            let sent = resolve(deal.quote_sent_at)?;
            if !window.contains(sent) {
                return None;
            }
            Some((sent - requested).num_seconds() as f64 / 3600.0)
        })
        .collect();
    let quotes_sent = turnarounds.len();
    let avg_turnaround_hours = if turnarounds.is_empty() {
        None
    } else {
        Some(round1(turnarounds.iter().sum::<f64>() / turnarounds.len() as f64))
    };

    let crm_compliance = compliance(activity.tasks, calls_in_range);
    let opportunity_progression = progression(&rep_deals);
    let weighted_pipeline = weighted_pipeline(rep_deals.iter().copied(), ctx.weights);
    let pipeline_clean = !rep_deals.iter().any(|deal| {
        deal.stage.is_active()
            && deal.todo_completed_at.is_none()
            && resolve(deal.next_date).is_some_and(|due| due < start_of_today)
    });
    let status = derive_status(ctx.targets, calls_today, calls_this_week, crm_compliance);

    RepSnapshot {
        rep_id: rep.id.clone(),
        rep_name: rep.display_name().to_string(),
        window: window.label.clone(),
        calls_in_range,
        calls_today,
        calls_this_week,
        meetings_set,
        new_contacts,
        quotes_requested,
        quotes_sent,
        avg_turnaround_hours,
        crm_compliance,
        opportunity_progression,
        weighted_pipeline,
        pipeline_clean,
        status,
    }
}

/// Share of visible tasks completed. With no tasks, a rep who logged calls
/// is fully compliant and one who did nothing is not.
fn compliance(tasks: TaskTally, calls_in_range: usize) -> f64 {
    if tasks.total == 0 {
        return if calls_in_range > 0 { 100.0 } else { 0.0 };
    }
    round1(tasks.completed as f64 * 100.0 / tasks.total as f64)
}

/// Share of non-voided deals that reached quoting or beyond.
fn progression(deals: &[&Deal]) -> f64 {
    let counted: Vec<&&Deal> = deals
        .iter()
        .filter(|deal| deal.stage != DealStage::Voided)
        .collect();
    if counted.is_empty() {
        return 0.0;
    }
    let progressed = counted.iter().filter(|deal| deal.stage.has_progressed()).count();
    round1(progressed as f64 * 100.0 / counted.len() as f64)
}

/// Σ value × stage weight over active deals.
pub fn weighted_pipeline<'a>(deals: impl IntoIterator<Item = &'a Deal>, weights: &StageWeights) -> f64 {
    deals
        .into_iter()
        .filter(|deal| deal.stage.is_active())
        .map(|deal| deal.value * weights.weight(deal.stage))
        .sum()
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Which representatives a team report covers.
#[derive(Debug, Clone, Default)]
pub struct RepSelection {
    patterns: Vec<glob::Pattern>,
}

impl RepSelection {
    pub fn all() -> Self {
        Self::default()
    }

    /// Glob patterns over rep ids; an empty list selects everyone.
    pub fn parse<S: AsRef<str>>(patterns: &[S]) -> Result<Self> {
        let patterns = patterns
            .iter()
            .map(|raw| {
                let raw = raw.as_ref().trim();
                if raw.is_empty() {
                    return Err(Error::InvalidArgument("rep pattern cannot be empty".to_string()));
                }
                glob::Pattern::new(raw).map_err(|err| {
                    Error::InvalidArgument(format!("invalid rep pattern '{raw}': {err}"))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { patterns })
    }

    pub fn matches(&self, rep_id: &str) -> bool {
        self.patterns.is_empty() || self.patterns.iter().any(|pattern| pattern.matches(rep_id))
    }
}

/// Plain sums over the snapshots of a report.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TeamTotals {
    pub reps: usize,
    pub calls_in_range: usize,
    pub calls_today: usize,
    pub meetings_set: usize,
    pub new_contacts: usize,
    pub quotes_sent: usize,
    pub weighted_pipeline: f64,
}

impl TeamTotals {
    pub fn add(&mut self, snapshot: &RepSnapshot) {
        self.reps += 1;
        self.calls_in_range += snapshot.calls_in_range;
        self.calls_today += snapshot.calls_today;
        self.meetings_set += snapshot.meetings_set;
        self.new_contacts += snapshot.new_contacts;
        self.quotes_sent += snapshot.quotes_sent;
        self.weighted_pipeline += snapshot.weighted_pipeline;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TeamReport {
    pub window: MetricsWindow,
    pub generated_at: DateTime<Utc>,
    pub snapshots: Vec<RepSnapshot>,
    pub totals: TeamTotals,
}

/// Snapshot every selected rep. `tallies` holds each rep's visible-task
/// tally; reps without one count as having no tasks.
pub fn compute_team(
    data: &SourceData,
    selection: &RepSelection,
    tallies: &HashMap<String, TaskTally>,
    window: &MetricsWindow,
    ctx: &MetricsContext<'_>,
) -> TeamReport {
    let mut snapshots = Vec::new();
    let mut totals = TeamTotals::default();
    for rep in data.reps.iter().filter(|rep| selection.matches(&rep.id)) {
        let activity = RepActivity {
            calls: &data.calls,
            deals: &data.deals,
            contacts: &data.contacts,
            tasks: tallies.get(&rep.id).copied().unwrap_or_default(),
        };
        let snapshot = compute_metrics(rep, &activity, window, ctx);
        totals.add(&snapshot);
        snapshots.push(snapshot);
    }

    TeamReport {
        window: window.clone(),
        generated_at: ctx.now,
        snapshots,
        totals,
    }
}
