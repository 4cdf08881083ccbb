//! Flat report rows and their CSV rendering.

use serde::Serialize;

use crate::metrics::{RepSnapshot, TeamReport};

pub const CSV_HEADERS: [&str; 9] = [
    "Rep",
    "Calls",
    "Meetings",
    "New Contacts",
    "CRM Compliance %",
    "Avg Quote Turnaround (h)",
    "Opportunity Progression %",
    "Pipeline Clean",
    "Status",
];

/// One snapshot as display-ready columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportRow {
    pub rep: String,
    pub calls: String,
    pub meetings: String,
    pub new_contacts: String,
    pub compliance: String,
    pub turnaround_hours: String,
    pub progression: String,
    pub pipeline_clean: String,
    pub status: String,
}

impl ReportRow {
    pub fn from_snapshot(snapshot: &RepSnapshot) -> Self {
        Self {
            rep: snapshot.rep_name.clone(),
            calls: snapshot.calls_in_range.to_string(),
            meetings: snapshot.meetings_set.to_string(),
            new_contacts: snapshot.new_contacts.to_string(),
            compliance: format!("{:.1}", snapshot.crm_compliance),
            turnaround_hours: snapshot
                .avg_turnaround_hours
                .map(|hours| format!("{hours:.1}"))
                .unwrap_or_default(),
            progression: format!("{:.1}", snapshot.opportunity_progression),
            pipeline_clean: if snapshot.pipeline_clean { "yes" } else { "no" }.to_string(),
            status: snapshot.status.label().to_string(),
        }
    }

    fn cells(&self) -> [&str; 9] {
        [
            &self.rep,
            &self.calls,
            &self.meetings,
            &self.new_contacts,
            &self.compliance,
            &self.turnaround_hours,
            &self.progression,
            &self.pipeline_clean,
            &self.status,
        ]
    }
}

pub fn rows(report: &TeamReport) -> Vec<ReportRow> {
    report.snapshots.iter().map(ReportRow::from_snapshot).collect()
}

/// Header line plus one line per row, CRLF-terminated.
pub fn to_csv(rows: &[ReportRow]) -> String {
    let mut out = String::new();
    push_record(&mut out, CSV_HEADERS);
    for row in rows {
        push_record(&mut out, row.cells());
    }
    out
}

fn push_record(out: &mut String, cells: [&str; 9]) {
    for (index, cell) in cells.iter().enumerate() {
        if index > 0 {
            out.push(',');
        }
        out.push_str(&quote(cell));
    }
    out.push_str("\r\n");
}

fn quote(cell: &str) -> String {
    if cell.contains([',', '"', '\r', '\n']) {
        format!("\"{}\"", cell.replace('"', "\"\""))
    } else {
        cell.to_string()
    }
}
