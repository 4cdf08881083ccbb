#![cfg(unix)]
//! Runs in its own test binary: `TZ` is process-wide and the local calendar
//! reads it.

use chrono::{DateTime, Utc};
use repdesk::filter::{self, DueWindow};
use repdesk::reconcile::TaskEntry;
use repdesk::task::{Task, TaskKind, TaskUid};
use repdesk::window::Calendar;

// Central European time; clocks go back at 03:00 on 2026-10-25.
const BERLIN_RULE: &str = "CET-1CEST,M3.5.0,M10.5.0/3";

fn at(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw).expect("timestamp").with_timezone(&Utc)
}

fn deal(id: &str, due: &str) -> Task {
    Task {
        uid: TaskUid::new(TaskKind::Deal, id),
        kind: TaskKind::Deal,
        source_id: id.to_string(),
        owner_id: "r1".to_string(),
        due_at: Some(at(due)),
        remote_completed_at: None,
        text: "Follow up".to_string(),
        subject_name: None,
        subject_company: None,
    }
}

#[test]
fn forward_window_counts_local_days_across_dst_change() {
    std::env::set_var("TZ", BERLIN_RULE);
    let calendar = Calendar::local();
    // 10:00 CEST on Tuesday 2026-10-20.
    let now = at("2026-10-20T08:00:00Z");

    let bounds = DueWindow::DueIn7.bounds(&calendar, now);
    assert_eq!(bounds.start_of_today, at("2026-10-19T22:00:00Z"));
    // Midnight CET starting 2026-10-28, one hour later in UTC than today's.
    assert_eq!(bounds.cutoff, at("2026-10-27T23:00:00Z"));

    // 23:30 CET on local day 7, and 00:00 CET on day 8.
    let late_day_seven = deal("d7", "2026-10-27T22:30:00Z");
    let day_eight = deal("d8", "2026-10-27T23:00:00Z");
    let entries = vec![
        TaskEntry {
            task: &late_day_seven,
            completed: false,
        },
        TaskEntry {
            task: &day_eight,
            completed: false,
        },
    ];

    let kept = filter::filter_tasks(entries, DueWindow::DueIn7, &calendar, now);
    let uids: Vec<&str> = kept.iter().map(|entry| entry.task.uid.as_str()).collect();
    assert_eq!(uids, vec!["deal-d7"]);
}
