mod support;

use chrono::{Duration, Utc};
use repdesk::board::{Completion, TaskBoard};
use repdesk::filter::DueWindow;
use repdesk::source::EventSource;
use repdesk::task::{TaskKind, TaskUid};
use repdesk::window::Calendar;
use serde_json::json;

use support::TestStore;

fn open<'a>(store: &'a TestStore, markers: &'a repdesk::storage::ClearMarkers) -> TaskBoard<'a> {
    TaskBoard::open("r1", store.storage(), markers, Calendar::utc(), Duration::days(14))
        .expect("open board")
}

fn seeded() -> TestStore {
    let store = TestStore::init().expect("store");
    store.add_rep("r1", "Ana");
    store.add_rep("r2", "Ben");
    store.add_contact("c1", "r1", "Dana", None);
    store.add_contact("c2", "r2", "Eli", None);
    store
}

fn uids(entries: &[repdesk::reconcile::TaskEntry<'_>]) -> Vec<String> {
    entries.iter().map(|entry| entry.task.uid.to_string()).collect()
}

#[test]
fn yesterday_reminder_completes_clears_and_stays_gone() {
    let store = seeded();
    store.add_note("n1", "c1", &support::day(-1), None);
    store.add_note("n2", "c2", &support::day(-1), None);
    let markers = store.markers();
    let now = Utc::now();

    let mut board = open(&store, &markers);
    assert_eq!(uids(&board.list(DueWindow::DueToday, now)), vec!["note-n1"]);

    let uid = TaskUid::new(TaskKind::Note, "n1");
    assert_eq!(
        board.toggle_complete(&uid, now).expect("complete"),
        Completion::Marked { persisted: true }
    );
    let notes = store.storage().fetch_notes().expect("notes");
    assert!(notes["c1"][0].completed_at.is_some());

    let cleared = board.clear_completed(now + Duration::seconds(1)).expect("clear");
    assert_eq!(cleared.hidden, 1);
    assert!(board.list(DueWindow::DueToday, now).is_empty());

    board.reload().expect("reload");
    assert!(board.list(DueWindow::DueToday, now).is_empty());

    let restarted = open(&store, &markers);
    assert!(restarted.list(DueWindow::DueIn14, now).is_empty());
}

#[test]
fn completed_tasks_expire_after_retention() {
    let store = seeded();
    let old = (Utc::now() - Duration::days(15)).to_rfc3339();
    let recent = (Utc::now() - Duration::days(13)).to_rfc3339();
    store.add_note("old", "c1", &support::day(-20), Some(&old));
    store.add_note("recent", "c1", &support::day(-20), Some(&recent));
    let markers = store.markers();

    let board = open(&store, &markers);
    let visible = board.visible(Utc::now());
    assert_eq!(uids(&visible), vec!["note-recent"]);
    assert!(visible[0].completed);
}

#[test]
fn deal_due_in_two_days_lists_under_due_in_3_only() {
    let store = seeded();
    store.add_deal(json!({
        "id": "d1", "owner_id": "r1", "contact_id": "c1", "stage": "quote_request",
        "value": 2500.0, "next_action": "Chase PO", "next_date": support::day(2)
    }));
    store.add_deal(json!({
        "id": "d2", "owner_id": "r1", "stage": "lost", "next_date": support::day(-3)
    }));
    let markers = store.markers();
    let now = Utc::now();

    let board = open(&store, &markers);
    let due_in_3 = board.list(DueWindow::DueIn3, now);
    assert_eq!(uids(&due_in_3), vec!["deal-d1"]);
    assert_eq!(due_in_3[0].task.text, "Chase PO");
    assert_eq!(due_in_3[0].task.subject_name.as_deref(), Some("Dana"));
    assert!(board.list(DueWindow::Overdue, now).is_empty());
    assert!(board.list(DueWindow::DueToday, now).is_empty());
}

#[test]
fn overdue_tasks_surface_in_every_window() {
    let store = seeded();
    store.add_note("late", "c1", &support::day(-5), None);
    let markers = store.markers();
    let now = Utc::now();

    let board = open(&store, &markers);
    for window in DueWindow::ALL {
        assert_eq!(uids(&board.list(window, now)), vec!["note-late"], "{window}");
    }
}

#[test]
fn malformed_rows_do_not_break_loading() {
    let store = seeded();
    store.add_note("n1", "c1", "whenever", None);
    store.add_note("n2", "c1", &support::day(0), None);
    std::fs::write(
        store.storage().deals_file(),
        "{broken\n{\"id\":\"d1\",\"owner_id\":\"r1\",\"stage\":\"discovery\",\"next_date\":\"soon\"}\n",
    )
    .expect("write deals");
    let markers = store.markers();

    let board = open(&store, &markers);
    assert_eq!(uids(board.visible(Utc::now()).as_slice()), vec!["note-n2"]);
}

#[test]
fn clear_marker_is_per_rep() {
    let store = seeded();
    let done = support::hours_ago(1);
    store.add_note("n1", "c1", &support::day(0), Some(&done));
    store.add_note("n2", "c2", &support::day(0), Some(&done));
    let markers = store.markers();
    let now = Utc::now();

    let mut board = open(&store, &markers);
    board.clear_completed(now).expect("clear");
    assert!(board.visible(now).is_empty());

    let other = TaskBoard::open("r2", store.storage(), &markers, Calendar::utc(), Duration::days(14))
        .expect("open r2");
    assert_eq!(uids(&other.visible(now)), vec!["note-n2"]);
}
