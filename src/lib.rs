//! repdesk - Rep Activity and KPI Reconciliation
//!
//! This library turns a sales CRM's raw records into one follow-up task list
//! per representative and computes activity metrics over calendar windows.
//!
//! # Core Concepts
//!
//! - **Tasks**: notes with reminders and active deals with a next date,
//!   unified under stable uids
//! - **Completion ledger**: the store's completion timestamps plus optimistic
//!   local overrides, reconciled on every reload
//! - **Clearing**: completed tasks hidden for the session and, through a
//!   durable marker, across restarts
//! - **Windows**: due-date windows for tasks and calendar presets for
//!   metrics, both resolved by one [`window::Calendar`]
//! - **Snapshots**: per-rep KPIs with a green/amber/red status, rolled up
//!   into team reports
//!
//! # Module Organization
//!
//! - `window`: calendar, presets and half-open metrics windows
//! - `records`: source records and lenient date parsing
//! - `source`: event-store and clear-marker interfaces
//! - `task`: task unification and uids
//! - `reconcile`: completion ledger, clearing and expiry
//! - `filter`: due-window filtering and ordering
//! - `board`: one rep's task list over a live source
//! - `metrics`: snapshots, status and team roll-ups
//! - `export`: flat report rows and CSV
//! - `storage`: JSONL event store and clear-marker file
//! - `lock`: store locking and atomic writes
//! - `config`: `.repdesk.toml` loading
//! - `output`: human and JSON rendering
//! - `cli`: command-line interface using clap

pub mod board;
pub mod cli;
pub mod config;
pub mod error;
pub mod export;
pub mod filter;
pub mod lock;
pub mod metrics;
pub mod output;
pub mod reconcile;
pub mod records;
pub mod source;
pub mod storage;
pub mod task;
pub mod window;

pub use error::{Error, Result};
