//! Command-line interface for repdesk
//!
//! This module defines the CLI structure using clap derive macros.
//! Each command group lives in its own submodule.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::output::OutputOptions;
use crate::records::Rep;
use crate::source::EventSource;
use crate::storage::{ClearMarkers, Storage};
use crate::window::Calendar;

mod init;
mod metrics;
mod tasks;

/// repdesk - rep activity and KPI reconciliation
///
/// Follow-up tasks, completion tracking and activity metrics for sales
/// representatives, read from a local CRM data directory.
#[derive(Parser, Debug)]
#[command(name = "repdesk")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Directory holding `.repdesk/` and `.repdesk.toml` (defaults to current directory)
    #[arg(long, global = true, env = "REPDESK_ROOT")]
    pub root: Option<PathBuf>,

    /// Where "last cleared" markers are kept (defaults to the user state directory)
    #[arg(long, global = true, env = "REPDESK_STATE_DIR")]
    pub state_dir: Option<PathBuf>,

    /// Representative to act as
    #[arg(long, global = true, env = "REPDESK_REP")]
    pub rep: Option<String>,

    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the data directory and a default config
    Init,

    /// Follow-up tasks for one representative
    #[command(subcommand)]
    Tasks(TasksCommands),

    /// Activity snapshot for one representative
    Metrics {
        #[command(flatten)]
        range: RangeArgs,
    },

    /// Snapshots for a team, with totals
    Report {
        #[command(flatten)]
        range: RangeArgs,

        /// Glob over rep ids (repeatable; default: all reps)
        #[arg(long = "reps", value_name = "GLOB")]
        reps: Vec<String>,

        /// Print CSV rows instead of a summary
        #[arg(long)]
        csv: bool,
    },
}

/// Task subcommands
#[derive(Subcommand, Debug)]
pub enum TasksCommands {
    /// Visible tasks in a due window
    List {
        /// overdue, due-today, due-in-3, due-in-7 or due-in-14
        #[arg(long, short)]
        window: Option<String>,
    },

    /// Mark a task as done
    Done {
        /// Task uid, e.g. note-42 or deal-7
        uid: String,
    },

    /// Hide completed tasks
    Clear,
}

/// Date range selection shared by `metrics` and `report`
#[derive(clap::Args, Debug, Clone, Default)]
pub struct RangeArgs {
    /// today, yesterday, this-week, last-N-days, this-month, last-month, this-quarter
    #[arg(long)]
    pub preset: Option<String>,

    /// First day of a custom range (YYYY-MM-DD, inclusive)
    #[arg(long, value_name = "DATE")]
    pub from: Option<String>,

    /// Last day of a custom range (YYYY-MM-DD, inclusive)
    #[arg(long, value_name = "DATE")]
    pub to: Option<String>,
}

/// Resolved global options shared by every data command.
pub(crate) struct Context {
    pub storage: Storage,
    pub markers: ClearMarkers,
    pub config: Config,
    pub calendar: Calendar,
    pub rep: Option<String>,
    pub output: OutputOptions,
}

impl Context {
    fn open(
        root: Option<PathBuf>,
        state_dir: Option<PathBuf>,
        rep: Option<String>,
        output: OutputOptions,
    ) -> Result<Self> {
        let root = resolve_root(root)?;
        let storage = Storage::open(&root)?;
        let config = Config::load_from_root(&root);
        let calendar = config.calendar()?;
        let markers = match state_dir {
            Some(dir) => ClearMarkers::in_dir(dir),
            None => ClearMarkers::default_location()?,
        };
        tracing::debug!(
            root = %root.display(),
            markers = %markers.path().display(),
            "context resolved"
        );
        Ok(Self {
            storage,
            markers,
            config,
            calendar,
            rep,
            output,
        })
    }

    /// The `--rep` representative, which must exist in the store.
    pub fn require_rep(&self) -> Result<Rep> {
        let rep_id = self
            .rep
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| {
                Error::InvalidArgument("--rep (or REPDESK_REP) is required".to_string())
            })?;
        self.storage
            .fetch_reps()?
            .into_iter()
            .find(|rep| rep.id == rep_id)
            .ok_or_else(|| Error::RepNotFound(rep_id.to_string()))
    }
}

pub(crate) fn resolve_root(root: Option<PathBuf>) -> Result<PathBuf> {
    match root {
        Some(path) => Ok(path),
        None => Ok(std::env::current_dir()?),
    }
}

impl Cli {
    /// Execute the CLI command
    pub fn run(self) -> Result<()> {
        let Cli {
            root,
            state_dir,
            rep,
            json,
            quiet,
            command,
            ..
        } = self;
        let output = OutputOptions { json, quiet };
        let open = || Context::open(root.clone(), state_dir, rep, output);

        match command {
            Commands::Init => init::run(root.clone(), output),
            Commands::Tasks(cmd) => {
                let ctx = open()?;
                match cmd {
                    TasksCommands::List { window } => tasks::run_list(&ctx, window.as_deref()),
                    TasksCommands::Done { uid } => tasks::run_done(&ctx, &uid),
                    TasksCommands::Clear => tasks::run_clear(&ctx),
                }
            }
            Commands::Metrics { range } => metrics::run_metrics(&open()?, &range),
            Commands::Report { range, reps, csv } => {
                metrics::run_report(&open()?, &range, &reps, csv)
            }
        }
    }
}
