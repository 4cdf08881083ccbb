//! repdesk - rep activity and KPI reconciliation CLI
//!
//! Follow-up tasks, completion tracking and activity metrics for sales
//! representatives over a local CRM data directory.

use clap::Parser;
use repdesk::cli::Cli;
use repdesk::output::{emit_error, infer_command_name_from_args};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn main() {
    let command = infer_command_name_from_args();
    let cli = Cli::parse();

    // Tracing is opt-in via RUST_LOG or --verbose.
    // Ignore invalid or huge filters rather than failing startup.
    let filter = if cli.verbose {
        EnvFilter::new("repdesk=debug")
    } else {
        std::env::var("RUST_LOG")
            .ok()
            .and_then(|raw| {
                let raw = raw.trim();
                if raw.is_empty() || raw.len() > 4096 {
                    return None;
                }
                EnvFilter::try_new(raw).ok()
            })
            .unwrap_or_else(|| EnvFilter::new("off"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let json = cli.json;
    if let Err(err) = cli.run() {
        let _ = emit_error(&command, &err, json);
        std::process::exit(err.exit_code());
    }
}
