//! repdesk init command implementation
//!
//! Creates the data directory and a default `.repdesk.toml`.

use std::path::{Path, PathBuf};

use crate::config::{Config, CONFIG_FILE};
use crate::error::{Error, Result};
use crate::output::{emit_success, HumanOutput, OutputOptions};
use crate::storage::{Storage, DATA_DIR};

#[derive(serde::Serialize)]
struct InitReport {
    root: PathBuf,
    created: InitCreated,
}

#[derive(serde::Serialize)]
struct InitCreated {
    config: bool,
    data_dir: bool,
}

pub fn run(root: Option<PathBuf>, output: OutputOptions) -> Result<()> {
    let root = super::resolve_root(root)?;
    if !root.is_dir() {
        return Err(Error::InvalidArgument(format!(
            "root is not a directory: {}",
            root.display()
        )));
    }

    let storage = Storage::new(&root);
    let created_data_dir = !storage.is_initialized();
    storage.init()?;
    let created_config = ensure_config(&root)?;

    let report = InitReport {
        root: root.clone(),
        created: InitCreated {
            config: created_config,
            data_dir: created_data_dir,
        },
    };

    let mut created_items = Vec::new();
    if created_config {
        created_items.push(CONFIG_FILE.to_string());
    }
    if created_data_dir {
        created_items.push(format!("{DATA_DIR}/"));
    }

    let header = if created_items.is_empty() {
        "repdesk init: nothing to do".to_string()
    } else {
        "repdesk init: initialized data directory".to_string()
    };

    let mut human = HumanOutput::new(header);
    human.push_summary("root", root.display().to_string());
    human.push_summary(
        "created",
        if created_items.is_empty() {
            "none".to_string()
        } else {
            created_items.join(", ")
        },
    );
    human.push_next_step(format!("add representatives to {DATA_DIR}/reps.jsonl"));
    human.push_next_step("repdesk --rep <id> tasks list");

    emit_success(output, "init", &report, Some(&human))
}

fn ensure_config(root: &Path) -> Result<bool> {
    let config_path = root.join(CONFIG_FILE);
    if config_path.exists() {
        if !config_path.is_file() {
            return Err(Error::OperationFailed(format!(
                "{CONFIG_FILE} exists but is not a file: {}",
                config_path.display()
            )));
        }
        return Ok(false);
    }

    Config::default().save(&config_path)?;
    Ok(true)
}
