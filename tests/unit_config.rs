use std::fs;

use chrono::{FixedOffset, Weekday};
use repdesk::config::Config;
use repdesk::filter::DueWindow;
use repdesk::window::Zone;

#[test]
fn config_defaults_when_missing() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = Config::load_from_root(dir.path());

    assert_eq!(config.calendar.utc_offset, "local");
    assert_eq!(config.calendar.week_start, "monday");
    assert_eq!(config.tasks.retention_days, 14);
    assert_eq!(config.tasks.default_window, DueWindow::DueIn7);
    assert_eq!(config.pipeline.weights.discovery, 0.10);
    assert_eq!(config.pipeline.weights.quote_request, 0.25);
    assert_eq!(config.pipeline.weights.quote_sent, 0.75);
    assert!(config.targets.daily_calls.is_none());
}

#[test]
fn config_overrides_from_toml() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let config_path = dir.path().join(".repdesk.toml");
    let toml = r#"
[calendar]
utc_offset = "+02:00"
week_start = "sunday"

[tasks]
retention_days = 30
default_window = "due-in-14"

[pipeline.weights]
discovery = 0.2

[targets]
weekly_calls = 60
"#;

    fs::write(&config_path, toml)?;

    let config = Config::load_from_root(dir.path());
    let calendar = config.calendar()?;

    assert_eq!(
        calendar.zone(),
        Zone::Fixed(FixedOffset::east_opt(2 * 3600).expect("offset"))
    );
    assert_eq!(calendar.week_start(), Weekday::Sun);
    assert_eq!(config.tasks.retention_days, 30);
    assert_eq!(config.tasks.default_window, DueWindow::DueIn14);
    assert_eq!(config.pipeline.weights.discovery, 0.2);
    assert_eq!(config.pipeline.weights.quote_sent, 0.75);
    assert_eq!(config.targets.weekly_calls, Some(60));

    Ok(())
}

#[test]
fn invalid_config_falls_back_to_defaults() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    fs::write(
        dir.path().join(".repdesk.toml"),
        "[pipeline.weights]\nquote_sent = 7.5\n",
    )?;

    assert!(Config::load(&dir.path().join(".repdesk.toml")).is_err());
    let config = Config::load_from_root(dir.path());
    assert_eq!(config.pipeline.weights.quote_sent, 0.75);
    Ok(())
}
