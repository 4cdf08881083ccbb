//! Configuration loading and management
//!
//! Handles parsing of `.repdesk.toml` configuration files.

use std::path::{Path, PathBuf};

use chrono::{Duration, FixedOffset, Offset, Utc, Weekday};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::filter::DueWindow;
use crate::reconcile::{DEFAULT_RETENTION_DAYS, MAX_RETENTION_DAYS};
use crate::records::DealStage;
use crate::window::{Calendar, Zone};

/// Name of the configuration file at the data root
pub const CONFIG_FILE: &str = ".repdesk.toml";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Day boundaries and week start
    #[serde(default)]
    pub calendar: CalendarConfig,

    /// Task list behaviour
    #[serde(default)]
    pub tasks: TasksConfig,

    /// Pipeline weighting
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Activity targets used for the status signal
    #[serde(default)]
    pub targets: TargetsConfig,
}

/// Calendar configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarConfig {
    /// "local", "Z", or an offset such as "+02:00"
    #[serde(default = "default_utc_offset")]
    pub utc_offset: String,

    /// First day of the week
    #[serde(default = "default_week_start")]
    pub week_start: String,
}

fn default_utc_offset() -> String {
    "local".to_string()
}

fn default_week_start() -> String {
    "monday".to_string()
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            utc_offset: default_utc_offset(),
            week_start: default_week_start(),
        }
    }
}

/// Tasks configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TasksConfig {
    /// Days a completed task stays visible when never cleared
    #[serde(default = "default_retention_days")]
    pub retention_days: i64,

    /// Window used when `tasks list` gets none
    #[serde(default)]
    pub default_window: DueWindow,
}

fn default_retention_days() -> i64 {
    DEFAULT_RETENTION_DAYS
}

impl Default for TasksConfig {
    fn default() -> Self {
        Self {
            retention_days: default_retention_days(),
            default_window: DueWindow::default(),
        }
    }
}

/// Pipeline configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub weights: StageWeights,
}

/// Probability weights for active stages. Terminal stages carry none.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageWeights {
    #[serde(default = "default_discovery_weight")]
    pub discovery: f64,

    #[serde(default = "default_quote_request_weight")]
    pub quote_request: f64,

    #[serde(default = "default_quote_sent_weight")]
    pub quote_sent: f64,
}

fn default_discovery_weight() -> f64 {
    0.10
}

fn default_quote_request_weight() -> f64 {
    0.25
}

fn default_quote_sent_weight() -> f64 {
    0.75
}

impl Default for StageWeights {
    fn default() -> Self {
        Self {
            discovery: default_discovery_weight(),
            quote_request: default_quote_request_weight(),
            quote_sent: default_quote_sent_weight(),
        }
    }
}

impl StageWeights {
    pub fn weight(&self, stage: DealStage) -> f64 {
        match stage {
            DealStage::Discovery => self.discovery,
            DealStage::QuoteRequest => self.quote_request,
            DealStage::QuoteSent => self.quote_sent,
            DealStage::Won | DealStage::Lost | DealStage::Voided | DealStage::Unknown => 0.0,
        }
    }

    fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("discovery", self.discovery),
            ("quote_request", self.quote_request),
            ("quote_sent", self.quote_sent),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(Error::InvalidConfig(format!(
                    "pipeline.weights.{field} must be within 0..=1, got {value}"
                )));
            }
        }
        Ok(())
    }
}

/// Hard thresholds behind the green/amber/red status. Unset means "not
/// enforced".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TargetsConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub daily_calls: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weekly_calls: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_compliance: Option<f64>,
}

impl TargetsConfig {
    fn validate(&self) -> Result<()> {
        if let Some(min) = self.min_compliance {
            if !(0.0..=100.0).contains(&min) {
                return Err(Error::InvalidConfig(format!(
                    "targets.min_compliance must be within 0..=100, got {min}"
                )));
            }
        }
        Ok(())
    }
}

impl CalendarConfig {
    /// Build the calendar these settings describe.
    pub fn calendar(&self) -> Result<Calendar> {
        let zone = parse_zone(&self.utc_offset)?;
        let week_start = parse_week_start(&self.week_start)?;
        Ok(Calendar::new(zone, week_start))
    }
}

fn parse_zone(raw: &str) -> Result<Zone> {
    let trimmed = raw.trim();
    if trimmed.eq_ignore_ascii_case("local") {
        return Ok(Zone::Local);
    }
    if trimmed.eq_ignore_ascii_case("z") || trimmed.eq_ignore_ascii_case("utc") {
        return Ok(Zone::Fixed(Utc.fix()));
    }
    trimmed
        .parse::<FixedOffset>()
        .map(Zone::Fixed)
        .map_err(|err| {
            Error::InvalidConfig(format!(
                "calendar.utc_offset: invalid offset '{trimmed}' (expected local|Z|+HH:MM): {err}"
            ))
        })
}

fn parse_week_start(raw: &str) -> Result<Weekday> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "monday" | "mon" => Ok(Weekday::Mon),
        "sunday" | "sun" => Ok(Weekday::Sun),
        "saturday" | "sat" => Ok(Weekday::Sat),
        other => Err(Error::InvalidConfig(format!(
            "calendar.week_start: invalid day '{other}' (expected monday|sunday|saturday)"
        ))),
    }
}

impl Config {
    /// Load configuration from a `.repdesk.toml` file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from the data root, or return defaults
    pub fn load_from_root(root: &Path) -> Self {
        let config_path = root.join(CONFIG_FILE);
        if !config_path.exists() {
            return Self::default();
        }
        match Self::load(&config_path) {
            Ok(config) => config,
            Err(err) => {
                tracing::warn!(path = %config_path.display(), error = %err, "falling back to default config");
                Self::default()
            }
        }
    }

    /// Save configuration to a file
    pub fn save(&self, path: &PathBuf) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn calendar(&self) -> Result<Calendar> {
        self.calendar.calendar()
    }

    /// Retention window, clamped to the accepted range.
    pub fn retention(&self) -> Duration {
        let days = self.tasks.retention_days.clamp(1, MAX_RETENTION_DAYS);
        Duration::try_days(days).unwrap_or_else(|| Duration::days(DEFAULT_RETENTION_DAYS))
    }

    fn validate(&self) -> Result<()> {
        self.calendar.calendar()?;
        if !(1..=MAX_RETENTION_DAYS).contains(&self.tasks.retention_days) {
            return Err(Error::InvalidConfig(format!(
                "tasks.retention_days must be within 1..={MAX_RETENTION_DAYS}, got {}",
                self.tasks.retention_days
            )));
        }
        self.pipeline.weights.validate()?;
        self.targets.validate()?;
        Ok(())
    }
}
