//! Calendar-aware date ranges.
//!
//! One resolver serves both the task filter and the metrics aggregator, so
//! "today" and "this week" resolve to the same instants everywhere. All day
//! boundaries are local midnights in the configured zone, converted to UTC.

use std::fmt;
use std::str::FromStr;

use chrono::{
    DateTime, Datelike, Days, Duration, FixedOffset, Local, Months, NaiveDate, NaiveDateTime,
    NaiveTime, Offset, TimeZone, Utc, Weekday,
};
use serde::Serialize;

use crate::error::{Error, Result};

/// Zone used to decide where calendar days begin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Zone {
    /// The host's local zone, DST transitions included.
    Local,
    Fixed(FixedOffset),
}

/// Maps instants onto calendar days and back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Calendar {
    zone: Zone,
    week_start: Weekday,
}

impl Calendar {
    pub fn new(zone: Zone, week_start: Weekday) -> Self {
        Self { zone, week_start }
    }

    pub fn local() -> Self {
        Self::new(Zone::Local, Weekday::Mon)
    }

    pub fn utc() -> Self {
        Self::with_offset(Utc.fix())
    }

    pub fn with_offset(offset: FixedOffset) -> Self {
        Self::new(Zone::Fixed(offset), Weekday::Mon)
    }

    pub fn starting_weeks_on(mut self, week_start: Weekday) -> Self {
        self.week_start = week_start;
        self
    }

    pub fn zone(&self) -> Zone {
        self.zone
    }

    pub fn week_start(&self) -> Weekday {
        self.week_start
    }

    /// Calendar day an instant falls on.
    pub fn date_of(&self, at: DateTime<Utc>) -> NaiveDate {
        match self.zone {
            Zone::Local => at.with_timezone(&Local).date_naive(),
            Zone::Fixed(offset) => at.with_timezone(&offset).date_naive(),
        }
    }

    /// First instant of a calendar day.
    pub fn start_of(&self, date: NaiveDate) -> DateTime<Utc> {
        let midnight = date.and_time(NaiveTime::MIN);
        match self.zone {
            Zone::Local => first_instant(&Local, midnight),
            Zone::Fixed(offset) => first_instant(&offset, midnight),
        }
    }

    pub fn start_of_today(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        self.start_of(self.date_of(now))
    }

    pub fn week_start_date(&self, date: NaiveDate) -> NaiveDate {
        let back = (date.weekday().num_days_from_monday() + 7
            - self.week_start.num_days_from_monday())
            % 7;
        days_before(date, u64::from(back))
    }

    pub fn start_of_week(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        self.start_of(self.week_start_date(self.date_of(now)))
    }

    /// Resolve a preset against `now` into a half-open window.
    pub fn resolve(&self, preset: &Preset, now: DateTime<Utc>) -> MetricsWindow {
        let today = self.date_of(now);
        let tomorrow = days_after(today, 1);
        let (from, until) = match preset {
            Preset::Today => (today, tomorrow),
            Preset::Yesterday => (days_before(today, 1), today),
            Preset::ThisWeek => {
                let start = self.week_start_date(today);
                (start, days_after(start, 7))
            }
            Preset::LastDays(days) => {
                let span = (*days).clamp(1, MAX_RANGE_DAYS);
                (days_before(tomorrow, u64::from(span)), tomorrow)
            }
            Preset::ThisMonth => {
                let start = first_of_month(today);
                (start, add_months(start, 1))
            }
            Preset::LastMonth => {
                let end = first_of_month(today);
                (sub_months(end, 1), end)
            }
            Preset::ThisQuarter => {
                let start = first_of_quarter(today);
                (start, add_months(start, 3))
            }
            Preset::Custom { from, to } => (*from, days_after(*to, 1)),
        };

        MetricsWindow {
            start: self.start_of(from),
            end: self.start_of(until),
            label: preset.label(),
        }
    }
}

impl Default for Calendar {
    fn default() -> Self {
        Self::local()
    }
}

fn first_instant<Tz: TimeZone>(tz: &Tz, naive: NaiveDateTime) -> DateTime<Utc> {
    if let Some(at) = tz.from_local_datetime(&naive).earliest() {
        return at.with_timezone(&Utc);
    }
    // Midnight skipped by a DST jump: the day starts at the first valid hour.
    naive
        .checked_add_signed(Duration::hours(1))
        .and_then(|shifted| tz.from_local_datetime(&shifted).earliest())
        .map(|at| at.with_timezone(&Utc))
        .unwrap_or_else(|| Utc.from_utc_datetime(&naive))
}

/// `date` plus `days` calendar days, saturating at the last representable date.
pub fn days_after(date: NaiveDate, days: u64) -> NaiveDate {
    date.checked_add_days(Days::new(days)).unwrap_or(NaiveDate::MAX)
}

/// `date` minus `days` calendar days, saturating at the first representable date.
pub fn days_before(date: NaiveDate, days: u64) -> NaiveDate {
    date.checked_sub_days(Days::new(days)).unwrap_or(NaiveDate::MIN)
}

fn first_of_month(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

fn first_of_quarter(date: NaiveDate) -> NaiveDate {
    let month = (date.month0() / 3) * 3 + 1;
    NaiveDate::from_ymd_opt(date.year(), month, 1).unwrap_or(date)
}

fn add_months(date: NaiveDate, months: u32) -> NaiveDate {
    date.checked_add_months(Months::new(months)).unwrap_or(date)
}

fn sub_months(date: NaiveDate, months: u32) -> NaiveDate {
    date.checked_sub_months(Months::new(months)).unwrap_or(date)
}

/// Longest `last-N-days` range accepted, roughly a century.
pub const MAX_RANGE_DAYS: u32 = 36_500;

/// Named date ranges offered by the dashboards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preset {
    Today,
    Yesterday,
    ThisWeek,
    /// Today plus the preceding `n - 1` calendar days.
    LastDays(u32),
    ThisMonth,
    LastMonth,
    ThisQuarter,
    /// Inclusive calendar dates.
    Custom { from: NaiveDate, to: NaiveDate },
}

impl Preset {
    /// Build a custom preset from inclusive `YYYY-MM-DD` bounds.
    pub fn custom(from: &str, to: &str) -> Result<Self> {
        let from = parse_day("from", from)?;
        let to = parse_day("to", to)?;
        if to < from {
            return Err(Error::InvalidArgument(format!(
                "custom range ends ({to}) before it starts ({from})"
            )));
        }
        Ok(Preset::Custom { from, to })
    }

    /// Resolve CLI-style arguments: explicit bounds imply `custom`.
    pub fn from_args(key: Option<&str>, from: Option<&str>, to: Option<&str>) -> Result<Self> {
        match (key.map(str::trim), from, to) {
            (None | Some("custom"), Some(from), Some(to)) => Self::custom(from, to),
            (Some("custom"), _, _) => Err(Error::InvalidArgument(
                "custom range requires --from and --to".to_string(),
            )),
            (_, Some(_), None) | (_, None, Some(_)) => Err(Error::InvalidArgument(
                "--from and --to must be given together".to_string(),
            )),
            (Some(key), None, None) => key.parse(),
            (Some(_), Some(_), Some(_)) => Err(Error::InvalidArgument(
                "--from/--to cannot be combined with a named preset".to_string(),
            )),
            (None, None, None) => Ok(Preset::ThisWeek),
        }
    }

    pub fn label(&self) -> String {
        match self {
            Preset::Today => "Today".to_string(),
            Preset::Yesterday => "Yesterday".to_string(),
            Preset::ThisWeek => "This week".to_string(),
            Preset::LastDays(days) => format!("Last {days} days"),
            Preset::ThisMonth => "This month".to_string(),
            Preset::LastMonth => "Last month".to_string(),
            Preset::ThisQuarter => "This quarter".to_string(),
            Preset::Custom { from, to } => format!("{from} to {to}"),
        }
    }
}

impl FromStr for Preset {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let key = s.trim().to_ascii_lowercase();
        match key.as_str() {
            "today" => Ok(Preset::Today),
            "yesterday" => Ok(Preset::Yesterday),
            "this-week" | "week" => Ok(Preset::ThisWeek),
            "this-month" | "month" => Ok(Preset::ThisMonth),
            "last-month" => Ok(Preset::LastMonth),
            "this-quarter" | "quarter" => Ok(Preset::ThisQuarter),
            other => {
                let days = other
                    .strip_prefix("last-")
                    .and_then(|rest| rest.strip_suffix("-days"))
                    .and_then(|n| n.parse::<u32>().ok())
                    .filter(|n| (1..=MAX_RANGE_DAYS).contains(n));
                days.map(Preset::LastDays).ok_or_else(|| {
                    Error::InvalidArgument(format!(
                        "unknown preset '{s}' (expected today|yesterday|this-week|last-N-days with N in 1..={MAX_RANGE_DAYS}|this-month|last-month|this-quarter|custom)"
                    ))
                })
            }
        }
    }
}

fn parse_day(field: &str, raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").map_err(|err| {
        Error::InvalidArgument(format!("{field}: expected YYYY-MM-DD, got '{raw}': {err}"))
    })
}

/// Half-open `[start, end)` interval with a display label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetricsWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub label: String,
}

impl MetricsWindow {
    /// Window over explicit instants.
    pub fn between(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self> {
        if end <= start {
            return Err(Error::InvalidArgument(format!(
                "window end {end} is not after start {start}"
            )));
        }
        Ok(Self {
            start,
            end,
            label: format!("{} to {}", start.format("%Y-%m-%d %H:%M"), end.format("%Y-%m-%d %H:%M")),
        })
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start <= at && at < self.end
    }

    /// Unset instants never fall inside a window.
    pub fn contains_opt(&self, at: Option<DateTime<Utc>>) -> bool {
        at.is_some_and(|at| self.contains(at))
    }
}

impl fmt::Display for MetricsWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{} .. {})", self.label, self.start.to_rfc3339(), self.end.to_rfc3339())
    }
}
