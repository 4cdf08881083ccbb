//! Source records supplied by the event store.
//!
//! Records are immutable snapshots of what the backend returned. Date fields
//! are read leniently: anything that does not parse is treated as unset, so a
//! single bad row never fails a whole aggregation.

use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::window::Calendar;

/// A point in time as stored by the backend: either an exact instant or a
/// bare calendar day whose meaning depends on the reader's zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum When {
    At(DateTime<Utc>),
    On(NaiveDate),
}

impl When {
    /// Parse the formats the backend is known to emit.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
            return Some(When::At(at.with_timezone(&Utc)));
        }
        for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M:%S%.f"] {
            if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
                return Some(When::At(naive.and_utc()));
            }
        }
        NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok().map(When::On)
    }

    /// Instant this value denotes; bare days start at local midnight.
    pub fn resolve(&self, calendar: &Calendar) -> DateTime<Utc> {
        match self {
            When::At(at) => *at,
            When::On(day) => calendar.start_of(*day),
        }
    }
}

impl From<DateTime<Utc>> for When {
    fn from(at: DateTime<Utc>) -> Self {
        When::At(at)
    }
}

impl From<NaiveDate> for When {
    fn from(day: NaiveDate) -> Self {
        When::On(day)
    }
}

impl fmt::Display for When {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            When::At(at) => write!(f, "{}", at.to_rfc3339()),
            When::On(day) => write!(f, "{}", day.format("%Y-%m-%d")),
        }
    }
}

impl Serialize for When {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Serde helper: malformed or non-string dates become `None`.
pub fn lenient_when<'de, D>(deserializer: D) -> Result<Option<When>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(raw)) => {
            let parsed = When::parse(&raw);
            if parsed.is_none() {
                tracing::debug!(value = %raw, "ignoring malformed date");
            }
            parsed
        }
        Some(serde_json::Value::Null) | None => None,
        Some(other) => {
            tracing::debug!(value = %other, "ignoring non-string date");
            None
        }
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallOutcome {
    Meeting,
    Connected,
    Voicemail,
    NoAnswer,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Call {
    pub id: String,
    pub owner_id: String,
    #[serde(default, deserialize_with = "lenient_when", skip_serializing_if = "Option::is_none")]
    pub called_at: Option<When>,
    #[serde(default = "default_outcome")]
    pub outcome: CallOutcome,
}

fn default_outcome() -> CallOutcome {
    CallOutcome::Other
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Note {
    pub id: String,
    pub contact_id: String,
    #[serde(default)]
    pub text: String,
    #[serde(default, deserialize_with = "lenient_when", skip_serializing_if = "Option::is_none")]
    pub reminder_at: Option<When>,
    #[serde(default, deserialize_with = "lenient_when", skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<When>,
}

/// Pipeline stage of a deal. Stages the engine does not know are kept as
/// `Unknown`: active, but carrying no pipeline weight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DealStage {
    Discovery,
    #[serde(alias = "quote-request", alias = "quote_requested")]
    QuoteRequest,
    #[serde(alias = "quote-sent")]
    QuoteSent,
    Won,
    Lost,
    #[serde(alias = "void")]
    Voided,
    #[serde(other)]
    Unknown,
}

impl DealStage {
    pub fn is_terminal(self) -> bool {
        matches!(self, DealStage::Won | DealStage::Lost | DealStage::Voided)
    }

    pub fn is_active(self) -> bool {
        !self.is_terminal()
    }

    /// Reached at least the quoting stage.
    pub fn has_progressed(self) -> bool {
        matches!(self, DealStage::QuoteRequest | DealStage::QuoteSent | DealStage::Won)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DealStage::Discovery => "discovery",
            DealStage::QuoteRequest => "quote_request",
            DealStage::QuoteSent => "quote_sent",
            DealStage::Won => "won",
            DealStage::Lost => "lost",
            DealStage::Voided => "voided",
            DealStage::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Deal {
    pub id: String,
    pub owner_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub stage: DealStage,
    #[serde(default)]
    pub value: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_action: Option<String>,
    #[serde(default, deserialize_with = "lenient_when", skip_serializing_if = "Option::is_none")]
    pub next_date: Option<When>,
    #[serde(default, deserialize_with = "lenient_when", skip_serializing_if = "Option::is_none")]
    pub quote_requested_at: Option<When>,
    #[serde(default, deserialize_with = "lenient_when", skip_serializing_if = "Option::is_none")]
    pub quote_sent_at: Option<When>,
    #[serde(default, deserialize_with = "lenient_when", skip_serializing_if = "Option::is_none")]
    pub todo_completed_at: Option<When>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contact {
    pub id: String,
    pub owner_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    #[serde(default, deserialize_with = "lenient_when", skip_serializing_if = "Option::is_none")]
    pub created_at: Option<When>,
}

/// A sales representative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rep {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

impl Rep {
    pub fn display_name(&self) -> &str {
        if self.name.trim().is_empty() {
            &self.id
        } else {
            &self.name
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_supported_formats() {
        assert!(matches!(When::parse("2026-10-19T09:30:00+02:00"), Some(When::At(_))));
        assert!(matches!(When::parse("2026-10-19 09:30:00"), Some(When::At(_))));
        assert!(matches!(When::parse("2026-10-19 09:30"), Some(When::At(_))));
        assert_eq!(
            When::parse("2026-10-19"),
            NaiveDate::from_ymd_opt(2026, 10, 19).map(When::On)
        );
        assert_eq!(When::parse(""), None);
        assert_eq!(When::parse("next tuesday"), None);
    }

    #[test]
    fn malformed_dates_deserialize_as_unset() {
        let note: Note = serde_json::from_str(
            r#"{"id":"n1","contact_id":"c1","text":"call back","reminder_at":"soon","completed_at":42}"#,
        )
        .expect("note");
        assert!(note.reminder_at.is_none());
        assert!(note.completed_at.is_none());

        let call: Call =
            serde_json::from_str(r#"{"id":"k1","owner_id":"r1","called_at":null}"#).expect("call");
        assert!(call.called_at.is_none());
        assert_eq!(call.outcome, CallOutcome::Other);
    }

    #[test]
    fn unknown_stage_and_outcome_are_tolerated() {
        let deal: Deal =
            serde_json::from_str(r#"{"id":"d1","owner_id":"r1","stage":"negotiation","value":10}"#)
                .expect("deal");
        assert_eq!(deal.stage, DealStage::Unknown);
        assert!(deal.stage.is_active());

        let deal: Deal =
            serde_json::from_str(r#"{"id":"d2","owner_id":"r1","stage":"quote-sent"}"#).expect("deal");
        assert_eq!(deal.stage, DealStage::QuoteSent);

        let call: Call = serde_json::from_str(
            r#"{"id":"k1","owner_id":"r1","called_at":"2026-10-19T09:00:00Z","outcome":"left_message"}"#,
        )
        .expect("call");
        assert_eq!(call.outcome, CallOutcome::Other);
    }

    #[test]
    fn bare_days_resolve_to_local_midnight() {
        let offset = chrono::FixedOffset::west_opt(5 * 3600).expect("offset");
        let calendar = Calendar::with_offset(offset);
        let when = When::parse("2026-10-21").expect("day");
        assert_eq!(
            when.resolve(&calendar),
            DateTime::parse_from_rfc3339("2026-10-21T05:00:00Z")
                .expect("ts")
                .with_timezone(&Utc)
        );
    }

    #[test]
    fn serializes_back_to_wire_format() {
        let day = When::parse("2026-10-21").expect("day");
        assert_eq!(serde_json::to_string(&day).expect("json"), "\"2026-10-21\"");
    }
}
