//! Command entries: one classification result plus its execution state.

use crate::risk::RiskLevel;
use crate::wire::ClassificationResponse;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque entry identifier, strictly increasing in creation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryId(pub u64);

impl EntryId {
    pub fn value(&self) -> u64 {
        self.0
    }

    /// The following id, or `None` once the id space is exhausted.
    pub fn next(&self) -> Option<EntryId> {
        self.0.checked_add(1).map(EntryId)
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Classifier output that has not been appended to a history yet.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandDraft {
    pub prompt: String,
    pub command: String,
    pub explanation: String,
    pub risk_level: RiskLevel,
    pub confidence: Option<f64>,
    pub alternatives: Vec<String>,
    pub warnings: Vec<String>,
}

impl CommandDraft {
    pub fn from_response(prompt: &str, response: ClassificationResponse) -> Self {
        Self {
            prompt: prompt.to_string(),
            command: response.command,
            explanation: response.explanation,
            risk_level: response.risk_level,
            confidence: response.confidence.map(clamp_confidence),
            alternatives: response.alternatives,
            warnings: response.warnings,
        }
    }

    pub fn to_response(&self) -> ClassificationResponse {
        ClassificationResponse {
            command: self.command.clone(),
            explanation: self.explanation.clone(),
            risk_level: self.risk_level,
            confidence: self.confidence,
            alternatives: self.alternatives.clone(),
            warnings: self.warnings.clone(),
        }
    }
}

/// A stored classification result.
///
/// Only `executed` ever changes after creation, and only from `false` to `true`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandEntry {
    pub id: EntryId,
    pub prompt: String,
    pub command: String,
    pub explanation: String,
    pub risk_level: RiskLevel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    pub alternatives: Vec<String>,
    pub warnings: Vec<String>,
    #[serde(with = "timestamp_format")]
    pub timestamp: DateTime<Utc>,
    pub executed: bool,
}

impl CommandEntry {
    pub fn from_draft(id: EntryId, draft: CommandDraft, timestamp: DateTime<Utc>) -> Self {
        Self {
            id,
            prompt: draft.prompt,
            command: draft.command,
            explanation: draft.explanation,
            risk_level: draft.risk_level,
            confidence: draft.confidence,
            alternatives: draft.alternatives,
            warnings: draft.warnings,
            timestamp: truncate_to_millis(timestamp),
            executed: false,
        }
    }
}

/// Clamp a confidence score into `[0, 1]`; NaN becomes 0.
pub fn clamp_confidence(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Drop sub-millisecond precision so the textual format round-trips exactly.
pub fn truncate_to_millis(timestamp: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(timestamp.timestamp_millis()).unwrap_or(timestamp)
}

/// RFC 3339 in UTC with milliseconds, e.g. `2024-05-01T12:30:00.250Z`.
pub fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value.trim())
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

pub mod timestamp_format {
    use super::{format_timestamp, parse_timestamp};
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S: Serializer>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format_timestamp(value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse_timestamp(&raw).ok_or_else(|| D::Error::custom(format!("invalid timestamp: {raw}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn entry_id_next_stops_at_the_end() {
        assert_eq!(EntryId(1).next(), Some(EntryId(2)));
        assert_eq!(EntryId(u64::MAX - 1).next(), Some(EntryId(u64::MAX)));
        assert_eq!(EntryId(u64::MAX).next(), None);
    }

    #[test]
    fn timestamp_format_is_fixed_millis_utc() {
        let ts = Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap();
        assert_eq!(format_timestamp(&ts), "2024-05-01T12:30:00.000Z");
        assert_eq!(parse_timestamp("2024-05-01T12:30:00.000Z"), Some(ts));
    }

    #[test]
    fn parse_timestamp_normalizes_offsets() {
        let parsed = parse_timestamp("2024-05-01T14:30:00+02:00").unwrap();
        assert_eq!(format_timestamp(&parsed), "2024-05-01T12:30:00.000Z");
        assert!(parse_timestamp("yesterday").is_none());
    }

    #[test]
    fn from_draft_starts_unexecuted_and_truncates_time() {
        let draft = CommandDraft {
            prompt: "show memory".to_string(),
            command: "free -h".to_string(),
            explanation: String::new(),
            risk_level: RiskLevel::Low,
            confidence: Some(0.9),
            alternatives: vec![],
            warnings: vec![],
        };
        let now = Utc::now();
        let entry = CommandEntry::from_draft(EntryId(7), draft, now);
        assert!(!entry.executed);
        assert_eq!(entry.id, EntryId(7));
        assert_eq!(entry.timestamp.timestamp_millis(), now.timestamp_millis());
        assert_eq!(entry.timestamp.timestamp_subsec_nanos() % 1_000_000, 0);
    }

    #[test]
    fn clamp_confidence_bounds() {
        assert_eq!(clamp_confidence(1.7), 1.0);
        assert_eq!(clamp_confidence(-0.2), 0.0);
        assert_eq!(clamp_confidence(f64::NAN), 0.0);
        assert_eq!(clamp_confidence(0.42), 0.42);
    }
}
