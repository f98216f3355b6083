//! Risk levels attached to every command suggestion.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Ordinal danger category of a shell command.
///
/// The derived ordering is the severity ordering: `Low < Medium < High < Critical`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    /// Every level, lowest severity first.
    pub const ALL: [RiskLevel; 4] = [
        RiskLevel::Low,
        RiskLevel::Medium,
        RiskLevel::High,
        RiskLevel::Critical,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
            RiskLevel::Critical => "critical",
        }
    }

    pub fn presentation(&self) -> RiskPresentation {
        risk_presentation(*self)
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RiskLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "low" => Ok(RiskLevel::Low),
            "medium" => Ok(RiskLevel::Medium),
            "high" => Ok(RiskLevel::High),
            "critical" => Ok(RiskLevel::Critical),
            _ => Err(format!(
                "Invalid risk level: {}. Valid levels are: low, medium, high, critical",
                s
            )),
        }
    }
}

/// Display data for a risk level, consumed by presentation layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RiskPresentation {
    pub label: &'static str,
    /// 0 for `Low` up to 3 for `Critical`.
    pub severity_rank: u8,
}

pub fn risk_presentation(level: RiskLevel) -> RiskPresentation {
    match level {
        RiskLevel::Low => RiskPresentation {
            label: "LOW",
            severity_rank: 0,
        },
        RiskLevel::Medium => RiskPresentation {
            label: "MEDIUM",
            severity_rank: 1,
        },
        RiskLevel::High => RiskPresentation {
            label: "HIGH",
            severity_rank: 2,
        },
        RiskLevel::Critical => RiskPresentation {
            label: "CRITICAL",
            severity_rank: 3,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_rank_follows_ordering() {
        for pair in RiskLevel::ALL.windows(2) {
            assert!(pair[0] < pair[1]);
            assert!(pair[0].presentation().severity_rank < pair[1].presentation().severity_rank);
        }
    }

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!("HIGH".parse::<RiskLevel>(), Ok(RiskLevel::High));
        assert_eq!(" critical ".parse::<RiskLevel>(), Ok(RiskLevel::Critical));
        assert!("severe".parse::<RiskLevel>().is_err());
    }

    #[test]
    fn serializes_lowercase() {
        let json = serde_json::to_string(&RiskLevel::Medium).unwrap();
        assert_eq!(json, "\"medium\"");
    }
}
