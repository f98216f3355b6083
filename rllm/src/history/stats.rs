use chrono::NaiveDate;
use rllm_types::{CommandEntry, RiskLevel};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};

/// Aggregates derived from a full scan of the history.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Statistics {
    pub total_commands: usize,
    pub executed_commands: usize,
    /// Every level is present, zero counts included, in severity order.
    pub risk_distribution: BTreeMap<RiskLevel, usize>,
    pub execution_rate: f64,
    pub active_days: usize,
}

impl Default for Statistics {
    fn default() -> Self {
        recompute(&[])
    }
}

pub fn recompute(entries: &[CommandEntry]) -> Statistics {
    let mut risk_distribution: BTreeMap<RiskLevel, usize> =
        RiskLevel::ALL.into_iter().map(|level| (level, 0)).collect();
    let mut executed_commands = 0;
    let mut days: HashSet<NaiveDate> = HashSet::new();

    for entry in entries {
        *risk_distribution.entry(entry.risk_level).or_insert(0) += 1;
        if entry.executed {
            executed_commands += 1;
        }
        days.insert(entry.timestamp.date_naive());
    }

    let total_commands = entries.len();
    let execution_rate = if total_commands == 0 {
        0.0
    } else {
        executed_commands as f64 / total_commands as f64
    };

    Statistics {
        total_commands,
        executed_commands,
        risk_distribution,
        execution_rate,
        active_days: days.len(),
    }
}
