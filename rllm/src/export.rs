//! Serializers for the session history.

use crate::history::render_snapshot;
use chrono::{DateTime, Utc};
use rllm_types::{CommandEntry, RllmError, RllmResult, format_timestamp};

pub const SCRIPT_INTERPRETER: &str = "#!/usr/bin/env bash";

/// Full history as a pretty-printed JSON array, in insertion order.
///
/// The output is the persisted snapshot format, so it can be passed back to
/// [`crate::history::HistoryStore::restore`].
pub fn export_json(entries: &[CommandEntry]) -> RllmResult<String> {
    render_snapshot(entries)
}

/// Shell script of the executed entries, or `None` when nothing was executed.
pub fn export_script(entries: &[CommandEntry]) -> Option<String> {
    export_script_at(entries, Utc::now())
}

pub fn export_script_at(entries: &[CommandEntry], generated_at: DateTime<Utc>) -> Option<String> {
    let executed: Vec<&CommandEntry> = entries.iter().filter(|e| e.executed).collect();
    if executed.is_empty() {
        return None;
    }

    let mut script = String::new();
    script.push_str(SCRIPT_INTERPRETER);
    script.push('\n');
    script.push_str("# Generated by rllm\n");
    script.push_str(&format!("# Generated at: {}\n", format_timestamp(&generated_at)));
    script.push_str(&format!("# Commands: {}\n", executed.len()));

    for entry in executed {
        script.push('\n');
        script.push_str(&format!("# {}\n", single_line(&entry.prompt)));
        script.push_str(&entry.command);
        script.push('\n');
    }
    Some(script)
}

/// CSV with one row per entry, in insertion order.
pub fn export_csv(entries: &[CommandEntry]) -> RllmResult<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer
        .write_record(["id", "prompt", "command", "risk_level", "timestamp", "executed"])
        .map_err(csv_error)?;
    for entry in entries {
        writer
            .write_record([
                entry.id.to_string(),
                entry.prompt.clone(),
                entry.command.clone(),
                entry.risk_level.to_string(),
                format_timestamp(&entry.timestamp),
                entry.executed.to_string(),
            ])
            .map_err(csv_error)?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| RllmError::Storage(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| RllmError::Storage(e.to_string()))
}

fn csv_error(err: csv::Error) -> RllmError {
    RllmError::Storage(format!("csv: {}", err))
}

fn single_line(text: &str) -> String {
    text.split(['\r', '\n'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::HistoryStore;
    use crate::kv::MemoryStore;
    use chrono::TimeZone;
    use rllm_types::{CommandDraft, RiskLevel};
    use std::sync::Arc;

    fn history() -> HistoryStore {
        let mut store = HistoryStore::new(Arc::new(MemoryStore::new()), "history");
        let inputs = [
            ("list files", "ls -l", RiskLevel::Low),
            ("disk\nusage", "df -h", RiskLevel::Low),
            ("remove temp, \"now\"", "rm -f *.tmp", RiskLevel::High),
        ];
        for (prompt, command, risk) in inputs {
            store
                .append(CommandDraft {
                    prompt: prompt.to_string(),
                    command: command.to_string(),
                    explanation: String::new(),
                    risk_level: risk,
                    confidence: None,
                    alternatives: vec![],
                    warnings: vec![],
                })
                .unwrap();
        }
        store
    }

    #[test]
    fn script_export_without_executed_entries_is_none() {
        let store = history();
        assert_eq!(export_script(store.entries()), None);
        assert_eq!(export_script(&[]), None);
    }

    #[test]
    fn script_export_keeps_executed_entries_in_order() {
        let mut store = history();
        let ids: Vec<_> = store.entries().iter().map(|e| e.id).collect();
        store.mark_executed(ids[2]).unwrap();
        store.mark_executed(ids[1]).unwrap();

        let at = Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap();
        let script = export_script_at(store.entries(), at).unwrap();
        let expected = "#!/usr/bin/env bash\n\
# Generated by rllm\n\
# Generated at: 2024-05-01T08:00:00.000Z\n\
# Commands: 2\n\
\n\
# disk usage\n\
df -h\n\
\n\
# remove temp, \"now\"\n\
rm -f *.tmp\n";
        assert_eq!(script, expected);
        assert!(!script.contains("ls -l"));
    }

    #[test]
    fn json_export_restores_identically() {
        let mut store = history();
        let id = store.entries()[0].id;
        store.mark_executed(id).unwrap();
        let json = export_json(store.entries()).unwrap();

        let mut restored = HistoryStore::new(Arc::new(MemoryStore::new()), "history");
        restored.restore(&json).unwrap();
        assert_eq!(restored.entries(), store.entries());
    }

    #[test]
    fn csv_export_quotes_fields() {
        let store = history();
        let csv = export_csv(store.entries()).unwrap();
        let mut lines = csv.lines();
        assert_eq!(
            lines.next(),
            Some("id,prompt,command,risk_level,timestamp,executed")
        );
        assert!(csv.contains("1,list files,ls -l,low,"));
        assert!(csv.contains("\"remove temp, \"\"now\"\"\""));
        assert!(csv.contains("\"disk\nusage\""));

        let mut reader = csv::Reader::from_reader(csv.as_bytes());
        assert_eq!(reader.records().count(), 3);
    }

    #[test]
    fn csv_export_of_empty_history_has_header_only() {
        let csv = export_csv(&[]).unwrap();
        assert_eq!(csv, "id,prompt,command,risk_level,timestamp,executed\n");
    }
}
