//! Handlers behind the `rllm` subcommands.

use crate::ExportFormat;
use crate::environment::{
    CONFIG_FILE_NAME, LOG_FILE_NAME, Settings, get_config_file, get_data_dir, get_state_file,
};
use crate::history::Statistics;
use crate::session::Session;
use anyhow::{Context as _, Result};
use console::{StyledObject, style};
use rllm_types::{CommandEntry, EntryId, RequestContext, RiskLevel};
use std::io::{BufRead as _, Write as _};
use std::path::Path;
use tabled::{Table, Tabled};

const PROMPT_COLUMN_WIDTH: usize = 40;
const COMMAND_COLUMN_WIDTH: usize = 50;

#[derive(Tabled)]
struct HistoryRow {
    id: u64,
    prompt: String,
    command: String,
    risk: String,
    time: String,
    status: String,
}

impl From<&CommandEntry> for HistoryRow {
    fn from(entry: &CommandEntry) -> Self {
        Self {
            id: entry.id.value(),
            prompt: truncate(&entry.prompt, PROMPT_COLUMN_WIDTH),
            command: truncate(&entry.command, COMMAND_COLUMN_WIDTH),
            risk: entry.risk_level.presentation().label.to_string(),
            time: entry
                .timestamp
                .with_timezone(&chrono::Local)
                .format("%Y-%m-%d %H:%M")
                .to_string(),
            status: if entry.executed { "executed" } else { "-" }.to_string(),
        }
    }
}

pub async fn ask(session: &Session, query: &str, no_context: bool, json: bool) -> Result<()> {
    let context = if no_context {
        RequestContext::default()
    } else {
        session.context()
    };
    let entry = session.submit(query, context).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&entry)?);
    } else {
        print_entry(&entry);
    }
    Ok(())
}

pub fn history(session: &Session, limit: Option<usize>, search: Option<&str>) {
    let mut entries = match search {
        Some(query) => session.search(query),
        None => session.history(),
    };
    if entries.is_empty() {
        println!("No history entries.");
        return;
    }
    if let Some(limit) = limit {
        let start = entries.len().saturating_sub(limit);
        entries = entries.split_off(start);
    }
    let rows: Vec<HistoryRow> = entries.iter().map(HistoryRow::from).collect();
    println!("{}", Table::new(rows));
}

pub fn executed(session: &Session, id: u64) -> Result<()> {
    let entry = session.mark_executed(EntryId(id))?;
    println!("Marked #{} as executed: {}", entry.id, entry.command);
    Ok(())
}

pub fn stats(session: &Session, json: bool) -> Result<()> {
    let stats = session.get_statistics();
    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    } else {
        print_stats(&stats);
    }
    Ok(())
}

pub fn clear(session: &Session, yes: bool) -> Result<()> {
    let count = session.history().len();
    if count == 0 {
        println!("History is already empty.");
        return Ok(());
    }
    if !yes && !confirm(&format!("Delete all {} history entries?", count))? {
        println!("Aborted.");
        return Ok(());
    }
    session.clear_history();
    println!("Cleared {} entries.", count);
    Ok(())
}

pub fn export(session: &Session, format: ExportFormat, output: Option<&Path>) -> Result<()> {
    let content = match format {
        ExportFormat::Json => session.export_json()?,
        ExportFormat::Csv => session.export_csv()?,
        ExportFormat::Script => match session.export_script() {
            Some(script) => script,
            None => {
                eprintln!("Nothing to export: no command has been marked as executed.");
                return Ok(());
            }
        },
    };

    match output {
        Some(path) => {
            std::fs::write(path, &content)
                .with_context(|| format!("failed to write {}", path.display()))?;
            println!("Exported to {}", path.display());
        }
        None => print!("{}", content),
    }
    Ok(())
}

pub fn import(session: &Session, file: &Path) -> Result<()> {
    let json = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read {}", file.display()))?;
    session.restore(&json)?;
    println!(
        "Imported {} entries from {}",
        session.history().len(),
        file.display()
    );
    Ok(())
}

pub fn show_config(settings: &Settings) {
    let path_or_unknown = |path: Result<std::path::PathBuf>| {
        path.map(|p| p.display().to_string())
            .unwrap_or_else(|_| "(unavailable)".to_string())
    };

    println!("provider:             {}", settings.provider);
    println!("effective provider:   {}", settings.effective_provider());
    println!("safety level:         {}", settings.safety_level);
    println!("max query length:     {}", settings.max_query_length);
    println!("request timeout:      {}s", settings.request_timeout_secs);
    println!("max context commands: {}", settings.max_context_commands);
    println!("history key:          {}", settings.history_key);
    println!(
        "api key:              {}",
        if settings.openai.is_configured() {
            "configured"
        } else {
            "not set"
        }
    );
    println!("model:                {}", settings.openai.default_model());
    println!("base url:             {}", settings.openai.base_url());
    println!(
        "config file:          {}",
        path_or_unknown(get_config_file(CONFIG_FILE_NAME))
    );
    println!("data directory:       {}", path_or_unknown(get_data_dir()));
    println!(
        "log file:             {}",
        path_or_unknown(get_state_file(LOG_FILE_NAME))
    );
}

pub fn print_entry(entry: &CommandEntry) {
    println!();
    println!("  {}", style(&entry.command).bold());
    println!();
    let confidence = entry
        .confidence
        .map(|c| format!("   confidence {:.0}%", c * 100.0))
        .unwrap_or_default();
    println!(
        "  risk {}{}   #{}",
        risk_label(entry.risk_level),
        confidence,
        entry.id
    );
    if !entry.explanation.is_empty() {
        println!("  {}", entry.explanation);
    }
    if !entry.alternatives.is_empty() {
        println!();
        println!("  Alternatives:");
        for alt in &entry.alternatives {
            println!("    - {}", alt);
        }
    }
    if !entry.warnings.is_empty() {
        println!();
        println!("  {}", style("Warnings:").yellow());
        for warning in &entry.warnings {
            println!("    {} {}", style("!").yellow().bold(), warning);
        }
    }
    println!();
    println!(
        "  {}",
        style(format!("Run it yourself, then `rllm executed {}`", entry.id)).dim()
    );
}

pub fn print_stats(stats: &Statistics) {
    println!("Total commands:    {}", stats.total_commands);
    println!("Executed commands: {}", stats.executed_commands);
    println!("Execution rate:    {:.1}%", stats.execution_rate * 100.0);
    println!("Active days:       {}", stats.active_days);
    println!("Risk distribution:");
    for (level, count) in &stats.risk_distribution {
        println!("  {:<10} {}", risk_label(*level), count);
    }
}

pub fn risk_label(level: RiskLevel) -> StyledObject<&'static str> {
    let label = style(level.presentation().label);
    match level {
        RiskLevel::Low => label.green(),
        RiskLevel::Medium => label.yellow(),
        RiskLevel::High => label.red(),
        RiskLevel::Critical => label.red().bold().reverse(),
    }
}

fn confirm(question: &str) -> Result<bool> {
    print!("{} [y/N] ", question);
    std::io::stdout().flush()?;
    let mut answer = String::new();
    std::io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}

fn truncate(text: &str, max_chars: usize) -> String {
    let flat = text.replace(['\n', '\r'], " ");
    if flat.chars().count() <= max_chars {
        flat
    } else {
        let mut out: String = flat.chars().take(max_chars.saturating_sub(1)).collect();
        out.push('…');
        out
    }
}
