//! Translate natural language requests into shell command suggestions.
//!
//! Requests are classified by an ordered rule table or an OpenAI-compatible
//! backend, annotated with a risk level, and recorded in a session history
//! that can be summarized and exported. Commands are never executed.

pub mod ai_features;
pub mod classifier;
pub mod commands;
pub mod environment;
pub mod errors;
pub mod export;
pub mod history;
pub mod interactive;
pub mod kv;
pub mod safety;
pub mod session;

use crate::environment::{LOG_FILE_NAME, Settings, get_state_file};
use crate::kv::FileStore;
use crate::session::Session;
use anyhow::{Result, anyhow};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Suggest a shell command for a request (never runs it)
    Ask {
        #[arg(required = true, num_args = 1..)]
        query: Vec<String>,
        /// Do not send directory, shell or recent commands along
        #[arg(long)]
        no_context: bool,
        /// Print the stored entry as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show previous suggestions
    History {
        #[arg(short, long)]
        limit: Option<usize>,
        #[arg(short, long)]
        search: Option<String>,
    },
    /// Record that a suggestion was run
    Executed { id: u64 },
    /// Summarize the history
    Stats {
        #[arg(long)]
        json: bool,
    },
    /// Delete the whole history
    Clear {
        #[arg(short, long)]
        yes: bool,
    },
    /// Export the history
    Export {
        #[arg(short, long, value_enum, default_value_t = ExportFormat::Json)]
        format: ExportFormat,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Replace the history with a JSON export
    Import { file: PathBuf },
    /// Show the effective configuration
    Config,
    /// Line-oriented prompt; every line is a request
    Interactive,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Csv,
    Script,
}

/// Load settings, open the persisted session and run `cli`.
pub async fn run(cli: Cli) -> Result<()> {
    let settings = Settings::load()?;
    debug!("settings: {:?}", settings);

    if let Some(Command::Config) = cli.command {
        commands::show_config(&settings);
        return Ok(());
    }

    let kv = Arc::new(FileStore::open_default()?);
    let session = Session::open(settings, kv)?;

    match cli.command {
        Some(Command::Ask {
            query,
            no_context,
            json,
        }) => commands::ask(&session, &query.join(" "), no_context, json).await,
        Some(Command::History { limit, search }) => {
            commands::history(&session, limit, search.as_deref());
            Ok(())
        }
        Some(Command::Executed { id }) => commands::executed(&session, id),
        Some(Command::Stats { json }) => commands::stats(&session, json),
        Some(Command::Clear { yes }) => commands::clear(&session, yes),
        Some(Command::Export { format, output }) => {
            commands::export(&session, format, output.as_deref())
        }
        Some(Command::Import { file }) => commands::import(&session, &file),
        Some(Command::Interactive) | None => interactive::run(&session).await,
        Some(Command::Config) => Ok(()),
    }
}

/// Log to `rllm.log` in the XDG state directory, or stderr when it cannot be opened.
pub fn init_tracing() -> Result<()> {
    let filter = EnvFilter::try_from_env("RLLM_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_file(true)
        .with_line_number(true);

    let log_file = get_state_file(LOG_FILE_NAME).and_then(|path| {
        std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(anyhow::Error::from)
    });

    let result = match log_file {
        Ok(file) => builder.with_writer(Arc::new(file)).try_init(),
        Err(_) => builder.with_writer(std::io::stderr).try_init(),
    };
    result.map_err(|e| anyhow!("failed to initialize tracing: {}", e))
}

pub fn setup_panic_handler() {
    std::panic::set_hook(Box::new(|panic_info| {
        let thread = std::thread::current();
        let thread_name = thread.name().unwrap_or("unnamed");

        let payload = if let Some(s) = panic_info.payload().downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = panic_info.payload().downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic payload".to_string()
        };

        let location = panic_info.location().map_or_else(
            || "Unknown location".to_string(),
            |location| format!("{}:{}:{}", location.file(), location.line(), location.column()),
        );

        let backtrace = std::backtrace::Backtrace::capture();
        let backtrace_str = match backtrace.status() {
            std::backtrace::BacktraceStatus::Captured => format!("\nBacktrace:\n{backtrace}"),
            std::backtrace::BacktraceStatus::Disabled => {
                "\nBacktrace: disabled (set RUST_BACKTRACE=1 to enable)".to_string()
            }
            _ => "\nBacktrace: unavailable".to_string(),
        };

        let timestamp = chrono::Utc::now().format("%Y-%m-%d %H:%M:%S%.3f UTC");
        let panic_log = format!(
            "\n=== PANIC OCCURRED ===\n\
            Timestamp: {timestamp}\n\
            Thread: {thread_name}\n\
            Location: {location}\n\
            Message: {payload}{backtrace_str}\n\
            ======================\n"
        );

        if let Ok(path) = get_state_file(LOG_FILE_NAME)
            && let Ok(mut file) = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
        {
            use std::io::Write;
            let _ = file.write_all(panic_log.as_bytes());
        }

        tracing::error!("panic in thread '{}' at {}: {}", thread_name, location, payload);
        eprintln!("rllm: internal error at {}: {}", location, payload);
    }));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_ask() {
        let cli = Cli::parse_from(["rllm", "ask", "list", "hidden", "files", "--json"]);
        match cli.command {
            Some(Command::Ask {
                query,
                no_context,
                json,
            }) => {
                assert_eq!(query.join(" "), "list hidden files");
                assert!(!no_context);
                assert!(json);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_cli_parses_export_format() {
        let cli = Cli::parse_from(["rllm", "export", "--format", "script", "-o", "out.sh"]);
        match cli.command {
            Some(Command::Export { format, output }) => {
                assert_eq!(format, ExportFormat::Script);
                assert_eq!(output, Some(PathBuf::from("out.sh")));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_cli_defaults_to_interactive() {
        let cli = Cli::parse_from(["rllm"]);
        assert!(cli.command.is_none());
        assert!(Cli::try_parse_from(["rllm", "ask"]).is_err());
    }
}
