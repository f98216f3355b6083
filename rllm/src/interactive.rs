//! Line-oriented interactive mode.

use crate::commands::{print_entry, print_stats};
use crate::session::Session;
use anyhow::Result;
use console::style;
use rllm_types::{EntryId, RllmError};
use std::io::Write as _;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;

const HELP: &str = "\
Type a request in plain language to get a command suggestion.

  history          show the last suggestions
  stats            show history statistics
  done <id>        mark a suggestion as executed
  context          show the context sent with requests
  help             show this help
  exit, quit       leave interactive mode";

const HISTORY_PREVIEW: usize = 10;

/// What a line of input asks for.
#[derive(Debug, PartialEq, Eq)]
enum Action<'a> {
    Exit,
    Help,
    History,
    Stats,
    Context,
    Executed(Result<u64, &'a str>),
    Submit(&'a str),
    Nothing,
}

fn parse_line(line: &str) -> Action<'_> {
    let line = line.trim();
    match line.to_lowercase().as_str() {
        "" => Action::Nothing,
        "exit" | "quit" | "q" => Action::Exit,
        "help" | "?" => Action::Help,
        "history" => Action::History,
        "stats" => Action::Stats,
        "context" => Action::Context,
        _ => match line.split_once(char::is_whitespace) {
            Some((word, id)) if word.eq_ignore_ascii_case("done") => {
                let id = id.trim();
                Action::Executed(id.parse().map_err(|_| id))
            }
            _ => Action::Submit(line),
        },
    }
}

pub async fn run(session: &Session) -> Result<()> {
    println!(
        "{} ({} generator, safety {}). Type `help` for commands.",
        style("rllm interactive mode").bold(),
        session.generator_name(),
        session.settings().safety_level
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("{} ", style("rllm>").cyan().bold());
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            println!();
            break;
        };

        match parse_line(&line) {
            Action::Nothing => {}
            Action::Exit => break,
            Action::Help => println!("{}", HELP),
            Action::History => {
                let history = session.history();
                if history.is_empty() {
                    println!("No history entries.");
                }
                let start = history.len().saturating_sub(HISTORY_PREVIEW);
                for entry in &history[start..] {
                    let status = if entry.executed { "x" } else { " " };
                    println!(
                        "  [{}] #{:<4} {:<8} {}",
                        status,
                        entry.id,
                        entry.risk_level.presentation().label,
                        entry.command
                    );
                }
            }
            Action::Stats => print_stats(&session.get_statistics()),
            Action::Context => {
                let context = session.context();
                println!("{}", serde_json::to_string_pretty(&context)?);
            }
            Action::Executed(Ok(id)) => match session.mark_executed(EntryId(id)) {
                Ok(entry) => println!("Marked #{} as executed.", entry.id),
                Err(RllmError::NotFound(id)) => println!("No entry with id {}.", id),
                Err(err) => return Err(err.into()),
            },
            Action::Executed(Err(raw)) => println!("Not an entry id: {:?}", raw),
            Action::Submit(request) => {
                debug!("interactive request: {}", request);
                match session.submit(request, session.context()).await {
                    Ok(entry) => print_entry(&entry),
                    Err(RllmError::Superseded) => {}
                    Err(err) => return Err(err.into()),
                }
            }
        }
    }
    println!("Bye.");
    Ok(())
}
