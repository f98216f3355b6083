use rllm_types::RequestContext;

/// Number of previous commands included in the context message.
pub const CONTEXT_COMMAND_LIMIT: usize = 3;

pub const SYSTEM_PROMPT: &str = r#"You translate natural language requests into a single shell command.

Respond with JSON only, using exactly this shape:
{
  "command": "the shell command",
  "explanation": "what the command does, in one or two sentences",
  "risk_level": "low" | "medium" | "high" | "critical",
  "confidence": 0.0 to 1.0,
  "alternatives": ["other commands that achieve the same"],
  "warnings": ["anything the user must know before running it"]
}

Risk levels:
- low: read-only or easily undone
- medium: modifies files or processes in a recoverable way
- high: deletes data, changes permissions or system configuration
- critical: can destroy a system or large amounts of data

Prefer portable POSIX commands. Never chain unrelated commands. If the request is ambiguous, choose the safest interpretation and say so in warnings."#;

/// Render the request context as the lines sent ahead of the intent.
pub fn format_context(context: &RequestContext) -> String {
    let mut lines = Vec::new();
    if let Some(dir) = &context.current_directory {
        lines.push(format!("Current directory: {}", dir));
    }
    if let Some(os) = &context.os_info {
        lines.push(format!("Operating system: {}", os));
    }
    if let Some(shell) = &context.shell {
        lines.push(format!("Shell: {}", shell));
    }
    if !context.previous_commands.is_empty() {
        let start = context
            .previous_commands
            .len()
            .saturating_sub(CONTEXT_COMMAND_LIMIT);
        lines.push(format!(
            "Recent commands: {}",
            context.previous_commands[start..].join("; ")
        ));
    }
    lines.join("\n")
}

/// User message combining context and intent.
pub fn user_message(intent: &str, context: &RequestContext) -> String {
    let context = format_context(context);
    if context.is_empty() {
        format!("Request: {}", intent)
    } else {
        format!("{}\n\nRequest: {}", context, intent)
    }
}
