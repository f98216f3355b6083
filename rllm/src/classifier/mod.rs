//! Rule-based intent classifier.
//!
//! Maps a free-text request to a [`CommandDraft`] without any network access.
//!
//! - `rules`: the ordered rule table and its matchers

pub mod rules;


use rllm_types::{CommandDraft, RiskLevel};
use rules::{DEFAULT_RULES, Rule};
use thiserror::Error;
use tracing::{debug, warn};

/// Command returned when no rule applies.
pub const UNRECOGNIZED_COMMAND: &str = "# rllm: unrecognized request";
pub const UNRECOGNIZED_WARNING: &str =
    "Request could not be classified; describe the task more specifically";
pub const EMPTY_PROMPT_PLACEHOLDER: &str = "(empty request)";
const FALLBACK_CONFIDENCE: f64 = 0.1;
const DEFAULT_TARGET_PENALTY: f64 = 0.2;
const MIN_RULE_CONFIDENCE: f64 = 0.1;

/// Internal failure while turning a matched rule into a draft.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ClassifyFault {
    #[error("rule '{0}' needs a target but none was found")]
    MissingTarget(&'static str),
    #[error("rule '{0}' captured a range outside the request")]
    InvalidCapture(&'static str),
    #[error("rule '{0}' produced an empty command")]
    EmptyCommand(&'static str),
}

#[derive(Debug, Clone)]
pub struct IntentClassifier {
    rules: Vec<Rule>,
}

impl Default for IntentClassifier {
    fn default() -> Self {
        Self {
            rules: DEFAULT_RULES.clone(),
        }
    }
}

impl IntentClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rules(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Classify `raw`. Never fails: an unknown request or an internal fault
    /// yields the medium-risk fallback draft.
    pub fn classify(&self, raw: &str) -> CommandDraft {
        match self.try_classify(raw) {
            Ok(Some(draft)) => draft,
            Ok(None) => {
                debug!("no rule matched request");
                fallback_draft(raw, UNRECOGNIZED_WARNING)
            }
            Err(fault) => {
                warn!("classifier fault: {}", fault);
                fallback_draft(raw, &format!("Classifier fault: {fault}"))
            }
        }
    }

    fn try_classify(&self, raw: &str) -> Result<Option<CommandDraft>, ClassifyFault> {
        let input = raw.trim();
        if input.is_empty() {
            return Ok(None);
        }
        let normalized = input.to_lowercase();
        let words: Vec<&str> = normalized
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .collect();

        for rule in &self.rules {
            let Some(capture) = rule.matches(&normalized, &words) else {
                continue;
            };
            debug!("request matched rule {}", rule.name);

            let captured = match capture.target {
                Some(range) => {
                    let text = original_slice(input, &normalized, range)
                        .ok_or(ClassifyFault::InvalidCapture(rule.name))?;
                    clean_target(text)
                }
                None => None,
            };
            return build_draft(rule, input, captured).map(Some);
        }
        Ok(None)
    }
}

/// Draft returned when classification is impossible.
pub fn fallback_draft(raw: &str, warning: &str) -> CommandDraft {
    let prompt = match raw.trim() {
        "" => EMPTY_PROMPT_PLACEHOLDER.to_string(),
        trimmed => trimmed.to_string(),
    };
    CommandDraft {
        prompt,
        command: UNRECOGNIZED_COMMAND.to_string(),
        explanation: "The request did not match any known command pattern.".to_string(),
        risk_level: RiskLevel::Medium,
        confidence: Some(FALLBACK_CONFIDENCE),
        alternatives: Vec::new(),
        warnings: vec![warning.to_string()],
    }
}

pub fn is_fallback(draft: &CommandDraft) -> bool {
    draft.command == UNRECOGNIZED_COMMAND
}

fn build_draft(
    rule: &Rule,
    input: &str,
    captured: Option<String>,
) -> Result<CommandDraft, ClassifyFault> {
    let mut confidence = rule.confidence;
    let mut warnings: Vec<String> = rule.warnings.iter().map(|w| w.to_string()).collect();

    let target = match (captured, rule.needs_target()) {
        (Some(target), _) => Some(shell_quote(&target)),
        (None, false) => None,
        (None, true) => {
            let default = rule
                .default_target
                .ok_or(ClassifyFault::MissingTarget(rule.name))?;
            confidence = (confidence - DEFAULT_TARGET_PENALTY).max(MIN_RULE_CONFIDENCE);
            warnings.push(format!(
                "No target named in the request; replace '{default}' before running"
            ));
            Some(shell_quote(default))
        }
    };

    let command = render(rule.command, input, target.as_deref());
    if command.trim().is_empty() || command.contains("{target}") {
        return Err(ClassifyFault::EmptyCommand(rule.name));
    }

    Ok(CommandDraft {
        prompt: input.to_string(),
        command,
        explanation: render(rule.explanation, input, target.as_deref()),
        risk_level: rule.risk_level,
        confidence: Some(confidence),
        alternatives: rule
            .alternatives
            .iter()
            .map(|alt| render(alt, input, target.as_deref()))
            .collect(),
        warnings,
    })
}

fn render(template: &str, input: &str, target: Option<&str>) -> String {
    let mut out = template.replace("{input}", input);
    if let Some(target) = target {
        out = out.replace("{target}", target);
    }
    out
}

/// Take the capture from the original text so case is preserved, when the
/// lowercase form kept every character at the same byte offset.
fn original_slice<'a>(
    input: &'a str,
    normalized: &'a str,
    range: std::ops::Range<usize>,
) -> Option<&'a str> {
    if same_byte_layout(input, normalized)
        && let Some(text) = input.get(range.clone())
    {
        return Some(text);
    }
    normalized.get(range)
}

fn same_byte_layout(a: &str, b: &str) -> bool {
    a.len() == b.len()
        && a.chars().count() == b.chars().count()
        && a.chars()
            .zip(b.chars())
            .all(|(x, y)| x.len_utf8() == y.len_utf8())
}

fn clean_target(text: &str) -> Option<String> {
    let trimmed = text
        .trim()
        .trim_end_matches(['.', ',', '?', '!', ';', ':'])
        .trim_matches(['"', '\'']);
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Quote `value` for a POSIX shell unless it consists of safe characters only.
pub fn shell_quote(value: &str) -> String {
    let safe = value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || "_-./:~@%+=,".contains(c));
    if safe && !value.is_empty() {
        value.to_string()
    } else {
        format!("'{}'", value.replace('\'', r"'\''"))
    }
}
