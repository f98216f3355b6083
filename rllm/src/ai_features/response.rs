use super::sanitize_code_block;
use anyhow::{Result, bail};
use rllm_types::{ClassificationResponse, RiskLevel, clamp_confidence};
use serde_json::{Map, Value};
use tracing::{debug, warn};

pub const FALLBACK_PARSE_WARNING: &str = "Fallback parsing used - please verify command";
const FALLBACK_PARSE_CONFIDENCE: f64 = 0.6;

/// Parse a backend answer.
///
/// JSON answers are read field by field; anything else is reduced to its
/// first non-comment line, flagged with [`FALLBACK_PARSE_WARNING`].
pub fn parse_response(content: &str) -> Result<ClassificationResponse> {
    let cleaned = sanitize_code_block(content);
    if let Some(obj) = find_json_object(&cleaned) {
        return from_json(&obj);
    }
    debug!("backend answer is not JSON, using line fallback");
    from_text(&cleaned)
}

fn find_json_object(text: &str) -> Option<Map<String, Value>> {
    if let Ok(Value::Object(obj)) = serde_json::from_str::<Value>(text) {
        return Some(obj);
    }
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    match serde_json::from_str::<Value>(&text[start..=end]) {
        Ok(Value::Object(obj)) => Some(obj),
        _ => None,
    }
}

fn from_json(obj: &Map<String, Value>) -> Result<ClassificationResponse> {
    let command = obj
        .get("command")
        .and_then(Value::as_str)
        .map(str::trim)
        .unwrap_or_default();
    if command.is_empty() {
        bail!("backend response has no command");
    }

    let mut warnings = string_list(obj.get("warnings"));
    let risk_level = match obj.get("risk_level").and_then(Value::as_str) {
        Some(raw) => match raw.parse::<RiskLevel>() {
            Ok(level) => level,
            Err(_) => {
                warn!("backend returned unknown risk level {:?}", raw);
                warnings.push(format!(
                    "Backend returned unknown risk level '{}'; treated as medium",
                    raw
                ));
                RiskLevel::Medium
            }
        },
        None => {
            warnings.push("Backend did not report a risk level; treated as medium".to_string());
            RiskLevel::Medium
        }
    };

    Ok(ClassificationResponse {
        command: command.to_string(),
        explanation: obj
            .get("explanation")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .trim()
            .to_string(),
        risk_level,
        confidence: obj
            .get("confidence")
            .and_then(Value::as_f64)
            .map(clamp_confidence),
        alternatives: string_list(obj.get("alternatives")),
        warnings,
    })
}

fn from_text(text: &str) -> Result<ClassificationResponse> {
    let Some(line) = text
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty() && !line.starts_with('#'))
    else {
        bail!("backend response is empty");
    };
    let command = line.strip_prefix("$ ").unwrap_or(line).trim();

    Ok(ClassificationResponse {
        command: command.to_string(),
        explanation: "Command extracted from a free-form backend answer".to_string(),
        risk_level: RiskLevel::Medium,
        confidence: Some(FALLBACK_PARSE_CONFIDENCE),
        alternatives: Vec::new(),
        warnings: vec![FALLBACK_PARSE_WARNING.to_string()],
    })
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}
