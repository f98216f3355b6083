//! Persisted snapshot format: a JSON array of command entries.
//!
//! Parsing goes through [`serde_json::Value`] so every field is checked
//! explicitly and a single bad entry rejects the whole snapshot.

use rllm_types::{CommandEntry, EntryId, RiskLevel, RllmError, RllmResult, parse_timestamp};
use serde_json::{Map, Value};

pub fn render_snapshot(entries: &[CommandEntry]) -> RllmResult<String> {
    Ok(serde_json::to_string_pretty(entries)?)
}

pub fn parse_snapshot(json: &str) -> RllmResult<Vec<CommandEntry>> {
    let value: Value = serde_json::from_str(json)
        .map_err(|e| RllmError::Validation(format!("snapshot is not valid JSON: {}", e)))?;
    let Value::Array(items) = value else {
        return Err(RllmError::Validation(
            "snapshot must be a JSON array of entries".to_string(),
        ));
    };

    let mut entries: Vec<CommandEntry> = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        let entry = parse_entry(item).map_err(|reason| {
            RllmError::Validation(format!("entry {}: {}", index, reason))
        })?;
        if let Some(prev) = entries.last()
            && entry.id <= prev.id
        {
            return Err(RllmError::Validation(format!(
                "entry {}: id {} is not greater than previous id {}",
                index, entry.id, prev.id
            )));
        }
        entries.push(entry);
    }
    Ok(entries)
}

fn parse_entry(item: &Value) -> Result<CommandEntry, String> {
    let obj = item.as_object().ok_or("not a JSON object")?;

    let id = field(obj, "id")?
        .as_u64()
        .ok_or("'id' must be a non-negative integer")?;
    if id == u64::MAX {
        return Err(format!("id {} is out of range", id));
    }
    let prompt = non_empty_string(obj, "prompt")?;
    let command = non_empty_string(obj, "command")?;
    let explanation = field(obj, "explanation")?
        .as_str()
        .ok_or("'explanation' must be a string")?
        .to_string();

    let risk_raw = field(obj, "risk_level")?
        .as_str()
        .ok_or("'risk_level' must be a string")?;
    let risk_level = RiskLevel::ALL
        .into_iter()
        .find(|level| level.as_str() == risk_raw)
        .ok_or_else(|| format!("unknown risk_level {:?}", risk_raw))?;

    let confidence = match obj.get("confidence") {
        None | Some(Value::Null) => None,
        Some(value) => {
            let c = value.as_f64().ok_or("'confidence' must be a number")?;
            if !(0.0..=1.0).contains(&c) {
                return Err(format!("confidence {} is outside [0, 1]", c));
            }
            Some(c)
        }
    };

    let alternatives = string_list(obj, "alternatives")?;
    let warnings = string_list(obj, "warnings")?;

    let ts_raw = field(obj, "timestamp")?
        .as_str()
        .ok_or("'timestamp' must be a string")?;
    let timestamp =
        parse_timestamp(ts_raw).ok_or_else(|| format!("unparseable timestamp {:?}", ts_raw))?;

    let executed = field(obj, "executed")?
        .as_bool()
        .ok_or("'executed' must be a boolean")?;

    Ok(CommandEntry {
        id: EntryId(id),
        prompt,
        command,
        explanation,
        risk_level,
        confidence,
        alternatives,
        warnings,
        timestamp,
        executed,
    })
}

fn field<'a>(obj: &'a Map<String, Value>, name: &str) -> Result<&'a Value, String> {
    obj.get(name)
        .ok_or_else(|| format!("missing field '{}'", name))
}

fn non_empty_string(obj: &Map<String, Value>, name: &str) -> Result<String, String> {
    let value = field(obj, name)?
        .as_str()
        .ok_or_else(|| format!("'{}' must be a string", name))?;
    if value.trim().is_empty() {
        return Err(format!("'{}' must not be empty", name));
    }
    Ok(value.to_string())
}

fn string_list(obj: &Map<String, Value>, name: &str) -> Result<Vec<String>, String> {
    field(obj, name)?
        .as_array()
        .ok_or_else(|| format!("'{}' must be an array", name))?
        .iter()
        .map(|v| {
            v.as_str()
                .map(str::to_string)
                .ok_or_else(|| format!("'{}' must contain only strings", name))
        })
        .collect()
}
