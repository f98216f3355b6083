//! Request and response shapes exchanged with classification backends.

use crate::entry::timestamp_format;
use crate::risk::RiskLevel;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationRequest {
    pub intent: String,
    #[serde(default)]
    pub context: RequestContext,
}

impl ClassificationRequest {
    pub fn new(intent: impl Into<String>, context: RequestContext) -> Self {
        Self {
            intent: intent.into(),
            context,
        }
    }
}

/// Environment details forwarded to the backend alongside the intent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_directory: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os_info: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shell: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub previous_commands: Vec<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "optional_timestamp"
    )]
    pub session_start: Option<DateTime<Utc>>,
}

impl RequestContext {
    /// Capture the environment of the running process.
    ///
    /// `session_start` is left unset; the session fills it in.
    pub fn detect(previous_commands: Vec<String>) -> Self {
        let current_directory = std::env::current_dir()
            .ok()
            .map(|dir| dir.display().to_string());
        let shell = std::env::var("SHELL").ok().and_then(|path| {
            std::path::Path::new(&path)
                .file_name()
                .and_then(|name| name.to_str())
                .map(str::to_string)
        });

        Self {
            current_directory,
            os_info: Some(format!(
                "{} {}",
                std::env::consts::OS,
                std::env::consts::ARCH
            )),
            shell,
            previous_commands,
            session_start: None,
        }
    }

    pub fn with_session_start(mut self, start: DateTime<Utc>) -> Self {
        self.session_start = Some(start);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResponse {
    pub command: String,
    pub explanation: String,
    pub risk_level: RiskLevel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub alternatives: Vec<String>,
    #[serde(default)]
    pub warnings: Vec<String>,
}

mod optional_timestamp {
    use super::timestamp_format;
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        value: &Option<DateTime<Utc>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(ts) => timestamp_format::serialize(ts, serializer),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<DateTime<Utc>>, D::Error> {
        #[derive(Deserialize)]
        struct Wrapper(#[serde(with = "timestamp_format")] DateTime<Utc>);

        let value: Option<Wrapper> = Option::deserialize(deserializer)?;
        Ok(value.map(|Wrapper(ts)| ts))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_context_fields_are_optional() {
        let request: ClassificationRequest =
            serde_json::from_str(r#"{"intent": "check disk space"}"#).unwrap();
        assert_eq!(request.intent, "check disk space");
        assert_eq!(request.context, RequestContext::default());

        let request: ClassificationRequest = serde_json::from_str(
            r#"{"intent": "x", "context": {"shell": "zsh", "previous_commands": ["ls"],
                "session_start": "2024-01-02T03:04:05.000Z"}}"#,
        )
        .unwrap();
        assert_eq!(request.context.shell.as_deref(), Some("zsh"));
        assert_eq!(request.context.previous_commands, vec!["ls".to_string()]);
        assert!(request.context.session_start.is_some());
    }

    #[test]
    fn detect_fills_os_and_keeps_commands() {
        let context = RequestContext::detect(vec!["ls".to_string(), "pwd".to_string()]);
        let os = context.os_info.unwrap();
        assert!(os.starts_with(std::env::consts::OS));
        assert_eq!(context.previous_commands, vec!["ls", "pwd"]);
        assert_eq!(context.session_start, None);
    }

    #[test]
    fn response_rejects_unknown_risk_level() {
        let result: Result<ClassificationResponse, _> = serde_json::from_str(
            r#"{"command": "ls", "explanation": "", "risk_level": "severe"}"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn response_defaults_lists() {
        let response: ClassificationResponse = serde_json::from_str(
            r#"{"command": "df -h", "explanation": "disk usage", "risk_level": "low"}"#,
        )
        .unwrap();
        assert!(response.alternatives.is_empty());
        assert!(response.warnings.is_empty());
        assert_eq!(response.confidence, None);
    }
}
