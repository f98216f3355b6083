//! Command generators.
//!
//! A generator turns a [`ClassificationRequest`] into a
//! [`ClassificationResponse`]. Two implementations exist:
//!
//! - [`RuleGenerator`] - the offline rule table, never fails
//! - [`LiveAiService`] - an OpenAI-compatible chat backend whose answers go
//!   through the safety review
//!
//! # Module Structure
//!
//! - [`service`] - backend trait and the live generator
//! - [`prompt`] - system prompt and context message
//! - [`response`] - lenient parsing of backend answers

mod prompt;
mod response;
mod service;


pub use prompt::{CONTEXT_COMMAND_LIMIT, SYSTEM_PROMPT, format_context};
pub use response::{FALLBACK_PARSE_WARNING, parse_response};
pub use service::{AiService, LiveAiService};

use crate::classifier::IntentClassifier;
use anyhow::Result;
use async_trait::async_trait;
use rllm_types::{ClassificationRequest, ClassificationResponse};

#[async_trait]
pub trait CommandGenerator: Send + Sync {
    async fn generate(&self, request: &ClassificationRequest) -> Result<ClassificationResponse>;

    /// Short name used in logs and `rllm config`.
    fn name(&self) -> &'static str;
}

/// Generator backed by the local rule table.
#[derive(Debug, Clone, Default)]
pub struct RuleGenerator {
    classifier: IntentClassifier,
}

impl RuleGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_classifier(classifier: IntentClassifier) -> Self {
        Self { classifier }
    }
}

#[async_trait]
impl CommandGenerator for RuleGenerator {
    async fn generate(&self, request: &ClassificationRequest) -> Result<ClassificationResponse> {
        Ok(self.classifier.classify(&request.intent).to_response())
    }

    fn name(&self) -> &'static str {
        "rules"
    }
}

/// Strip Markdown code fences around a backend answer.
pub fn sanitize_code_block(content: &str) -> String {
    let content = content.trim().trim_matches(|c| c == '`');
    let content = ["json\n", "bash\n", "sh\n", "shell\n"]
        .iter()
        .find_map(|tag| content.strip_prefix(tag))
        .unwrap_or(content);
    content.trim().to_string()
}
