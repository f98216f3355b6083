//! AI backend trait and the live command generator.

use super::prompt::{SYSTEM_PROMPT, user_message};
use super::response::parse_response;
use super::CommandGenerator;
use crate::safety::{SafetyGuard, SafetyLevel, check_prompt_injection};
use anyhow::{Context as _, Result};
use async_trait::async_trait;
use rllm_openai::ChatGptClient;
use rllm_types::{ClassificationRequest, ClassificationResponse};
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// Core AI service trait for sending requests to AI backends.
#[async_trait]
pub trait AiService: Send + Sync {
    /// Send chat messages and return the answer text.
    async fn send_request(&self, messages: Vec<Value>, temperature: Option<f64>) -> Result<String>;
}

#[async_trait]
impl AiService for ChatGptClient {
    async fn send_request(&self, messages: Vec<Value>, temperature: Option<f64>) -> Result<String> {
        self.send_chat(messages, temperature, None).await
    }
}

/// Generator that asks an AI backend and reviews the suggested command.
pub struct LiveAiService {
    service: Arc<dyn AiService>,
    guard: Arc<SafetyGuard>,
    safety_level: SafetyLevel,
    temperature: Option<f64>,
}

impl LiveAiService {
    pub fn new(service: Arc<dyn AiService>, safety_level: SafetyLevel) -> Self {
        Self {
            service,
            guard: Arc::new(SafetyGuard::new()),
            safety_level,
            temperature: None,
        }
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_guard(mut self, guard: Arc<SafetyGuard>) -> Self {
        self.guard = guard;
        self
    }

    pub fn safety_level(&self) -> SafetyLevel {
        self.safety_level
    }

    fn review(&self, mut response: ClassificationResponse) -> ClassificationResponse {
        let review = self.guard.review(self.safety_level, &response.command);
        let reported = response.risk_level;
        response.risk_level = review.escalate(reported);
        if response.risk_level != reported {
            debug!(
                "safety review raised risk from {} to {}",
                reported, response.risk_level
            );
        }
        for warning in review.warnings {
            if !response.warnings.contains(&warning) {
                response.warnings.push(warning);
            }
        }
        response
    }
}

#[async_trait]
impl CommandGenerator for LiveAiService {
    async fn generate(&self, request: &ClassificationRequest) -> Result<ClassificationResponse> {
        let injection = check_prompt_injection(&request.intent);

        let content = user_message(&request.intent, &request.context);
        let messages = ChatGptClient::build_messages(&content, Some(SYSTEM_PROMPT.to_string()));
        let answer = self
            .service
            .send_request(messages, self.temperature)
            .await
            .context("AI backend request failed")?;
        debug!("backend answer: {}", answer);

        let mut response = self.review(parse_response(&answer)?);
        if let Some(phrase) = injection {
            response.warnings.push(format!(
                "Request contains instruction-like text ({:?}); verify the command carefully",
                phrase
            ));
        }
        Ok(response)
    }

    fn name(&self) -> &'static str {
        "openai"
    }
}
