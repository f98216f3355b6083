use anyhow::{Context, Result, anyhow};
use reqwest::{Client, RequestBuilder};
use serde_json::{Value, json};
use std::time::Duration;
use tracing::debug;

use crate::config::OpenAiConfig;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(60);

/// Upper bound on generated tokens; a single command suggestion is short.
const MAX_TOKENS: u32 = 1000;

#[derive(Debug, Clone)]
pub struct ChatGptClient {
    api_key: String,
    default_model: String,
    chat_endpoint: String,
    http: Client,
}

impl ChatGptClient {
    pub fn new(api_key: String) -> Result<Self> {
        Self::new_with_settings(api_key, None, None)
    }

    pub fn new_with_settings(
        api_key: String,
        model: Option<String>,
        base_url: Option<String>,
    ) -> Result<Self> {
        let config = OpenAiConfig::new(Some(api_key), base_url, model);
        Self::try_from_config(&config)
    }

    pub fn try_from_config(config: &OpenAiConfig) -> Result<Self> {
        let api_key = config
            .api_key()
            .ok_or_else(|| anyhow!("OpenAI-compatible API key is not configured"))?;

        Ok(Self {
            api_key: api_key.to_string(),
            default_model: config.default_model().to_string(),
            chat_endpoint: config.chat_endpoint(),
            http: Self::build_client()?,
        })
    }

    pub fn default_model(&self) -> &str {
        &self.default_model
    }

    /// Send a chat request and return the first choice's message content.
    pub async fn send_chat(
        &self,
        messages: Vec<Value>,
        temperature: Option<f64>,
        model: Option<String>,
    ) -> Result<String> {
        let data = self
            .send_chat_request(messages, temperature, model)
            .await?;
        let output = data["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| anyhow!("Unexpected response {data}"))?;

        Ok(output.trim().to_string())
    }

    /// Send a single user message with an optional system prompt.
    pub async fn send_message(
        &self,
        input: &str,
        prompt: Option<String>,
        temperature: Option<f64>,
    ) -> Result<String> {
        let messages = Self::build_messages(input, prompt);
        self.send_chat(messages, temperature, None).await
    }

    pub async fn send_chat_request(
        &self,
        messages: Vec<Value>,
        temperature: Option<f64>,
        model: Option<String>,
    ) -> Result<Value> {
        let builder = self.request_builder_from_messages(messages, temperature, model);

        let res = builder.send().await.context("chat request failed")?;
        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(anyhow!("chat endpoint returned {status}: {body}"));
        }
        let data: Value = res.json().await.context("chat response was not JSON")?;
        Ok(data)
    }

    fn build_client() -> Result<Client> {
        let client = Client::builder().timeout(CONNECT_TIMEOUT).build()?;
        Ok(client)
    }

    fn request_builder_from_messages(
        &self,
        messages: Vec<Value>,
        temperature: Option<f64>,
        model: Option<String>,
    ) -> RequestBuilder {
        // Use provided model or fall back to default
        let selected_model = model.unwrap_or_else(|| self.default_model.clone());

        let mut body = json!({
            "model": selected_model,
            "messages": messages,
            "max_tokens": MAX_TOKENS,
        });

        if let Some(v) = temperature
            && let Some(map) = body.as_object_mut()
        {
            map.insert("temperature".into(), json!(v));
        }

        debug!("req: {:?}", body);

        let header_value = format!("Bearer {}", &self.api_key);
        self.http
            .post(&self.chat_endpoint)
            .header("Authorization", header_value)
            .json(&body)
    }

    pub fn build_messages(content: &str, prompt: Option<String>) -> Vec<Value> {
        let mut messages = Vec::new();
        if let Some(prompt) = prompt
            && !prompt.trim().is_empty()
        {
            messages.push(json!({ "role": "system", "content": prompt.trim() }));
        }
        messages.push(json!({ "role": "user", "content": content }));
        messages
    }
}
