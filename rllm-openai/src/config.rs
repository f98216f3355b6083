use std::fmt;

const CHAT_COMPLETIONS_PATH: &str = "chat/completions";

/// Default base URL for OpenAI-compatible APIs.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1/";

/// Default model used when none is provided.
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Low temperature keeps command suggestions deterministic.
pub const DEFAULT_TEMPERATURE: f64 = 0.1;

#[derive(Clone, PartialEq)]
pub struct OpenAiConfig {
    api_key: Option<String>,
    base_url: String,
    default_model: String,
    temperature: f64,
}

impl OpenAiConfig {
    pub fn new(
        api_key: Option<String>,
        base_url: Option<String>,
        default_model: Option<String>,
    ) -> Self {
        let api_key = api_key.filter(|key| !key.trim().is_empty());
        let base_url = sanitize_base_url(base_url);
        let default_model = default_model
            .filter(|model| !model.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());

        Self {
            api_key,
            base_url,
            default_model,
            temperature: DEFAULT_TEMPERATURE,
        }
    }

    /// Resolve the backend settings through `getter`, usually `std::env::var(..).ok()`.
    pub fn from_getter(mut getter: impl FnMut(&str) -> Option<String>) -> Self {
        let api_key = getter("AI_CHAT_API_KEY")
            .or_else(|| getter("OPENAI_API_KEY"))
            .or_else(|| getter("OPEN_AI_API_KEY"));

        let base_url = getter("AI_CHAT_BASE_URL").or_else(|| getter("OPENAI_BASE_URL"));

        let default_model = getter("AI_CHAT_MODEL").or_else(|| getter("OPENAI_MODEL"));

        let temperature = getter("RLLM_TEMPERATURE")
            .and_then(|raw| raw.trim().parse::<f64>().ok())
            .filter(|t| (0.0..=2.0).contains(t));

        let config = OpenAiConfig::new(api_key, base_url, default_model);
        match temperature {
            Some(t) => config.with_temperature(t),
            None => config,
        }
    }

    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref()
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    pub fn default_model(&self) -> &str {
        &self.default_model
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn temperature(&self) -> f64 {
        self.temperature
    }

    pub fn chat_endpoint(&self) -> String {
        build_chat_endpoint(&self.base_url)
    }

    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key.filter(|key| !key.trim().is_empty());
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }
}

impl fmt::Debug for OpenAiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("default_model", &self.default_model)
            .field("temperature", &self.temperature)
            .finish()
    }
}

fn sanitize_base_url(base_url: Option<String>) -> String {
    base_url
        .and_then(|value| {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.trim_end_matches('/').to_string())
            }
        })
        .unwrap_or_else(|| DEFAULT_BASE_URL.trim_end_matches('/').to_string())
}

fn build_chat_endpoint(base_url: &str) -> String {
    let trimmed = base_url.trim_end_matches('/');
    if trimmed.ends_with(CHAT_COMPLETIONS_PATH) {
        trimmed.to_string()
    } else {
        format!("{trimmed}/{CHAT_COMPLETIONS_PATH}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_when_nothing_is_set() {
        let cfg = OpenAiConfig::from_getter(|_| None);
        assert_eq!(cfg.base_url(), "https://api.openai.com/v1");
        assert_eq!(cfg.default_model(), DEFAULT_MODEL);
        assert_eq!(cfg.temperature(), DEFAULT_TEMPERATURE);
        assert!(!cfg.is_configured());
    }

    #[test]
    fn chat_endpoint_is_appended_once() {
        let cfg = OpenAiConfig::new(
            None,
            Some("https://example.com/v1/chat/completions".to_string()),
            None,
        );
        assert_eq!(
            cfg.chat_endpoint(),
            "https://example.com/v1/chat/completions"
        );

        let cfg = OpenAiConfig::new(None, Some("https://example.com/v1/".to_string()), None);
        assert_eq!(
            cfg.chat_endpoint(),
            "https://example.com/v1/chat/completions"
        );
    }

    #[test]
    fn primary_keys_win_over_legacy_keys() {
        let getter = |key: &str| match key {
            "AI_CHAT_API_KEY" => Some("primary".to_string()),
            "OPENAI_API_KEY" => Some("legacy".to_string()),
            "OPENAI_MODEL" => Some("gpt-4".to_string()),
            "RLLM_TEMPERATURE" => Some("0.4".to_string()),
            _ => None,
        };

        let cfg = OpenAiConfig::from_getter(getter);

        assert_eq!(cfg.api_key(), Some("primary"));
        assert_eq!(cfg.default_model(), "gpt-4");
        assert_eq!(cfg.temperature(), 0.4);
    }

    #[test]
    fn blank_api_key_counts_as_missing() {
        let cfg = OpenAiConfig::from_getter(|key| {
            (key == "OPENAI_API_KEY").then(|| "   ".to_string())
        });
        assert!(!cfg.is_configured());
    }

    #[test]
    fn out_of_range_temperature_is_ignored() {
        let cfg = OpenAiConfig::from_getter(|key| {
            (key == "RLLM_TEMPERATURE").then(|| "7".to_string())
        });
        assert_eq!(cfg.temperature(), DEFAULT_TEMPERATURE);
    }

    #[test]
    fn debug_output_redacts_api_key() {
        let cfg = OpenAiConfig::new(Some("sk-secret".to_string()), None, None);
        let rendered = format!("{cfg:?}");
        assert!(!rendered.contains("sk-secret"));
        assert!(rendered.contains("<redacted>"));
    }
}
