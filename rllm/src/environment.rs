//! Runtime settings and XDG paths.
//!
//! Settings are layered: built-in defaults, then `config.toml` in the XDG
//! config directory, then environment variables.

use crate::safety::SafetyLevel;
use anyhow::Context as _;
use anyhow::Result;
use rllm_openai::OpenAiConfig;
use rllm_types::{RllmError, RllmResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

pub const APP_NAME: &str = "rllm";
pub const CONFIG_FILE_NAME: &str = "config.toml";
pub const LOG_FILE_NAME: &str = "rllm.log";

pub const DEFAULT_MAX_QUERY_LENGTH: usize = 500;
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_MAX_CONTEXT_COMMANDS: usize = 5;
pub const DEFAULT_HISTORY_KEY: &str = "history";

const MIN_QUERY_LENGTH: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// Offline rule table.
    #[default]
    Rules,
    /// OpenAI-compatible chat completions backend.
    OpenAi,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Rules => "rules",
            Provider::OpenAi => "openai",
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "rules" | "local" | "offline" => Ok(Provider::Rules),
            "openai" | "ai" => Ok(Provider::OpenAi),
            _ => Err(format!(
                "Invalid provider: {}. Valid providers are: rules, openai",
                s
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub provider: Provider,
    pub safety_level: SafetyLevel,
    pub max_query_length: usize,
    pub request_timeout_secs: u64,
    pub max_context_commands: usize,
    pub history_key: String,
    pub openai: OpenAiConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            provider: Provider::default(),
            safety_level: SafetyLevel::default(),
            max_query_length: DEFAULT_MAX_QUERY_LENGTH,
            request_timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_context_commands: DEFAULT_MAX_CONTEXT_COMMANDS,
            history_key: DEFAULT_HISTORY_KEY.to_string(),
            openai: OpenAiConfig::new(None, None, None),
        }
    }
}

/// Keys accepted in `config.toml`; every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileSettings {
    provider: Option<String>,
    safety_level: Option<String>,
    max_query_length: Option<usize>,
    request_timeout_secs: Option<u64>,
    max_context_commands: Option<usize>,
    history_key: Option<String>,
}

impl Settings {
    /// Defaults, then the XDG config file when present, then the process environment.
    pub fn load() -> RllmResult<Self> {
        let mut settings = Settings::default();
        match get_config_file(CONFIG_FILE_NAME) {
            Ok(path) if path.exists() => settings.apply_file(&path)?,
            Ok(_) => {}
            Err(err) => debug!("no config directory: {:?}", err),
        }
        settings.apply_env(|key| std::env::var(key).ok())?;
        settings.validate()?;
        Ok(settings)
    }

    /// Defaults overridden by values from `getter`.
    pub fn from_getter(getter: impl FnMut(&str) -> Option<String>) -> RllmResult<Self> {
        let mut settings = Settings::default();
        settings.apply_env(getter)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn apply_file(&mut self, path: &Path) -> RllmResult<()> {
        let content = std::fs::read_to_string(path)?;
        self.apply_toml(&content)
            .map_err(|e| RllmError::Config(format!("{}: {}", path.display(), e)))
    }

    pub fn apply_toml(&mut self, content: &str) -> RllmResult<()> {
        let file: FileSettings =
            toml::from_str(content).map_err(|e| RllmError::Config(e.to_string()))?;

        if let Some(provider) = file.provider {
            self.provider = provider.parse().map_err(RllmError::Config)?;
        }
        if let Some(level) = file.safety_level {
            self.safety_level = level.parse().map_err(RllmError::Config)?;
        }
        if let Some(value) = file.max_query_length {
            self.max_query_length = value;
        }
        if let Some(value) = file.request_timeout_secs {
            self.request_timeout_secs = value;
        }
        if let Some(value) = file.max_context_commands {
            self.max_context_commands = value;
        }
        if let Some(key) = file.history_key {
            self.history_key = key;
        }
        Ok(())
    }

    pub fn apply_env(&mut self, mut getter: impl FnMut(&str) -> Option<String>) -> RllmResult<()> {
        if let Some(value) = getter("RLLM_PROVIDER") {
            self.provider = value.parse().map_err(RllmError::Config)?;
        }
        if let Some(value) = getter("RLLM_SAFETY_LEVEL") {
            self.safety_level = value.parse().map_err(RllmError::Config)?;
        }
        if let Some(value) = getter("RLLM_MAX_QUERY_LENGTH") {
            self.max_query_length = parse_number("RLLM_MAX_QUERY_LENGTH", &value)?;
        }
        if let Some(value) = getter("RLLM_TIMEOUT") {
            self.request_timeout_secs = parse_number("RLLM_TIMEOUT", &value)?;
        }
        if let Some(value) = getter("RLLM_MAX_CONTEXT") {
            self.max_context_commands = parse_number("RLLM_MAX_CONTEXT", &value)?;
        }
        if let Some(value) = getter("RLLM_HISTORY_KEY") {
            self.history_key = value;
        }
        self.openai = OpenAiConfig::from_getter(getter);
        Ok(())
    }

    /// Reject out-of-range values, listing every problem at once.
    pub fn validate(&self) -> RllmResult<()> {
        let mut issues = Vec::new();
        if self.max_query_length < MIN_QUERY_LENGTH {
            issues.push(format!(
                "max_query_length must be at least {}",
                MIN_QUERY_LENGTH
            ));
        }
        if self.request_timeout_secs == 0 {
            issues.push("request_timeout_secs must be at least 1".to_string());
        }
        if self.max_context_commands == 0 {
            issues.push("max_context_commands must be at least 1".to_string());
        }
        if self.history_key.is_empty()
            || !self
                .history_key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            issues.push(format!(
                "history_key must be non-empty and contain only letters, digits, '-' or '_' (got {:?})",
                self.history_key
            ));
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(RllmError::Config(issues.join("; ")))
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// The provider actually used: `openai` without an API key falls back to rules.
    pub fn effective_provider(&self) -> Provider {
        if self.provider == Provider::OpenAi && !self.openai.is_configured() {
            warn!("openai provider selected but no API key is configured; using rules");
            return Provider::Rules;
        }
        self.provider
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> RllmResult<T> {
    value
        .trim()
        .parse()
        .map_err(|_| RllmError::Config(format!("{} must be a number (got {:?})", key, value)))
}

/// Get the path to a configuration file.
pub fn get_config_file(name: &str) -> Result<PathBuf> {
    let xdg_dir =
        xdg::BaseDirectories::with_prefix(APP_NAME).context("failed get xdg directory")?;
    Ok(xdg_dir.get_config_home().join(name))
}

/// Directory holding persisted key-value files.
pub fn get_data_dir() -> Result<PathBuf> {
    let xdg_dir =
        xdg::BaseDirectories::with_prefix(APP_NAME).context("failed get xdg directory")?;
    xdg_dir.create_data_directory("").context("failed get path")
}

/// Get the path to a state file (e.g. logs).
pub fn get_state_file(name: &str) -> Result<PathBuf> {
    let xdg_dir =
        xdg::BaseDirectories::with_prefix(APP_NAME).context("failed get xdg directory")?;
    xdg_dir.place_state_file(name).context("failed get path")
}
