//! A user session: one generator, one history.
//!
//! At most one classification is in flight. A new `submit` supersedes the
//! previous one, whose result is dropped instead of being appended.

use crate::ai_features::{CommandGenerator, LiveAiService, RuleGenerator};
use crate::classifier::{EMPTY_PROMPT_PLACEHOLDER, fallback_draft};
use crate::environment::{Provider, Settings};
use crate::export;
use crate::history::{HistoryStore, Statistics};
use crate::kv::KeyValueStore;
use crate::safety::sanitize_ai_input;
use anyhow::Result;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rllm_openai::ChatGptClient;
use rllm_types::{
    ClassificationRequest, ClassificationResponse, CommandDraft, CommandEntry, EntryId,
    RequestContext, RllmError, RllmResult,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, Default)]
struct SubmitState {
    /// Most recently issued ticket; only this one may append.
    latest: u64,
    inflight: Option<u64>,
}

pub struct Session {
    settings: Settings,
    generator: Arc<dyn CommandGenerator>,
    store: Mutex<HistoryStore>,
    state: Mutex<SubmitState>,
    started_at: DateTime<Utc>,
}

impl Session {
    pub fn new(settings: Settings, generator: Arc<dyn CommandGenerator>, store: HistoryStore) -> Self {
        Self {
            settings,
            generator,
            store: Mutex::new(store),
            state: Mutex::new(SubmitState::default()),
            started_at: Utc::now(),
        }
    }

    /// Build the generator and load the history named in `settings`.
    pub fn open(settings: Settings, kv: Arc<dyn KeyValueStore>) -> Result<Self> {
        let generator = build_generator(&settings)?;
        let store = HistoryStore::open_or_reset(kv, settings.history_key.clone())?;
        Ok(Self::new(settings, generator, store))
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn generator_name(&self) -> &'static str {
        self.generator.name()
    }

    /// Context for the next request: process environment plus recent commands.
    pub fn context(&self) -> RequestContext {
        let recent = self.recent_commands(self.settings.max_context_commands);
        RequestContext::detect(recent).with_session_start(self.started_at)
    }

    /// Classify `intent` and append the result.
    ///
    /// Returns [`RllmError::Superseded`] when another submission or
    /// [`Session::cancel_pending`] happened before this one finished.
    pub async fn submit(
        &self,
        intent: &str,
        mut context: RequestContext,
    ) -> RllmResult<CommandEntry> {
        let ticket = {
            let mut state = self.state.lock();
            state.latest += 1;
            let ticket = state.latest;
            if let Some(previous) = state.inflight.replace(ticket) {
                debug!("request {} superseded by {}", previous, ticket);
            }
            ticket
        };

        if context.session_start.is_none() {
            context.session_start = Some(self.started_at);
        }
        let draft = self.resolve_draft(intent, context).await;

        let mut store = self.store.lock();
        {
            let mut state = self.state.lock();
            if state.inflight == Some(ticket) {
                state.inflight = None;
            }
            if state.latest != ticket {
                info!("discarding result of superseded request {}", ticket);
                return Err(RllmError::Superseded);
            }
        }
        store.append(draft)
    }

    /// Drop the pending request, if any. Stored history is untouched.
    pub fn cancel_pending(&self) {
        let mut state = self.state.lock();
        if let Some(ticket) = state.inflight.take() {
            debug!("cancelled request {}", ticket);
        }
        state.latest += 1;
    }

    pub fn is_pending(&self) -> bool {
        self.state.lock().inflight.is_some()
    }

    async fn resolve_draft(&self, intent: &str, context: RequestContext) -> CommandDraft {
        let max = self.settings.max_query_length;
        let sanitized = sanitize_ai_input(intent, max);
        let truncated = sanitize_ai_input(intent, max.saturating_add(1))
            .chars()
            .count()
            > max;
        let prompt = match sanitized.trim() {
            "" => EMPTY_PROMPT_PLACEHOLDER.to_string(),
            trimmed => trimmed.to_string(),
        };

        let request = ClassificationRequest::new(prompt.clone(), context);
        let mut draft = match self.generate(&request).await {
            Ok(response) => CommandDraft::from_response(&prompt, response),
            Err(err) => {
                warn!("{} generator: {}", self.generator.name(), err);
                fallback_draft(&prompt, &err.to_string())
            }
        };

        if truncated {
            draft
                .warnings
                .push(format!("Request was truncated to {} characters", max));
        }
        draft
    }

    /// Run the generator under the configured timeout.
    async fn generate(
        &self,
        request: &ClassificationRequest,
    ) -> RllmResult<ClassificationResponse> {
        let timeout = self.settings.request_timeout();
        match tokio::time::timeout(timeout, self.generator.generate(request)).await {
            Ok(Ok(response)) if !response.command.trim().is_empty() => Ok(response),
            Ok(Ok(_)) => Err(RllmError::Generation(
                "generator returned an empty command".to_string(),
            )),
            Ok(Err(err)) => Err(RllmError::Generation(format!("{:#}", err))),
            Err(_) => Err(RllmError::Generation(format!(
                "timed out after {}s",
                timeout.as_secs()
            ))),
        }
    }

    pub fn mark_executed(&self, id: EntryId) -> RllmResult<CommandEntry> {
        self.store.lock().mark_executed(id)
    }

    pub fn clear_history(&self) {
        self.store.lock().clear();
    }

    pub fn restore(&self, json: &str) -> RllmResult<()> {
        self.store.lock().restore(json)
    }

    pub fn export_json(&self) -> RllmResult<String> {
        export::export_json(self.store.lock().entries())
    }

    pub fn export_script(&self) -> Option<String> {
        export::export_script(self.store.lock().entries())
    }

    pub fn export_csv(&self) -> RllmResult<String> {
        export::export_csv(self.store.lock().entries())
    }

    pub fn get_statistics(&self) -> Statistics {
        self.store.lock().statistics()
    }

    pub fn history(&self) -> Vec<CommandEntry> {
        self.store.lock().entries().to_vec()
    }

    pub fn search(&self, query: &str) -> Vec<CommandEntry> {
        self.store.lock().search(query)
    }

    pub fn recent_commands(&self, limit: usize) -> Vec<String> {
        self.store.lock().recent_commands(limit)
    }
}

/// Pick the generator for the configured provider.
pub fn build_generator(settings: &Settings) -> Result<Arc<dyn CommandGenerator>> {
    match settings.effective_provider() {
        Provider::Rules => Ok(Arc::new(RuleGenerator::new())),
        Provider::OpenAi => {
            let client = ChatGptClient::try_from_config(&settings.openai)?;
            let service = LiveAiService::new(Arc::new(client), settings.safety_level)
                .with_temperature(settings.openai.temperature());
            Ok(Arc::new(service))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::MemoryStore;
    use async_trait::async_trait;
    use rllm_types::RiskLevel;
    use std::time::Duration;

    /// Answers `ls`, sleeping first when the intent starts with "slow".
    struct SleepyGenerator;

    #[async_trait]
    impl CommandGenerator for SleepyGenerator {
        async fn generate(
            &self,
            request: &ClassificationRequest,
        ) -> anyhow::Result<ClassificationResponse> {
            if request.intent.starts_with("slow") {
                tokio::time::sleep(Duration::from_millis(300)).await;
            }
            if request.intent.starts_with("hang") {
                tokio::time::sleep(Duration::from_secs(30)).await;
            }
            if request.intent.starts_with("fail") {
                anyhow::bail!("backend exploded");
            }
            Ok(ClassificationResponse {
                command: "ls".to_string(),
                explanation: format!("for {}", request.intent),
                risk_level: RiskLevel::Low,
                confidence: Some(0.9),
                alternatives: vec![],
                warnings: vec![],
            })
        }

        fn name(&self) -> &'static str {
            "sleepy"
        }
    }

    fn session_with(generator: Arc<dyn CommandGenerator>, settings: Settings) -> Arc<Session> {
        let store = HistoryStore::new(Arc::new(MemoryStore::new()), "history");
        Arc::new(Session::new(settings, generator, store))
    }

    fn rules_session() -> Arc<Session> {
        session_with(Arc::new(RuleGenerator::new()), Settings::default())
    }

    #[tokio::test]
    async fn test_submit_appends_classified_entry() -> anyhow::Result<()> {
        let session = rules_session();
        let entry = session
            .submit("list all files including hidden ones", RequestContext::default())
            .await?;
        assert_eq!(entry.id, EntryId(1));
        assert_eq!(entry.command, "ls -la");
        assert_eq!(entry.risk_level, RiskLevel::Low);
        assert!(!entry.executed);
        assert_eq!(session.history().len(), 1);
        assert!(!session.is_pending());
        Ok(())
    }

    #[tokio::test]
    async fn test_newer_submit_supersedes_pending_one() -> anyhow::Result<()> {
        let session = session_with(Arc::new(SleepyGenerator), Settings::default());

        let slow = {
            let session = session.clone();
            tokio::spawn(async move { session.submit("slow request", RequestContext::default()).await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(session.is_pending());

        let fast = session.submit("fast request", RequestContext::default()).await?;
        assert_eq!(fast.prompt, "fast request");

        let result = slow.await?;
        assert!(matches!(result, Err(RllmError::Superseded)));
        let history = session.history();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].prompt, "fast request");
        assert!(!session.is_pending());
        Ok(())
    }

    #[tokio::test]
    async fn test_cancel_pending_discards_result() -> anyhow::Result<()> {
        let session = session_with(Arc::new(SleepyGenerator), Settings::default());
        let slow = {
            let session = session.clone();
            tokio::spawn(async move { session.submit("slow request", RequestContext::default()).await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(session.is_pending());

        session.cancel_pending();
        assert!(!session.is_pending());
        assert!(matches!(slow.await?, Err(RllmError::Superseded)));
        assert!(session.history().is_empty());

        let entry = session.submit("after cancel", RequestContext::default()).await?;
        assert_eq!(entry.id, EntryId(1));
        Ok(())
    }

    #[tokio::test]
    async fn test_generator_failure_becomes_fallback_entry() -> anyhow::Result<()> {
        let session = session_with(Arc::new(SleepyGenerator), Settings::default());
        let entry = session.submit("fail please", RequestContext::default()).await?;
        assert_eq!(entry.risk_level, RiskLevel::Medium);
        assert!(entry.warnings.iter().any(|w| w.contains("backend exploded")));
        assert_eq!(entry.prompt, "fail please");
        Ok(())
    }

    #[tokio::test]
    async fn test_generator_timeout_becomes_fallback_entry() -> anyhow::Result<()> {
        let settings = Settings {
            request_timeout_secs: 1,
            ..Settings::default()
        };
        let session = session_with(Arc::new(SleepyGenerator), settings);
        let entry = session.submit("hang forever", RequestContext::default()).await?;
        assert_eq!(entry.risk_level, RiskLevel::Medium);
        assert!(entry.warnings.iter().any(|w| w.contains("timed out")));
        Ok(())
    }

    #[tokio::test]
    async fn test_long_intent_is_truncated() -> anyhow::Result<()> {
        let settings = Settings {
            max_query_length: 10,
            ..Settings::default()
        };
        let session = session_with(Arc::new(SleepyGenerator), settings);
        let entry = session
            .submit("list all files including hidden ones", RequestContext::default())
            .await?;
        assert_eq!(entry.prompt, "list all f");
        assert!(entry.warnings.iter().any(|w| w.contains("truncated")));
        Ok(())
    }

    #[tokio::test]
    async fn test_generator_errors_are_reported_as_generation_failures() {
        let session = session_with(Arc::new(SleepyGenerator), Settings::default());
        let request = ClassificationRequest::new("fail now".to_string(), RequestContext::default());
        match session.generate(&request).await {
            Err(RllmError::Generation(reason)) => assert_eq!(reason, "backend exploded"),
            other => panic!("unexpected result: {:?}", other),
        }

        let entry = session
            .submit("fail again", RequestContext::default())
            .await
            .unwrap();
        assert_eq!(
            entry.warnings,
            vec!["Command generation failed: backend exploded".to_string()]
        );
    }

    #[tokio::test]
    async fn test_unbounded_query_length_does_not_truncate() -> anyhow::Result<()> {
        let settings = Settings {
            max_query_length: usize::MAX,
            ..Settings::default()
        };
        let session = session_with(Arc::new(SleepyGenerator), settings);
        let entry = session
            .submit("list all files including hidden ones", RequestContext::default())
            .await?;
        assert_eq!(entry.prompt, "list all files including hidden ones");
        assert!(!entry.warnings.iter().any(|w| w.contains("truncated")));
        Ok(())
    }

    #[tokio::test]
    async fn test_empty_intent_gets_placeholder_prompt() -> anyhow::Result<()> {
        let session = rules_session();
        let entry = session.submit("  ", RequestContext::default()).await?;
        assert_eq!(entry.prompt, EMPTY_PROMPT_PLACEHOLDER);
        assert_eq!(entry.risk_level, RiskLevel::Medium);
        Ok(())
    }

    #[tokio::test]
    async fn test_scenario_append_execute_clear() -> anyhow::Result<()> {
        let session = rules_session();
        session.submit("check disk space", RequestContext::default()).await?;
        let second = session
            .submit("remove all temporary files recursively", RequestContext::default())
            .await?;
        session.submit("format the disk", RequestContext::default()).await?;
        session.mark_executed(second.id)?;

        let stats = session.get_statistics();
        assert_eq!(stats.total_commands, 3);
        assert_eq!(stats.executed_commands, 1);
        let script = session.export_script().unwrap();
        assert!(script.contains("# remove all temporary files recursively"));
        assert!(!script.contains("df -h"));

        session.clear_history();
        assert!(session.history().is_empty());
        let stats = session.get_statistics();
        assert_eq!(stats.total_commands, 0);
        assert_eq!(stats.executed_commands, 0);
        assert!(stats.risk_distribution.values().all(|&n| n == 0));
        assert_eq!(session.export_script(), None);
        assert!(matches!(
            session.mark_executed(second.id),
            Err(RllmError::NotFound(_))
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_context_includes_recent_commands() -> anyhow::Result<()> {
        let settings = Settings {
            max_context_commands: 2,
            ..Settings::default()
        };
        let session = session_with(Arc::new(RuleGenerator::new()), settings);
        for intent in ["check disk space", "show running processes", "where am i"] {
            session.submit(intent, RequestContext::default()).await?;
        }
        let context = session.context();
        assert_eq!(context.previous_commands, vec!["ps aux", "pwd"]);
        assert!(context.session_start.is_some());
        assert!(context.os_info.is_some());
        Ok(())
    }

    #[test]
    fn test_build_generator_falls_back_to_rules() -> anyhow::Result<()> {
        let settings = Settings {
            provider: Provider::OpenAi,
            ..Settings::default()
        };
        assert_eq!(build_generator(&settings)?.name(), "rules");

        let mut settings = settings;
        settings.openai = settings.openai.with_api_key(Some("sk-test".to_string()));
        assert_eq!(build_generator(&settings)?.name(), "openai");
        Ok(())
    }
}
