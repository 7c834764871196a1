//! Runs one pattern over one text through the generation backend.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};
use weft_core::WeftConfig;
use weft_patterns::PatternCatalog;

use crate::backend::{
    BackendError, ChatMessage, FailureReason, GenerationBackend, GenerationRequest,
};
use crate::chunker::{self, char_len};
use crate::combiner::combine;
use crate::error::EngineError;
use crate::markup;
use crate::retry::RetryPolicy;

/// Stands in for a slice of a large input whose retries ran out.
pub const SECTION_PLACEHOLDER: &str = "[Error processing this section]";

/// Pattern execution against a backend, a catalog and a model-tier chain.
pub struct PatternExecutor {
    backend: Arc<dyn GenerationBackend>,
    catalog: Arc<PatternCatalog>,
    models: Vec<String>,
    temperature: f32,
    initial_timeout: Duration,
    max_timeout: Duration,
    input_chunk_size: usize,
    hard_split_threshold: usize,
    call_policy: RetryPolicy,
    chunk_policy: RetryPolicy,
    orchestration_policy: RetryPolicy,
}

impl PatternExecutor {
    pub fn new(
        backend: Arc<dyn GenerationBackend>,
        catalog: Arc<PatternCatalog>,
        config: &WeftConfig,
    ) -> Self {
        Self {
            backend,
            catalog,
            models: config.backend.models.clone(),
            temperature: config.backend.temperature,
            initial_timeout: config.backend.initial_timeout(),
            max_timeout: config.backend.max_timeout(),
            input_chunk_size: config.chunking.input_chunk_size,
            hard_split_threshold: config.chunking.hard_split_threshold,
            call_policy: RetryPolicy::call(&config.backend),
            chunk_policy: RetryPolicy::chunk(&config.retry),
            orchestration_policy: RetryPolicy::orchestration(&config.retry),
        }
    }

    pub fn catalog(&self) -> &PatternCatalog {
        &self.catalog
    }

    /// Apply a pattern to `text` in a single backend call.
    pub async fn apply(&self, pattern_name: &str, text: &str) -> Result<String, EngineError> {
        let pattern = self.catalog.require(pattern_name)?;
        if text.trim().is_empty() {
            return Err(EngineError::NoContent);
        }

        let mut messages = vec![ChatMessage::system(pattern.system_prompt.as_str())];
        if let Some(seed) = &pattern.user_prompt {
            messages.push(ChatMessage::user(seed.as_str()));
        }
        messages.push(ChatMessage::user(text));

        debug!(pattern = %pattern_name, chars = char_len(text), "Applying pattern");
        let raw = self.complete(&messages).await?;
        Ok(markup::clean(&raw))
    }

    /// Apply a pattern to text of any size.
    ///
    /// Text above the hard-split threshold is split, each slice is applied
    /// with its own retry, and the slice results are combined by category.
    /// A slice that keeps failing becomes [`SECTION_PLACEHOLDER`]; if every
    /// slice fails the last error is returned.
    pub async fn apply_large(&self, pattern_name: &str, text: &str) -> Result<String, EngineError> {
        if char_len(text) <= self.hard_split_threshold {
            return self.apply(pattern_name, text).await;
        }

        let category = self.catalog.require(pattern_name)?.category;
        let slices = chunker::split(text, self.input_chunk_size);
        info!(pattern = %pattern_name, slices = slices.len(), "Splitting large input");

        let mut outputs = Vec::with_capacity(slices.len());
        let mut last_error = None;
        for (index, slice) in slices.iter().enumerate() {
            let result = self
                .chunk_policy
                .run("slice", |_| self.apply(pattern_name, slice))
                .await;
            match result {
                Ok(output) => outputs.push(output),
                Err(e @ EngineError::PatternNotFound(_)) => return Err(e),
                Err(e) => {
                    warn!(pattern = %pattern_name, slice = index + 1, error = %e, "Slice failed, inserting placeholder");
                    outputs.push(SECTION_PLACEHOLDER.to_string());
                    last_error = Some(e);
                }
            }
        }

        if let Some(e) = last_error.filter(|_| outputs.iter().all(|o| o == SECTION_PLACEHOLDER)) {
            return Err(e);
        }
        Ok(combine(category, &outputs))
    }

    /// [`apply`](Self::apply) with orchestration retry on transient failures.
    pub async fn apply_with_retry(&self, pattern_name: &str, text: &str) -> Result<String, EngineError> {
        self.orchestration_policy
            .run("apply", |_| self.apply(pattern_name, text))
            .await
    }

    /// [`apply_large`](Self::apply_large) with orchestration retry on transient failures.
    pub async fn apply_large_with_retry(
        &self,
        pattern_name: &str,
        text: &str,
    ) -> Result<String, EngineError> {
        self.orchestration_policy
            .run("apply_large", |_| self.apply_large(pattern_name, text))
            .await
    }

    /// Send raw messages through the model-tier chain under the call policy.
    ///
    /// Only reasoning markup is stripped; callers parse the reply themselves.
    pub async fn complete(&self, messages: &[ChatMessage]) -> Result<String, EngineError> {
        let raw = self
            .call_policy
            .run("backend call", |attempt| self.invoke_tiers(messages, attempt))
            .await?;
        Ok(markup::strip_reasoning(&raw))
    }

    /// Timeout of attempt `attempt`, rising linearly from initial to max.
    pub fn timeout_for(&self, attempt: u32) -> Duration {
        let last = self.call_policy.max_attempts.saturating_sub(1);
        if last == 0 {
            return self.initial_timeout;
        }
        if attempt >= last {
            return self.max_timeout;
        }
        let span = self.max_timeout.saturating_sub(self.initial_timeout);
        self.initial_timeout + span.mul_f64(attempt as f64 / last as f64)
    }

    /// One attempt: every model tier in order until one answers.
    async fn invoke_tiers(&self, messages: &[ChatMessage], attempt: u32) -> Result<String, EngineError> {
        let timeout = self.timeout_for(attempt);
        let mut last_error = None;

        for model in &self.models {
            let request = GenerationRequest {
                model: model.clone(),
                messages: messages.to_vec(),
                timeout,
                temperature: self.temperature,
            };

            let result = match tokio::time::timeout(timeout, self.backend.invoke(&request)).await {
                Ok(result) => result,
                Err(_) => Err(BackendError::new(
                    FailureReason::Timeout,
                    format!("no reply within {}s", timeout.as_secs()),
                )),
            };

            match result {
                Ok(generation) => {
                    debug!(model = %generation.model, attempt, "Backend replied");
                    return Ok(generation.content);
                }
                Err(e) if e.reason == FailureReason::ContextLength => {
                    return Err(EngineError::ContentTooLarge(e.message));
                }
                Err(e) => {
                    warn!(backend = self.backend.name(), model = %model, attempt, error = %e, "Model tier failed");
                    last_error = Some(e);
                }
            }
        }

        Err(EngineError::Backend(last_error.unwrap_or_else(|| {
            BackendError::new(FailureReason::Other, "no model tiers configured")
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::mock::last_user_message;
    use crate::backend::MockBackend;

    fn config() -> WeftConfig {
        let mut config = WeftConfig::default();
        config.backend.models = vec!["primary".to_string(), "fallback".to_string()];
        config
    }

    fn executor(mock: Arc<MockBackend>) -> PatternExecutor {
        PatternExecutor::new(mock, Arc::new(PatternCatalog::builtin()), &config())
    }

    fn err(reason: FailureReason) -> Result<String, BackendError> {
        Err(BackendError::new(reason, "scripted"))
    }

    // ---- apply ----

    #[tokio::test]
    async fn test_apply_builds_messages() {
        let mock = Arc::new(MockBackend::new());
        let exec = executor(mock.clone());

        exec.apply("create_story", "a dragon learns to code").await.unwrap();

        let calls = mock.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].model, "primary");
        assert_eq!(calls[0].messages.len(), 3);
        assert_eq!(calls[0].timeout, Duration::from_secs(60));
        assert_eq!(last_user_message(&calls[0]), "a dragon learns to code");
    }

    #[tokio::test]
    async fn test_apply_cleans_output() {
        let mock = Arc::new(MockBackend::new());
        mock.push_ok("<think>plan</think><p>Summary</p>");
        let out = executor(mock).apply("summarize", "text").await.unwrap();
        assert_eq!(out, "Summary");
    }

    #[tokio::test]
    async fn test_apply_unknown_pattern() {
        let mock = Arc::new(MockBackend::new());
        let result = executor(mock.clone()).apply("write_sonnet", "text").await;
        assert!(matches!(result, Err(EngineError::PatternNotFound(_))));
        assert_eq!(mock.call_count(), 0);
    }

    #[tokio::test]
    async fn test_apply_empty_text() {
        let mock = Arc::new(MockBackend::new());
        let result = executor(mock).apply("summarize", "  \n").await;
        assert!(matches!(result, Err(EngineError::NoContent)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_failure_moves_to_next_tier() {
        let mock = Arc::new(MockBackend::new());
        mock.push_reply(err(FailureReason::RateLimited));
        let out = executor(mock.clone()).apply("summarize", "hello").await.unwrap();

        assert!(out.starts_with("Processed 5 chars"));
        let models: Vec<_> = mock.calls().into_iter().map(|c| c.model).collect();
        assert_eq!(models, vec!["primary", "fallback"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_context_length_not_retried() {
        let mock = Arc::new(MockBackend::new());
        mock.push_reply(err(FailureReason::ContextLength));
        let result = executor(mock.clone()).apply("summarize", "hello").await;

        assert!(matches!(result, Err(EngineError::ContentTooLarge(_))));
        assert_eq!(mock.call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_call_policy_escalates_timeout() {
        let mock = Arc::new(MockBackend::with_responder(|_| err(FailureReason::Timeout)));
        let result = executor(mock.clone()).apply("summarize", "hello").await;

        assert!(result.unwrap_err().is_transient());
        let timeouts: Vec<_> = mock.calls().iter().map(|c| c.timeout.as_secs()).collect();
        // three attempts, two tiers each
        assert_eq!(timeouts, vec![60, 60, 90, 90, 120, 120]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_backend_times_out() {
        let mock = Arc::new(MockBackend::new().with_delay(Duration::from_secs(600)));
        let mut cfg = config();
        cfg.backend.models = vec!["only".to_string()];
        cfg.backend.retries = 0;
        let exec = PatternExecutor::new(mock, Arc::new(PatternCatalog::builtin()), &cfg);

        let result = exec.apply("summarize", "hello").await;
        match result {
            Err(EngineError::Backend(e)) => assert_eq!(e.reason, FailureReason::Timeout),
            other => panic!("expected timeout, got {:?}", other),
        }
    }

    #[test]
    fn test_timeout_schedule() {
        let exec = executor(Arc::new(MockBackend::new()));
        assert_eq!(exec.timeout_for(0), Duration::from_secs(60));
        assert_eq!(exec.timeout_for(1), Duration::from_secs(90));
        assert_eq!(exec.timeout_for(2), Duration::from_secs(120));
        assert_eq!(exec.timeout_for(7), Duration::from_secs(120));
    }

    // ---- apply_large ----

    #[tokio::test]
    async fn test_apply_large_below_threshold_single_call() {
        let mock = Arc::new(MockBackend::new());
        let text = "word ".repeat(2400);
        executor(mock.clone()).apply_large("summarize", &text).await.unwrap();
        assert_eq!(mock.call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_apply_large_placeholder_for_failed_slice() {
        let mock = Arc::new(MockBackend::with_responder(|req| {
            if last_user_message(req).contains("[CONTINUATION - PART 2]") {
                err(FailureReason::Other)
            } else {
                Ok("slice ok".to_string())
            }
        }));
        let mut cfg = config();
        cfg.chunking.hard_split_threshold = 1000;
        cfg.chunking.input_chunk_size = 600;
        let exec = PatternExecutor::new(mock, Arc::new(PatternCatalog::builtin()), &cfg);

        let text = "Sentence with words. ".repeat(80);
        let out = exec.apply_large("translate", &text).await.unwrap();
        assert!(out.contains("## Part 1\n\nslice ok"));
        assert!(out.contains(&format!("## Part 2\n\n{}", SECTION_PLACEHOLDER)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_apply_large_all_slices_failed() {
        let mock = Arc::new(MockBackend::with_responder(|_| err(FailureReason::Other)));
        let mut cfg = config();
        cfg.chunking.hard_split_threshold = 100;
        cfg.chunking.input_chunk_size = 100;
        let exec = PatternExecutor::new(mock, Arc::new(PatternCatalog::builtin()), &cfg);

        let result = exec.apply_large("summarize", &"abc ".repeat(60)).await;
        assert!(matches!(result, Err(EngineError::Backend(_))));
    }

    // ---- orchestration retry ----

    #[tokio::test(start_paused = true)]
    async fn test_apply_with_retry_recovers_from_transient() {
        let mock = Arc::new(MockBackend::new());
        let mut cfg = config();
        cfg.backend.models = vec!["only".to_string()];
        cfg.backend.retries = 0;
        let exec = PatternExecutor::new(mock.clone(), Arc::new(PatternCatalog::builtin()), &cfg);

        mock.push_reply(err(FailureReason::ConnectionReset));
        mock.push_reply(err(FailureReason::Aborted));
        let out = exec.apply_with_retry("summarize", "hello").await.unwrap();
        assert!(out.starts_with("Processed"));
        assert_eq!(mock.call_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_apply_with_retry_skips_fatal() {
        let mock = Arc::new(MockBackend::new());
        let mut cfg = config();
        cfg.backend.models = vec!["only".to_string()];
        cfg.backend.retries = 0;
        let exec = PatternExecutor::new(mock.clone(), Arc::new(PatternCatalog::builtin()), &cfg);

        mock.push_reply(err(FailureReason::InvalidResponse));
        assert!(exec.apply_with_retry("summarize", "hello").await.is_err());
        assert_eq!(mock.call_count(), 1);
    }
}
