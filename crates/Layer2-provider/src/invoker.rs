//! Model invocation with retry and capability fallback
//!
//! The first call of a run is sent with thinking enabled (when configured).
//! If that call fails for any reason the invoker drops to plain mode for the
//! rest of the run and retries immediately; that retry is free. Plain-mode
//! failures are retried with exponential backoff. When everything fails the
//! invoker returns [`LLM_FAILURE_SENTINEL`] instead of an error so the loop
//! can keep going.

use crate::error::ProviderError;
use crate::retry::{with_retry, RetryConfig};
use crate::r#trait::{ChatRequest, Provider};
use crate::Message;
use relab_foundation::{AgentSettings, ModelSettings};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Text returned when every attempt failed
pub const LLM_FAILURE_SENTINEL: &str = "Error: Failed to get response from LLM";

/// Capability tier of outgoing requests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThinkingMode {
    Enabled,
    Disabled,
}

impl ThinkingMode {
    pub fn from_flag(enabled: bool) -> Self {
        if enabled {
            ThinkingMode::Enabled
        } else {
            ThinkingMode::Disabled
        }
    }
}

/// Sampling parameters shared by every call
#[derive(Debug, Clone)]
pub struct CallOptions {
    pub temperature: f32,
    pub max_tokens: u32,
    pub stop: Vec<String>,
    pub timeout: Duration,
}

impl CallOptions {
    pub fn from_settings(settings: &ModelSettings) -> Self {
        Self {
            temperature: settings.temperature,
            max_tokens: settings.max_tokens,
            stop: settings.stop_sequences.clone(),
            timeout: Duration::from_secs(settings.timeout_secs),
        }
    }
}

impl Default for CallOptions {
    fn default() -> Self {
        Self::from_settings(&ModelSettings::default())
    }
}

/// Wraps a [`Provider`] with the per-run retry/fallback policy
pub struct ModelInvoker {
    provider: Arc<dyn Provider>,
    options: CallOptions,
    retry: RetryConfig,
    configured: ThinkingMode,
    mode: ThinkingMode,
}

impl ModelInvoker {
    pub fn new(
        provider: Arc<dyn Provider>,
        options: CallOptions,
        retry: RetryConfig,
        thinking: bool,
    ) -> Self {
        let mode = ThinkingMode::from_flag(thinking);
        Self {
            provider,
            options,
            retry,
            configured: mode,
            mode,
        }
    }

    /// Build from the `model` and `agent` config sections
    pub fn from_settings(
        provider: Arc<dyn Provider>,
        model: &ModelSettings,
        agent: &AgentSettings,
    ) -> Self {
        Self::new(
            provider,
            CallOptions::from_settings(model),
            RetryConfig::from_settings(agent),
            model.thinking,
        )
    }

    /// Current capability tier
    pub fn thinking_mode(&self) -> ThinkingMode {
        self.mode
    }

    /// Restore the configured tier at the start of a new run
    pub fn begin_run(&mut self) {
        self.mode = self.configured;
    }

    pub fn provider(&self) -> &Arc<dyn Provider> {
        &self.provider
    }

    /// Call the model; never fails, returns [`LLM_FAILURE_SENTINEL`] instead
    pub async fn invoke(&mut self, messages: &[Message]) -> String {
        match self.try_invoke(messages).await {
            Ok(text) => text,
            Err(e) => {
                warn!("Model call failed after all retries: {}", e);
                LLM_FAILURE_SENTINEL.to_string()
            }
        }
    }

    /// Call the model and surface the final error
    pub async fn try_invoke(&mut self, messages: &[Message]) -> Result<String, ProviderError> {
        if self.mode == ThinkingMode::Enabled {
            match self.call_once(messages, true).await {
                Ok(text) => return Ok(text),
                Err(e) => {
                    warn!("Thinking request failed, falling back to plain mode: {}", e);
                    self.mode = ThinkingMode::Disabled;
                }
            }
        }

        with_retry(&self.retry, "model call", || self.call_once(messages, false)).await
    }

    async fn call_once(&self, messages: &[Message], thinking: bool) -> Result<String, ProviderError> {
        let request = ChatRequest {
            messages,
            temperature: self.options.temperature,
            max_tokens: self.options.max_tokens,
            stop: &self.options.stop,
            thinking,
        };

        debug!(
            provider = self.provider.id(),
            messages = messages.len(),
            thinking,
            "Calling model"
        );

        let reply = tokio::time::timeout(self.options.timeout, self.provider.complete(&request))
            .await
            .map_err(|_| ProviderError::Timeout(self.options.timeout.as_secs()))??;

        let reply = reply.trim();
        if reply.is_empty() {
            return Err(ProviderError::EmptyResponse);
        }
        Ok(reply.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::ScriptedProvider;

    fn invoker(provider: Arc<ScriptedProvider>, retries: u32, thinking: bool) -> ModelInvoker {
        let retry = RetryConfig {
            max_retries: retries,
            initial_delay_ms: 0,
            ..Default::default()
        };
        ModelInvoker::new(provider, CallOptions::default(), retry, thinking)
    }

    #[tokio::test]
    async fn test_success_is_trimmed() {
        let provider = Arc::new(ScriptedProvider::new(["  <answer>ok</answer>\n"]));
        let mut invoker = invoker(provider.clone(), 3, true);

        let text = invoker.invoke(&[Message::user("hi")]).await;
        assert_eq!(text, "<answer>ok</answer>");
        assert_eq!(invoker.thinking_mode(), ThinkingMode::Enabled);
        assert!(provider.requests()[0].thinking);
    }

    #[tokio::test]
    async fn test_thinking_failure_downgrades_for_rest_of_run() {
        let provider = Arc::new(ScriptedProvider::from_results(vec![
            Err(ProviderError::InvalidRequest("thinking not supported".into())),
            Ok("first".into()),
            Ok("second".into()),
        ]));
        let mut invoker = invoker(provider.clone(), 0, true);

        // fallback retry does not consume the (empty) retry budget
        assert_eq!(invoker.invoke(&[Message::user("a")]).await, "first");
        assert_eq!(invoker.thinking_mode(), ThinkingMode::Disabled);
        assert_eq!(invoker.invoke(&[Message::user("b")]).await, "second");

        let flags: Vec<bool> = provider.requests().iter().map(|r| r.thinking).collect();
        assert_eq!(flags, vec![true, false, false]);

        invoker.begin_run();
        assert_eq!(invoker.thinking_mode(), ThinkingMode::Enabled);
    }

    #[tokio::test]
    async fn test_exhaustion_returns_sentinel() {
        let provider = Arc::new(ScriptedProvider::from_results(vec![
            Err(ProviderError::ServerError("500".into())),
            Err(ProviderError::ServerError("500".into())),
            Err(ProviderError::ServerError("500".into())),
        ]));
        let mut invoker = invoker(provider.clone(), 2, false);

        assert_eq!(
            invoker.invoke(&[Message::user("x")]).await,
            LLM_FAILURE_SENTINEL
        );
        assert_eq!(provider.requests().len(), 3);
    }

    #[tokio::test]
    async fn test_empty_reply_is_retried() {
        let provider = Arc::new(ScriptedProvider::new(["   ", "<answer>late</answer>"]));
        let mut invoker = invoker(provider.clone(), 1, false);

        assert_eq!(
            invoker.invoke(&[Message::user("x")]).await,
            "<answer>late</answer>"
        );
        assert_eq!(provider.requests().len(), 2);
    }

    #[tokio::test]
    async fn test_permanent_error_skips_retries() {
        let provider = Arc::new(ScriptedProvider::from_results(vec![
            Err(ProviderError::Authentication("bad key".into())),
            Ok("never".into()),
        ]));
        let mut invoker = invoker(provider.clone(), 3, false);

        let err = invoker.try_invoke(&[Message::user("x")]).await.unwrap_err();
        assert!(matches!(err, ProviderError::Authentication(_)));
        assert_eq!(provider.requests().len(), 1);
    }
}
