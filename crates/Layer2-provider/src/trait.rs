//! Provider trait and request type

use crate::error::ProviderError;
use crate::Message;
use async_trait::async_trait;

/// One chat-completion request
///
/// `thinking` asks the backend for extended reasoning. Backends that do not
/// support it are expected to fail the request, which the invoker handles.
#[derive(Debug, Clone)]
pub struct ChatRequest<'a> {
    pub messages: &'a [Message],
    pub temperature: f32,
    pub max_tokens: u32,
    pub stop: &'a [String],
    pub thinking: bool,
}

/// LLM Provider trait
///
/// Implement this trait to add support for a new chat-completion backend.
/// Returns the raw assistant text; the caller owns parsing.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Provider ID (e.g. "openai-compat")
    fn id(&self) -> &str;

    /// Model ID requests are sent to
    fn model(&self) -> &str;

    /// Send the conversation and get the complete reply text
    async fn complete(&self, request: &ChatRequest<'_>) -> Result<String, ProviderError>;
}
