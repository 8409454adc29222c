//! OpenAI-compatible chat-completion provider
//!
//! Works against any `/chat/completions` endpoint (OpenAI, vLLM, DeepSeek,
//! LM Studio, ...). Non-streaming; the loop only needs the final text.

use crate::{
    error::ProviderError,
    r#trait::{ChatRequest, Provider},
    Message,
};
use async_trait::async_trait;
use relab_foundation::ModelSettings;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

const PROVIDER_ID: &str = "openai-compat";

/// OpenAI-compatible provider
pub struct OpenAiCompatProvider {
    client: Client,
    api_key: Option<String>,
    model: String,
    endpoint: String,
    timeout_secs: u64,
}

impl OpenAiCompatProvider {
    /// Create a provider for `base_url` (e.g. `https://api.openai.com/v1`)
    pub fn new(
        base_url: impl AsRef<str>,
        model: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::NotConfigured(format!("HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key,
            model: model.into(),
            endpoint: chat_endpoint(base_url.as_ref()),
            timeout_secs: timeout.as_secs(),
        })
    }

    /// Build from the `model` config section and an API key
    pub fn from_settings(
        settings: &ModelSettings,
        api_key: Option<String>,
    ) -> Result<Self, ProviderError> {
        Self::new(
            &settings.base_url,
            settings.model.clone(),
            api_key,
            Duration::from_secs(settings.timeout_secs),
        )
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn build_request<'a>(&'a self, request: &'a ChatRequest<'a>) -> CompletionRequest<'a> {
        CompletionRequest {
            model: &self.model,
            messages: request.messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            stop: if request.stop.is_empty() {
                None
            } else {
                Some(request.stop)
            },
            thinking: request.thinking.then_some(ThinkingParam { kind: "enabled" }),
        }
    }

    /// Parse error response body
    fn parse_error_response(status: reqwest::StatusCode, body: &str) -> ProviderError {
        if let Ok(error_response) = serde_json::from_str::<ErrorResponse>(body) {
            let error = error_response.error;
            return match error.code.as_deref() {
                Some("rate_limit_exceeded") => ProviderError::RateLimited {
                    retry_after_ms: None,
                },
                Some("context_length_exceeded") => {
                    ProviderError::ContextLengthExceeded(error.message)
                }
                Some("invalid_api_key") => ProviderError::Authentication(error.message),
                Some("model_not_found") => ProviderError::ModelNotAvailable(error.message),
                _ => ProviderError::from_http_status(status.as_u16(), &error.message),
            };
        }

        ProviderError::from_http_status(status.as_u16(), body)
    }
}

/// `{base}/chat/completions`, accepting a base that already ends with it
fn chat_endpoint(base_url: &str) -> String {
    let base = base_url.trim_end_matches('/');
    if base.ends_with("/chat/completions") {
        base.to_string()
    } else {
        format!("{}/chat/completions", base)
    }
}

/// Extract the reply text from a completion response
fn extract_content(response: CompletionResponse) -> Result<String, ProviderError> {
    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| ProviderError::InvalidResponse("No choices in response".to_string()))?;

    if let Some(reasoning) = choice.message.reasoning_content.as_deref() {
        debug!(chars = reasoning.len(), "Model returned reasoning content");
    }

    Ok(choice.message.content.unwrap_or_default())
}

#[async_trait]
impl Provider for OpenAiCompatProvider {
    fn id(&self) -> &str {
        PROVIDER_ID
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: &ChatRequest<'_>) -> Result<String, ProviderError> {
        let body = self.build_request(request);

        let mut builder = self
            .client
            .post(&self.endpoint)
            .header("Content-Type", "application/json")
            .json(&body);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| ProviderError::from_reqwest(&e, self.timeout_secs))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Self::parse_error_response(status, &body));
        }

        let parsed: CompletionResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

        extract_content(parsed)
    }
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    temperature: f32,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop: Option<&'a [String]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    thinking: Option<ThinkingParam>,
}

#[derive(Debug, Serialize)]
struct ThinkingParam {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    reasoning_content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
    #[serde(default)]
    code: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn provider() -> OpenAiCompatProvider {
        OpenAiCompatProvider::new(
            "http://localhost:8000/v1/",
            "test-model",
            None,
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[test]
    fn test_endpoint() {
        assert_eq!(
            chat_endpoint("https://api.openai.com/v1"),
            "https://api.openai.com/v1/chat/completions"
        );
        assert_eq!(
            chat_endpoint("http://x/v1/chat/completions/"),
            "http://x/v1/chat/completions"
        );
        assert_eq!(provider().endpoint(), "http://localhost:8000/v1/chat/completions");
    }

    #[test]
    fn test_request_body() {
        let provider = provider();
        let messages = vec![Message::system("sys"), Message::user("hi")];
        let stop = vec!["<tool_response>".to_string()];
        let request = ChatRequest {
            messages: &messages,
            temperature: 0.7,
            max_tokens: 4096,
            stop: &stop,
            thinking: true,
        };

        let body = serde_json::to_value(provider.build_request(&request)).unwrap();
        assert_eq!(body["model"], "test-model");
        assert_eq!(body["messages"][1], json!({ "role": "user", "content": "hi" }));
        assert_eq!(body["stop"], json!(["<tool_response>"]));
        assert_eq!(body["thinking"], json!({ "type": "enabled" }));

        let plain = ChatRequest {
            thinking: false,
            stop: &[],
            ..request
        };
        let body = serde_json::to_value(provider.build_request(&plain)).unwrap();
        assert!(body.get("thinking").is_none());
        assert!(body.get("stop").is_none());
    }

    #[test]
    fn test_extract_content() {
        let response: CompletionResponse = serde_json::from_value(json!({
            "choices": [{ "message": { "content": "<answer>1</answer>", "reasoning_content": "hmm" } }]
        }))
        .unwrap();
        assert_eq!(extract_content(response).unwrap(), "<answer>1</answer>");

        let empty: CompletionResponse = serde_json::from_value(json!({ "choices": [] })).unwrap();
        assert!(matches!(
            extract_content(empty),
            Err(ProviderError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_parse_error_response() {
        let body = r#"{"error":{"message":"bad key","code":"invalid_api_key"}}"#;
        assert!(matches!(
            OpenAiCompatProvider::parse_error_response(reqwest::StatusCode::UNAUTHORIZED, body),
            ProviderError::Authentication(_)
        ));

        assert!(matches!(
            OpenAiCompatProvider::parse_error_response(
                reqwest::StatusCode::BAD_GATEWAY,
                "upstream down"
            ),
            ProviderError::ServerError(_)
        ));
    }
}
