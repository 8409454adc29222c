//! # relab-provider
//!
//! LLM provider abstraction layer for relab.
//!
//! ## Features
//! - `Provider` trait: one chat-completion call, raw text out
//! - `ModelInvoker`: retry with exponential backoff plus thinking-mode fallback
//! - OpenAI-compatible HTTP provider and a scripted provider for offline runs

pub mod error;
pub mod invoker;
pub mod message;
pub mod providers;
pub mod retry;
pub mod r#trait;

// Core traits and types
pub use message::{Message, MessageRole};
pub use r#trait::{ChatRequest, Provider};

// Error and retry
pub use error::ProviderError;
pub use retry::{with_retry, RetryClassification, RetryConfig, RetryableError};

// Invocation
pub use invoker::{CallOptions, ModelInvoker, ThinkingMode, LLM_FAILURE_SENTINEL};

// Provider implementations
pub use providers::{OpenAiCompatProvider, RecordedRequest, ScriptedProvider};
