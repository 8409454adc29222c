//! Provider implementations

pub mod openai;
pub mod scripted;

pub use openai::OpenAiCompatProvider;
pub use scripted::{RecordedRequest, ScriptedProvider};
