//! Streaming events emitted by the loop

use relab_tool::ToolArgs;
use serde::{Deserialize, Serialize};

/// One step of a run, pushed to the consumer as it happens
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    /// Run started
    Start { content: String, iteration: usize },

    /// New iteration began
    Iteration { iteration: usize },

    /// Reasoning block of the current turn
    Thought { content: String, iteration: usize },

    /// Tool about to be dispatched
    Action {
        name: String,
        input: ToolArgs,
        iteration: usize,
    },

    /// Tool result fed back to the model
    Observation { content: String, iteration: usize },

    /// Terminal answer
    FinalAnswer { content: String, iteration: usize },

    /// Notice (malformed turn, budget exhausted, stop)
    Info { content: String, iteration: usize },
}

impl AgentEvent {
    pub fn iteration(&self) -> usize {
        match self {
            AgentEvent::Start { iteration, .. }
            | AgentEvent::Iteration { iteration }
            | AgentEvent::Thought { iteration, .. }
            | AgentEvent::Action { iteration, .. }
            | AgentEvent::Observation { iteration, .. }
            | AgentEvent::FinalAnswer { iteration, .. }
            | AgentEvent::Info { iteration, .. } => *iteration,
        }
    }

    /// Wire name of the variant
    pub fn kind(&self) -> &'static str {
        match self {
            AgentEvent::Start { .. } => "start",
            AgentEvent::Iteration { .. } => "iteration",
            AgentEvent::Thought { .. } => "thought",
            AgentEvent::Action { .. } => "action",
            AgentEvent::Observation { .. } => "observation",
            AgentEvent::FinalAnswer { .. } => "final_answer",
            AgentEvent::Info { .. } => "info",
        }
    }
}
