//! Run trace and terminal result

use relab_provider::Message;
use relab_tool::ToolArgs;
use serde::{Deserialize, Serialize};

/// Error text of a run that used up its iteration budget
pub const MAX_ITERATIONS_ERROR: &str = "Max iterations reached";

/// Error text of a run halted through a stop handle
pub const STOPPED_ERROR: &str = "Stopped by user";

/// Corrective message sent after a turn with neither tool call nor answer
pub const FORMAT_CORRECTION: &str = "Please use the correct format: <think>...</think> followed by <tool_call>...</tool_call> or <answer>...</answer>";

/// One record per loop iteration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceEntry {
    pub iteration: usize,
    pub reasoning: Option<String>,
    pub tool_name: Option<String>,
    pub tool_args: Option<ToolArgs>,
    pub observation: Option<String>,
}

impl TraceEntry {
    pub fn new(iteration: usize) -> Self {
        Self {
            iteration,
            reasoning: None,
            tool_name: None,
            tool_args: None,
            observation: None,
        }
    }
}

/// How a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    Answer,
    Budget,
    Stopped,
}

/// Terminal value of a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoopResult {
    pub success: bool,
    pub answer: Option<String>,
    pub iterations_used: usize,
    pub trace: Vec<TraceEntry>,
    pub final_messages: Vec<Message>,
    pub error: Option<String>,
    pub termination: Termination,
}

impl LoopResult {
    pub(crate) fn answered(
        answer: String,
        iterations_used: usize,
        trace: Vec<TraceEntry>,
        final_messages: Vec<Message>,
    ) -> Self {
        Self {
            success: true,
            answer: Some(answer),
            iterations_used,
            trace,
            final_messages,
            error: None,
            termination: Termination::Answer,
        }
    }

    pub(crate) fn unfinished(
        termination: Termination,
        iterations_used: usize,
        trace: Vec<TraceEntry>,
        final_messages: Vec<Message>,
    ) -> Self {
        let error = match termination {
            Termination::Stopped => STOPPED_ERROR,
            _ => MAX_ITERATIONS_ERROR,
        };
        Self {
            success: false,
            answer: None,
            iterations_used,
            trace,
            final_messages,
            error: Some(error.to_string()),
            termination,
        }
    }

    /// Budget ran out; the conversation can be resumed
    pub fn is_exhausted(&self) -> bool {
        self.termination == Termination::Budget
    }

    /// Halted through a stop handle
    pub fn is_stopped(&self) -> bool {
        self.termination == Termination::Stopped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unfinished_messages() {
        let budget = LoopResult::unfinished(Termination::Budget, 3, vec![], vec![]);
        assert!(!budget.success);
        assert!(budget.is_exhausted());
        assert_eq!(budget.error.as_deref(), Some("Max iterations reached"));

        let stopped = LoopResult::unfinished(Termination::Stopped, 1, vec![], vec![]);
        assert!(stopped.is_stopped());
        assert_eq!(stopped.error.as_deref(), Some("Stopped by user"));
    }

    #[test]
    fn test_result_serializes() {
        let mut entry = TraceEntry::new(1);
        entry.tool_name = Some("echo".into());
        let result = LoopResult::answered("42".into(), 1, vec![entry], vec![Message::user("q")]);

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["answer"], "42");
        assert_eq!(json["termination"], "answer");
        assert_eq!(json["trace"][0]["tool_name"], "echo");
        assert!(json["error"].is_null());
    }
}
