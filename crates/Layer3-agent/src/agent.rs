//! ReAct agent loop
//!
//! `INIT -> ITERATING -> {answer, budget, stopped}`. Each iteration makes one
//! model call, parses the reply and, if a tool was requested, dispatches it
//! and feeds the observation back as a user message. Malformed replies get a
//! corrective message instead. Nothing inside the loop raises: failures end
//! up as observation text or as a `LoopResult` with `success == false`.

use crate::event::AgentEvent;
use crate::history::ConversationState;
use crate::parser::{ResponseParser, TOOL_RESPONSE_CLOSE, TOOL_RESPONSE_OPEN};
use crate::prompt::SystemPromptBuilder;
use crate::steering::StopHandle;
use crate::trace::{LoopResult, Termination, TraceEntry, FORMAT_CORRECTION};
use relab_foundation::RelabConfig;
use relab_provider::{Message, ModelInvoker, Provider};
use relab_tool::{ToolDispatcher, ToolRegistry};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Default iteration budget
pub const DEFAULT_MAX_ITERATIONS: usize = 20;

/// Build the first user message of a run
pub fn user_message(task: &str, context: Option<&str>) -> String {
    match context {
        Some(context) if !context.trim().is_empty() => {
            format!("Context:\n{}\n\nTask:\n{}", context, task)
        }
        _ => task.to_string(),
    }
}

/// Wrap a tool observation for the conversation
pub fn observation_message(observation: &str) -> String {
    format!("{}\n{}\n{}", TOOL_RESPONSE_OPEN, observation, TOOL_RESPONSE_CLOSE)
}

fn preview(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        format!("{}...", text.chars().take(max).collect::<String>())
    }
}

/// The reasoning/acting loop
///
/// Owns its conversation; one instance runs one task at a time.
pub struct ReactAgent {
    invoker: ModelInvoker,
    dispatcher: ToolDispatcher,
    parser: ResponseParser,
    state: ConversationState,
    system_prompt: String,
    max_iterations: usize,
    stop: StopHandle,
}

impl ReactAgent {
    /// Create an agent with a prompt built from the dispatcher's registry
    pub fn new(invoker: ModelInvoker, dispatcher: ToolDispatcher) -> Self {
        let system_prompt = SystemPromptBuilder::new()
            .with_tools(dispatcher.registry())
            .build();
        Self {
            invoker,
            dispatcher,
            parser: ResponseParser::new(),
            state: ConversationState::new(),
            system_prompt,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            stop: StopHandle::new(),
        }
    }

    /// Wire provider and registry using the `model`, `agent` and `workspace` sections
    pub fn from_config(
        provider: Arc<dyn Provider>,
        registry: Arc<ToolRegistry>,
        config: &RelabConfig,
    ) -> Self {
        let invoker = ModelInvoker::from_settings(provider, &config.model, &config.agent);
        let system_prompt = SystemPromptBuilder::new()
            .with_workspace(&config.workspace)
            .with_tools(&registry)
            .build();
        let dispatcher = ToolDispatcher::from_settings(registry, &config.agent);

        Self::new(invoker, dispatcher)
            .with_system_prompt(system_prompt)
            .with_max_iterations(config.agent.max_iterations)
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    /// Iteration budget per run; `usize::MAX` leaves the stop handle as the only bound
    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = max;
        self
    }

    pub fn with_parser(mut self, parser: ResponseParser) -> Self {
        self.parser = parser;
        self
    }

    pub fn with_stop_handle(mut self, handle: StopHandle) -> Self {
        self.stop = handle;
        self
    }

    /// Handle for stopping a run from another task
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    /// Conversation of the last (or current) run
    pub fn messages(&self) -> &[Message] {
        self.state.messages()
    }

    /// Owned copy of the conversation, for session persistence
    pub fn snapshot(&self) -> Vec<Message> {
        self.state.snapshot()
    }

    /// Run a task to completion
    pub async fn run(&mut self, task: &str, context: Option<&str>) -> LoopResult {
        self.init(task, context);
        self.drive(0, None).await
    }

    /// Run a task, pushing an [`AgentEvent`] per step
    pub async fn run_streaming(
        &mut self,
        task: &str,
        context: Option<&str>,
        events: mpsc::Sender<AgentEvent>,
    ) -> LoopResult {
        self.init(task, context);
        self.drive(0, Some(&events)).await
    }

    /// Continue a saved conversation
    ///
    /// The iteration counter restarts at the number of assistant turns in
    /// `messages`; up to `max_iterations` further iterations are run.
    pub async fn resume(&mut self, messages: Vec<Message>, note: Option<&str>) -> LoopResult {
        let start = self.restore(messages, note);
        self.drive(start, None).await
    }

    /// Streaming form of [`ReactAgent::resume`]
    pub async fn resume_streaming(
        &mut self,
        messages: Vec<Message>,
        note: Option<&str>,
        events: mpsc::Sender<AgentEvent>,
    ) -> LoopResult {
        let start = self.restore(messages, note);
        self.drive(start, Some(&events)).await
    }

    fn init(&mut self, task: &str, context: Option<&str>) {
        self.state
            .reset(self.system_prompt.clone(), user_message(task, context));
        self.invoker.begin_run();
    }

    fn restore(&mut self, messages: Vec<Message>, note: Option<&str>) -> usize {
        self.state.restore(messages);
        if let Some(note) = note.map(str::trim).filter(|n| !n.is_empty()) {
            self.state.push_user(note);
        }
        self.invoker.begin_run();
        self.state.assistant_turns()
    }

    /// Run the loop from `start`; the stop handle is cleared once the run ends
    async fn drive(
        &mut self,
        start: usize,
        events: Option<&mpsc::Sender<AgentEvent>>,
    ) -> LoopResult {
        let result = self.iterate(start, events).await;
        self.stop.reset();
        result
    }

    async fn iterate(
        &mut self,
        start: usize,
        events: Option<&mpsc::Sender<AgentEvent>>,
    ) -> LoopResult {
        let limit = start.saturating_add(self.max_iterations);
        let mut iteration = start;
        let mut trace = Vec::new();

        info!(start, max_iterations = self.max_iterations, "Starting agent");
        emit(
            events,
            AgentEvent::Start {
                content: "Starting agent...".to_string(),
                iteration,
            },
        )
        .await;

        while iteration < limit {
            if self.stop.is_stopped() {
                let reason = self.stop.reason().unwrap_or_else(|| "stop requested".into());
                info!(iteration, %reason, "Agent stopped");
                emit(
                    events,
                    AgentEvent::Info {
                        content: format!("Stopped: {}", reason),
                        iteration,
                    },
                )
                .await;
                return LoopResult::unfinished(
                    Termination::Stopped,
                    iteration,
                    trace,
                    self.state.snapshot(),
                );
            }

            iteration += 1;
            info!(iteration, "Round {}", iteration);
            emit(events, AgentEvent::Iteration { iteration }).await;

            let response = self.invoker.invoke(self.state.messages()).await;
            self.state.push_assistant(response.as_str());

            let turn = self.parser.parse(&response);
            let mut entry = TraceEntry::new(iteration);
            entry.reasoning = turn.reasoning.clone();
            entry.tool_name = turn.tool_name.clone();
            entry.tool_args = turn.tool_args.clone();

            if let Some(reasoning) = &turn.reasoning {
                debug!(iteration, "Think: {}", preview(reasoning, 200));
                emit(
                    events,
                    AgentEvent::Thought {
                        content: reasoning.clone(),
                        iteration,
                    },
                )
                .await;
            }

            if let Some(answer) = turn.final_answer {
                info!(iteration, "Answer: {}", preview(&answer, 300));
                trace.push(entry);
                emit(
                    events,
                    AgentEvent::FinalAnswer {
                        content: answer.clone(),
                        iteration,
                    },
                )
                .await;
                return LoopResult::answered(answer, iteration, trace, self.state.snapshot());
            }

            match turn.tool_name {
                Some(name) => {
                    let args = turn.tool_args.unwrap_or_default();
                    info!(iteration, tool = %name, "Tool call");
                    emit(
                        events,
                        AgentEvent::Action {
                            name: name.clone(),
                            input: args.clone(),
                            iteration,
                        },
                    )
                    .await;

                    let observation = self
                        .dispatcher
                        .execute(&name, args, turn.embedded_code.as_deref())
                        .await;
                    debug!(iteration, "Observation: {}", preview(&observation, 200));
                    emit(
                        events,
                        AgentEvent::Observation {
                            content: observation.clone(),
                            iteration,
                        },
                    )
                    .await;

                    self.state.push_user(observation_message(&observation));
                    entry.observation = Some(observation);
                }
                None => {
                    warn!(iteration, "No tool call or answer found");
                    emit(
                        events,
                        AgentEvent::Info {
                            content: "Waiting for proper response format...".to_string(),
                            iteration,
                        },
                    )
                    .await;
                    self.state.push_user(FORMAT_CORRECTION);
                }
            }

            trace.push(entry);
        }

        warn!(iteration, "Max iterations reached");
        emit(
            events,
            AgentEvent::Info {
                content: format!(
                    "Reached max iterations ({}). Session can be continued.",
                    self.max_iterations
                ),
                iteration,
            },
        )
        .await;
        LoopResult::unfinished(Termination::Budget, iteration, trace, self.state.snapshot())
    }
}

async fn emit(events: Option<&mpsc::Sender<AgentEvent>>, event: AgentEvent) {
    if let Some(tx) = events {
        let _ = tx.send(event).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relab_provider::{CallOptions, RetryConfig, ScriptedProvider};
    use relab_tool::ToolOutput;

    fn agent(replies: &[&str]) -> ReactAgent {
        let provider = Arc::new(ScriptedProvider::new(replies.iter().copied()));
        let invoker = ModelInvoker::new(
            provider,
            CallOptions::default(),
            RetryConfig::no_retry(),
            false,
        );
        let mut registry = ToolRegistry::new();
        registry
            .register_fn("echo", "Echo v", &[("v", "Value")], |args| {
                Ok(ToolOutput::text(
                    args.get("v").and_then(|v| v.as_str()).unwrap_or_default(),
                ))
            })
            .unwrap();
        ReactAgent::new(invoker, ToolDispatcher::new(Arc::new(registry)))
    }

    #[test]
    fn test_user_message_with_context() {
        assert_eq!(user_message("do it", None), "do it");
        assert_eq!(user_message("do it", Some("  ")), "do it");
        assert_eq!(
            user_message("do it", Some("notes")),
            "Context:\nnotes\n\nTask:\ndo it"
        );
    }

    #[test]
    fn test_observation_message() {
        assert_eq!(
            observation_message("hi"),
            "<tool_response>\nhi\n</tool_response>"
        );
    }

    #[test]
    fn test_default_prompt_lists_tools() {
        let agent = agent(&[]);
        assert!(agent.system_prompt().contains("\"name\":\"echo\""));
        assert_eq!(agent.max_iterations(), DEFAULT_MAX_ITERATIONS);
    }

    #[tokio::test]
    async fn test_init_resets_conversation() {
        let mut agent = agent(&["<answer>one</answer>", "<answer>two</answer>"]);

        let first = agent.run("first", None).await;
        assert_eq!(first.answer.as_deref(), Some("one"));
        assert_eq!(agent.messages().len(), 3);

        let second = agent.run("second", Some("ctx")).await;
        assert_eq!(second.answer.as_deref(), Some("two"));
        assert_eq!(second.iterations_used, 1);
        assert_eq!(agent.messages().len(), 3);
        assert_eq!(
            agent.messages()[1].content,
            "Context:\nctx\n\nTask:\nsecond"
        );
    }

    #[tokio::test]
    async fn test_stop_requested_before_run_is_honored() {
        let mut agent = agent(&["<answer>ok</answer>"]);
        let handle = agent.stop_handle();
        handle.stop("early");

        let result = agent.run("task", None).await;
        assert!(result.is_stopped());
        assert_eq!(result.iterations_used, 0);
        assert!(result.trace.is_empty());
        assert!(!handle.is_stopped());

        // cleared at the end of the stopped run
        let next = agent.run("task", None).await;
        assert!(next.success);
        assert_eq!(next.answer.as_deref(), Some("ok"));
    }
}
