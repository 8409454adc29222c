//! Session management
//!
//! A session is the persisted record of one task: its steps, the
//! conversation needed to resume it, and its status. Sessions are plain data;
//! [`SessionStore`] writes them as `session_{id}.json`.

use crate::event::AgentEvent;
use crate::trace::{LoopResult, Termination, TraceEntry};
use chrono::{DateTime, Local, Utc};
use relab_foundation::{Error, JsonStore, Result, WorkspaceSettings};
use relab_provider::Message;
use relab_tool::ToolArgs;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use tracing::{debug, warn};
use uuid::Uuid;

const FILE_PREFIX: &str = "session_";
const FILE_SUFFIX: &str = ".json";
const TASK_PREVIEW_CHARS: usize = 100;

/// Session lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    InProgress,
    Paused,
    Completed,
    Stopped,
    Error,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::InProgress => "in_progress",
            SessionStatus::Paused => "paused",
            SessionStatus::Completed => "completed",
            SessionStatus::Stopped => "stopped",
            SessionStatus::Error => "error",
        }
    }

    /// Can be continued with `resume`
    pub fn is_resumable(&self) -> bool {
        matches!(self, SessionStatus::InProgress | SessionStatus::Paused)
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of a logged step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepType {
    Thought,
    Action,
    Observation,
    FinalAnswer,
    Info,
    Error,
}

/// One logged step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionStep {
    pub iteration: usize,
    #[serde(rename = "type")]
    pub step_type: StepType,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_input: Option<ToolArgs>,
}

impl SessionStep {
    pub fn new(step_type: StepType, content: impl Into<String>, iteration: usize) -> Self {
        Self {
            iteration,
            step_type,
            content: content.into(),
            timestamp: Utc::now(),
            action_name: None,
            action_input: None,
        }
    }

    pub fn with_action(mut self, name: impl Into<String>, input: ToolArgs) -> Self {
        self.action_name = Some(name.into());
        self.action_input = Some(input);
        self
    }
}

/// Generate `YYYYmmdd_HHMMSS_<6 hex>`
pub fn generate_session_id() -> String {
    let suffix: String = Uuid::new_v4().simple().to_string().chars().take(6).collect();
    format!("{}_{}", Local::now().format("%Y%m%d_%H%M%S"), suffix)
}

fn file_name(session_id: &str) -> String {
    format!("{}{}{}", FILE_PREFIX, session_id, FILE_SUFFIX)
}

/// A persisted agent run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub session_id: String,
    pub task: String,
    #[serde(default)]
    pub steps: Vec<SessionStep>,
    pub status: SessionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub final_result: Option<Value>,
    #[serde(default)]
    pub context: Vec<Message>,
    #[serde(default)]
    pub current_iteration: usize,
    #[serde(default)]
    pub max_iterations: usize,
    #[serde(default)]
    pub step_count: usize,
    #[serde(default)]
    pub total_runtime_seconds: u64,
    #[serde(default)]
    pub last_run_start: Option<DateTime<Utc>>,
}

impl Session {
    /// Create a new session with a generated id
    pub fn new(task: impl Into<String>, max_iterations: usize) -> Self {
        Self::with_id(generate_session_id(), task, max_iterations)
    }

    /// Create a session with a specific ID
    pub fn with_id(id: impl Into<String>, task: impl Into<String>, max_iterations: usize) -> Self {
        let now = Utc::now();
        Self {
            session_id: id.into(),
            task: task.into(),
            steps: Vec::new(),
            status: SessionStatus::InProgress,
            created_at: now,
            updated_at: now,
            final_result: None,
            context: Vec::new(),
            current_iteration: 0,
            max_iterations,
            step_count: 0,
            total_runtime_seconds: 0,
            last_run_start: None,
        }
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
        self.step_count = self.steps.len();
    }

    /// Append a step; iteration 0 means "current iteration"
    pub fn add_step(&mut self, mut step: SessionStep) {
        if step.iteration == 0 {
            step.iteration = self.current_iteration;
        } else {
            self.current_iteration = step.iteration;
        }
        self.steps.push(step);
        self.touch();
    }

    /// Log one streaming event
    ///
    /// `start` is not logged and `iteration` only advances the counter.
    pub fn record_event(&mut self, event: &AgentEvent) {
        let step = match event {
            AgentEvent::Start { .. } => return,
            AgentEvent::Iteration { iteration } => {
                self.current_iteration = *iteration;
                self.touch();
                return;
            }
            AgentEvent::Thought { content, iteration } => {
                SessionStep::new(StepType::Thought, content.as_str(), *iteration)
            }
            AgentEvent::Action {
                name,
                input,
                iteration,
            } => SessionStep::new(StepType::Action, name.as_str(), *iteration)
                .with_action(name.as_str(), input.clone()),
            AgentEvent::Observation { content, iteration } => {
                SessionStep::new(StepType::Observation, content.as_str(), *iteration)
            }
            AgentEvent::FinalAnswer { content, iteration } => {
                SessionStep::new(StepType::FinalAnswer, content.as_str(), *iteration)
            }
            AgentEvent::Info { content, iteration } => {
                SessionStep::new(StepType::Info, content.as_str(), *iteration)
            }
        };
        self.add_step(step);
    }

    /// Log a finished trace, one to three steps per entry
    pub fn record_trace(&mut self, trace: &[TraceEntry]) {
        for entry in trace {
            if let Some(reasoning) = &entry.reasoning {
                self.add_step(SessionStep::new(
                    StepType::Thought,
                    reasoning.as_str(),
                    entry.iteration,
                ));
            }
            if let Some(name) = &entry.tool_name {
                self.add_step(
                    SessionStep::new(StepType::Action, name.as_str(), entry.iteration)
                        .with_action(name.as_str(), entry.tool_args.clone().unwrap_or_default()),
                );
            }
            if let Some(observation) = &entry.observation {
                self.add_step(SessionStep::new(
                    StepType::Observation,
                    observation.as_str(),
                    entry.iteration,
                ));
            }
        }
    }

    /// Replace the saved conversation
    pub fn update_context(&mut self, messages: Vec<Message>) {
        self.context = messages;
        self.touch();
    }

    pub fn set_status(&mut self, status: SessionStatus) {
        self.status = status;
        self.touch();
    }

    /// Store the final result and mark as completed
    pub fn set_final_result(&mut self, result: Value) {
        self.final_result = Some(result);
        self.set_status(SessionStatus::Completed);
    }

    /// Fold a loop result into the session and stop the timer
    pub fn apply_result(&mut self, result: &LoopResult) {
        self.context = result.final_messages.clone();
        self.current_iteration = result.iterations_used;
        self.stop_timer();

        let summary = json!({
            "success": result.success,
            "answer": result.answer,
            "iterations_used": result.iterations_used,
            "error": result.error,
        });

        if result.success {
            self.set_final_result(summary);
            return;
        }
        self.final_result = Some(summary);
        let status = match result.termination {
            Termination::Stopped => SessionStatus::Stopped,
            Termination::Budget => SessionStatus::Paused,
            Termination::Answer => SessionStatus::Error,
        };
        self.set_status(status);
    }

    /// Pause for later continuation
    pub fn pause(&mut self) {
        self.stop_timer();
        self.set_status(SessionStatus::Paused);
    }

    /// Continue a paused session
    pub fn resume(&mut self) {
        self.status = SessionStatus::InProgress;
        self.start_timer();
    }

    pub fn start_timer(&mut self) {
        self.last_run_start = Some(Utc::now());
        self.touch();
    }

    /// Accumulate runtime since `start_timer`
    pub fn stop_timer(&mut self) {
        if let Some(start) = self.last_run_start.take() {
            let elapsed = (Utc::now() - start).num_seconds().max(0);
            self.total_runtime_seconds += elapsed as u64;
        }
        self.touch();
    }

    /// Steps grouped by iteration
    pub fn steps_by_iteration(&self) -> BTreeMap<usize, Vec<&SessionStep>> {
        let mut grouped: BTreeMap<usize, Vec<&SessionStep>> = BTreeMap::new();
        for step in &self.steps {
            grouped.entry(step.iteration).or_default().push(step);
        }
        grouped
    }

    pub fn summary(&self) -> String {
        let count = |kind: StepType| self.steps.iter().filter(|s| s.step_type == kind).count();
        format!(
            "Session {}: {} thoughts, {} actions, status={}",
            self.session_id,
            count(StepType::Thought),
            count(StepType::Action),
            self.status
        )
    }

    pub fn is_resumable(&self) -> bool {
        self.status.is_resumable()
    }
}

/// Listing entry for a stored session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub status: SessionStatus,
    pub created_at: DateTime<Utc>,
    pub step_count: usize,
    pub task: String,
}

impl SessionSummary {
    fn from_session(session: &Session) -> Self {
        let task = if session.task.chars().count() > TASK_PREVIEW_CHARS {
            format!(
                "{}...",
                session.task.chars().take(TASK_PREVIEW_CHARS).collect::<String>()
            )
        } else {
            session.task.clone()
        };
        Self {
            session_id: session.session_id.clone(),
            status: session.status,
            created_at: session.created_at,
            step_count: session.steps.len(),
            task,
        }
    }
}

/// Session files under one directory
#[derive(Debug, Clone)]
pub struct SessionStore {
    store: JsonStore,
}

impl SessionStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            store: JsonStore::new(dir),
        }
    }

    /// Store rooted at the workspace `sessionsDir`
    pub fn from_workspace(workspace: &WorkspaceSettings) -> Self {
        Self::new(workspace.sessions_dir())
    }

    pub fn dir(&self) -> &std::path::Path {
        self.store.base_dir()
    }

    pub fn path_of(&self, session_id: &str) -> PathBuf {
        self.store.file_path(&file_name(session_id))
    }

    pub fn save(&self, session: &Session) -> Result<()> {
        debug!(session = %session.session_id, steps = session.steps.len(), "Saving session");
        self.store.save(&file_name(&session.session_id), session)
    }

    pub fn load(&self, session_id: &str) -> Result<Session> {
        self.store
            .load_optional(&file_name(session_id))?
            .ok_or_else(|| Error::NotFound(format!("session {}", session_id)))
    }

    pub fn exists(&self, session_id: &str) -> bool {
        self.store.exists(&file_name(session_id))
    }

    pub fn remove(&self, session_id: &str) -> Result<()> {
        self.store.remove(&file_name(session_id))
    }

    /// All readable sessions, newest first
    pub fn list(&self) -> Result<Vec<SessionSummary>> {
        let mut sessions = Vec::new();
        for name in self.store.list(FILE_PREFIX, FILE_SUFFIX)? {
            match self.store.load::<Session>(&name) {
                Ok(session) => sessions.push(SessionSummary::from_session(&session)),
                Err(e) => warn!("Skipping unreadable session file {}: {}", name, e),
            }
        }
        sessions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(sessions)
    }

    /// Most recently created session
    pub fn latest(&self) -> Result<Option<Session>> {
        match self.list()?.first() {
            Some(summary) => self.load(&summary.session_id).map(Some),
            None => Ok(None),
        }
    }

    /// Sessions that are paused or still in progress
    pub fn resumable(&self) -> Result<Vec<SessionSummary>> {
        Ok(self
            .list()?
            .into_iter()
            .filter(|s| s.status.is_resumable())
            .collect())
    }
}

// ============================================================================
// 테스트
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn args(pairs: &[(&str, &str)]) -> ToolArgs {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), Value::String(v.to_string())))
            .collect()
    }

    #[test]
    fn test_session_id_format() {
        let id = generate_session_id();
        let parts: Vec<&str> = id.split('_').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0].len(), 8);
        assert_eq!(parts[1].len(), 6);
        assert_eq!(parts[2].len(), 6);
        assert!(parts[2].chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(generate_session_id(), id);
    }

    #[test]
    fn test_step_wire_shape() {
        let step = SessionStep::new(StepType::Action, "read_file", 2)
            .with_action("read_file", args(&[("file_path", "a.txt")]));
        let value = serde_json::to_value(&step).unwrap();
        assert_eq!(value["type"], "action");
        assert_eq!(value["iteration"], 2);
        assert_eq!(value["action_name"], "read_file");
        assert_eq!(value["action_input"]["file_path"], "a.txt");

        let thought = serde_json::to_value(SessionStep::new(StepType::FinalAnswer, "x", 1)).unwrap();
        assert_eq!(thought["type"], "final_answer");
        assert!(thought.get("action_name").is_none());
    }

    #[test]
    fn test_record_events() {
        let mut session = Session::with_id("s1", "task", 5);
        session.record_event(&AgentEvent::Start {
            content: "Starting agent...".into(),
            iteration: 0,
        });
        session.record_event(&AgentEvent::Iteration { iteration: 1 });
        session.record_event(&AgentEvent::Thought {
            content: "plan".into(),
            iteration: 1,
        });
        session.record_event(&AgentEvent::Action {
            name: "echo".into(),
            input: args(&[("v", "hi")]),
            iteration: 1,
        });
        session.record_event(&AgentEvent::Observation {
            content: "hi".into(),
            iteration: 1,
        });
        session.record_event(&AgentEvent::Iteration { iteration: 2 });
        session.record_event(&AgentEvent::FinalAnswer {
            content: "done".into(),
            iteration: 2,
        });

        assert_eq!(session.steps.len(), 4);
        assert_eq!(session.step_count, 4);
        assert_eq!(session.current_iteration, 2);
        assert_eq!(session.steps[1].action_name.as_deref(), Some("echo"));

        let grouped = session.steps_by_iteration();
        assert_eq!(grouped[&1].len(), 3);
        assert_eq!(grouped[&2][0].step_type, StepType::FinalAnswer);
        assert_eq!(
            session.summary(),
            "Session s1: 1 thoughts, 1 actions, status=in_progress"
        );
    }

    #[test]
    fn test_record_trace_splits_entries() {
        let mut first = TraceEntry::new(1);
        first.reasoning = Some("think".into());
        first.tool_name = Some("echo".into());
        first.tool_args = Some(args(&[("v", "hi")]));
        first.observation = Some("hi".into());
        let second = TraceEntry::new(2);

        let mut session = Session::with_id("s2", "task", 5);
        session.record_trace(&[first, second]);

        let kinds: Vec<StepType> = session.steps.iter().map(|s| s.step_type).collect();
        assert_eq!(
            kinds,
            vec![StepType::Thought, StepType::Action, StepType::Observation]
        );
        assert!(session.steps.iter().all(|s| s.iteration == 1));
    }

    #[test]
    fn test_apply_result_status() {
        let mut session = Session::with_id("s3", "task", 2);
        session.start_timer();
        let exhausted = LoopResult::unfinished(
            Termination::Budget,
            2,
            vec![],
            vec![Message::system("sys"), Message::user("task")],
        );
        session.apply_result(&exhausted);
        assert_eq!(session.status, SessionStatus::Paused);
        assert!(session.is_resumable());
        assert!(session.last_run_start.is_none());
        assert_eq!(session.context.len(), 2);
        assert_eq!(session.current_iteration, 2);
        assert_eq!(
            session.final_result.as_ref().unwrap()["error"],
            "Max iterations reached"
        );

        let stopped = LoopResult::unfinished(Termination::Stopped, 1, vec![], vec![]);
        session.apply_result(&stopped);
        assert_eq!(session.status, SessionStatus::Stopped);
        assert!(!session.is_resumable());

        let done = LoopResult::answered("42".into(), 3, vec![], vec![]);
        session.apply_result(&done);
        assert_eq!(session.status, SessionStatus::Completed);
        assert_eq!(session.final_result.as_ref().unwrap()["answer"], "42");
    }

    #[test]
    fn test_timer_accumulates() {
        let mut session = Session::with_id("s4", "task", 2);
        session.last_run_start = Some(Utc::now() - Duration::seconds(30));
        session.pause();
        assert_eq!(session.status, SessionStatus::Paused);
        assert!(session.total_runtime_seconds >= 30);

        session.resume();
        assert_eq!(session.status, SessionStatus::InProgress);
        assert!(session.last_run_start.is_some());
    }

    #[test]
    fn test_store_roundtrip_and_missing() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path());

        let mut session = Session::with_id("20240101_000000_abcdef", "task", 3);
        session.add_step(SessionStep::new(StepType::Thought, "t", 1));
        session.update_context(vec![Message::user("task")]);
        store.save(&session).unwrap();

        assert!(store.path_of(&session.session_id).exists());
        assert!(store
            .path_of(&session.session_id)
            .ends_with("session_20240101_000000_abcdef.json"));

        let loaded = store.load(&session.session_id).unwrap();
        assert_eq!(loaded.steps, session.steps);
        assert_eq!(loaded.context, session.context);
        assert_eq!(loaded.status, SessionStatus::InProgress);

        let err = store.load("nope").unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn test_store_list_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path());
        assert!(store.list().unwrap().is_empty());
        assert!(store.latest().unwrap().is_none());

        let mut old = Session::with_id("old", "old task", 3);
        old.created_at = Utc::now() - Duration::hours(1);
        old.set_status(SessionStatus::Completed);
        store.save(&old).unwrap();

        let long_task = "x".repeat(150);
        let mut new = Session::with_id("new", long_task, 3);
        new.set_status(SessionStatus::Paused);
        store.save(&new).unwrap();

        std::fs::write(dir.path().join("session_broken.json"), "{not json").unwrap();
        std::fs::write(dir.path().join("other.json"), "{}").unwrap();

        let listed = store.list().unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].session_id, "new");
        assert_eq!(listed[0].task.chars().count(), 103);
        assert!(listed[0].task.ends_with("..."));
        assert_eq!(listed[1].task, "old task");

        let resumable = store.resumable().unwrap();
        assert_eq!(resumable.len(), 1);
        assert_eq!(resumable[0].session_id, "new");

        assert_eq!(store.latest().unwrap().unwrap().session_id, "new");

        store.remove("new").unwrap();
        assert!(!store.exists("new"));
    }
}
