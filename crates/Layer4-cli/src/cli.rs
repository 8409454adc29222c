//! Non-interactive commands: run, resume, sessions, tools

use crate::display;
use anyhow::{bail, Context};
use relab_agent::{
    AgentEvent, LoopResult, ReactAgent, Session, SessionStatus, SessionStore, StopHandle,
};
use relab_foundation::RelabConfig;
use relab_provider::{Message, OpenAiCompatProvider};
use relab_tool::ToolRegistry;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Exit status after a forced second Ctrl-C
const INTERRUPTED_EXIT: i32 = 130;

/// Options of `relab run`
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub task: String,
    pub context: Option<String>,
    pub max_iterations: usize,
    pub record: bool,
}

/// What the agent should do once built
enum Start {
    Task { task: String, context: Option<String> },
    Resume { messages: Vec<Message>, note: Option<String> },
}

/// Recording target for a run
type Recorder = Option<(Session, SessionStore)>;

fn build_agent(config: &RelabConfig) -> anyhow::Result<ReactAgent> {
    config
        .workspace
        .ensure_directories()
        .context("Failed to create workspace directories")?;

    if config.api_key().is_none() {
        warn!(
            "No API key in ${}; requests are sent without authorization",
            config.model.api_key_env
        );
    }

    let provider = OpenAiCompatProvider::from_settings(&config.model, config.api_key())?;
    let registry = ToolRegistry::with_builtins(config)?;
    info!(
        model = %config.model.model,
        endpoint = provider.endpoint(),
        tools = registry.len(),
        "Agent ready"
    );

    Ok(ReactAgent::from_config(
        Arc::new(provider),
        Arc::new(registry),
        config,
    ))
}

/// Run a new task
pub async fn run_task(config: &RelabConfig, options: RunOptions) -> anyhow::Result<LoopResult> {
    let config = config.clone().with_max_iterations(options.max_iterations);
    let mut agent = build_agent(&config)?;

    let recorder = if options.record {
        let store = SessionStore::from_workspace(&config.workspace);
        let mut session = Session::new(options.task.clone(), options.max_iterations);
        session.start_timer();
        store.save(&session)?;
        println!("Session: {}", session.session_id);
        Some((session, store))
    } else {
        None
    };

    drive(
        &mut agent,
        Start::Task {
            task: options.task,
            context: options.context,
        },
        recorder,
    )
    .await
}

/// Continue a saved session
pub async fn resume_session(
    config: &RelabConfig,
    session_id: &str,
    note: Option<String>,
    max_iterations: Option<usize>,
) -> anyhow::Result<LoopResult> {
    let store = SessionStore::from_workspace(&config.workspace);
    let mut session = store.load(session_id)?;

    if session.status == SessionStatus::Completed {
        bail!("Session {} is already completed", session_id);
    }
    if session.context.is_empty() {
        bail!("Session {} has no saved conversation", session_id);
    }

    let max_iterations = max_iterations.unwrap_or(session.max_iterations.max(1));
    let config = config.clone().with_max_iterations(max_iterations);
    let mut agent = build_agent(&config)?;

    session.max_iterations = max_iterations;
    session.resume();
    store.save(&session)?;
    println!(
        "Resuming session {} at iteration {}",
        session.session_id, session.current_iteration
    );

    let messages = session.context.clone();
    drive(&mut agent, Start::Resume { messages, note }, Some((session, store))).await
}

/// Print stored sessions, newest first
pub fn list_sessions(config: &RelabConfig, limit: usize) -> anyhow::Result<()> {
    let store = SessionStore::from_workspace(&config.workspace);
    let sessions: Vec<_> = store.list()?.into_iter().take(limit).collect();
    display::print_sessions(&sessions);
    Ok(())
}

/// Print the builtin tool manifest
pub fn list_tools(config: &RelabConfig) -> anyhow::Result<()> {
    let registry = ToolRegistry::with_builtins(config)?;
    display::print_tools(&registry.manifest());
    Ok(())
}

async fn drive(agent: &mut ReactAgent, start: Start, recorder: Recorder) -> anyhow::Result<LoopResult> {
    let (tx, rx) = mpsc::channel(100);
    let consumer = spawn_consumer(rx, recorder);

    let stop = agent.stop_handle();
    let signal = tokio::spawn(async move {
        if watch_interrupts(stop, tokio::signal::ctrl_c).await {
            eprintln!("\nInterrupted again, exiting");
            std::process::exit(INTERRUPTED_EXIT);
        }
    });

    let result = match start {
        Start::Task { task, context } => {
            agent
                .run_streaming(&task, context.as_deref(), tx)
                .await
        }
        Start::Resume { messages, note } => {
            agent
                .resume_streaming(messages, note.as_deref(), tx)
                .await
        }
    };
    signal.abort();

    // the sender was moved into the run, so the consumer drains and exits
    let recorder = consumer.await.context("Event consumer failed")?;
    if let Some((mut session, store)) = recorder {
        session.apply_result(&result);
        store.save(&session)?;
        println!("{}", session.summary());
        println!("Saved to {}", store.path_of(&session.session_id).display());
    }

    display::print_result(&result);
    Ok(result)
}

/// First interrupt asks the agent to stop at the next iteration boundary.
/// Returns `true` when a second interrupt arrives before the run ends.
async fn watch_interrupts<F, Fut>(stop: StopHandle, mut interrupt: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::io::Result<()>>,
{
    if interrupt().await.is_err() {
        return false;
    }
    eprintln!("\nStop requested, finishing the current step... (Ctrl-C again to quit)");
    stop.stop("interrupted");

    interrupt().await.is_ok()
}

fn spawn_consumer(mut rx: mpsc::Receiver<AgentEvent>, recorder: Recorder) -> JoinHandle<Recorder> {
    tokio::spawn(async move {
        let mut recorder = recorder;
        while let Some(event) = rx.recv().await {
            display::print_event(&event);
            if let Some((session, store)) = recorder.as_mut() {
                session.record_event(&event);
                if let Err(e) = store.save(session) {
                    warn!("Failed to save session: {}", e);
                }
            }
        }
        recorder
    })
}
