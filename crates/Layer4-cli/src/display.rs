//! Terminal output for events, results and listings

use relab_agent::{AgentEvent, LoopResult, SessionSummary};
use relab_tool::ToolDef;

const OBSERVATION_PREVIEW: usize = 500;
const THOUGHT_PREVIEW: usize = 300;

/// Print one streamed event
pub fn print_event(event: &AgentEvent) {
    match event {
        AgentEvent::Start { content, .. } => println!("{}", content),
        AgentEvent::Iteration { iteration } => {
            println!("\n{} Round {} {}", "─".repeat(16), iteration, "─".repeat(16));
        }
        AgentEvent::Thought { content, .. } => {
            println!("💭 {}", truncate(content, THOUGHT_PREVIEW));
        }
        AgentEvent::Action { name, input, .. } => {
            let input = serde_json::to_string(input).unwrap_or_default();
            println!("⚡ {} {}", name, truncate(&input, 150));
        }
        AgentEvent::Observation { content, .. } => {
            println!("👁 {}", truncate(content, OBSERVATION_PREVIEW));
        }
        AgentEvent::FinalAnswer { content, .. } => {
            println!("\n✅ Answer:\n{}", content);
        }
        AgentEvent::Info { content, .. } => println!("ℹ {}", content),
    }
}

/// Print the closing summary line of a run
pub fn print_result(result: &LoopResult) {
    println!(
        "\nsuccess={} iterations_used={} error={}",
        result.success,
        result.iterations_used,
        result.error.as_deref().unwrap_or("-")
    );
}

pub fn print_sessions(sessions: &[SessionSummary]) {
    if sessions.is_empty() {
        println!("No sessions found.");
        return;
    }

    println!("\n📋 Sessions\n");
    println!(
        "{:<24} {:<12} {:<20} {:<6} {}",
        "ID", "Status", "Created", "Steps", "Task"
    );
    println!("{}", "-".repeat(100));

    for session in sessions {
        let created = session
            .created_at
            .with_timezone(&chrono::Local)
            .format("%Y-%m-%d %H:%M:%S");
        println!(
            "{:<24} {:<12} {:<20} {:<6} {}",
            session.session_id,
            session.status.as_str(),
            created,
            session.step_count,
            truncate(&session.task, 40)
        );
    }

    println!("\nUse 'relab resume <ID>' to continue a paused session.\n");
}

pub fn print_tools(tools: &[ToolDef]) {
    for tool in tools {
        println!("{} - {}", tool.name, tool.description);
        for param in &tool.parameters {
            let optional = if param.required { "" } else { " (optional)" };
            println!("    {}{}: {}", param.name, optional, param.description);
        }
    }
}

/// Single-line, char-safe truncation for display
pub fn truncate(s: &str, max_chars: usize) -> String {
    let s = s.replace('\n', " ");
    if s.chars().count() <= max_chars {
        s
    } else {
        format!("{}...", s.chars().take(max_chars).collect::<String>())
    }
}
