//! # relab-agent
//!
//! ReAct 에이전트 루프 구현입니다.
//!
//! ## 핵심 원칙
//!
//! 1. **One step at a time** - 모델 호출, 파싱, 도구 실행이 순차적으로 한 번씩
//! 2. **Failures are data** - 잘못된 응답과 도구 오류는 관찰 텍스트로 되돌아감
//! 3. **Flat History** - 단순한 ConversationState
//!
//! ## 핵심 컴포넌트
//!
//! - **ResponseParser**: 태그 문법 + 레거시 `Action:` 문법 파서
//! - **ReactAgent**: 메인 루프 (run / run_streaming / resume)
//! - **StopHandle**: 반복 경계에서 확인되는 중단 플래그
//! - **SessionStore**: `session_{id}.json` 저장/조회
//!
//! ## 사용 예
//!
//! ```ignore
//! use relab_agent::{ReactAgent, AgentEvent};
//!
//! let mut agent = ReactAgent::from_config(provider, registry, &config);
//! let stop = agent.stop_handle();
//!
//! let (tx, mut rx) = tokio::sync::mpsc::channel(100);
//! let result = agent.run_streaming("Simulate ...", None, tx).await;
//!
//! // 다른 태스크에서 중단
//! stop.stop("user requested");
//! ```

pub mod agent;
pub mod event;
pub mod history;
pub mod parser;
pub mod prompt;
pub mod session;
pub mod steering;
pub mod trace;

pub use agent::{observation_message, user_message, ReactAgent, DEFAULT_MAX_ITERATIONS};
pub use event::AgentEvent;
pub use history::ConversationState;
pub use parser::{ParsedTurn, ResponseParser};
pub use prompt::SystemPromptBuilder;
pub use session::{
    generate_session_id, Session, SessionStatus, SessionStep, SessionStore, SessionSummary,
    StepType,
};
pub use steering::StopHandle;
pub use trace::{
    LoopResult, Termination, TraceEntry, FORMAT_CORRECTION, MAX_ITERATIONS_ERROR, STOPPED_ERROR,
};
