//! # relab-foundation
//!
//! Foundation layer for relab:
//! - Error: 공용 에러 타입 (`Error`, `Result`)
//! - Config: 통합 설정 (`RelabConfig`)
//! - Storage: JsonStore (설정, 세션 파일)

pub mod config;
pub mod error;
pub mod storage;

// ============================================================================
// Error
// ============================================================================
pub use error::{Error, Result};

// ============================================================================
// Config (설정)
// ============================================================================
pub use config::{
    AgentSettings, ExecutionSettings, FileSettings, ModelSettings, RelabConfig, WorkspaceSettings,
    RELAB_CONFIG_FILE,
};

// ============================================================================
// Storage (저장소)
// ============================================================================
pub use storage::JsonStore;
