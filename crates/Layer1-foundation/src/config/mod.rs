//! Config - 통합 설정 관리
//!
//! - `relab.rs` - RelabConfig 통합 설정 (model / agent / workspace / execution / files)

mod relab;

pub use relab::{
    merge_json, AgentSettings, ExecutionSettings, FileSettings, ModelSettings, RelabConfig,
    WorkspaceSettings, DEFAULT_API_KEY_ENV, ENV_BASE_URL, ENV_MODEL, RELAB_CONFIG_FILE,
};
