//! Relab Config - 통합 설정
//!
//! Global (`<config_dir>/relab/config.json`) and project (`.relab/config.json`)
//! files are merged key by key, project last, then environment overrides apply.

use crate::storage::JsonStore;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};

/// 설정 파일명
pub const RELAB_CONFIG_FILE: &str = "config.json";

/// Overrides `model.baseUrl`
pub const ENV_BASE_URL: &str = "RELAB_BASE_URL";

/// Overrides `model.model`
pub const ENV_MODEL: &str = "RELAB_MODEL";

/// Default name of the variable holding the API key
pub const DEFAULT_API_KEY_ENV: &str = "RELAB_API_KEY";

// ============================================================================
// Relab Config (통합)
// ============================================================================

/// relab 통합 설정
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RelabConfig {
    pub model: ModelSettings,
    pub agent: AgentSettings,
    pub workspace: WorkspaceSettings,
    pub execution: ExecutionSettings,
    pub files: FileSettings,
}

impl RelabConfig {
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // Load / Save
    // ========================================================================

    /// 글로벌 + 프로젝트 병합 로드
    pub fn load() -> Result<Self> {
        let mut merged = Value::Object(Default::default());

        // 1. 글로벌 설정
        if let Ok(global) = JsonStore::global() {
            if let Some(value) = global.load_optional::<Value>(RELAB_CONFIG_FILE)? {
                merge_json(&mut merged, value);
            }
        }

        // 2. 프로젝트 설정
        if let Ok(project) = JsonStore::current_project() {
            if let Some(value) = project.load_optional::<Value>(RELAB_CONFIG_FILE)? {
                merge_json(&mut merged, value);
            }
        }

        let mut config = Self::from_value(merged)?;
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Load a single explicit config file (no global/project merge)
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read {}: {}", path.display(), e)))?;
        let value: Value = serde_json::from_str(&content)
            .map_err(|e| Error::Config(format!("Failed to parse {}: {}", path.display(), e)))?;

        let mut config = Self::from_value(value)?;
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    fn from_value(value: Value) -> Result<Self> {
        serde_json::from_value(value)
            .map_err(|e| Error::Config(format!("Invalid configuration: {}", e)))
    }

    /// 프로젝트 설정 저장
    pub fn save_project(&self) -> Result<()> {
        let store = JsonStore::current_project()?;
        store.save(RELAB_CONFIG_FILE, self)
    }

    /// Apply environment overrides through `lookup`
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_BASE_URL).filter(|v| !v.is_empty()) {
            self.model.base_url = url;
        }
        if let Some(model) = lookup(ENV_MODEL).filter(|v| !v.is_empty()) {
            self.model.model = model;
        }
    }

    /// API key from the configured environment variable
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.model.api_key_env)
            .ok()
            .filter(|key| !key.is_empty())
    }

    // ========================================================================
    // Builder
    // ========================================================================

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model.model = model.into();
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.model.base_url = url.into();
        self
    }

    pub fn with_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.workspace.base_dir = dir.into();
        self
    }

    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.agent.max_iterations = max;
        self
    }
}

/// Deep-merge `overlay` into `base`; objects merge per key, anything else replaces.
pub fn merge_json(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            for (key, value) in overlay_map {
                match base_map.get_mut(&key) {
                    Some(existing) => merge_json(existing, value),
                    None => {
                        base_map.insert(key, value);
                    }
                }
            }
        }
        (slot, value) => *slot = value,
    }
}

// ============================================================================
// Model Settings
// ============================================================================

/// Chat-completion endpoint and sampling parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ModelSettings {
    /// OpenAI-compatible base URL (without `/chat/completions`)
    pub base_url: String,
    pub model: String,
    /// Name of the environment variable holding the API key
    pub api_key_env: String,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Per-request wall-clock bound
    pub timeout_secs: u64,
    /// Ask for extended reasoning on the first attempt
    pub thinking: bool,
    pub stop_sequences: Vec<String>,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key_env: DEFAULT_API_KEY_ENV.to_string(),
            temperature: 0.7,
            max_tokens: 4096,
            timeout_secs: 120,
            thinking: true,
            stop_sequences: vec!["<tool_response>".to_string()],
        }
    }
}

// ============================================================================
// Agent Settings
// ============================================================================

/// Loop budget and retry policy
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AgentSettings {
    pub max_iterations: usize,
    /// Retries after the first failed model call
    pub max_retries: u32,
    pub retry_base_delay_ms: u64,
    /// Spread retry delays by +-20%
    pub retry_jitter: bool,
    /// Tool that receives the extracted `<code>` block
    pub code_tool: String,
    /// Argument name the code block is injected under
    pub code_param: String,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            max_iterations: 20,
            max_retries: 3,
            retry_base_delay_ms: 1000,
            retry_jitter: false,
            code_tool: "run_code".to_string(),
            code_param: "code".to_string(),
        }
    }
}

// ============================================================================
// Workspace Settings
// ============================================================================

/// Directory layout; relative entries resolve against `base_dir`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WorkspaceSettings {
    pub base_dir: PathBuf,
    pub output_dir: PathBuf,
    pub scripts_dir: PathBuf,
    pub results_dir: PathBuf,
    pub figures_dir: PathBuf,
    pub events_dir: PathBuf,
    pub sessions_dir: PathBuf,
}

impl Default for WorkspaceSettings {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from("."),
            output_dir: PathBuf::from("output"),
            scripts_dir: PathBuf::from("workspace/scripts"),
            results_dir: PathBuf::from("workspace/results"),
            figures_dir: PathBuf::from("workspace/figures"),
            events_dir: PathBuf::from("workspace/events"),
            sessions_dir: PathBuf::from("output/react_sessions"),
        }
    }
}

impl WorkspaceSettings {
    /// Resolve `path` against `base_dir` unless it is already absolute
    pub fn resolve(&self, path: impl AsRef<Path>) -> PathBuf {
        let path = path.as_ref();
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }

    pub fn output_dir(&self) -> PathBuf {
        self.resolve(&self.output_dir)
    }

    pub fn scripts_dir(&self) -> PathBuf {
        self.resolve(&self.scripts_dir)
    }

    pub fn results_dir(&self) -> PathBuf {
        self.resolve(&self.results_dir)
    }

    pub fn figures_dir(&self) -> PathBuf {
        self.resolve(&self.figures_dir)
    }

    pub fn events_dir(&self) -> PathBuf {
        self.resolve(&self.events_dir)
    }

    pub fn sessions_dir(&self) -> PathBuf {
        self.resolve(&self.sessions_dir)
    }

    /// Directories tools may write into
    pub fn write_roots(&self) -> Vec<PathBuf> {
        vec![
            self.output_dir(),
            self.scripts_dir(),
            self.results_dir(),
            self.figures_dir(),
            self.events_dir(),
        ]
    }

    /// Create every workspace directory
    pub fn ensure_directories(&self) -> Result<()> {
        for dir in self.write_roots().into_iter().chain([self.sessions_dir()]) {
            std::fs::create_dir_all(&dir).map_err(|e| {
                Error::Config(format!("Failed to create {}: {}", dir.display(), e))
            })?;
        }
        Ok(())
    }
}

// ============================================================================
// Execution Settings
// ============================================================================

/// Code execution limits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExecutionSettings {
    pub timeout_secs: u64,
    /// Max characters kept from stdout / stderr each
    pub max_output_size: usize,
    /// Explicit interpreter; otherwise `python3` then `python` from PATH
    #[serde(skip_serializing_if = "Option::is_none")]
    pub python: Option<PathBuf>,
}

impl Default for ExecutionSettings {
    fn default() -> Self {
        Self {
            timeout_secs: 300,
            max_output_size: 50_000,
            python: None,
        }
    }
}

// ============================================================================
// File Settings
// ============================================================================

/// File tool restrictions
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FileSettings {
    pub readable_extensions: Vec<String>,
    pub writable_extensions: Vec<String>,
    /// Bytes
    pub max_file_size: u64,
}

impl Default for FileSettings {
    fn default() -> Self {
        let exts = |list: &[&str]| list.iter().map(|s| s.to_string()).collect();
        Self {
            readable_extensions: exts(&[".tex", ".py", ".txt", ".json", ".md", ".csv", ".dat"]),
            writable_extensions: exts(&[".tex", ".py", ".txt", ".json", ".md"]),
            max_file_size: 10 * 1024 * 1024,
        }
    }
}

// ============================================================================
// 테스트
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults() {
        let config = RelabConfig::default();
        assert_eq!(config.agent.max_iterations, 20);
        assert_eq!(config.agent.max_retries, 3);
        assert_eq!(config.model.temperature, 0.7);
        assert_eq!(config.model.max_tokens, 4096);
        assert_eq!(config.model.stop_sequences, vec!["<tool_response>"]);
        assert_eq!(config.execution.timeout_secs, 300);
        assert_eq!(config.execution.max_output_size, 50_000);
        assert!(config.files.readable_extensions.contains(&".csv".to_string()));
        assert!(!config.files.writable_extensions.contains(&".csv".to_string()));
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config: RelabConfig =
            serde_json::from_value(json!({ "agent": { "maxIterations": 5, "retryJitter": true } }))
                .unwrap();
        assert_eq!(config.agent.max_iterations, 5);
        assert_eq!(config.agent.max_retries, 3);
        assert!(config.agent.retry_jitter);
        assert_eq!(config.model.model, "gpt-4o-mini");
    }

    #[test]
    fn test_merge_json_overlay_wins() {
        let mut base = json!({
            "model": { "model": "a", "temperature": 0.2 },
            "agent": { "maxIterations": 10 }
        });
        merge_json(
            &mut base,
            json!({ "model": { "model": "b" }, "files": { "maxFileSize": 1 } }),
        );

        assert_eq!(base["model"]["model"], "b");
        assert_eq!(base["model"]["temperature"], 0.2);
        assert_eq!(base["agent"]["maxIterations"], 10);
        assert_eq!(base["files"]["maxFileSize"], 1);
    }

    #[test]
    fn test_apply_env() {
        let mut config = RelabConfig::default();
        config.apply_env(|key| match key {
            ENV_MODEL => Some("local-model".to_string()),
            ENV_BASE_URL => Some(String::new()),
            _ => None,
        });
        assert_eq!(config.model.model, "local-model");
        // empty values are ignored
        assert_eq!(config.model.base_url, "https://api.openai.com/v1");
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "execution": { "timeoutSecs": 7 } }"#).unwrap();

        let config = RelabConfig::load_from(&path).unwrap();
        assert_eq!(config.execution.timeout_secs, 7);
        assert_eq!(config.execution.max_output_size, 50_000);
    }

    #[test]
    fn test_workspace_resolution() {
        let dir = tempfile::tempdir().unwrap();
        let config = RelabConfig::default().with_base_dir(dir.path());

        assert_eq!(
            config.workspace.scripts_dir(),
            dir.path().join("workspace/scripts")
        );
        config.workspace.ensure_directories().unwrap();
        assert!(config.workspace.sessions_dir().is_dir());
        assert!(config.workspace.figures_dir().is_dir());
    }
}
