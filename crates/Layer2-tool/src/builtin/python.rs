//! Python execution tools - `run_code` and `run_script`
//!
//! Scripts run in a child process with piped output and a wall-clock bound.
//! A timed-out child is killed when its future is dropped.

use crate::r#trait::{parse_args, Tool, ToolArgs, ToolDef, ToolOutput};
use async_trait::async_trait;
use relab_foundation::{Error, RelabConfig, Result};
use serde::Deserialize;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, warn};

use super::write::script_file_name;
use super::{TOOL_RUN_CODE, TOOL_RUN_SCRIPT};

/// Marker appended to clipped output
const TRUNCATION_MARKER: &str = "\n... [output truncated]";

/// Shared Python process runner
#[derive(Debug, Clone)]
pub struct PythonRunner {
    interpreter: Option<PathBuf>,
    scripts_dir: PathBuf,
    timeout: Duration,
    max_output: usize,
}

impl PythonRunner {
    pub fn new(scripts_dir: PathBuf, timeout: Duration, max_output: usize) -> Self {
        Self {
            interpreter: None,
            scripts_dir,
            timeout,
            max_output,
        }
    }

    pub fn from_config(config: &RelabConfig) -> Self {
        Self {
            interpreter: config.execution.python.clone(),
            ..Self::new(
                config.workspace.scripts_dir(),
                Duration::from_secs(config.execution.timeout_secs),
                config.execution.max_output_size,
            )
        }
    }

    pub fn with_interpreter(mut self, interpreter: impl Into<PathBuf>) -> Self {
        self.interpreter = Some(interpreter.into());
        self
    }

    pub fn scripts_dir(&self) -> &Path {
        &self.scripts_dir
    }

    /// Configured interpreter, else `python3`, else `python` from PATH
    pub fn interpreter(&self) -> Result<PathBuf> {
        if let Some(path) = &self.interpreter {
            return Ok(path.clone());
        }
        which::which("python3")
            .or_else(|_| which::which("python"))
            .map_err(|_| Error::NotFound("Python interpreter (python3 / python)".to_string()))
    }

    /// Write `code` to the scripts directory, then run it
    pub async fn run_code(&self, code: &str, script_name: Option<&str>) -> ToolOutput {
        let name = match script_name {
            Some(name) if !name.trim().is_empty() => script_file_name(name),
            _ => format!("script_{}.py", chrono::Local::now().format("%Y%m%d_%H%M%S")),
        };
        let script_path = self.scripts_dir.join(name);

        if let Err(e) = tokio::fs::create_dir_all(&self.scripts_dir).await {
            return ToolOutput::failure(format!("Failed to create scripts directory: {}", e));
        }
        if let Err(e) = tokio::fs::write(&script_path, code).await {
            return ToolOutput::failure(format!("Failed to write script: {}", e));
        }

        self.run_file(&script_path, &self.scripts_dir).await
    }

    /// Run an existing script with `cwd` as working directory
    pub async fn run_file(&self, script_path: &Path, cwd: &Path) -> ToolOutput {
        let script = script_path.display().to_string();

        let interpreter = match self.interpreter() {
            Ok(path) => path,
            Err(e) => return failure_with_path(format!("Execution failed: {}", e), &script),
        };

        let mut command = Command::new(&interpreter);
        command
            .arg(script_path)
            .current_dir(cwd)
            .env("PYTHONPATH", self.python_path())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!(interpreter = %interpreter.display(), script = %script, "Running script");

        let child = match command.spawn() {
            Ok(child) => child,
            Err(e) => return failure_with_path(format!("Execution failed: {}", e), &script),
        };

        match timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => {
                let exit_code = output.status.code().unwrap_or(-1);
                ToolOutput::structured(json!({
                    "success": output.status.success(),
                    "stdout": self.clean_output(&output.stdout),
                    "stderr": self.clean_output(&output.stderr),
                    "exit_code": exit_code,
                    "script_path": script,
                }))
            }
            Ok(Err(e)) => failure_with_path(format!("Execution failed: {}", e), &script),
            Err(_) => {
                warn!(script = %script, "Script timed out after {:?}", self.timeout);
                ToolOutput::structured(json!({
                    "success": false,
                    "error": format!("Execution timed out after {} seconds", self.timeout.as_secs()),
                    "stdout": "",
                    "stderr": "",
                    "exit_code": -1,
                    "script_path": script,
                }))
            }
        }
    }

    /// Scripts directory prepended to any inherited PYTHONPATH
    fn python_path(&self) -> String {
        let scripts = self.scripts_dir.display().to_string();
        match std::env::var("PYTHONPATH") {
            Ok(existing) if !existing.is_empty() => format!("{}:{}", scripts, existing),
            _ => scripts,
        }
    }

    fn clean_output(&self, raw: &[u8]) -> String {
        let stripped = strip_ansi_escapes::strip(raw);
        truncate_output(String::from_utf8_lossy(&stripped).into_owned(), self.max_output)
    }
}

fn failure_with_path(message: String, script: &str) -> ToolOutput {
    ToolOutput::structured(json!({
        "success": false,
        "error": message,
        "exit_code": -1,
        "script_path": script,
    }))
}

/// Keep at most `max` characters, marking the cut
pub fn truncate_output(text: String, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((cut, _)) => format!("{}{}", &text[..cut], TRUNCATION_MARKER),
        None => text,
    }
}

// ============================================================================
// run_code
// ============================================================================

/// Runs a Python snippet
pub struct RunCodeTool {
    runner: Arc<PythonRunner>,
}

#[derive(Debug, Deserialize)]
struct RunCodeParams {
    code: String,
    #[serde(default)]
    script_name: Option<String>,
}

impl RunCodeTool {
    pub fn new(runner: Arc<PythonRunner>) -> Self {
        Self { runner }
    }
}

#[async_trait]
impl Tool for RunCodeTool {
    fn definition(&self) -> ToolDef {
        ToolDef::builder(
            TOOL_RUN_CODE,
            "Execute Python code. Put the code in a <code>...</code> block inside the tool call. Returns stdout, stderr and exit code.",
        )
        .param("code", "Python source (may be given in a <code> block instead)")
        .optional_param("script_name", "File name the code is saved under")
        .build()
    }

    async fn invoke(&self, args: ToolArgs) -> Result<ToolOutput> {
        let params: RunCodeParams = parse_args(args)?;
        Ok(self
            .runner
            .run_code(&params.code, params.script_name.as_deref())
            .await)
    }
}

// ============================================================================
// run_script
// ============================================================================

/// Runs a script that already exists on disk
pub struct RunScriptTool {
    runner: Arc<PythonRunner>,
}

#[derive(Debug, Deserialize)]
struct RunScriptParams {
    script_path: String,
}

impl RunScriptTool {
    pub fn new(runner: Arc<PythonRunner>) -> Self {
        Self { runner }
    }
}

#[async_trait]
impl Tool for RunScriptTool {
    fn definition(&self) -> ToolDef {
        ToolDef::builder(TOOL_RUN_SCRIPT, "Run an existing Python script.")
            .param("script_path", "Script path, absolute or relative to the scripts directory")
            .build()
    }

    async fn invoke(&self, args: ToolArgs) -> Result<ToolOutput> {
        let params: RunScriptParams = parse_args(args)?;
        let raw = Path::new(&params.script_path);
        let path = if raw.is_absolute() {
            raw.to_path_buf()
        } else {
            self.runner.scripts_dir().join(raw)
        };

        if !path.is_file() {
            return Ok(ToolOutput::failure(format!(
                "Script not found: {}",
                path.display()
            )));
        }

        let cwd = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.runner.scripts_dir().to_path_buf());
        Ok(self.runner.run_file(&path, &cwd).await)
    }
}

// ============================================================================
// 테스트
// ============================================================================
