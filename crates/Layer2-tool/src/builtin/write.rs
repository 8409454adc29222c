//! Write tools - create files inside the workspace write roots

use crate::r#trait::{parse_args, Tool, ToolArgs, ToolDef, ToolOutput};
use crate::security::PathPolicy;
use async_trait::async_trait;
use relab_foundation::Result;
use serde::Deserialize;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::{TOOL_WRITE_FILE, TOOL_WRITE_PYTHON};

/// Write `content` to an already-resolved `path` after policy checks
async fn write_checked(
    policy: &PathPolicy,
    path: &Path,
    content: &str,
    overwrite: bool,
) -> ToolOutput {
    if let Err(violation) = policy.check_writable(path, content.len() as u64) {
        return ToolOutput::failure(violation.message());
    }

    if path.exists() && !overwrite {
        return ToolOutput::failure(format!(
            "File exists and overwrite=false: {}",
            path.display()
        ));
    }

    if let Some(parent) = path.parent() {
        if let Err(e) = tokio::fs::create_dir_all(parent).await {
            return ToolOutput::failure(format!("Failed to create directory: {}", e));
        }
    }

    match tokio::fs::write(path, content).await {
        Ok(()) => ToolOutput::structured(json!({
            "success": true,
            "file_path": path.display().to_string(),
            "size": content.chars().count(),
            "lines": content.matches('\n').count() + 1,
        })),
        Err(e) => ToolOutput::failure(format!("Failed to write file: {}", e)),
    }
}

// ============================================================================
// write_file
// ============================================================================

/// Write tool for creating/overwriting files
pub struct WriteFileTool {
    policy: Arc<PathPolicy>,
}

#[derive(Debug, Deserialize)]
struct WriteFileParams {
    file_path: String,
    content: String,
    #[serde(default = "default_overwrite")]
    overwrite: bool,
}

fn default_overwrite() -> bool {
    true
}

impl WriteFileTool {
    pub fn new(policy: Arc<PathPolicy>) -> Self {
        Self { policy }
    }
}

#[async_trait]
impl Tool for WriteFileTool {
    fn definition(&self) -> ToolDef {
        ToolDef::builder(
            TOOL_WRITE_FILE,
            "Write content to a file (tex, py, txt, json, md) under the output or workspace directories. Creates parent directories.",
        )
        .param("file_path", "Path to the file, absolute or relative to the workspace")
        .param("content", "Full file content")
        .optional_param("overwrite", "Replace an existing file (default true)")
        .build()
    }

    async fn invoke(&self, args: ToolArgs) -> Result<ToolOutput> {
        let params: WriteFileParams = parse_args(args)?;
        let path = self.policy.resolve(&params.file_path);
        Ok(write_checked(&self.policy, &path, &params.content, params.overwrite).await)
    }
}

// ============================================================================
// write_python
// ============================================================================

/// Saves a Python script into the scripts directory
pub struct WritePythonTool {
    policy: Arc<PathPolicy>,
    scripts_dir: PathBuf,
}

#[derive(Debug, Deserialize)]
struct WritePythonParams {
    script_name: String,
    code: String,
}

impl WritePythonTool {
    pub fn new(policy: Arc<PathPolicy>, scripts_dir: PathBuf) -> Self {
        Self {
            policy,
            scripts_dir,
        }
    }
}

/// Bare file name ending in `.py`; directories in `name` are dropped
pub fn script_file_name(name: &str) -> String {
    let base = Path::new(name.trim())
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "script".to_string());
    if base.ends_with(".py") {
        base
    } else {
        format!("{}.py", base)
    }
}

#[async_trait]
impl Tool for WritePythonTool {
    fn definition(&self) -> ToolDef {
        ToolDef::builder(
            TOOL_WRITE_PYTHON,
            "Save a Python script into the scripts directory without running it.",
        )
        .param("script_name", "File name, \".py\" is appended if missing")
        .param("code", "Python source code")
        .build()
    }

    async fn invoke(&self, args: ToolArgs) -> Result<ToolOutput> {
        let params: WritePythonParams = parse_args(args)?;
        let path = self
            .policy
            .resolve(&self.scripts_dir.join(script_file_name(&params.script_name)).to_string_lossy());
        Ok(write_checked(&self.policy, &path, &params.code, true).await)
    }
}

// ============================================================================
// 테스트
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use relab_foundation::RelabConfig;
    use serde_json::Value;

    fn config(dir: &Path) -> RelabConfig {
        RelabConfig::default().with_base_dir(dir)
    }

    fn args(value: Value) -> ToolArgs {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn test_script_file_name() {
        assert_eq!(script_file_name("fit"), "fit.py");
        assert_eq!(script_file_name("fit.py"), "fit.py");
        assert_eq!(script_file_name("../../etc/evil"), "evil.py");
    }

    #[tokio::test]
    async fn test_write_file_creates_parents() {
        let dir = tempfile::tempdir().unwrap();
        let tool = WriteFileTool::new(Arc::new(PathPolicy::from_config(&config(dir.path()))));

        let out = tool
            .invoke(args(json!({
                "file_path": "output/draft/summary.md",
                "content": "line1\nline2"
            })))
            .await
            .unwrap();

        assert_eq!(out.is_success(), Some(true));
        let ToolOutput::Structured(map) = out else {
            panic!("expected structured output");
        };
        assert_eq!(map["lines"], json!(2));
        assert_eq!(
            std::fs::read_to_string(dir.path().join("output/draft/summary.md")).unwrap(),
            "line1\nline2"
        );
    }

    #[tokio::test]
    async fn test_write_file_respects_overwrite_flag() {
        let dir = tempfile::tempdir().unwrap();
        let tool = WriteFileTool::new(Arc::new(PathPolicy::from_config(&config(dir.path()))));
        let write = |overwrite: bool| {
            args(json!({
                "file_path": "output/a.txt",
                "content": "new",
                "overwrite": overwrite
            }))
        };

        assert_eq!(tool.invoke(write(true)).await.unwrap().is_success(), Some(true));
        assert_eq!(tool.invoke(write(false)).await.unwrap().is_success(), Some(false));
    }

    #[tokio::test]
    async fn test_write_outside_roots_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let tool = WriteFileTool::new(Arc::new(PathPolicy::from_config(&config(dir.path()))));

        let out = tool
            .invoke(args(json!({ "file_path": "rogue.txt", "content": "x" })))
            .await
            .unwrap();
        assert_eq!(out.is_success(), Some(false));
        assert!(!dir.path().join("rogue.txt").exists());
    }

    #[tokio::test]
    async fn test_write_python_lands_in_scripts_dir() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let tool = WritePythonTool::new(
            Arc::new(PathPolicy::from_config(&config)),
            config.workspace.scripts_dir(),
        );

        let out = tool
            .invoke(args(json!({ "script_name": "hist", "code": "print('ok')" })))
            .await
            .unwrap();
        assert_eq!(out.is_success(), Some(true));
        assert!(dir.path().join("workspace/scripts/hist.py").is_file());
    }
}
