//! Builtin tools for relab
//!
//! - `read_file`, `list_files` - 워크스페이스 파일 읽기
//! - `write_file`, `write_python` - 허용 디렉토리에 쓰기
//! - `run_code`, `run_script` - Python 실행 (timeout, 출력 제한)

pub mod glob;
pub mod python;
pub mod read;
pub mod write;

use crate::r#trait::Tool;
use crate::security::PathPolicy;
use relab_foundation::RelabConfig;
use std::sync::Arc;

pub const TOOL_READ_FILE: &str = "read_file";
pub const TOOL_LIST_FILES: &str = "list_files";
pub const TOOL_WRITE_FILE: &str = "write_file";
pub const TOOL_WRITE_PYTHON: &str = "write_python";
pub const TOOL_RUN_CODE: &str = "run_code";
pub const TOOL_RUN_SCRIPT: &str = "run_script";

/// All builtin tools, in manifest order
pub fn builtin_tools(config: &RelabConfig) -> Vec<Arc<dyn Tool>> {
    let policy = Arc::new(PathPolicy::from_config(config));
    let runner = Arc::new(python::PythonRunner::from_config(config));

    vec![
        Arc::new(read::ReadFileTool::new(policy.clone())),
        Arc::new(glob::ListFilesTool::new(policy.clone())),
        Arc::new(write::WriteFileTool::new(policy.clone())),
        Arc::new(write::WritePythonTool::new(
            policy,
            config.workspace.scripts_dir(),
        )),
        Arc::new(python::RunCodeTool::new(runner.clone())),
        Arc::new(python::RunScriptTool::new(runner)),
    ]
}
