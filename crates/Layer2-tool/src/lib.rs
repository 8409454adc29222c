//! # relab-tool
//!
//! Tool system for relab providing:
//! - Tool trait, `ToolOutput` and `FnTool` closure adapter
//! - `ToolRegistry`: ordered, name-unique tool set and prompt manifest
//! - `ToolDispatcher`: runs a parsed tool request, always returning text
//! - Builtin tools (read_file, list_files, write_file, write_python, run_code, run_script)

pub mod builtin;
pub mod dispatcher;
pub mod registry;
pub mod security;
pub mod r#trait;

pub use dispatcher::{ToolDispatcher, DEFAULT_CODE_PARAM, DEFAULT_CODE_TOOL};
pub use r#trait::{parse_args, FnTool, Tool, ToolArgs, ToolDef, ToolDefBuilder, ToolOutput, ToolParam};
pub use registry::ToolRegistry;
pub use security::{PathPolicy, PathViolation};

// Re-export builtin tools
pub use builtin::{
    glob::ListFilesTool,
    python::{PythonRunner, RunCodeTool, RunScriptTool},
    read::ReadFileTool,
    write::{WriteFileTool, WritePythonTool},
};
