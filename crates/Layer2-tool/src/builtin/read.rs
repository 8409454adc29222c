//! Read tool - read file contents

use crate::r#trait::{parse_args, Tool, ToolArgs, ToolDef, ToolOutput};
use crate::security::{extension_of, PathPolicy};
use async_trait::async_trait;
use relab_foundation::Result;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use super::TOOL_READ_FILE;

/// Read tool for text files inside the workspace
pub struct ReadFileTool {
    policy: Arc<PathPolicy>,
}

#[derive(Debug, Deserialize)]
struct ReadFileParams {
    file_path: String,
}

impl ReadFileTool {
    pub fn new(policy: Arc<PathPolicy>) -> Self {
        Self { policy }
    }
}

#[async_trait]
impl Tool for ReadFileTool {
    fn definition(&self) -> ToolDef {
        ToolDef::builder(
            TOOL_READ_FILE,
            "Read a text file (tex, py, txt, json, md, csv, dat). JSON files are also returned parsed.",
        )
        .param("file_path", "Path to the file, absolute or relative to the workspace")
        .build()
    }

    async fn invoke(&self, args: ToolArgs) -> Result<ToolOutput> {
        let params: ReadFileParams = parse_args(args)?;
        let path = self.policy.resolve(&params.file_path);

        if let Err(violation) = self.policy.check_readable(&path) {
            return Ok(ToolOutput::failure(violation.message()));
        }

        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) => return Ok(ToolOutput::failure(format!("Failed to read file: {}", e))),
        };

        let extension = extension_of(&path);
        let file_type = extension.trim_start_matches('.').to_string();
        let path_str = path.display().to_string();

        let (content, lossy) = match String::from_utf8(bytes) {
            Ok(text) => (text, false),
            Err(e) => (String::from_utf8_lossy(e.as_bytes()).into_owned(), true),
        };

        let mut output = json!({
            "success": true,
            "file_path": path_str,
            "file_type": file_type,
            "size": content.chars().count(),
        });
        if lossy {
            output["encoding"] = json!("lossy");
        }
        if extension == ".json" {
            if let Ok(parsed) = serde_json::from_str::<Value>(&content) {
                output["parsed"] = parsed;
            }
        }
        output["content"] = Value::String(content);

        Ok(ToolOutput::structured(output))
    }
}

// ============================================================================
// 테스트
// ============================================================================
