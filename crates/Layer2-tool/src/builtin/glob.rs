//! List tool - list files in a workspace directory

use crate::r#trait::{parse_args, Tool, ToolArgs, ToolDef, ToolOutput};
use crate::security::PathPolicy;
use async_trait::async_trait;
use relab_foundation::Result;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use super::TOOL_LIST_FILES;

/// Maximum number of entries returned
const MAX_RESULTS: usize = 500;

/// Lists the files of one directory (non-recursive)
pub struct ListFilesTool {
    policy: Arc<PathPolicy>,
}

#[derive(Debug, Deserialize)]
struct ListFilesParams {
    directory: String,
    #[serde(default)]
    extension: Option<String>,
}

impl ListFilesTool {
    pub fn new(policy: Arc<PathPolicy>) -> Self {
        Self { policy }
    }
}

#[async_trait]
impl Tool for ListFilesTool {
    fn definition(&self) -> ToolDef {
        ToolDef::builder(TOOL_LIST_FILES, "List the files in a directory.")
            .param("directory", "Directory path, absolute or relative to the workspace")
            .optional_param("extension", "Only list files with this extension, e.g. \".py\"")
            .build()
    }

    async fn invoke(&self, args: ToolArgs) -> Result<ToolOutput> {
        let params: ListFilesParams = parse_args(args)?;
        let dir = self.policy.resolve(&params.directory);

        if let Err(violation) = self.policy.check_directory(&dir) {
            return Ok(ToolOutput::failure(violation.message()));
        }

        let suffix = match params.extension.as_deref().map(str::trim) {
            Some(ext) if !ext.is_empty() => {
                format!(".{}", ext.trim_start_matches('.'))
            }
            _ => String::new(),
        };
        let pattern = format!(
            "{}/*{}",
            glob::Pattern::escape(&dir.to_string_lossy()),
            glob::Pattern::escape(&suffix)
        );

        let paths = match glob::glob(&pattern) {
            Ok(paths) => paths,
            Err(e) => return Ok(ToolOutput::failure(format!("Invalid pattern: {}", e))),
        };

        let mut files = Vec::new();
        for path in paths.flatten() {
            if !path.is_file() {
                continue;
            }
            if files.len() >= MAX_RESULTS {
                break;
            }
            let size = std::fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            files.push(json!({
                "name": name,
                "path": path.display().to_string(),
                "size": size,
            }));
        }

        Ok(ToolOutput::structured(json!({
            "success": true,
            "directory": dir.display().to_string(),
            "count": files.len(),
            "files": files,
        })))
    }
}

// ============================================================================
// 테스트
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use relab_foundation::RelabConfig;

    #[tokio::test]
    async fn test_list_with_extension_filter() {
        let dir = tempfile::tempdir().unwrap();
        let config = RelabConfig::default().with_base_dir(dir.path());
        let tool = ListFilesTool::new(Arc::new(PathPolicy::from_config(&config)));

        let sub = dir.path().join("data");
        std::fs::create_dir_all(sub.join("nested")).unwrap();
        std::fs::write(sub.join("b.py"), "print(2)").unwrap();
        std::fs::write(sub.join("a.py"), "print(1)").unwrap();
        std::fs::write(sub.join("c.txt"), "x").unwrap();

        let mut args = ToolArgs::new();
        args.insert("directory".into(), json!("data"));
        args.insert("extension".into(), json!("py"));

        let ToolOutput::Structured(out) = tool.invoke(args).await.unwrap() else {
            panic!("expected structured output");
        };
        assert_eq!(out["count"], json!(2));
        assert_eq!(out["files"][0]["name"], json!("a.py"));
        assert_eq!(out["files"][1]["name"], json!("b.py"));

        let mut all = ToolArgs::new();
        all.insert("directory".into(), json!("data"));
        let ToolOutput::Structured(out) = tool.invoke(all).await.unwrap() else {
            panic!("expected structured output");
        };
        // directories are skipped
        assert_eq!(out["count"], json!(3));
    }

    #[tokio::test]
    async fn test_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let config = RelabConfig::default().with_base_dir(dir.path());
        let tool = ListFilesTool::new(Arc::new(PathPolicy::from_config(&config)));

        let mut args = ToolArgs::new();
        args.insert("directory".into(), json!("ghost"));
        let out = tool.invoke(args).await.unwrap();
        assert_eq!(out.is_success(), Some(false));
    }
}
