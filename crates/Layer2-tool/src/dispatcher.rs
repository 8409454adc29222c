//! Tool Dispatcher - turns a parsed tool request into observation text
//!
//! Never fails: unknown tools, tool errors and tool panics all come back as
//! text the model can read and react to.

use crate::r#trait::ToolArgs;
use crate::registry::ToolRegistry;
use futures::FutureExt;
use relab_foundation::AgentSettings;
use serde_json::Value;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Default code-execution tool
pub const DEFAULT_CODE_TOOL: &str = "run_code";

/// Argument the extracted code block is injected under
pub const DEFAULT_CODE_PARAM: &str = "code";

/// Executes tools from a shared registry
#[derive(Clone)]
pub struct ToolDispatcher {
    registry: Arc<ToolRegistry>,
    code_tool: String,
    code_param: String,
}

impl ToolDispatcher {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self {
            registry,
            code_tool: DEFAULT_CODE_TOOL.to_string(),
            code_param: DEFAULT_CODE_PARAM.to_string(),
        }
    }

    /// Dispatcher using the code tool named in the `agent` config section
    pub fn from_settings(registry: Arc<ToolRegistry>, settings: &AgentSettings) -> Self {
        Self::new(registry).with_code_target(&settings.code_tool, &settings.code_param)
    }

    /// Route extracted code blocks to `tool` under argument `param`
    pub fn with_code_target(mut self, tool: impl Into<String>, param: impl Into<String>) -> Self {
        self.code_tool = tool.into();
        self.code_param = param.into();
        self
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    /// Execute `tool_name` and return the observation text
    ///
    /// When the target is the code tool and `code` is non-empty, it replaces
    /// whatever the arguments carried under the code parameter.
    pub async fn execute(&self, tool_name: &str, mut args: ToolArgs, code: Option<&str>) -> String {
        let tool = match self.registry.resolve(tool_name) {
            Ok(tool) => tool,
            Err(e) => {
                warn!("{}", e);
                return format!("Error: {}", e);
            }
        };

        if tool_name == self.code_tool {
            if let Some(code) = code.filter(|c| !c.trim().is_empty()) {
                args.insert(self.code_param.clone(), Value::String(code.to_string()));
            }
        }

        info!(tool = tool_name, "Executing tool");

        let observation = match AssertUnwindSafe(tool.invoke(args)).catch_unwind().await {
            Ok(Ok(output)) => output.into_observation(),
            Ok(Err(e)) => {
                warn!(tool = tool_name, "Tool failed: {}", e);
                format!("Error executing {}: {}", tool_name, e)
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                warn!(tool = tool_name, "Tool panicked: {}", message);
                format!("Error executing {}: {}", tool_name, message)
            }
        };

        debug!(tool = tool_name, chars = observation.len(), "Observation ready");
        observation
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "tool panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::r#trait::ToolOutput;
    use relab_foundation::Error;
    use serde_json::json;

    fn dispatcher() -> ToolDispatcher {
        let mut registry = ToolRegistry::new();
        registry
            .register_fn("echo", "Echo", &[("v", "Value")], |args| {
                Ok(ToolOutput::text(
                    args.get("v").and_then(|v| v.as_str()).unwrap_or_default(),
                ))
            })
            .unwrap();
        registry
            .register_fn("explode", "Always fails", &[], |_| {
                Err(Error::Internal("kaboom".into()))
            })
            .unwrap();
        registry
            .register_fn("panicky", "Panics", &[], |_| panic!("wires crossed"))
            .unwrap();
        registry
            .register_fn("run_code", "Run code", &[("code", "Python")], |args| {
                Ok(ToolOutput::structured(json!({
                    "received": args.get("code").cloned().unwrap_or(Value::Null)
                })))
            })
            .unwrap();
        ToolDispatcher::new(Arc::new(registry))
    }

    fn args(value: Value) -> ToolArgs {
        value.as_object().cloned().unwrap_or_default()
    }

    #[tokio::test]
    async fn test_unknown_tool_observation() {
        let out = dispatcher().execute("fly", ToolArgs::new(), None).await;
        assert!(out.starts_with("Error: Unknown tool 'fly'"));
        assert!(out.contains("echo, explode, panicky, run_code"));
    }

    #[tokio::test]
    async fn test_tool_error_is_contained() {
        let out = dispatcher().execute("explode", ToolArgs::new(), None).await;
        assert!(out.starts_with("Error executing explode"));
        assert!(out.contains("kaboom"));
    }

    #[tokio::test]
    async fn test_tool_panic_is_contained() {
        let out = dispatcher().execute("panicky", ToolArgs::new(), None).await;
        assert_eq!(out, "Error executing panicky: wires crossed");
    }

    #[tokio::test]
    async fn test_text_output_passthrough() {
        let out = dispatcher()
            .execute("echo", args(json!({ "v": "hi" })), None)
            .await;
        assert_eq!(out, "hi");
    }

    #[tokio::test]
    async fn test_code_injection_overrides_args() {
        let out = dispatcher()
            .execute(
                "run_code",
                args(json!({ "code": "old" })),
                Some("print(1)"),
            )
            .await;
        assert_eq!(out, "{\n  \"received\": \"print(1)\"\n}");
    }

    #[tokio::test]
    async fn test_empty_code_keeps_argument() {
        let out = dispatcher()
            .execute("run_code", args(json!({ "code": "print(1)" })), Some(""))
            .await;
        assert_eq!(out, "{\n  \"received\": \"print(1)\"\n}");

        let out = dispatcher()
            .execute("run_code", args(json!({ "code": "print(2)" })), Some("  \n"))
            .await;
        assert!(out.contains("print(2)"));
    }

    #[tokio::test]
    async fn test_code_ignored_for_other_tools() {
        let out = dispatcher()
            .execute("echo", args(json!({ "v": "x" })), Some("print(1)"))
            .await;
        assert_eq!(out, "x");
    }

    #[tokio::test]
    async fn test_custom_code_target() {
        let dispatcher = dispatcher().with_code_target("echo", "v");
        let out = dispatcher.execute("echo", ToolArgs::new(), Some("snippet")).await;
        assert_eq!(out, "snippet");
    }
}
