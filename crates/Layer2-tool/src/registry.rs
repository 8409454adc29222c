//! Tool Registry - manages available tools
//!
//! Registration order is preserved; it is the order the manifest lists
//! tools in and the order `Unknown tool` errors report them.

use crate::builtin;
use crate::r#trait::{FnTool, Tool, ToolArgs, ToolDef, ToolOutput, ToolParam};
use relab_foundation::{Error, RelabConfig, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Registry of available tools
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with the builtin file and execution tools
    pub fn with_builtins(config: &RelabConfig) -> Result<Self> {
        let mut registry = Self::new();
        for tool in builtin::builtin_tools(config) {
            registry.register(tool)?;
        }
        Ok(registry)
    }

    /// Register a tool; names must be unique
    pub fn register(&mut self, tool: Arc<dyn Tool>) -> Result<()> {
        let name = tool.name();
        if self.index.contains_key(&name) {
            return Err(Error::DuplicateTool(name));
        }
        debug!(tool = %name, "Registered tool");
        self.index.insert(name, self.tools.len());
        self.tools.push(tool);
        Ok(())
    }

    /// Register a closure as a tool
    pub fn register_fn<F>(
        &mut self,
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: &[(&str, &str)],
        func: F,
    ) -> Result<()>
    where
        F: Fn(ToolArgs) -> Result<ToolOutput> + Send + Sync + 'static,
    {
        let definition = ToolDef {
            name: name.into(),
            description: description.into(),
            parameters: parameters
                .iter()
                .map(|(name, description)| ToolParam {
                    name: name.to_string(),
                    description: description.to_string(),
                    required: true,
                })
                .collect(),
        };
        self.register(Arc::new(FnTool::new(definition, func)))
    }

    /// Look a tool up by name
    pub fn resolve(&self, name: &str) -> Result<Arc<dyn Tool>> {
        self.index
            .get(name)
            .map(|&i| Arc::clone(&self.tools[i]))
            .ok_or_else(|| Error::unknown_tool(name, self.names()))
    }

    /// Get a tool by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.resolve(name).ok()
    }

    /// Check if a tool exists
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Tool names in registration order
    pub fn names(&self) -> Vec<String> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    /// Tool definitions in registration order
    pub fn manifest(&self) -> Vec<ToolDef> {
        self.tools.iter().map(|t| t.definition()).collect()
    }

    /// `<tools>` block for the system prompt, one JSON object per line
    pub fn manifest_block(&self) -> String {
        let mut block = String::from("<tools>\n");
        for def in self.manifest() {
            block.push_str(&def.manifest_line());
            block.push('\n');
        }
        block.push_str("</tools>");
        block
    }

    /// Get the number of registered tools
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Check if the registry is empty
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}
