//! Tool trait and related types

use async_trait::async_trait;
use relab_foundation::{Error, Result};
use serde::de::DeserializeOwned;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

/// Arguments a tool is invoked with (a JSON object)
pub type ToolArgs = Map<String, Value>;

// ============================================================================
// ToolDef
// ============================================================================

/// One declared parameter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolParam {
    pub name: String,
    pub description: String,
    pub required: bool,
}

/// Definition of a tool as shown to the model
///
/// `parameters` serializes as a `name -> description` object in declaration
/// order; optional parameters get an `(optional)` suffix.
#[derive(Debug, Clone, Serialize)]
pub struct ToolDef {
    /// Tool name (unique identifier)
    pub name: String,

    /// Human-readable description
    pub description: String,

    #[serde(serialize_with = "serialize_params")]
    pub parameters: Vec<ToolParam>,
}

fn serialize_params<S: Serializer>(
    params: &[ToolParam],
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    let mut map = serializer.serialize_map(Some(params.len()))?;
    for param in params {
        if param.required {
            map.serialize_entry(&param.name, &param.description)?;
        } else {
            map.serialize_entry(&param.name, &format!("{} (optional)", param.description))?;
        }
    }
    map.end()
}

impl ToolDef {
    /// Create a new tool definition builder
    pub fn builder(name: impl Into<String>, description: impl Into<String>) -> ToolDefBuilder {
        ToolDefBuilder::new(name, description)
    }

    /// Single-line JSON used in the prompt manifest
    pub fn manifest_line(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| format!("{{\"name\": \"{}\"}}", self.name))
    }
}

/// Builder for ToolDef
pub struct ToolDefBuilder {
    name: String,
    description: String,
    parameters: Vec<ToolParam>,
}

impl ToolDefBuilder {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: vec![],
        }
    }

    /// Add a required parameter
    pub fn param(mut self, name: impl Into<String>, description: impl Into<String>) -> Self {
        self.parameters.push(ToolParam {
            name: name.into(),
            description: description.into(),
            required: true,
        });
        self
    }

    /// Add an optional parameter
    pub fn optional_param(
        mut self,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        self.parameters.push(ToolParam {
            name: name.into(),
            description: description.into(),
            required: false,
        });
        self
    }

    /// Build the ToolDef
    pub fn build(self) -> ToolDef {
        ToolDef {
            name: self.name,
            description: self.description,
            parameters: self.parameters,
        }
    }
}

// ============================================================================
// ToolOutput
// ============================================================================

/// What a tool hands back: free text or a structured record
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutput {
    Text(String),
    Structured(Map<String, Value>),
}

impl ToolOutput {
    pub fn text(text: impl Into<String>) -> Self {
        ToolOutput::Text(text.into())
    }

    /// Structured output from a JSON value; non-objects become text
    pub fn structured(value: Value) -> Self {
        match value {
            Value::Object(map) => ToolOutput::Structured(map),
            Value::String(s) => ToolOutput::Text(s),
            other => ToolOutput::Text(other.to_string()),
        }
    }

    /// `{"success": false, "error": message}`
    pub fn failure(message: impl Into<String>) -> Self {
        let mut map = Map::new();
        map.insert("success".to_string(), Value::Bool(false));
        map.insert("error".to_string(), Value::String(message.into()));
        ToolOutput::Structured(map)
    }

    /// Render as observation text
    ///
    /// Structured records are pretty-printed; `serde_json::Map` keeps keys
    /// sorted, so equal records always render identically.
    pub fn into_observation(self) -> String {
        match self {
            ToolOutput::Text(text) => text,
            ToolOutput::Structured(map) => serde_json::to_string_pretty(&Value::Object(map))
                .unwrap_or_else(|e| format!("<unserializable output: {}>", e)),
        }
    }

    /// `success` flag of a structured record, if present
    pub fn is_success(&self) -> Option<bool> {
        match self {
            ToolOutput::Structured(map) => map.get("success").and_then(Value::as_bool),
            ToolOutput::Text(_) => None,
        }
    }
}

impl From<String> for ToolOutput {
    fn from(text: String) -> Self {
        ToolOutput::Text(text)
    }
}

impl From<&str> for ToolOutput {
    fn from(text: &str) -> Self {
        ToolOutput::Text(text.to_string())
    }
}

// ============================================================================
// Tool trait
// ============================================================================

/// A named capability the agent can invoke
#[async_trait]
pub trait Tool: Send + Sync {
    /// Get the tool definition
    fn definition(&self) -> ToolDef;

    /// Run the tool. Expected failures (missing file, bad extension) are
    /// reported inside the output; `Err` is for invalid arguments and bugs.
    async fn invoke(&self, args: ToolArgs) -> Result<ToolOutput>;

    /// Get the tool name
    fn name(&self) -> String {
        self.definition().name
    }
}

/// Deserialize tool arguments into a typed parameter struct
pub fn parse_args<T: DeserializeOwned>(args: ToolArgs) -> Result<T> {
    serde_json::from_value(Value::Object(args))
        .map_err(|e| Error::invalid_input(format!("Invalid parameters: {}", e)))
}

// ============================================================================
// FnTool
// ============================================================================

/// Adapts a plain closure into a [`Tool`]
pub struct FnTool<F> {
    definition: ToolDef,
    func: F,
}

impl<F> FnTool<F>
where
    F: Fn(ToolArgs) -> Result<ToolOutput> + Send + Sync + 'static,
{
    pub fn new(definition: ToolDef, func: F) -> Self {
        Self { definition, func }
    }
}

#[async_trait]
impl<F> Tool for FnTool<F>
where
    F: Fn(ToolArgs) -> Result<ToolOutput> + Send + Sync + 'static,
{
    fn definition(&self) -> ToolDef {
        self.definition.clone()
    }

    async fn invoke(&self, args: ToolArgs) -> Result<ToolOutput> {
        (self.func)(args)
    }

    fn name(&self) -> String {
        self.definition.name.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[test]
    fn test_manifest_line_keeps_param_order() {
        let def = ToolDef::builder("write_file", "Write content to a file")
            .param("file_path", "Path to the file")
            .param("content", "Content to write")
            .optional_param("overwrite", "Replace an existing file")
            .build();

        assert_eq!(
            def.manifest_line(),
            r#"{"name":"write_file","description":"Write content to a file","parameters":{"file_path":"Path to the file","content":"Content to write","overwrite":"Replace an existing file (optional)"}}"#
        );
    }

    #[test]
    fn test_structured_observation_is_sorted() {
        let a = ToolOutput::structured(json!({ "zeta": 1, "alpha": true, "mid": "x" }));
        let b = ToolOutput::structured(json!({ "mid": "x", "alpha": true, "zeta": 1 }));

        let text = a.clone().into_observation();
        assert_eq!(text, b.into_observation());
        assert!(text.find("alpha").unwrap() < text.find("mid").unwrap());
        assert!(text.find("mid").unwrap() < text.find("zeta").unwrap());
        assert_eq!(a.is_success(), None);
    }

    #[test]
    fn test_text_passthrough() {
        assert_eq!(ToolOutput::text("raw\nlines").into_observation(), "raw\nlines");
        assert_eq!(ToolOutput::structured(json!("plain")), ToolOutput::text("plain"));
    }

    #[test]
    fn test_failure_shape() {
        let out = ToolOutput::failure("nope");
        assert_eq!(out.is_success(), Some(false));
        assert_eq!(
            out.into_observation(),
            "{\n  \"error\": \"nope\",\n  \"success\": false\n}"
        );
    }

    #[test]
    fn test_parse_args() {
        #[derive(Debug, Deserialize)]
        struct Params {
            file_path: String,
        }

        let mut args = ToolArgs::new();
        args.insert("file_path".into(), json!("a.txt"));
        let params: Params = parse_args(args).unwrap();
        assert_eq!(params.file_path, "a.txt");

        let err = parse_args::<Params>(ToolArgs::new()).unwrap_err();
        assert!(err.to_string().contains("missing field `file_path`"));
    }
}
