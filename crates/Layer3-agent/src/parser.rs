//! Response parser
//!
//! 모델 응답 한 턴을 `ParsedTurn`으로 분해합니다.
//!
//! The primary grammar is tag based:
//!
//! ```text
//! <think>reasoning</think>
//! <tool_call>{"name": "...", "arguments": {...}}<code>...</code></tool_call>
//! <answer>final answer</answer>
//! ```
//!
//! Only the first occurrence of each tag pair counts and tags are
//! case-sensitive. An answer block ends parsing: nothing else is extracted
//! from that turn. When no tool name comes out of the tag grammar the flat
//! `Action: name` / `Action Input: {...}` form is tried.

use regex::Regex;
use relab_tool::ToolArgs;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::OnceLock;
use tracing::debug;

pub const THINK_OPEN: &str = "<think>";
pub const THINK_CLOSE: &str = "</think>";
pub const ANSWER_OPEN: &str = "<answer>";
pub const ANSWER_CLOSE: &str = "</answer>";
pub const TOOL_CALL_OPEN: &str = "<tool_call>";
pub const TOOL_CALL_CLOSE: &str = "</tool_call>";
pub const CODE_OPEN: &str = "<code>";
pub const CODE_CLOSE: &str = "</code>";
pub const TOOL_RESPONSE_OPEN: &str = "<tool_response>";
pub const TOOL_RESPONSE_CLOSE: &str = "</tool_response>";

const ACTION_INPUT: &str = "Action Input:";

/// Structured view of one model response
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParsedTurn {
    pub reasoning: Option<String>,
    pub tool_name: Option<String>,
    pub tool_args: Option<ToolArgs>,
    pub embedded_code: Option<String>,
    pub final_answer: Option<String>,
}

impl ParsedTurn {
    /// Neither a tool request nor an answer
    pub fn is_noop(&self) -> bool {
        self.tool_name.is_none() && self.final_answer.is_none()
    }

    /// Rebuild tagged text from the parsed fields
    pub fn render(&self) -> String {
        let mut out = String::new();
        if let Some(reasoning) = &self.reasoning {
            out.push_str(&format!("{}{}{}\n", THINK_OPEN, reasoning, THINK_CLOSE));
        }
        if let Some(answer) = &self.final_answer {
            out.push_str(&format!("{}{}{}", ANSWER_OPEN, answer, ANSWER_CLOSE));
            return out;
        }
        if let Some(name) = &self.tool_name {
            let call = serde_json::json!({
                "name": name,
                "arguments": self.tool_args.clone().unwrap_or_default(),
            });
            out.push_str(TOOL_CALL_OPEN);
            out.push_str(&call.to_string());
            if let Some(code) = &self.embedded_code {
                out.push_str(&format!("\n{}\n{}\n{}", CODE_OPEN, code, CODE_CLOSE));
            }
            out.push_str(TOOL_CALL_CLOSE);
        }
        out
    }
}

/// Byte span of one `open ... close` block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Block {
    /// Start of the open tag
    pub start: usize,
    /// End of the close tag
    pub end: usize,
    /// Start of the inner text
    pub inner_start: usize,
    /// End of the inner text
    pub inner_end: usize,
}

impl Block {
    pub fn inner<'a>(&self, text: &'a str) -> &'a str {
        &text[self.inner_start..self.inner_end]
    }
}

/// First complete block: first open tag, then the first close tag after it
pub fn find_block(text: &str, open: &str, close: &str) -> Option<Block> {
    let start = text.find(open)?;
    let inner_start = start + open.len();
    let inner_end = inner_start + text[inner_start..].find(close)?;
    Some(Block {
        start,
        end: inner_end + close.len(),
        inner_start,
        inner_end,
    })
}

/// Remove every complete `open ... close` block from `text`
pub fn strip_blocks(text: &str, open: &str, close: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(block) = find_block(rest, open, close) {
        out.push_str(&rest[..block.start]);
        rest = &rest[block.end..];
    }
    out.push_str(rest);
    out
}

/// First balanced `{...}` starting at the first `{`, string and escape aware
pub fn balanced_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Widest `{...}` span: first `{` to last `}`
fn widest_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

/// Parse the first object literal found in `text`
pub fn extract_object(text: &str) -> Option<serde_json::Map<String, Value>> {
    let candidates = [balanced_object(text), widest_object(text)];
    candidates
        .into_iter()
        .flatten()
        .find_map(|candidate| match serde_json::from_str::<Value>(candidate) {
            Ok(Value::Object(map)) => Some(map),
            _ => None,
        })
}

fn action_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"Action:\s*(\w+)").ok()).as_ref()
}

/// Splits model output into reasoning, tool request and answer
#[derive(Debug, Clone)]
pub struct ResponseParser {
    legacy: bool,
}

impl Default for ResponseParser {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseParser {
    pub fn new() -> Self {
        Self { legacy: true }
    }

    /// Disable the `Action:` / `Action Input:` grammar
    pub fn without_legacy(mut self) -> Self {
        self.legacy = false;
        self
    }

    pub fn parse(&self, text: &str) -> ParsedTurn {
        let mut turn = ParsedTurn {
            reasoning: find_block(text, THINK_OPEN, THINK_CLOSE)
                .map(|b| b.inner(text).trim().to_string()),
            ..Default::default()
        };

        // an answer block ends parsing even when empty; empty counts as no answer
        if let Some(block) = find_block(text, ANSWER_OPEN, ANSWER_CLOSE) {
            let answer = block.inner(text).trim();
            if !answer.is_empty() {
                turn.final_answer = Some(answer.to_string());
            }
            return turn;
        }

        if let Some(block) = find_block(text, TOOL_CALL_OPEN, TOOL_CALL_CLOSE) {
            self.parse_tool_call(block.inner(text).trim(), &mut turn);
        }

        if turn.tool_name.is_none() && self.legacy {
            if let Some((name, args)) = parse_legacy(text) {
                debug!(tool = %name, "Parsed legacy action format");
                turn.tool_name = Some(name);
                turn.tool_args = Some(args);
            }
        }

        turn
    }

    fn parse_tool_call(&self, body: &str, turn: &mut ParsedTurn) {
        let json_part = match find_block(body, CODE_OPEN, CODE_CLOSE) {
            Some(code) => {
                let code = code.inner(body).trim();
                if !code.is_empty() {
                    turn.embedded_code = Some(code.to_string());
                }
                strip_blocks(body, CODE_OPEN, CODE_CLOSE)
            }
            None => body.to_string(),
        };

        let Some(mut call) = extract_object(&json_part) else {
            debug!(
                "Failed to parse tool call: {}",
                json_part.chars().take(100).collect::<String>()
            );
            return;
        };

        let name = match call.remove("name") {
            Some(Value::String(name)) if !name.trim().is_empty() => name.trim().to_string(),
            _ => return,
        };
        let args = match call.remove("arguments") {
            None | Some(Value::Null) => ToolArgs::new(),
            Some(Value::Object(map)) => map,
            Some(_) => return,
        };

        turn.tool_name = Some(name);
        turn.tool_args = Some(args);
    }
}

/// `Action: name` followed by `Action Input: {...}`
fn parse_legacy(text: &str) -> Option<(String, ToolArgs)> {
    let action = action_regex()?.captures(text)?;
    let name = action.get(1)?.as_str().to_string();

    let args = text
        .find(ACTION_INPUT)
        .and_then(|pos| balanced_object(&text[pos + ACTION_INPUT.len()..]))
        .and_then(|obj| match serde_json::from_str::<Value>(obj) {
            Ok(Value::Object(map)) => Some(map),
            _ => None,
        })
        .unwrap_or_default();

    Some((name, args))
}

// ============================================================================
// 테스트
// ============================================================================
