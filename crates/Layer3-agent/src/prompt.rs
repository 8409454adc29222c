//! System prompt builder
//!
//! 지시문, 날짜, 작업 경로, 도구 목록, 응답 형식을 하나의 시스템 프롬프트로
//! 조립합니다.

use chrono::Local;
use relab_foundation::WorkspaceSettings;
use relab_tool::ToolRegistry;

const DEFAULT_INSTRUCTION: &str = "You are a research assistant that solves tasks step by step. \
Read the material you need, write and run analysis code, and report results.";

const RESPONSE_FORMAT: &str = r#"# Response Format

For tool calls:
<think>
Brief reasoning about what to do next...
</think>
<tool_call>
{"name": "tool_name", "arguments": {"param": "value"}}
</tool_call>

For Python code:
<think>
What this code will do...
</think>
<tool_call>
{"name": "run_code", "arguments": {}}
<code>
print("Results...")
</code>
</tool_call>

When the task is complete:
<think>
Why the task is done...
</think>
<answer>
Final answer
</answer>"#;

const DEFAULT_RULES: &[&str] = &[
    "Make exactly one tool call per response and wait for its <tool_response>.",
    "Never write <tool_response> yourself.",
    "Put code inside <code> instead of the JSON arguments.",
    "Use the paths listed above; relative paths resolve against the base directory.",
];

/// 시스템 프롬프트 빌더
#[derive(Debug, Clone)]
pub struct SystemPromptBuilder {
    /// 지시문
    instruction: String,
    /// 날짜 (기본: 오늘)
    date: Option<String>,
    /// 작업 경로 목록 (이름, 경로)
    paths: Vec<(String, String)>,
    /// `<tools>` 블록
    tools: Option<String>,
    /// 추가 규칙
    rules: Vec<String>,
}

impl Default for SystemPromptBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemPromptBuilder {
    pub fn new() -> Self {
        Self {
            instruction: DEFAULT_INSTRUCTION.to_string(),
            date: None,
            paths: Vec::new(),
            tools: None,
            rules: DEFAULT_RULES.iter().map(|r| r.to_string()).collect(),
        }
    }

    /// 커스텀 지시문 설정
    pub fn with_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.instruction = instruction.into();
        self
    }

    /// 날짜 고정 (테스트용)
    pub fn with_date(mut self, date: impl Into<String>) -> Self {
        self.date = Some(date.into());
        self
    }

    /// 작업 디렉토리 안내 추가
    pub fn with_workspace(mut self, workspace: &WorkspaceSettings) -> Self {
        let entries = [
            ("Base directory", workspace.base_dir.clone()),
            ("Scripts", workspace.scripts_dir()),
            ("Results", workspace.results_dir()),
            ("Figures", workspace.figures_dir()),
            ("Events", workspace.events_dir()),
            ("Output", workspace.output_dir()),
        ];
        self.paths = entries
            .into_iter()
            .map(|(label, path)| (label.to_string(), path.display().to_string()))
            .collect();
        self
    }

    /// 도구 목록 설정
    pub fn with_tools(mut self, registry: &ToolRegistry) -> Self {
        self.tools = Some(registry.manifest_block());
        self
    }

    /// 규칙 추가
    pub fn with_rule(mut self, rule: impl Into<String>) -> Self {
        self.rules.push(rule.into());
        self
    }

    /// 전체 프롬프트 생성
    pub fn build(&self) -> String {
        let date = self
            .date
            .clone()
            .unwrap_or_else(|| Local::now().format("%Y-%m-%d").to_string());

        let mut prompt = self.instruction.clone();
        prompt.push_str(&format!("\n\nCurrent date: {}\n", date));

        if !self.paths.is_empty() {
            prompt.push_str("\n# Paths\n");
            for (label, path) in &self.paths {
                prompt.push_str(&format!("- {}: `{}`\n", label, path));
            }
        }

        if let Some(tools) = &self.tools {
            prompt.push_str("\n# Tools\n");
            prompt.push_str(tools);
            prompt.push('\n');
        }

        prompt.push('\n');
        prompt.push_str(RESPONSE_FORMAT);
        prompt.push('\n');

        if !self.rules.is_empty() {
            prompt.push_str("\n# Rules\n");
            for (i, rule) in self.rules.iter().enumerate() {
                prompt.push_str(&format!("{}. {}\n", i + 1, rule));
            }
        }

        prompt
    }
}

// ============================================================================
// 테스트
// ============================================================================
