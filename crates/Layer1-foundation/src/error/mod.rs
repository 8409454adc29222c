//! Error types for relab
//!
//! 모든 에러를 중앙에서 관리

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// relab 에러 타입
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // 설정 관련
    // ========================================================================
    #[error("Configuration error: {0}")]
    Config(String),

    // ========================================================================
    // Tool 관련
    // ========================================================================
    #[error("Tool '{0}' is already registered")]
    DuplicateTool(String),

    #[error("Unknown tool '{name}'. Available: [{}]", available.join(", "))]
    UnknownTool { name: String, available: Vec<String> },

    #[error("Tool execution failed: {tool} - {message}")]
    ToolExecution { tool: String, message: String },

    // ========================================================================
    // Provider 관련
    // ========================================================================
    #[error("Provider error: {0}")]
    Provider(String),

    // ========================================================================
    // 세션 관련
    // ========================================================================
    #[error("Session error: {0}")]
    Session(String),

    // ========================================================================
    // 실행 관련
    // ========================================================================
    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Cancelled")]
    Cancelled,

    // ========================================================================
    // 일반
    // ========================================================================
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // ========================================================================
    // 외부 에러 변환
    // ========================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // ========================================================================
    // 기타
    // ========================================================================
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// 재시도 가능한 에러인지 확인
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Timeout(_) | Error::Provider(_))
    }

    /// Unknown tool 에러 생성 헬퍼
    pub fn unknown_tool(name: impl Into<String>, available: Vec<String>) -> Self {
        Error::UnknownTool {
            name: name.into(),
            available,
        }
    }

    /// Tool 실행 에러 생성 헬퍼
    pub fn tool_execution(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Error::ToolExecution {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// Missing or mistyped tool argument
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Error::InvalidInput(message.into())
    }
}

// ============================================================================
// From 구현 (추가 변환)
// ============================================================================

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Internal(s)
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Internal(s.to_string())
    }
}

// ============================================================================
// 테스트
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_tool_lists_available() {
        let err = Error::unknown_tool("fly", vec!["read_file".into(), "run_code".into()]);
        assert_eq!(
            err.to_string(),
            "Unknown tool 'fly'. Available: [read_file, run_code]"
        );
    }

    #[test]
    fn test_duplicate_tool_message() {
        let err = Error::DuplicateTool("echo".into());
        assert_eq!(err.to_string(), "Tool 'echo' is already registered");
    }

    #[test]
    fn test_retryable() {
        assert!(Error::Timeout("model call".into()).is_retryable());
        assert!(!Error::Cancelled.is_retryable());
        assert!(!Error::invalid_input("missing 'code'").is_retryable());
    }

    #[test]
    fn test_from_str() {
        let err: Error = "boom".into();
        assert!(matches!(err, Error::Internal(ref m) if m == "boom"));
    }
}
