//! Stop handle
//!
//! 실행 중인 에이전트 루프를 외부에서 중단하기 위한 플래그입니다.
//! 루프는 반복 경계마다 한 번씩 플래그를 확인하며, 도구 실행 도중에는
//! 끊지 않습니다.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// 중단 핸들
///
/// 복제해서 다른 태스크(예: Ctrl-C 핸들러)로 넘길 수 있습니다.
#[derive(Debug, Clone, Default)]
pub struct StopHandle {
    stopped: Arc<AtomicBool>,
    reason: Arc<Mutex<Option<String>>>,
}

impl StopHandle {
    /// 새 핸들 생성
    pub fn new() -> Self {
        Self::default()
    }

    /// 중단 요청
    pub fn stop(&self, reason: impl Into<String>) {
        *self.reason.lock().unwrap_or_else(PoisonError::into_inner) = Some(reason.into());
        self.stopped.store(true, Ordering::SeqCst);
    }

    /// 중단 요청됐는지 확인
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// 중단 이유
    pub fn reason(&self) -> Option<String> {
        self.reason
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// 실행 종료 시 초기화
    pub fn reset(&self) {
        self.stopped.store(false, Ordering::SeqCst);
        *self.reason.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

// ============================================================================
// 테스트
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stop_visible_through_clone() {
        let handle = StopHandle::new();
        let remote = handle.clone();
        assert!(!handle.is_stopped());

        remote.stop("ctrl-c");
        assert!(handle.is_stopped());
        assert_eq!(handle.reason().as_deref(), Some("ctrl-c"));

        handle.reset();
        assert!(!remote.is_stopped());
        assert!(remote.reason().is_none());
    }
}
