//! Storage module for relab
//!
//! - `json`: JSON - 설정 및 세션 파일 저장/로드

mod json;

pub use json::JsonStore;
