//! Tool Security - 경로 검증
//!
//! File tools resolve every path against the workspace base directory and
//! check it before touching the filesystem.
//!
//! ## 기능
//! - 확장자 허용 목록 (읽기 / 쓰기 분리)
//! - 쓰기 허용 디렉토리 제한
//! - 파일 크기 제한

use relab_foundation::RelabConfig;
use std::path::{Component, Path, PathBuf};

/// 경로 검증 실패 사유
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathViolation {
    NotFound(PathBuf),
    NotAFile(PathBuf),
    NotADirectory(PathBuf),
    UnsupportedExtension { extension: String, allowed: Vec<String> },
    OutsideWriteRoots { path: PathBuf, allowed: Vec<PathBuf> },
    TooLarge { size: u64, max: u64 },
}

impl PathViolation {
    pub fn message(&self) -> String {
        match self {
            PathViolation::NotFound(path) => format!("File not found: {}", path.display()),
            PathViolation::NotAFile(path) => format!("Not a file: {}", path.display()),
            PathViolation::NotADirectory(path) => {
                format!("Not a directory: {}", path.display())
            }
            PathViolation::UnsupportedExtension { extension, allowed } => format!(
                "Unsupported file type: {}. Allowed: [{}]",
                if extension.is_empty() { "(none)" } else { extension },
                allowed.join(", ")
            ),
            PathViolation::OutsideWriteRoots { path, allowed } => format!(
                "Write not allowed in {}. Allowed: [{}]",
                path.display(),
                allowed
                    .iter()
                    .map(|p| p.display().to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
            PathViolation::TooLarge { size, max } => {
                format!("File too large: {} bytes (max {} bytes)", size, max)
            }
        }
    }
}

impl std::fmt::Display for PathViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message())
    }
}

/// 경로 정책
#[derive(Debug, Clone)]
pub struct PathPolicy {
    base_dir: PathBuf,
    readable_extensions: Vec<String>,
    writable_extensions: Vec<String>,
    write_roots: Vec<PathBuf>,
    max_file_size: u64,
}

impl PathPolicy {
    pub fn from_config(config: &RelabConfig) -> Self {
        let base_dir = absolute(&config.workspace.base_dir);
        let write_roots = config
            .workspace
            .write_roots()
            .iter()
            .map(|root| normalize_path(&absolute(root)))
            .collect();

        Self {
            base_dir: normalize_path(&base_dir),
            readable_extensions: lowercase(&config.files.readable_extensions),
            writable_extensions: lowercase(&config.files.writable_extensions),
            write_roots,
            max_file_size: config.files.max_file_size,
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Resolve `raw` against the base directory and normalize it lexically
    pub fn resolve(&self, raw: &str) -> PathBuf {
        let path = Path::new(raw);
        if path.is_absolute() {
            normalize_path(path)
        } else {
            normalize_path(&self.base_dir.join(path))
        }
    }

    /// 읽기 검증 (존재, 파일 여부, 확장자, 크기)
    pub fn check_readable(&self, path: &Path) -> Result<u64, PathViolation> {
        if !path.exists() {
            return Err(PathViolation::NotFound(path.to_path_buf()));
        }
        if !path.is_file() {
            return Err(PathViolation::NotAFile(path.to_path_buf()));
        }
        check_extension(path, &self.readable_extensions)?;

        let size = std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);
        if size > self.max_file_size {
            return Err(PathViolation::TooLarge {
                size,
                max: self.max_file_size,
            });
        }
        Ok(size)
    }

    /// 디렉토리 검증
    pub fn check_directory(&self, path: &Path) -> Result<(), PathViolation> {
        if !path.exists() {
            return Err(PathViolation::NotFound(path.to_path_buf()));
        }
        if !path.is_dir() {
            return Err(PathViolation::NotADirectory(path.to_path_buf()));
        }
        Ok(())
    }

    /// 쓰기 검증 (확장자, 허용 디렉토리, 크기)
    pub fn check_writable(&self, path: &Path, content_len: u64) -> Result<(), PathViolation> {
        check_extension(path, &self.writable_extensions)?;

        if !self.write_roots.iter().any(|root| path.starts_with(root)) {
            return Err(PathViolation::OutsideWriteRoots {
                path: path.to_path_buf(),
                allowed: self.write_roots.clone(),
            });
        }

        if content_len > self.max_file_size {
            return Err(PathViolation::TooLarge {
                size: content_len,
                max: self.max_file_size,
            });
        }
        Ok(())
    }
}

/// Lowercased extension with its leading dot, or empty
pub fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e.to_lowercase()))
        .unwrap_or_default()
}

fn check_extension(path: &Path, allowed: &[String]) -> Result<(), PathViolation> {
    let extension = extension_of(path);
    if allowed.iter().any(|a| *a == extension) {
        Ok(())
    } else {
        Err(PathViolation::UnsupportedExtension {
            extension,
            allowed: allowed.to_vec(),
        })
    }
}

fn lowercase(list: &[String]) -> Vec<String> {
    list.iter().map(|s| s.to_lowercase()).collect()
}

fn absolute(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    match std::env::current_dir() {
        Ok(cwd) => cwd.join(path),
        Err(_) => path.to_path_buf(),
    }
}

/// 경로 정규화 (`.` 제거, `..` 해석; 파일시스템 접근 없음)
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

// ============================================================================
// 테스트
// ============================================================================
