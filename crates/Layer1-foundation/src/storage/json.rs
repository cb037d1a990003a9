//! JSON 파일 저장소

use crate::{Error, Result};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};

/// Directory under the platform config dir (`~/.config/anvil`)
pub const GLOBAL_DIR_NAME: &str = "anvil";
/// Directory under a project root (`.anvil`)
pub const PROJECT_DIR_NAME: &str = ".anvil";

/// JSON 설정 저장소
#[derive(Debug, Clone)]
pub struct JsonStore {
    base_dir: PathBuf,
}

impl JsonStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// 글로벌 설정 (~/.config/anvil/)
    pub fn global() -> Result<Self> {
        let dir = dirs::config_dir()
            .ok_or_else(|| Error::Config("cannot locate the user config directory".into()))?
            .join(GLOBAL_DIR_NAME);
        Ok(Self::new(dir))
    }

    /// 프로젝트 설정 (<root>/.anvil/)
    pub fn project(root: impl AsRef<Path>) -> Self {
        Self::new(root.as_ref().join(PROJECT_DIR_NAME))
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn file_path(&self, filename: &str) -> PathBuf {
        self.base_dir.join(filename)
    }

    pub fn exists(&self, filename: &str) -> bool {
        self.file_path(filename).is_file()
    }

    /// JSON 로드
    pub fn load<T: DeserializeOwned>(&self, filename: &str) -> Result<T> {
        let path = self.file_path(filename);
        let content = std::fs::read_to_string(&path)
            .map_err(|e| Error::Config(format!("failed to read {}: {}", path.display(), e)))?;
        serde_json::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse {}: {}", path.display(), e)))
    }

    /// 파일이 없으면 `None`
    pub fn load_optional<T: DeserializeOwned>(&self, filename: &str) -> Result<Option<T>> {
        if !self.exists(filename) {
            return Ok(None);
        }
        self.load(filename).map(Some)
    }

    /// Raw JSON value, for layered merging before deserialization
    pub fn load_value(&self, filename: &str) -> Result<Option<Value>> {
        self.load_optional(filename)
    }

    /// JSON 저장 (디렉토리 자동 생성)
    pub fn save<T: Serialize>(&self, filename: &str, data: &T) -> Result<()> {
        std::fs::create_dir_all(&self.base_dir).map_err(|e| {
            Error::Config(format!(
                "failed to create {}: {}",
                self.base_dir.display(),
                e
            ))
        })?;

        let path = self.file_path(filename);
        let content = serde_json::to_string_pretty(data)?;
        std::fs::write(&path, content)
            .map_err(|e| Error::Config(format!("failed to write {}: {}", path.display(), e)))
    }

    /// 파일 삭제 (없으면 무시)
    pub fn remove(&self, filename: &str) -> Result<()> {
        let path = self.file_path(filename);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::Config(format!(
                "failed to remove {}: {}",
                path.display(),
                e
            ))),
        }
    }
}

/// Overlay `overlay` onto `base`
///
/// Objects merge key by key; any other value in the overlay replaces the base.
pub fn merge_json(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base), Value::Object(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(existing) => merge_json(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}
