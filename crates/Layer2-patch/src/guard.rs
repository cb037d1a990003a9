//! Path guard
//!
//! Every instruction path is untrusted model output. It is checked before any
//! I/O:
//!
//! 1. absolute forms (`/x`, `\x`, `C:\x`, `\\server\share`) are rejected
//! 2. lexical normalization must stay inside the root and not be the root
//! 3. protected glob patterns (`.git/**` by default) are refused
//! 4. the nearest existing ancestor must canonicalize inside the canonical
//!    root, which catches symlink escapes

use glob::{MatchOptions, Pattern};
use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::error::PatchError;

/// Why a path was refused
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "violation", rename_all = "snake_case")]
pub enum PathViolation {
    #[error("empty path")]
    Empty,

    #[error("'{path}' contains a NUL byte")]
    InvalidCharacter { path: String },

    #[error("absolute path '{path}' is not allowed")]
    Absolute { path: String },

    #[error("'{path}' escapes the workspace root")]
    Escapes { path: String },

    #[error("'{path}' resolves to the workspace root itself")]
    IsRoot { path: String },

    #[error("'{path}' resolves through a link outside the workspace")]
    SymlinkEscape { path: String },

    #[error("'{path}' matches protected pattern '{pattern}'")]
    Protected { path: String, pattern: String },
}

/// A validated location inside the workspace
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPath {
    /// Normalized, `/`-separated, relative to the root
    pub relative: String,
    /// Canonical root joined with `relative`
    pub absolute: PathBuf,
}

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// Workspace-root path validator
#[derive(Debug, Clone)]
pub struct PathGuard {
    root: PathBuf,
    protected: Vec<Pattern>,
}

impl PathGuard {
    /// The root must exist; it is canonicalized once here
    pub fn new(root: impl AsRef<Path>) -> Result<Self, PatchError> {
        let root = root.as_ref();
        let canonical = root.canonicalize().map_err(|source| PatchError::InvalidRoot {
            path: root.to_path_buf(),
            source,
        })?;
        if !canonical.is_dir() {
            return Err(PatchError::RootNotDirectory(canonical));
        }
        Ok(Self {
            root: canonical,
            protected: Vec::new(),
        })
    }

    /// Add glob patterns, relative to the root, that are never written
    pub fn with_protected<I, S>(mut self, patterns: I) -> Result<Self, PatchError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for pattern in patterns {
            let pattern = pattern.as_ref();
            let compiled = Pattern::new(pattern).map_err(|source| PatchError::InvalidPattern {
                pattern: pattern.to_string(),
                source,
            })?;
            self.protected.push(compiled);
        }
        Ok(self)
    }

    /// Canonical workspace root
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn protected_patterns(&self) -> impl Iterator<Item = &str> {
        self.protected.iter().map(Pattern::as_str)
    }

    /// Validate `raw` and map it into the workspace
    pub fn resolve(&self, raw: &str) -> Result<ResolvedPath, PathViolation> {
        if raw.trim().is_empty() {
            return Err(PathViolation::Empty);
        }
        if raw.contains('\0') {
            return Err(PathViolation::InvalidCharacter {
                path: raw.to_string(),
            });
        }
        if is_absolute_like(raw) {
            return Err(PathViolation::Absolute {
                path: raw.to_string(),
            });
        }

        let components = normalize(raw).ok_or_else(|| PathViolation::Escapes {
            path: raw.to_string(),
        })?;
        if components.is_empty() {
            return Err(PathViolation::IsRoot {
                path: raw.to_string(),
            });
        }

        let relative = components.join("/");
        self.check_protected(raw, &relative)?;

        let absolute = components
            .iter()
            .fold(self.root.clone(), |path, part| path.join(part));
        self.check_links(raw, &absolute)?;

        Ok(ResolvedPath { relative, absolute })
    }

    fn check_protected(&self, raw: &str, relative: &str) -> Result<(), PathViolation> {
        match self
            .protected
            .iter()
            .find(|p| p.matches_with(relative, MATCH_OPTIONS))
        {
            Some(pattern) => Err(PathViolation::Protected {
                path: raw.to_string(),
                pattern: pattern.as_str().to_string(),
            }),
            None => Ok(()),
        }
    }

    /// Nearest existing ancestor (or the target itself) must stay inside
    fn check_links(&self, raw: &str, absolute: &Path) -> Result<(), PathViolation> {
        let escape = || PathViolation::SymlinkEscape {
            path: raw.to_string(),
        };

        let mut probe = Some(absolute);
        while let Some(current) = probe {
            if let Ok(meta) = std::fs::symlink_metadata(current) {
                return match current.canonicalize() {
                    Ok(canonical) if canonical.starts_with(&self.root) => {
                        // a link inside the root may still point at a protected file
                        if current == absolute {
                            if let Ok(rel) = canonical.strip_prefix(&self.root) {
                                let rel = rel.to_string_lossy().replace('\\', "/");
                                self.check_protected(raw, &rel)?;
                            }
                        }
                        Ok(())
                    }
                    Ok(_) => Err(escape()),
                    // dangling link: the write would land wherever it points
                    Err(_) if meta.file_type().is_symlink() => Err(escape()),
                    // surfaced as an I/O failure when the file is touched
                    Err(_) => Ok(()),
                };
            }
            probe = current.parent();
        }
        Ok(())
    }
}

fn is_absolute_like(raw: &str) -> bool {
    let bytes = raw.as_bytes();
    raw.starts_with('/')
        || raw.starts_with('\\')
        || (bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':')
        || Path::new(raw).is_absolute()
}

/// Resolve `.` and `..` without touching the file system
///
/// `None` when a `..` would climb above the root. Both `/` and `\` separate.
fn normalize(raw: &str) -> Option<Vec<&str>> {
    let mut parts: Vec<&str> = Vec::new();
    for part in raw.split(['/', '\\']) {
        match part {
            "" | "." => {}
            ".." => {
                parts.pop()?;
            }
            other => parts.push(other),
        }
    }
    Some(parts)
}
