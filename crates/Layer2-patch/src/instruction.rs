//! Edit instruction types

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// What to do with the fenced code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// Whole file, or the `lines:` range when one is given
    #[default]
    Replace,
    Append,
    Prepend,
    /// Before `line_start`; appends when no line is given
    Insert,
}

impl Action {
    pub const ALL: [Action; 4] = [
        Action::Replace,
        Action::Append,
        Action::Prepend,
        Action::Insert,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Replace => "replace",
            Action::Append => "append",
            Action::Prepend => "prepend",
            Action::Insert => "insert",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unrecognized action word
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown action '{0}' (expected replace, append, prepend or insert)")]
pub struct UnknownAction(pub String);

impl FromStr for Action {
    type Err = UnknownAction;

    /// Case-insensitive
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let word = s.trim();
        Action::ALL
            .into_iter()
            .find(|action| action.as_str().eq_ignore_ascii_case(word))
            .ok_or_else(|| UnknownAction(word.to_string()))
    }
}

/// One per-file edit extracted from a model reply
///
/// `file_path` is untrusted until the applier has validated it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeInstruction {
    pub file_path: String,
    #[serde(default)]
    pub action: Action,
    /// 1-based, inclusive
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_start: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_end: Option<usize>,
    /// Verbatim fenced body
    pub code: String,
}

impl ChangeInstruction {
    pub fn new(file_path: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            file_path: file_path.into(),
            action: Action::Replace,
            line_start: None,
            line_end: None,
            code: code.into(),
        }
    }

    pub fn with_action(mut self, action: Action) -> Self {
        self.action = action;
        self
    }

    pub fn with_lines(mut self, start: usize, end: usize) -> Self {
        self.line_start = Some(start);
        self.line_end = Some(end);
        self
    }

    /// Inclusive line range, when a start line is set
    pub fn line_range(&self) -> Option<(usize, usize)> {
        self.line_start
            .map(|start| (start, self.line_end.unwrap_or(start)))
    }

    /// Render back into the reply format the parser reads
    ///
    /// The closing fence needs its own line, so non-empty code without a
    /// trailing newline gains one and parses back with it.
    pub fn to_markdown(&self) -> String {
        let mut out = format!("--- FILE: {} ---\n", self.file_path);
        if self.action != Action::Replace {
            out.push_str(&format!("action: {}\n", self.action));
        }
        match self.line_range() {
            Some((start, end)) if start == end => out.push_str(&format!("lines: {}\n", start)),
            Some((start, end)) => out.push_str(&format!("lines: {}-{}\n", start, end)),
            None => {}
        }

        let fence = fence_for(&self.code);
        out.push_str(&fence);
        out.push('\n');
        out.push_str(&self.code);
        if !self.code.is_empty() && !self.code.ends_with('\n') {
            out.push('\n');
        }
        out.push_str(&fence);
        out.push('\n');
        out
    }
}

/// Backtick fence longer than any backtick run inside `code`
fn fence_for(code: &str) -> String {
    let mut longest = 0;
    let mut run = 0;
    for c in code.chars() {
        if c == '`' {
            run += 1;
            longest = longest.max(run);
        } else {
            run = 0;
        }
    }
    "`".repeat((longest + 1).max(3))
}
