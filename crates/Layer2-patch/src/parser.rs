//! Response parser
//!
//! Extracts [`ChangeInstruction`]s from a markdown reply of the form
//!
//! ````text
//! --- FILE: src/utils.ts ---
//! action: replace
//! lines: 10-15
//! ```ts
//! ...code...
//! ```
//! ````
//!
//! The parser is a three-state machine over lines:
//!
//! ```text
//!  SeekingHeader ──header──▶ SeekingFenceOrMeta ──opener──▶ InFence
//!        ▲                     │  action: / lines:             │
//!        │                     └──header (drops pending)       │
//!        └───────────────────────────── closer (emit) ◀────────┘
//! ```
//!
//! Malformed entries are skipped and reported as [`ParseIssue`]s; parsing
//! never fails.

use serde::Serialize;
use thiserror::Error;

use crate::instruction::{Action, ChangeInstruction};

/// Non-fatal problem found while parsing (1-based source lines)
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ParseIssue {
    #[error("line {line}: header for '{path}' has no fenced block")]
    HeaderWithoutBlock { line: usize, path: String },

    #[error("line {line}: fenced block for '{path}' is never closed")]
    UnterminatedFence { line: usize, path: String },

    #[error("line {line}: unknown action '{value}', keeping '{kept}'")]
    UnknownAction {
        line: usize,
        value: String,
        kept: Action,
    },

    #[error("line {line}: invalid line range '{value}'")]
    InvalidLineRange { line: usize, value: String },
}

/// Instructions plus diagnostics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ParseOutput {
    pub instructions: Vec<ChangeInstruction>,
    pub issues: Vec<ParseIssue>,
}

impl ParseOutput {
    /// No entry was dropped or adjusted
    pub fn is_complete(&self) -> bool {
        self.issues.is_empty()
    }
}

/// Extract every well-formed `{header, fenced block}` pair in document order
pub fn parse(markdown: &str) -> Vec<ChangeInstruction> {
    parse_detailed(markdown).instructions
}

/// [`parse`] with diagnostics
pub fn parse_detailed(markdown: &str) -> ParseOutput {
    let mut parser = LineParser::default();
    let mut offset = 0;

    for (index, raw) in markdown.split_inclusive('\n').enumerate() {
        parser.feed(markdown, offset, raw, index + 1);
        offset += raw.len();
    }

    parser.finish()
}

// ============================================================================
// State machine
// ============================================================================

#[derive(Debug, Clone)]
struct PendingHeader {
    path: String,
    line: usize,
    action: Action,
    lines: Option<(usize, usize)>,
}

impl PendingHeader {
    fn into_instruction(self, code: String) -> ChangeInstruction {
        ChangeInstruction {
            file_path: self.path,
            action: self.action,
            line_start: self.lines.map(|(start, _)| start),
            line_end: self.lines.map(|(_, end)| end),
            code,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Fence {
    ch: char,
    len: usize,
}

#[derive(Debug, Default)]
enum State {
    #[default]
    SeekingHeader,
    SeekingFenceOrMeta(PendingHeader),
    InFence {
        header: PendingHeader,
        fence: Fence,
        /// Byte offset of the first body line
        body_start: usize,
    },
}

#[derive(Debug, Default)]
struct LineParser {
    state: State,
    output: ParseOutput,
}

impl LineParser {
    /// `raw` is one line including its terminator, starting at `offset`
    fn feed(&mut self, source: &str, offset: usize, raw: &str, line_no: usize) {
        let line = raw.trim_end_matches(['\n', '\r']);

        self.state = match std::mem::take(&mut self.state) {
            State::SeekingHeader => match parse_header(line) {
                Some(path) => State::SeekingFenceOrMeta(PendingHeader {
                    path,
                    line: line_no,
                    action: Action::default(),
                    lines: None,
                }),
                None => State::SeekingHeader,
            },

            State::SeekingFenceOrMeta(mut header) => {
                if let Some(path) = parse_header(line) {
                    self.output.issues.push(ParseIssue::HeaderWithoutBlock {
                        line: header.line,
                        path: header.path,
                    });
                    State::SeekingFenceOrMeta(PendingHeader {
                        path,
                        line: line_no,
                        action: Action::default(),
                        lines: None,
                    })
                } else if let Some(fence) = parse_opener(line) {
                    State::InFence {
                        header,
                        fence,
                        body_start: offset + raw.len(),
                    }
                } else {
                    self.apply_metadata(&mut header, line, line_no);
                    State::SeekingFenceOrMeta(header)
                }
            }

            State::InFence {
                header,
                fence,
                body_start,
            } => {
                if is_closer(line, fence) {
                    let code = source[body_start..offset].to_string();
                    self.output.instructions.push(header.into_instruction(code));
                    State::SeekingHeader
                } else {
                    State::InFence {
                        header,
                        fence,
                        body_start,
                    }
                }
            }
        };
    }

    fn apply_metadata(&mut self, header: &mut PendingHeader, line: &str, line_no: usize) {
        let Some((key, value)) = line.trim().split_once(':') else {
            return;
        };
        let value = value.trim();

        if key.trim().eq_ignore_ascii_case("action") {
            match value.parse::<Action>() {
                Ok(action) => header.action = action,
                Err(_) => self.output.issues.push(ParseIssue::UnknownAction {
                    line: line_no,
                    value: value.to_string(),
                    kept: header.action,
                }),
            }
        } else if key.trim().eq_ignore_ascii_case("lines") {
            match parse_line_range(value) {
                Some(range) => header.lines = Some(range),
                None => self.output.issues.push(ParseIssue::InvalidLineRange {
                    line: line_no,
                    value: value.to_string(),
                }),
            }
        }
    }

    fn finish(mut self) -> ParseOutput {
        match std::mem::take(&mut self.state) {
            State::SeekingHeader => {}
            State::SeekingFenceOrMeta(header) => {
                self.output.issues.push(ParseIssue::HeaderWithoutBlock {
                    line: header.line,
                    path: header.path,
                });
            }
            State::InFence { header, .. } => {
                self.output.issues.push(ParseIssue::UnterminatedFence {
                    line: header.line,
                    path: header.path,
                });
            }
        }
        self.output
    }
}

// ============================================================================
// Line classifiers
// ============================================================================

/// `--- FILE: <path> ---` → path (trimmed, spaces allowed)
fn parse_header(line: &str) -> Option<String> {
    let inner = line.trim().strip_prefix("---")?.strip_suffix("---")?;
    let path = inner.trim().strip_prefix("FILE:")?.trim();
    (!path.is_empty()).then(|| path.to_string())
}

/// Three or more backticks or tildes; anything after is a language tag
fn parse_opener(line: &str) -> Option<Fence> {
    let trimmed = line.trim_start();
    let ch = trimmed.chars().next().filter(|c| *c == '`' || *c == '~')?;
    let len = trimmed.chars().take_while(|c| *c == ch).count();
    (len >= 3).then_some(Fence { ch, len })
}

/// Only the opener's character, at least as many times
fn is_closer(line: &str, fence: Fence) -> bool {
    let trimmed = line.trim();
    let len = trimmed.chars().count();
    len >= fence.len && trimmed.chars().all(|c| c == fence.ch)
}

/// `A-B` or `A`; both bounds 1-based with `A <= B`
fn parse_line_range(value: &str) -> Option<(usize, usize)> {
    let (start, end) = match value.split_once('-') {
        Some((start, end)) => (start.trim(), end.trim()),
        None => (value.trim(), value.trim()),
    };
    let start: usize = start.parse().ok()?;
    let end: usize = end.parse().ok()?;
    (start >= 1 && start <= end).then_some((start, end))
}

// ============================================================================
// Streaming
// ============================================================================

/// Incremental parser for streamed replies
///
/// Only complete lines are parsed, so a fence closer split across chunks is
/// never mistaken for a finished block.
#[derive(Debug, Default)]
pub struct StreamingParser {
    buffer: String,
    emitted: usize,
}

impl StreamingParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk, returning instructions completed by it
    pub fn push(&mut self, chunk: &str) -> Vec<ChangeInstruction> {
        self.buffer.push_str(chunk);
        let completed = self.completed();
        let fresh = completed.into_iter().skip(self.emitted).collect::<Vec<_>>();
        self.emitted += fresh.len();
        fresh
    }

    /// Every instruction whose closing fence line has fully arrived
    pub fn completed(&self) -> Vec<ChangeInstruction> {
        match self.buffer.rfind('\n') {
            Some(end) => parse(&self.buffer[..=end]),
            None => Vec::new(),
        }
    }

    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    /// Parse everything received, including a final unterminated line
    pub fn finish(self) -> ParseOutput {
        parse_detailed(&self.buffer)
    }
}
