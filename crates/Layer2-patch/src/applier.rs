//! Patch applier
//!
//! Turns each [`ChangeInstruction`] into one bounded, path-checked file
//! mutation. Instructions run strictly in order; a failure is recorded for
//! that instruction only and never stops the rest of the batch.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::error::PatchError;
use crate::guard::{PathGuard, ResolvedPath};
use crate::instruction::{Action, ChangeInstruction};
use crate::lines::{join_text, LineBuffer};
use crate::report::{AppliedChange, ApplyEntry, ApplyOutcome, ApplyReport, FailureReason};

/// Resulting content of one instruction, without writing it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preview {
    pub change: AppliedChange,
    pub content: String,
}

/// Applies instructions below a workspace root
#[derive(Debug, Clone)]
pub struct PatchApplier {
    guard: PathGuard,
}

impl PatchApplier {
    pub fn new(root: impl AsRef<Path>) -> Result<Self, PatchError> {
        Ok(Self {
            guard: PathGuard::new(root)?,
        })
    }

    /// Refuse writes matching any of `patterns` (globs relative to the root)
    pub fn with_protected_paths<I, S>(mut self, patterns: I) -> Result<Self, PatchError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.guard = self.guard.with_protected(patterns)?;
        Ok(self)
    }

    pub fn root(&self) -> &Path {
        self.guard.root()
    }

    pub fn guard(&self) -> &PathGuard {
        &self.guard
    }

    /// Compute the change without writing
    pub fn preview(&self, instruction: &ChangeInstruction) -> Result<Preview, FailureReason> {
        let resolved = self.guard.resolve(&instruction.file_path)?;
        let current = read_existing(&resolved.absolute, &instruction.file_path)?;
        plan(instruction, resolved, current)
    }

    /// Validate, compute and write one instruction
    pub fn apply(&self, instruction: &ChangeInstruction) -> Result<AppliedChange, FailureReason> {
        let Preview { change, content } = self.preview(instruction)?;
        write_file(&change.resolved_path, &content, &instruction.file_path)?;
        info!(
            "{} {} ({} -> {} lines)",
            change.action, change.file_path, change.lines_before, change.lines_after
        );
        Ok(change)
    }

    /// Apply every instruction in order
    pub fn apply_all(&self, instructions: &[ChangeInstruction]) -> ApplyReport {
        let mut report = ApplyReport::new(false);
        for (index, instruction) in instructions.iter().enumerate() {
            let result = self.apply(instruction);
            report.entries.push(entry(index, instruction, result));
        }
        debug!("apply_all: {}", report.summary());
        report
    }

    /// Dry run of [`apply_all`](Self::apply_all)
    ///
    /// Later instructions see the pending content of earlier ones, so the
    /// report matches what a real run would do.
    pub fn preview_all(&self, instructions: &[ChangeInstruction]) -> ApplyReport {
        let mut report = ApplyReport::new(true);
        let mut pending: HashMap<PathBuf, String> = HashMap::new();

        for (index, instruction) in instructions.iter().enumerate() {
            let result = self
                .guard
                .resolve(&instruction.file_path)
                .map_err(FailureReason::from)
                .and_then(|resolved| {
                    let current = match pending.get(&resolved.absolute) {
                        Some(content) => Some(content.clone()),
                        None => read_existing(&resolved.absolute, &instruction.file_path)?,
                    };
                    plan(instruction, resolved, current)
                });

            let result = result.map(|preview| {
                pending.insert(preview.change.resolved_path.clone(), preview.content);
                preview.change
            });
            report.entries.push(entry(index, instruction, result));
        }
        report
    }
}

fn entry(
    index: usize,
    instruction: &ChangeInstruction,
    result: Result<AppliedChange, FailureReason>,
) -> ApplyEntry {
    let outcome = match result {
        Ok(change) => ApplyOutcome::Applied(change),
        Err(reason) => {
            warn!("skipped {}: {}", instruction.file_path, reason);
            ApplyOutcome::Failed { reason }
        }
    };
    ApplyEntry {
        index,
        file_path: instruction.file_path.clone(),
        action: instruction.action,
        outcome,
    }
}

/// `None` when the file does not exist
fn read_existing(path: &Path, display: &str) -> Result<Option<String>, FailureReason> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(FailureReason::io(display, &e)),
    }
}

fn write_file(path: &Path, content: &str, display: &str) -> Result<(), FailureReason> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| FailureReason::io(display, &e))?;
    }
    std::fs::write(path, content).map_err(|e| FailureReason::io(display, &e))
}

/// New content for `instruction` applied to `current`
fn plan(
    instruction: &ChangeInstruction,
    resolved: ResolvedPath,
    current: Option<String>,
) -> Result<Preview, FailureReason> {
    let code = instruction.code.as_str();

    let content = match (instruction.action, current.as_deref()) {
        (Action::Replace, existing) => match instruction.line_range() {
            None => code.to_string(),
            Some(range) => {
                let existing = existing.ok_or_else(|| FailureReason::TargetMissing {
                    path: instruction.file_path.clone(),
                })?;
                replace_lines(existing, range, code, &instruction.file_path)?
            }
        },
        // missing targets are created with the code as their content
        (_, None) => code.to_string(),
        (Action::Append, Some(existing)) => join_text(existing, code),
        (Action::Prepend, Some(existing)) => join_text(code, existing),
        (Action::Insert, Some(existing)) => match instruction.line_start {
            Some(line) => insert_before(existing, line, code),
            None => join_text(existing, code),
        },
    };

    let change = AppliedChange {
        file_path: instruction.file_path.clone(),
        resolved_path: resolved.absolute,
        action: instruction.action,
        created: current.is_none(),
        lines_before: current.as_deref().map_or(0, |c| c.lines().count()),
        lines_after: content.lines().count(),
        bytes_written: content.len(),
        previous: current,
    };
    Ok(Preview { change, content })
}

/// Inclusive 1-based `(start, end)`; `end` is clamped to the file length
fn replace_lines(
    existing: &str,
    (start, end): (usize, usize),
    code: &str,
    path: &str,
) -> Result<String, FailureReason> {
    let mut buffer = LineBuffer::parse(existing);
    let line_count = buffer.len();

    if start == 0 || start > end || start > line_count {
        return Err(FailureReason::InvalidRange {
            path: path.to_string(),
            start,
            end,
            line_count,
        });
    }

    buffer.splice(start - 1, end.min(line_count), code);
    Ok(buffer.render())
}

/// Before 1-based `line`; 0 and 1 mean the top, past the end appends
fn insert_before(existing: &str, line: usize, code: &str) -> String {
    let mut buffer = LineBuffer::parse(existing);
    if line > buffer.len() {
        return join_text(existing, code);
    }
    buffer.insert(line.saturating_sub(1), code);
    buffer.render()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guard::PathViolation;

    fn workspace() -> (tempfile::TempDir, PatchApplier) {
        let dir = tempfile::tempdir().unwrap();
        let applier = PatchApplier::new(dir.path())
            .unwrap()
            .with_protected_paths([".git/**"])
            .unwrap();
        (dir, applier)
    }

    fn numbered(n: usize) -> String {
        (1..=n).map(|i| format!("line {i}\n")).collect()
    }

    fn read(dir: &tempfile::TempDir, path: &str) -> String {
        std::fs::read_to_string(dir.path().join(path)).unwrap()
    }

    #[test]
    fn test_whole_replace_creates_file_and_parents() {
        let (dir, applier) = workspace();
        let change = applier
            .apply(&ChangeInstruction::new("src/deep/new.rs", "fn x() {}\n"))
            .unwrap();

        assert!(change.created);
        assert_eq!(change.previous, None);
        assert_eq!(read(&dir, "src/deep/new.rs"), "fn x() {}\n");
    }

    #[test]
    fn test_ranged_replace() {
        let (dir, applier) = workspace();
        std::fs::write(dir.path().join("a.txt"), numbered(20)).unwrap();

        let instr = ChangeInstruction::new("a.txt", "NEW A\nNEW B\n").with_lines(10, 15);
        let change = applier.apply(&instr).unwrap();

        let content = read(&dir, "a.txt");
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 16);
        assert_eq!(lines[8], "line 9");
        assert_eq!(lines[9], "NEW A");
        assert_eq!(lines[10], "NEW B");
        assert_eq!(lines[11], "line 16");
        assert!(content.ends_with("line 20\n"));
        assert_eq!((change.lines_before, change.lines_after), (20, 16));
        assert_eq!(change.previous.as_deref(), Some(numbered(20).as_str()));
    }

    #[test]
    fn test_ranged_replace_clamps_end() {
        let (dir, applier) = workspace();
        std::fs::write(dir.path().join("a.txt"), numbered(3)).unwrap();

        applier
            .apply(&ChangeInstruction::new("a.txt", "tail\n").with_lines(2, 99))
            .unwrap();
        assert_eq!(read(&dir, "a.txt"), "line 1\ntail\n");
    }

    #[test]
    fn test_ranged_replace_out_of_range() {
        let (dir, applier) = workspace();
        std::fs::write(dir.path().join("a.txt"), numbered(3)).unwrap();

        let err = applier
            .apply(&ChangeInstruction::new("a.txt", "x\n").with_lines(4, 5))
            .unwrap_err();
        assert!(matches!(
            err,
            FailureReason::InvalidRange { line_count: 3, .. }
        ));
        assert_eq!(read(&dir, "a.txt"), numbered(3));
    }

    #[test]
    fn test_ranged_replace_missing_target() {
        let (dir, applier) = workspace();
        let err = applier
            .apply(&ChangeInstruction::new("nope.txt", "x").with_lines(1, 2))
            .unwrap_err();
        assert_eq!(
            err,
            FailureReason::TargetMissing {
                path: "nope.txt".into()
            }
        );
        assert!(!dir.path().join("nope.txt").exists());
    }

    #[test]
    fn test_append_and_prepend() {
        let (dir, applier) = workspace();
        std::fs::write(dir.path().join("a.txt"), "middle").unwrap();

        applier
            .apply(&ChangeInstruction::new("a.txt", "end\n").with_action(Action::Append))
            .unwrap();
        applier
            .apply(&ChangeInstruction::new("a.txt", "start").with_action(Action::Prepend))
            .unwrap();
        assert_eq!(read(&dir, "a.txt"), "start\nmiddle\nend\n");

        applier
            .apply(&ChangeInstruction::new("fresh.txt", "only\n").with_action(Action::Append))
            .unwrap();
        assert_eq!(read(&dir, "fresh.txt"), "only\n");
    }

    #[test]
    fn test_insert_positions() {
        let (dir, applier) = workspace();
        let insert = |line: Option<usize>| {
            std::fs::write(dir.path().join("a.txt"), "1\n2\n3\n").unwrap();
            let mut instr = ChangeInstruction::new("a.txt", "X\n").with_action(Action::Insert);
            instr.line_start = line;
            instr.line_end = line;
            applier.apply(&instr).unwrap();
            read(&dir, "a.txt")
        };

        assert_eq!(insert(Some(2)), "1\nX\n2\n3\n");
        assert_eq!(insert(Some(1)), "X\n1\n2\n3\n");
        assert_eq!(insert(Some(0)), "X\n1\n2\n3\n");
        assert_eq!(insert(Some(3)), "1\n2\nX\n3\n");
        assert_eq!(insert(Some(4)), "1\n2\n3\nX\n");
        assert_eq!(insert(None), "1\n2\n3\nX\n");
    }

    #[test]
    fn test_crlf_is_preserved() {
        let (dir, applier) = workspace();
        std::fs::write(dir.path().join("w.txt"), "a\r\nb\r\nc\r\n").unwrap();
        applier
            .apply(&ChangeInstruction::new("w.txt", "B\n").with_lines(2, 2))
            .unwrap();
        assert_eq!(read(&dir, "w.txt"), "a\r\nB\r\nc\r\n");
    }

    #[test]
    fn test_mixed_endings_outside_range_untouched() {
        let (dir, applier) = workspace();
        std::fs::write(dir.path().join("m.txt"), "a\nb\r\nc\nd\r\n").unwrap();
        applier
            .apply(&ChangeInstruction::new("m.txt", "C\n").with_lines(3, 3))
            .unwrap();
        assert_eq!(read(&dir, "m.txt"), "a\nb\r\nC\nd\r\n");
    }

    #[test]
    fn test_path_violation_touches_nothing() {
        let (dir, applier) = workspace();
        for raw in ["../../etc/passwd", "/etc/passwd", ".git/config"] {
            let err = applier
                .apply(&ChangeInstruction::new(raw, "pwned"))
                .unwrap_err();
            assert!(err.is_security(), "{raw}: {err}");
        }
        assert!(!dir.path().join(".git").exists());
        assert!(matches!(
            applier.apply(&ChangeInstruction::new("..", "x")),
            Err(FailureReason::PathViolation {
                violation: PathViolation::Escapes { .. }
            })
        ));
    }

    #[test]
    fn test_directory_target_is_io_failure() {
        let (dir, applier) = workspace();
        std::fs::create_dir(dir.path().join("folder")).unwrap();
        let err = applier
            .apply(&ChangeInstruction::new("folder", "x").with_action(Action::Append))
            .unwrap_err();
        assert_eq!(err.kind(), "io_failure");
    }

    #[test]
    fn test_apply_all_isolates_failures() {
        let (dir, applier) = workspace();
        let instructions = vec![
            ChangeInstruction::new("ok1.txt", "1\n"),
            ChangeInstruction::new("../escape.txt", "x"),
            ChangeInstruction::new("missing.txt", "x").with_lines(1, 1),
            ChangeInstruction::new("ok2.txt", "2\n"),
        ];

        let report = applier.apply_all(&instructions);
        let summary = report.summary();
        assert_eq!((summary.applied, summary.failed, summary.created), (2, 2, 2));
        assert_eq!(report.changed_files(), vec!["ok1.txt", "ok2.txt"]);
        assert!(report.entries[1].failure().unwrap().is_security());
        assert_eq!(report.entries[2].failure().unwrap().kind(), "target_missing");
        assert!(dir.path().join("ok2.txt").exists());
        assert_eq!(summary.to_string(), "2 applied, 2 failed (2 created)");
    }

    #[test]
    fn test_rollback_restores_batch() {
        let (dir, applier) = workspace();
        std::fs::write(dir.path().join("keep.txt"), "original\n").unwrap();

        let report = applier.apply_all(&[
            ChangeInstruction::new("keep.txt", "first edit\n"),
            ChangeInstruction::new("keep.txt", "second\n").with_action(Action::Append),
            ChangeInstruction::new("new/file.txt", "created\n"),
        ]);
        assert!(report.is_success());
        assert_eq!(read(&dir, "keep.txt"), "first edit\nsecond\n");

        let outcome = report.rollback();
        assert!(outcome.is_clean());
        assert_eq!(outcome.restored, 3);
        assert_eq!(read(&dir, "keep.txt"), "original\n");
        assert!(!dir.path().join("new/file.txt").exists());
    }

    #[test]
    fn test_preview_all_writes_nothing_and_chains() {
        let (dir, applier) = workspace();
        std::fs::write(dir.path().join("a.txt"), "1\n2\n").unwrap();

        let report = applier.preview_all(&[
            ChangeInstruction::new("a.txt", "3\n").with_action(Action::Append),
            ChangeInstruction::new("a.txt", "three\n").with_lines(3, 3),
            ChangeInstruction::new("b.txt", "b\n"),
        ]);

        assert!(report.dry_run);
        assert!(report.is_success(), "{:?}", report.failures().collect::<Vec<_>>());
        assert_eq!(report.entries[1].change().unwrap().lines_before, 3);
        assert_eq!(read(&dir, "a.txt"), "1\n2\n");
        assert!(!dir.path().join("b.txt").exists());
        assert_eq!(report.rollback().restored, 0);
    }

    #[test]
    fn test_preview_returns_content() {
        let (dir, applier) = workspace();
        std::fs::write(dir.path().join("a.txt"), "x\n").unwrap();
        let preview = applier
            .preview(&ChangeInstruction::new("a.txt", "y\n").with_action(Action::Prepend))
            .unwrap();
        assert_eq!(preview.content, "y\nx\n");
        assert_eq!(read(&dir, "a.txt"), "x\n");
    }
}
