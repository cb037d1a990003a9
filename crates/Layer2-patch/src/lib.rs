//! # anvil-patch
//!
//! Agent-mode edit pipeline: markdown reply → [`ChangeInstruction`]s →
//! path-checked file mutations.
//!
//! ```ignore
//! use anvil_patch::{parse, PatchApplier};
//!
//! let instructions = parse(&reply);
//! let applier = PatchApplier::new(".")?.with_protected_paths([".git/**"])?;
//! let report = applier.apply_all(&instructions);
//! println!("{}", report.summary());
//! ```

pub mod applier;
pub mod error;
pub mod guard;
pub mod instruction;
mod lines;
pub mod parser;
pub mod report;

pub use applier::{PatchApplier, Preview};
pub use error::PatchError;
pub use guard::{PathGuard, PathViolation, ResolvedPath};
pub use instruction::{Action, ChangeInstruction, UnknownAction};
pub use parser::{parse, parse_detailed, ParseIssue, ParseOutput, StreamingParser};
pub use report::{
    AppliedChange, ApplyEntry, ApplyOutcome, ApplyReport, ApplySummary, FailureReason,
    RollbackOutcome,
};
