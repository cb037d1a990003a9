//! # anvil-agent
//!
//! Orchestration layer: everything a code request passes through on its
//! way to the completion provider and back.
//!
//! - [`RequestPipeline`]: cache → token budget → rate limit → provider
//! - [`AgentWorkflow`]: agent-mode request → parsed edits → applied files
//! - [`PromptBuilder`]: prompt rendering with secret redaction
//!
//! ```ignore
//! use anvil_agent::{CodeRequest, RequestPipeline};
//!
//! let pipeline = RequestPipeline::from_config(&config, provider);
//! let reply = pipeline
//!     .send(&CodeRequest::new(code, "rust", "explain"), &cancel)
//!     .await?;
//! ```

pub mod pipeline;
pub mod prompt;
pub mod workflow;

pub use pipeline::{CodeRequest, PipelineError, PipelineResponse, RequestPipeline};
pub use prompt::{PromptBuilder, AGENT_MODE_PREAMBLE};
pub use workflow::{AgentWorkflow, WorkflowEvent, WorkflowOutcome};
