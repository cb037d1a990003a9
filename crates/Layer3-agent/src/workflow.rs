//! Agent-mode workflow
//!
//! Sends an agent-mode request through the [`RequestPipeline`], parses the
//! reply into change instructions and hands them to the [`PatchApplier`].
//! Progress is reported as [`WorkflowEvent`]s on an optional channel; a slow
//! or closed receiver never blocks the workflow.

use anvil_foundation::redact;
use anvil_patch::{
    parse_detailed, ApplyReport, ChangeInstruction, ParseOutput, PatchApplier, StreamingParser,
};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::pipeline::{CodeRequest, PipelineError, PipelineResponse, RequestPipeline};

/// Progress notifications
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum WorkflowEvent {
    /// Request admitted and sent (or served from cache)
    Started { key: String },
    /// A complete instruction was recognized in the streaming reply
    InstructionReady { file_path: String },
    /// Reply finished; `instructions` were parsed from it
    Parsed {
        instructions: usize,
        issues: usize,
    },
    /// An instruction was applied or previewed
    Applied { file_path: String },
    /// An instruction was rejected
    Rejected { file_path: String, reason: String },
    Cancelled,
    Finished { applied: usize, failed: usize },
}

/// Everything one agent-mode run produced
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowOutcome {
    pub response: PipelineResponse,
    pub parse: ParseOutput,
    pub report: ApplyReport,
}

impl WorkflowOutcome {
    pub fn instructions(&self) -> &[ChangeInstruction] {
        &self.parse.instructions
    }
}

/// Request → parse → apply
pub struct AgentWorkflow {
    pipeline: RequestPipeline,
    applier: PatchApplier,
    dry_run: bool,
}

impl AgentWorkflow {
    pub fn new(pipeline: RequestPipeline, applier: PatchApplier) -> Self {
        Self {
            pipeline,
            applier,
            dry_run: false,
        }
    }

    /// Validate and compute contents without writing
    pub fn dry_run(mut self, enabled: bool) -> Self {
        self.dry_run = enabled;
        self
    }

    pub fn pipeline(&self) -> &RequestPipeline {
        &self.pipeline
    }

    pub fn applier(&self) -> &PatchApplier {
        &self.applier
    }

    /// Run one request in agent mode
    ///
    /// A cancelled reply is returned without applying anything, since a
    /// truncated reply may hold half an edit.
    pub async fn run(
        &self,
        request: CodeRequest,
        cancel: &CancellationToken,
        events: Option<mpsc::Sender<WorkflowEvent>>,
    ) -> Result<WorkflowOutcome, PipelineError> {
        let request = request.agent_mode(true);
        emit(
            &events,
            WorkflowEvent::Started {
                key: request.key(),
            },
        );

        let mut streaming = StreamingParser::new();
        let response = self
            .pipeline
            .send_observed(&request, cancel, |delta| {
                for instruction in streaming.push(delta) {
                    emit(
                        &events,
                        WorkflowEvent::InstructionReady {
                            file_path: instruction.file_path,
                        },
                    );
                }
            })
            .await?;

        if response.cancelled {
            warn!("reply cancelled; no changes applied");
            emit(&events, WorkflowEvent::Cancelled);
            return Ok(WorkflowOutcome {
                response,
                parse: ParseOutput::default(),
                report: ApplyReport::new(self.dry_run),
            });
        }

        // edits come from the reply as received, not the redacted copy
        let reply = response.raw_text.as_deref().unwrap_or(&response.text);
        let (parse, report) = self.apply_reply_with(reply, &events);
        Ok(WorkflowOutcome {
            response,
            parse,
            report,
        })
    }

    /// Parse and apply an already received reply
    pub fn apply_reply(&self, reply: &str) -> (ParseOutput, ApplyReport) {
        self.apply_reply_with(reply, &None)
    }

    fn apply_reply_with(
        &self,
        reply: &str,
        events: &Option<mpsc::Sender<WorkflowEvent>>,
    ) -> (ParseOutput, ApplyReport) {
        let parse = parse_detailed(reply);
        for issue in &parse.issues {
            warn!("reply issue: {}", redact(&issue.to_string()));
        }
        emit(
            events,
            WorkflowEvent::Parsed {
                instructions: parse.instructions.len(),
                issues: parse.issues.len(),
            },
        );

        let report = if self.dry_run {
            self.applier.preview_all(&parse.instructions)
        } else {
            self.applier.apply_all(&parse.instructions)
        };

        for entry in &report.entries {
            let event = match entry.failure() {
                None => WorkflowEvent::Applied {
                    file_path: entry.file_path.clone(),
                },
                Some(reason) => WorkflowEvent::Rejected {
                    file_path: entry.file_path.clone(),
                    reason: reason.to_string(),
                },
            };
            emit(events, event);
        }

        let summary = report.summary();
        info!("{}", summary);
        emit(
            events,
            WorkflowEvent::Finished {
                applied: summary.applied,
                failed: summary.failed,
            },
        );

        (parse, report)
    }
}

fn emit(events: &Option<mpsc::Sender<WorkflowEvent>>, event: WorkflowEvent) {
    if let Some(tx) = events {
        if tx.try_send(event).is_err() {
            tracing::debug!("workflow event dropped");
        }
    }
}
