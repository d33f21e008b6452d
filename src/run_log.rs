//! Per-run progress and failure context.
//!
//! One [`RunLog`] is created when a pipeline run starts and dropped when
//! it ends. Components report through it instead of a process-wide
//! logger, so every event carries the run's span fields.

use std::time::Instant;

use tracing::Span;

use crate::error::{ConversionError, PublishError};
use crate::model::Tool;

/// An isolated failure, surfaced to the caller after the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepFailure {
    /// Pipeline step, e.g. `convert`, `put-report`, `post-annotations`.
    pub step: &'static str,
    pub tool: Option<Tool>,
    /// Report file or server URL involved.
    pub path: Option<String>,
    pub message: String,
    /// HTTP status, when the remote answered.
    pub status: Option<u16>,
}

impl std::fmt::Display for StepFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.step)?;
        if let Some(tool) = self.tool {
            write!(f, " {tool}")?;
        }
        if let Some(path) = &self.path {
            write!(f, " ({path})")?;
        }
        if let Some(status) = self.status {
            write!(f, " HTTP {status}")?;
        }
        write!(f, ": {}", self.message)
    }
}

pub struct RunLog {
    span: Span,
    started: Instant,
    failures: Vec<StepFailure>,
}

impl RunLog {
    pub fn start(commit: &str, report_key: &str) -> Self {
        let span = tracing::info_span!("insights_run", commit, report_key);
        span.in_scope(|| tracing::info!("Run started"));
        Self {
            span,
            started: Instant::now(),
            failures: Vec::new(),
        }
    }

    pub fn step_started(&self, tool: Tool, source: &str) {
        self.span
            .in_scope(|| tracing::info!(tool = %tool, source, "Start {}", tool.label()));
    }

    pub fn step_finished(&self, tool: Tool, found: usize, kept: usize) {
        self.span.in_scope(|| {
            tracing::info!(tool = %tool, found, kept, "Finish {}", tool.label())
        });
    }

    pub fn conversion_failed(&mut self, error: &ConversionError) {
        self.record(StepFailure {
            step: "convert",
            tool: Some(error.tool),
            path: Some(error.source_path.clone()),
            message: error.cause.to_string(),
            status: match &error.cause {
                crate::error::ConversionCause::Status { status, .. } => Some(*status),
                crate::error::ConversionCause::Http(e) => e.status().map(|s| s.as_u16()),
                _ => None,
            },
        });
    }

    pub fn publish_failed(&mut self, step: &'static str, tool: Option<Tool>, error: &PublishError) {
        self.record(StepFailure {
            step,
            tool,
            path: None,
            message: error.to_string(),
            status: error.status(),
        });
    }

    pub fn record(&mut self, failure: StepFailure) {
        self.span.in_scope(|| {
            tracing::warn!(
                step = failure.step,
                tool = failure.tool.map(Tool::label),
                path = failure.path.as_deref(),
                status = failure.status,
                "{}",
                failure.message
            )
        });
        self.failures.push(failure);
    }

    /// End the run, handing back every recorded failure.
    pub fn finish(self) -> Vec<StepFailure> {
        let elapsed_ms = self.started.elapsed().as_millis() as u64;
        self.span.in_scope(|| {
            tracing::info!(
                elapsed_ms,
                failures = self.failures.len(),
                "Run finished"
            )
        });
        self.failures
    }
}
