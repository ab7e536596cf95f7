//! Progress observation
//!
//! Sinks see every stage a task enters. They are for logging and UI only;
//! nothing they do feeds back into scheduling.

use crate::types::{CompilationResult, IconSource, Stage};

/// Per-stage observer
pub trait ProgressSink: Send + Sync {
    /// Called once per stage entered; `result` is present for `completed`
    fn post(&self, source: &IconSource, stage: Stage, result: Option<&CompilationResult>);
}

impl<F> ProgressSink for F
where
    F: Fn(&IconSource, Stage, Option<&CompilationResult>) + Send + Sync,
{
    fn post(&self, source: &IconSource, stage: Stage, result: Option<&CompilationResult>) {
        self(source, stage, result);
    }
}

/// Logs stage entries through `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingProgress;

impl ProgressSink for TracingProgress {
    fn post(&self, source: &IconSource, stage: Stage, result: Option<&CompilationResult>) {
        match result {
            Some(result) => match result.error() {
                Some(error) => tracing::debug!(
                    path = %source.path.display(),
                    "entered stage '{stage}', failed: {error}"
                ),
                None => tracing::debug!(
                    path = %source.path.display(),
                    duration_ms = u64::try_from(result.duration.as_millis()).unwrap_or(u64::MAX),
                    "entered stage '{stage}'"
                ),
            },
            None => tracing::debug!(path = %source.path.display(), "entered stage '{stage}'"),
        }
    }
}

/// Discards everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn post(&self, _source: &IconSource, _stage: Stage, _result: Option<&CompilationResult>) {}
}
