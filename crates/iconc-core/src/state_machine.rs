//! Compilation stage chain
//!
//! `started -> reading -> (vectorizing) -> optimizing -> writing -> completed`
//!
//! Every non-terminal stage may also jump straight to `completed` when the
//! task fails. Nothing moves backwards.

use crate::error::StageError;
use crate::progress::ProgressSink;
use crate::types::{CompilationResult, IconSource, Stage};

/// Validates a stage transition.
///
/// Illegal transitions panic with the `strict-debug` feature enabled.
pub fn validate_transition(from: Stage, to: Stage) -> Result<(), StageError> {
    if allowed_transitions(from).contains(&to) {
        Ok(())
    } else {
        #[cfg(feature = "strict-debug")]
        panic!("Illegal stage transition attempted: {from} -> {to}");

        Err(StageError::IllegalTransition { from, to })
    }
}

/// Stages reachable from `from`
pub fn allowed_transitions(from: Stage) -> &'static [Stage] {
    match from {
        Stage::Started => &[Stage::Reading, Stage::Completed],
        Stage::Reading => &[Stage::Vectorizing, Stage::Optimizing, Stage::Completed],
        Stage::Vectorizing => &[Stage::Optimizing, Stage::Completed],
        Stage::Optimizing => &[Stage::Writing, Stage::Completed],
        Stage::Writing => &[Stage::Completed],
        Stage::Completed => &[],
    }
}

/// Tracks the current stage of one task and reports every entry
pub(crate) struct StageTracker<'a> {
    source: &'a IconSource,
    stage: Stage,
    sink: &'a dyn ProgressSink,
}

impl<'a> StageTracker<'a> {
    /// Start tracking; reports `started`
    pub(crate) fn start(source: &'a IconSource, sink: &'a dyn ProgressSink) -> Self {
        sink.post(source, Stage::Started, None);
        Self {
            source,
            stage: Stage::Started,
            sink,
        }
    }

    /// Enter the next stage
    pub(crate) fn enter(&mut self, stage: Stage) {
        if let Err(error) = validate_transition(self.stage, stage) {
            tracing::error!(path = %self.source.path.display(), "{error}");
            debug_assert!(false, "{error}");
        }

        self.stage = stage;
        self.sink.post(self.source, stage, None);
    }

    /// Last stage entered
    #[inline]
    pub(crate) fn current(&self) -> Stage {
        self.stage
    }

    /// Enter `completed` carrying the final result
    pub(crate) fn complete(mut self, result: &CompilationResult) {
        if let Err(error) = validate_transition(self.stage, Stage::Completed) {
            tracing::error!(path = %self.source.path.display(), "{error}");
        }

        self.stage = Stage::Completed;
        self.sink.post(self.source, Stage::Completed, Some(result));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [Stage; 6] = [
        Stage::Started,
        Stage::Reading,
        Stage::Vectorizing,
        Stage::Optimizing,
        Stage::Writing,
        Stage::Completed,
    ];

    #[test]
    fn raster_and_vector_paths_are_allowed() {
        assert!(validate_transition(Stage::Started, Stage::Reading).is_ok());
        assert!(validate_transition(Stage::Reading, Stage::Vectorizing).is_ok());
        assert!(validate_transition(Stage::Reading, Stage::Optimizing).is_ok());
        assert!(validate_transition(Stage::Vectorizing, Stage::Optimizing).is_ok());
        assert!(validate_transition(Stage::Optimizing, Stage::Writing).is_ok());
        assert!(validate_transition(Stage::Writing, Stage::Completed).is_ok());
    }

    #[test]
    fn failure_may_complete_from_any_live_stage() {
        for from in &ALL[..5] {
            assert!(validate_transition(*from, Stage::Completed).is_ok());
        }
    }

    #[test]
    fn no_backward_or_skipping_transitions() {
        for from in ALL {
            for to in ALL {
                if to <= from {
                    assert!(validate_transition(from, to).is_err(), "{from} -> {to}");
                }
            }
        }

        assert!(validate_transition(Stage::Started, Stage::Optimizing).is_err());
        assert!(validate_transition(Stage::Reading, Stage::Writing).is_err());
    }

    #[test]
    fn completed_is_terminal() {
        assert!(allowed_transitions(Stage::Completed).is_empty());
    }
}
