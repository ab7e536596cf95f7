//! Compilation task
//!
//! One source in, one optimized SVG out. The task walks the stage chain in
//! [`crate::state_machine`] and never returns an error: every failure is
//! folded into the [`CompilationResult`] together with the stage it
//! happened in.

use crate::error::{CompilationError, ErrorKind};
use crate::optimize::{OptimizeOptions, Optimizer};
use crate::progress::ProgressSink;
use crate::state_machine::StageTracker;
use crate::types::{CompilationResult, IconSource, SourceFormat, Stage};
use crate::vectorize::{VectorizeOptions, Vectorizer};
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Immutable description of one conversion
#[derive(Debug, Clone, PartialEq)]
pub struct TaskSpec {
    /// Source to convert
    pub source: IconSource,
    /// Root of the output tree
    pub output_root: PathBuf,
    /// Passed to the vectorizer
    pub vectorize: VectorizeOptions,
    /// Passed to the optimizer
    pub optimize: OptimizeOptions,
}

impl TaskSpec {
    /// Where the output of this task lands
    #[must_use]
    pub fn output_path(&self) -> PathBuf {
        self.source.output_path(&self.output_root)
    }
}

/// The external transforms a task delegates to
#[derive(Clone)]
pub struct Collaborators {
    /// Raster to vector
    pub vectorizer: Arc<dyn Vectorizer>,
    /// Vector to optimized vector
    pub optimizer: Arc<dyn Optimizer>,
}

impl Collaborators {
    /// Bundle a vectorizer and an optimizer
    pub fn new(vectorizer: impl Vectorizer + 'static, optimizer: impl Optimizer + 'static) -> Self {
        Self {
            vectorizer: Arc::new(vectorizer),
            optimizer: Arc::new(optimizer),
        }
    }
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators").finish_non_exhaustive()
    }
}

/// Shared flag telling an abandoned task to stop before its next stage
#[derive(Debug, Clone, Default)]
pub struct Cancellation(Arc<AtomicBool>);

impl Cancellation {
    /// A flag that is not set
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the task to stop
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Whether [`Cancellation::cancel`] was called
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    fn check(&self, spec: &TaskSpec, next: Stage) -> Result<(), CompilationError> {
        if self.is_cancelled() {
            return Err(
                CompilationError::new(ErrorKind::Timeout, format!("task was abandoned before {next}"))
                    .with_path(&spec.source.path),
            );
        }
        Ok(())
    }
}

/// Run a task to completion, reporting every stage to `sink`
///
/// Once `cancel` is set the task stops before optimizing or writing, so an
/// abandoned task never produces output.
pub async fn run(
    spec: &TaskSpec,
    collaborators: &Collaborators,
    sink: &dyn ProgressSink,
    cancel: &Cancellation,
) -> CompilationResult {
    let start = Instant::now();
    let mut tracker = StageTracker::start(&spec.source, sink);

    let result = match execute(spec, collaborators, &mut tracker, cancel).await {
        Ok(path) => CompilationResult::compiled(spec.source.clone(), start.elapsed(), path),
        Err(error) => CompilationResult::failed(spec.source.clone(), start.elapsed(), tracker.current(), error),
    };

    tracker.complete(&result);
    result
}

async fn execute(
    spec: &TaskSpec,
    collaborators: &Collaborators,
    tracker: &mut StageTracker<'_>,
    cancel: &Cancellation,
) -> Result<PathBuf, CompilationError> {
    let document = read_as_vector(spec, collaborators, tracker).await?;

    cancel.check(spec, Stage::Optimizing)?;
    tracker.enter(Stage::Optimizing);
    let optimized = collaborators
        .optimizer
        .optimize(&document, &spec.optimize)
        .await
        .map_err(|e| CompilationError::from_error(ErrorKind::Optimize, &spec.source.path, &e))?;

    tracing::trace!(
        original = optimized.original_size,
        optimized = optimized.optimized_size,
        "optimized '{}'",
        spec.source.key()
    );

    let output = spec.output_path();
    cancel.check(spec, Stage::Writing)?;
    tracker.enter(Stage::Writing);
    tokio::fs::write(&output, optimized.data.as_bytes())
        .await
        .map_err(|e| CompilationError::from_io(ErrorKind::Write, &output, &e))?;

    Ok(output)
}

/// Load the source, tracing rasters into a vector document
async fn read_as_vector(
    spec: &TaskSpec,
    collaborators: &Collaborators,
    tracker: &mut StageTracker<'_>,
) -> Result<String, CompilationError> {
    let path = &spec.source.path;

    tracker.enter(Stage::Reading);
    let raw = match tokio::fs::read(path).await {
        Ok(raw) => raw,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            let mut error = CompilationError::from_io(ErrorKind::SourceMissing, path, &e);
            error.message = format!(
                "failed to compile '{}' to '{}': this source file may not exist",
                path.display(),
                spec.output_path().display()
            );
            return Err(error);
        }
        Err(e) => return Err(CompilationError::from_io(ErrorKind::Io, path, &e)),
    };

    match spec.source.format() {
        SourceFormat::Svg => String::from_utf8(raw).map_err(|e| CompilationError::from_error(ErrorKind::Io, path, &e)),
        SourceFormat::Png => {
            tracker.enter(Stage::Vectorizing);
            collaborators
                .vectorizer
                .vectorize(&raw, &spec.vectorize)
                .await
                .map_err(|e| CompilationError::from_error(ErrorKind::Vectorize, path, &e))
        }
    }
}
