//! Compilation orchestrator
//!
//! Fans a batch of sources out through a [`ConcurrencyGate`] into
//! compilation tasks:
//! - slots are requested in input order, so tasks start in input order
//! - results are reported as they finish, not as they were submitted
//! - a failed task is just a failed result; it never cancels its siblings
//!
//! Only a broken gate aborts the batch.

use crate::backend::ExecutionBackend;
use crate::error::{GateError, IconcError};
use crate::gate::ConcurrencyGate;
use crate::optimize::OptimizeOptions;
use crate::progress::{ProgressSink, TracingProgress};
use crate::task::{Collaborators, TaskSpec};
use crate::types::{CompilationResult, IconSource};
use crate::vectorize::VectorizeOptions;
use futures::stream::{FuturesUnordered, StreamExt};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::Instrument;

/// Orchestrator settings
#[derive(Debug, Clone, PartialEq)]
pub struct CompilerSettings {
    /// Maximum tasks in flight
    pub concurrency: usize,
    /// Where tasks execute
    pub backend: ExecutionBackend,
    /// Per-task time budget; `None` waits forever
    pub task_timeout: Option<Duration>,
    /// Root of the output tree
    pub output_root: PathBuf,
    /// Passed through to the vectorizer
    pub vectorize: VectorizeOptions,
    /// Passed through to the optimizer
    pub optimize: OptimizeOptions,
    /// Per-source replacements for `vectorize` and `optimize`; the last match wins
    pub overrides: Vec<OptionsOverride>,
}

/// Collaborator options for the sources of one category and/or size bucket
#[derive(Debug, Clone, PartialEq)]
pub struct OptionsOverride {
    /// Only sources in this category; `None` matches any
    pub category: Option<String>,
    /// Only sources in this size bucket; `None` matches any
    pub size: Option<String>,
    /// Vectorizer options for matching sources
    pub vectorize: VectorizeOptions,
    /// Optimizer options for matching sources
    pub optimize: OptimizeOptions,
}

impl OptionsOverride {
    /// Whether this override applies to `source`
    #[must_use]
    pub fn matches(&self, source: &IconSource) -> bool {
        self.category.as_ref().map_or(true, |category| *category == source.category)
            && self.size.as_ref().map_or(true, |size| size == source.size.as_str())
    }
}

impl CompilerSettings {
    /// Defaults writing to `output_root`
    #[must_use]
    pub fn new(output_root: impl Into<PathBuf>) -> Self {
        Self {
            concurrency: default_concurrency(),
            backend: ExecutionBackend::default(),
            task_timeout: Some(Duration::from_secs(300)),
            output_root: output_root.into(),
            vectorize: VectorizeOptions::default(),
            optimize: OptimizeOptions::default(),
            overrides: Vec::new(),
        }
    }

    /// With concurrency limit
    #[inline]
    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// With execution backend
    #[inline]
    #[must_use]
    pub fn with_backend(mut self, backend: ExecutionBackend) -> Self {
        self.backend = backend;
        self
    }

    /// With per-task timeout
    #[inline]
    #[must_use]
    pub fn with_task_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.task_timeout = timeout;
        self
    }

    /// With per-source option overrides
    #[must_use]
    pub fn with_overrides(mut self, overrides: Vec<OptionsOverride>) -> Self {
        self.overrides = overrides;
        self
    }

    /// Vectorizer and optimizer options for `source`
    #[must_use]
    pub fn options_for(&self, source: &IconSource) -> (&VectorizeOptions, &OptimizeOptions) {
        self.overrides
            .iter()
            .rev()
            .find(|rule| rule.matches(source))
            .map_or((&self.vectorize, &self.optimize), |rule| (&rule.vectorize, &rule.optimize))
    }
}

/// Number of CPUs, or 1 if unknown
#[must_use]
pub fn default_concurrency() -> usize {
    std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get)
}

/// Batch compiler
pub struct Compiler {
    settings: CompilerSettings,
    collaborators: Collaborators,
    sink: Arc<dyn ProgressSink>,
}

impl Compiler {
    /// Create compiler logging progress through `tracing`
    #[must_use]
    pub fn new(settings: CompilerSettings, collaborators: Collaborators) -> Self {
        Self {
            settings,
            collaborators,
            sink: Arc::new(TracingProgress),
        }
    }

    /// With a custom progress sink
    #[must_use]
    pub fn with_progress(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Settings in use
    #[inline]
    #[must_use]
    pub fn settings(&self) -> &CompilerSettings {
        &self.settings
    }

    /// Compile every source, one result per source
    ///
    /// `on_result` sees each result as soon as its task finishes and its
    /// slot has been released.
    ///
    /// # Errors
    /// - `IconcError::Gate` if the concurrency limit is invalid or the gate
    ///   breaks; individual task failures are never returned here
    pub async fn compile<F>(&self, sources: Vec<IconSource>, mut on_result: F) -> Result<Vec<CompilationResult>, IconcError>
    where
        F: FnMut(&CompilationResult),
    {
        let gate = ConcurrencyGate::new(self.settings.concurrency)?;
        let start = Instant::now();
        let total = sources.len();

        tracing::info!(
            sources = total,
            concurrency = gate.limit(),
            backend = ?self.settings.backend,
            "starting compile"
        );

        let mut in_flight: FuturesUnordered<_> = sources
            .into_iter()
            .map(|source| self.compile_one(&gate, source))
            .collect();

        let mut results = Vec::with_capacity(total);
        while let Some(result) = in_flight.next().await {
            let result = result?;
            on_result(&result);
            results.push(result);
        }

        let failures = results.iter().filter(|result| !result.is_success()).count();
        tracing::info!(
            results = results.len(),
            failures,
            elapsed_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
            "compile completed"
        );

        Ok(results)
    }

    async fn compile_one(&self, gate: &ConcurrencyGate, source: IconSource) -> Result<CompilationResult, GateError> {
        let span = tracing::debug_span!("compile", path = %source.path.display());
        let permit = gate.acquire().instrument(span.clone()).await?;

        let (vectorize, optimize) = self.settings.options_for(&source);
        let spec = TaskSpec {
            vectorize: vectorize.clone(),
            optimize: optimize.clone(),
            source,
            output_root: self.settings.output_root.clone(),
        };

        let result = self
            .settings
            .backend
            .execute(spec, self.collaborators.clone(), Arc::clone(&self.sink), self.settings.task_timeout)
            .instrument(span)
            .await;

        drop(permit);
        Ok(result)
    }
}

impl std::fmt::Debug for Compiler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Compiler")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}
