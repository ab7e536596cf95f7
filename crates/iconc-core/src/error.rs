//! Error types for iconc core
//!
//! Two families live here:
//! - structural errors (`IconcError` and its parts) that terminate a run
//! - the serialisable [`CompilationError`] record that a failed task carries
//!   inside its result instead of propagating

use serde::{Deserialize, Serialize};
use std::error::Error as StdError;
use std::io;
use std::path::{Path, PathBuf};

/// Main iconc error type
#[derive(Debug, thiserror::Error)]
pub enum IconcError {
    /// Configuration could not be loaded or is invalid
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Source discovery failed structurally
    #[error("source resolution failed: {0}")]
    Resolve(#[from] ResolveError),

    /// Concurrency gate invariant broken
    #[error("concurrency gate error: {0}")]
    Gate(#[from] GateError),

    /// Filesystem failure outside of a single task
    #[error("i/o error at '{path}': {source}")]
    Io {
        /// Path being accessed
        path: PathBuf,
        /// Underlying error
        #[source]
        source: io::Error,
    },

    /// Manifest serialisation failed
    #[error("failed to serialise '{path}': {source}")]
    Manifest {
        /// Manifest file
        path: PathBuf,
        /// Underlying error
        #[source]
        source: serde_json::Error,
    },
}

impl IconcError {
    /// Build an I/O error bound to a path
    #[inline]
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Fatal errors indicate a broken invariant rather than bad input
    #[inline]
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Gate(_))
    }
}

/// Concurrency gate errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GateError {
    /// A gate must admit at least one holder
    #[error("invalid concurrency limit: {0}")]
    InvalidLimit(usize),

    /// The slot handoff channel closed before a slot arrived
    #[error("gate closed while waiting for a slot")]
    Closed,
}

/// Stage machine errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum StageError {
    /// Transition not allowed by the stage chain
    #[error("illegal stage transition: {from} -> {to}")]
    IllegalTransition {
        /// Current stage
        from: crate::types::Stage,
        /// Requested stage
        to: crate::types::Stage,
    },
}

/// Source resolution errors
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    /// Root directory does not exist or is not a directory
    #[error("source root not found: {0}")]
    RootNotFound(PathBuf),

    /// Directory walk failed
    #[error("failed to walk '{path}': {source}")]
    Walk {
        /// Entry being visited
        path: PathBuf,
        /// Underlying error
        #[source]
        source: io::Error,
    },
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("failed to read '{path}': {source}")]
    Read {
        /// Config file
        path: PathBuf,
        /// Underlying error
        #[source]
        source: io::Error,
    },

    /// Config file is not valid TOML for the schema
    #[error("failed to parse '{path}': {source}")]
    Parse {
        /// Config file
        path: PathBuf,
        /// Underlying error
        #[source]
        source: toml::de::Error,
    },

    /// A field holds an unusable value
    #[error("invalid value for '{field}': {reason}")]
    Invalid {
        /// Field name
        field: &'static str,
        /// What is wrong with it
        reason: String,
    },

    /// Exclude pattern is not a valid regex
    #[error("invalid exclude pattern '{pattern}': {source}")]
    Pattern {
        /// Offending pattern
        pattern: String,
        /// Underlying error
        #[source]
        source: regex::Error,
    },
}

/// Failure raised by a vectorize/optimize collaborator
#[derive(Debug, thiserror::Error)]
pub enum CollaboratorError {
    /// Input could not be interpreted
    #[error("malformed input: {0}")]
    Malformed(String),

    /// External program failed
    #[error("'{program}' failed: {reason}")]
    Command {
        /// Program that was run
        program: String,
        /// Exit status or stderr excerpt
        reason: String,
    },

    /// I/O while talking to a collaborator
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Failure category of a compilation task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Source disappeared between resolution and compilation
    SourceMissing,
    /// Reading the source failed for another reason
    Io,
    /// Vectorization collaborator rejected the input
    Vectorize,
    /// Optimization collaborator rejected the input
    Optimize,
    /// Output could not be written
    Write,
    /// Task exceeded its time budget
    Timeout,
    /// Isolated worker crashed or vanished
    Worker,
}

/// Structured failure info stored in a failed compilation result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompilationError {
    /// Failure category
    pub kind: ErrorKind,
    /// Machine-readable code (I/O error kind when available)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// Human-readable message
    pub message: String,
    /// Path the failure originated from
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    /// Error source chain, outermost first
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace: Option<String>,
}

impl CompilationError {
    /// Create error with kind and message
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            code: None,
            message: message.into(),
            path: None,
            trace: None,
        }
    }

    /// With originating path
    #[must_use]
    pub fn with_path(mut self, path: impl AsRef<Path>) -> Self {
        self.path = Some(path.as_ref().to_path_buf());
        self
    }

    /// With code
    #[must_use]
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// Build from an I/O failure, keeping its kind as the code
    #[must_use]
    pub fn from_io(kind: ErrorKind, path: &Path, error: &io::Error) -> Self {
        Self::new(kind, error.to_string())
            .with_path(path)
            .with_code(format!("{:?}", error.kind()))
            .with_trace(error)
    }

    /// Build from any error, recording its source chain
    #[must_use]
    pub fn from_error(kind: ErrorKind, path: &Path, error: &(dyn StdError + 'static)) -> Self {
        Self::new(kind, error.to_string())
            .with_path(path)
            .with_trace(error)
    }

    fn with_trace(mut self, error: &(dyn StdError + 'static)) -> Self {
        let mut chain = vec![error.to_string()];
        let mut current = error.source();
        while let Some(cause) = current {
            chain.push(cause.to_string());
            current = cause.source();
        }

        self.trace = Some(chain.join("\n  caused by: "));
        self
    }
}

impl std::fmt::Display for CompilationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)?;
        if let Some(path) = &self.path {
            write!(f, " ({})", path.display())?;
        }
        Ok(())
    }
}
