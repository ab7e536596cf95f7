//! iconc core
//!
//! Compiles a tree of raster and vector icons into optimized SVGs:
//! 1. **Resolve**: walk `{category}/{size}/{name}.{png,svg}` and keep the
//!    best source per icon
//! 2. **Compile**: run every source through the stage chain under a FIFO
//!    concurrency limit, on worker threads or in-process
//! 3. **Generate**: emit a stylesheet and preview page for what compiled
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use iconc_core::prelude::*;
//!
//! let config = ToolConfig::discover(None)?;
//! let sources = SourceResolver::new(&config.src.path).resolve()?;
//!
//! let compiler = Compiler::new(config.compiler_settings()?, config.collaborators());
//! let results = compiler.compile(flatten_sources(&sources), |_| {}).await?;
//!
//! let generated = Generator::new(config.generator_settings())
//!     .generate(&results, |_| {})
//!     .await;
//! ```

#![warn(unreachable_pub)]

pub mod backend;
pub mod compiler;
pub mod config;
pub mod error;
pub mod gate;
pub mod generate;
pub mod manifest;
pub mod optimize;
pub mod progress;
pub mod sources;
pub mod state_machine;
pub mod task;
pub mod types;
pub mod vectorize;

// Re-exports
pub use backend::{ExecutionBackend, WorkerMessage};
pub use compiler::{Compiler, CompilerSettings, OptionsOverride};
pub use config::ToolConfig;
pub use error::{
    CollaboratorError, CompilationError, ConfigError, ErrorKind, GateError, IconcError, ResolveError, StageError,
};
pub use gate::{ConcurrencyGate, GatePermit};
pub use generate::{Generator, GeneratorSettings};
pub use optimize::{OptimizeOptions, Optimized, Optimizer, SvgMinifier};
pub use progress::{NoProgress, ProgressSink, TracingProgress};
pub use sources::{SourceIndex, SourceResolver};
pub use task::{Cancellation, Collaborators, TaskSpec};
pub use types::*;
pub use vectorize::{CommandVectorizer, EmbedVectorizer, VectorizeOptions, Vectorizer};

/// Common imports
pub mod prelude {
    pub use crate::{
        flatten_sources, Collaborators, CompilationResult, Compiler, CompilerSettings, ExecutionBackend, Generator,
        IconSource, IconcError, SourceResolver, Stage, ToolConfig,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
