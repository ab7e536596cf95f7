//! Run manifests
//!
//! Pretty-printed JSON records of a run, written into the obj directory:
//! `sources.json` with the resolved source map and `results.json` with
//! every compilation and generation result.

use crate::error::IconcError;
use crate::types::{CompilationResult, GenerationResult, IconSourceMap};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// File name of the source manifest
pub const SOURCES_FILE: &str = "sources.json";

/// File name of the results manifest
pub const RESULTS_FILE: &str = "results.json";

/// Contents of `results.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResults {
    /// One entry per compiled source
    pub compiled: Vec<CompilationResult>,
    /// One entry per generated asset
    pub generated: Vec<GenerationResult>,
}

/// Write `{obj}/sources.json`
///
/// # Errors
/// `IconcError::Manifest` / `IconcError::Io` if serialising or writing fails
pub async fn write_sources(obj: &Path, sources: &IconSourceMap) -> Result<PathBuf, IconcError> {
    write_json(&obj.join(SOURCES_FILE), sources).await
}

/// Write `{obj}/results.json`
///
/// # Errors
/// `IconcError::Manifest` / `IconcError::Io` if serialising or writing fails
pub async fn write_results(obj: &Path, results: &RunResults) -> Result<PathBuf, IconcError> {
    write_json(&obj.join(RESULTS_FILE), results).await
}

async fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<PathBuf, IconcError> {
    let json = serde_json::to_string_pretty(value).map_err(|source| IconcError::Manifest {
        path: path.to_path_buf(),
        source,
    })?;

    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| IconcError::io(parent, e))?;
    }
    tokio::fs::write(path, json)
        .await
        .map_err(|e| IconcError::io(path, e))?;

    tracing::debug!("wrote manifest '{}'", path.display());
    Ok(path.to_path_buf())
}
