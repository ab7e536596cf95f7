//! Testing utilities for the iconc workspace
//!
//! Temporary icon trees, fixture bytes and scripted collaborators.

#![allow(missing_docs)]

use async_trait::async_trait;
use iconc_core::error::CollaboratorError;
use iconc_core::optimize::{OptimizeOptions, Optimized, Optimizer, SvgMinifier};
use iconc_core::vectorize::{VectorizeOptions, Vectorizer};
use iconc_core::{CompilationResult, IconSource, ProgressSink, Stage};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;

/// A valid 1x1 transparent PNG
pub const PNG_1X1: &[u8] = &[
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44, 0x52, 0x00, 0x00, 0x00,
    0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1F, 0x15, 0xC4, 0x89, 0x00, 0x00, 0x00, 0x0A, 0x49,
    0x44, 0x41, 0x54, 0x78, 0x9C, 0x63, 0x00, 0x01, 0x00, 0x00, 0x05, 0x00, 0x01, 0x0D, 0x0A, 0x2D, 0xB4, 0x00, 0x00,
    0x00, 0x00, 0x49, 0x45, 0x4E, 0x44, 0xAE, 0x42, 0x60, 0x82,
];

/// A small unoptimized SVG document
pub const SVG_ICON: &str = r##"<?xml version="1.0" encoding="UTF-8"?>
<!-- fixture -->
<svg xmlns="http://www.w3.org/2000/svg" width="16" height="16">
    <path d="M 1.0001 2.5 L 14.999 8 Z" fill="#333"/>
</svg>
"##;

/// Temporary `{category}/{size}/{name}.{ext}` tree
pub struct IconTree {
    dir: TempDir,
}

impl IconTree {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
        }
    }

    /// Temp directory holding the tree, `src/` and anything else a test needs
    pub fn base(&self) -> &Path {
        self.dir.path()
    }

    /// Source root
    pub fn root(&self) -> PathBuf {
        self.dir.path().join("src")
    }

    /// Output root, created empty
    pub fn dist(&self) -> PathBuf {
        let dist = self.dir.path().join("dist");
        std::fs::create_dir_all(&dist).unwrap();
        dist
    }

    /// Write arbitrary bytes under the source root
    pub fn file(&self, relative: impl AsRef<Path>, contents: &[u8]) -> PathBuf {
        let path = self.root().join(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, contents).unwrap();
        path
    }

    /// Raster source at `{category}/{size}/{name}.png`
    pub fn png(&self, category: &str, name: &str, size: &str) -> PathBuf {
        self.file(format!("{category}/{size}/{name}.png"), PNG_1X1)
    }

    /// Vector source at `{category}/scalable/{name}.svg`
    pub fn svg(&self, category: &str, name: &str) -> PathBuf {
        self.file(format!("{category}/scalable/{name}.svg"), SVG_ICON.as_bytes())
    }

    /// Symbolic link at `relative` pointing to `target`
    #[cfg(unix)]
    pub fn symlink(&self, relative: impl AsRef<Path>, target: impl AsRef<Path>) -> PathBuf {
        let link = self.root().join(relative);
        std::fs::create_dir_all(link.parent().unwrap()).unwrap();
        std::os::unix::fs::symlink(target, &link).unwrap();
        link
    }
}

impl Default for IconTree {
    fn default() -> Self {
        Self::new()
    }
}

/// Make every category directory under `dist` for `sources`
pub fn create_output_dirs(dist: &Path, sources: &[IconSource]) {
    for source in sources {
        std::fs::create_dir_all(dist.join(&source.category)).unwrap();
    }
}

/// Vectorizer that panics on every call
#[derive(Debug, Clone, Copy, Default)]
pub struct PanickingVectorizer;

#[async_trait]
impl Vectorizer for PanickingVectorizer {
    async fn vectorize(&self, _raw: &[u8], _options: &VectorizeOptions) -> Result<String, CollaboratorError> {
        panic!("vectorizer exploded");
    }
}

/// Vectorizer that never finishes within any reasonable budget
#[derive(Debug, Clone, Copy, Default)]
pub struct StallingVectorizer;

#[async_trait]
impl Vectorizer for StallingVectorizer {
    async fn vectorize(&self, _raw: &[u8], _options: &VectorizeOptions) -> Result<String, CollaboratorError> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Err(CollaboratorError::Malformed("stalled".to_string()))
    }
}

/// [`SvgMinifier`] that sleeps before optimizing
#[derive(Debug, Clone, Copy)]
pub struct SlowOptimizer {
    pub delay: Duration,
}

#[async_trait]
impl Optimizer for SlowOptimizer {
    async fn optimize(&self, svg: &str, options: &OptimizeOptions) -> Result<Optimized, CollaboratorError> {
        tokio::time::sleep(self.delay).await;
        SvgMinifier.optimize(svg, options).await
    }
}

/// Records every stage a sink sees and how many tasks ran at once
#[derive(Debug, Default)]
pub struct RecordingSink {
    state: Mutex<RecordingState>,
}

#[derive(Debug, Default)]
struct RecordingState {
    events: Vec<(String, Stage)>,
    active: usize,
    peak: usize,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// `(category/name, stage)` in posting order
    pub fn events(&self) -> Vec<(String, Stage)> {
        self.state.lock().events.clone()
    }

    /// Stages seen for one icon
    pub fn stages_of(&self, key: &str) -> Vec<Stage> {
        self.state
            .lock()
            .events
            .iter()
            .filter(|(k, _)| k == key)
            .map(|(_, stage)| *stage)
            .collect()
    }

    /// Highest number of tasks between `started` and `completed`
    pub fn peak_active(&self) -> usize {
        self.state.lock().peak
    }
}

impl ProgressSink for RecordingSink {
    fn post(&self, source: &IconSource, stage: Stage, _result: Option<&CompilationResult>) {
        let mut state = self.state.lock();
        match stage {
            Stage::Started => {
                state.active += 1;
                state.peak = state.peak.max(state.active);
            }
            Stage::Completed => state.active = state.active.saturating_sub(1),
            _ => {}
        }
        state.events.push((source.key(), stage));
    }
}
