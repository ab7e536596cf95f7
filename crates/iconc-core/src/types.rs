//! Shared domain types
//!
//! Icon sources, compilation stages and results. Everything here is
//! serialisable so results can be written to manifests and shipped across
//! the isolated worker boundary unchanged.

use crate::error::CompilationError;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Size bucket token reserved for vector sources
pub const SCALABLE: &str = "scalable";

/// Size bucket of a source, taken from its directory name
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SourceSize {
    /// Vector source
    Scalable,
    /// Raster bucket, e.g. `48` or `48x48`
    Raster(String),
}

impl SourceSize {
    /// Whether this bucket is `scalable`
    #[inline]
    #[must_use]
    pub fn is_scalable(&self) -> bool {
        matches!(self, Self::Scalable)
    }

    /// Pixel dimension encoded by the leading digits of the token
    ///
    /// `None` for scalable and for tokens without a leading number, so a
    /// non-numeric bucket always compares below any numeric one.
    #[must_use]
    pub fn pixels(&self) -> Option<u32> {
        match self {
            Self::Scalable => None,
            Self::Raster(token) => {
                let digits: String = token.chars().take_while(char::is_ascii_digit).collect();
                digits.parse().ok()
            }
        }
    }

    /// Token text
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Scalable => SCALABLE,
            Self::Raster(token) => token,
        }
    }
}

impl From<&str> for SourceSize {
    fn from(value: &str) -> Self {
        if value == SCALABLE {
            Self::Scalable
        } else {
            Self::Raster(value.to_string())
        }
    }
}

impl From<String> for SourceSize {
    fn from(value: String) -> Self {
        if value == SCALABLE {
            Self::Scalable
        } else {
            Self::Raster(value)
        }
    }
}

impl From<SourceSize> for String {
    fn from(value: SourceSize) -> Self {
        match value {
            SourceSize::Scalable => SCALABLE.to_string(),
            SourceSize::Raster(token) => token,
        }
    }
}

impl fmt::Display for SourceSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// File format of a source, by extension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceFormat {
    /// Already a vector document
    Svg,
    /// Raster image requiring vectorization
    Png,
}

impl SourceFormat {
    /// Classify a path by extension
    #[must_use]
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()? {
            "svg" => Some(Self::Svg),
            "png" => Some(Self::Png),
            _ => None,
        }
    }
}

/// A discovered input file representing one logical icon
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IconSource {
    /// Directory-derived grouping (`apps`, `status`, ...)
    pub category: String,
    /// Icon identifier within the category
    pub name: String,
    /// Real path of the file on disk
    pub path: PathBuf,
    /// Size bucket
    pub size: SourceSize,
}

impl IconSource {
    /// Create a source
    #[must_use]
    pub fn new(
        category: impl Into<String>,
        name: impl Into<String>,
        path: impl Into<PathBuf>,
        size: impl Into<SourceSize>,
    ) -> Self {
        Self {
            category: category.into(),
            name: name.into(),
            path: path.into(),
            size: size.into(),
        }
    }

    /// `category/name` key used for sorting and display
    #[must_use]
    pub fn key(&self) -> String {
        format!("{}/{}", self.category, self.name)
    }

    /// Format by extension; anything that is not `.svg` is traced as raster
    #[must_use]
    pub fn format(&self) -> SourceFormat {
        SourceFormat::from_path(&self.path).unwrap_or(SourceFormat::Png)
    }

    /// Output location under `output_root`
    #[must_use]
    pub fn output_path(&self, output_root: &Path) -> PathBuf {
        output_root
            .join(&self.category)
            .join(format!("{}.svg", self.name))
    }
}

/// Canonical sources grouped by category, then name
pub type IconSourceMap = BTreeMap<String, BTreeMap<String, IconSource>>;

/// Flatten a source map into a list in category/name order
#[must_use]
pub fn flatten_sources(map: &IconSourceMap) -> Vec<IconSource> {
    map.values()
        .flat_map(|category| category.values().cloned())
        .collect()
}

/// Named checkpoint of a compilation task
///
/// Ordered: a task only ever moves to a later stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Task began, start time captured
    Started,
    /// Source bytes being loaded
    Reading,
    /// Raster being traced into a vector document
    Vectorizing,
    /// Vector document being optimized
    Optimizing,
    /// Output being persisted
    Writing,
    /// Terminal
    Completed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Started => "started",
            Self::Reading => "reading",
            Self::Vectorizing => "vectorizing",
            Self::Optimizing => "optimizing",
            Self::Writing => "writing",
            Self::Completed => "completed",
        };
        f.write_str(name)
    }
}

/// Terminal state of a finished task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    /// Output written
    Compiled {
        /// Written file
        path: PathBuf,
    },
    /// Task failed
    Failed {
        /// Last stage entered before the failure
        failed_at: Stage,
        /// Failure details
        error: CompilationError,
    },
}

/// Outcome of converting one source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompilationResult {
    /// Source that was processed
    pub source: IconSource,
    /// Wall-clock time from start to completion or failure
    #[serde(with = "duration_ms")]
    pub duration: Duration,
    /// Written as `"stage": "completed"`; see [`CompilationResult::stage`]
    #[serde(rename = "stage", serialize_with = "serialize_completed", skip_deserializing)]
    completed: (),
    /// Success or failure
    #[serde(flatten)]
    pub outcome: Outcome,
}

fn serialize_completed<S: Serializer>(_: &(), serializer: S) -> Result<S::Ok, S::Error> {
    Stage::Completed.serialize(serializer)
}

impl CompilationResult {
    /// Successful result
    #[must_use]
    pub fn compiled(source: IconSource, duration: Duration, path: PathBuf) -> Self {
        Self {
            source,
            duration,
            completed: (),
            outcome: Outcome::Compiled { path },
        }
    }

    /// Failed result
    #[must_use]
    pub fn failed(
        source: IconSource,
        duration: Duration,
        failed_at: Stage,
        error: CompilationError,
    ) -> Self {
        Self {
            source,
            duration,
            completed: (),
            outcome: Outcome::Failed { failed_at, error },
        }
    }

    /// Stage of a finished result, always `Completed`
    #[inline]
    #[must_use]
    pub fn stage(&self) -> Stage {
        Stage::Completed
    }

    /// Output path on success
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match &self.outcome {
            Outcome::Compiled { path } => Some(path),
            Outcome::Failed { .. } => None,
        }
    }

    /// Failure details
    #[must_use]
    pub fn error(&self) -> Option<&CompilationError> {
        match &self.outcome {
            Outcome::Compiled { .. } => None,
            Outcome::Failed { error, .. } => Some(error),
        }
    }

    /// Stage last entered before a failure
    #[must_use]
    pub fn failed_at(&self) -> Option<Stage> {
        match &self.outcome {
            Outcome::Compiled { .. } => None,
            Outcome::Failed { failed_at, .. } => Some(*failed_at),
        }
    }

    /// Whether the task produced output
    #[inline]
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, Outcome::Compiled { .. })
    }
}

/// Outcome of generating one downstream asset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationResult {
    /// Time spent producing the file
    #[serde(with = "duration_ms")]
    pub duration: Duration,
    /// Target file
    pub path: PathBuf,
    /// Failure details, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<CompilationError>,
}

/// Serialises a `Duration` as fractional milliseconds
pub(crate) mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub(crate) fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64() * 1000.0)
    }

    pub(crate) fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let millis = f64::deserialize(deserializer)?;
        Ok(Duration::from_secs_f64(millis.max(0.0) / 1000.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn size_pixels_uses_leading_digits() {
        assert_eq!(SourceSize::from("48").pixels(), Some(48));
        assert_eq!(SourceSize::from("48x48").pixels(), Some(48));
        assert_eq!(SourceSize::from("symbolic").pixels(), None);
        assert_eq!(SourceSize::from(SCALABLE).pixels(), None);
        assert!(SourceSize::from(SCALABLE).is_scalable());
    }

    #[test]
    fn stages_are_ordered() {
        assert!(Stage::Started < Stage::Reading);
        assert!(Stage::Reading < Stage::Vectorizing);
        assert!(Stage::Writing < Stage::Completed);
    }

    #[test]
    fn output_path_uses_category_and_name() {
        let source = IconSource::new("apps", "foo", "/src/apps/48/foo.png", "48");
        assert_eq!(
            source.output_path(Path::new("/dist")),
            PathBuf::from("/dist/apps/foo.svg")
        );
    }

    #[test]
    fn finished_results_always_report_completed() {
        let source = IconSource::new("apps", "foo", "/src/apps/48/foo.png", "48");
        let ok = CompilationResult::compiled(source.clone(), Duration::ZERO, PathBuf::from("/dist/apps/foo.svg"));
        let failed = CompilationResult::failed(
            source,
            Duration::ZERO,
            Stage::Reading,
            CompilationError::new(ErrorKind::SourceMissing, "missing"),
        );

        assert_eq!(ok.stage(), Stage::Completed);
        assert_eq!(failed.stage(), Stage::Completed);
        assert!(ok.path().is_some() && ok.error().is_none());
        assert!(failed.path().is_none() && failed.error().is_some());
        assert_eq!(failed.failed_at(), Some(Stage::Reading));
    }

    #[test]
    fn result_serialises_flat() {
        let source = IconSource::new("apps", "foo", "/src/apps/scalable/foo.svg", SCALABLE);
        let result = CompilationResult::compiled(source, Duration::from_millis(5), PathBuf::from("/dist/apps/foo.svg"));

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["stage"], "completed");
        assert_eq!(json["status"], "compiled");
        assert_eq!(json["path"], "/dist/apps/foo.svg");
        assert_eq!(json["source"]["size"], "scalable");
        assert_eq!(json["duration"], 5.0);
    }
}
