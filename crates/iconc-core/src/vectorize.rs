//! Vectorization collaborator
//!
//! Turns raster bytes into an SVG document. The tracing algorithm itself is
//! external; this module defines the seam plus two implementations:
//! - [`EmbedVectorizer`] wraps the PNG in an SVG `<image>` element
//! - [`CommandVectorizer`] pipes the bytes through an external tracer

use crate::error::CollaboratorError;
use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Environment variable carrying serialised options to external tracers
pub const OPTIONS_ENV: &str = "ICONC_VECTORIZE_OPTIONS";

/// Raster to vector transform
#[async_trait::async_trait]
pub trait Vectorizer: Send + Sync {
    /// Convert raw raster bytes into SVG text
    ///
    /// # Errors
    /// Fails for input the implementation cannot interpret.
    async fn vectorize(&self, raw: &[u8], options: &VectorizeOptions) -> Result<String, CollaboratorError>;
}

/// Color handling of the tracer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorMode {
    /// Full color
    #[default]
    Color,
    /// Black and white
    Binary,
}

/// Layer clustering of the tracer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Hierarchical {
    /// Shapes stacked on top of each other
    #[default]
    Stacked,
    /// Shapes cut out of each other
    Cutout,
}

/// Curve fitting mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PathSimplifyMode {
    /// Pixel-exact paths
    #[default]
    None,
    /// Straight segments
    Polygon,
    /// Smooth splines
    Spline,
}

/// Tuning values passed through to the tracer unmodified
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorizeOptions {
    /// Color handling
    pub color_mode: ColorMode,
    /// Significant bits per color channel
    pub color_precision: u8,
    /// Minimum angle (degrees) treated as a corner
    pub corner_threshold: u32,
    /// Layer clustering
    pub hierarchical: Hierarchical,
    /// Discard patches smaller than this many pixels
    pub filter_speckle: u32,
    /// Color difference between gradient layers
    pub layer_difference: u32,
    /// Minimum segment length before subdivision
    pub length_threshold: f64,
    /// Curve fitting iteration cap
    pub max_iterations: u32,
    /// Curve fitting mode
    pub mode: PathSimplifyMode,
    /// Minimum angle (degrees) to splice a spline
    pub splice_threshold: u32,
    /// Decimal places in path data
    pub path_precision: u32,
}

impl Default for VectorizeOptions {
    fn default() -> Self {
        Self {
            color_mode: ColorMode::Color,
            color_precision: 8,
            corner_threshold: 0,
            hierarchical: Hierarchical::Stacked,
            filter_speckle: 0,
            layer_difference: 0,
            length_threshold: 0.0,
            max_iterations: 8,
            mode: PathSimplifyMode::None,
            splice_threshold: 0,
            path_precision: 2,
        }
    }
}

/// Embeds the raster as a data URI inside an SVG document
#[derive(Debug, Clone, Copy, Default)]
pub struct EmbedVectorizer;

const PNG_SIGNATURE: &[u8; 8] = b"\x89PNG\r\n\x1a\n";

impl EmbedVectorizer {
    /// Read width and height from the IHDR chunk
    fn dimensions(raw: &[u8]) -> Result<(u32, u32), CollaboratorError> {
        if raw.len() < 24 || &raw[..8] != PNG_SIGNATURE {
            return Err(CollaboratorError::Malformed("not a PNG image".to_string()));
        }
        if &raw[12..16] != b"IHDR" {
            return Err(CollaboratorError::Malformed("PNG is missing its IHDR chunk".to_string()));
        }

        let width = u32::from_be_bytes([raw[16], raw[17], raw[18], raw[19]]);
        let height = u32::from_be_bytes([raw[20], raw[21], raw[22], raw[23]]);
        if width == 0 || height == 0 {
            return Err(CollaboratorError::Malformed(format!("PNG has empty dimensions {width}x{height}")));
        }

        Ok((width, height))
    }
}

#[async_trait::async_trait]
impl Vectorizer for EmbedVectorizer {
    async fn vectorize(&self, raw: &[u8], _options: &VectorizeOptions) -> Result<String, CollaboratorError> {
        let (width, height) = Self::dimensions(raw)?;
        Ok(format!(
            r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 {width} {height}"><image width="{width}" height="{height}" href="data:image/png;base64,{}"/></svg>"#,
            STANDARD.encode(raw)
        ))
    }
}

/// Pipes raster bytes to an external program and reads SVG from its stdout
///
/// Options are exported as JSON in [`OPTIONS_ENV`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandVectorizer {
    program: String,
    args: Vec<String>,
}

impl CommandVectorizer {
    /// Create for `program` with fixed `args`
    #[must_use]
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }
}

#[async_trait::async_trait]
impl Vectorizer for CommandVectorizer {
    async fn vectorize(&self, raw: &[u8], options: &VectorizeOptions) -> Result<String, CollaboratorError> {
        let options = serde_json::to_string(options).map_err(|e| CollaboratorError::Command {
            program: self.program.clone(),
            reason: format!("failed to serialise options: {e}"),
        })?;

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .env(OPTIONS_ENV, options)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        // Feed stdin while stdout and stderr drain, or a chatty child blocks on a full pipe
        let stdin = child.stdin.take();
        let feed = async move {
            if let Some(mut stdin) = stdin {
                stdin.write_all(raw).await?;
                stdin.shutdown().await?;
            }
            Ok::<(), std::io::Error>(())
        };
        let (fed, output) = tokio::join!(feed, child.wait_with_output());

        let output = output?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(CollaboratorError::Command {
                program: self.program.clone(),
                reason: format!("{} ({})", output.status, stderr.trim()),
            });
        }

        fed?;

        String::from_utf8(output.stdout).map_err(|_| CollaboratorError::Command {
            program: self.program.clone(),
            reason: "output is not valid UTF-8".to_string(),
        })
    }
}
