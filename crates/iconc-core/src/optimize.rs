//! Optimization collaborator
//!
//! The optimizer contract: deterministic for the same input and options,
//! and idempotent, so optimizing already optimized output is a no-op.
//! [`SvgMinifier`] is the bundled implementation: a fixed list of
//! text-level passes selected by [`OptimizeOptions::passes`].

use crate::error::CollaboratorError;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// Vector document optimizer
#[async_trait::async_trait]
pub trait Optimizer: Send + Sync {
    /// Optimize SVG text
    ///
    /// # Errors
    /// Fails for documents the implementation cannot process.
    async fn optimize(&self, svg: &str, options: &OptimizeOptions) -> Result<Optimized, CollaboratorError>;
}

/// Optimized document plus size metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Optimized {
    /// Optimized SVG text
    pub data: String,
    /// Source map, when the optimizer produces one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub map: Option<String>,
    /// Input size in bytes
    pub original_size: usize,
    /// Output size in bytes
    pub optimized_size: usize,
}

/// Individual optimization pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OptimizePass {
    /// Drop `<!-- -->` comments
    StripComments,
    /// Drop XML declaration, doctype and `<metadata>` blocks
    StripMetadata,
    /// Collapse whitespace runs and remove whitespace between tags
    CollapseWhitespace,
    /// Round decimals to `float_precision`
    RoundNumbers,
    /// Replace root `width`/`height` with a `viewBox`
    RemoveDimensions,
}

/// Optimizer settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizeOptions {
    /// Decimal places kept by `round-numbers`
    pub float_precision: u8,
    /// Break tags onto separate lines
    pub pretty: bool,
    /// Passes, applied in declaration order
    pub passes: Vec<OptimizePass>,
}

impl Default for OptimizeOptions {
    fn default() -> Self {
        Self {
            float_precision: 2,
            pretty: false,
            passes: vec![
                OptimizePass::StripComments,
                OptimizePass::StripMetadata,
                OptimizePass::CollapseWhitespace,
                OptimizePass::RoundNumbers,
                OptimizePass::RemoveDimensions,
            ],
        }
    }
}

/// Text-level SVG minifier
#[derive(Debug, Clone, Copy, Default)]
pub struct SvgMinifier;

struct Patterns {
    comment: Regex,
    declaration: Regex,
    doctype: Regex,
    metadata: Regex,
    whitespace: Regex,
    between_tags: Regex,
    decimal: Regex,
    root: Regex,
    dimension: Regex,
    view_box: Regex,
}

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| Patterns {
        comment: Regex::new(r"(?s)<!--.*?-->").expect("valid regex"),
        declaration: Regex::new(r"(?s)<\?xml.*?\?>").expect("valid regex"),
        doctype: Regex::new(r"(?s)<!DOCTYPE[^>]*>").expect("valid regex"),
        metadata: Regex::new(r"(?s)<metadata[^>]*?(?:/>|>.*?</metadata>)").expect("valid regex"),
        whitespace: Regex::new(r"\s+").expect("valid regex"),
        between_tags: Regex::new(r">\s+<").expect("valid regex"),
        decimal: Regex::new(r"-?\d*\.\d+").expect("valid regex"),
        root: Regex::new(r"<svg\b[^>]*>").expect("valid regex"),
        dimension: Regex::new(r#"\s(width|height)\s*=\s*"([^"]*)""#).expect("valid regex"),
        view_box: Regex::new(r"\sviewBox\s*=").expect("valid regex"),
    })
}

impl SvgMinifier {
    fn apply(svg: &str, options: &OptimizeOptions) -> Result<String, CollaboratorError> {
        if !patterns().root.is_match(svg) {
            return Err(CollaboratorError::Malformed("document has no <svg> root".to_string()));
        }

        let mut data = svg.to_string();
        for pass in &options.passes {
            data = match pass {
                OptimizePass::StripComments => patterns().comment.replace_all(&data, "").into_owned(),
                OptimizePass::StripMetadata => strip_metadata(&data),
                OptimizePass::CollapseWhitespace => collapse_whitespace(&data),
                OptimizePass::RoundNumbers => round_numbers(&data, options.float_precision),
                OptimizePass::RemoveDimensions => remove_dimensions(&data),
            };
        }

        let data = data.trim().to_string();
        if options.pretty {
            Ok(patterns().between_tags.replace_all(&data, ">\n<").replace("><", ">\n<"))
        } else {
            Ok(data)
        }
    }
}

#[async_trait::async_trait]
impl Optimizer for SvgMinifier {
    async fn optimize(&self, svg: &str, options: &OptimizeOptions) -> Result<Optimized, CollaboratorError> {
        let data = Self::apply(svg, options)?;
        Ok(Optimized {
            original_size: svg.len(),
            optimized_size: data.len(),
            data,
            map: None,
        })
    }
}

fn strip_metadata(data: &str) -> String {
    let p = patterns();
    let data = p.declaration.replace_all(data, "");
    let data = p.doctype.replace_all(&data, "");
    p.metadata.replace_all(&data, "").into_owned()
}

fn collapse_whitespace(data: &str) -> String {
    let p = patterns();
    let data = p.whitespace.replace_all(data, " ");
    p.between_tags.replace_all(&data, "><").trim().to_string()
}

fn round_numbers(data: &str, precision: u8) -> String {
    patterns()
        .decimal
        .replace_all(data, |caps: &Captures<'_>| {
            let text = &caps[0];
            match text.parse::<f64>() {
                Ok(value) => format_number(value, precision),
                Err(_) => text.to_string(),
            }
        })
        .into_owned()
}

/// Shortest decimal text for `value` at `precision` places
fn format_number(value: f64, precision: u8) -> String {
    let mut text = format!("{value:.prec$}", prec = usize::from(precision));
    if text.contains('.') {
        text = text.trim_end_matches('0').trim_end_matches('.').to_string();
    }
    if text == "-0" {
        text = "0".to_string();
    }
    text
}

fn remove_dimensions(data: &str) -> String {
    let p = patterns();
    let Some(root) = p.root.find(data) else {
        return data.to_string();
    };

    let tag = root.as_str();
    let mut width = None;
    let mut height = None;
    for caps in p.dimension.captures_iter(tag) {
        match &caps[1] {
            "width" => width = Some(caps[2].to_string()),
            _ => height = Some(caps[2].to_string()),
        }
    }

    let has_view_box = p.view_box.is_match(tag);
    let view_box = match (&width, &height) {
        _ if has_view_box => None,
        (Some(w), Some(h)) => match (w.parse::<f64>(), h.parse::<f64>()) {
            (Ok(_), Ok(_)) => Some(format!(r#" viewBox="0 0 {w} {h}""#)),
            // Unit-suffixed dimensions cannot be turned into a viewBox
            _ => return data.to_string(),
        },
        _ => return data.to_string(),
    };

    let stripped = p.dimension.replace_all(tag, "");
    let rewritten = match view_box {
        Some(view_box) => {
            let insert_at = if stripped.ends_with("/>") { stripped.len() - 2 } else { stripped.len() - 1 };
            format!("{}{}{}", &stripped[..insert_at], view_box, &stripped[insert_at..])
        }
        None => stripped.into_owned(),
    };

    format!("{}{}{}", &data[..root.start()], rewritten, &data[root.end()..])
}
