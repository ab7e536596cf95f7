//! Downstream asset generation
//!
//! Runs after compilation over the successfully compiled icons and emits a
//! minified stylesheet plus an HTML preview page. A failed write becomes a
//! [`GenerationResult`] carrying the error; it does not stop the other
//! asset.

use crate::error::{CompilationError, ErrorKind};
use crate::types::{CompilationResult, GenerationResult, IconSource};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Pixel sizes rendered per icon on the preview page
pub const PREVIEW_SIZES: [u32; 5] = [96, 64, 48, 32, 24];

/// Size used when `--{prefix}-size` is unset
pub const DEFAULT_ICON_SIZE: &str = "24px";

/// Where and how assets are generated
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratorSettings {
    /// Output directory, also the root of the compiled icons
    pub dist: PathBuf,
    /// Stylesheet file stem
    pub name: String,
    /// Prefix of CSS variables and the data attribute
    pub variable_prefix: String,
}

/// Stylesheet and preview generator
#[derive(Debug, Clone)]
pub struct Generator {
    settings: GeneratorSettings,
}

impl Generator {
    /// Create generator
    #[must_use]
    pub fn new(settings: GeneratorSettings) -> Self {
        Self { settings }
    }

    /// Stylesheet location
    #[must_use]
    pub fn stylesheet_path(&self) -> PathBuf {
        self.settings.dist.join(format!("{}.min.css", self.settings.name))
    }

    /// Preview page location
    #[must_use]
    pub fn preview_path(&self) -> PathBuf {
        self.settings.dist.join("index.html")
    }

    /// Generate every asset for the successful compilations
    ///
    /// `on_generation` sees each result as it is produced.
    pub async fn generate<F>(&self, compilations: &[CompilationResult], mut on_generation: F) -> Vec<GenerationResult>
    where
        F: FnMut(&GenerationResult),
    {
        let icons = compiled_icons(compilations);
        tracing::debug!("generating assets for {} sources", icons.len());

        let (stylesheet, preview) = futures::join!(
            write_asset(self.stylesheet_path(), || self.stylesheet(&icons)),
            write_asset(self.preview_path(), || self.preview(&icons)),
        );

        let mut results = Vec::with_capacity(2);
        for result in [stylesheet, preview] {
            on_generation(&result);
            results.push(result);
        }
        results
    }

    /// Minified stylesheet for `icons`
    #[must_use]
    pub fn stylesheet(&self, icons: &[&IconSource]) -> String {
        let prefix = &self.settings.variable_prefix;
        let mut css = String::from(":root{");
        for (i, icon) in icons.iter().enumerate() {
            if i > 0 {
                css.push(';');
            }
            let _ = write!(
                css,
                "{}:url('{}/{}.svg')",
                variable_name(prefix, icon),
                css_string(&icon.category),
                css_string(&icon.name)
            );
        }
        css.push('}');

        let _ = write!(
            css,
            "i[data-{prefix}]{{aspect-ratio:1/1;background-origin:content-box;background-position:center;\
             background-repeat:no-repeat;background-size:contain;color:transparent;display:inline-block;\
             font:revert;height:var(--{prefix}-size,{DEFAULT_ICON_SIZE});line-height:1;overflow:hidden}}"
        );

        for icon in icons {
            let _ = write!(
                css,
                "i[data-{prefix}=\"{}/{}\"]{{background-image:var({})}}",
                css_string(&icon.category),
                css_string(&icon.name),
                variable_name(prefix, icon)
            );
        }
        css
    }

    /// Preview page for `icons`
    #[must_use]
    pub fn preview(&self, icons: &[&IconSource]) -> String {
        let prefix = &self.settings.variable_prefix;
        let mut html = String::new();
        let _ = write!(
            html,
            "<!doctype html><html lang=\"en\"><head><meta charset=\"utf-8\"><title>{name}</title>\
             <link href=\"{name}.min.css\" rel=\"stylesheet\">\
             <style>body{{display:grid;gap:.75rem;grid-template-columns:repeat(4,1fr);margin:0;padding:.5rem;\
             font-family:sans-serif;background:#eef}}a{{display:block;border:1px solid #ccd;border-radius:4px;\
             color:inherit;text-decoration:none;background:#fafafa}}a:target{{outline:3px solid #4f46e5}}\
             header{{padding:.5rem;font-weight:600;background:#3730a3;color:#fff}}\
             .sizes{{display:flex;gap:.5rem;padding:1rem}}.size{{display:flex;flex:1;flex-direction:column;\
             align-items:center;min-height:{max}px}}.size span{{padding-top:.5rem;font-size:.8rem}}</style>\
             </head><body>",
            name = html_escape(&self.settings.name),
            max = PREVIEW_SIZES[0],
        );

        for icon in icons {
            let id = html_escape(&icon.key());
            let _ = write!(html, "<a href=\"#{id}\" id=\"{id}\"><header>{id}</header><div class=\"sizes\">");
            for size in PREVIEW_SIZES {
                let _ = write!(
                    html,
                    "<div class=\"size\"><i data-{prefix}=\"{id}\" style=\"--{prefix}-size:{size}px\"></i>\
                     <span>{size}px</span></div>"
                );
            }
            html.push_str("</div></a>");
        }

        html.push_str("</body></html>");
        html
    }
}

/// Sources of successful compilations in `category/name` order
fn compiled_icons(compilations: &[CompilationResult]) -> Vec<&IconSource> {
    let mut icons: Vec<&IconSource> = compilations
        .iter()
        .filter(|result| result.is_success())
        .map(|result| &result.source)
        .collect();
    icons.sort_by(|a, b| (&a.category, &a.name).cmp(&(&b.category, &b.name)));
    icons
}

async fn write_asset(path: PathBuf, render: impl FnOnce() -> String) -> GenerationResult {
    let start = Instant::now();
    let contents = render();

    let error = match write_file(&path, contents.as_bytes()).await {
        Ok(()) => {
            tracing::debug!("generated '{}'", path.display());
            None
        }
        Err(e) => Some(CompilationError::from_io(ErrorKind::Write, &path, &e)),
    };

    GenerationResult {
        duration: start.elapsed(),
        path,
        error,
    }
}

async fn write_file(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, contents).await
}

fn variable_name(prefix: &str, icon: &IconSource) -> String {
    format!("--{prefix}-{}-{}-url", css_ident(&icon.category), css_ident(&icon.name))
}

/// Identifier-safe rendition; anything outside `[A-Za-z0-9_-]` becomes `_`
fn css_ident(value: &str) -> String {
    value
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

/// Escape for use inside a quoted CSS string
fn css_string(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '\\' | '"' | '\'') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn html_escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
