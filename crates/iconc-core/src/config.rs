//! Tool configuration
//!
//! Loaded from TOML (`iconc.toml` by default). Every field has a default, so
//! an empty file is a valid configuration. Relative paths are resolved
//! against the working directory at load time.

use crate::backend::ExecutionBackend;
use crate::compiler::{default_concurrency, CompilerSettings, OptionsOverride};
use crate::error::ConfigError;
use crate::generate::GeneratorSettings;
use crate::optimize::{OptimizeOptions, SvgMinifier};
use crate::sources::ExcludeFn;
use crate::task::Collaborators;
use crate::types::IconSource;
use crate::vectorize::{CommandVectorizer, EmbedVectorizer, VectorizeOptions};
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::level_filters::LevelFilter;

/// Config file looked up when none is given
pub const DEFAULT_CONFIG_FILE: &str = "iconc.toml";

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ToolConfig {
    /// Maximum concurrent tasks; available parallelism when unset
    #[serde(default)]
    pub concurrency: Option<usize>,

    /// Where tasks execute
    #[serde(default)]
    pub backend: ExecutionBackend,

    /// Per-task timeout in seconds, 0 disables
    #[serde(default = "default_task_timeout_secs")]
    pub task_timeout_secs: u64,

    /// Source tree
    #[serde(default)]
    pub src: SourceConfig,

    /// Output directories
    #[serde(default)]
    pub outputs: OutputConfig,

    /// Generated stylesheet
    #[serde(default)]
    pub stylesheet: StylesheetConfig,

    /// Log sinks
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Collaborator options
    #[serde(default)]
    pub compilation: CompilationConfig,
}

/// Source tree settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourceConfig {
    /// Root of the `{category}/{size}/{name}` tree
    #[serde(default = "default_src_path")]
    pub path: PathBuf,

    /// Sources matching any rule are dropped
    #[serde(default)]
    pub exclude: Vec<ExcludeRule>,
}

/// Exclusion rule; every field given must match
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExcludeRule {
    /// Exact category
    #[serde(default)]
    pub category: Option<String>,

    /// Name prefix
    #[serde(default)]
    pub name_prefix: Option<String>,

    /// Regex over `category/name`
    #[serde(default)]
    pub pattern: Option<String>,
}

/// Output directory settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutputConfig {
    /// Compiled icons and generated assets
    #[serde(default = "default_dist")]
    pub dist: PathBuf,

    /// Manifests and logs
    #[serde(default = "default_obj")]
    pub obj: PathBuf,
}

/// Stylesheet settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StylesheetConfig {
    /// File stem of `{name}.min.css`
    #[serde(default = "default_stylesheet_name")]
    pub name: String,

    /// CSS variable and data attribute prefix; defaults to `name`
    #[serde(default)]
    pub variable_prefix: Option<String>,
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Level directive (`error` .. `trace`, or `off`) for every target
    ///
    /// When unset the console logs at `info` and the file at `debug`.
    #[serde(default)]
    pub level: Option<String>,

    /// Log to stderr
    #[serde(default = "default_true")]
    pub console: bool,

    /// Log to `{obj}/log.txt`, or to the given path
    #[serde(default)]
    pub file: LogFile,
}

/// File log target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LogFile {
    /// `true` logs to `{obj}/log.txt`
    Enabled(bool),
    /// Explicit log file
    Path(PathBuf),
}

/// Collaborator settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CompilationConfig {
    /// Optimizer options
    #[serde(default)]
    pub optimize: OptimizeOptions,

    /// Vectorizer options
    #[serde(default)]
    pub vectorize: VectorizeOptions,

    /// Vectorizer implementation
    #[serde(default)]
    pub vectorizer: VectorizerConfig,

    /// Per-source option overrides, applied in order; the last match wins
    #[serde(default)]
    pub overrides: Vec<CompilationOverride>,
}

/// Options for the sources of one category and/or size bucket
///
/// Keys set here replace the same keys of `compilation.vectorize` and
/// `compilation.optimize`; everything else is inherited. A rule with neither
/// `category` nor `size` applies to every source.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CompilationOverride {
    /// Category the rule applies to
    #[serde(default)]
    pub category: Option<String>,

    /// Size bucket the rule applies to, e.g. `"16"` or `"scalable"`
    #[serde(default)]
    pub size: Option<String>,

    /// Vectorizer option keys to replace
    #[serde(default)]
    pub vectorize: toml::Table,

    /// Optimizer option keys to replace
    #[serde(default)]
    pub optimize: toml::Table,
}

impl CompilationOverride {
    fn resolve(&self, base: &CompilationConfig) -> Result<OptionsOverride, ConfigError> {
        Ok(OptionsOverride {
            category: self.category.clone(),
            size: self.size.clone(),
            vectorize: layered(&base.vectorize, &self.vectorize, "compilation.overrides.vectorize")?,
            optimize: layered(&base.optimize, &self.optimize, "compilation.overrides.optimize")?,
        })
    }
}

/// Vectorizer implementation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum VectorizerConfig {
    /// Embed rasters as data URIs
    #[default]
    Embed,
    /// Pipe rasters through an external tracer
    Command {
        /// Executable
        program: String,
        /// Fixed arguments
        #[serde(default)]
        args: Vec<String>,
    },
}

fn default_task_timeout_secs() -> u64 {
    300
}

fn default_src_path() -> PathBuf {
    PathBuf::from("./ref/icons")
}

fn default_dist() -> PathBuf {
    PathBuf::from("./dist")
}

fn default_obj() -> PathBuf {
    PathBuf::from("./obj")
}

fn default_stylesheet_name() -> String {
    "icons".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            concurrency: None,
            backend: ExecutionBackend::default(),
            task_timeout_secs: default_task_timeout_secs(),
            src: SourceConfig::default(),
            outputs: OutputConfig::default(),
            stylesheet: StylesheetConfig::default(),
            logging: LoggingConfig::default(),
            compilation: CompilationConfig::default(),
        }
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            path: default_src_path(),
            exclude: Vec::new(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dist: default_dist(),
            obj: default_obj(),
        }
    }
}

impl Default for StylesheetConfig {
    fn default() -> Self {
        Self {
            name: default_stylesheet_name(),
            variable_prefix: None,
        }
    }
}

/// Console level when `logging.level` is unset
pub const DEFAULT_CONSOLE_LEVEL: &str = "info";

/// File level when `logging.level` is unset
pub const DEFAULT_FILE_LEVEL: &str = "debug";

impl LoggingConfig {
    /// Effective console level
    #[must_use]
    pub fn console_level(&self) -> &str {
        self.level.as_deref().unwrap_or(DEFAULT_CONSOLE_LEVEL)
    }

    /// Effective file level
    #[must_use]
    pub fn file_level(&self) -> &str {
        self.level.as_deref().unwrap_or(DEFAULT_FILE_LEVEL)
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: None,
            console: true,
            file: LogFile::default(),
        }
    }
}

impl Default for LogFile {
    fn default() -> Self {
        Self::Enabled(false)
    }
}

impl ToolConfig {
    /// Load `path`, or [`DEFAULT_CONFIG_FILE`] if present, or defaults
    ///
    /// An explicit path must exist; the default file is optional.
    ///
    /// # Errors
    /// - `ConfigError::Read` if the file cannot be read
    /// - `ConfigError::Parse` / `Invalid` / `Pattern` for bad contents
    pub fn discover(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load(path),
            None if Path::new(DEFAULT_CONFIG_FILE).is_file() => Self::load(Path::new(DEFAULT_CONFIG_FILE)),
            None => {
                let mut config = Self::default();
                config.resolve_paths(&current_dir()?);
                config.validate()?;
                Ok(config)
            }
        }
    }

    /// Load and validate a config file
    ///
    /// # Errors
    /// Same as [`ToolConfig::discover`].
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let mut config = Self::parse(&text, path)?;
        config.resolve_paths(&current_dir()?);
        config.validate()?;

        tracing::debug!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    /// Parse and validate TOML text; paths are left as written
    ///
    /// # Errors
    /// - `ConfigError::Parse` / `Invalid` / `Pattern` for bad contents
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config = Self::parse(text, Path::new("<inline>"))?;
        config.validate()?;
        Ok(config)
    }

    fn parse(text: &str, path: &Path) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Make every relative path absolute against `base`
    pub fn resolve_paths(&mut self, base: &Path) {
        let absolute = |path: &mut PathBuf| {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        };

        absolute(&mut self.src.path);
        absolute(&mut self.outputs.dist);
        absolute(&mut self.outputs.obj);
        if let LogFile::Path(path) = &mut self.logging.file {
            absolute(path);
        }
    }

    /// Check value ranges and compile exclude patterns
    ///
    /// # Errors
    /// - `ConfigError::Invalid` for out-of-range values
    /// - `ConfigError::Pattern` for exclude patterns that are not regexes
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.concurrency == Some(0) {
            return Err(ConfigError::Invalid {
                field: "concurrency",
                reason: "must be at least 1".to_string(),
            });
        }

        if self.stylesheet.name.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "stylesheet.name",
                reason: "must not be empty".to_string(),
            });
        }

        if self.variable_prefix().trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "stylesheet.variable_prefix",
                reason: "must not be empty".to_string(),
            });
        }

        if let Some(level) = &self.logging.level {
            if let Err(e) = level.parse::<LevelFilter>() {
                return Err(ConfigError::Invalid {
                    field: "logging.level",
                    reason: e.to_string(),
                });
            }
        }

        if let VectorizerConfig::Command { program, .. } = &self.compilation.vectorizer {
            if program.trim().is_empty() {
                return Err(ConfigError::Invalid {
                    field: "compilation.vectorizer.program",
                    reason: "must not be empty".to_string(),
                });
            }
        }

        for rule in &self.src.exclude {
            rule.compile()?;
        }

        self.option_overrides()?;
        Ok(())
    }

    /// Effective concurrency limit
    #[must_use]
    pub fn concurrency(&self) -> usize {
        self.concurrency.unwrap_or_else(default_concurrency)
    }

    /// Effective per-task timeout
    #[must_use]
    pub fn task_timeout(&self) -> Option<Duration> {
        (self.task_timeout_secs > 0).then(|| Duration::from_secs(self.task_timeout_secs))
    }

    /// Effective CSS variable prefix
    #[must_use]
    pub fn variable_prefix(&self) -> &str {
        self.stylesheet
            .variable_prefix
            .as_deref()
            .unwrap_or(&self.stylesheet.name)
    }

    /// Effective log file, if file logging is on
    #[must_use]
    pub fn log_file(&self) -> Option<PathBuf> {
        match &self.logging.file {
            LogFile::Enabled(true) => Some(self.outputs.obj.join("log.txt")),
            LogFile::Enabled(false) => None,
            LogFile::Path(path) => Some(path.clone()),
        }
    }

    /// Exclusion predicate built from `src.exclude`, `None` when empty
    ///
    /// # Errors
    /// `ConfigError::Pattern` for a pattern that is not a regex
    pub fn exclude_fn(&self) -> Result<Option<ExcludeFn>, ConfigError> {
        if self.src.exclude.is_empty() {
            return Ok(None);
        }

        let rules = self
            .src
            .exclude
            .iter()
            .map(ExcludeRule::compile)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Some(Arc::new(move |source: &IconSource| {
            rules.iter().any(|rule| rule.matches(source))
        })))
    }

    /// `compilation.overrides` layered over the base collaborator options
    ///
    /// # Errors
    /// - `ConfigError::Invalid` for unknown option keys or values of the wrong type
    pub fn option_overrides(&self) -> Result<Vec<OptionsOverride>, ConfigError> {
        self.compilation
            .overrides
            .iter()
            .map(|rule| rule.resolve(&self.compilation))
            .collect()
    }

    /// Orchestrator settings writing into `outputs.dist`
    ///
    /// # Errors
    /// Same as [`ToolConfig::option_overrides`].
    pub fn compiler_settings(&self) -> Result<CompilerSettings, ConfigError> {
        Ok(CompilerSettings {
            concurrency: self.concurrency(),
            backend: self.backend,
            task_timeout: self.task_timeout(),
            output_root: self.outputs.dist.clone(),
            vectorize: self.compilation.vectorize.clone(),
            optimize: self.compilation.optimize.clone(),
            overrides: self.option_overrides()?,
        })
    }

    /// Generator settings for `outputs.dist`
    #[must_use]
    pub fn generator_settings(&self) -> GeneratorSettings {
        GeneratorSettings {
            dist: self.outputs.dist.clone(),
            name: self.stylesheet.name.clone(),
            variable_prefix: self.variable_prefix().to_string(),
        }
    }

    /// Collaborators selected by `compilation.vectorizer`
    #[must_use]
    pub fn collaborators(&self) -> Collaborators {
        match &self.compilation.vectorizer {
            VectorizerConfig::Embed => Collaborators::new(EmbedVectorizer, SvgMinifier),
            VectorizerConfig::Command { program, args } => {
                Collaborators::new(CommandVectorizer::new(program.clone(), args.clone()), SvgMinifier)
            }
        }
    }
}

/// Exclusion rule with its pattern compiled
#[derive(Debug, Clone)]
struct CompiledRule {
    category: Option<String>,
    name_prefix: Option<String>,
    pattern: Option<Regex>,
}

impl ExcludeRule {
    fn compile(&self) -> Result<CompiledRule, ConfigError> {
        let pattern = self
            .pattern
            .as_deref()
            .map(|pattern| {
                Regex::new(pattern).map_err(|source| ConfigError::Pattern {
                    pattern: pattern.to_string(),
                    source,
                })
            })
            .transpose()?;

        Ok(CompiledRule {
            category: self.category.clone(),
            name_prefix: self.name_prefix.clone(),
            pattern,
        })
    }
}

impl CompiledRule {
    fn matches(&self, source: &IconSource) -> bool {
        if self.category.is_none() && self.name_prefix.is_none() && self.pattern.is_none() {
            return false;
        }

        self.category.as_ref().map_or(true, |category| *category == source.category)
            && self
                .name_prefix
                .as_ref()
                .map_or(true, |prefix| source.name.starts_with(prefix.as_str()))
            && self
                .pattern
                .as_ref()
                .map_or(true, |pattern| pattern.is_match(&source.key()))
    }
}

/// `base` with the keys of `layer` replaced
fn layered<T>(base: &T, layer: &toml::Table, field: &'static str) -> Result<T, ConfigError>
where
    T: Serialize + DeserializeOwned,
{
    let invalid = |reason: String| ConfigError::Invalid { field, reason };

    let mut table = match toml::Value::try_from(base) {
        Ok(toml::Value::Table(table)) => table,
        Ok(other) => return Err(invalid(format!("expected a table, found {}", other.type_str()))),
        Err(e) => return Err(invalid(e.to_string())),
    };

    for (key, value) in layer {
        if !table.contains_key(key) {
            return Err(invalid(format!("unknown option '{key}'")));
        }
        table.insert(key.clone(), value.clone());
    }

    toml::Value::Table(table)
        .try_into()
        .map_err(|e: toml::de::Error| invalid(e.message().to_string()))
}

fn current_dir() -> Result<PathBuf, ConfigError> {
    std::env::current_dir().map_err(|source| ConfigError::Read {
        path: PathBuf::from("."),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimize::OptimizePass;
    use crate::vectorize::ColorMode;
    use pretty_assertions::assert_eq;

    #[test]
    fn empty_file_is_all_defaults() {
        let config = ToolConfig::from_toml_str("").unwrap();
        assert_eq!(config, ToolConfig::default());
        assert_eq!(config.variable_prefix(), "icons");
        assert_eq!(config.task_timeout(), Some(Duration::from_secs(300)));
        assert_eq!(config.log_file(), None);
        assert!(config.concurrency() >= 1);
    }

    #[test]
    fn full_file() {
        let config = ToolConfig::from_toml_str(
            r#"
            concurrency = 6
            backend = "in-process"
            task_timeout_secs = 0

            [src]
            path = "./ref/icons"

            [[src.exclude]]
            category = "apps"
            name_prefix = "chrome-"

            [outputs]
            dist = "/out/dist"
            obj = "/out/obj"

            [stylesheet]
            name = "seicons"
            variable_prefix = "seicon"

            [logging]
            level = "debug"
            file = true

            [compilation.optimize]
            float_precision = 3
            passes = ["strip-comments", "round-numbers"]

            [compilation.vectorize]
            color_mode = "binary"

            [compilation.vectorizer]
            kind = "command"
            program = "vtracer"
            args = ["--stdin"]
            "#,
        )
        .unwrap();

        assert_eq!(config.concurrency(), 6);
        assert_eq!(config.backend, ExecutionBackend::InProcess);
        assert_eq!(config.task_timeout(), None);
        assert_eq!(config.variable_prefix(), "seicon");
        assert_eq!(config.log_file(), Some(PathBuf::from("/out/obj/log.txt")));
        assert_eq!(config.compilation.optimize.float_precision, 3);
        assert_eq!(
            config.compilation.optimize.passes,
            vec![OptimizePass::StripComments, OptimizePass::RoundNumbers]
        );
        assert_eq!(config.compilation.vectorize.color_mode, ColorMode::Binary);
        assert_eq!(config.compilation.vectorize.max_iterations, 8);
        assert_eq!(
            config.compilation.vectorizer,
            VectorizerConfig::Command {
                program: "vtracer".to_string(),
                args: vec!["--stdin".to_string()],
            }
        );

        let settings = config.compiler_settings().unwrap();
        assert_eq!(settings.concurrency, 6);
        assert_eq!(settings.output_root, PathBuf::from("/out/dist"));
    }

    #[test]
    fn log_file_path() {
        let config = ToolConfig::from_toml_str("[logging]\nfile = \"/var/log/iconc.txt\"").unwrap();
        assert_eq!(config.log_file(), Some(PathBuf::from("/var/log/iconc.txt")));
    }

    #[test]
    fn relative_paths_resolve_against_base() {
        let mut config = ToolConfig::from_toml_str("[outputs]\ndist = \"out\"\nobj = \"/abs/obj\"").unwrap();
        config.resolve_paths(Path::new("/work"));

        assert_eq!(config.outputs.dist, PathBuf::from("/work/out"));
        assert_eq!(config.outputs.obj, PathBuf::from("/abs/obj"));
        assert_eq!(config.src.path, PathBuf::from("/work/./ref/icons"));
    }

    #[test]
    fn zero_concurrency_is_rejected() {
        let err = ToolConfig::from_toml_str("concurrency = 0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "concurrency", .. }));
    }

    #[test]
    fn empty_stylesheet_name_is_rejected() {
        let err = ToolConfig::from_toml_str("[stylesheet]\nname = \"\"").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "stylesheet.name", .. }));
    }

    #[test]
    fn file_logs_more_than_console_by_default() {
        let config = ToolConfig::default();
        assert_eq!(config.logging.console_level(), "info");
        assert_eq!(config.logging.file_level(), "debug");

        let config = ToolConfig::from_toml_str("[logging]\nlevel = \"warn\"").unwrap();
        assert_eq!(config.logging.console_level(), "warn");
        assert_eq!(config.logging.file_level(), "warn");
    }

    #[test]
    fn bad_level_is_rejected() {
        let err = ToolConfig::from_toml_str("[logging]\nlevel = \"loud\"").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "logging.level", .. }));
    }

    #[test]
    fn bad_pattern_is_rejected() {
        let err = ToolConfig::from_toml_str("[[src.exclude]]\npattern = \"(\"").unwrap_err();
        assert!(matches!(err, ConfigError::Pattern { .. }));
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let err = ToolConfig::from_toml_str("concurency = 2").unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn exclude_rules_match_on_all_fields() {
        let config = ToolConfig::from_toml_str(
            r#"
            [[src.exclude]]
            category = "apps"
            name_prefix = "chrome-"

            [[src.exclude]]
            pattern = "^status/.*-symbolic$"

            [[src.exclude]]
            "#,
        )
        .unwrap();
        let exclude = config.exclude_fn().unwrap().unwrap();

        let source = |category: &str, name: &str| IconSource::new(category, name, "/x.svg", "scalable");
        assert!(exclude(&source("apps", "chrome-beta")));
        assert!(!exclude(&source("places", "chrome-beta")));
        assert!(!exclude(&source("apps", "firefox")));
        assert!(exclude(&source("status", "dialog-symbolic")));
        assert!(!exclude(&source("status", "dialog")));
    }

    #[test]
    fn no_rules_means_no_predicate() {
        assert!(ToolConfig::default().exclude_fn().unwrap().is_none());
    }

    #[test]
    fn overrides_layer_over_base_options() {
        let config = ToolConfig::from_toml_str(
            r#"
            [compilation.vectorize]
            color_mode = "binary"

            [[compilation.overrides]]
            category = "apps"
            size = "16"
            vectorize = { filter_speckle = 4 }
            optimize = { float_precision = 1 }
            "#,
        )
        .unwrap();

        let settings = config.compiler_settings().unwrap();
        let small = IconSource::new("apps", "foo", "/src/apps/16/foo.png", "16");
        let large = IconSource::new("apps", "foo", "/src/apps/48/foo.png", "48");

        let (vectorize, optimize) = settings.options_for(&small);
        assert_eq!(vectorize.filter_speckle, 4);
        assert_eq!(vectorize.color_mode, ColorMode::Binary);
        assert_eq!(optimize.float_precision, 1);
        assert_eq!(optimize.passes, OptimizeOptions::default().passes);

        let (vectorize, optimize) = settings.options_for(&large);
        assert_eq!(vectorize.filter_speckle, 0);
        assert_eq!(optimize.float_precision, 2);
    }

    #[test]
    fn unknown_override_key_is_rejected() {
        let result = ToolConfig::from_toml_str("[[compilation.overrides]]\nvectorize = { speckles = 4 }");
        assert!(
            matches!(result, Err(ConfigError::Invalid { field: "compilation.overrides.vectorize", .. })),
            "{result:?}"
        );
    }

    #[test]
    fn mistyped_override_value_is_rejected() {
        let result = ToolConfig::from_toml_str("[[compilation.overrides]]\noptimize = { pretty = \"yes\" }");
        assert!(
            matches!(result, Err(ConfigError::Invalid { field: "compilation.overrides.optimize", .. })),
            "{result:?}"
        );
    }
}
