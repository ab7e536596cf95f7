//! `iconc build` and `iconc sources`

use anyhow::Context;
use iconc_core::manifest::{self, RunResults};
use iconc_core::prelude::*;
use iconc_core::IconSourceMap;
use std::path::Path;
use std::time::{Duration, Instant};

/// Counts reported at the end of a build
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct BuildSummary {
    pub(crate) compiled: usize,
    pub(crate) compile_failures: usize,
    pub(crate) generated: usize,
    pub(crate) generate_failures: usize,
}

/// Resolve sources using the configured root and exclusions
pub(crate) fn resolve(config: &ToolConfig) -> anyhow::Result<IconSourceMap> {
    let mut resolver = SourceResolver::new(&config.src.path);
    if let Some(exclude) = config.exclude_fn()? {
        resolver = resolver.with_exclude(exclude);
    }
    Ok(resolver.resolve()?)
}

/// Full pipeline: resolve, compile, generate, record
pub(crate) async fn build(config: &ToolConfig) -> anyhow::Result<BuildSummary> {
    let map = resolve(config)?;
    manifest::write_sources(&config.outputs.obj, &map).await?;

    for category in map.keys() {
        let dir = config.outputs.dist.join(category);
        empty_dir(&dir)?;
        tracing::debug!("created output directory for category: '{}'", dir.display());
    }

    let sources = flatten_sources(&map);
    println!("Discovered {} sources, starting compile:", sources.len());

    let start = Instant::now();
    let compiler = Compiler::new(config.compiler_settings()?, config.collaborators());
    let compiled = compiler
        .compile(sources, |result| {
            if !result.is_success() {
                match serde_json::to_string_pretty(result) {
                    Ok(json) => eprintln!("{json}\n"),
                    Err(e) => eprintln!("{}: {e}", result.source.path.display()),
                }
            }
        })
        .await?;

    let compile_failures = compiled.iter().filter(|result| !result.is_success()).count();
    println!(
        "Compiled {} sources in {}, with {} failure(s)\n",
        compiled.len() - compile_failures,
        format_duration(start.elapsed()),
        compile_failures
    );

    println!("Generating Assets:");
    let start = Instant::now();
    let generated = Generator::new(config.generator_settings())
        .generate(&compiled, |result| match &result.error {
            Some(error) => eprintln!("{}: {error}\n", result.path.display()),
            None => println!("{}", result.path.display()),
        })
        .await;

    let generate_failures = generated.iter().filter(|result| result.error.is_some()).count();
    println!(
        "\nGenerated {} assets in {}, with {} failure(s)",
        generated.len() - generate_failures,
        format_duration(start.elapsed()),
        generate_failures
    );

    let summary = BuildSummary {
        compiled: compiled.len() - compile_failures,
        compile_failures,
        generated: generated.len() - generate_failures,
        generate_failures,
    };

    manifest::write_results(&config.outputs.obj, &RunResults { compiled, generated }).await?;
    Ok(summary)
}

/// Remove everything inside `dir`, creating it if missing
pub(crate) fn empty_dir(dir: &Path) -> anyhow::Result<()> {
    match std::fs::remove_dir_all(dir) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e).with_context(|| format!("failed to empty '{}'", dir.display())),
    }
    std::fs::create_dir_all(dir).with_context(|| format!("failed to create '{}'", dir.display()))
}

/// Human readable duration, e.g. `1.25s` or `340ms`
pub(crate) fn format_duration(duration: Duration) -> String {
    let millis = duration.as_secs_f64() * 1000.0;
    if millis < 1000.0 {
        format!("{millis:.0}ms")
    } else if millis < 60_000.0 {
        format!("{:.2}s", millis / 1000.0)
    } else {
        let secs = duration.as_secs();
        format!("{}m {}s", secs / 60, secs % 60)
    }
}
