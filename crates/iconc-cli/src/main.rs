//! iconc command line

mod pipeline;
mod telemetry;

use clap::{value_parser, Arg, ArgMatches, Command};
use iconc_core::config::{ToolConfig, DEFAULT_CONFIG_FILE};
use std::path::PathBuf;

fn config_arg() -> Arg {
    Arg::new("config")
        .long("config")
        .short('c')
        .value_parser(value_parser!(PathBuf))
        .help("Path to the config file (default: ./iconc.toml when present)")
}

fn load_config(args: &ArgMatches) -> anyhow::Result<ToolConfig> {
    let path = args.get_one::<PathBuf>("config");
    let config = ToolConfig::discover(path.map(PathBuf::as_path))?;

    match path {
        Some(path) => println!("Loaded {}\n", path.display()),
        None if std::path::Path::new(DEFAULT_CONFIG_FILE).is_file() => println!("Loaded {DEFAULT_CONFIG_FILE}\n"),
        None => println!("No {DEFAULT_CONFIG_FILE} found, using defaults\n"),
    }
    Ok(config)
}

async fn run_build(args: &ArgMatches) -> anyhow::Result<()> {
    let config = load_config(args)?;

    pipeline::empty_dir(&config.outputs.obj)?;
    pipeline::empty_dir(&config.outputs.dist)?;
    telemetry::init(&config.logging, config.log_file().as_deref())?;
    tracing::debug!("initialized obj directory: '{}'", config.outputs.obj.display());
    tracing::debug!("initialized output directory: '{}'", config.outputs.dist.display());

    let summary = pipeline::build(&config).await?;
    tracing::info!(
        compiled = summary.compiled,
        compile_failures = summary.compile_failures,
        generated = summary.generated,
        generate_failures = summary.generate_failures,
        "build finished"
    );

    println!("\nDONE!");
    Ok(())
}

fn run_sources(args: &ArgMatches) -> anyhow::Result<()> {
    let config = ToolConfig::discover(args.get_one::<PathBuf>("config").map(PathBuf::as_path))?;
    telemetry::init(&config.logging, None)?;

    let map = pipeline::resolve(&config)?;
    println!("{}", serde_json::to_string_pretty(&map)?);
    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Command::new("iconc")
        .version(iconc_core::VERSION)
        .about("Compile raster and vector icons into optimized SVGs, a stylesheet and a preview page")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            Command::new("build")
                .about("Resolve, compile and generate every icon asset")
                .arg(config_arg()),
        )
        .subcommand(
            Command::new("sources")
                .about("Print the resolved source map as JSON")
                .arg(config_arg()),
        );

    let matches = cli.get_matches();

    let outcome = match matches.subcommand() {
        Some(("build", args)) => run_build(args).await,
        Some(("sources", args)) => run_sources(args),
        _ => unreachable!("subcommand is required"),
    };

    if let Err(e) = outcome {
        tracing::error!("{e:#}");
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
