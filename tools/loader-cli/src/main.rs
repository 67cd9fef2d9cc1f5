//! Loader CLI - Command line tool for the storefront bootstrap loader.
//!
//! Commands:
//! - `loader classify` - Classify request paths
//! - `loader render` - Print the head markup for a path
//! - `loader simulate` - Run a page load against an in-memory document
//! - `loader config` - Manage configuration

mod commands;
mod config;
mod context;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use loader_observability::LogFormat;

use commands::{ClassifyArgs, ConfigArgs, RenderArgs, SimulateArgs};

/// Loader CLI - Inspect and simulate the storefront bootstrap loader
#[derive(Parser)]
#[command(name = "loader")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Use JSON output format
    #[arg(long, global = true)]
    json: bool,

    /// Config file path
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Environment overrides to apply
    #[arg(short, long, global = true)]
    env: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify request paths as storefront or native pages
    Classify(ClassifyArgs),

    /// Print the critical style and bundle tags for a path
    Render(RenderArgs),

    /// Simulate a page load against an in-memory document
    Simulate(SimulateArgs),

    /// Manage configuration
    Config(ConfigArgs),
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let format = if cli.json { LogFormat::Json } else { LogFormat::Human };
    loader_observability::init(format, cli.verbose);

    let output = output::Output::new(cli.verbose, cli.json);

    let ctx = context::Context::load(cli.config.as_deref(), cli.env, output)?;

    let result = match cli.command {
        Commands::Classify(args) => commands::classify::run(args, &ctx).await,
        Commands::Render(args) => commands::render::run(args, &ctx).await,
        Commands::Simulate(args) => commands::simulate::run(args, &ctx).await,
        Commands::Config(args) => commands::config::run(args, &ctx).await,
    };

    if let Err(e) = result {
        ctx.output.error(&format!("{:#}", e));
        std::process::exit(1);
    }

    Ok(())
}
