//! CLI command implementations.

pub mod classify;
pub mod config;
pub mod render;
pub mod simulate;

use clap::{Args, Subcommand};

/// Arguments for the classify command.
#[derive(Args)]
pub struct ClassifyArgs {
    /// Request paths to classify.
    #[arg(required = true)]
    pub paths: Vec<String>,
}

/// Arguments for the render command.
#[derive(Args)]
pub struct RenderArgs {
    /// Request path to render for.
    #[arg(short, long, default_value = "/")]
    pub path: String,

    /// Cache-busting token (default: current time in milliseconds).
    #[arg(short, long)]
    pub token: Option<String>,
}

/// Arguments for the simulate command.
#[derive(Args)]
pub struct SimulateArgs {
    /// Request path to load.
    #[arg(short, long, default_value = "/")]
    pub path: String,

    /// Policy preset to use instead of the configured policy.
    #[arg(long)]
    pub preset: Option<String>,

    /// When the application signals readiness.
    #[arg(long, default_value = "250", conflicts_with = "never_ready")]
    pub ready_after_ms: u64,

    /// Never signal readiness; exercises the safety timeout.
    #[arg(long)]
    pub never_ready: bool,

    /// Delay before the body is parsed (default: present at start).
    #[arg(long)]
    pub body_after_ms: Option<u64>,

    /// Inject host chrome naming the operator after this delay.
    #[arg(long)]
    pub leak_after_ms: Option<u64>,

    /// Print the final document.
    #[arg(long)]
    pub html: bool,

    /// Save the timeline as JSON to this file.
    #[arg(long)]
    pub record: Option<String>,
}

/// Arguments for the config command.
#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show the effective configuration.
    Show,
    /// Initialize a new config file.
    Init {
        /// Force overwrite existing config.
        #[arg(short, long)]
        force: bool,

        /// Asset origin to write into the new file.
        #[arg(long, default_value = "https://storefront.example.com")]
        origin: String,
    },
    /// Validate the config file.
    Validate,
    /// List the policy presets.
    Presets,
}
