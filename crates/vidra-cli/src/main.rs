//! Vidra CLI - Headless playback session toolkit
//!
//! Features:
//! - Source resolution (URI, format hint, pre-fetched tracks)
//! - Source building with merged timelines
//! - Scripted sessions against a simulated engine

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use vidra_core::PlaybackOptions;

mod commands;
mod output;
mod script;
mod sim;

use output::OutputFormat;

/// Vidra CLI - Playback session toolkit
#[derive(Parser)]
#[command(name = "vidra-cli")]
#[command(version)]
#[command(about = "Inspect media sources and drive simulated playback sessions", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Output format (text, json)
    #[arg(short, long, default_value = "text")]
    format: String,

    /// Session config file (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Where the media comes from
#[derive(Args, Debug, Clone, Default)]
pub struct SourceArgs {
    /// Primary media URI
    #[arg(short, long)]
    pub url: Option<String>,

    /// Format hint for plain URIs (ss, dash, hls, other)
    #[arg(long)]
    pub format_hint: Option<String>,

    /// Pre-fetched track as [kind:]manifest_path:content_url (repeatable)
    #[arg(short, long = "track")]
    pub tracks: Vec<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show which kind of source the inputs resolve to
    Resolve {
        #[command(flatten)]
        source: SourceArgs,
    },

    /// Build the source and show its structure
    Build {
        #[command(flatten)]
        source: SourceArgs,
    },

    /// Run a scripted session against a simulated engine
    Simulate {
        #[command(flatten)]
        source: SourceArgs,

        /// Operations, e.g. "play,seek:5000,detach,attach,position,dispose"
        #[arg(short, long)]
        script: String,

        /// Start with repeat-all
        #[arg(long)]
        looping: bool,

        /// Play alongside other audio
        #[arg(long)]
        mix_with_others: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(level)
        .with_writer(std::io::stderr)
        .init();
    vidra_core::init();

    let format = OutputFormat::from(cli.format.as_str());
    let config = commands::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Resolve { source } => {
            commands::resolve(&source, format)?;
        }
        Commands::Build { source } => {
            commands::build(&source, config, format)?;
        }
        Commands::Simulate {
            source,
            script,
            looping,
            mix_with_others,
        } => {
            let options = PlaybackOptions {
                looping,
                mix_with_others,
            };
            commands::simulate(&source, &script, options, config, format).await?;
        }
    }

    Ok(())
}
