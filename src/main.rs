//! `capgrab` CLI - list and download YouTube caption tracks

mod cmd;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser)]
#[command(name = "capgrab")]
#[command(about = "Discover YouTube caption tracks and download them as SubRip")]
#[command(version)]
struct Cli {
    /// Path to config.toml (default: ~/.config/capgrab/config.toml)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// YouTube Data API key; selects API-key mode and skips the config file
    #[arg(long, global = true, env = "CAPGRAB_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Enable debug logging on stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the caption tracks of a video
    Tracks {
        /// YouTube video URL
        url: String,

        /// Print the tracks as JSON
        #[arg(long)]
        json: bool,
    },

    /// Download a caption track as SubRip (.srt)
    Download {
        /// YouTube video URL
        url: String,

        /// Track to download: 1-based position or track id (default: first)
        #[arg(short, long)]
        track: Option<String>,

        /// Output file, or '-' for stdout (default: captions.srt)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Run the OAuth2 authorization step and show the granted scopes
    Auth,

    /// Interactive session: enter URLs, pick tracks, save captions
    Run,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let level = if cli.verbose { "debug" } else { "warn" };
    FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();

    let mut session = cmd::open_session(cli.config.as_deref(), cli.api_key)?;

    match cli.command {
        Commands::Tracks { url, json } => {
            cmd::cmd_tracks(&mut session, &url, json).await?;
        }
        Commands::Download { url, track, output } => {
            cmd::cmd_download(&mut session, &url, track.as_deref(), output.as_deref()).await?;
        }
        Commands::Auth => {
            cmd::cmd_auth(&mut session).await?;
        }
        Commands::Run => {
            cmd::cmd_run(&mut session).await?;
        }
    }

    Ok(())
}
