mod commands;

use clap::Parser;
use commands::{execute_command, Commands};
use std::path::PathBuf;

/// Playlist track matcher
#[derive(Parser)]
#[command(
    name = "playlist-match",
    about = "Resolve playlist rows to video links and streaming metadata",
    long_about = None
)]
struct Cli {
    /// Show detailed debug information
    #[arg(long, global = true)]
    verbose: bool,

    /// Config file layered over the built-in presets
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Cli::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    if let Err(e) = execute_command(args.command, args.config.as_deref(), args.verbose).await {
        eprintln!("❌ Command failed: {e}");
        std::process::exit(1);
    }

    Ok(())
}
