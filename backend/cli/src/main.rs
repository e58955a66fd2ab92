mod commands_cmd;
mod console;
mod demo;
mod replay_cmd;
mod terminal_output;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use slashforge_config::{SlashForgeConfig, config_dir, config_file_path, load_and_prepare};
use slashforge_logging::init_logger;
use tracing::debug;

#[derive(Parser)]
#[command(name = "slashforge")]
#[command(about = "SlashForge: slash command registration and dispatch")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the demo command tree as a registration manifest
    Commands {
        /// Config file (defaults to ~/.slashforge/config.yaml)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Dispatch newline-delimited JSON interactions against the demo tree
    Replay {
        /// NDJSON file, one interaction per line
        #[arg(short, long)]
        file: PathBuf,
        /// Config file (defaults to ~/.slashforge/config.yaml)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

async fn load(path: Option<PathBuf>) -> Result<SlashForgeConfig> {
    let path = path.unwrap_or_else(|| config_file_path(&config_dir()));
    let config = load_and_prepare(&path).await?;
    init_logger(&config.logging());
    debug!(path = %path.display(), "Config loaded");
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Commands { config } => {
            let config = load(config).await?;
            commands_cmd::run(&config).await?;
        }
        Commands::Replay { file, config } => {
            let config = load(config).await?;
            replay_cmd::run(&config, &file).await?;
        }
    }

    Ok(())
}
