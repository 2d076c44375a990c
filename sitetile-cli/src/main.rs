//! SiteTile CLI - Command-line interface
//!
//! Serves vector tiles over HTTP and exposes the tile pipeline for one-off
//! use from the shell.

mod commands;
mod error;
mod runner;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use commands::config::ConfigCommands;
use commands::TileArgs;
use error::CliError;

#[derive(Debug, Parser)]
#[command(name = "sitetile", version, about = "Vector tiles of model-run sites")]
struct Cli {
    /// Configuration file (default: ~/.sitetile/config.ini)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Serve tiles over HTTP
    Serve {
        /// Address to listen on (overrides server.bind)
        #[arg(long, value_name = "ADDR")]
        bind: Option<String>,
    },

    /// Compute a single tile through the cache
    Tile {
        #[command(flatten)]
        tile: TileArgs,

        /// Write the payload to this file
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Print the cache keys for a tile
    Key {
        #[command(flatten)]
        tile: TileArgs,
    },

    /// View and edit configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Serve { bind } => commands::serve::run(config_path, cli.verbose, bind),
        Commands::Tile { tile, output } => {
            commands::tile::run(config_path, cli.verbose, &tile, output.as_deref())
        }
        Commands::Key { tile } => commands::key::run(config_path, cli.verbose, &tile),
        Commands::Config { command } => commands::config::run(command, config_path),
    }
}
