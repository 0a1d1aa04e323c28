// SPDX-License-Identifier: GPL-3.0-only

use clap::{Parser, Subcommand};
use livestream::Config;
use std::sync::Mutex;

mod cli;

#[derive(Parser)]
#[command(name = "livestream")]
#[command(about = "Live camera streaming with preview and effects")]
#[command(version = env!("LIVESTREAM_BUILD_VERSION"))]
#[command(subcommand_required = false)]
struct Cli {
    /// Destination URL (overrides the configured default)
    #[arg(long, global = true)]
    url: Option<String>,

    /// Camera device to use; repeat to allow switching between several
    #[arg(long = "device", global = true)]
    devices: Vec<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// List available cameras
    List,

    /// Stream without the terminal UI, logging every state change
    Stream {
        /// Stop after this many seconds (default: until Ctrl+C)
        #[arg(short, long)]
        duration: Option<u64>,
    },

    /// Show the active configuration
    Config {
        /// Write the default configuration to the config file
        #[arg(long)]
        write_default: bool,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // The terminal UI owns the screen, so its logs go to a file
    // Set RUST_LOG environment variable to control log level
    // Examples: RUST_LOG=debug, RUST_LOG=livestream=debug, RUST_LOG=info
    init_logging(cli.command.is_none())?;

    let mut config = Config::load()?;
    if let Some(url) = cli.url {
        config.default_url = url;
    }
    if !cli.devices.is_empty() {
        config.camera_devices = cli.devices;
    }

    match cli.command {
        None => livestream::terminal::run(config),
        Some(Commands::List) => cli::list_cameras(),
        Some(Commands::Stream { duration }) => cli::stream(config, duration),
        Some(Commands::Config { write_default }) => cli::show_config(&config, write_default),
    }
}

fn init_logging(to_file: bool) -> Result<(), Box<dyn std::error::Error>> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));

    if to_file {
        let dir = dirs::cache_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("livestream");
        std::fs::create_dir_all(&dir)?;
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(dir.join("livestream.log"))?;
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(Mutex::new(file))
            .with_ansi(false)
            .with_target(true)
            .with_level(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_level(true)
            .init();
    }
    Ok(())
}
