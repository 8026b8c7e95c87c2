// SPDX-License-Identifier: GPL-3.0-only

use clap::{Parser, Subcommand};

mod cli;

#[derive(Parser)]
#[command(name = "hdr-preview")]
#[command(about = "Camera preview pipeline with a pluggable HDR compute stage")]
#[command(version)]
#[command(subcommand_required = false)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a headless preview session
    Run {
        /// Display surface width (defaults to the configured value)
        #[arg(long)]
        width: Option<u32>,

        /// Display surface height (defaults to the configured value)
        #[arg(long)]
        height: Option<u32>,

        /// Number of frames to render before exiting
        #[arg(short, long, default_value = "60")]
        frames: u32,
    },

    /// Print the GPU adapter the pipeline would use
    Probe,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    // Set RUST_LOG environment variable to control log level
    // Examples: RUST_LOG=debug, RUST_LOG=hdr_preview=debug, RUST_LOG=info
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(true)
        .with_level(true)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Run {
            width,
            height,
            frames,
        }) => cli::run_preview(width, height, frames),
        Some(Commands::Probe) => cli::probe_gpu(),
        None => cli::run_preview(None, None, 60),
    }
}
