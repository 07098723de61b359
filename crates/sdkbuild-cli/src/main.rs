//! sdkbuild CLI

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use sdkbuild_cli::Cli;
use sdkbuild_cli::cmd;

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    cmd::build::build(&cli)
}
