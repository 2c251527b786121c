//! Binary crate for the `weather-relay` services.
//!
//! This crate focuses on:
//! - Parsing CLI arguments
//! - Resolving configuration and failing fast when it is incomplete
//! - Process lifecycle: logging, signals, exit status

use clap::Parser;

mod cli;
mod logging;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();
    let cmd = cli::Cli::parse();
    cmd.run().await
}
