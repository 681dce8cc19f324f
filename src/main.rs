//! Crate Digger - consolidates a music library and downloads it.
//!
//! Collects playlists, albums and liked songs into one deduplicated
//! collection, enriches it from MusicBrainz and mirrors it to local files.

use clap::{CommandFactory, Parser};
use crate_digger::cli;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

fn main() -> anyhow::Result<()> {
    let args = cli::Cli::parse();

    // Initialize logging
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(EnvFilter::from_default_env().add_directive("crate_digger=info".parse()?))
        .init();

    if !cli::run_command(&args)? {
        cli::Cli::command().print_help()?;
    }
    Ok(())
}
