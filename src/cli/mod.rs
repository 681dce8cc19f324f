//! Command-line interface for crate-digger.
//!
//! Each subcommand loads the configuration, builds an
//! [`crate::context::AppContext`] and drives one core operation.

mod commands;

pub use commands::{Cli, Commands, DownloadTarget, run_command};
