//! Command-line interface for debate-forge.
//!
//! Provides the `run` command, which drives a debate and streams its
//! events as JSON lines.

mod commands;

pub use commands::{parse_cli, run_with_cli, Cli, Commands, RunArgs};
