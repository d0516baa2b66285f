//! Core library for the `taskgen` CLI.
//!
//! `taskgen` asks a language model for new benchmark tasks, grounds each
//! request on similar existing tasks, and keeps only candidates that pass a
//! three-stage verifier. Failed candidates are remembered and shown to the
//! model on later attempts.

pub mod adapters;
pub mod cassette;
pub mod cli;
pub mod commands;
pub mod config;
pub mod context;
pub mod corpus;
pub mod error;
pub mod generate;
pub mod memory;
pub mod ports;
pub mod source;
pub mod verify;

#[cfg(test)]
mod testing;

use clap::error::ErrorKind;
use clap::Parser;
use tracing_subscriber::EnvFilter;

/// Variable holding a `tracing` filter directive, e.g. `taskgen=debug`.
pub const LOG_ENV: &str = "TASKGEN_LOG";

/// Installs the stderr log subscriber. `TASKGEN_LOG` wins over `verbose`.
/// Does nothing if a subscriber is already installed.
pub fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .try_init();
}

/// Run the CLI with the provided arguments.
///
/// # Errors
///
/// Returns an error string when argument parsing fails or command execution
/// fails. `--help` and `--version` print and succeed.
pub fn run<I, T>(args: I) -> Result<(), String>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    let cli = match cli::Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(err) if matches!(err.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            print!("{err}");
            return Ok(());
        }
        Err(err) => return Err(err.to_string()),
    };
    init_logging(cli.verbose);
    commands::dispatch(&cli.command)
}
