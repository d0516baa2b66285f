//! Command dispatch and handlers.

pub mod corpus;
pub mod failures;
pub mod generate;
pub mod verify;

use std::env;
use std::path::PathBuf;

use crate::cassette::session::RecordingSession;
use crate::cli::Command;
use crate::config::{self, Settings};
use crate::context::ServiceContext;

fn env_dir(name: &str) -> Option<PathBuf> {
    env::var(name).ok().filter(|v| !v.is_empty()).map(PathBuf::from)
}

/// Dispatch a parsed command to its handler.
///
/// When `TASKGEN_RECORD` names a directory, LLM, filesystem, and clock
/// interactions are recorded to per-port cassettes there. When
/// `TASKGEN_REPLAY` names one, those ports are served from its cassettes.
///
/// # Errors
///
/// Returns an error string if configuration cannot be loaded or the selected
/// command fails.
pub fn dispatch(command: &Command) -> Result<(), String> {
    let settings = config::load().map_err(|e| e.to_string())?;

    let (ctx, session) = if let Some(dir) = env_dir("TASKGEN_RECORD") {
        let (ctx, session) = ServiceContext::recording_at(&settings, &dir)?;
        (ctx, Some(session))
    } else if let Some(dir) = env_dir("TASKGEN_REPLAY") {
        (ServiceContext::replaying(&settings, &dir)?, None)
    } else {
        (ServiceContext::live(&settings), None)
    };

    let result = dispatch_with_context(command, &ctx, &settings);

    // Finish recording even when the command failed.
    if let Some(session) = session {
        drop(ctx);
        finish_recording(session)?;
    }

    result
}

/// Dispatch a command with the given service context.
///
/// # Errors
///
/// Returns an error string if the command fails.
pub fn dispatch_with_context(
    command: &Command,
    ctx: &ServiceContext,
    settings: &Settings,
) -> Result<(), String> {
    match command {
        Command::Generate(args) => generate::run(ctx, settings, args),
        Command::Verify {
            file,
            record_failure,
        } => verify::run(ctx, settings, file, *record_failure),
        Command::Corpus => corpus::run(ctx, settings),
        Command::Failures { clear } => failures::run(ctx, settings, *clear),
    }
}

fn finish_recording(session: RecordingSession) -> Result<(), String> {
    let output_dir = session.finish()?;
    eprintln!("Recording saved to: {}", output_dir.display());
    Ok(())
}
