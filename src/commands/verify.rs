//! `taskgen verify` command.

use std::path::Path;

use tracing::warn;

use crate::config::Settings;
use crate::context::ServiceContext;
use crate::memory::{FailureRecord, FailureStore};
use crate::source;
use crate::verify::{Verdict, Verifier};

/// Execute the `verify` command.
///
/// Prints the verdict. With `record_failure`, a failing verdict is appended
/// to the failure store under the file's declared `task_name` (or its stem).
///
/// # Errors
///
/// Returns an error string if the file cannot be read or verification fails.
pub fn run(
    ctx: &ServiceContext,
    settings: &Settings,
    file: &Path,
    record_failure: bool,
) -> Result<(), String> {
    let code = ctx
        .fs
        .read_to_string(file)
        .map_err(|e| format!("Failed to read task file {}: {e}", file.display()))?;

    let verdict = Verifier::from_context(ctx)
        .with_env_config(settings.env.clone())
        .verify(&code);
    let Verdict::Fail { stage, message } = verdict else {
        println!("Verification: PASSED");
        return Ok(());
    };
    println!("Verification: FAILED at {stage}");
    println!("{message}");

    if record_failure {
        let stem = file
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let task_name = source::task_name_literal(&code).unwrap_or(stem.as_str());
        let store = FailureStore::new(ctx, &settings.failure_store());
        let record =
            FailureRecord::new(task_name, stage, &message, &code).recorded_at(ctx.clock.now());
        match store.append(record) {
            Ok(()) => println!("Recorded failure in {}", store.path().display()),
            Err(e) => warn!(error = %e, "could not record failure"),
        }
    }
    Err(format!("{} failed verification at {stage}", file.display()))
}
