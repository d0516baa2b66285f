//! Binary entrypoint for the `taskgen` CLI.

use std::process::ExitCode;

fn main() -> ExitCode {
    // Recording and replay are handled in commands::dispatch via
    // TASKGEN_RECORD=<dir> and TASKGEN_REPLAY=<dir>.
    match taskgen::run(std::env::args()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{err}");
            ExitCode::FAILURE
        }
    }
}
