//! Recording adapters: delegate to a live port and log every call into a
//! cassette using the same `ok`/`err` shape the replaying adapters read.

pub mod clock;
pub mod embedder;
pub mod filesystem;
pub mod llm;

use serde::Serialize;
use serde_json::{json, Value};
use tracing::warn;

use crate::cassette::session::SharedRecorder;

pub use clock::RecordingClock;
pub use embedder::RecordingEmbedder;
pub use filesystem::RecordingFileSystem;
pub use llm::RecordingLlmClient;

fn to_value<T: Serialize>(value: &T, what: &str, port: &str, method: &str) -> Option<Value> {
    serde_json::to_value(value)
        .map_err(|e| {
            warn!(
                port,
                method,
                error = %e,
                "failed to serialize recorded {what}; call not recorded"
            );
        })
        .ok()
}

fn push(recorder: &SharedRecorder, port: &str, method: &str, input: Value, output: Value) {
    let mut guard = recorder.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    guard.record(port, method, input, output);
}

/// Records a call whose return value is infallible.
pub(crate) fn record_interaction<I, O>(
    recorder: &SharedRecorder,
    port: &str,
    method: &str,
    input: &I,
    output: &O,
) where
    I: Serialize,
    O: Serialize,
{
    let (Some(input), Some(output)) =
        (to_value(input, "input", port, method), to_value(output, "output", port, method))
    else {
        return;
    };
    push(recorder, port, method, input, output);
}

/// Records a fallible call as `{"ok": value}` or `{"err": message}`.
pub(crate) fn record_result<T, E, I>(
    recorder: &SharedRecorder,
    port: &str,
    method: &str,
    input: &I,
    result: &Result<T, E>,
) where
    T: Serialize,
    E: std::fmt::Display,
    I: Serialize,
{
    let Some(input) = to_value(input, "input", port, method) else { return };
    let output = match result {
        Ok(value) => match to_value(value, "output", port, method) {
            Some(value) => json!({ "ok": value }),
            None => return,
        },
        Err(e) => json!({ "err": e.to_string() }),
    };
    push(recorder, port, method, input, output);
}
