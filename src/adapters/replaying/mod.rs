//! Replaying adapters serving recorded interactions from cassettes.
//!
//! An adapter built with `unconfigured()` has no cassette and panics on the
//! first call, naming the port, so a test that touches a boundary it did not
//! script fails loudly.

pub mod clock;
pub mod embedder;
pub mod filesystem;
pub mod llm;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::cassette::config::SharedReplayer;
use crate::ports::BoxError;

pub use clock::ReplayingClock;
pub use embedder::ReplayingEmbedder;
pub use filesystem::ReplayingFileSystem;
pub use llm::ReplayingLlmClient;

/// Takes the next recorded output for `port::method`.
///
/// # Panics
///
/// Panics if no cassette is configured for the port or the cassette has no
/// further interaction for the method.
pub(crate) fn next_output(replayer: Option<&SharedReplayer>, port: &str, method: &str) -> Value {
    let replayer = replayer.unwrap_or_else(|| {
        panic!(
            "{port} port not configured in CassetteConfig; \
             no cassette loaded for {port}::{method}"
        )
    });
    let mut guard = replayer.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    guard.next_interaction(port, method).output
}

/// Decodes a recorded `{"ok": ..}` / `{"err": ".."}` output.
///
/// # Errors
///
/// Returns the recorded error message, or a decoding error if the output does
/// not have the expected shape.
pub(crate) fn replay_result<T: DeserializeOwned>(output: Value) -> Result<T, BoxError> {
    let mut object = match output {
        Value::Object(object) => object,
        other => return Err(format!("recorded output is not an ok/err object: {other}").into()),
    };
    if let Some(err) = object.remove("err") {
        return Err(err.as_str().map_or_else(|| err.to_string(), str::to_string).into());
    }
    let value = object.remove("ok").ok_or("recorded output has neither `ok` nor `err`")?;
    serde_json::from_value(value)
        .map_err(|e| format!("failed to decode recorded output: {e}").into())
}
