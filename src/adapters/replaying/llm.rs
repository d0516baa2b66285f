//! Replaying adapter for the `LlmClient` port.

use super::{next_output, replay_result};
use crate::cassette::config::SharedReplayer;
use crate::ports::{CompletionFuture, CompletionRequest, CompletionResponse, LlmClient};

/// Serves recorded completions in order, ignoring the request.
pub struct ReplayingLlmClient {
    replayer: Option<SharedReplayer>,
}

impl ReplayingLlmClient {
    /// Creates a client backed by `replayer`.
    #[must_use]
    pub fn new(replayer: SharedReplayer) -> Self {
        Self {
            replayer: Some(replayer),
        }
    }

    /// Creates a client with no cassette. Panics when called.
    #[must_use]
    pub fn unconfigured() -> Self {
        Self { replayer: None }
    }
}

impl LlmClient for ReplayingLlmClient {
    fn complete(&self, _request: &CompletionRequest) -> CompletionFuture<'_> {
        let output = next_output(self.replayer.as_ref(), "llm", "complete");
        Box::pin(async move { replay_result::<CompletionResponse>(output) })
    }
}
