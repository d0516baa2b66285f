//! Recording adapter for the `LlmClient` port.

use std::sync::Arc;

use super::record_result;
use crate::cassette::session::SharedRecorder;
use crate::ports::{CompletionFuture, CompletionRequest, LlmClient};

/// Records completions while delegating to an inner client.
pub struct RecordingLlmClient {
    inner: Box<dyn LlmClient>,
    recorder: SharedRecorder,
}

impl RecordingLlmClient {
    /// Wraps `inner`, writing into `recorder`.
    pub fn new(inner: Box<dyn LlmClient>, recorder: SharedRecorder) -> Self {
        Self { inner, recorder }
    }
}

impl LlmClient for RecordingLlmClient {
    fn complete(&self, request: &CompletionRequest) -> CompletionFuture<'_> {
        let request = request.clone();
        let recorder = Arc::clone(&self.recorder);

        Box::pin(async move {
            let result = self.inner.complete(&request).await;
            record_result(&recorder, "llm", "complete", &request, &result);
            result
        })
    }
}
