//! Recording adapter for the `Embedder` port.

use std::sync::Arc;

use super::record_result;
use crate::cassette::session::SharedRecorder;
use crate::ports::{Embedder, EmbeddingFuture, EmbeddingRequest};

/// Records embedding calls while delegating to an inner embedder.
pub struct RecordingEmbedder {
    inner: Box<dyn Embedder>,
    recorder: SharedRecorder,
}

impl RecordingEmbedder {
    /// Wraps `inner`, writing into `recorder`.
    pub fn new(inner: Box<dyn Embedder>, recorder: SharedRecorder) -> Self {
        Self { inner, recorder }
    }
}

impl Embedder for RecordingEmbedder {
    fn embed(&self, request: &EmbeddingRequest) -> EmbeddingFuture<'_> {
        let request = request.clone();
        let recorder = Arc::clone(&self.recorder);

        Box::pin(async move {
            let result = self.inner.embed(&request).await;
            record_result(&recorder, "embeddings", "embed", &request, &result);
            result
        })
    }
}
