//! Replaying adapter for the `Embedder` port.

use super::{next_output, replay_result};
use crate::cassette::config::SharedReplayer;
use crate::ports::{Embedder, EmbeddingFuture, EmbeddingRequest, EmbeddingResponse};

/// Serves recorded embeddings in order, ignoring the request.
pub struct ReplayingEmbedder {
    replayer: Option<SharedReplayer>,
}

impl ReplayingEmbedder {
    /// Creates an embedder backed by `replayer`.
    #[must_use]
    pub fn new(replayer: SharedReplayer) -> Self {
        Self {
            replayer: Some(replayer),
        }
    }

    /// Creates an embedder with no cassette. Panics when called.
    #[must_use]
    pub fn unconfigured() -> Self {
        Self { replayer: None }
    }
}

impl Embedder for ReplayingEmbedder {
    fn embed(&self, _request: &EmbeddingRequest) -> EmbeddingFuture<'_> {
        let output = next_output(self.replayer.as_ref(), "embeddings", "embed");
        Box::pin(async move { replay_result::<EmbeddingResponse>(output) })
    }
}
