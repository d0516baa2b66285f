//! Embedding port: dense vectors for retrieval.

use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};

use super::BoxError;

/// Boxed future returned by [`Embedder::embed`].
pub type EmbeddingFuture<'a> =
    Pin<Box<dyn Future<Output = Result<EmbeddingResponse, BoxError>> + Send + 'a>>;

/// Texts to embed with one model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingRequest {
    /// Embedding model identifier, e.g. `"text-embedding-3-small"`.
    pub model: String,
    /// Texts to embed, in order.
    pub input: Vec<String>,
}

/// One vector per input text, in input order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingResponse {
    /// The embeddings.
    pub vectors: Vec<Vec<f32>>,
}

/// Turns text into embedding vectors.
pub trait Embedder: Send + Sync {
    /// Embeds every text in `request`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend call fails.
    fn embed(&self, request: &EmbeddingRequest) -> EmbeddingFuture<'_>;
}
