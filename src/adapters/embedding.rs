//! Dense retrieval: embed the corpus once, rank by cosine similarity.

use std::sync::Arc;

use tracing::{debug, info};

use crate::corpus::TaskDocument;
use crate::ports::{
    BoxError, Embedder, EmbeddingRequest, IndexFuture, RetrievalFuture, RetrievalIndex, Retriever,
};

/// Builds [`EmbeddingIndex`]es through an [`Embedder`].
pub struct EmbeddingRetriever {
    embedder: Arc<dyn Embedder>,
    model: String,
}

impl EmbeddingRetriever {
    /// Retrieves with vectors from `embedder` using `model`.
    pub fn new(embedder: Box<dyn Embedder>, model: impl Into<String>) -> Self {
        Self {
            embedder: Arc::from(embedder),
            model: model.into(),
        }
    }
}

async fn embed(
    embedder: &dyn Embedder,
    model: &str,
    input: Vec<String>,
) -> Result<Vec<Vec<f32>>, BoxError> {
    let expected = input.len();
    let request = EmbeddingRequest {
        model: model.to_string(),
        input,
    };
    let response = embedder.embed(&request).await?;
    if response.vectors.len() != expected {
        return Err(format!(
            "embedding backend returned {} vectors for {expected} texts",
            response.vectors.len()
        )
        .into());
    }
    Ok(response.vectors)
}

impl Retriever for EmbeddingRetriever {
    fn build_index<'a>(&'a self, documents: &'a [TaskDocument]) -> IndexFuture<'a> {
        Box::pin(async move {
            let vectors = if documents.is_empty() {
                Vec::new()
            } else {
                let texts = documents.iter().map(|d| d.text.clone()).collect();
                embed(self.embedder.as_ref(), &self.model, texts).await?
            };
            info!(documents = documents.len(), model = %self.model, "embedded corpus");
            let index: Box<dyn RetrievalIndex> = Box::new(EmbeddingIndex {
                embedder: Arc::clone(&self.embedder),
                model: self.model.clone(),
                documents: documents.to_vec(),
                vectors,
            });
            Ok(index)
        })
    }
}

/// Corpus vectors for one session. Queries are embedded on demand.
pub struct EmbeddingIndex {
    embedder: Arc<dyn Embedder>,
    model: String,
    documents: Vec<TaskDocument>,
    vectors: Vec<Vec<f32>>,
}

impl RetrievalIndex for EmbeddingIndex {
    fn retrieve<'a>(&'a self, query: &'a str, k: usize) -> RetrievalFuture<'a> {
        Box::pin(async move {
            if k == 0 || self.documents.is_empty() {
                return Ok(Vec::new());
            }
            let input = vec![query.to_string()];
            let query_vector = embed(self.embedder.as_ref(), &self.model, input)
                .await?
                .pop()
                .unwrap_or_default();
            let ranked = rank(&query_vector, &self.vectors, k);
            debug!(k, hits = ranked.len(), "ranked corpus by cosine similarity");
            Ok(ranked.into_iter().map(|i| self.documents[i].clone()).collect())
        })
    }
}

/// Indices of the `k` vectors closest to `query`. Ties keep corpus order.
fn rank(query: &[f32], vectors: &[Vec<f32>], k: usize) -> Vec<usize> {
    let mut scored: Vec<(usize, f64)> = vectors
        .iter()
        .enumerate()
        .map(|(i, v)| (i, cosine(query, v)))
        .collect();
    scored.sort_by(|a, b| b.1.total_cmp(&a.1));
    scored.into_iter().take(k).map(|(i, _)| i).collect()
}

fn cosine(a: &[f32], b: &[f32]) -> f64 {
    let (mut dot, mut norm_a, mut norm_b) = (0.0_f64, 0.0_f64, 0.0_f64);
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (f64::from(*x), f64::from(*y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}
