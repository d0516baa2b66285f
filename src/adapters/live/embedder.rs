//! Live adapter for the `Embedder` port using an OpenAI-compatible
//! `/embeddings` endpoint.

use std::env;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::LlmSettings;
use crate::ports::{BoxError, Embedder, EmbeddingFuture, EmbeddingRequest, EmbeddingResponse};

/// Texts sent per HTTP request.
const MAX_BATCH_SIZE: usize = 2048;

/// Embedding client sharing the chat endpoint's base URL and API key.
pub struct LiveEmbedder {
    client: Client,
    base_url: String,
    api_key_env: String,
}

impl LiveEmbedder {
    /// Creates a client for `settings.base_url`.
    #[must_use]
    pub fn new(settings: &LlmSettings) -> Self {
        Self {
            client: Client::new(),
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            api_key_env: settings.api_key_env.clone(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/embeddings", self.base_url)
    }

    async fn embed_batch(
        &self,
        api_key: &str,
        model: &str,
        input: &[String],
    ) -> Result<Vec<Vec<f32>>, BoxError> {
        let body = EmbeddingsBody { model, input };
        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| format!("Embedding request failed: {e}"))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| format!("Failed to read embedding response: {e}"))?;
        if !status.is_success() {
            return Err(format!("Embedding API error ({}): {text}", status.as_u16()).into());
        }
        parse_response(&text)
    }
}

#[derive(Serialize)]
struct EmbeddingsBody<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingsReply {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

/// Vectors in input order; the API may return them shuffled.
fn parse_response(body: &str) -> Result<Vec<Vec<f32>>, BoxError> {
    let mut reply: EmbeddingsReply = serde_json::from_str(body)
        .map_err(|e| format!("Failed to parse embedding response: {e}"))?;
    reply.data.sort_by_key(|d| d.index);
    Ok(reply.data.into_iter().map(|d| d.embedding).collect())
}

impl Embedder for LiveEmbedder {
    fn embed(&self, request: &EmbeddingRequest) -> EmbeddingFuture<'_> {
        let request = request.clone();

        Box::pin(async move {
            let api_key = env::var(&self.api_key_env)
                .map_err(|_| format!("{} environment variable not set", self.api_key_env))?;
            debug!(model = %request.model, texts = request.input.len(), "requesting embeddings");

            let mut vectors = Vec::with_capacity(request.input.len());
            for chunk in request.input.chunks(MAX_BATCH_SIZE) {
                vectors.extend(self.embed_batch(&api_key, &request.model, chunk).await?);
            }
            Ok(EmbeddingResponse { vectors })
        })
    }
}
