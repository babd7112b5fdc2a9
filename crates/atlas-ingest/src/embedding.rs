use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use atlas_core::config::AppConfig;
use atlas_core::error::{AtlasError, Result};
use atlas_core::ingest::Embedder;

/// Longest input sent to the embedding service, in characters.
pub const MAX_EMBEDDING_INPUT_CHARS: usize = 8000;

/// Client for an OpenAI-compatible `/embeddings` endpoint.
pub struct HttpEmbeddingClient {
    client: reqwest::Client,
    url: String,
    api_key: String,
    model: String,
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

/// Truncate to at most `max_chars` characters on a char boundary.
pub fn truncate_for_embedding(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}

fn order_embeddings(mut data: Vec<EmbeddingData>, expected: usize) -> Result<Vec<Vec<f32>>> {
    if data.len() != expected {
        return Err(AtlasError::Embedding(format!(
            "Expected {expected} embeddings, got {}",
            data.len()
        )));
    }
    data.sort_by_key(|d| d.index);
    Ok(data.into_iter().map(|d| d.embedding).collect())
}

impl HttpEmbeddingClient {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: config.embedding_api_url.clone(),
            api_key: config.embedding_api_key.clone(),
            model: config.embedding_model.clone(),
        }
    }
}

#[async_trait]
impl Embedder for HttpEmbeddingClient {
    fn model(&self) -> &str {
        &self.model
    }

    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }

        tracing::debug!(model = %self.model, inputs = inputs.len(), "Requesting embeddings");

        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&EmbeddingRequest {
                model: &self.model,
                input: inputs,
            })
            .send()
            .await
            .map_err(|e| AtlasError::Embedding(format!("HTTP request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<failed to read body>".to_string());
            return Err(AtlasError::Embedding(format!(
                "Embedding service returned status {status}: {body}"
            )));
        }

        let parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| AtlasError::Embedding(format!("Failed to parse response: {e}")))?;

        order_embeddings(parsed.data, inputs.len())
    }
}
