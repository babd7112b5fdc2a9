use async_trait::async_trait;

use crate::error::Result;
use crate::knowledge::ExtractedKnowledge;

/// Pulls entities and relations out of free text.
#[async_trait]
pub trait EntityExtractor: Send + Sync {
    async fn extract(&self, text: &str, context: &str) -> Result<ExtractedKnowledge>;
}

/// Turns text into embedding vectors, one per input, in input order.
#[async_trait]
pub trait Embedder: Send + Sync {
    fn model(&self) -> &str;
    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Turns uploaded bytes into plain text.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    /// Returns Ok(None) when the MIME type is not supported.
    async fn extract_text(&self, name: &str, mime_type: &str, bytes: &[u8])
        -> Result<Option<String>>;
}

/// Options for splitting and ingesting a document into the knowledge graph.
#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProcessOptions {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub max_chunks: usize,
    pub extract_entities: bool,
}

impl Default for ProcessOptions {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
            max_chunks: 100,
            extract_entities: false,
        }
    }
}

impl From<&crate::records::Settings> for ProcessOptions {
    fn from(settings: &crate::records::Settings) -> Self {
        Self {
            chunk_size: settings.chunk_size,
            chunk_overlap: settings.chunk_overlap,
            max_chunks: settings.max_chunks,
            extract_entities: settings.extract_entities,
        }
    }
}

/// What a document ingestion wrote to the graph.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessOutcome {
    pub document_key: String,
    pub chunk_keys: Vec<String>,
    pub entity_keys: Vec<String>,
    pub edge_count: usize,
    /// Chunks dropped because the input exceeded `max_chunks`.
    pub truncated: bool,
    pub extraction_errors: Vec<String>,
}
