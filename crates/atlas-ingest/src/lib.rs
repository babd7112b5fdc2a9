pub mod chunker;
pub mod embedding;
pub mod extractor;
pub mod ingestor;
pub mod text;
pub mod upload;

pub use chunker::{chunk_count, split_into_chunks, Chunks};
pub use embedding::HttpEmbeddingClient;
pub use extractor::LlmEntityExtractor;
pub use ingestor::KnowledgeIngestor;
pub use text::{DocumentTextExtractor, HttpDocumentProcessor, PlainTextExtractor};
pub use upload::{DocumentUploadPipeline, UploadRequest};
