use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use atlas_core::error::{AtlasError, Result};
use atlas_core::ingest::{Embedder, ProcessOptions, TextExtractor};
use atlas_core::records::{Document, DocumentCategory, Settings};
use atlas_core::store::ObjectStore;
use atlas_store::{sanitize_file_name, Repository};

use crate::embedding::{truncate_for_embedding, MAX_EMBEDDING_INPUT_CHARS};
use crate::ingestor::KnowledgeIngestor;

/// A file received by `POST /api/documents`, with its processing flags.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
    pub category: DocumentCategory,
    pub process: bool,
    pub vectorize: bool,
    pub knowledge_graph: bool,
    pub metadata: Option<serde_json::Value>,
}

impl UploadRequest {
    pub fn new(file_name: impl Into<String>, mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            mime_type: mime_type.into(),
            bytes,
            category: DocumentCategory::General,
            process: true,
            vectorize: true,
            knowledge_graph: true,
            metadata: None,
        }
    }
}

/// Stores uploaded files, runs the optional processing steps and writes the
/// document record. Every optional step is guarded on its own; a document
/// flag is only set when its step succeeded.
#[derive(Clone)]
pub struct DocumentUploadPipeline {
    documents: Repository<Document>,
    objects: Arc<dyn ObjectStore>,
    text: Arc<dyn TextExtractor>,
    ingestor: KnowledgeIngestor,
    embedder: Option<Arc<dyn Embedder>>,
    public_url: String,
}

fn validate(request: &UploadRequest, settings: &Settings) -> Result<()> {
    if request.file_name.trim().is_empty() {
        return Err(AtlasError::Validation("File name must not be empty".into()));
    }
    if request.bytes.is_empty() {
        return Err(AtlasError::Validation("Uploaded file is empty".into()));
    }
    if request.bytes.len() as u64 > settings.max_upload_bytes {
        return Err(AtlasError::Validation(format!(
            "File is {} bytes, the limit is {} bytes",
            request.bytes.len(),
            settings.max_upload_bytes
        )));
    }
    if !settings.allows_mime_type(&request.mime_type) {
        return Err(AtlasError::Validation(format!(
            "Unsupported file type: {}",
            request.mime_type
        )));
    }
    Ok(())
}

impl DocumentUploadPipeline {
    pub fn new(
        documents: Repository<Document>,
        objects: Arc<dyn ObjectStore>,
        text: Arc<dyn TextExtractor>,
        ingestor: KnowledgeIngestor,
        embedder: Option<Arc<dyn Embedder>>,
        public_url: impl Into<String>,
    ) -> Self {
        Self {
            documents,
            objects,
            text,
            ingestor,
            embedder,
            public_url: public_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn documents(&self) -> &Repository<Document> {
        &self.documents
    }

    pub async fn upload(&self, request: UploadRequest, settings: &Settings) -> Result<Document> {
        validate(&request, settings)?;

        let id = Uuid::new_v4().to_string();
        let name = request.file_name.trim().to_string();
        let storage_key = format!("documents/{id}/{}", sanitize_file_name(&name));
        let stored = self
            .objects
            .put(&storage_key, &request.bytes, &request.mime_type)
            .await?;

        let mut document = Document::new(
            name.clone(),
            request.mime_type.clone(),
            stored.size,
            stored.key.clone(),
            format!("{}/{id}/content", self.public_url),
        );
        document.id = id;
        document.category = request.category;
        if let Some(metadata) = request.metadata.clone() {
            document.metadata = metadata;
        }

        let text = if request.process {
            self.extract_text(&request, &mut document).await
        } else {
            None
        };

        if let Some(text) = text.as_deref() {
            if request.knowledge_graph {
                self.ingest(text, settings, &mut document).await;
            }
            if request.vectorize {
                self.vectorize(text, &mut document).await;
            }
        }

        match self.documents.create(document.clone()).await {
            Ok(saved) => {
                info!(
                    document_id = %saved.id,
                    name = %saved.name,
                    processed = saved.processed,
                    knowledge_graph = saved.knowledge_graph,
                    vector_embedding = saved.vector_embedding,
                    errors = saved.processing_errors.len(),
                    "Document uploaded"
                );
                Ok(saved)
            }
            Err(e) => {
                self.compensate(&document).await;
                Err(e)
            }
        }
    }

    async fn extract_text(&self, request: &UploadRequest, document: &mut Document) -> Option<String> {
        match self
            .text
            .extract_text(&request.file_name, &request.mime_type, &request.bytes)
            .await
        {
            Ok(Some(text)) => {
                document.processed = true;
                Some(text)
            }
            Ok(None) => {
                document
                    .processing_errors
                    .push(format!("No text extraction available for {}", request.mime_type));
                None
            }
            Err(e) => {
                warn!(name = %request.file_name, error = %e, "Text extraction failed");
                document.processing_errors.push(format!("Text extraction failed: {e}"));
                None
            }
        }
    }

    async fn ingest(&self, text: &str, settings: &Settings, document: &mut Document) {
        let metadata = serde_json::json!({
            "documentId": document.id,
            "category": document.category,
            "mimeType": document.mime_type,
        });
        match self
            .ingestor
            .process_document(text, &document.name, Some(metadata), ProcessOptions::from(settings))
            .await
        {
            Ok(outcome) => {
                document.knowledge_graph = true;
                document.knowledge_node_key = Some(outcome.document_key);
                document.chunk_count = outcome.chunk_keys.len();
                document.processing_errors.extend(
                    outcome
                        .extraction_errors
                        .into_iter()
                        .map(|e| format!("Entity extraction: {e}")),
                );
            }
            Err(e) => {
                warn!(document_id = %document.id, error = %e, "Knowledge graph ingestion failed");
                document
                    .processing_errors
                    .push(format!("Knowledge graph ingestion failed: {e}"));
            }
        }
    }

    async fn vectorize(&self, text: &str, document: &mut Document) {
        let Some(embedder) = &self.embedder else {
            document
                .processing_errors
                .push("Embedding service is not configured".to_string());
            return;
        };
        let input = vec![truncate_for_embedding(text, MAX_EMBEDDING_INPUT_CHARS).to_string()];
        match embedder.embed(&input).await {
            Ok(mut vectors) if !vectors.is_empty() => {
                document.vector_embedding = true;
                document.embedding = Some(vectors.remove(0));
            }
            Ok(_) => document
                .processing_errors
                .push("Embedding service returned no vector".to_string()),
            Err(e) => {
                warn!(document_id = %document.id, error = %e, "Embedding failed");
                document.processing_errors.push(format!("Embedding failed: {e}"));
            }
        }
    }

    /// Undo the writes made before a failed record insert.
    async fn compensate(&self, document: &Document) {
        warn!(document_id = %document.id, "Record write failed, removing stored object");
        if let Err(e) = self.objects.delete(&document.storage_key).await {
            warn!(key = %document.storage_key, error = %e, "Failed to remove orphaned object");
        }
        if let Some(key) = &document.knowledge_node_key {
            if let Err(e) = self.ingestor.remove_document(key).await {
                warn!(node_key = %key, error = %e, "Failed to remove orphaned graph nodes");
            }
        }
    }

    /// The record and the stored bytes.
    pub async fn content(&self, id: &str) -> Result<(Document, Vec<u8>)> {
        let document = self.documents.get(id).await?;
        let bytes = self.objects.get(&document.storage_key).await?.ok_or_else(|| {
            AtlasError::NotFound(format!("Stored content for document {id} not found"))
        })?;
        Ok((document, bytes))
    }

    /// Remove the record, the stored object and the graph nodes. Failures
    /// after the record is gone are logged only.
    pub async fn delete(&self, id: &str) -> Result<()> {
        let document = self.documents.get(id).await?;
        self.documents.delete(id).await?;

        if let Err(e) = self.objects.delete(&document.storage_key).await {
            warn!(document_id = %id, error = %e, "Failed to delete stored object");
        }
        if let Some(key) = &document.knowledge_node_key {
            match self.ingestor.remove_document(key).await {
                Ok(_) => {}
                Err(e) if e.is_not_found() => {}
                Err(e) => warn!(document_id = %id, error = %e, "Failed to remove graph nodes"),
            }
        }
        info!(document_id = %id, "Document deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use atlas_core::graph::{NodeQuery, NodeTypeCount};
    use atlas_core::knowledge::{
        ConnectedNode, Direction, EdgeType, KnowledgeEdge, KnowledgeNode, NodeType, NodeUpdate,
    };
    use atlas_core::store::RecordStore;
    use atlas_core::GraphStore;
    use atlas_graph::{InMemoryGraphStore, KnowledgeService};
    use atlas_store::{InMemoryObjectStore, InMemoryRecordStore};

    use crate::text::PlainTextExtractor;

    struct FakeEmbedder {
        fail: bool,
    }

    #[async_trait]
    impl Embedder for FakeEmbedder {
        fn model(&self) -> &str {
            "fake"
        }

        async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>> {
            if self.fail {
                return Err(AtlasError::Embedding("service down".into()));
            }
            Ok(inputs.iter().map(|s| vec![s.len() as f32]).collect())
        }
    }

    /// Record store whose inserts always fail.
    struct BrokenRecords;

    #[async_trait]
    impl RecordStore for BrokenRecords {
        async fn insert(&self, _: &str, _: &str, _: serde_json::Value) -> Result<serde_json::Value> {
            Err(AtlasError::Store("database offline".into()))
        }
        async fn get(&self, _: &str, _: &str) -> Result<Option<serde_json::Value>> {
            Ok(None)
        }
        async fn list(&self, _: &str) -> Result<Vec<serde_json::Value>> {
            Ok(vec![])
        }
        async fn replace(
            &self,
            _: &str,
            _: &str,
            _: serde_json::Value,
        ) -> Result<Option<serde_json::Value>> {
            Ok(None)
        }
        async fn delete(&self, _: &str, _: &str) -> Result<bool> {
            Ok(false)
        }
        async fn ping(&self) -> Result<()> {
            Err(AtlasError::Store("database offline".into()))
        }
    }

    /// Graph store that is unreachable for every call.
    struct OfflineGraph;

    fn graph_down<T>() -> Result<T> {
        Err(AtlasError::Graph("connection refused".into()))
    }

    #[async_trait]
    impl GraphStore for OfflineGraph {
        async fn get_nodes(&self, _: &NodeQuery) -> Result<Vec<KnowledgeNode>> {
            graph_down()
        }
        async fn get_node(&self, _: &str) -> Result<Option<KnowledgeNode>> {
            graph_down()
        }
        async fn find_node_by_name(&self, _: &str, _: Option<NodeType>) -> Result<Option<KnowledgeNode>> {
            graph_down()
        }
        async fn upsert_node(&self, _: &KnowledgeNode) -> Result<KnowledgeNode> {
            graph_down()
        }
        async fn update_node(&self, _: &str, _: NodeUpdate) -> Result<Option<KnowledgeNode>> {
            graph_down()
        }
        async fn delete_node(&self, _: &str) -> Result<bool> {
            graph_down()
        }
        async fn insert_edge(&self, _: &KnowledgeEdge) -> Result<KnowledgeEdge> {
            graph_down()
        }
        async fn delete_edge(&self, _: &str) -> Result<bool> {
            graph_down()
        }
        async fn connected_nodes(
            &self,
            _: &str,
            _: Option<EdgeType>,
            _: Direction,
        ) -> Result<Vec<ConnectedNode>> {
            graph_down()
        }
        async fn node_count(&self) -> Result<u64> {
            graph_down()
        }
        async fn edge_count(&self) -> Result<u64> {
            graph_down()
        }
        async fn node_type_counts(&self) -> Result<Vec<NodeTypeCount>> {
            graph_down()
        }
    }

    struct Fixture {
        pipeline: DocumentUploadPipeline,
        objects: Arc<InMemoryObjectStore>,
        knowledge: KnowledgeService,
    }

    fn fixture(records: Arc<dyn RecordStore>, embedder: Option<Arc<dyn Embedder>>) -> Fixture {
        fixture_with_graph(records, embedder, Arc::new(InMemoryGraphStore::new()))
    }

    fn fixture_with_graph(
        records: Arc<dyn RecordStore>,
        embedder: Option<Arc<dyn Embedder>>,
        graph: Arc<dyn GraphStore>,
    ) -> Fixture {
        let objects = Arc::new(InMemoryObjectStore::new());
        let knowledge = KnowledgeService::new(graph);
        let pipeline = DocumentUploadPipeline::new(
            Repository::new(records),
            objects.clone(),
            Arc::new(PlainTextExtractor),
            KnowledgeIngestor::new(knowledge.clone(), None),
            embedder,
            "/api/documents",
        );
        Fixture {
            pipeline,
            objects,
            knowledge,
        }
    }

    fn memory_fixture() -> Fixture {
        fixture(
            Arc::new(InMemoryRecordStore::new()),
            Some(Arc::new(FakeEmbedder { fail: false })),
        )
    }

    #[tokio::test]
    async fn successful_upload_sets_every_flag() {
        let f = memory_fixture();
        let doc = f
            .pipeline
            .upload(
                UploadRequest::new("notes.txt", "text/plain", b"Quarterly numbers".to_vec()),
                &Settings::default(),
            )
            .await
            .unwrap();

        assert!(doc.processed);
        assert!(doc.knowledge_graph);
        assert!(doc.vector_embedding);
        assert_eq!(doc.chunk_count, 1);
        assert!(doc.processing_errors.is_empty());
        assert_eq!(doc.url, format!("/api/documents/{}/content", doc.id));
        assert!(doc.storage_key.starts_with(&format!("documents/{}/", doc.id)));
        assert_eq!(f.objects.len().await, 1);
        assert!(f.pipeline.documents().get(&doc.id).await.is_ok());
    }

    #[tokio::test]
    async fn failing_step_leaves_its_flag_false() {
        let f = fixture(
            Arc::new(InMemoryRecordStore::new()),
            Some(Arc::new(FakeEmbedder { fail: true })),
        );
        let doc = f
            .pipeline
            .upload(
                UploadRequest::new("notes.txt", "text/plain", b"hello".to_vec()),
                &Settings::default(),
            )
            .await
            .unwrap();

        assert!(doc.knowledge_graph);
        assert!(!doc.vector_embedding);
        assert_eq!(doc.processing_errors.len(), 1);
        assert!(doc.processing_errors[0].contains("Embedding failed"));
    }

    #[tokio::test]
    async fn graph_outage_still_writes_the_record() {
        let f = fixture_with_graph(
            Arc::new(InMemoryRecordStore::new()),
            Some(Arc::new(FakeEmbedder { fail: false })),
            Arc::new(OfflineGraph),
        );
        let doc = f
            .pipeline
            .upload(
                UploadRequest::new("notes.txt", "text/plain", b"Quarterly numbers".to_vec()),
                &Settings::default(),
            )
            .await
            .unwrap();

        assert!(doc.processed);
        assert!(!doc.knowledge_graph);
        assert!(doc.knowledge_node_key.is_none());
        assert_eq!(doc.chunk_count, 0);
        assert!(doc.vector_embedding);
        assert_eq!(doc.processing_errors.len(), 1);
        assert!(doc.processing_errors[0].starts_with("Knowledge graph ingestion failed"));

        let stored = f.pipeline.documents().get(&doc.id).await.unwrap();
        assert!(!stored.knowledge_graph);
        assert_eq!(stored.processing_errors, doc.processing_errors);
        assert_eq!(f.objects.len().await, 1);
    }

    #[tokio::test]
    async fn unextractable_file_is_stored_but_not_processed() {
        let f = memory_fixture();
        let doc = f
            .pipeline
            .upload(
                UploadRequest::new("scan.pdf", "application/pdf", b"%PDF-1.7".to_vec()),
                &Settings::default(),
            )
            .await
            .unwrap();

        assert!(!doc.processed);
        assert!(!doc.knowledge_graph);
        assert!(!doc.vector_embedding);
        assert_eq!(doc.processing_errors.len(), 1);
        assert_eq!(f.objects.len().await, 1);
    }

    #[tokio::test]
    async fn disabled_steps_are_skipped_silently() {
        let f = memory_fixture();
        let mut request = UploadRequest::new("notes.txt", "text/plain", b"hello".to_vec());
        request.knowledge_graph = false;
        request.vectorize = false;
        let doc = f.pipeline.upload(request, &Settings::default()).await.unwrap();

        assert!(doc.processed);
        assert!(!doc.knowledge_graph);
        assert!(doc.processing_errors.is_empty());
        assert_eq!(f.knowledge.stats().await.unwrap().node_count, 0);
    }

    #[tokio::test]
    async fn validation_rejects_before_storing() {
        let f = memory_fixture();
        let settings = Settings {
            max_upload_bytes: 4,
            ..Settings::default()
        };

        let too_big = UploadRequest::new("a.txt", "text/plain", b"12345".to_vec());
        let empty = UploadRequest::new("a.txt", "text/plain", Vec::new());
        let wrong_type = UploadRequest::new("a.png", "image/png", b"png".to_vec());

        for request in [too_big, empty, wrong_type] {
            let err = f.pipeline.upload(request, &settings).await.unwrap_err();
            assert!(matches!(err, AtlasError::Validation(_)));
        }
        assert!(f.objects.is_empty().await);
    }

    #[tokio::test]
    async fn failed_record_write_removes_stored_object() {
        let f = fixture(Arc::new(BrokenRecords), None);
        let err = f
            .pipeline
            .upload(
                UploadRequest::new("notes.txt", "text/plain", b"hello".to_vec()),
                &Settings::default(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, AtlasError::Store(_)));
        assert!(f.objects.is_empty().await);
        assert_eq!(f.knowledge.stats().await.unwrap().node_count, 0);
    }

    #[tokio::test]
    async fn delete_removes_record_object_and_graph_nodes() {
        let f = memory_fixture();
        let doc = f
            .pipeline
            .upload(
                UploadRequest::new("notes.txt", "text/plain", b"hello world".to_vec()),
                &Settings::default(),
            )
            .await
            .unwrap();

        let (_, bytes) = f.pipeline.content(&doc.id).await.unwrap();
        assert_eq!(bytes, b"hello world");

        f.pipeline.delete(&doc.id).await.unwrap();
        assert!(f.objects.is_empty().await);
        assert_eq!(f.knowledge.stats().await.unwrap().node_count, 0);
        assert!(f.pipeline.delete(&doc.id).await.unwrap_err().is_not_found());
    }
}
