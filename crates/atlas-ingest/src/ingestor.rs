use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info, warn};

use atlas_core::error::{AtlasError, Result};
use atlas_core::ingest::{EntityExtractor, ProcessOptions, ProcessOutcome};
use atlas_core::knowledge::{
    Direction, EdgeType, ExtractedKnowledge, KnowledgeEdge, KnowledgeNode, NodeType,
};
use atlas_graph::KnowledgeService;

use crate::chunker::split_into_chunks;

/// Writes documents into the knowledge graph as a document node, its
/// chunks and, optionally, the entities the chunks mention.
#[derive(Clone)]
pub struct KnowledgeIngestor {
    knowledge: KnowledgeService,
    extractor: Option<Arc<dyn EntityExtractor>>,
}

fn with_fields(metadata: Option<serde_json::Value>, fields: serde_json::Value) -> serde_json::Value {
    let mut merged = match metadata {
        Some(serde_json::Value::Object(map)) => map,
        Some(other) => {
            let mut map = serde_json::Map::new();
            map.insert("value".into(), other);
            map
        }
        None => serde_json::Map::new(),
    };
    if let serde_json::Value::Object(extra) = fields {
        merged.extend(extra);
    }
    serde_json::Value::Object(merged)
}

impl KnowledgeIngestor {
    pub fn new(knowledge: KnowledgeService, extractor: Option<Arc<dyn EntityExtractor>>) -> Self {
        Self {
            knowledge,
            extractor,
        }
    }

    pub fn knowledge(&self) -> &KnowledgeService {
        &self.knowledge
    }

    pub fn can_extract(&self) -> bool {
        self.extractor.is_some()
    }

    pub async fn process_document(
        &self,
        content: &str,
        name: &str,
        metadata: Option<serde_json::Value>,
        options: ProcessOptions,
    ) -> Result<ProcessOutcome> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AtlasError::Validation("Document name must not be empty".into()));
        }
        let chunked = split_into_chunks(
            content,
            options.chunk_size,
            options.chunk_overlap,
            options.max_chunks,
        )?;
        if chunked.truncated {
            warn!(
                document = %name,
                max_chunks = options.max_chunks,
                "Document exceeds max_chunks, tail dropped"
            );
        }

        info!(document = %name, chunks = chunked.chunks.len(), "Processing document");

        let store = self.knowledge.store();
        let document = KnowledgeNode::new(NodeType::Document, name, content).with_metadata(
            with_fields(
                metadata,
                serde_json::json!({
                    "chunkCount": chunked.chunks.len(),
                    "chunkSize": options.chunk_size,
                    "chunkOverlap": options.chunk_overlap,
                    "truncated": chunked.truncated,
                }),
            ),
        );
        let document = store.upsert_node(&document).await?;

        let mut outcome = ProcessOutcome {
            document_key: document.key.clone(),
            truncated: chunked.truncated,
            ..Default::default()
        };

        let mut previous: Option<String> = None;
        for (index, text) in chunked.chunks.iter().enumerate() {
            let chunk = KnowledgeNode::new(
                NodeType::DocumentChunk,
                format!("{name} #{}", index + 1),
                text.as_str(),
            )
            .with_metadata(serde_json::json!({
                "documentKey": document.key,
                "index": index,
            }));
            let chunk = store.upsert_node(&chunk).await?;

            store
                .insert_edge(&KnowledgeEdge::new(EdgeType::PartOf, &chunk.key, &document.key))
                .await?;
            outcome.edge_count += 1;

            if let Some(prev) = previous.take() {
                store
                    .insert_edge(&KnowledgeEdge::new(EdgeType::Follows, &chunk.key, &prev))
                    .await?;
                outcome.edge_count += 1;
            }
            previous = Some(chunk.key.clone());
            outcome.chunk_keys.push(chunk.key);
        }

        if options.extract_entities {
            self.extract_entities(name, &chunked.chunks, &mut outcome).await;
        }

        info!(
            document = %name,
            document_key = %outcome.document_key,
            chunks = outcome.chunk_keys.len(),
            entities = outcome.entity_keys.len(),
            edges = outcome.edge_count,
            "Document processed"
        );
        Ok(outcome)
    }

    /// Per-chunk extraction. Failures are recorded on the outcome and never
    /// abort the ingestion.
    async fn extract_entities(&self, name: &str, chunks: &[String], outcome: &mut ProcessOutcome) {
        let Some(extractor) = &self.extractor else {
            warn!(document = %name, "Entity extraction requested but no extractor is configured");
            outcome
                .extraction_errors
                .push("Entity extraction is not configured".to_string());
            return;
        };

        for (index, text) in chunks.iter().enumerate() {
            let chunk_key = outcome.chunk_keys[index].clone();
            let result = match extractor.extract(text, name).await {
                Ok(extracted) => self.link_extracted(&chunk_key, extracted, outcome).await,
                Err(e) => Err(e),
            };
            if let Err(e) = result {
                warn!(document = %name, chunk = index, error = %e, "Entity extraction failed for chunk");
                outcome.extraction_errors.push(format!("chunk {}: {e}", index + 1));
            }
        }
    }

    async fn link_extracted(
        &self,
        chunk_key: &str,
        extracted: ExtractedKnowledge,
        outcome: &mut ProcessOutcome,
    ) -> Result<()> {
        let store = self.knowledge.store();
        let mut keys: HashMap<String, String> = HashMap::new();

        for item in &extracted.items {
            let key = self
                .knowledge
                .ensure_node(item.node_type, &item.name, &item.description)
                .await?;
            store
                .insert_edge(
                    &KnowledgeEdge::new(EdgeType::Mentions, chunk_key, &key)
                        .with_weight(item.confidence),
                )
                .await?;
            outcome.edge_count += 1;
            if !outcome.entity_keys.contains(&key) {
                outcome.entity_keys.push(key.clone());
            }
            keys.insert(item.name.to_lowercase(), key);
        }

        for relation in &extracted.relations {
            let (Some(source), Some(target)) = (
                keys.get(&relation.source.to_lowercase()),
                keys.get(&relation.target.to_lowercase()),
            ) else {
                debug!(source = %relation.source, target = %relation.target, "Unresolved relation");
                continue;
            };
            store
                .insert_edge(
                    &KnowledgeEdge::new(relation.edge_type, source, target)
                        .with_weight(relation.confidence),
                )
                .await?;
            outcome.edge_count += 1;
        }
        Ok(())
    }

    /// Delete a document node and every chunk attached to it. Returns the
    /// number of nodes removed.
    pub async fn remove_document(&self, document_key: &str) -> Result<usize> {
        let document = self.knowledge.get_node(document_key).await?;
        if document.node_type != NodeType::Document {
            return Err(AtlasError::Validation(format!(
                "Node {document_key} is a {}, not a document",
                document.node_type.as_str()
            )));
        }

        let store = self.knowledge.store();
        let chunks = store
            .connected_nodes(document_key, Some(EdgeType::PartOf), Direction::Inbound)
            .await?;

        let mut removed = 0;
        for connected in chunks {
            if connected.node.node_type == NodeType::DocumentChunk
                && store.delete_node(&connected.node.key).await?
            {
                removed += 1;
            }
        }
        if store.delete_node(document_key).await? {
            removed += 1;
        }

        info!(document_key, removed, "Removed document from knowledge graph");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use atlas_core::knowledge::{ExtractedItem, ExtractedRelation};
    use atlas_graph::InMemoryGraphStore;

    struct FixedExtractor;

    #[async_trait]
    impl EntityExtractor for FixedExtractor {
        async fn extract(&self, text: &str, _context: &str) -> Result<ExtractedKnowledge> {
            if text.contains("boom") {
                return Err(AtlasError::Extraction("model unavailable".into()));
            }
            Ok(ExtractedKnowledge {
                items: vec![
                    ExtractedItem {
                        name: "Acme Corp".into(),
                        node_type: NodeType::Entity,
                        description: "supplier".into(),
                        confidence: 0.9,
                    },
                    ExtractedItem {
                        name: "Invoice".into(),
                        node_type: NodeType::Concept,
                        description: "billing document".into(),
                        confidence: 0.8,
                    },
                ],
                relations: vec![ExtractedRelation {
                    source: "Acme Corp".into(),
                    target: "Invoice".into(),
                    edge_type: EdgeType::RelatesTo,
                    confidence: 0.7,
                }],
            })
        }
    }

    fn ingestor(extractor: Option<Arc<dyn EntityExtractor>>) -> KnowledgeIngestor {
        let knowledge = KnowledgeService::new(Arc::new(InMemoryGraphStore::new()));
        KnowledgeIngestor::new(knowledge, extractor)
    }

    fn options(chunk_size: usize, chunk_overlap: usize, extract_entities: bool) -> ProcessOptions {
        ProcessOptions {
            chunk_size,
            chunk_overlap,
            max_chunks: 100,
            extract_entities,
        }
    }

    #[tokio::test]
    async fn creates_document_chunks_and_structure_edges() {
        let ingestor = ingestor(None);
        let text = "x".repeat(25);
        let outcome = ingestor
            .process_document(&text, "notes.txt", None, options(10, 2, false))
            .await
            .unwrap();

        assert_eq!(outcome.chunk_keys.len(), 3);
        // 3 part_of + 2 follows
        assert_eq!(outcome.edge_count, 5);

        let stats = ingestor.knowledge().stats().await.unwrap();
        assert_eq!(stats.node_count, 4);
        assert_eq!(stats.edge_count, 5);

        let parts = ingestor
            .knowledge()
            .get_connected_nodes(&outcome.document_key, Some(EdgeType::PartOf), Direction::Inbound)
            .await
            .unwrap();
        assert_eq!(parts.len(), 3);
    }

    #[tokio::test]
    async fn extraction_links_entities_and_relations() {
        let ingestor = ingestor(Some(Arc::new(FixedExtractor)));
        let outcome = ingestor
            .process_document("Acme sent an invoice.", "mail.txt", None, options(1000, 200, true))
            .await
            .unwrap();

        assert_eq!(outcome.entity_keys.len(), 2);
        assert!(outcome.extraction_errors.is_empty());
        // part_of + 2 mentions + 1 relation
        assert_eq!(outcome.edge_count, 4);
    }

    #[tokio::test]
    async fn entities_are_shared_across_chunks() {
        let ingestor = ingestor(Some(Arc::new(FixedExtractor)));
        let text = "y".repeat(30);
        let outcome = ingestor
            .process_document(&text, "long.txt", None, options(10, 0, true))
            .await
            .unwrap();
        assert_eq!(outcome.chunk_keys.len(), 3);
        assert_eq!(outcome.entity_keys.len(), 2);
    }

    #[tokio::test]
    async fn extraction_failure_does_not_abort_ingestion() {
        let ingestor = ingestor(Some(Arc::new(FixedExtractor)));
        let outcome = ingestor
            .process_document("boom", "bad.txt", None, options(1000, 0, true))
            .await
            .unwrap();
        assert_eq!(outcome.chunk_keys.len(), 1);
        assert_eq!(outcome.extraction_errors.len(), 1);
        assert!(outcome.entity_keys.is_empty());
    }

    #[tokio::test]
    async fn missing_extractor_is_reported() {
        let ingestor = ingestor(None);
        let outcome = ingestor
            .process_document("text", "doc.txt", None, options(1000, 0, true))
            .await
            .unwrap();
        assert_eq!(outcome.extraction_errors.len(), 1);
    }

    #[tokio::test]
    async fn invalid_options_are_rejected_before_writing() {
        let ingestor = ingestor(None);
        let err = ingestor
            .process_document("text", "doc.txt", None, options(10, 10, false))
            .await
            .unwrap_err();
        assert!(matches!(err, AtlasError::Validation(_)));
        assert_eq!(ingestor.knowledge().stats().await.unwrap().node_count, 0);
    }

    #[tokio::test]
    async fn metadata_is_kept_on_the_document_node() {
        let ingestor = ingestor(None);
        let outcome = ingestor
            .process_document(
                "text",
                "doc.txt",
                Some(serde_json::json!({"source": "upload"})),
                options(1000, 0, false),
            )
            .await
            .unwrap();
        let node = ingestor.knowledge().get_node(&outcome.document_key).await.unwrap();
        let metadata = node.metadata.unwrap();
        assert_eq!(metadata["source"], "upload");
        assert_eq!(metadata["chunkCount"], 1);
    }

    #[tokio::test]
    async fn remove_document_deletes_chunks_but_keeps_entities() {
        let ingestor = ingestor(Some(Arc::new(FixedExtractor)));
        let outcome = ingestor
            .process_document(&"z".repeat(30), "doc.txt", None, options(10, 0, true))
            .await
            .unwrap();

        let removed = ingestor.remove_document(&outcome.document_key).await.unwrap();
        assert_eq!(removed, 4);

        let stats = ingestor.knowledge().stats().await.unwrap();
        assert_eq!(stats.node_count, 2);
        // one relates_to edge per chunk survives between the entities
        assert_eq!(stats.edge_count, 3);
    }

    #[tokio::test]
    async fn remove_document_rejects_other_node_types() {
        let ingestor = ingestor(None);
        let key = ingestor
            .knowledge()
            .ensure_node(NodeType::Concept, "Ledger", "")
            .await
            .unwrap();
        let err = ingestor.remove_document(&key).await.unwrap_err();
        assert!(matches!(err, AtlasError::Validation(_)));
        assert!(ingestor.remove_document("missing").await.unwrap_err().is_not_found());
    }
}
