use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use atlas_core::api_types::{
    CreateEdgeRequest, FailedEdge, GraphStatsResponse, NamedEdgeInput, NodeInput,
    SaveEdgesResponse,
};
use atlas_core::error::{AtlasError, Result};
use atlas_core::graph::{GraphStore, NodeQuery};
use atlas_core::knowledge::{
    ConnectedNode, Direction, EdgeType, KnowledgeEdge, KnowledgeNode, NodeType, NodeUpdate,
};

/// Application-level wrapper around a [`GraphStore`].
///
/// Mirrors the calls the UI makes (`getNodes`, `saveNodes`, `createEdge`, ...)
/// and performs the light validation the store itself does not.
#[derive(Clone)]
pub struct KnowledgeService {
    store: Arc<dyn GraphStore>,
}

impl KnowledgeService {
    pub fn new(store: Arc<dyn GraphStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn GraphStore> {
        &self.store
    }

    pub async fn get_nodes(&self, query: &NodeQuery) -> Result<Vec<KnowledgeNode>> {
        self.store.get_nodes(query).await
    }

    pub async fn get_node(&self, key: &str) -> Result<KnowledgeNode> {
        self.store
            .get_node(key)
            .await?
            .ok_or_else(|| AtlasError::NotFound(format!("Node {key} not found")))
    }

    /// Upsert nodes by key, falling back to (name, type) for nodes submitted
    /// without one. Existing nodes keep their key and creation time.
    pub async fn save_nodes(&self, inputs: Vec<NodeInput>) -> Result<Vec<KnowledgeNode>> {
        let mut saved = Vec::with_capacity(inputs.len());

        for input in inputs {
            if input.name.trim().is_empty() {
                return Err(AtlasError::Validation("Node name must not be empty".into()));
            }

            let existing = match input.key.as_deref() {
                Some(key) => self.store.get_node(key).await?,
                None => {
                    self.store
                        .find_node_by_name(&input.name, Some(input.node_type))
                        .await?
                }
            };

            let now = Utc::now();
            let node = match existing {
                Some(current) => KnowledgeNode {
                    key: current.key,
                    node_type: input.node_type,
                    name: input.name,
                    content: input.content,
                    metadata: input.metadata.or(current.metadata),
                    embedding: input.embedding.or(current.embedding),
                    created_at: current.created_at,
                    updated_at: now,
                },
                None => {
                    let mut node = KnowledgeNode::new(input.node_type, input.name, input.content);
                    if let Some(key) = input.key {
                        node.key = key;
                    }
                    node.metadata = input.metadata;
                    node.embedding = input.embedding;
                    node
                }
            };

            saved.push(self.store.upsert_node(&node).await?);
        }

        info!(count = saved.len(), "Saved knowledge nodes");
        Ok(saved)
    }

    pub async fn update_node(&self, key: &str, update: NodeUpdate) -> Result<KnowledgeNode> {
        if update.is_empty() {
            return Err(AtlasError::Validation("Update contains no fields".into()));
        }
        if matches!(update.name.as_deref(), Some(n) if n.trim().is_empty()) {
            return Err(AtlasError::Validation("Node name must not be empty".into()));
        }
        self.store
            .update_node(key, update)
            .await?
            .ok_or_else(|| AtlasError::NotFound(format!("Node {key} not found")))
    }

    pub async fn delete_node(&self, key: &str) -> Result<()> {
        if self.store.delete_node(key).await? {
            info!(node_key = %key, "Deleted knowledge node");
            Ok(())
        } else {
            Err(AtlasError::NotFound(format!("Node {key} not found")))
        }
    }

    /// Insert a single edge after checking both endpoints exist.
    pub async fn create_edge(&self, request: CreateEdgeRequest) -> Result<KnowledgeEdge> {
        let weight = validate_weight(request.weight)?;

        for endpoint in [&request.source, &request.target] {
            if self.store.get_node(endpoint).await?.is_none() {
                return Err(AtlasError::NotFound(format!("Node {endpoint} not found")));
            }
        }

        let edge = KnowledgeEdge::new(request.edge_type, request.source, request.target)
            .with_weight(weight)
            .with_metadata(request.metadata);
        let stored = self.store.insert_edge(&edge).await?;

        info!(
            edge_key = %stored.key,
            edge_type = stored.edge_type.as_str(),
            source = %stored.source,
            target = %stored.target,
            "Created knowledge edge"
        );
        Ok(stored)
    }

    /// Save edges whose endpoints are given by node name. Each edge is
    /// resolved and inserted on its own; failures are collected rather than
    /// aborting the batch, and nothing already saved is rolled back.
    pub async fn save_edges(&self, inputs: Vec<NamedEdgeInput>) -> Result<SaveEdgesResponse> {
        let mut response = SaveEdgesResponse::default();
        let mut resolved: HashMap<String, Option<String>> = HashMap::new();

        for input in inputs {
            let failed = |reason: String| FailedEdge {
                source: input.source.clone(),
                target: input.target.clone(),
                reason,
            };

            let weight = match validate_weight(input.weight) {
                Ok(w) => w,
                Err(e) => {
                    response.failed.push(failed(e.to_string()));
                    continue;
                }
            };

            let source = self.resolve_name(&input.source, &mut resolved).await?;
            let target = self.resolve_name(&input.target, &mut resolved).await?;
            let (source, target) = match (source, target) {
                (Some(s), Some(t)) => (s, t),
                (s, t) => {
                    let missing: Vec<&str> = [(&input.source, s), (&input.target, t)]
                        .into_iter()
                        .filter(|(_, key)| key.is_none())
                        .map(|(name, _)| name.as_str())
                        .collect();
                    warn!(
                        source = %input.source,
                        target = %input.target,
                        "Skipping edge: endpoint not found"
                    );
                    response
                        .failed
                        .push(failed(format!("Node not found: {}", missing.join(", "))));
                    continue;
                }
            };

            let edge = KnowledgeEdge::new(input.edge_type, source, target)
                .with_weight(weight)
                .with_metadata(input.metadata.clone());
            match self.store.insert_edge(&edge).await {
                Ok(stored) => response.saved.push(stored),
                Err(e) => {
                    warn!(error = %e, source = %input.source, target = %input.target, "Failed to save edge");
                    response.failed.push(failed(e.to_string()));
                }
            }
        }

        info!(
            saved = response.saved.len(),
            failed = response.failed.len(),
            "Saved knowledge edges"
        );
        Ok(response)
    }

    async fn resolve_name(
        &self,
        name: &str,
        cache: &mut HashMap<String, Option<String>>,
    ) -> Result<Option<String>> {
        let cache_key = name.to_lowercase();
        if let Some(hit) = cache.get(&cache_key) {
            return Ok(hit.clone());
        }
        let key = self
            .store
            .find_node_by_name(name, None)
            .await?
            .map(|n| n.key);
        debug!(name = %name, found = key.is_some(), "Resolved node name");
        cache.insert(cache_key, key.clone());
        Ok(key)
    }

    pub async fn delete_edge(&self, key: &str) -> Result<()> {
        if self.store.delete_edge(key).await? {
            Ok(())
        } else {
            Err(AtlasError::NotFound(format!("Edge {key} not found")))
        }
    }

    pub async fn get_connected_nodes(
        &self,
        key: &str,
        edge_type: Option<EdgeType>,
        direction: Direction,
    ) -> Result<Vec<ConnectedNode>> {
        self.get_node(key).await?;
        self.store.connected_nodes(key, edge_type, direction).await
    }

    pub async fn stats(&self) -> Result<GraphStatsResponse> {
        Ok(GraphStatsResponse {
            node_count: self.store.node_count().await?,
            edge_count: self.store.edge_count().await?,
            node_types: self.store.node_type_counts().await?,
        })
    }

    /// Upsert a node of the given type by name, returning its key.
    pub async fn ensure_node(
        &self,
        node_type: NodeType,
        name: &str,
        content: &str,
    ) -> Result<String> {
        if let Some(existing) = self.store.find_node_by_name(name, Some(node_type)).await? {
            return Ok(existing.key);
        }
        let node = self
            .store
            .upsert_node(&KnowledgeNode::new(node_type, name, content))
            .await?;
        Ok(node.key)
    }
}

fn validate_weight(weight: Option<f64>) -> Result<f64> {
    match weight {
        None => Ok(atlas_core::knowledge::default_weight()),
        Some(w) if w.is_finite() => Ok(w),
        Some(w) => Err(AtlasError::Validation(format!("Edge weight must be finite, got {w}"))),
    }
}
