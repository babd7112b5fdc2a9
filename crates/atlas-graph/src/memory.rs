//! In-process graph store used for development, tests and deployments
//! without a graph database. State lives for the lifetime of the process.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use atlas_core::error::{AtlasError, Result};
use atlas_core::graph::{GraphStore, NodeQuery, NodeTypeCount};
use atlas_core::knowledge::{
    ConnectedNode, Direction, EdgeType, KnowledgeEdge, KnowledgeNode, NodeType, NodeUpdate,
};

#[derive(Default)]
struct GraphData {
    nodes: HashMap<String, KnowledgeNode>,
    edges: HashMap<String, KnowledgeEdge>,
}

#[derive(Default)]
pub struct InMemoryGraphStore {
    data: RwLock<GraphData>,
}

impl InMemoryGraphStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn matches_query(node: &KnowledgeNode, needle: &str) -> bool {
    node.name.to_lowercase().contains(needle) || node.content.to_lowercase().contains(needle)
}

#[async_trait]
impl GraphStore for InMemoryGraphStore {
    async fn get_nodes(&self, query: &NodeQuery) -> Result<Vec<KnowledgeNode>> {
        let data = self.data.read().await;
        let needle = query
            .query
            .as_deref()
            .map(|q| q.trim().to_lowercase())
            .filter(|q| !q.is_empty());

        let mut nodes: Vec<KnowledgeNode> = data
            .nodes
            .values()
            .filter(|n| query.node_type.map_or(true, |t| n.node_type == t))
            .filter(|n| needle.as_deref().map_or(true, |q| matches_query(n, q)))
            .cloned()
            .collect();

        nodes.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.key.cmp(&b.key)));
        nodes.truncate(query.limit);
        Ok(nodes)
    }

    async fn get_node(&self, key: &str) -> Result<Option<KnowledgeNode>> {
        Ok(self.data.read().await.nodes.get(key).cloned())
    }

    async fn find_node_by_name(
        &self,
        name: &str,
        node_type: Option<NodeType>,
    ) -> Result<Option<KnowledgeNode>> {
        let data = self.data.read().await;
        let wanted = name.to_lowercase();
        Ok(data
            .nodes
            .values()
            .filter(|n| n.name.to_lowercase() == wanted)
            .filter(|n| node_type.map_or(true, |t| n.node_type == t))
            .min_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.key.cmp(&b.key)))
            .cloned())
    }

    async fn upsert_node(&self, node: &KnowledgeNode) -> Result<KnowledgeNode> {
        let mut data = self.data.write().await;
        let mut stored = node.clone();
        if let Some(existing) = data.nodes.get(&node.key) {
            stored.created_at = existing.created_at;
        }
        data.nodes.insert(stored.key.clone(), stored.clone());
        tracing::debug!(node_key = %stored.key, node_name = %stored.name, "Stored node");
        Ok(stored)
    }

    async fn update_node(&self, key: &str, update: NodeUpdate) -> Result<Option<KnowledgeNode>> {
        let mut data = self.data.write().await;
        match data.nodes.get_mut(key) {
            Some(node) => {
                update.apply(node);
                Ok(Some(node.clone()))
            }
            None => Ok(None),
        }
    }

    async fn delete_node(&self, key: &str) -> Result<bool> {
        let mut data = self.data.write().await;
        if data.nodes.remove(key).is_none() {
            return Ok(false);
        }
        let before = data.edges.len();
        data.edges.retain(|_, e| e.source != key && e.target != key);
        tracing::debug!(
            node_key = %key,
            edges_removed = before - data.edges.len(),
            "Deleted node"
        );
        Ok(true)
    }

    async fn insert_edge(&self, edge: &KnowledgeEdge) -> Result<KnowledgeEdge> {
        let mut data = self.data.write().await;
        if !data.nodes.contains_key(&edge.source) || !data.nodes.contains_key(&edge.target) {
            return Err(AtlasError::NotFound(format!(
                "Edge endpoints {} -> {} not found",
                edge.source, edge.target
            )));
        }
        data.edges.insert(edge.key.clone(), edge.clone());
        Ok(edge.clone())
    }

    async fn delete_edge(&self, key: &str) -> Result<bool> {
        Ok(self.data.write().await.edges.remove(key).is_some())
    }

    async fn connected_nodes(
        &self,
        key: &str,
        edge_type: Option<EdgeType>,
        direction: Direction,
    ) -> Result<Vec<ConnectedNode>> {
        let data = self.data.read().await;
        let mut edges: Vec<&KnowledgeEdge> = data
            .edges
            .values()
            .filter(|e| edge_type.map_or(true, |t| e.edge_type == t))
            .filter(|e| match direction {
                Direction::Outbound => e.source == key,
                Direction::Inbound => e.target == key,
                Direction::Any => e.source == key || e.target == key,
            })
            .collect();
        edges.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.key.cmp(&b.key)));

        Ok(edges
            .into_iter()
            .filter_map(|edge| {
                let other = if edge.source == key { &edge.target } else { &edge.source };
                data.nodes.get(other).map(|node| ConnectedNode {
                    node: node.clone(),
                    edge: edge.clone(),
                })
            })
            .collect())
    }

    async fn node_count(&self) -> Result<u64> {
        Ok(self.data.read().await.nodes.len() as u64)
    }

    async fn edge_count(&self) -> Result<u64> {
        Ok(self.data.read().await.edges.len() as u64)
    }

    async fn node_type_counts(&self) -> Result<Vec<NodeTypeCount>> {
        let data = self.data.read().await;
        let mut counts: HashMap<NodeType, u64> = HashMap::new();
        for node in data.nodes.values() {
            *counts.entry(node.node_type).or_default() += 1;
        }
        Ok(NodeType::ALL
            .into_iter()
            .filter_map(|t| counts.get(&t).map(|&count| NodeTypeCount { node_type: t, count }))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn seeded() -> (InMemoryGraphStore, KnowledgeNode, KnowledgeNode) {
        let store = InMemoryGraphStore::new();
        let a = store
            .upsert_node(&KnowledgeNode::new(NodeType::Concept, "Invoice", "billing document"))
            .await
            .unwrap();
        let b = store
            .upsert_node(&KnowledgeNode::new(NodeType::Entity, "Acme Corp", "customer"))
            .await
            .unwrap();
        (store, a, b)
    }

    #[tokio::test]
    async fn filters_by_type_and_query() {
        let (store, _, _) = seeded().await;
        let concepts = store
            .get_nodes(&NodeQuery {
                node_type: Some(NodeType::Concept),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(concepts.len(), 1);
        assert_eq!(concepts[0].name, "Invoice");

        let matched = store
            .get_nodes(&NodeQuery {
                query: Some("CUSTOMER".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].name, "Acme Corp");
    }

    #[tokio::test]
    async fn limit_caps_results() {
        let (store, _, _) = seeded().await;
        let nodes = store
            .get_nodes(&NodeQuery {
                limit: 1,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(nodes.len(), 1);
    }

    #[tokio::test]
    async fn edge_requires_existing_endpoints() {
        let (store, a, _) = seeded().await;
        let err = store
            .insert_edge(&KnowledgeEdge::new(EdgeType::RelatesTo, &a.key, "missing"))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(store.edge_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn deleting_node_removes_incident_edges() {
        let (store, a, b) = seeded().await;
        store
            .insert_edge(&KnowledgeEdge::new(EdgeType::RelatesTo, &a.key, &b.key))
            .await
            .unwrap();
        assert_eq!(store.edge_count().await.unwrap(), 1);

        assert!(store.delete_node(&a.key).await.unwrap());
        assert_eq!(store.edge_count().await.unwrap(), 0);
        assert!(!store.delete_node(&a.key).await.unwrap());
    }

    #[tokio::test]
    async fn connected_respects_direction_and_type() {
        let (store, a, b) = seeded().await;
        store
            .insert_edge(&KnowledgeEdge::new(EdgeType::Mentions, &a.key, &b.key))
            .await
            .unwrap();

        let out = store.connected_nodes(&a.key, None, Direction::Outbound).await.unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].node.key, b.key);

        let inbound = store.connected_nodes(&a.key, None, Direction::Inbound).await.unwrap();
        assert!(inbound.is_empty());

        let any = store.connected_nodes(&b.key, None, Direction::Any).await.unwrap();
        assert_eq!(any.len(), 1);
        assert_eq!(any[0].node.key, a.key);

        let wrong_type = store
            .connected_nodes(&a.key, Some(EdgeType::PartOf), Direction::Any)
            .await
            .unwrap();
        assert!(wrong_type.is_empty());
    }

    #[tokio::test]
    async fn upsert_keeps_original_creation_time() {
        let (store, a, _) = seeded().await;
        let mut replacement = a.clone();
        replacement.created_at = chrono::Utc::now() + chrono::Duration::days(1);
        replacement.content = "updated".into();
        let stored = store.upsert_node(&replacement).await.unwrap();
        assert_eq!(stored.created_at, a.created_at);
        assert_eq!(stored.content, "updated");
    }

    #[tokio::test]
    async fn type_counts_cover_present_types_only() {
        let (store, _, _) = seeded().await;
        let counts = store.node_type_counts().await.unwrap();
        assert_eq!(counts.len(), 2);
        assert!(counts.iter().all(|c| c.count == 1));
    }
}
