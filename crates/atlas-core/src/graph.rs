use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::knowledge::{
    ConnectedNode, Direction, EdgeType, KnowledgeEdge, KnowledgeNode, NodeType, NodeUpdate,
};

#[derive(Debug, Clone)]
pub struct NodeQuery {
    pub limit: usize,
    pub node_type: Option<NodeType>,
    /// Case-insensitive substring matched against name and content.
    pub query: Option<String>,
}

impl Default for NodeQuery {
    fn default() -> Self {
        Self {
            limit: 50,
            node_type: None,
            query: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NodeTypeCount {
    pub node_type: NodeType,
    pub count: u64,
}

/// Adapter over a hosted graph database. Stores persist nodes and edges
/// verbatim; validation beyond shape lives in the service layer.
#[async_trait]
pub trait GraphStore: Send + Sync {
    async fn get_nodes(&self, query: &NodeQuery) -> Result<Vec<KnowledgeNode>>;
    async fn get_node(&self, key: &str) -> Result<Option<KnowledgeNode>>;
    async fn find_node_by_name(
        &self,
        name: &str,
        node_type: Option<NodeType>,
    ) -> Result<Option<KnowledgeNode>>;
    /// Insert the node, or replace the stored node with the same key.
    async fn upsert_node(&self, node: &KnowledgeNode) -> Result<KnowledgeNode>;
    async fn update_node(&self, key: &str, update: NodeUpdate) -> Result<Option<KnowledgeNode>>;
    /// Delete the node and its incident edges. Returns false when absent.
    async fn delete_node(&self, key: &str) -> Result<bool>;
    async fn insert_edge(&self, edge: &KnowledgeEdge) -> Result<KnowledgeEdge>;
    async fn delete_edge(&self, key: &str) -> Result<bool>;
    async fn connected_nodes(
        &self,
        key: &str,
        edge_type: Option<EdgeType>,
        direction: Direction,
    ) -> Result<Vec<ConnectedNode>>;
    async fn node_count(&self) -> Result<u64>;
    async fn edge_count(&self) -> Result<u64>;
    async fn node_type_counts(&self) -> Result<Vec<NodeTypeCount>>;
}
