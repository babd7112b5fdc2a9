use async_trait::async_trait;
use neo4rs::{query, Graph, Node, Query, Row};
use std::future::Future;

use atlas_core::config::AppConfig;
use atlas_core::error::{AtlasError, Result};
use atlas_core::graph::{GraphStore, NodeQuery, NodeTypeCount};
use atlas_core::knowledge::{
    ConnectedNode, Direction, EdgeType, KnowledgeEdge, KnowledgeNode, NodeType, NodeUpdate,
};

/// Timeout for all Neo4j operations (seconds).
const NEO4J_TIMEOUT_SECS: u64 = 5;

pub struct Neo4jGraphStore {
    graph: Option<Graph>,
}

impl Neo4jGraphStore {
    pub async fn connect(config: &AppConfig) -> Self {
        match Graph::new(&config.neo4j_uri, &config.neo4j_user, &config.neo4j_password).await {
            Ok(graph) => {
                tracing::info!(uri = %config.neo4j_uri, "Connected to Neo4j");
                Self { graph: Some(graph) }
            }
            Err(e) => {
                tracing::warn!(uri = %config.neo4j_uri, error = %e, "Failed to connect to Neo4j, running in degraded mode");
                Self { graph: None }
            }
        }
    }

    fn graph(&self) -> Result<&Graph> {
        self.graph.as_ref().ok_or_else(|| AtlasError::Graph("Neo4j not connected".into()))
    }

    pub fn is_connected(&self) -> bool {
        self.graph.is_some()
    }

    async fn fetch_rows(&self, q: Query, what: &str) -> Result<Vec<Row>> {
        let mut stream = timed(self.graph()?.execute(q))
            .await?
            .map_err(|e| AtlasError::Graph(format!("Failed to {what}: {e}")))?;

        let mut rows = Vec::new();
        loop {
            match stream.next().await {
                Ok(Some(row)) => rows.push(row),
                Ok(None) => break,
                Err(e) => return Err(AtlasError::Graph(format!("Error while trying to {what}: {e}"))),
            }
        }
        Ok(rows)
    }

    async fn fetch_count(&self, cypher: &str, what: &str) -> Result<u64> {
        let rows = self.fetch_rows(query(cypher), what).await?;
        match rows.first() {
            Some(row) => {
                let count: i64 = row
                    .get("cnt")
                    .map_err(|e| AtlasError::Graph(format!("Failed to get count: {e}")))?;
                Ok(count.max(0) as u64)
            }
            None => Ok(0),
        }
    }
}

/// Wrap any async operation with a timeout, converting timeout to AtlasError::Graph.
async fn timed<T, F: Future<Output = T>>(op: F) -> std::result::Result<T, AtlasError> {
    tokio::time::timeout(std::time::Duration::from_secs(NEO4J_TIMEOUT_SECS), op)
        .await
        .map_err(|_| {
            tracing::warn!("Neo4j operation timed out after {}s", NEO4J_TIMEOUT_SECS);
            AtlasError::Graph(format!("Neo4j operation timed out after {}s", NEO4J_TIMEOUT_SECS))
        })
}

fn node_type_to_label(nt: &NodeType) -> &'static str {
    match nt {
        NodeType::Concept => "Concept",
        NodeType::Entity => "Entity",
        NodeType::Document => "Document",
        NodeType::DocumentChunk => "DocumentChunk",
        NodeType::Fact => "Fact",
        NodeType::Question => "Question",
        NodeType::Answer => "Answer",
    }
}

fn label_to_node_type(label: &str) -> Option<NodeType> {
    match label {
        "Concept" => Some(NodeType::Concept),
        "Entity" => Some(NodeType::Entity),
        "Document" => Some(NodeType::Document),
        "DocumentChunk" => Some(NodeType::DocumentChunk),
        "Fact" => Some(NodeType::Fact),
        "Question" => Some(NodeType::Question),
        "Answer" => Some(NodeType::Answer),
        _ => None,
    }
}

fn edge_type_to_label(et: &EdgeType) -> &'static str {
    match et {
        EdgeType::RelatesTo => "RELATES_TO",
        EdgeType::PartOf => "PART_OF",
        EdgeType::Contains => "CONTAINS",
        EdgeType::Mentions => "MENTIONS",
        EdgeType::References => "REFERENCES",
        EdgeType::DerivedFrom => "DERIVED_FROM",
        EdgeType::Answers => "ANSWERS",
        EdgeType::SimilarTo => "SIMILAR_TO",
        EdgeType::Follows => "FOLLOWS",
    }
}

fn label_to_edge_type(label: &str) -> EdgeType {
    match label {
        "RELATES_TO" => EdgeType::RelatesTo,
        "PART_OF" => EdgeType::PartOf,
        "CONTAINS" => EdgeType::Contains,
        "MENTIONS" => EdgeType::Mentions,
        "REFERENCES" => EdgeType::References,
        "DERIVED_FROM" => EdgeType::DerivedFrom,
        "ANSWERS" => EdgeType::Answers,
        "SIMILAR_TO" => EdgeType::SimilarTo,
        "FOLLOWS" => EdgeType::Follows,
        _ => EdgeType::RelatesTo,
    }
}

fn parse_timestamp(raw: Option<String>) -> chrono::DateTime<chrono::Utc> {
    raw.and_then(|s| chrono::DateTime::parse_from_rfc3339(&s).ok())
        .map(|dt| dt.with_timezone(&chrono::Utc))
        .unwrap_or_else(chrono::Utc::now)
}

/// Metadata and embeddings are stored as JSON strings; empty means absent.
fn parse_json_property<T: serde::de::DeserializeOwned>(raw: Option<String>) -> Option<T> {
    raw.filter(|s| !s.is_empty()).and_then(|s| serde_json::from_str(&s).ok())
}

fn node_to_knowledge(node: &Node) -> Result<KnowledgeNode> {
    let key: String = node
        .get("key")
        .map_err(|e| AtlasError::Graph(format!("Missing key on node: {}", e)))?;

    let node_type = node
        .get::<String>("node_type")
        .ok()
        .and_then(|s| NodeType::from_str_opt(&s))
        .or_else(|| node.labels().iter().find_map(|l| label_to_node_type(l)))
        .ok_or_else(|| AtlasError::Graph(format!("Node {key} has no recognised type")))?;

    let name: String = node
        .get("name")
        .map_err(|e| AtlasError::Graph(format!("Missing name on node: {}", e)))?;
    let content: String = node.get("content").unwrap_or_default();

    Ok(KnowledgeNode {
        key,
        node_type,
        name,
        content,
        metadata: parse_json_property(node.get("metadata").ok()),
        embedding: parse_json_property(node.get("embedding").ok()),
        created_at: parse_timestamp(node.get("created_at").ok()),
        updated_at: parse_timestamp(node.get("updated_at").ok()),
    })
}

fn row_to_connected(row: &Row) -> Result<ConnectedNode> {
    let neighbour: Node = row
        .get("m")
        .map_err(|e| AtlasError::Graph(format!("Failed to deserialize neighbour node: {e}")))?;
    let node = node_to_knowledge(&neighbour)?;

    let rel_type: String = row.get("rel_type").unwrap_or_default();
    let edge = KnowledgeEdge {
        key: row.get("edge_key").unwrap_or_default(),
        edge_type: label_to_edge_type(&rel_type),
        source: row.get("source_key").unwrap_or_default(),
        target: row.get("target_key").unwrap_or_default(),
        weight: row.get("weight").unwrap_or(1.0),
        metadata: parse_json_property(row.get("metadata").ok()),
        created_at: parse_timestamp(row.get("created_at").ok()),
    };

    Ok(ConnectedNode { node, edge })
}

fn json_or_empty<T: serde::Serialize>(value: &Option<T>) -> Result<String> {
    match value {
        Some(v) => serde_json::to_string(v)
            .map_err(|e| AtlasError::Graph(format!("Failed to serialize property: {e}"))),
        None => Ok(String::new()),
    }
}

#[async_trait]
impl GraphStore for Neo4jGraphStore {
    async fn get_nodes(&self, node_query: &NodeQuery) -> Result<Vec<KnowledgeNode>> {
        let cypher = "MATCH (n:Knowledge) \
                      WHERE ($node_type = '' OR n.node_type = $node_type) \
                        AND ($query = '' \
                             OR toLower(n.name) CONTAINS toLower($query) \
                             OR toLower(n.content) CONTAINS toLower($query)) \
                      RETURN n ORDER BY n.created_at DESC LIMIT $limit";
        let q = query(cypher)
            .param(
                "node_type",
                node_query.node_type.map(|t| t.as_str()).unwrap_or("").to_string(),
            )
            .param("query", node_query.query.clone().unwrap_or_default())
            .param("limit", i64::try_from(node_query.limit).unwrap_or(i64::MAX));

        let rows = self.fetch_rows(q, "query nodes").await?;
        let mut nodes = Vec::with_capacity(rows.len());
        for row in rows {
            let node: Node = row
                .get("n")
                .map_err(|e| AtlasError::Graph(format!("Failed to deserialize node: {}", e)))?;
            match node_to_knowledge(&node) {
                Ok(n) => nodes.push(n),
                Err(e) => tracing::warn!(error = %e, "Skipping malformed knowledge node"),
            }
        }

        tracing::debug!(
            node_type = ?node_query.node_type,
            query = ?node_query.query,
            results = nodes.len(),
            "Node query completed"
        );

        Ok(nodes)
    }

    async fn get_node(&self, key: &str) -> Result<Option<KnowledgeNode>> {
        let q = query("MATCH (n:Knowledge {key: $key}) RETURN n").param("key", key.to_string());
        let rows = self.fetch_rows(q, "fetch node").await?;
        match rows.first() {
            Some(row) => {
                let node: Node = row
                    .get("n")
                    .map_err(|e| AtlasError::Graph(format!("Failed to deserialize node: {}", e)))?;
                Ok(Some(node_to_knowledge(&node)?))
            }
            None => Ok(None),
        }
    }

    async fn find_node_by_name(
        &self,
        name: &str,
        node_type: Option<NodeType>,
    ) -> Result<Option<KnowledgeNode>> {
        let q = query(
            "MATCH (n:Knowledge) \
             WHERE toLower(n.name) = toLower($name) \
               AND ($node_type = '' OR n.node_type = $node_type) \
             RETURN n ORDER BY n.created_at ASC LIMIT 1",
        )
        .param("name", name.to_string())
        .param("node_type", node_type.map(|t| t.as_str()).unwrap_or("").to_string());

        let rows = self.fetch_rows(q, "find node by name").await?;
        match rows.first() {
            Some(row) => {
                let node: Node = row
                    .get("n")
                    .map_err(|e| AtlasError::Graph(format!("Failed to deserialize node: {}", e)))?;
                Ok(Some(node_to_knowledge(&node)?))
            }
            None => Ok(None),
        }
    }

    async fn upsert_node(&self, node: &KnowledgeNode) -> Result<KnowledgeNode> {
        let label = node_type_to_label(&node.node_type);
        let cypher = format!(
            "MERGE (n:Knowledge {{key: $key}}) \
             ON CREATE SET n.created_at = $created_at \
             SET n:{label}, n.node_type = $node_type, n.name = $name, \
                 n.content = $content, n.metadata = $metadata, \
                 n.embedding = $embedding, n.updated_at = $updated_at \
             RETURN n"
        );

        let q = query(&cypher)
            .param("key", node.key.clone())
            .param("node_type", node.node_type.as_str().to_string())
            .param("name", node.name.clone())
            .param("content", node.content.clone())
            .param("metadata", json_or_empty(&node.metadata)?)
            .param("embedding", json_or_empty(&node.embedding)?)
            .param("created_at", node.created_at.to_rfc3339())
            .param("updated_at", node.updated_at.to_rfc3339());

        let rows = self.fetch_rows(q, "store node").await?;
        let row = rows
            .first()
            .ok_or_else(|| AtlasError::Graph(format!("Node {} was not stored", node.key)))?;
        let stored: Node = row
            .get("n")
            .map_err(|e| AtlasError::Graph(format!("Failed to deserialize node: {}", e)))?;

        tracing::debug!(
            node_key = %node.key,
            node_name = %node.name,
            node_type = label,
            "Stored node"
        );

        node_to_knowledge(&stored)
    }

    async fn update_node(&self, key: &str, update: NodeUpdate) -> Result<Option<KnowledgeNode>> {
        let Some(mut node) = self.get_node(key).await? else {
            return Ok(None);
        };
        update.apply(&mut node);
        self.upsert_node(&node).await.map(Some)
    }

    async fn delete_node(&self, key: &str) -> Result<bool> {
        let q = query(
            "MATCH (n:Knowledge {key: $key}) \
             WITH n, n.key AS k \
             DETACH DELETE n \
             RETURN count(k) AS cnt",
        )
        .param("key", key.to_string());

        let rows = self.fetch_rows(q, "delete node").await?;
        let deleted: i64 = rows.first().and_then(|r| r.get("cnt").ok()).unwrap_or(0);
        tracing::debug!(node_key = %key, deleted, "Deleted node");
        Ok(deleted > 0)
    }

    async fn insert_edge(&self, edge: &KnowledgeEdge) -> Result<KnowledgeEdge> {
        let rel_label = edge_type_to_label(&edge.edge_type);
        let cypher = format!(
            "MATCH (a:Knowledge {{key: $source}}) \
             MATCH (b:Knowledge {{key: $target}}) \
             CREATE (a)-[r:{rel_label} {{key: $key, weight: $weight, \
                 metadata: $metadata, created_at: $created_at}}]->(b) \
             RETURN r.key AS key"
        );

        let q = query(&cypher)
            .param("source", edge.source.clone())
            .param("target", edge.target.clone())
            .param("key", edge.key.clone())
            .param("weight", edge.weight)
            .param("metadata", json_or_empty(&edge.metadata)?)
            .param("created_at", edge.created_at.to_rfc3339());

        let rows = self.fetch_rows(q, "store edge").await?;
        if rows.is_empty() {
            return Err(AtlasError::NotFound(format!(
                "Edge endpoints {} -> {} not found",
                edge.source, edge.target
            )));
        }

        tracing::debug!(
            edge_key = %edge.key,
            source = %edge.source,
            target = %edge.target,
            edge_type = rel_label,
            "Stored edge"
        );

        Ok(edge.clone())
    }

    async fn delete_edge(&self, key: &str) -> Result<bool> {
        let q = query(
            "MATCH (:Knowledge)-[r {key: $key}]->(:Knowledge) \
             WITH r, r.key AS k \
             DELETE r \
             RETURN count(k) AS cnt",
        )
        .param("key", key.to_string());

        let rows = self.fetch_rows(q, "delete edge").await?;
        let deleted: i64 = rows.first().and_then(|r| r.get("cnt").ok()).unwrap_or(0);
        Ok(deleted > 0)
    }

    async fn connected_nodes(
        &self,
        key: &str,
        edge_type: Option<EdgeType>,
        direction: Direction,
    ) -> Result<Vec<ConnectedNode>> {
        let rel = match edge_type {
            Some(et) => format!("[r:{}]", edge_type_to_label(&et)),
            None => "[r]".to_string(),
        };
        let pattern = match direction {
            Direction::Outbound => format!("(n)-{rel}->(m:Knowledge)"),
            Direction::Inbound => format!("(n)<-{rel}-(m:Knowledge)"),
            Direction::Any => format!("(n)-{rel}-(m:Knowledge)"),
        };
        let cypher = format!(
            "MATCH (n:Knowledge {{key: $key}}) \
             MATCH {pattern} \
             RETURN m, type(r) AS rel_type, r.key AS edge_key, r.weight AS weight, \
                    r.metadata AS metadata, r.created_at AS created_at, \
                    startNode(r).key AS source_key, endNode(r).key AS target_key"
        );

        let rows = self
            .fetch_rows(query(&cypher).param("key", key.to_string()), "get connected nodes")
            .await?;

        let mut connected = Vec::with_capacity(rows.len());
        for row in &rows {
            match row_to_connected(row) {
                Ok(c) => connected.push(c),
                Err(e) => tracing::warn!(error = %e, "Skipping malformed neighbour"),
            }
        }

        tracing::debug!(
            node_key = %key,
            edge_type = ?edge_type,
            direction = ?direction,
            connected = connected.len(),
            "Fetched connected nodes"
        );

        Ok(connected)
    }

    async fn node_count(&self) -> Result<u64> {
        self.fetch_count("MATCH (n:Knowledge) RETURN count(n) AS cnt", "count nodes")
            .await
    }

    async fn edge_count(&self) -> Result<u64> {
        self.fetch_count(
            "MATCH (:Knowledge)-[r]->(:Knowledge) RETURN count(r) AS cnt",
            "count edges",
        )
        .await
    }

    async fn node_type_counts(&self) -> Result<Vec<NodeTypeCount>> {
        let rows = self
            .fetch_rows(
                query("MATCH (n:Knowledge) RETURN n.node_type AS node_type, count(n) AS cnt"),
                "count node types",
            )
            .await?;

        let mut counts = Vec::new();
        for row in rows {
            let Some(node_type) = row
                .get::<String>("node_type")
                .ok()
                .and_then(|s| NodeType::from_str_opt(&s))
            else {
                continue;
            };
            let count: i64 = row.get("cnt").unwrap_or(0);
            counts.push(NodeTypeCount {
                node_type,
                count: count.max(0) as u64,
            });
        }
        Ok(counts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edge_labels_round_trip() {
        for et in EdgeType::ALL {
            assert_eq!(label_to_edge_type(edge_type_to_label(&et)), et);
        }
    }

    #[test]
    fn node_labels_round_trip() {
        for nt in NodeType::ALL {
            assert_eq!(label_to_node_type(node_type_to_label(&nt)), Some(nt));
        }
        assert_eq!(label_to_node_type("Knowledge"), None);
    }

    #[test]
    fn empty_json_property_is_absent() {
        assert_eq!(parse_json_property::<Vec<f32>>(Some(String::new())), None);
        assert_eq!(parse_json_property::<Vec<f32>>(None), None);
        assert_eq!(
            parse_json_property::<Vec<f32>>(Some("[0.5,1.0]".into())),
            Some(vec![0.5, 1.0])
        );
    }

    #[tokio::test]
    async fn disconnected_store_reports_graph_error() {
        let store = Neo4jGraphStore { graph: None };
        assert!(!store.is_connected());
        let err = store.node_count().await.unwrap_err();
        assert!(matches!(err, AtlasError::Graph(_)));
    }
}
