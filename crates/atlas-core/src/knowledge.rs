use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    Concept,
    Entity,
    Document,
    DocumentChunk,
    Fact,
    Question,
    Answer,
}

impl NodeType {
    pub const ALL: [NodeType; 7] = [
        NodeType::Concept,
        NodeType::Entity,
        NodeType::Document,
        NodeType::DocumentChunk,
        NodeType::Fact,
        NodeType::Question,
        NodeType::Answer,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            NodeType::Concept => "concept",
            NodeType::Entity => "entity",
            NodeType::Document => "document",
            NodeType::DocumentChunk => "document_chunk",
            NodeType::Fact => "fact",
            NodeType::Question => "question",
            NodeType::Answer => "answer",
        }
    }

    pub fn from_str_opt(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == s)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KnowledgeNode {
    pub key: String,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    pub name: String,
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl KnowledgeNode {
    pub fn new(node_type: NodeType, name: impl Into<String>, content: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            key: Uuid::new_v4().to_string(),
            node_type,
            name: name.into(),
            content: content.into(),
            metadata: None,
            embedding: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// Partial update of a node. Absent fields are left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeUpdate {
    pub name: Option<String>,
    pub content: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub embedding: Option<Vec<f32>>,
}

impl NodeUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.content.is_none()
            && self.metadata.is_none()
            && self.embedding.is_none()
    }

    pub fn apply(self, node: &mut KnowledgeNode) {
        if let Some(name) = self.name {
            node.name = name;
        }
        if let Some(content) = self.content {
            node.content = content;
        }
        if let Some(metadata) = self.metadata {
            node.metadata = Some(metadata);
        }
        if let Some(embedding) = self.embedding {
            node.embedding = Some(embedding);
        }
        node.updated_at = Utc::now();
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EdgeType {
    RelatesTo,
    PartOf,
    Contains,
    Mentions,
    References,
    DerivedFrom,
    Answers,
    SimilarTo,
    Follows,
}

impl EdgeType {
    pub const ALL: [EdgeType; 9] = [
        EdgeType::RelatesTo,
        EdgeType::PartOf,
        EdgeType::Contains,
        EdgeType::Mentions,
        EdgeType::References,
        EdgeType::DerivedFrom,
        EdgeType::Answers,
        EdgeType::SimilarTo,
        EdgeType::Follows,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeType::RelatesTo => "relates_to",
            EdgeType::PartOf => "part_of",
            EdgeType::Contains => "contains",
            EdgeType::Mentions => "mentions",
            EdgeType::References => "references",
            EdgeType::DerivedFrom => "derived_from",
            EdgeType::Answers => "answers",
            EdgeType::SimilarTo => "similar_to",
            EdgeType::Follows => "follows",
        }
    }

    pub fn from_str_opt(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == s)
    }
}

pub fn default_weight() -> f64 {
    1.0
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KnowledgeEdge {
    pub key: String,
    #[serde(rename = "type")]
    pub edge_type: EdgeType,
    pub source: String,
    pub target: String,
    #[serde(default = "default_weight")]
    pub weight: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

impl KnowledgeEdge {
    pub fn new(edge_type: EdgeType, source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            key: Uuid::new_v4().to_string(),
            edge_type,
            source: source.into(),
            target: target.into(),
            weight: default_weight(),
            metadata: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    pub fn with_metadata(mut self, metadata: Option<serde_json::Value>) -> Self {
        self.metadata = metadata;
        self
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Outbound,
    Inbound,
    #[default]
    Any,
}

/// A neighbour reached by a one-hop traversal, together with the edge used.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectedNode {
    pub node: KnowledgeNode,
    pub edge: KnowledgeEdge,
}

/// Entities and relations pulled out of a chunk of text by an LLM.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractedKnowledge {
    pub items: Vec<ExtractedItem>,
    pub relations: Vec<ExtractedRelation>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedItem {
    pub name: String,
    pub node_type: NodeType,
    pub description: String,
    pub confidence: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedRelation {
    pub source: String,
    pub target: String,
    pub edge_type: EdgeType,
    pub confidence: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_serializes_with_type_and_camel_case() {
        let node = KnowledgeNode::new(NodeType::DocumentChunk, "Chunk 1", "text");
        let json = serde_json::to_value(&node).unwrap();
        assert_eq!(json["type"], "document_chunk");
        assert!(json.get("createdAt").is_some());
        assert!(json.get("embedding").is_none());
    }

    #[test]
    fn edge_weight_defaults_to_one() {
        let json = serde_json::json!({
            "key": "e1",
            "type": "relates_to",
            "source": "a",
            "target": "b",
            "createdAt": "2026-01-01T00:00:00Z"
        });
        let edge: KnowledgeEdge = serde_json::from_value(json).unwrap();
        assert_eq!(edge.weight, 1.0);
        assert!(edge.metadata.is_none());
    }

    #[test]
    fn unknown_node_type_is_rejected() {
        let json = serde_json::json!({
            "key": "n1",
            "type": "person",
            "name": "x",
            "createdAt": "2026-01-01T00:00:00Z",
            "updatedAt": "2026-01-01T00:00:00Z"
        });
        assert!(serde_json::from_value::<KnowledgeNode>(json).is_err());
    }

    #[test]
    fn type_names_round_trip_through_as_str() {
        for t in NodeType::ALL {
            assert_eq!(NodeType::from_str_opt(t.as_str()), Some(t));
        }
        for t in EdgeType::ALL {
            assert_eq!(EdgeType::from_str_opt(t.as_str()), Some(t));
        }
    }

    #[test]
    fn node_update_only_touches_given_fields() {
        let mut node = KnowledgeNode::new(NodeType::Fact, "Revenue", "Q1 revenue grew");
        let before = node.updated_at;
        NodeUpdate {
            content: Some("Q1 revenue grew 12%".into()),
            ..Default::default()
        }
        .apply(&mut node);
        assert_eq!(node.name, "Revenue");
        assert_eq!(node.content, "Q1 revenue grew 12%");
        assert!(node.updated_at >= before);
    }
}
