use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::connector::{ConnectorStatus, Integration};
use crate::graph::NodeTypeCount;
use crate::ingest::ProcessOptions;
use crate::knowledge::{
    ConnectedNode, Direction, EdgeType, KnowledgeEdge, KnowledgeNode, NodeType,
};
use crate::records::{
    Agent, AgentState, Connection, ConnectionState, Document, DocumentCategory, Platform,
    Workflow, WorkflowState, WorkflowStep,
};

// --- Errors ---

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ListResponse<T> {
    pub items: Vec<T>,
    pub total: usize,
}

impl<T> From<Vec<T>> for ListResponse<T> {
    fn from(items: Vec<T>) -> Self {
        let total = items.len();
        Self { items, total }
    }
}

// --- Health ---

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub graph_connected: bool,
    pub records_connected: bool,
    pub node_count: u64,
    pub edge_count: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceHealth {
    pub name: String,
    pub url: String,
    pub healthy: bool,
    pub status_code: Option<u16>,
    pub latency_ms: u64,
    pub error: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceHealthResponse {
    pub services: Vec<ServiceHealth>,
    pub healthy: usize,
    pub total: usize,
    pub checked_at: DateTime<Utc>,
}

// --- Knowledge graph ---

fn default_node_limit() -> usize {
    50
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeListQuery {
    #[serde(default = "default_node_limit")]
    pub limit: usize,
    pub node_type: Option<NodeType>,
    pub query: Option<String>,
}

impl NodeListQuery {
    pub const MAX_LIMIT: usize = 1000;

    /// The requested limit bounded to `1..=MAX_LIMIT`.
    pub fn bounded_limit(&self) -> usize {
        self.limit.clamp(1, Self::MAX_LIMIT)
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct NodeListResponse {
    pub nodes: Vec<KnowledgeNode>,
    pub total: usize,
}

/// A node as submitted by a client. Without a key the node is matched by
/// name and type.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeInput {
    #[serde(default)]
    pub key: Option<String>,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    pub name: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
    #[serde(default)]
    pub embedding: Option<Vec<f32>>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SaveNodesRequest {
    pub nodes: Vec<NodeInput>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SaveNodesResponse {
    pub nodes: Vec<KnowledgeNode>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct NodeResponse {
    pub node: KnowledgeNode,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateEdgeRequest {
    #[serde(rename = "type")]
    pub edge_type: EdgeType,
    pub source: String,
    pub target: String,
    #[serde(default)]
    pub weight: Option<f64>,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct EdgeResponse {
    pub edge: KnowledgeEdge,
}

/// An edge whose endpoints are given by node name.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NamedEdgeInput {
    #[serde(rename = "type")]
    pub edge_type: EdgeType,
    pub source: String,
    pub target: String,
    #[serde(default)]
    pub weight: Option<f64>,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SaveEdgesRequest {
    pub edges: Vec<NamedEdgeInput>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FailedEdge {
    pub source: String,
    pub target: String,
    pub reason: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct SaveEdgesResponse {
    pub saved: Vec<KnowledgeEdge>,
    pub failed: Vec<FailedEdge>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectedQuery {
    pub edge_type: Option<EdgeType>,
    #[serde(default)]
    pub direction: Direction,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectedNodesResponse {
    pub node_key: String,
    pub connected: Vec<ConnectedNode>,
}

/// Per-request overrides of the configured ingestion settings.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessOptionsInput {
    pub chunk_size: Option<usize>,
    pub chunk_overlap: Option<usize>,
    pub max_chunks: Option<usize>,
    pub extract_entities: Option<bool>,
}

impl ProcessOptionsInput {
    pub fn resolve(&self, defaults: ProcessOptions) -> ProcessOptions {
        ProcessOptions {
            chunk_size: self.chunk_size.unwrap_or(defaults.chunk_size),
            chunk_overlap: self.chunk_overlap.unwrap_or(defaults.chunk_overlap),
            max_chunks: self.max_chunks.unwrap_or(defaults.max_chunks),
            extract_entities: self.extract_entities.unwrap_or(defaults.extract_entities),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ProcessDocumentRequest {
    pub content: String,
    pub name: String,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
    #[serde(default)]
    pub options: ProcessOptionsInput,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphStatsResponse {
    pub node_count: u64,
    pub edge_count: u64,
    pub node_types: Vec<NodeTypeCount>,
}

// --- Documents ---

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct DocumentListQuery {
    pub category: Option<DocumentCategory>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DocumentResponse {
    pub document: Document,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct UpdateDocumentRequest {
    pub name: Option<String>,
    pub category: Option<DocumentCategory>,
    pub metadata: Option<serde_json::Value>,
}

// --- Agents ---

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAgent {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub system_prompt: String,
    #[serde(default)]
    pub tools: Vec<String>,
    #[serde(default)]
    pub config: Option<serde_json::Value>,
    #[serde(default)]
    pub status: AgentState,
}

impl NewAgent {
    pub fn into_record(self) -> Agent {
        let now = Utc::now();
        Agent {
            id: uuid::Uuid::new_v4().to_string(),
            name: self.name,
            description: self.description,
            model: self.model,
            system_prompt: self.system_prompt,
            tools: self.tools,
            config: self.config.unwrap_or_else(|| serde_json::json!({})),
            status: self.status,
            created_at: now,
            updated_at: now,
        }
    }
}

// --- Workflows ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewWorkflow {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub trigger: String,
    #[serde(default)]
    pub steps: Vec<WorkflowStep>,
    #[serde(default)]
    pub status: WorkflowState,
}

impl NewWorkflow {
    pub fn into_record(self) -> Workflow {
        let now = Utc::now();
        Workflow {
            id: uuid::Uuid::new_v4().to_string(),
            name: self.name,
            description: self.description,
            trigger: self.trigger,
            steps: self.steps,
            status: self.status,
            last_run_at: None,
            created_at: now,
            updated_at: now,
        }
    }
}

// --- Integrations ---

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewConnection {
    pub name: String,
    pub platform: Platform,
    pub integration_id: String,
    #[serde(default)]
    pub status: ConnectionState,
    #[serde(default)]
    pub config: Option<serde_json::Value>,
}

impl NewConnection {
    pub fn into_record(self) -> Connection {
        let now = Utc::now();
        Connection {
            id: uuid::Uuid::new_v4().to_string(),
            name: self.name,
            platform: self.platform,
            integration_id: self.integration_id,
            status: self.status,
            config: self.config.unwrap_or_else(|| serde_json::json!({})),
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct IntegrationsResponse {
    pub connectors: Vec<ConnectorStatus>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ConnectorIntegrationsResponse {
    pub connector: String,
    pub mock: bool,
    pub integrations: Vec<Integration>,
}

// --- Real-time ---

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusUpdateRequest {
    pub room: String,
    pub status: serde_json::Value,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusUpdateResponse {
    pub room: String,
    pub delivered: usize,
}
