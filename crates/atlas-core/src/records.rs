//! Passive records kept in the record store. None of them carry lifecycle
//! logic beyond create/read/update/delete.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A record persisted in a named table of the record store.
pub trait Record: Serialize + DeserializeOwned + Send + Sync + 'static {
    const TABLE: &'static str;

    fn id(&self) -> &str;

    /// Bump the modification timestamp.
    fn touch(&mut self);
}

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

fn empty_object() -> serde_json::Value {
    serde_json::Value::Object(serde_json::Map::new())
}

// --- Documents ---

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum DocumentCategory {
    #[default]
    General,
    Finance,
    Legal,
    Hr,
    Operations,
    Sales,
    Technical,
}

impl DocumentCategory {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "" | "general" => Some(Self::General),
            "finance" => Some(Self::Finance),
            "legal" => Some(Self::Legal),
            "hr" => Some(Self::Hr),
            "operations" => Some(Self::Operations),
            "sales" => Some(Self::Sales),
            "technical" => Some(Self::Technical),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: String,
    pub name: String,
    pub mime_type: String,
    pub size: u64,
    pub storage_key: String,
    pub url: String,
    #[serde(default)]
    pub category: DocumentCategory,
    #[serde(default)]
    pub processed: bool,
    #[serde(default)]
    pub vector_embedding: bool,
    #[serde(default)]
    pub knowledge_graph: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub knowledge_node_key: Option<String>,
    #[serde(default)]
    pub chunk_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    #[serde(default)]
    pub processing_errors: Vec<String>,
    #[serde(default = "empty_object")]
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document {
    pub fn new(name: String, mime_type: String, size: u64, storage_key: String, url: String) -> Self {
        let now = Utc::now();
        Self {
            id: new_id(),
            name,
            mime_type,
            size,
            storage_key,
            url,
            category: DocumentCategory::General,
            processed: false,
            vector_embedding: false,
            knowledge_graph: false,
            knowledge_node_key: None,
            chunk_count: 0,
            embedding: None,
            processing_errors: Vec::new(),
            metadata: empty_object(),
            created_at: now,
            updated_at: now,
        }
    }
}

impl Record for Document {
    const TABLE: &'static str = "documents";

    fn id(&self) -> &str {
        &self.id
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

// --- Agents ---

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum AgentState {
    #[default]
    Idle,
    Running,
    Disabled,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Agent {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub system_prompt: String,
    #[serde(default)]
    pub tools: Vec<String>,
    #[serde(default = "empty_object")]
    pub config: serde_json::Value,
    #[serde(default)]
    pub status: AgentState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Record for Agent {
    const TABLE: &'static str = "agents";

    fn id(&self) -> &str {
        &self.id
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

// --- Workflows ---

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowState {
    #[default]
    Draft,
    Active,
    Paused,
    Archived,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkflowStep {
    pub name: String,
    pub action: String,
    #[serde(default = "empty_object")]
    pub config: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workflow {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub trigger: String,
    #[serde(default)]
    pub steps: Vec<WorkflowStep>,
    #[serde(default)]
    pub status: WorkflowState,
    #[serde(default)]
    pub last_run_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Record for Workflow {
    const TABLE: &'static str = "workflows";

    fn id(&self) -> &str {
        &self.id
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

// --- Connections ---

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    Nango,
    Pipedream,
    Custom,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Nango => "nango",
            Platform::Pipedream => "pipedream",
            Platform::Custom => "custom",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    #[default]
    Pending,
    Active,
    Error,
    Disabled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    pub id: String,
    pub name: String,
    pub platform: Platform,
    pub integration_id: String,
    #[serde(default)]
    pub status: ConnectionState,
    #[serde(default = "empty_object")]
    pub config: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Record for Connection {
    const TABLE: &'static str = "connections";

    fn id(&self) -> &str {
        &self.id
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

// --- Settings ---

pub const SETTINGS_ID: &str = "default";

/// Runtime-adjustable ingestion and upload defaults.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default = "settings_id")]
    pub id: String,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub max_chunks: usize,
    pub extract_entities: bool,
    pub max_upload_bytes: u64,
    pub allowed_mime_types: Vec<String>,
    pub metrics_interval_secs: u64,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

fn settings_id() -> String {
    SETTINGS_ID.to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            id: settings_id(),
            chunk_size: 1000,
            chunk_overlap: 200,
            max_chunks: 100,
            extract_entities: false,
            max_upload_bytes: 10 * 1024 * 1024,
            allowed_mime_types: [
                "text/plain",
                "text/markdown",
                "text/csv",
                "text/html",
                "application/json",
                "application/pdf",
                "application/msword",
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            metrics_interval_secs: 5,
            updated_at: Utc::now(),
        }
    }
}

impl Settings {
    pub fn allows_mime_type(&self, mime_type: &str) -> bool {
        let essence = mime_type.split(';').next().unwrap_or("").trim().to_lowercase();
        self.allowed_mime_types.iter().any(|m| m.eq_ignore_ascii_case(&essence))
    }
}

impl Record for Settings {
    const TABLE: &'static str = "settings";

    fn id(&self) -> &str {
        &self.id
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_parsing_is_lenient_on_case() {
        assert_eq!(DocumentCategory::parse("Finance"), Some(DocumentCategory::Finance));
        assert_eq!(DocumentCategory::parse(""), Some(DocumentCategory::General));
        assert_eq!(DocumentCategory::parse("astrology"), None);
    }

    #[test]
    fn mime_check_ignores_parameters() {
        let settings = Settings::default();
        assert!(settings.allows_mime_type("text/plain; charset=utf-8"));
        assert!(settings.allows_mime_type("Application/JSON"));
        assert!(!settings.allows_mime_type("image/png"));
    }

    #[test]
    fn document_defaults_fill_missing_flags() {
        let json = serde_json::json!({
            "id": "d1",
            "name": "report.txt",
            "mimeType": "text/plain",
            "size": 12,
            "storageKey": "documents/d1/report.txt",
            "url": "/api/documents/d1/content",
            "createdAt": "2026-01-01T00:00:00Z",
            "updatedAt": "2026-01-01T00:00:00Z"
        });
        let doc: Document = serde_json::from_value(json).unwrap();
        assert!(!doc.processed);
        assert!(!doc.knowledge_graph);
        assert_eq!(doc.category, DocumentCategory::General);
        assert!(doc.processing_errors.is_empty());
        assert!(doc.metadata.is_object());
    }
}
