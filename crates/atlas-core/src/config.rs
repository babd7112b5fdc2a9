use serde::{Deserialize, Serialize};

pub const DEFAULT_LLM_GATEWAY_URL: &str = "https://api.anthropic.com/v1/messages";
pub const DEFAULT_LLM_MODEL: &str = "claude-haiku-4-5-20251001";
pub const DEFAULT_EMBEDDING_API_URL: &str = "https://api.openai.com/v1/embeddings";
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GraphBackend {
    Neo4j,
    Memory,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RecordBackend {
    Surreal,
    Memory,
}

/// An external health endpoint polled by the dashboard status panel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServiceEndpoint {
    pub name: String,
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server_host: String,
    pub server_port: u16,

    pub graph_backend: GraphBackend,
    pub neo4j_uri: String,
    pub neo4j_user: String,
    pub neo4j_password: String,

    pub record_backend: RecordBackend,
    pub surreal_url: String,
    pub surreal_namespace: String,
    pub surreal_database: String,
    pub surreal_user: String,
    pub surreal_password: String,

    pub object_store_dir: String,
    pub object_store_public_url: String,

    pub llm_gateway_url: String,
    pub llm_api_key: String,
    pub llm_model: String,

    pub embedding_api_url: String,
    pub embedding_api_key: String,
    pub embedding_model: String,

    pub document_processor_url: Option<String>,

    pub nango_url: String,
    pub nango_secret_key: String,
    pub pipedream_url: String,
    pub pipedream_api_key: String,

    pub service_health_urls: Vec<ServiceEndpoint>,
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.into())
}

impl AppConfig {
    pub fn from_env() -> Self {
        let graph_backend = match env_or("GRAPH_BACKEND", "neo4j").to_lowercase().as_str() {
            "memory" | "in_memory" => GraphBackend::Memory,
            _ => GraphBackend::Neo4j,
        };
        let record_backend = match env_or("RECORD_BACKEND", "surreal").to_lowercase().as_str() {
            "memory" | "in_memory" => RecordBackend::Memory,
            _ => RecordBackend::Surreal,
        };

        Self {
            server_host: env_or("SERVER_HOST", "0.0.0.0"),
            server_port: std::env::var("SERVER_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8080),
            graph_backend,
            neo4j_uri: env_or("NEO4J_URI", "bolt://localhost:7687"),
            neo4j_user: env_or("NEO4J_USER", "neo4j"),
            neo4j_password: env_or("NEO4J_PASSWORD", "atlas"),
            record_backend,
            surreal_url: env_or("SURREAL_URL", "http://localhost:8000"),
            surreal_namespace: env_or("SURREAL_NS", "atlas"),
            surreal_database: env_or("SURREAL_DB", "erp"),
            surreal_user: env_or("SURREAL_USER", "root"),
            surreal_password: env_or("SURREAL_PASS", "root"),
            object_store_dir: env_or("OBJECT_STORE_DIR", "./data/objects"),
            object_store_public_url: env_or("OBJECT_STORE_PUBLIC_URL", "/api/documents"),
            llm_gateway_url: env_or("LLM_GATEWAY_URL", DEFAULT_LLM_GATEWAY_URL),
            llm_api_key: std::env::var("LLM_API_KEY").unwrap_or_default(),
            llm_model: env_or("LLM_MODEL", DEFAULT_LLM_MODEL),
            embedding_api_url: env_or("EMBEDDING_API_URL", DEFAULT_EMBEDDING_API_URL),
            embedding_api_key: std::env::var("EMBEDDING_API_KEY").unwrap_or_default(),
            embedding_model: env_or("EMBEDDING_MODEL", DEFAULT_EMBEDDING_MODEL),
            document_processor_url: std::env::var("DOCUMENT_PROCESSOR_URL")
                .ok()
                .filter(|u| !u.trim().is_empty()),
            nango_url: env_or("NANGO_URL", "https://api.nango.dev"),
            nango_secret_key: std::env::var("NANGO_SECRET_KEY").unwrap_or_default(),
            pipedream_url: env_or("PIPEDREAM_URL", "https://api.pipedream.com/v1"),
            pipedream_api_key: std::env::var("PIPEDREAM_API_KEY").unwrap_or_default(),
            service_health_urls: parse_service_endpoints(
                &std::env::var("SERVICE_HEALTH_URLS").unwrap_or_default(),
            ),
        }
    }

    /// Configuration with every hosted backend swapped for its in-process
    /// counterpart and every optional service disabled.
    pub fn in_memory() -> Self {
        Self {
            server_host: "127.0.0.1".into(),
            server_port: 0,
            graph_backend: GraphBackend::Memory,
            neo4j_uri: String::new(),
            neo4j_user: String::new(),
            neo4j_password: String::new(),
            record_backend: RecordBackend::Memory,
            surreal_url: String::new(),
            surreal_namespace: String::new(),
            surreal_database: String::new(),
            surreal_user: String::new(),
            surreal_password: String::new(),
            object_store_dir: String::new(),
            object_store_public_url: "/api/documents".into(),
            llm_gateway_url: DEFAULT_LLM_GATEWAY_URL.into(),
            llm_api_key: String::new(),
            llm_model: DEFAULT_LLM_MODEL.into(),
            embedding_api_url: DEFAULT_EMBEDDING_API_URL.into(),
            embedding_api_key: String::new(),
            embedding_model: DEFAULT_EMBEDDING_MODEL.into(),
            document_processor_url: None,
            nango_url: String::new(),
            nango_secret_key: String::new(),
            pipedream_url: String::new(),
            pipedream_api_key: String::new(),
            service_health_urls: Vec::new(),
        }
    }

    pub fn llm_enabled(&self) -> bool {
        !self.llm_api_key.is_empty()
    }

    pub fn embedding_enabled(&self) -> bool {
        !self.embedding_api_key.is_empty()
    }
}

/// Parse `name=url,name=url` into endpoints. Entries without a `=` use the
/// URL host as the name; blank and malformed entries are skipped.
pub fn parse_service_endpoints(raw: &str) -> Vec<ServiceEndpoint> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .filter_map(|entry| {
            let (name, url) = match entry.split_once('=') {
                Some((name, url)) => (name.trim().to_string(), url.trim().to_string()),
                None => {
                    let parsed = url::Url::parse(entry).ok()?;
                    (parsed.host_str()?.to_string(), entry.to_string())
                }
            };
            if name.is_empty() || url::Url::parse(&url).is_err() {
                tracing::warn!(entry = %entry, "Ignoring malformed health endpoint");
                return None;
            }
            Some(ServiceEndpoint { name, url })
        })
        .collect()
}
