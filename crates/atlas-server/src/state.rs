use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use atlas_core::records::{Agent, Connection, Document, Settings, Workflow, SETTINGS_ID};
use atlas_core::{AppConfig, Connector, EntityExtractor, Embedder, RecordStore, Result};
use atlas_graph::KnowledgeService;
use atlas_ingest::{
    DocumentTextExtractor, DocumentUploadPipeline, HttpEmbeddingClient, KnowledgeIngestor,
    LlmEntityExtractor,
};
use atlas_store::Repository;

use crate::realtime::StatusHub;

const HEALTH_CHECK_TIMEOUT_SECS: u64 = 5;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub knowledge: KnowledgeService,
    pub ingestor: KnowledgeIngestor,
    pub uploads: DocumentUploadPipeline,
    pub records: Arc<dyn RecordStore>,
    pub agents: Repository<Agent>,
    pub workflows: Repository<Workflow>,
    pub connections: Repository<Connection>,
    pub settings: Repository<Settings>,
    pub connectors: Arc<BTreeMap<String, Arc<dyn Connector>>>,
    pub hub: StatusHub,
    pub http: reqwest::Client,
}

impl AppState {
    /// Connect every backend named by the configuration.
    pub async fn build(config: AppConfig) -> Result<Self> {
        let graph = atlas_graph::connect_graph_store(&config).await;
        let records = atlas_store::connect_record_store(&config).await?;
        let objects = atlas_store::connect_object_store(&config).await?;

        let extractor: Option<Arc<dyn EntityExtractor>> = if config.llm_enabled() {
            Some(Arc::new(LlmEntityExtractor::new(&config)))
        } else {
            tracing::info!("LLM_API_KEY not set, entity extraction disabled");
            None
        };
        let embedder: Option<Arc<dyn Embedder>> = if config.embedding_enabled() {
            Some(Arc::new(HttpEmbeddingClient::new(&config)))
        } else {
            tracing::info!("EMBEDDING_API_KEY not set, vectorization disabled");
            None
        };

        let knowledge = KnowledgeService::new(graph);
        let ingestor = KnowledgeIngestor::new(knowledge.clone(), extractor);
        let uploads = DocumentUploadPipeline::new(
            Repository::<Document>::new(records.clone()),
            objects,
            Arc::new(DocumentTextExtractor::new(&config)?),
            ingestor.clone(),
            embedder,
            config.object_store_public_url.clone(),
        );

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(HEALTH_CHECK_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            connectors: Arc::new(atlas_connectors::connector_registry(&config)?),
            config: Arc::new(config),
            knowledge,
            ingestor,
            uploads,
            agents: Repository::new(records.clone()),
            workflows: Repository::new(records.clone()),
            connections: Repository::new(records.clone()),
            settings: Repository::new(records.clone()),
            records,
            hub: StatusHub::default(),
            http,
        })
    }

    /// Stored settings, or the defaults when none were saved yet.
    pub async fn current_settings(&self) -> Result<Settings> {
        Ok(self.settings.find(SETTINGS_ID).await?.unwrap_or_default())
    }
}
