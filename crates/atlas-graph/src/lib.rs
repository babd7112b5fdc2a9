mod memory;
mod neo4j;
mod service;

use std::sync::Arc;

use atlas_core::config::{AppConfig, GraphBackend};
use atlas_core::GraphStore;

pub use memory::InMemoryGraphStore;
pub use neo4j::Neo4jGraphStore;
pub use service::KnowledgeService;

/// Build the graph store selected by `GRAPH_BACKEND`.
pub async fn connect_graph_store(config: &AppConfig) -> Arc<dyn GraphStore> {
    match config.graph_backend {
        GraphBackend::Neo4j => Arc::new(Neo4jGraphStore::connect(config).await),
        GraphBackend::Memory => {
            tracing::info!("Using in-memory graph store");
            Arc::new(InMemoryGraphStore::new())
        }
    }
}
