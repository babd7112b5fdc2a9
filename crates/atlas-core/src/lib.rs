pub mod api_types;
pub mod config;
pub mod connector;
pub mod error;
pub mod graph;
pub mod ingest;
pub mod knowledge;
pub mod records;
pub mod store;

pub use config::{AppConfig, GraphBackend, RecordBackend, ServiceEndpoint};
pub use connector::{Connector, ConnectorStatus, Integration, IntegrationListing};
pub use error::{AtlasError, Result};
pub use graph::{GraphStore, NodeQuery, NodeTypeCount};
pub use ingest::{Embedder, EntityExtractor, ProcessOptions, ProcessOutcome, TextExtractor};
pub use knowledge::{
    ConnectedNode, Direction, EdgeType, KnowledgeEdge, KnowledgeNode, NodeType, NodeUpdate,
};
pub use records::{
    Agent, Connection, Document, DocumentCategory, Platform, Record, Settings, Workflow,
};
pub use store::{ObjectStore, RecordStore, StoredObject};
