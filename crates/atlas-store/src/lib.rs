mod memory;
mod objects;
mod repository;
mod surreal;

use std::sync::Arc;

use atlas_core::config::{AppConfig, RecordBackend};
use atlas_core::error::Result;
use atlas_core::store::{ObjectStore, RecordStore};

pub use memory::InMemoryRecordStore;
pub use objects::{sanitize_file_name, InMemoryObjectStore, LocalObjectStore};
pub use repository::{merge_patch, Repository};
pub use surreal::SurrealRecordStore;

/// Build the record store selected by `RECORD_BACKEND`.
pub async fn connect_record_store(config: &AppConfig) -> Result<Arc<dyn RecordStore>> {
    match config.record_backend {
        RecordBackend::Surreal => Ok(Arc::new(SurrealRecordStore::connect(config).await?)),
        RecordBackend::Memory => {
            tracing::info!("Using in-memory record store");
            Ok(Arc::new(InMemoryRecordStore::new()))
        }
    }
}

/// Local filesystem object store under `OBJECT_STORE_DIR`, or an in-memory
/// one when no directory is configured.
pub async fn connect_object_store(config: &AppConfig) -> Result<Arc<dyn ObjectStore>> {
    if config.object_store_dir.trim().is_empty() {
        tracing::info!("Using in-memory object store");
        return Ok(Arc::new(InMemoryObjectStore::new()));
    }
    Ok(Arc::new(LocalObjectStore::new(&config.object_store_dir).await?))
}
