use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Adapter over a hosted document database holding JSON records per table.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn insert(&self, table: &str, id: &str, record: serde_json::Value)
        -> Result<serde_json::Value>;
    async fn get(&self, table: &str, id: &str) -> Result<Option<serde_json::Value>>;
    async fn list(&self, table: &str) -> Result<Vec<serde_json::Value>>;
    /// Replace the record. Returns None when no record with that id exists.
    async fn replace(
        &self,
        table: &str,
        id: &str,
        record: serde_json::Value,
    ) -> Result<Option<serde_json::Value>>;
    async fn delete(&self, table: &str, id: &str) -> Result<bool>;
    async fn ping(&self) -> Result<()>;
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StoredObject {
    pub key: String,
    pub url: String,
    pub size: u64,
    pub content_type: String,
}

/// Adapter over a blob store.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(&self, key: &str, bytes: &[u8], content_type: &str) -> Result<StoredObject>;
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;
    async fn delete(&self, key: &str) -> Result<bool>;
}
