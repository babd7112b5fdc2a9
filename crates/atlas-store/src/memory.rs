use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use tokio::sync::RwLock;

use atlas_core::error::{AtlasError, Result};
use atlas_core::store::RecordStore;

/// In-process record store. Tables are created on first insert; records are
/// listed in id order.
#[derive(Default)]
pub struct InMemoryRecordStore {
    tables: RwLock<HashMap<String, BTreeMap<String, serde_json::Value>>>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn insert(
        &self,
        table: &str,
        id: &str,
        record: serde_json::Value,
    ) -> Result<serde_json::Value> {
        let mut tables = self.tables.write().await;
        let rows = tables.entry(table.to_string()).or_default();
        if rows.contains_key(id) {
            return Err(AtlasError::Store(format!("Record {table}:{id} already exists")));
        }
        rows.insert(id.to_string(), record.clone());
        Ok(record)
    }

    async fn get(&self, table: &str, id: &str) -> Result<Option<serde_json::Value>> {
        let tables = self.tables.read().await;
        Ok(tables.get(table).and_then(|rows| rows.get(id)).cloned())
    }

    async fn list(&self, table: &str) -> Result<Vec<serde_json::Value>> {
        let tables = self.tables.read().await;
        Ok(tables
            .get(table)
            .map(|rows| rows.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn replace(
        &self,
        table: &str,
        id: &str,
        record: serde_json::Value,
    ) -> Result<Option<serde_json::Value>> {
        let mut tables = self.tables.write().await;
        match tables.get_mut(table).and_then(|rows| rows.get_mut(id)) {
            Some(slot) => {
                *slot = record.clone();
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    async fn delete(&self, table: &str, id: &str) -> Result<bool> {
        let mut tables = self.tables.write().await;
        Ok(tables
            .get_mut(table)
            .map(|rows| rows.remove(id).is_some())
            .unwrap_or(false))
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn insert_get_replace_delete() {
        let store = InMemoryRecordStore::new();
        store.insert("agents", "a1", json!({"name": "Planner"})).await.unwrap();

        let fetched = store.get("agents", "a1").await.unwrap().unwrap();
        assert_eq!(fetched["name"], "Planner");

        let replaced = store
            .replace("agents", "a1", json!({"name": "Scheduler"}))
            .await
            .unwrap();
        assert_eq!(replaced.unwrap()["name"], "Scheduler");

        assert!(store.delete("agents", "a1").await.unwrap());
        assert!(store.get("agents", "a1").await.unwrap().is_none());
        assert!(!store.delete("agents", "a1").await.unwrap());
    }

    #[tokio::test]
    async fn duplicate_insert_fails() {
        let store = InMemoryRecordStore::new();
        store.insert("agents", "a1", json!({})).await.unwrap();
        assert!(store.insert("agents", "a1", json!({})).await.is_err());
    }

    #[tokio::test]
    async fn replace_of_missing_record_is_none() {
        let store = InMemoryRecordStore::new();
        assert!(store.replace("agents", "nope", json!({})).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn tables_are_isolated() {
        let store = InMemoryRecordStore::new();
        store.insert("agents", "x", json!({"t": "agent"})).await.unwrap();
        store.insert("workflows", "x", json!({"t": "workflow"})).await.unwrap();
        assert_eq!(store.list("agents").await.unwrap().len(), 1);
        assert_eq!(store.get("workflows", "x").await.unwrap().unwrap()["t"], "workflow");
        assert!(store.list("connections").await.unwrap().is_empty());
    }
}
