use std::marker::PhantomData;
use std::sync::Arc;

use tracing::warn;

use atlas_core::error::{AtlasError, Result};
use atlas_core::records::Record;
use atlas_core::store::RecordStore;

/// Fields a patch may not overwrite.
const PROTECTED_FIELDS: &[&str] = &["id", "createdAt"];

/// Typed access to one table of a [`RecordStore`].
pub struct Repository<T> {
    store: Arc<dyn RecordStore>,
    _record: PhantomData<fn() -> T>,
}

impl<T> Clone for Repository<T> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            _record: PhantomData,
        }
    }
}

/// Shallow-merge a JSON object onto `current` and revalidate the result
/// against the record schema. Identity fields are left untouched.
pub fn merge_patch<T: Record>(current: &T, patch: serde_json::Value) -> Result<T> {
    let serde_json::Value::Object(changes) = patch else {
        return Err(AtlasError::Validation("Patch must be a JSON object".into()));
    };

    let mut merged = serde_json::to_value(current)?;
    if let Some(fields) = merged.as_object_mut() {
        for (field, value) in changes {
            if PROTECTED_FIELDS.contains(&field.as_str()) {
                continue;
            }
            fields.insert(field, value);
        }
    }

    serde_json::from_value(merged)
        .map_err(|e| AtlasError::Validation(format!("Invalid {} update: {e}", T::TABLE)))
}

fn decode<T: Record>(value: serde_json::Value) -> Result<T> {
    serde_json::from_value(value)
        .map_err(|e| AtlasError::Store(format!("Malformed {} record: {e}", T::TABLE)))
}

impl<T: Record> Repository<T> {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self {
            store,
            _record: PhantomData,
        }
    }

    pub async fn create(&self, record: T) -> Result<T> {
        let value = serde_json::to_value(&record)?;
        let stored = self.store.insert(T::TABLE, record.id(), value).await?;
        decode(stored)
    }

    pub async fn find(&self, id: &str) -> Result<Option<T>> {
        self.store.get(T::TABLE, id).await?.map(decode).transpose()
    }

    pub async fn get(&self, id: &str) -> Result<T> {
        self.find(id)
            .await?
            .ok_or_else(|| AtlasError::NotFound(format!("{} record {id} not found", T::TABLE)))
    }

    /// All records in the table. Rows that no longer match the schema are
    /// skipped with a warning.
    pub async fn list(&self) -> Result<Vec<T>> {
        let rows = self.store.list(T::TABLE).await?;
        Ok(rows
            .into_iter()
            .filter_map(|row| match decode::<T>(row) {
                Ok(record) => Some(record),
                Err(e) => {
                    warn!(table = T::TABLE, error = %e, "Skipping malformed record");
                    None
                }
            })
            .collect())
    }

    /// Replace the stored record with `record`, bumping its timestamp.
    pub async fn save(&self, mut record: T) -> Result<T> {
        record.touch();
        let value = serde_json::to_value(&record)?;
        let stored = self
            .store
            .replace(T::TABLE, record.id(), value)
            .await?
            .ok_or_else(|| {
                AtlasError::NotFound(format!("{} record {} not found", T::TABLE, record.id()))
            })?;
        decode(stored)
    }

    /// Apply [`merge_patch`] to the stored record and save it.
    pub async fn patch(&self, id: &str, patch: serde_json::Value) -> Result<T> {
        if !patch.is_object() {
            return Err(AtlasError::Validation("Patch must be a JSON object".into()));
        }
        let current = self.get(id).await?;
        let record = merge_patch(&current, patch)?;
        self.save(record).await
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        if self.store.delete(T::TABLE, id).await? {
            Ok(())
        } else {
            Err(AtlasError::NotFound(format!("{} record {id} not found", T::TABLE)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::InMemoryRecordStore;
    use atlas_core::api_types::NewAgent;
    use atlas_core::records::{Agent, AgentState};
    use serde_json::json;

    fn repo() -> Repository<Agent> {
        Repository::new(Arc::new(InMemoryRecordStore::new()))
    }

    fn new_agent(name: &str) -> Agent {
        NewAgent {
            name: name.into(),
            description: String::new(),
            model: "claude".into(),
            system_prompt: String::new(),
            tools: vec![],
            config: None,
            status: AgentState::Idle,
        }
        .into_record()
    }

    #[tokio::test]
    async fn patch_merges_and_revalidates() {
        let repo = repo();
        let agent = repo.create(new_agent("Planner")).await.unwrap();

        let patched = repo
            .patch(&agent.id, json!({"status": "running", "tools": ["search"]}))
            .await
            .unwrap();
        assert_eq!(patched.status, AgentState::Running);
        assert_eq!(patched.tools, vec!["search"]);
        assert_eq!(patched.name, "Planner");
        assert!(patched.updated_at >= agent.updated_at);
    }

    #[tokio::test]
    async fn patch_cannot_change_identity() {
        let repo = repo();
        let agent = repo.create(new_agent("Planner")).await.unwrap();
        let patched = repo
            .patch(&agent.id, json!({"id": "hijacked", "createdAt": "2000-01-01T00:00:00Z"}))
            .await
            .unwrap();
        assert_eq!(patched.id, agent.id);
        assert_eq!(patched.created_at, agent.created_at);
    }

    #[tokio::test]
    async fn patch_with_wrong_shape_is_validation_error() {
        let repo = repo();
        let agent = repo.create(new_agent("Planner")).await.unwrap();

        let err = repo.patch(&agent.id, json!({"status": "sleeping"})).await.unwrap_err();
        assert!(matches!(err, AtlasError::Validation(_)));

        let err = repo.patch(&agent.id, json!(["not", "an", "object"])).await.unwrap_err();
        assert!(matches!(err, AtlasError::Validation(_)));
    }

    #[tokio::test]
    async fn missing_records_are_not_found() {
        let repo = repo();
        assert!(repo.get("nope").await.unwrap_err().is_not_found());
        assert!(repo.delete("nope").await.unwrap_err().is_not_found());
        assert!(repo.patch("nope", json!({})).await.unwrap_err().is_not_found());
        assert!(repo.find("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn list_skips_malformed_rows() {
        let store = Arc::new(InMemoryRecordStore::new());
        let repo: Repository<Agent> = Repository::new(store.clone());
        repo.create(new_agent("Good")).await.unwrap();
        store.insert("agents", "broken", json!({"name": 42})).await.unwrap();

        let agents = repo.list().await.unwrap();
        assert_eq!(agents.len(), 1);
        assert_eq!(agents[0].name, "Good");
    }
}
