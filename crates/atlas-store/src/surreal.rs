use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use surrealdb::engine::any::{self, Any};
use surrealdb::opt::auth::Root;
use surrealdb::Surreal;
use tracing::{debug, info};

use atlas_core::config::AppConfig;
use atlas_core::error::{AtlasError, Result};
use atlas_core::store::RecordStore;

/// Record store backed by a SurrealDB connection. The engine follows the
/// scheme of `SURREAL_URL` (`http://`, `ws://` or `mem://`).
pub struct SurrealRecordStore {
    db: Surreal<Any>,
}

/// Row layout in every table. Records are kept as a JSON document so
/// arbitrary fields come back exactly as they were written.
#[derive(Debug, Serialize, Deserialize)]
struct StoredRecord {
    body: String,
}

impl StoredRecord {
    fn encode(record: &serde_json::Value) -> Result<Self> {
        Ok(Self {
            body: serde_json::to_string(record)?,
        })
    }

    fn decode(self) -> Result<serde_json::Value> {
        Ok(serde_json::from_str(&self.body)?)
    }
}

fn store_error(what: &'static str) -> impl FnOnce(surrealdb::Error) -> AtlasError {
    move |e| AtlasError::Store(format!("Failed to {what}: {e}"))
}

impl SurrealRecordStore {
    pub async fn connect(config: &AppConfig) -> Result<Self> {
        let db = any::connect(config.surreal_url.as_str())
            .await
            .map_err(store_error("connect to SurrealDB"))?;

        // Embedded engines run without authentication.
        if !config.surreal_url.starts_with("mem://") {
            db.signin(Root {
                username: &config.surreal_user,
                password: &config.surreal_password,
            })
            .await
            .map_err(store_error("sign in to SurrealDB"))?;
        }

        db.use_ns(&config.surreal_namespace)
            .use_db(&config.surreal_database)
            .await
            .map_err(store_error("select SurrealDB namespace"))?;

        info!(
            url = %config.surreal_url,
            namespace = %config.surreal_namespace,
            database = %config.surreal_database,
            "Connected to SurrealDB record store"
        );

        Ok(Self { db })
    }
}

#[async_trait]
impl RecordStore for SurrealRecordStore {
    async fn insert(
        &self,
        table: &str,
        id: &str,
        record: serde_json::Value,
    ) -> Result<serde_json::Value> {
        let created: Option<StoredRecord> = self
            .db
            .create((table.to_string(), id.to_string()))
            .content(StoredRecord::encode(&record)?)
            .await
            .map_err(store_error("create record"))?;
        debug!(table, id, "Created record");
        created
            .ok_or_else(|| AtlasError::Store(format!("SurrealDB returned no record for {table}:{id}")))?
            .decode()
    }

    async fn get(&self, table: &str, id: &str) -> Result<Option<serde_json::Value>> {
        let found: Option<StoredRecord> = self
            .db
            .select((table.to_string(), id.to_string()))
            .await
            .map_err(store_error("fetch record"))?;
        found.map(StoredRecord::decode).transpose()
    }

    async fn list(&self, table: &str) -> Result<Vec<serde_json::Value>> {
        let rows: Vec<StoredRecord> = self
            .db
            .select(table)
            .await
            .map_err(store_error("list records"))?;
        debug!(table, count = rows.len(), "Listed records");
        rows.into_iter().map(StoredRecord::decode).collect()
    }

    async fn replace(
        &self,
        table: &str,
        id: &str,
        record: serde_json::Value,
    ) -> Result<Option<serde_json::Value>> {
        // UPDATE leaves missing records alone, unlike UPSERT.
        let updated: Option<StoredRecord> = self
            .db
            .update((table.to_string(), id.to_string()))
            .content(StoredRecord::encode(&record)?)
            .await
            .map_err(store_error("update record"))?;
        updated.map(StoredRecord::decode).transpose()
    }

    async fn delete(&self, table: &str, id: &str) -> Result<bool> {
        let deleted: Option<StoredRecord> = self
            .db
            .delete((table.to_string(), id.to_string()))
            .await
            .map_err(store_error("delete record"))?;
        if deleted.is_some() {
            debug!(table, id, "Deleted record");
        }
        Ok(deleted.is_some())
    }

    async fn ping(&self) -> Result<()> {
        self.db
            .health()
            .await
            .map_err(|e| AtlasError::Store(format!("SurrealDB unreachable: {e}")))
    }
}
