use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, info};

use atlas_core::error::{AtlasError, Result};
use atlas_core::store::{ObjectStore, StoredObject};

/// Keys are relative, slash-separated paths. Anything that could escape the
/// store root is rejected.
fn validate_key(key: &str) -> Result<&str> {
    let trimmed = key.trim_matches('/');
    if trimmed.is_empty() {
        return Err(AtlasError::Validation("Object key must not be empty".into()));
    }
    let path = Path::new(trimmed);
    if path
        .components()
        .any(|c| !matches!(c, Component::Normal(_)))
    {
        return Err(AtlasError::Validation(format!("Invalid object key: {key}")));
    }
    Ok(trimmed)
}

/// Reduce an uploaded file name to a single safe path segment.
pub fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_matches('.').to_string();
    if cleaned.is_empty() {
        "file".to_string()
    } else {
        cleaned
    }
}

/// Object store on the local filesystem under a root directory.
pub struct LocalObjectStore {
    root: PathBuf,
}

impl LocalObjectStore {
    pub async fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await.map_err(|e| {
            AtlasError::ObjectStore(format!("Failed to create {}: {e}", root.display()))
        })?;
        info!(root = %root.display(), "Using local object store");
        Ok(Self { root })
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        Ok(self.root.join(validate_key(key)?))
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn put(&self, key: &str, bytes: &[u8], content_type: &str) -> Result<StoredObject> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                AtlasError::ObjectStore(format!("Failed to create {}: {e}", parent.display()))
            })?;
        }
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| AtlasError::ObjectStore(format!("Failed to write {key}: {e}")))?;
        debug!(key, size = bytes.len(), "Stored object");

        Ok(StoredObject {
            key: key.to_string(),
            url: format!("file://{}", path.display()),
            size: bytes.len() as u64,
            content_type: content_type.to_string(),
        })
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path_for(key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AtlasError::ObjectStore(format!("Failed to read {key}: {e}"))),
        }
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                debug!(key, "Deleted object");
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(AtlasError::ObjectStore(format!("Failed to delete {key}: {e}"))),
        }
    }
}

/// Object store held in process memory.
#[derive(Default)]
pub struct InMemoryObjectStore {
    objects: RwLock<HashMap<String, Vec<u8>>>,
}

impl InMemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.objects.read().await.is_empty()
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn put(&self, key: &str, bytes: &[u8], content_type: &str) -> Result<StoredObject> {
        let key = validate_key(key)?.to_string();
        self.objects.write().await.insert(key.clone(), bytes.to_vec());
        Ok(StoredObject {
            url: format!("memory://{key}"),
            key,
            size: bytes.len() as u64,
            content_type: content_type.to_string(),
        })
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let key = validate_key(key)?;
        Ok(self.objects.read().await.get(key).cloned())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let key = validate_key(key)?;
        Ok(self.objects.write().await.remove(key).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_names_are_reduced_to_one_segment() {
        assert_eq!(sanitize_file_name("Q3 report.pdf"), "Q3_report.pdf");
        assert_eq!(sanitize_file_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_file_name("C:\\Users\\me\\notes.txt"), "notes.txt");
        assert_eq!(sanitize_file_name(".."), "file");
        assert_eq!(sanitize_file_name(""), "file");
    }

    #[test]
    fn keys_cannot_escape_the_root() {
        assert!(validate_key("documents/abc/file.txt").is_ok());
        assert!(validate_key("documents/../secret").is_err());
        assert!(validate_key("").is_err());
        assert!(validate_key("/").is_err());
    }

    #[tokio::test]
    async fn local_store_round_trips_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalObjectStore::new(dir.path().join("objects")).await.unwrap();

        let stored = store
            .put("documents/d1/notes.txt", b"hello", "text/plain")
            .await
            .unwrap();
        assert_eq!(stored.size, 5);
        assert!(stored.url.starts_with("file://"));
        assert!(dir.path().join("objects/documents/d1/notes.txt").exists());

        assert_eq!(
            store.get("documents/d1/notes.txt").await.unwrap().as_deref(),
            Some(&b"hello"[..])
        );
        assert!(store.delete("documents/d1/notes.txt").await.unwrap());
        assert!(!store.delete("documents/d1/notes.txt").await.unwrap());
        assert!(store.get("documents/d1/notes.txt").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn memory_store_tracks_objects() {
        let store = InMemoryObjectStore::new();
        store.put("a/b.txt", b"x", "text/plain").await.unwrap();
        assert_eq!(store.len().await, 1);
        assert!(store.delete("a/b.txt").await.unwrap());
        assert!(store.is_empty().await);
    }
}
