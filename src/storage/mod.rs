//! Object storage abstraction: `Put/Get/Exists/Delete/List` over opaque byte
//! blobs keyed by string paths, backed by the Apache Arrow `object_store`
//! crate. This is the spec's external ObjectStore contract; this crate ships
//! the Local filesystem and in-memory adapters (S3 is out of scope).

use async_trait::async_trait;
use futures::StreamExt;
use object_store::{ObjectStore, path::Path as StoragePath};
use std::sync::Arc;
use thiserror::Error;

use crate::config::{ObjectStoreConfig, ObjectStoreType};

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("upload failed: {0}")]
    UploadFailed(String),

    #[error("download failed: {0}")]
    DownloadFailed(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("object store error: {0}")]
    ObjectStoreError(#[from] object_store::Error),
}

pub type Result<T> = std::result::Result<T, StorageError>;

#[derive(Debug, Clone)]
pub struct UploadMetadata {
    pub key: String,
    pub etag: Option<String>,
    pub size: usize,
}

/// Wraps an `object_store::ObjectStore` backend behind the spec's
/// Put/Get/Exists/Delete/List vocabulary.
#[derive(Clone)]
pub struct StorageClient {
    store: Arc<dyn ObjectStore>,
    pub bucket: String,
    prefix: String,
}

impl StorageClient {
    pub fn new(store: Arc<dyn ObjectStore>, bucket: String) -> Self {
        Self { store, bucket, prefix: String::new() }
    }

    /// Builds a client from configuration: `local` uses a filesystem-backed
    /// store rooted at `base_path`, `memory` uses an in-process store (tests,
    /// `dry_run`).
    pub fn from_config(config: &ObjectStoreConfig) -> Result<Self> {
        let store: Arc<dyn ObjectStore> = match config.store_type {
            ObjectStoreType::Local => {
                std::fs::create_dir_all(&config.base_path)?;
                Arc::new(object_store::local::LocalFileSystem::new_with_prefix(&config.base_path)?)
            }
            ObjectStoreType::Memory => Arc::new(object_store::memory::InMemory::new()),
        };
        Ok(Self { store, bucket: config.bucket.clone(), prefix: config.prefix.clone() })
    }

    pub fn in_memory() -> Self {
        Self { store: Arc::new(object_store::memory::InMemory::new()), bucket: "reactorcide".to_string(), prefix: String::new() }
    }

    fn resolve(&self, key: &str) -> StoragePath {
        if self.prefix.is_empty() {
            StoragePath::from(key)
        } else {
            StoragePath::from(format!("{}/{}", self.prefix.trim_end_matches('/'), key))
        }
    }

    pub async fn put(&self, key: &str, data: Vec<u8>) -> Result<UploadMetadata> {
        let path = self.resolve(key);
        let size = data.len();
        let put_result = self.store.put(&path, data.into()).await?;
        tracing::debug!(key, size, "put object");
        Ok(UploadMetadata { key: key.to_string(), etag: put_result.e_tag.clone(), size })
    }

    pub async fn get(&self, key: &str) -> Result<Vec<u8>> {
        let path = self.resolve(key);
        let result = self.store.get(&path).await.map_err(|e| match e {
            object_store::Error::NotFound { .. } => StorageError::NotFound(key.to_string()),
            other => other.into(),
        })?;
        let bytes = result.bytes().await?;
        Ok(bytes.to_vec())
    }

    pub async fn exists(&self, key: &str) -> Result<bool> {
        let path = self.resolve(key);
        match self.store.head(&path).await {
            Ok(_) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn delete(&self, key: &str) -> Result<()> {
        let path = self.resolve(key);
        match self.store.delete(&path).await {
            Ok(()) | Err(object_store::Error::NotFound { .. }) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let path = self.resolve(prefix);
        let mut stream = self.store.list(Some(&path));
        let mut keys = Vec::new();
        while let Some(meta) = stream.next().await {
            keys.push(meta?.location.to_string());
        }
        Ok(keys)
    }
}

/// Trait form of the client above, used where callers need to mock the
/// store (e.g. exercising §4.7's "ObjectStore not configured → 503" path).
#[async_trait]
pub trait ObjectStoreLike: Send + Sync {
    async fn get(&self, key: &str) -> Result<Vec<u8>>;
    async fn put(&self, key: &str, data: Vec<u8>) -> Result<UploadMetadata>;
    async fn exists(&self, key: &str) -> Result<bool>;
    async fn delete(&self, key: &str) -> Result<()>;
}

#[async_trait]
impl ObjectStoreLike for StorageClient {
    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        StorageClient::get(self, key).await
    }
    async fn put(&self, key: &str, data: Vec<u8>) -> Result<UploadMetadata> {
        StorageClient::put(self, key, data).await
    }
    async fn exists(&self, key: &str) -> Result<bool> {
        StorageClient::exists(self, key).await
    }
    async fn delete(&self, key: &str) -> Result<()> {
        StorageClient::delete(self, key).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let client = StorageClient::in_memory();
        client.put("logs/job-1/stdout.json", b"[]".to_vec()).await.unwrap();
        assert!(client.exists("logs/job-1/stdout.json").await.unwrap());
        assert_eq!(client.get("logs/job-1/stdout.json").await.unwrap(), b"[]");
    }

    #[tokio::test]
    async fn missing_key_is_not_found() {
        let client = StorageClient::in_memory();
        let result = client.get("nope").await;
        assert!(matches!(result, Err(StorageError::NotFound(_))));
    }

    #[tokio::test]
    async fn delete_then_exists_is_false() {
        let client = StorageClient::in_memory();
        client.put("k", b"v".to_vec()).await.unwrap();
        client.delete("k").await.unwrap();
        assert!(!client.exists("k").await.unwrap());
    }

    #[tokio::test]
    async fn list_returns_prefix_matches() {
        let client = StorageClient::in_memory();
        client.put("logs/job-1/stdout.json", b"[]".to_vec()).await.unwrap();
        client.put("logs/job-1/stderr.json", b"[]".to_vec()).await.unwrap();
        client.put("logs/job-2/stdout.json", b"[]".to_vec()).await.unwrap();
        let keys = client.list("logs/job-1").await.unwrap();
        assert_eq!(keys.len(), 2);
    }
}
