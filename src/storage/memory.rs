use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::RwLock;

use super::{AssetRef, ObjectStore, StorageError};

/// Process-local store keyed by object key.
#[derive(Clone, Default)]
pub struct MemoryObjectStore {
    inner: Arc<RwLock<HashMap<String, Bytes>>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put(&self, key: &str, data: Bytes, _content_type: &str) -> Result<AssetRef, StorageError> {
        let mut guard = self.inner.write().await;
        guard.insert(key.to_string(), data);
        Ok(AssetRef {
            key: key.to_string(),
            url: format!("memory://{}", key),
        })
    }

    async fn get(&self, reference: &AssetRef) -> Result<Bytes, StorageError> {
        let guard = self.inner.read().await;
        guard
            .get(&reference.key)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(reference.key.clone()))
    }
}
