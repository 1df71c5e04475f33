//! Object storage for uploaded source documents.
//!
//! The pipeline only needs `put` and `get`; both the S3 client and the
//! in-memory store used for local runs and tests implement [`ObjectStore`].

use async_trait::async_trait;
use bytes::Bytes;
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;

use crate::config::StorageConfig;

pub mod memory;
pub mod s3_client;

pub use memory::MemoryObjectStore;
pub use s3_client::S3Store;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Storage backend error: {0}")]
    Backend(String),

    #[error("Storage misconfigured: {0}")]
    Config(String),
}

/// Where an uploaded object lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetRef {
    pub key: String,
    /// Public URL recorded on the job as `sourceAssetRef`.
    pub url: String,
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(&self, key: &str, data: Bytes, content_type: &str) -> Result<AssetRef, StorageError>;

    async fn get(&self, reference: &AssetRef) -> Result<Bytes, StorageError>;
}

static RE_UNSAFE_FILENAME_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^a-zA-Z0-9._-]").unwrap());

/// Replace every character outside `[A-Za-z0-9._-]` with `-`.
pub fn sanitize_filename(name: &str) -> String {
    let sanitized = RE_UNSAFE_FILENAME_CHARS.replace_all(name, "-").into_owned();
    if sanitized.is_empty() {
        "document.pdf".to_string()
    } else {
        sanitized
    }
}

/// `{prefix}/{uuid}-{sanitized filename}`; the random id keeps keys unique.
pub fn object_key(prefix: &str, sanitized_filename: &str) -> String {
    let prefix = prefix.trim_matches('/');
    let id = uuid::Uuid::new_v4();
    if prefix.is_empty() {
        format!("{}-{}", id, sanitized_filename)
    } else {
        format!("{}/{}-{}", prefix, id, sanitized_filename)
    }
}

/// Build the store selected by `STORAGE_PROVIDER`.
pub fn build_object_store(config: &StorageConfig) -> Result<Arc<dyn ObjectStore>, StorageError> {
    match config.provider.as_str() {
        "s3" => Ok(Arc::new(S3Store::from_config(config)?)),
        "memory" => {
            tracing::warn!("Using in-memory object storage; uploads are lost on restart");
            Ok(Arc::new(MemoryObjectStore::new()))
        }
        other => Err(StorageError::Config(format!("Unknown storage provider: {}", other))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("annual report (final).pdf"), "annual-report--final-.pdf");
        assert_eq!(sanitize_filename("ok_name-1.pdf"), "ok_name-1.pdf");
        assert_eq!(sanitize_filename("../../etc/passwd"), "..-..-etc-passwd");
        assert_eq!(sanitize_filename("résumé.pdf"), "r-sum-.pdf");
        assert_eq!(sanitize_filename(""), "document.pdf");
    }

    #[test]
    fn test_object_key_is_prefixed_and_unique() {
        let a = object_key("conversions", "doc.pdf");
        let b = object_key("conversions/", "doc.pdf");
        assert!(a.starts_with("conversions/"));
        assert!(a.ends_with("-doc.pdf"));
        assert_ne!(a, b);
        assert!(!object_key("", "doc.pdf").starts_with('/'));
    }
}
