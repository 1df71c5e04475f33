// S3 object store backed by rust-s3

use async_trait::async_trait;
use bytes::Bytes;
use s3::creds::Credentials;
use s3::bucket::Bucket;
use s3::region::Region;
use tracing::{debug, info};

use super::{AssetRef, ObjectStore, StorageError};
use crate::config::StorageConfig;

pub struct S3Store {
    bucket: Box<Bucket>,
    public_base: String,
}

impl S3Store {
    pub fn from_config(config: &StorageConfig) -> Result<Self, StorageError> {
        if config.s3_bucket.is_empty() {
            return Err(StorageError::Config("S3_BUCKET must be set".to_string()));
        }

        let region = match &config.s3_endpoint {
            Some(endpoint) => Region::Custom {
                region: config.s3_region.clone(),
                endpoint: endpoint.clone(),
            },
            None => config
                .s3_region
                .parse()
                .map_err(|e| StorageError::Config(format!("Invalid S3 region: {}", e)))?,
        };

        let credentials = Credentials::new(
            config.s3_access_key_id.as_deref(),
            config.s3_secret_access_key.as_deref(),
            None,
            None,
            None,
        )
        .map_err(|e| StorageError::Config(format!("Invalid S3 credentials: {}", e)))?;

        let bucket: Box<Bucket> = Bucket::new(&config.s3_bucket, region, credentials)
            .map_err(|e| StorageError::Config(e.to_string()))?
            .into();

        // Custom endpoints (MinIO, LocalStack) generally need path-style addressing
        let (bucket, public_base): (Box<Bucket>, String) = match &config.s3_endpoint {
            Some(endpoint) => (
                bucket.with_path_style().into(),
                format!("{}/{}", endpoint.trim_end_matches('/'), config.s3_bucket),
            ),
            None => (
                bucket,
                format!("https://{}.s3.{}.amazonaws.com", config.s3_bucket, config.s3_region),
            ),
        };

        info!(bucket = %config.s3_bucket, region = %config.s3_region, "S3 store configured");
        Ok(Self { bucket, public_base })
    }

    fn public_url(&self, key: &str) -> String {
        format!("{}/{}", self.public_base, key)
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn put(&self, key: &str, data: Bytes, content_type: &str) -> Result<AssetRef, StorageError> {
        debug!(key, bytes = data.len(), content_type, "Uploading object");

        let response = self
            .bucket
            .put_object_with_content_type(key, &data, content_type)
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        let status = response.status_code();
        if !(200..300).contains(&status) {
            return Err(StorageError::Backend(format!("PUT {} returned HTTP {}", key, status)));
        }

        Ok(AssetRef {
            key: key.to_string(),
            url: self.public_url(key),
        })
    }

    async fn get(&self, reference: &AssetRef) -> Result<Bytes, StorageError> {
        let response = self
            .bucket
            .get_object(&reference.key)
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        match response.status_code() {
            200..=299 => Ok(Bytes::copy_from_slice(response.as_slice())),
            404 => Err(StorageError::NotFound(reference.key.clone())),
            status => Err(StorageError::Backend(format!(
                "GET {} returned HTTP {}",
                reference.key, status
            ))),
        }
    }
}
