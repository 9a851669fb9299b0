//! Read-only access to a remote GRIB archive (anonymous S3, HTTP or memory).

use bytes::Bytes;
use object_store::{
    aws::AmazonS3Builder, http::HttpBuilder, memory::InMemory, path::Path, ObjectStore,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, instrument};

use reference_common::{RefError, RefResult};

/// Configuration for the archive connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchiveConfig {
    /// Bucket name
    pub bucket: String,
    /// AWS region of the bucket
    pub region: String,
    /// Alternate endpoint (S3-compatible mirrors)
    #[serde(default)]
    pub endpoint: Option<String>,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            bucket: "noaa-gefs-retrospective".to_string(),
            region: "us-east-1".to_string(),
            endpoint: None,
        }
    }
}

/// Archive client. Keys are relative to the bucket root.
#[derive(Clone)]
pub struct RemoteArchive {
    store: Arc<dyn ObjectStore>,
    name: String,
}

impl std::fmt::Debug for RemoteArchive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteArchive")
            .field("name", &self.name)
            .finish()
    }
}

impl RemoteArchive {
    /// Public bucket with unsigned requests.
    pub fn s3_anonymous(config: &ArchiveConfig) -> RefResult<Self> {
        let mut builder = AmazonS3Builder::new()
            .with_bucket_name(&config.bucket)
            .with_region(&config.region)
            .with_skip_signature(true);

        if let Some(endpoint) = &config.endpoint {
            builder = builder.with_endpoint(endpoint);
        }

        let store = builder
            .build()
            .map_err(|e| RefError::StorageError(format!("Failed to create S3 client: {}", e)))?;

        Ok(Self {
            store: Arc::new(store),
            name: format!("s3://{}", config.bucket),
        })
    }

    /// Archive served over plain HTTP(S) from `base_url`.
    pub fn http(base_url: &str) -> RefResult<Self> {
        let store = HttpBuilder::new()
            .with_url(base_url)
            .build()
            .map_err(|e| RefError::StorageError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            store: Arc::new(store),
            name: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn in_memory() -> Self {
        Self::from_store(Arc::new(InMemory::new()), "memory://")
    }

    pub fn from_store(store: Arc<dyn ObjectStore>, name: impl Into<String>) -> Self {
        Self {
            store,
            name: name.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Read a whole object.
    #[instrument(skip(self), fields(archive = %self.name, key = %key))]
    pub async fn get(&self, key: &str) -> RefResult<Bytes> {
        let location = Path::from(key);

        let result = self
            .store
            .get(&location)
            .await
            .map_err(|e| RefError::StorageError(format!("Failed to read {}: {}", key, e)))?;

        let bytes = result
            .bytes()
            .await
            .map_err(|e| RefError::StorageError(format!("Failed to read bytes: {}", e)))?;

        debug!(size = bytes.len(), "Read object");
        Ok(bytes)
    }

    /// Object size in bytes, from a metadata request.
    #[instrument(skip(self), fields(archive = %self.name, key = %key))]
    pub async fn size(&self, key: &str) -> RefResult<u64> {
        let location = Path::from(key);

        let meta = self
            .store
            .head(&location)
            .await
            .map_err(|e| RefError::StorageError(format!("Failed to stat {}: {}", key, e)))?;

        debug!(size = meta.size, "Object metadata");
        Ok(meta.size as u64)
    }

    /// Write an object. Only meaningful for in-memory archives used in
    /// tests and local mirrors.
    pub async fn put(&self, key: &str, data: Bytes) -> RefResult<()> {
        let location = Path::from(key);

        self.store
            .put(&location, data.into())
            .await
            .map_err(|e| RefError::StorageError(format!("Failed to write {}: {}", key, e)))?;

        Ok(())
    }
}
