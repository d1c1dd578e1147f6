//! S3-compatible object storage backend.

use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_credential_types::Credentials;
use aws_sdk_s3::Client;
use aws_sdk_s3::primitives::ByteStream;
use tracing::{debug, instrument};

use super::{ObjectStorageConfig, StorageBackend, StorageError, StorageKind};

/// Stores keys as objects in one bucket.
#[derive(Debug, Clone)]
pub struct ObjectStorageBackend {
    client: Client,
    config: ObjectStorageConfig,
}

impl ObjectStorageBackend {
    /// Builds the SDK client for `config`.
    ///
    /// Path-style addressing is forced so self-hosted endpoints work.
    pub async fn connect(config: ObjectStorageConfig) -> Result<Self, StorageError> {
        config.validate()?;
        let credentials = Credentials::new(
            config.access_key.clone(),
            config.secret_key.clone(),
            None,
            None,
            "series-downloader-env",
        );
        let sdk_config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .credentials_provider(credentials)
            .endpoint_url(config.endpoint_url.clone())
            .load()
            .await;
        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(true)
            .build();
        Ok(Self {
            client: Client::from_conf(s3_config),
            config,
        })
    }

    /// Bucket name.
    #[must_use]
    pub fn bucket(&self) -> &str {
        &self.config.bucket
    }
}

#[async_trait]
impl StorageBackend for ObjectStorageBackend {
    fn kind(&self) -> StorageKind {
        StorageKind::Cloud
    }

    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        match self
            .client
            .head_object()
            .bucket(&self.config.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(error) => {
                let service = error.into_service_error();
                if service.is_not_found() {
                    Ok(false)
                } else {
                    Err(StorageError::remote("head", key, service.to_string()))
                }
            }
        }
    }

    #[instrument(skip(self))]
    async fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let prefix = format!("{}/", prefix.trim_end_matches('/'));
        let mut keys = Vec::new();
        let mut continuation: Option<String> = None;
        loop {
            let page = self
                .client
                .list_objects_v2()
                .bucket(&self.config.bucket)
                .prefix(&prefix)
                .delimiter("/")
                .set_continuation_token(continuation.take())
                .send()
                .await
                .map_err(|e| StorageError::remote("list", &prefix, e.into_service_error().to_string()))?;

            keys.extend(
                page.contents()
                    .iter()
                    .filter_map(|object| object.key())
                    .filter(|key| key.len() > prefix.len())
                    .map(str::to_string),
            );

            match page.next_continuation_token() {
                Some(token) if page.is_truncated().unwrap_or(false) => continuation = Some(token.to_string()),
                _ => break,
            }
        }
        keys.sort();
        debug!(count = keys.len(), "listed objects");
        Ok(keys)
    }

    async fn read_metadata(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let output = match self
            .client
            .get_object()
            .bucket(&self.config.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(output) => output,
            Err(error) => {
                let service = error.into_service_error();
                if service.is_no_such_key() {
                    return Ok(None);
                }
                return Err(StorageError::remote("get", key, service.to_string()));
            }
        };
        let bytes = output
            .body
            .collect()
            .await
            .map_err(|e| StorageError::remote("get", key, e.to_string()))?
            .into_bytes();
        Ok(Some(bytes.to_vec()))
    }

    #[instrument(skip(self, bytes), fields(bytes = bytes.len()))]
    async fn write_item(&self, key: &str, bytes: &[u8], content_type: &str) -> Result<String, StorageError> {
        self.client
            .put_object()
            .bucket(&self.config.bucket)
            .key(key)
            .body(ByteStream::from(bytes.to_vec()))
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| StorageError::remote("put", key, e.into_service_error().to_string()))?;
        Ok(self.config.object_url(key))
    }

    async fn write_metadata(&self, key: &str, bytes: &[u8]) -> Result<(), StorageError> {
        self.client
            .put_object()
            .bucket(&self.config.bucket)
            .key(key)
            .body(ByteStream::from(bytes.to_vec()))
            .content_type("application/json")
            .send()
            .await
            .map_err(|e| StorageError::remote("put", key, e.into_service_error().to_string()))?;
        Ok(())
    }
}
