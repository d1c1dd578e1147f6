//! Object storage configuration from the environment.

use std::fmt;

use super::StorageError;

/// Region used when `REGION` is unset.
pub const DEFAULT_REGION: &str = "ap-southeast-1";

/// Credentials and location of an S3-compatible bucket.
#[derive(Clone, PartialEq, Eq)]
pub struct ObjectStorageConfig {
    /// Access key id.
    pub access_key: String,
    /// Secret access key.
    pub secret_key: String,
    /// Endpoint base URL, e.g. `https://s3.example.com`.
    pub endpoint_url: String,
    /// Bucket name.
    pub bucket: String,
    /// Region name.
    pub region: String,
}

impl fmt::Debug for ObjectStorageConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectStorageConfig")
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .field("endpoint_url", &self.endpoint_url)
            .field("bucket", &self.bucket)
            .field("region", &self.region)
            .finish()
    }
}

impl ObjectStorageConfig {
    /// Reads `ACCESS_KEY`, `SECRET_KEY`, `ENDPOINT_URL`, `BUCKET_NAME` and
    /// `REGION`, loading a `.env` file first when one exists.
    pub fn from_env() -> Result<Self, StorageError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds a config from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, StorageError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
                .ok_or_else(|| StorageError::config(format!("{name} is not set")))
        };
        let config = Self {
            access_key: required("ACCESS_KEY")?,
            secret_key: required("SECRET_KEY")?,
            endpoint_url: required("ENDPOINT_URL")?,
            bucket: required("BUCKET_NAME")?,
            region: lookup("REGION")
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
                .unwrap_or_else(|| DEFAULT_REGION.to_string()),
        };
        config.validate()?;
        Ok(config)
    }

    /// Checks that every field is usable.
    pub fn validate(&self) -> Result<(), StorageError> {
        if self.bucket.trim().is_empty() {
            return Err(StorageError::config("bucket name cannot be empty"));
        }
        if self.region.trim().is_empty() {
            return Err(StorageError::config("region cannot be empty"));
        }
        if self.access_key.trim().is_empty() || self.secret_key.trim().is_empty() {
            return Err(StorageError::config("credentials cannot be empty"));
        }
        let endpoint = url::Url::parse(&self.endpoint_url)
            .map_err(|e| StorageError::config(format!("invalid endpoint URL '{}': {e}", self.endpoint_url)))?;
        if !matches!(endpoint.scheme(), "http" | "https") {
            return Err(StorageError::config(format!(
                "endpoint URL must be http or https, got '{}'",
                self.endpoint_url
            )));
        }
        Ok(())
    }

    /// Public location of an object: `{endpoint}/{bucket}/{key}`.
    #[must_use]
    pub fn object_url(&self, key: &str) -> String {
        format!(
            "{}/{}/{}",
            self.endpoint_url.trim_end_matches('/'),
            self.bucket,
            key.trim_start_matches('/')
        )
    }
}
