use tracing::info;

use crate::core::config::{StorageConfig, UploadDriver};
use crate::core::error::StoreError;

use super::mediastore::MediaStore;
use super::s3::{S3Options, S3Store};
use super::{DeleteRequest, ObjectStore, UploadRequest};

/// The object store selected by `UPLOAD_DRIVER`.
pub enum Backend {
    S3(S3Store),
    MediaStore(MediaStore),
}

impl Backend {
    /// Build the configured backend. Failures here are fatal at startup.
    pub async fn from_config(config: &StorageConfig) -> Result<Self, StoreError> {
        let backend = match config.driver {
            UploadDriver::S3 => Backend::S3(S3Store::new(S3Options::from_config(config)).await?),
            UploadDriver::MediaStore => Backend::MediaStore(MediaStore::new(&config.region).await?),
        };
        info!(
            driver = %config.driver,
            bucket = %config.bucket,
            region = %config.region,
            "object store backend ready"
        );
        Ok(backend)
    }

    pub fn driver(&self) -> UploadDriver {
        match self {
            Backend::S3(_) => UploadDriver::S3,
            Backend::MediaStore(_) => UploadDriver::MediaStore,
        }
    }
}

impl ObjectStore for Backend {
    async fn upload(&self, request: UploadRequest) -> Result<(), StoreError> {
        match self {
            Backend::S3(store) => store.upload(request).await,
            Backend::MediaStore(store) => store.upload(request).await,
        }
    }

    async fn delete(&self, request: DeleteRequest) -> Result<(), StoreError> {
        match self {
            Backend::S3(store) => store.delete(request).await,
            Backend::MediaStore(store) => store.delete(request).await,
        }
    }
}
