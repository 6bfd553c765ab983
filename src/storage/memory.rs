use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::RwLock;

use crate::core::error::StoreError;

use super::parts;
use super::{until_cancelled, DeleteRequest, ObjectStore, UploadRequest};

// ---------------------------------------------------------------------------
// InMemoryObjectStore
// ---------------------------------------------------------------------------

/// In-memory backend for unit and router tests.
///
/// Keeps objects in a `HashMap` behind a `RwLock`, records every call, and
/// can be told to fail so error paths can be exercised.
#[derive(Default)]
pub struct InMemoryObjectStore {
    objects: Arc<RwLock<HashMap<(String, String), StoredObject>>>,
    calls: Arc<RwLock<Vec<StoreCall>>>,
    failure: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub data: Bytes,
    pub content_type: Option<String>,
    pub cache_control: Option<String>,
}

/// A call observed by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    Upload {
        bucket: String,
        path: String,
        content_type: Option<String>,
        cache_control: Option<String>,
    },
    Delete {
        bucket: String,
        path: String,
    },
}

impl InMemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose every operation fails with `reason`.
    pub fn failing(reason: impl Into<String>) -> Self {
        Self {
            failure: Some(reason.into()),
            ..Self::default()
        }
    }

    pub async fn get(&self, bucket: &str, path: &str) -> Option<StoredObject> {
        self.objects
            .read()
            .await
            .get(&(bucket.to_string(), path.to_string()))
            .cloned()
    }

    pub async fn object_count(&self) -> usize {
        self.objects.read().await.len()
    }

    pub async fn calls(&self) -> Vec<StoreCall> {
        self.calls.read().await.clone()
    }
}

impl ObjectStore for InMemoryObjectStore {
    async fn upload(&self, request: UploadRequest) -> Result<(), StoreError> {
        let UploadRequest {
            bucket,
            path,
            body,
            content_type,
            cache_control,
            cancel,
        } = request;

        self.calls.write().await.push(StoreCall::Upload {
            bucket: bucket.clone(),
            path: path.clone(),
            content_type: content_type.clone(),
            cache_control: cache_control.clone(),
        });

        until_cancelled(&cancel, &path, async {
            let data = parts::collect(body).await.map_err(StoreError::from)?;
            if let Some(reason) = &self.failure {
                return Err(StoreError::Upload {
                    path: path.clone(),
                    reason: reason.clone(),
                });
            }
            self.objects.write().await.insert(
                (bucket.clone(), path.clone()),
                StoredObject {
                    data,
                    content_type,
                    cache_control,
                },
            );
            Ok(())
        })
        .await
    }

    async fn delete(&self, request: DeleteRequest) -> Result<(), StoreError> {
        let DeleteRequest {
            bucket,
            path,
            cancel,
        } = request;

        self.calls.write().await.push(StoreCall::Delete {
            bucket: bucket.clone(),
            path: path.clone(),
        });

        until_cancelled(&cancel, &path, async {
            if let Some(reason) = &self.failure {
                return Err(StoreError::Delete {
                    path: path.clone(),
                    reason: reason.clone(),
                });
            }
            self.objects
                .write()
                .await
                .remove(&(bucket.clone(), path.clone()));
            Ok(())
        })
        .await
    }
}
