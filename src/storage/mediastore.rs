use aws_config::retry::RetryConfig;
use aws_config::{BehaviorVersion, Region, SdkConfig};
use aws_sdk_mediastoredata::error::DisplayErrorContext;
use aws_sdk_mediastoredata::primitives::ByteStream;
use dashmap::DashMap;
use tracing::debug;

use crate::core::error::StoreError;

use super::parts;
use super::{until_cancelled, DeleteRequest, ObjectStore, UploadRequest};

// ---------------------------------------------------------------------------
// MediaStore backend
// ---------------------------------------------------------------------------

/// Backend for AWS Elemental MediaStore.
///
/// The bucket of each request names a MediaStore container. Its data
/// endpoint is looked up once with `DescribeContainer` and the data-plane
/// client is cached per container.
pub struct MediaStore {
    sdk_config: SdkConfig,
    control: aws_sdk_mediastore::Client,
    data_clients: DashMap<String, aws_sdk_mediastoredata::Client>,
}

impl MediaStore {
    pub async fn new(region: &str) -> Result<Self, StoreError> {
        if region.is_empty() {
            return Err(StoreError::Init {
                driver: "mediastore",
                reason: "region must not be empty".to_string(),
            });
        }

        let sdk_config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(region.to_string()))
            .retry_config(RetryConfig::disabled())
            .load()
            .await;
        let control = aws_sdk_mediastore::Client::new(&sdk_config);

        Ok(Self {
            sdk_config,
            control,
            data_clients: DashMap::new(),
        })
    }

    /// Pin the data endpoint of `container`, skipping `DescribeContainer`.
    #[cfg(test)]
    pub fn with_endpoint(self, container: &str, endpoint: &str) -> Self {
        let client = self.data_client_for(endpoint);
        self.data_clients.insert(container.to_string(), client);
        self
    }

    fn data_client_for(&self, endpoint: &str) -> aws_sdk_mediastoredata::Client {
        let config = aws_sdk_mediastoredata::config::Builder::from(&self.sdk_config)
            .endpoint_url(endpoint)
            .build();
        aws_sdk_mediastoredata::Client::from_conf(config)
    }

    async fn data_client(
        &self,
        container: &str,
    ) -> Result<aws_sdk_mediastoredata::Client, String> {
        if let Some(client) = self.data_clients.get(container) {
            return Ok(client.clone());
        }

        let output = self
            .control
            .describe_container()
            .container_name(container)
            .send()
            .await
            .map_err(|e| DisplayErrorContext(&e).to_string())?;
        let endpoint = output
            .container()
            .and_then(|c| c.endpoint())
            .ok_or_else(|| format!("container {} has no data endpoint yet", container))?;

        debug!(container, endpoint, "resolved MediaStore data endpoint");
        let client = self.data_client_for(endpoint);
        self.data_clients
            .insert(container.to_string(), client.clone());
        Ok(client)
    }
}

impl ObjectStore for MediaStore {
    async fn upload(&self, request: UploadRequest) -> Result<(), StoreError> {
        let UploadRequest {
            bucket,
            path,
            body,
            content_type,
            cache_control,
            cancel,
        } = request;

        until_cancelled(&cancel, &path, async {
            // MediaStore objects are capped at 25 MB, so the body is buffered.
            let data = parts::collect(body).await.map_err(StoreError::from)?;
            let client = self
                .data_client(&bucket)
                .await
                .map_err(|reason| StoreError::Upload {
                    path: path.clone(),
                    reason,
                })?;
            client
                .put_object()
                .path(&path)
                .body(ByteStream::from(data))
                .set_content_type(content_type)
                .set_cache_control(cache_control)
                .send()
                .await
                .map(|_| ())
                .map_err(|e| StoreError::Upload {
                    path: path.clone(),
                    reason: DisplayErrorContext(&e).to_string(),
                })
        })
        .await
    }

    async fn delete(&self, request: DeleteRequest) -> Result<(), StoreError> {
        let DeleteRequest {
            bucket,
            path,
            cancel,
        } = request;

        until_cancelled(&cancel, &path, async {
            let client = self
                .data_client(&bucket)
                .await
                .map_err(|reason| StoreError::Delete {
                    path: path.clone(),
                    reason,
                })?;
            client
                .delete_object()
                .path(&path)
                .send()
                .await
                .map(|_| ())
                .map_err(|e| StoreError::Delete {
                    path: path.clone(),
                    reason: DisplayErrorContext(&e).to_string(),
                })
        })
        .await
    }
}
