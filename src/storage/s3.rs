use std::collections::VecDeque;

use aws_config::retry::RetryConfig;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_s3::config::Credentials;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart};
use aws_sdk_s3::Client;
use bytes::Bytes;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::core::config::StorageConfig;
use crate::core::error::StoreError;
use crate::core::redact::Redacted;

use super::parts::{PartReader, DEFAULT_PART_SIZE};
use super::{until_cancelled, DeleteRequest, ObjectStore, UploadRequest};

// ---------------------------------------------------------------------------
// Construction options
// ---------------------------------------------------------------------------

/// Options for building an [`S3Store`].
#[derive(Debug, Clone)]
pub struct S3Options {
    pub region: String,
    /// Local or emulated endpoint. Enables path-style addressing, and a
    /// scheme-less value is reached over plain HTTP.
    pub endpoint: Option<String>,
    /// `None` resolves credentials from the ambient provider chain.
    pub credentials: Option<StaticCredentials>,
}

#[derive(Debug, Clone)]
pub struct StaticCredentials {
    pub access_key_id: String,
    pub secret_access_key: Redacted<String>,
}

impl S3Options {
    /// Implicit auth talks to AWS proper. Explicit auth targets a local
    /// endpoint with static keys.
    pub fn from_config(config: &StorageConfig) -> Self {
        if config.implicit_auth {
            Self {
                region: config.region.clone(),
                endpoint: None,
                credentials: None,
            }
        } else {
            Self {
                region: config.region.clone(),
                endpoint: config.endpoint.clone(),
                credentials: Some(StaticCredentials {
                    access_key_id: config.access_key_id.clone(),
                    secret_access_key: config.secret_access_key.clone(),
                }),
            }
        }
    }
}

/// Prefix scheme-less endpoints with `http://`.
fn endpoint_url(endpoint: &str) -> String {
    if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
        endpoint.to_string()
    } else {
        format!("http://{}", endpoint)
    }
}

fn upload_error<E: std::error::Error>(path: &str, err: E) -> StoreError {
    StoreError::Upload {
        path: path.to_string(),
        reason: DisplayErrorContext(err).to_string(),
    }
}

// ---------------------------------------------------------------------------
// S3Store
// ---------------------------------------------------------------------------

/// Backend for AWS S3 and S3-compatible stores.
///
/// Bodies that fit in one part go out as a single `PutObject`. Larger bodies
/// are streamed as a multipart upload, aborted on failure or cancellation.
pub struct S3Store {
    client: Client,
    part_size: usize,
}

impl S3Store {
    pub async fn new(options: S3Options) -> Result<Self, StoreError> {
        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(options.region.clone()))
            .retry_config(RetryConfig::disabled());

        if let Some(creds) = &options.credentials {
            loader = loader.credentials_provider(Credentials::new(
                creds.access_key_id.clone(),
                creds.secret_access_key.expose().clone(),
                None,
                None,
                "upload-proxy-static",
            ));
        }

        let sdk_config = loader.load().await;
        let mut builder = aws_sdk_s3::config::Builder::from(&sdk_config);
        if let Some(endpoint) = &options.endpoint {
            builder = builder
                .endpoint_url(endpoint_url(endpoint))
                .force_path_style(true);
        }

        debug!(
            region = %options.region,
            endpoint = ?options.endpoint,
            static_credentials = options.credentials.is_some(),
            "S3 client configured"
        );

        Ok(Self {
            client: Client::from_conf(builder.build()),
            part_size: DEFAULT_PART_SIZE,
        })
    }

    async fn put_object(
        &self,
        bucket: &str,
        path: &str,
        data: Bytes,
        content_type: Option<&str>,
        cache_control: Option<&str>,
    ) -> Result<(), StoreError> {
        self.client
            .put_object()
            .bucket(bucket)
            .key(path)
            .body(ByteStream::from(data))
            .set_content_type(content_type.map(str::to_string))
            .set_cache_control(cache_control.map(str::to_string))
            .send()
            .await
            .map_err(|e| upload_error(path, e))?;
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    async fn put_multipart(
        &self,
        bucket: &str,
        path: &str,
        head: [Bytes; 2],
        reader: &mut PartReader,
        content_type: Option<&str>,
        cache_control: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<(), StoreError> {
        let created = until_cancelled(cancel, path, async {
            self.client
                .create_multipart_upload()
                .bucket(bucket)
                .key(path)
                .set_content_type(content_type.map(str::to_string))
                .set_cache_control(cache_control.map(str::to_string))
                .send()
                .await
                .map_err(|e| upload_error(path, e))
        })
        .await?;

        let upload_id = created
            .upload_id()
            .ok_or_else(|| StoreError::Upload {
                path: path.to_string(),
                reason: "CreateMultipartUpload returned no upload id".to_string(),
            })?
            .to_string();

        debug!(bucket, path, %upload_id, "multipart upload started");

        let result = until_cancelled(
            cancel,
            path,
            self.send_parts(bucket, path, &upload_id, head, reader),
        )
        .await;

        if let Err(e) = &result {
            warn!(bucket, path, %upload_id, error = %e, "aborting multipart upload");
            if let Err(abort_err) = self
                .client
                .abort_multipart_upload()
                .bucket(bucket)
                .key(path)
                .upload_id(&upload_id)
                .send()
                .await
            {
                warn!(
                    bucket,
                    path,
                    %upload_id,
                    error = %DisplayErrorContext(&abort_err),
                    "failed to abort multipart upload"
                );
            }
        }
        result
    }

    async fn send_parts(
        &self,
        bucket: &str,
        path: &str,
        upload_id: &str,
        head: [Bytes; 2],
        reader: &mut PartReader,
    ) -> Result<(), StoreError> {
        let mut queued = VecDeque::from(head);
        let mut completed = Vec::new();
        let mut part_number: i32 = 0;

        loop {
            let data = match queued.pop_front() {
                Some(data) => data,
                None => match reader.next_part().await? {
                    Some(data) => data,
                    None => break,
                },
            };
            part_number += 1;

            let output = self
                .client
                .upload_part()
                .bucket(bucket)
                .key(path)
                .upload_id(upload_id)
                .part_number(part_number)
                .body(ByteStream::from(data))
                .send()
                .await
                .map_err(|e| upload_error(path, e))?;

            completed.push(
                CompletedPart::builder()
                    .set_e_tag(output.e_tag().map(str::to_string))
                    .part_number(part_number)
                    .build(),
            );
        }

        self.client
            .complete_multipart_upload()
            .bucket(bucket)
            .key(path)
            .upload_id(upload_id)
            .multipart_upload(
                CompletedMultipartUpload::builder()
                    .set_parts(Some(completed))
                    .build(),
            )
            .send()
            .await
            .map_err(|e| upload_error(path, e))?;

        debug!(bucket, path, parts = part_number, "multipart upload completed");
        Ok(())
    }
}

impl ObjectStore for S3Store {
    async fn upload(&self, request: UploadRequest) -> Result<(), StoreError> {
        let UploadRequest {
            bucket,
            path,
            body,
            content_type,
            cache_control,
            cancel,
        } = request;
        let content_type = content_type.as_deref();
        let cache_control = cache_control.as_deref();

        let mut reader = PartReader::new(body, self.part_size);
        let first = until_cancelled(&cancel, &path, async {
            reader
                .next_part()
                .await
                .map(Option::unwrap_or_default)
                .map_err(StoreError::from)
        })
        .await?;
        let second = if reader.is_exhausted() {
            None
        } else {
            until_cancelled(&cancel, &path, async {
                reader.next_part().await.map_err(StoreError::from)
            })
            .await?
        };

        match second {
            None => {
                until_cancelled(
                    &cancel,
                    &path,
                    self.put_object(&bucket, &path, first, content_type, cache_control),
                )
                .await
            }
            Some(second) => {
                self.put_multipart(
                    &bucket,
                    &path,
                    [first, second],
                    &mut reader,
                    content_type,
                    cache_control,
                    &cancel,
                )
                .await
            }
        }
    }

    async fn delete(&self, request: DeleteRequest) -> Result<(), StoreError> {
        let DeleteRequest {
            bucket,
            path,
            cancel,
        } = request;

        until_cancelled(&cancel, &path, async {
            self.client
                .delete_object()
                .bucket(&bucket)
                .key(&path)
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
