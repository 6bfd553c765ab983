use std::time::Instant;

use axum::body::Body;
use axum::extract::State;
use axum::http::{Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use futures::TryStreamExt;
use percent_encoding::percent_decode_str;
use tracing::{debug, error};

use crate::core::error::StoreError;
use crate::observability::metrics as obs;
use crate::storage::{content_type_for_path, DeleteRequest, ObjectStore, UploadRequest};

use super::router::AppState;

// ---------------------------------------------------------------------------
// Health check
// ---------------------------------------------------------------------------

/// `GET <healthcheck_path>`
pub async fn healthcheck() -> StatusCode {
    StatusCode::OK
}

pub async fn method_not_allowed() -> Response {
    (StatusCode::METHOD_NOT_ALLOWED, "method not allowed").into_response()
}

// ---------------------------------------------------------------------------
// Object upload / delete
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operation {
    Upload,
    Delete,
}

impl Operation {
    fn from_method(method: &Method) -> Option<Self> {
        match *method {
            Method::POST | Method::PUT => Some(Operation::Upload),
            Method::DELETE => Some(Operation::Delete),
            _ => None,
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            Operation::Upload => "upload",
            Operation::Delete => "delete",
        }
    }
}

/// Object key for a request path: percent-decoded, leading slashes removed.
///
/// Fails when the decoded bytes are not UTF-8, so a key is never silently
/// rewritten.
pub fn object_key(path: &str) -> Result<String, std::str::Utf8Error> {
    let decoded = percent_decode_str(path).decode_utf8()?;
    Ok(decoded.trim_start_matches('/').to_string())
}

/// `POST|PUT|DELETE /<key>`
///
/// Flow:
/// 1. Reject other methods with 405
/// 2. Derive key, content type and cache-control from the path
/// 3. Run the store call on its own task, cancelled if the client goes away
/// 4. 200 `OK`, or 500 with the backend's message
pub async fn handle_object<S: ObjectStore>(
    State(state): State<AppState<S>>,
    method: Method,
    uri: Uri,
    body: Body,
) -> Response {
    let start = Instant::now();
    let Some(operation) = Operation::from_method(&method) else {
        return method_not_allowed().await;
    };

    let key = match object_key(uri.path()) {
        Ok(key) => key,
        Err(e) => {
            obs::record_request(operation.as_str(), false, start.elapsed());
            error!(path = %uri.path(), error = %e, "rejecting non UTF-8 object key");
            let message = format!("invalid object key {}: {e}", uri.path());
            return (StatusCode::INTERNAL_SERVER_ERROR, message).into_response();
        }
    };
    let content_type = content_type_for_path(&key);
    let cache_control = state.rules.header_value(&key);
    let bucket = state.bucket.to_string();

    // The store call runs detached and owns the token. If this handler is
    // dropped (client disconnect) the guard cancels the token and the task
    // unwinds through the backend's cancellation path.
    let cancel = state.shutdown.child_token();
    let _cancel_on_drop = cancel.clone().drop_guard();

    let store = state.store.clone();
    let task = match operation {
        Operation::Upload => {
            let request = UploadRequest {
                bucket: bucket.clone(),
                path: key.clone(),
                body: Box::pin(body.into_data_stream().map_err(std::io::Error::other)),
                content_type: content_type.map(str::to_string),
                cache_control: cache_control.clone(),
                cancel,
            };
            tokio::spawn(async move { store.upload(request).await })
        }
        Operation::Delete => {
            let request = DeleteRequest {
                bucket: bucket.clone(),
                path: key.clone(),
                cancel,
            };
            tokio::spawn(async move { store.delete(request).await })
        }
    };

    let result = task.await.unwrap_or_else(|e| {
        let reason = format!("backend task failed: {e}");
        Err(match operation {
            Operation::Upload => StoreError::Upload {
                path: key.clone(),
                reason,
            },
            Operation::Delete => StoreError::Delete {
                path: key.clone(),
                reason,
            },
        })
    });

    let elapsed = start.elapsed();
    obs::record_request(operation.as_str(), result.is_ok(), elapsed);

    match result {
        Ok(()) => {
            debug!(
                %bucket,
                object_key = %key,
                content_type,
                cache_control = cache_control.as_deref(),
                elapsed_ms = elapsed.as_millis() as u64,
                "{} finished",
                operation.as_str()
            );
            (StatusCode::OK, "OK").into_response()
        }
        Err(e) => {
            error!(
                %bucket,
                object_key = %key,
                content_type,
                error = %e,
                error_kind = e.kind(),
                "{} failed",
                operation.as_str()
            );
            (StatusCode::INTERNAL_SERVER_ERROR, e.message()).into_response()
        }
    }
}
