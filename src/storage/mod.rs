pub mod backend;
pub mod mediastore;
pub mod memory;
pub mod parts;
pub mod s3;

use std::future::Future;
use std::pin::Pin;

use bytes::Bytes;
use futures::Stream;
use tokio_util::sync::CancellationToken;

use crate::core::cache_control::extension;
use crate::core::error::StoreError;

pub use backend::Backend;

// ---------------------------------------------------------------------------
// ObjectStore trait
// ---------------------------------------------------------------------------

/// Streaming request body handed to a backend.
pub type ObjectBody = Pin<Box<dyn Stream<Item = Result<Bytes, std::io::Error>> + Send>>;

/// Capability shared by every remote object store.
///
/// Implementations perform a single attempt per call and must return
/// [`StoreError::Cancelled`] promptly once the request's token fires.
pub trait ObjectStore: Send + Sync + 'static {
    /// Store `request.body` under `request.bucket`/`request.path`.
    fn upload(
        &self,
        request: UploadRequest,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Remove the object at `request.bucket`/`request.path`.
    fn delete(
        &self,
        request: DeleteRequest,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;
}

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

pub struct UploadRequest {
    pub bucket: String,
    pub path: String,
    pub body: ObjectBody,
    pub content_type: Option<String>,
    pub cache_control: Option<String>,
    pub cancel: CancellationToken,
}

#[derive(Debug, Clone)]
pub struct DeleteRequest {
    pub bucket: String,
    pub path: String,
    pub cancel: CancellationToken,
}

/// Run `fut` until it finishes or `cancel` fires.
pub(crate) async fn until_cancelled<F, T>(
    cancel: &CancellationToken,
    path: &str,
    fut: F,
) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, StoreError>>,
{
    let cancelled = || StoreError::Cancelled {
        path: path.to_string(),
    };
    if cancel.is_cancelled() {
        return Err(cancelled());
    }
    match cancel.run_until_cancelled(fut).await {
        Some(result) => result,
        None => Err(cancelled()),
    }
}

// ---------------------------------------------------------------------------
// Content type helpers
// ---------------------------------------------------------------------------

/// Determine content type from the key's file extension.
///
/// Returns `None` for keys without a known extension so that the store
/// applies its own default.
pub fn content_type_for_path(path: &str) -> Option<&'static str> {
    let ext = extension(path);
    if ext.len() < 2 {
        return None;
    }
    mime_guess::from_ext(&ext[1..]).first_raw()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_type_for_path() {
        assert_eq!(content_type_for_path("videos/a.mp4"), Some("video/mp4"));
        assert_eq!(content_type_for_path("index.html"), Some("text/html"));
        assert_eq!(content_type_for_path("data.json"), Some("application/json"));
        assert_eq!(content_type_for_path("foo.txt"), Some("text/plain"));
    }

    #[test]
    fn test_content_type_unknown() {
        assert_eq!(content_type_for_path("README"), None);
        assert_eq!(content_type_for_path("archive.zzzunknown"), None);
        assert_eq!(content_type_for_path("trailing."), None);
        assert_eq!(content_type_for_path("dir.d/noext"), None);
    }

    #[tokio::test]
    async fn test_until_cancelled_returns_cancelled() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result: Result<(), StoreError> =
            until_cancelled(&cancel, "a.txt", std::future::pending()).await;
        assert!(matches!(result, Err(StoreError::Cancelled { .. })));
    }

    #[tokio::test]
    async fn test_until_cancelled_passes_result_through() {
        let cancel = CancellationToken::new();
        let result = until_cancelled(&cancel, "a.txt", async { Ok(7) }).await;
        assert_eq!(result.unwrap(), 7);
    }
}
