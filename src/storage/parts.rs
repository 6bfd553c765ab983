use bytes::{Bytes, BytesMut};
use futures::StreamExt;

use super::ObjectBody;

/// Smallest part size S3 accepts for every part but the last.
pub const DEFAULT_PART_SIZE: usize = 5 * 1024 * 1024;

/// Splits a streaming body into parts of at least `part_size` bytes.
///
/// Only the final part may be shorter. A part can exceed `part_size` by up
/// to one incoming chunk.
pub struct PartReader {
    body: ObjectBody,
    part_size: usize,
    exhausted: bool,
}

impl PartReader {
    pub fn new(body: ObjectBody, part_size: usize) -> Self {
        Self {
            body,
            part_size,
            exhausted: false,
        }
    }

    /// True once the underlying stream has ended.
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Next part, or `None` when the body has been fully consumed.
    pub async fn next_part(&mut self) -> Result<Option<Bytes>, std::io::Error> {
        if self.exhausted {
            return Ok(None);
        }

        let mut buf = BytesMut::new();
        while buf.len() < self.part_size {
            match self.body.next().await {
                Some(chunk) => buf.extend_from_slice(&chunk?),
                None => {
                    self.exhausted = true;
                    break;
                }
            }
        }

        if buf.is_empty() && self.exhausted {
            Ok(None)
        } else {
            Ok(Some(buf.freeze()))
        }
    }
}

/// Read the whole body into memory.
pub async fn collect(mut body: ObjectBody) -> Result<Bytes, std::io::Error> {
    let mut buf = BytesMut::new();
    while let Some(chunk) = body.next().await {
        buf.extend_from_slice(&chunk?);
    }
    Ok(buf.freeze())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body_of(chunks: Vec<&'static str>) -> ObjectBody {
        Box::pin(futures::stream::iter(
            chunks
                .into_iter()
                .map(|c| Ok::<_, std::io::Error>(Bytes::from_static(c.as_bytes()))),
        ))
    }

    #[tokio::test]
    async fn test_splits_into_parts() {
        let mut reader = PartReader::new(body_of(vec!["abc", "def", "gh"]), 4);

        let first = reader.next_part().await.unwrap().unwrap();
        assert_eq!(first.as_ref(), b"abcdef");
        assert!(!reader.is_exhausted());

        let second = reader.next_part().await.unwrap().unwrap();
        assert_eq!(second.as_ref(), b"gh");
        assert!(reader.is_exhausted());

        assert!(reader.next_part().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_small_body_is_single_part() {
        let mut reader = PartReader::new(body_of(vec!["hello"]), DEFAULT_PART_SIZE);
        let part = reader.next_part().await.unwrap().unwrap();
        assert_eq!(part.as_ref(), b"hello");
        assert!(reader.is_exhausted());
    }

    #[tokio::test]
    async fn test_empty_body() {
        let mut reader = PartReader::new(body_of(vec![]), 4);
        assert!(reader.next_part().await.unwrap().is_none());
        assert!(reader.is_exhausted());
    }

    #[tokio::test]
    async fn test_stream_error_propagates() {
        let body: ObjectBody = Box::pin(futures::stream::iter(vec![
            Ok(Bytes::from_static(b"ab")),
            Err(std::io::Error::other("connection reset")),
        ]));
        let mut reader = PartReader::new(body, 16);
        let err = reader.next_part().await.unwrap_err();
        assert_eq!(err.to_string(), "connection reset");
    }

    #[tokio::test]
    async fn test_collect() {
        let bytes = collect(body_of(vec!["hello ", "world"])).await.unwrap();
        assert_eq!(bytes.as_ref(), b"hello world");
    }
}
