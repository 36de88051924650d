//! HTTP transport port definition.
//!
//! The downloader never talks to an HTTP library directly. It issues range
//! requests through this trait, so production code can use a pooled client
//! while tests inject a scripted in-memory server.

use std::fmt;
use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures_core::Stream;

use crate::download::DownloadError;

/// A stream of body chunks. Transport failures surface as `Network` errors.
pub type BodyStream = Pin<Box<dyn Stream<Item = Result<Bytes, DownloadError>> + Send>>;

/// A byte range for the `Range` request header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    /// First requested byte.
    pub start: u64,
    /// Last requested byte (inclusive); `None` means "to the end".
    pub end: Option<u64>,
}

impl ByteRange {
    /// Open-ended range starting at `start`.
    pub const fn starting_at(start: u64) -> Self {
        Self { start, end: None }
    }

    /// Closed range `[start, end]`.
    pub const fn bounded(start: u64, end: u64) -> Self {
        Self {
            start,
            end: Some(end),
        }
    }

    /// Number of bytes requested, if bounded.
    pub const fn len(&self) -> Option<u64> {
        match self.end {
            Some(end) => Some(end - self.start + 1),
            None => None,
        }
    }

    /// Whether the range is empty. Bounded ranges are never empty.
    pub const fn is_empty(&self) -> bool {
        false
    }

    /// Render as a `Range` header value.
    pub fn header_value(&self) -> String {
        match self.end {
            Some(end) => format!("bytes={}-{end}", self.start),
            None => format!("bytes={}-", self.start),
        }
    }
}

impl fmt::Display for ByteRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.header_value())
    }
}

/// Response head plus streaming body.
pub struct TransportResponse {
    /// HTTP status code.
    pub status: u16,
    /// `Content-Length` header, if present.
    pub content_length: Option<u64>,
    /// Raw `Content-Range` header value, if present.
    pub content_range: Option<String>,
    /// Response body.
    pub body: BodyStream,
}

impl fmt::Debug for TransportResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportResponse")
            .field("status", &self.status)
            .field("content_length", &self.content_length)
            .field("content_range", &self.content_range)
            .finish_non_exhaustive()
    }
}

/// Port for issuing HTTP GET requests with an optional `Range` header.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Send a GET for `url`. When `range` is `Some`, a `Range` header is sent.
    ///
    /// Returns once the response head is available; the body is streamed.
    /// Status codes are not interpreted here.
    async fn get(
        &self,
        url: &str,
        range: Option<ByteRange>,
    ) -> Result<TransportResponse, DownloadError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_header_values() {
        assert_eq!(ByteRange::starting_at(400).header_value(), "bytes=400-");
        assert_eq!(ByteRange::bounded(50, 99).header_value(), "bytes=50-99");
        assert_eq!(ByteRange::bounded(50, 99).len(), Some(50));
        assert_eq!(ByteRange::starting_at(0).len(), None);
    }
}
