//! Scripted in-memory transport for tests.
//!
//! `FakeTransport` serves one resource and honours `Range` headers like a
//! well-behaved server. Each request consumes the next scripted [`Step`],
//! which can drop the connection mid-body, answer with an error status,
//! refuse the connection, or stall. Every request is recorded.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::StreamExt;
use futures_util::stream;

use modelpull_core::{BodyStream, ByteRange, DownloadError, HttpTransport, TransportResponse};

/// Behaviour of the fake server for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Serve the requested range completely.
    Serve,
    /// Send the head, then `n` body bytes, then reset the connection.
    DropAfter(u64),
    /// Answer with this status and an empty body.
    Status(u16),
    /// Fail before any response head arrives.
    Refuse,
    /// Send the head and `n` body bytes, then never send anything again.
    StallAfter(u64),
}

/// A request seen by the fake server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    /// Requested URL.
    pub url: String,
    /// `Range` header value, if one was sent.
    pub range: Option<String>,
}

/// Scripted in-memory HTTP server.
pub struct FakeTransport {
    data: Bytes,
    chunk_size: usize,
    honor_ranges: bool,
    content_length: bool,
    default_step: Step,
    script: Mutex<VecDeque<Step>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl FakeTransport {
    /// Serve `data` for every URL.
    pub fn serving(data: impl Into<Bytes>) -> Self {
        Self {
            data: data.into(),
            chunk_size: 16,
            honor_ranges: true,
            content_length: true,
            default_step: Step::Serve,
            script: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Answer every request with `200 OK` and the full resource.
    #[must_use]
    pub fn ignoring_ranges(mut self) -> Self {
        self.honor_ranges = false;
        self
    }

    /// Omit `Content-Length`, as a server using chunked encoding does.
    #[must_use]
    pub const fn without_content_length(mut self) -> Self {
        self.content_length = false;
        self
    }

    /// Deliver the body in chunks of `size` bytes.
    #[must_use]
    pub fn with_chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size.max(1);
        self
    }

    /// Behaviour once the script is exhausted.
    #[must_use]
    pub const fn with_default_step(mut self, step: Step) -> Self {
        self.default_step = step;
        self
    }

    /// Append steps to the script.
    #[must_use]
    pub fn with_steps(self, steps: impl IntoIterator<Item = Step>) -> Self {
        self.lock_script().extend(steps);
        self
    }

    /// Drop the connection after the given number of body bytes, one entry per request.
    #[must_use]
    pub fn with_drops(self, drops: impl IntoIterator<Item = u64>) -> Self {
        self.with_steps(drops.into_iter().map(Step::DropAfter))
    }

    /// Answer with the given statuses, one entry per request.
    #[must_use]
    pub fn with_statuses(self, statuses: impl IntoIterator<Item = u16>) -> Self {
        self.with_steps(statuses.into_iter().map(Step::Status))
    }

    /// All requests received so far.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    /// Number of requests received so far.
    pub fn request_count(&self) -> usize {
        self.requests().len()
    }

    fn lock_script(&self) -> std::sync::MutexGuard<'_, VecDeque<Step>> {
        self.script
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn next_step(&self) -> Step {
        self.lock_script().pop_front().unwrap_or(self.default_step)
    }

    fn body(&self, slice: &Bytes, step: Step) -> BodyStream {
        let limit = match step {
            Step::DropAfter(n) | Step::StallAfter(n) => (n as usize).min(slice.len()),
            _ => slice.len(),
        };

        let mut items: Vec<Result<Bytes, DownloadError>> = (0..limit)
            .step_by(self.chunk_size)
            .map(|at| Ok(slice.slice(at..(at + self.chunk_size).min(limit))))
            .collect();

        match step {
            Step::DropAfter(_) => {
                items.push(Err(DownloadError::network("connection reset by peer")));
                stream::iter(items).boxed()
            }
            Step::StallAfter(_) => stream::iter(items).chain(stream::pending()).boxed(),
            _ => stream::iter(items).boxed(),
        }
    }
}

#[async_trait]
impl HttpTransport for FakeTransport {
    async fn get(
        &self,
        url: &str,
        range: Option<ByteRange>,
    ) -> Result<TransportResponse, DownloadError> {
        self.requests
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(RecordedRequest {
                url: url.to_string(),
                range: range.map(|r| r.header_value()),
            });

        let step = self.next_step();
        let len = self.data.len() as u64;

        match step {
            Step::Refuse => return Err(DownloadError::network("connection refused")),
            Step::Status(status) => {
                return Ok(TransportResponse {
                    status,
                    content_length: Some(0),
                    content_range: None,
                    body: stream::empty().boxed(),
                });
            }
            _ => {}
        }

        let (status, start, end, content_range) = match range.filter(|_| self.honor_ranges) {
            None => (200, 0, len, None),
            Some(r) if r.start >= len => {
                return Ok(TransportResponse {
                    status: 416,
                    content_length: Some(0),
                    content_range: Some(format!("bytes */{len}")),
                    body: stream::empty().boxed(),
                });
            }
            Some(r) => {
                let last = r.end.map_or(len - 1, |e| e.min(len - 1));
                (
                    206,
                    r.start,
                    last + 1,
                    Some(format!("bytes {}-{last}/{len}", r.start)),
                )
            }
        };

        let slice = self.data.slice(start as usize..end as usize);
        Ok(TransportResponse {
            status,
            content_length: self.content_length.then_some(slice.len() as u64),
            content_range,
            body: self.body(&slice, step),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn collect(body: BodyStream) -> (Vec<u8>, Option<DownloadError>) {
        let mut out = Vec::new();
        let mut body = body;
        while let Some(item) = body.next().await {
            match item {
                Ok(chunk) => out.extend_from_slice(&chunk),
                Err(e) => return (out, Some(e)),
            }
        }
        (out, None)
    }

    #[tokio::test]
    async fn serves_ranges_and_records_requests() {
        let fake = FakeTransport::serving(b"0123456789".to_vec());

        let response = fake
            .get("http://x/a", Some(ByteRange::bounded(2, 4)))
            .await
            .unwrap();
        assert_eq!(response.status, 206);
        assert_eq!(response.content_range.as_deref(), Some("bytes 2-4/10"));
        assert_eq!(collect(response.body).await.0, b"234");

        let response = fake.get("http://x/a", None).await.unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.content_length, Some(10));

        assert_eq!(fake.request_count(), 2);
        assert_eq!(fake.requests()[0].range.as_deref(), Some("bytes=2-4"));
    }

    #[tokio::test]
    async fn scripted_drop_truncates_body() {
        let fake = FakeTransport::serving(vec![7u8; 100]).with_drops([30]);

        let response = fake.get("http://x/a", None).await.unwrap();
        let (bytes, err) = collect(response.body).await;
        assert_eq!(bytes.len(), 30);
        assert!(err.is_some_and(|e| e.is_retryable()));

        // Script exhausted: next request is served normally.
        let response = fake.get("http://x/a", None).await.unwrap();
        assert_eq!(collect(response.body).await.0.len(), 100);
    }
}
