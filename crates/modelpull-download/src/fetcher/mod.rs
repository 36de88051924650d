//! Range fetching.
//!
//! One HTTP GET with an optional `Range` header, streamed into an append-only
//! sink. The fetcher interprets the status code and `Content-Range`, writes
//! the body in bounded slices, reports absolute progress after every write,
//! and classifies every failure.
//!
//! # Invariants
//!
//! - The sink only grows; nothing is ever rewritten or truncated here.
//! - The sink is flushed before `fetch` returns, on success and on failure,
//!   so the staging file length is always the resume offset.
//! - Cancellation drops the response, which closes the connection.

mod content_range;

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;

use modelpull_core::{ByteRange, DownloadError, HttpTransport, TransportResponse};

pub use content_range::{ContentRange, ContentRangeParseError, parse_content_range};

/// What to fetch.
#[derive(Debug, Clone, Copy)]
pub struct FetchTarget<'a> {
    /// Source URL.
    pub url: &'a str,
    /// Requested range. An open range starting at 0 sends no `Range` header.
    pub range: ByteRange,
    /// Size of the resource declared by the caller, checked against the
    /// size the server reports.
    pub expected_total: Option<u64>,
}

/// Outcome of a successful fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchReport {
    /// Bytes appended to the sink by this fetch.
    pub bytes_written: u64,
    /// Complete size of the resource, if the server revealed it.
    pub total_bytes: Option<u64>,
}

/// How an accepted response maps onto the request.
#[derive(Debug, Clone, Copy)]
enum Accepted {
    /// Stream the body; `body_len` is the announced span length if known.
    Stream {
        body_len: Option<u64>,
        total: Option<u64>,
    },
    /// 416 for a resume at exactly the resource length: nothing left to fetch.
    AlreadyComplete { total: u64 },
}

/// Performs single range requests through an injected transport.
pub struct RangeFetcher {
    transport: Arc<dyn HttpTransport>,
    buffer_size: usize,
    read_timeout: Duration,
}

impl RangeFetcher {
    /// Create a fetcher writing at most `buffer_size` bytes per progress step
    /// and waiting at most `read_timeout` for the response head or any chunk.
    pub fn new(transport: Arc<dyn HttpTransport>, buffer_size: usize, read_timeout: Duration) -> Self {
        Self {
            transport,
            buffer_size: buffer_size.max(1),
            read_timeout,
        }
    }

    /// Fetch `target` and append the body to `sink`.
    ///
    /// `on_progress` receives the absolute position in the resource
    /// (`range.start + bytes written`) and the total size, if known.
    pub async fn fetch<W>(
        &self,
        target: FetchTarget<'_>,
        sink: &mut W,
        cancel: &CancellationToken,
        on_progress: &mut (dyn FnMut(u64, Option<u64>) + Send),
    ) -> Result<FetchReport, DownloadError>
    where
        W: AsyncWrite + Unpin + Send + ?Sized,
    {
        let range = target.range;
        let header_range = (range.start > 0 || range.end.is_some()).then_some(range);

        tracing::debug!(
            target: "modelpull.download",
            url = target.url,
            range = header_range.map(|r| r.header_value()),
            "Sending request"
        );

        let response = tokio::select! {
            biased;

            () = cancel.cancelled() => return Err(DownloadError::Cancelled),

            result = tokio::time::timeout(self.read_timeout, self.transport.get(target.url, header_range)) => {
                result.map_err(|_| {
                    DownloadError::network(format!(
                        "no response within {}s",
                        self.read_timeout.as_secs_f64()
                    ))
                })??
            }
        };

        let accepted = accept_response(&response, target)?;
        let (body_len, total) = match accepted {
            Accepted::AlreadyComplete { total } => {
                tracing::debug!(
                    target: "modelpull.download",
                    url = target.url,
                    total,
                    "Range not satisfiable at end of resource, nothing to fetch"
                );
                on_progress(range.start, Some(total));
                return Ok(FetchReport {
                    bytes_written: 0,
                    total_bytes: Some(total),
                });
            }
            Accepted::Stream { body_len, total } => (body_len, total),
        };

        let mut body = response.body;
        let mut written: u64 = 0;

        let streamed: Result<(), DownloadError> = 'stream: loop {
            let next = tokio::select! {
                biased;

                () = cancel.cancelled() => break 'stream Err(DownloadError::Cancelled),

                next = tokio::time::timeout(self.read_timeout, body.next()) => next,
            };

            let chunk = match next {
                Err(_) => {
                    break 'stream Err(DownloadError::network(format!(
                        "no data received for {}s",
                        self.read_timeout.as_secs_f64()
                    )));
                }
                Ok(None) => break 'stream Ok(()),
                Ok(Some(Err(e))) => break 'stream Err(e),
                Ok(Some(Ok(chunk))) => chunk,
            };

            if let Some(expected) = body_len {
                if written + chunk.len() as u64 > expected {
                    break 'stream Err(DownloadError::invalid_response(format!(
                        "server sent more than the {expected} bytes announced"
                    )));
                }
            }

            for slice in chunk.chunks(self.buffer_size) {
                if let Err(e) = sink.write_all(slice).await {
                    break 'stream Err(DownloadError::storage("write to staging file", &e));
                }
                written += slice.len() as u64;
                on_progress(range.start + written, total);
            }
        };

        // Closes the connection before any further disk work.
        drop(body);

        let flushed = sink
            .flush()
            .await
            .map_err(|e| DownloadError::storage("flush staging file", &e));
        streamed?;
        flushed?;

        if let Some(expected) = body_len {
            if written < expected {
                return Err(DownloadError::network(format!(
                    "connection closed after {written} of {expected} bytes"
                )));
            }
        }

        Ok(FetchReport {
            bytes_written: written,
            total_bytes: total,
        })
    }
}

/// Decide whether a response can be streamed for the requested range.
fn accept_response(
    response: &TransportResponse,
    target: FetchTarget<'_>,
) -> Result<Accepted, DownloadError> {
    let range = target.range;

    let accepted = match response.status {
        200 => {
            if range.start > 0 {
                return Err(match range.end {
                    None => DownloadError::RangeIgnored,
                    Some(_) => DownloadError::invalid_response(format!(
                        "server ignored Range {range} and sent the full resource"
                    )),
                });
            }
            if let (Some(wanted), Some(len)) = (range.len(), response.content_length) {
                if wanted != len {
                    return Err(DownloadError::invalid_response(format!(
                        "server ignored Range {range} and sent {len} bytes"
                    )));
                }
            }
            // Without Content-Length the body is bounded by the requested
            // span, or by the caller's size for an open range.
            let body_len = range
                .len()
                .or(response.content_length)
                .or(target.expected_total);
            Accepted::Stream {
                body_len,
                total: response.content_length,
            }
        }

        206 => {
            let header = response.content_range.as_deref().ok_or_else(|| {
                DownloadError::invalid_response(
                    "Response was Partial Content but Content-Range header is missing",
                )
            })?;
            let parsed = parse_content_range(header)?;
            let (start, end) = parsed.span.ok_or_else(|| {
                DownloadError::invalid_response(format!(
                    "Partial Content without a byte span: {header}"
                ))
            })?;
            if start != range.start || range.end.is_some_and(|wanted| wanted != end) {
                return Err(DownloadError::invalid_response(format!(
                    "requested {range} but server sent bytes {start}-{end}"
                )));
            }
            Accepted::Stream {
                body_len: Some(end - start + 1),
                total: parsed.complete_length,
            }
        }

        416 => {
            let complete = response
                .content_range
                .as_deref()
                .and_then(|h| parse_content_range(h).ok())
                .and_then(|r| r.complete_length);
            match complete {
                Some(total) if range.end.is_none() && range.start == total => {
                    Accepted::AlreadyComplete { total }
                }
                Some(total)
                    if range.end.is_none()
                        && range.start > total
                        && target.expected_total.is_none_or(|e| e == total) =>
                {
                    return Err(DownloadError::ResumePastEnd {
                        offset: range.start,
                        total,
                    });
                }
                _ => {
                    return Err(DownloadError::http_status(
                        416,
                        format!("Range {range} not satisfiable"),
                    ));
                }
            }
        }

        status => {
            let reason = reqwest::StatusCode::from_u16(status)
                .ok()
                .and_then(|s| s.canonical_reason())
                .unwrap_or("unexpected status");
            return Err(DownloadError::http_status(status, reason));
        }
    };

    let total = match accepted {
        Accepted::Stream { total, .. } => total,
        Accepted::AlreadyComplete { total } => Some(total),
    };
    if let (Some(expected), Some(actual)) = (target.expected_total, total) {
        if expected != actual {
            return Err(DownloadError::invalid_response(format!(
                "server reports {actual} bytes but {expected} bytes were expected"
            )));
        }
    }

    Ok(accepted)
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::testing::FakeTransport;

    fn data(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8).collect()
    }

    fn fetcher(transport: &Arc<FakeTransport>) -> RangeFetcher {
        RangeFetcher::new(transport.clone(), 8, Duration::from_secs(5))
    }

    async fn run(
        fetcher: &RangeFetcher,
        range: ByteRange,
        expected_total: Option<u64>,
        sink: &mut Vec<u8>,
    ) -> (Result<FetchReport, DownloadError>, Vec<u64>) {
        let mut positions = Vec::new();
        let cancel = CancellationToken::new();
        let target = FetchTarget {
            url: "https://host/model.bin",
            range,
            expected_total,
        };
        let result = fetcher
            .fetch(target, sink, &cancel, &mut |pos, _| positions.push(pos))
            .await;
        (result, positions)
    }

    #[tokio::test]
    async fn whole_file_without_range_header() {
        let body = data(100);
        let transport = Arc::new(FakeTransport::serving(body.clone()));
        let mut sink = Vec::new();

        let (result, positions) =
            run(&fetcher(&transport), ByteRange::starting_at(0), None, &mut sink).await;

        let report = result.unwrap();
        assert_eq!(report.bytes_written, 100);
        assert_eq!(report.total_bytes, Some(100));
        assert_eq!(sink, body);
        assert_eq!(transport.requests()[0].range, None);
        // 8-byte buffer: progress after every slice, ending at the total.
        assert_eq!(positions.len(), 13);
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(positions.last(), Some(&100));
    }

    #[tokio::test]
    async fn resume_sends_open_range() {
        let body = data(1000);
        let transport = Arc::new(FakeTransport::serving(body.clone()));
        let mut sink = body[..400].to_vec();

        let (result, positions) =
            run(&fetcher(&transport), ByteRange::starting_at(400), Some(1000), &mut sink).await;

        assert_eq!(result.unwrap().bytes_written, 600);
        assert_eq!(sink, body);
        assert_eq!(transport.requests()[0].range.as_deref(), Some("bytes=400-"));
        assert_eq!(positions.first(), Some(&408));
    }

    #[tokio::test]
    async fn resume_rejected_when_server_ignores_range() {
        let transport = Arc::new(FakeTransport::serving(data(100)).ignoring_ranges());
        let mut sink = vec![0u8; 40];

        let (result, _) =
            run(&fetcher(&transport), ByteRange::starting_at(40), None, &mut sink).await;

        assert_eq!(result.unwrap_err(), DownloadError::RangeIgnored);
        assert_eq!(sink.len(), 40, "sink must not grow on a rejected resume");
    }

    #[tokio::test]
    async fn truncated_body_is_retryable_and_keeps_bytes() {
        let body = data(1000);
        let transport = Arc::new(FakeTransport::serving(body.clone()).with_drops([400]));
        let mut sink = Vec::new();

        let (result, _) =
            run(&fetcher(&transport), ByteRange::starting_at(0), None, &mut sink).await;

        let err = result.unwrap_err();
        assert!(err.is_retryable(), "{err:?}");
        assert_eq!(sink, body[..400]);
    }

    #[tokio::test]
    async fn error_statuses_are_classified() {
        let transport = Arc::new(FakeTransport::serving(data(10)).with_statuses([404, 503]));
        let f = fetcher(&transport);

        let (first, _) = run(&f, ByteRange::starting_at(0), None, &mut Vec::new()).await;
        assert!(matches!(
            first,
            Err(DownloadError::HttpStatus { status: 404, .. })
        ));
        assert!(!first.unwrap_err().is_retryable());

        let (second, _) = run(&f, ByteRange::starting_at(0), None, &mut Vec::new()).await;
        assert!(second.unwrap_err().is_retryable());
    }

    #[tokio::test]
    async fn bounded_part_range() {
        let body = data(105);
        let transport = Arc::new(FakeTransport::serving(body.clone()));
        let mut sink = Vec::new();

        let (result, positions) =
            run(&fetcher(&transport), ByteRange::bounded(100, 104), Some(105), &mut sink).await;

        assert_eq!(result.unwrap().bytes_written, 5);
        assert_eq!(sink, body[100..]);
        assert_eq!(transport.requests()[0].range.as_deref(), Some("bytes=100-104"));
        assert_eq!(positions, vec![105]);
    }

    #[tokio::test]
    async fn size_disagreement_is_fatal() {
        let transport = Arc::new(FakeTransport::serving(data(120)));
        let mut sink = Vec::new();

        let (result, _) =
            run(&fetcher(&transport), ByteRange::bounded(0, 49), Some(105), &mut sink).await;

        assert!(matches!(result, Err(DownloadError::InvalidResponse { .. })));
        assert!(sink.is_empty());
    }

    #[tokio::test]
    async fn chunked_full_body_for_part_range_stops_at_the_span() {
        let body = data(105);
        let transport = Arc::new(
            FakeTransport::serving(body.clone())
                .ignoring_ranges()
                .without_content_length(),
        );
        let mut sink = Vec::new();

        let (result, _) =
            run(&fetcher(&transport), ByteRange::bounded(0, 49), Some(105), &mut sink).await;

        assert!(
            matches!(result, Err(DownloadError::InvalidResponse { .. })),
            "{result:?}"
        );
        // 16-byte chunks: the chunk crossing byte 50 is rejected unwritten.
        assert_eq!(sink, body[..48]);
    }

    #[tokio::test]
    async fn chunked_whole_file_is_bounded_by_expected_total() {
        let body = data(120);
        let transport = Arc::new(FakeTransport::serving(body.clone()).without_content_length());

        let mut sink = Vec::new();
        let (result, _) =
            run(&fetcher(&transport), ByteRange::starting_at(0), Some(100), &mut sink).await;
        assert!(matches!(result, Err(DownloadError::InvalidResponse { .. })));
        assert_eq!(sink.len(), 96);

        let mut sink = Vec::new();
        let (result, _) =
            run(&fetcher(&transport), ByteRange::starting_at(0), Some(120), &mut sink).await;
        assert_eq!(result.unwrap().bytes_written, 120);
        assert_eq!(sink, body);
    }

    #[tokio::test]
    async fn resume_past_a_shorter_resource_is_reported() {
        let transport = Arc::new(FakeTransport::serving(data(64)));

        let mut sink = vec![0u8; 80];
        let (result, _) =
            run(&fetcher(&transport), ByteRange::starting_at(80), None, &mut sink).await;
        assert_eq!(
            result.unwrap_err(),
            DownloadError::ResumePastEnd {
                offset: 80,
                total: 64
            }
        );
        assert_eq!(sink.len(), 80);

        // A caller expecting a different size gets the plain status error.
        let (result, _) =
            run(&fetcher(&transport), ByteRange::starting_at(80), Some(100), &mut sink).await;
        assert!(matches!(
            result,
            Err(DownloadError::HttpStatus { status: 416, .. })
        ));
    }

    #[tokio::test]
    async fn resume_at_end_is_already_complete() {
        let body = data(64);
        let transport = Arc::new(FakeTransport::serving(body.clone()));
        let mut sink = body.clone();

        let (result, _) =
            run(&fetcher(&transport), ByteRange::starting_at(64), None, &mut sink).await;

        let report = result.unwrap();
        assert_eq!(report.bytes_written, 0);
        assert_eq!(report.total_bytes, Some(64));
        assert_eq!(sink, body);
    }

    #[tokio::test]
    async fn cancellation_before_request() {
        let transport = Arc::new(FakeTransport::serving(data(10)));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let target = FetchTarget {
            url: "https://host/model.bin",
            range: ByteRange::starting_at(0),
            expected_total: None,
        };
        let result = fetcher(&transport)
            .fetch(target, &mut Vec::new(), &cancel, &mut |_, _| {})
            .await;

        assert_eq!(result.unwrap_err(), DownloadError::Cancelled);
        assert!(transport.requests().is_empty());
    }
}
