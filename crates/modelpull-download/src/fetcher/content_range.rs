//! `Content-Range` header parsing.
//!
//! A server answering a range request may return a different range than the
//! one asked for, so the position of a partial response must be read from the
//! header rather than assumed. Only single ranges are requested, so the
//! `multipart/byteranges` media type is not handled.

use thiserror::Error;

use modelpull_core::DownloadError;

/// Parsed `Content-Range: bytes <start>-<end>/<complete>` header.
///
/// `Content-Range: bytes */<complete>` (sent with 416) parses with no span.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentRange {
    /// Inclusive span of the body, absent for unsatisfied ranges.
    pub span: Option<(u64, u64)>,
    /// Complete length of the resource, if the server knows it.
    pub complete_length: Option<u64>,
}

/// Error parsing a `Content-Range` header value.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("Error parsing Content-Range header, reason: {reason}, got: {value:?}")]
pub struct ContentRangeParseError {
    reason: &'static str,
    value: String,
}

impl From<ContentRangeParseError> for DownloadError {
    fn from(err: ContentRangeParseError) -> Self {
        Self::invalid_response(err.to_string())
    }
}

/// Parse a `Content-Range` header value.
pub fn parse_content_range(value: &str) -> Result<ContentRange, ContentRangeParseError> {
    let err = |reason| ContentRangeParseError {
        reason,
        value: value.to_string(),
    };

    let (unit, rest) = value
        .trim()
        .split_once(' ')
        .ok_or_else(|| err("Invalid value in Content-Range header"))?;
    if unit != "bytes" {
        return Err(err("unknown unit"));
    }

    let (range, complete) = rest
        .trim()
        .split_once('/')
        .ok_or_else(|| err("missing complete length"))?;

    let complete_length = match complete.trim() {
        "*" => None,
        n => Some(n.parse().map_err(|_| err("failed to parse complete length"))?),
    };

    let span = match range.trim() {
        "*" => None,
        range => {
            let (start, end) = range.split_once('-').ok_or_else(|| err("invalid range"))?;
            let start: u64 = start.parse().map_err(|_| err("failed to parse range start"))?;
            let end: u64 = end.parse().map_err(|_| err("failed to parse range end"))?;
            if end < start {
                return Err(err("range end precedes range start"));
            }
            if complete_length.is_some_and(|len| end >= len) {
                return Err(err("range end beyond complete length"));
            }
            Some((start, end))
        }
    };

    if span.is_none() && complete_length.is_none() {
        return Err(err("neither range nor complete length given"));
    }

    Ok(ContentRange {
        span,
        complete_length,
    })
}
