//! Production `HttpTransport` backed by reqwest.
//!
//! One pooled client per transport; build it once and share it through
//! `Arc<dyn HttpTransport>`. Retries live in the downloader, not here.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::header::{AUTHORIZATION, CONTENT_LENGTH, CONTENT_RANGE, RANGE};

use modelpull_core::{ByteRange, DownloadConfig, DownloadError, HttpTransport, TransportResponse};

/// User agent sent with every request.
pub const USER_AGENT: &str = concat!("modelpull/", env!("CARGO_PKG_VERSION"));

/// HTTP transport using reqwest with rustls.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    auth_token: Option<String>,
}

impl ReqwestTransport {
    /// Build a transport from the downloader configuration.
    ///
    /// Only the connect timeout is set on the client; read timeouts are
    /// enforced per chunk by the fetcher.
    pub fn new(config: &DownloadConfig) -> Result<Self, DownloadError> {
        Self::with_connect_timeout(config.connect_timeout, config.auth_token.clone())
    }

    /// Build a transport with an explicit connect timeout and optional bearer token.
    pub fn with_connect_timeout(
        connect_timeout: Duration,
        auth_token: Option<String>,
    ) -> Result<Self, DownloadError> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| DownloadError::network(format!("failed to create HTTP client: {e}")))?;

        Ok(Self { client, auth_token })
    }

    /// Build a request with optional authentication and range.
    fn build_request(&self, url: &str, range: Option<ByteRange>) -> reqwest::RequestBuilder {
        let mut request = self.client.get(url);
        if let Some(ref token) = self.auth_token {
            request = request.header(AUTHORIZATION, format!("Bearer {token}"));
        }
        if let Some(range) = range {
            request = request.header(RANGE, range.header_value());
        }
        request
    }
}

fn map_reqwest_error(err: &reqwest::Error) -> DownloadError {
    if err.is_timeout() {
        DownloadError::network(format!("request timed out: {err}"))
    } else if err.is_connect() {
        DownloadError::network(format!("connection failed: {err}"))
    } else {
        DownloadError::network(err.to_string())
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn get(
        &self,
        url: &str,
        range: Option<ByteRange>,
    ) -> Result<TransportResponse, DownloadError> {
        let response = self
            .build_request(url, range)
            .send()
            .await
            .map_err(|e| map_reqwest_error(&e))?;

        let headers = response.headers();
        let content_length = headers
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse().ok());
        let content_range = headers
            .get(CONTENT_RANGE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let status = response.status().as_u16();

        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| map_reqwest_error(&e)))
            .boxed();

        Ok(TransportResponse {
            status,
            content_length,
            content_range,
            body,
        })
    }
}
