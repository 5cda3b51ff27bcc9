//! HTTP client wrapper.
//!
//! Two ways of getting bytes: [`HttpClient::fetch_blob`] buffers a response
//! in memory under a size limit and a timeout (the blob strategies), and
//! [`HttpClient::save_to_dir`] streams a response to disk under the name the
//! server suggests (host-side saves of remote URLs).

use std::path::{Path, PathBuf};
use std::time::Duration;

use futures_util::StreamExt;
use reqwest::Client;
use reqwest::header::{CACHE_CONTROL, CONTENT_LENGTH, CONTENT_TYPE, EXPIRES, HeaderMap, PRAGMA};
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, info, instrument};
use url::Url;

use super::constants::{CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS, progress};
use super::error::DownloadError;
use super::filename::{create_unique_file, server_file_name};
use super::progress::Reporter;
use super::request::DownloadRequest;
use super::sink::Blob;
use crate::user_agent;

/// HTTP client shared by every download an orchestrator runs.
///
/// Cheap to clone; clones share the connection pool.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpClient {
    /// Creates a client with a 30 second connect timeout and a 5 minute
    /// overall timeout.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client builder fails with the static configuration.
    /// This should never happen in practice.
    #[must_use]
    pub fn new() -> Self {
        Self::new_with_timeouts(CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS)
    }

    /// Creates a client with explicit timeouts, in seconds.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client builder fails with the supplied configuration.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn new_with_timeouts(connect_timeout_secs: u64, read_timeout_secs: u64) -> Self {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(connect_timeout_secs))
            .timeout(Duration::from_secs(read_timeout_secs))
            .gzip(true)
            .user_agent(user_agent::default_download_user_agent())
            .build()
            .expect("failed to build HTTP client with static configuration");
        Self { client }
    }

    /// Returns the underlying reqwest client.
    #[must_use]
    pub fn inner(&self) -> &Client {
        &self.client
    }

    /// Fetches `request.source_url()` into memory.
    ///
    /// Reports 10 once headers arrive, 30 before reading the body and 70
    /// after. An oversized `Content-Length` fails before the body is read;
    /// without one, the limit is enforced while reading. The whole exchange
    /// is bounded by `request.timeout()`.
    #[instrument(skip(self, request, reporter), fields(url = %request.source_url()))]
    pub(crate) async fn fetch_blob(
        &self,
        request: &DownloadRequest,
        reporter: &Reporter<'_>,
    ) -> Result<Blob, DownloadError> {
        let url = request.source_url();
        let fetch = self.fetch_blob_inner(request, reporter);
        match tokio::time::timeout(request.timeout(), fetch).await {
            Ok(result) => result,
            Err(_) => {
                debug!(timeout_ms = request.timeout_ms(), "fetch aborted by timeout");
                Err(DownloadError::timeout(url, request.timeout_ms()))
            }
        }
    }

    async fn fetch_blob_inner(
        &self,
        request: &DownloadRequest,
        reporter: &Reporter<'_>,
    ) -> Result<Blob, DownloadError> {
        let url = request.source_url();
        let limit = request.size_limit_bytes();
        let response = self.send(url, request.timeout_ms(), true).await?;
        reporter.progress(progress::RESPONSE_RECEIVED);

        if let Some(length) = header_content_length(response.headers())
            && length > limit
        {
            debug!(length, limit, "content length exceeds limit, body not read");
            return Err(DownloadError::size_limit(url, length, limit));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(ToString::to_string);

        reporter.progress(progress::READING_BODY);
        let mut data: Vec<u8> = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| map_reqwest_error(url, request.timeout_ms(), e))?;
            let total = (data.len() + chunk.len()) as u64;
            if total > limit {
                return Err(DownloadError::size_limit(url, total, limit));
            }
            data.extend_from_slice(&chunk);
        }
        reporter.progress(progress::BODY_READ);

        debug!(bytes = data.len(), "body buffered");
        Ok(Blob::new(data, content_type))
    }

    /// Streams `url` into `output_dir`, returning the saved path.
    ///
    /// The filename comes from `preferred_name` when given, else from the
    /// response (`Content-Disposition`, then URL path). Existing files are
    /// never overwritten; a numeric suffix is added. A partial file is
    /// removed if the transfer fails.
    ///
    /// # Errors
    ///
    /// Returns `DownloadError` if the URL is invalid, the request fails, the
    /// server answers non-2xx, or writing to disk fails.
    #[instrument(skip(self), fields(url = %url))]
    pub async fn save_to_dir(
        &self,
        url: &str,
        output_dir: &Path,
        preferred_name: Option<&str>,
    ) -> Result<PathBuf, DownloadError> {
        let parsed = parse_http_url(url)?;
        let response = self.send(url, READ_TIMEOUT_SECS * 1000, false).await?;

        let file_name = preferred_name
            .map(ToString::to_string)
            .unwrap_or_else(|| server_file_name(response.headers(), &parsed));
        let (file_path, mut file) = create_unique_file(output_dir, &file_name)
            .await
            .map_err(|e| DownloadError::io(output_dir.join(&file_name), e))?;
        debug!(path = %file_path.display(), "created output file");

        let streamed = stream_to_file(&mut file, response, url, &file_path).await;
        if streamed.is_err() {
            debug!(path = %file_path.display(), "cleaning up partial file after error");
            let _ = tokio::fs::remove_file(&file_path).await;
        }
        let bytes = streamed?;

        info!(path = %file_path.display(), bytes, "saved to disk");
        Ok(file_path)
    }

    async fn send(
        &self,
        url: &str,
        timeout_ms: u64,
        cache_busting: bool,
    ) -> Result<reqwest::Response, DownloadError> {
        parse_http_url(url)?;
        // Per-request timeout replaces the client-wide one, so the caller's
        // limit is the one that fires and the one that gets reported.
        let mut builder = self
            .client
            .get(url)
            .timeout(Duration::from_millis(timeout_ms));
        if cache_busting {
            builder = builder
                .header(CACHE_CONTROL, "no-cache, no-store, must-revalidate")
                .header(PRAGMA, "no-cache")
                .header(EXPIRES, "0");
        }

        let response = builder
            .send()
            .await
            .map_err(|e| map_reqwest_error(url, timeout_ms, e))?;

        let status = response.status();
        if !status.is_success() {
            debug!(status = status.as_u16(), "non-success status");
            return Err(DownloadError::http_status(url, status.as_u16()));
        }
        Ok(response)
    }
}

/// Accepts only absolute http(s) URLs.
pub(crate) fn parse_http_url(url: &str) -> Result<Url, DownloadError> {
    let parsed = Url::parse(url).map_err(|_| DownloadError::invalid_url(url))?;
    if matches!(parsed.scheme(), "http" | "https") {
        Ok(parsed)
    } else {
        Err(DownloadError::invalid_url(url))
    }
}

fn map_reqwest_error(url: &str, timeout_ms: u64, error: reqwest::Error) -> DownloadError {
    if error.is_timeout() {
        DownloadError::timeout(url, timeout_ms)
    } else {
        DownloadError::network(url, error)
    }
}

fn header_content_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
}

/// Streams a response body to `file`, returning bytes written.
async fn stream_to_file(
    file: &mut File,
    response: reqwest::Response,
    url: &str,
    file_path: &Path,
) -> Result<u64, DownloadError> {
    let mut writer = BufWriter::new(file);
    let mut stream = response.bytes_stream();
    let mut bytes_written: u64 = 0;

    while let Some(chunk_result) = stream.next().await {
        let chunk = chunk_result.map_err(|e| DownloadError::network(url, e))?;
        writer
            .write_all(&chunk)
            .await
            .map_err(|e| DownloadError::io(file_path.to_path_buf(), e))?;
        bytes_written += chunk.len() as u64;
    }

    writer
        .flush()
        .await
        .map_err(|e| DownloadError::io(file_path.to_path_buf(), e))?;

    Ok(bytes_written)
}
