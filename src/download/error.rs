//! Error types for the download module.
//!
//! Every strategy reports failures as a [`DownloadError`]. The orchestrator
//! turns them into a message for the observer and a [`DownloadOutcome`]
//! for the caller, so none of these ever escape as an `Err`.
//!
//! [`DownloadOutcome`]: super::DownloadOutcome

use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

/// Errors that can occur while orchestrating a download.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// The server answered with a non-2xx status.
    #[error("HTTP {status}: {status_text}")]
    HttpStatus {
        /// The URL that returned an error status.
        url: String,
        /// The HTTP status code.
        status: u16,
        /// Canonical reason phrase for the status, empty when unknown.
        status_text: String,
    },

    /// The payload is larger than the request allows.
    #[error("file is too large: {actual_bytes} bytes exceeds the {limit_bytes} byte limit")]
    SizeLimitExceeded {
        /// The URL of the oversized payload.
        url: String,
        /// Size reported by `Content-Length` or observed while reading.
        actual_bytes: u64,
        /// Configured limit.
        limit_bytes: u64,
    },

    /// The fetch did not finish within the request timeout.
    #[error("download timed out after {timeout_ms}ms: {url}")]
    Timeout {
        /// The URL that timed out.
        url: String,
        /// The timeout that fired, in milliseconds.
        timeout_ms: u64,
    },

    /// Opening a new browsing context was refused by the host.
    #[error("popup blocked while opening {url}")]
    PopupBlocked {
        /// The URL that could not be opened.
        url: String,
    },

    /// Network-level error (DNS resolution, connection refused, TLS errors, etc.)
    #[error("network error downloading {url}: {source}")]
    Network {
        /// The URL that failed to download.
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// The provided URL is malformed or not http(s).
    #[error("invalid URL: {url}")]
    InvalidUrl {
        /// The invalid URL string.
        url: String,
    },

    /// File system error while saving.
    #[error("IO error writing to {path}: {source}")]
    Io {
        /// The file path where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Anything the other variants do not describe.
    #[error("download failed: {message}")]
    Unknown {
        /// Best-effort description.
        message: String,
    },
}

/// Coarse classification of a [`DownloadError`], as surfaced to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Non-2xx HTTP response.
    HttpError,
    /// Payload larger than the configured limit.
    SizeLimitExceeded,
    /// The request timeout fired.
    Timeout,
    /// A new browsing context could not be opened.
    PopupBlocked,
    /// Everything else.
    UnknownFailure,
}

impl DownloadError {
    /// Creates an HTTP status error, filling in the canonical reason phrase.
    pub fn http_status(url: impl Into<String>, status: u16) -> Self {
        let status_text = reqwest::StatusCode::from_u16(status)
            .ok()
            .and_then(|code| code.canonical_reason())
            .unwrap_or_default()
            .to_string();
        Self::HttpStatus {
            url: url.into(),
            status,
            status_text,
        }
    }

    /// Creates a size-limit error.
    pub fn size_limit(url: impl Into<String>, actual_bytes: u64, limit_bytes: u64) -> Self {
        Self::SizeLimitExceeded {
            url: url.into(),
            actual_bytes,
            limit_bytes,
        }
    }

    /// Creates a timeout error.
    pub fn timeout(url: impl Into<String>, timeout_ms: u64) -> Self {
        Self::Timeout {
            url: url.into(),
            timeout_ms,
        }
    }

    /// Creates a popup-blocked error.
    pub fn popup_blocked(url: impl Into<String>) -> Self {
        Self::PopupBlocked { url: url.into() }
    }

    /// Creates a network error from a reqwest error.
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Network {
            url: url.into(),
            source,
        }
    }

    /// Creates an invalid URL error.
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }

    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates a catch-all error.
    pub fn unknown(message: impl Into<String>) -> Self {
        Self::Unknown {
            message: message.into(),
        }
    }

    /// Returns the caller-facing classification of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::HttpStatus { .. } => ErrorKind::HttpError,
            Self::SizeLimitExceeded { .. } => ErrorKind::SizeLimitExceeded,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::PopupBlocked { .. } => ErrorKind::PopupBlocked,
            Self::Network { .. }
            | Self::InvalidUrl { .. }
            | Self::Io { .. }
            | Self::Unknown { .. } => ErrorKind::UnknownFailure,
        }
    }

    /// True for the one failure the orchestrator answers with a fallback.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// True when the request never produced a usable response: the
    /// connection failed or the timeout fired. HTTP statuses and size limits
    /// are answers from the server, not transport failures.
    #[must_use]
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Network { .. } | Self::Timeout { .. })
    }
}

// No `From<reqwest::Error>` / `From<std::io::Error>`: every variant needs the
// URL or path, which the source errors do not carry.
