//! Per-invocation request and outcome types.

use std::time::Duration;

use serde::{Serialize, Serializer};

use super::constants::{DEFAULT_FILE_NAME, DEFAULT_SIZE_LIMIT_BYTES, DEFAULT_TIMEOUT};
use super::error::{DownloadError, ErrorKind};

/// What to download and under which limits.
///
/// Immutable once handed to the orchestrator.
///
/// ```
/// use std::time::Duration;
/// use resource_dl::DownloadRequest;
///
/// let request = DownloadRequest::new("https://host/file.pdf", "guide.pdf")
///     .with_timeout(Duration::from_secs(10));
/// assert_eq!(request.target_file_name(), "guide.pdf");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRequest {
    source_url: String,
    target_file_name: String,
    size_limit_bytes: u64,
    timeout: Duration,
}

impl DownloadRequest {
    /// Creates a request with the default size limit and timeout.
    ///
    /// A blank `target_file_name` becomes `"download"`.
    #[must_use]
    pub fn new(source_url: impl Into<String>, target_file_name: impl Into<String>) -> Self {
        let name = target_file_name.into();
        let target_file_name = if name.trim().is_empty() {
            DEFAULT_FILE_NAME.to_string()
        } else {
            name
        };
        Self {
            source_url: source_url.into(),
            target_file_name,
            size_limit_bytes: DEFAULT_SIZE_LIMIT_BYTES,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Overrides the maximum accepted payload size.
    #[must_use]
    pub fn with_size_limit(mut self, size_limit_bytes: u64) -> Self {
        self.size_limit_bytes = size_limit_bytes;
        self
    }

    /// Overrides the fetch timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn source_url(&self) -> &str {
        &self.source_url
    }

    #[must_use]
    pub fn target_file_name(&self) -> &str {
        &self.target_file_name
    }

    #[must_use]
    pub fn size_limit_bytes(&self) -> u64 {
        self.size_limit_bytes
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Timeout in whole milliseconds, saturating.
    #[must_use]
    pub fn timeout_ms(&self) -> u64 {
        u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX)
    }
}

/// The concrete technique that completed (or last attempted) a download.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    /// Fetch into memory, save through a blob trigger.
    Desktop,
    /// Same as desktop with a re-triggered activation.
    MobileBlob,
    /// Non-iOS mobile whose fetch failed; URL opened in a new context.
    MobileNewContext,
    /// iOS: URL opened in a new context.
    IosNewContext,
    /// Trigger pointed straight at the remote URL.
    NativeFallback,
}

impl StrategyKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Desktop => "desktop",
            Self::MobileBlob => "mobile_blob",
            Self::MobileNewContext => "mobile_new_context",
            Self::IosNewContext => "ios_new_context",
            Self::NativeFallback => "native_fallback",
        }
    }
}

/// Settled result of one orchestrated download.
///
/// Serializes as `{"success": true, "strategy": ...}` or
/// `{"success": false, "kind": ..., "error": ...}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadOutcome {
    Completed { strategy: StrategyKind },
    Failed { kind: ErrorKind, message: String },
}

#[derive(Serialize)]
struct OutcomeWire<'a> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    strategy: Option<StrategyKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    kind: Option<ErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'a str>,
}

impl Serialize for DownloadOutcome {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let wire = match self {
            Self::Completed { strategy } => OutcomeWire {
                success: true,
                strategy: Some(*strategy),
                kind: None,
                error: None,
            },
            Self::Failed { kind, message } => OutcomeWire {
                success: false,
                strategy: None,
                kind: Some(*kind),
                error: Some(message),
            },
        };
        wire.serialize(serializer)
    }
}

impl DownloadOutcome {
    pub(crate) fn failed(error: &DownloadError) -> Self {
        Self::Failed {
            kind: error.kind(),
            message: error.to_string(),
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }

    /// The failure message, if the download failed.
    #[must_use]
    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Completed { .. } => None,
            Self::Failed { message, .. } => Some(message),
        }
    }

    /// The failure classification, if the download failed.
    #[must_use]
    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Completed { .. } => None,
            Self::Failed { kind, .. } => Some(*kind),
        }
    }
}
