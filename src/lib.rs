//! Resource download orchestration.
//!
//! This library saves published resources (brochures, guides, media kits)
//! onto whatever host is asking for them, choosing a download technique
//! that works there: buffered blob saves on desktop, a re-triggered variant
//! on Android, new browsing contexts on iOS, and a native fallback when a
//! fetch times out.
//!
//! # Architecture
//!
//! - [`download`] - Strategies, the orchestrator, sinks and the HTTP client
//! - [`environment`] - Host detection from user-agent strings
//! - [`resource`] - Resource-store records and the download recorder
//! - [`user_agent`] - User-Agent strings

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod download;
pub mod environment;
pub mod resource;
pub mod user_agent;

// Re-export commonly used types
pub use download::{
    Blob, ChannelObserver, DEFAULT_FILE_NAME, DEFAULT_MOBILE_RETRIGGER_DELAY, DEFAULT_REVOKE_GRACE,
    DEFAULT_SIZE_LIMIT_BYTES, DEFAULT_TIMEOUT, DownloadError, DownloadEvent, DownloadObserver,
    DownloadOrchestrator, DownloadOutcome, DownloadRequest, DownloadSink, ErrorKind, FileSystemSink,
    HttpClient, MemorySink, MobileTactics, NoopObserver, ResourceDownload, SinkCall, StrategyKind,
    StrategyTuning,
};
pub use environment::{EnvironmentProfile, EnvironmentProvider, UserAgentEnvironment};
pub use resource::{
    DownloadRecord, DownloadRecorder, HttpDownloadRecorder, RecorderError, Resource,
    record_in_background,
};
