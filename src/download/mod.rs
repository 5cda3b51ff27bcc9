//! Cross-environment download orchestration.
//!
//! This module decides how a remote file gets saved on the current host and
//! drives that decision to a settled [`DownloadOutcome`].
//!
//! # Strategies
//!
//! - Desktop: fetch the file into memory (cache-busting headers, timeout,
//!   size limit), then save it through a hidden blob trigger.
//! - Mobile: iOS opens the URL in a new browsing context; other mobile hosts
//!   use the blob path with a re-triggered activation.
//! - Native fallback: point a trigger straight at the remote URL. Used after
//!   a timeout and by [`DownloadOrchestrator::download_native`].
//!
//! Host side effects go through a [`DownloadSink`]; the environment comes
//! from an [`EnvironmentProvider`](crate::EnvironmentProvider).
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use resource_dl::{
//!     ChannelObserver, DownloadOrchestrator, DownloadRequest, FileSystemSink, HttpClient,
//!     UserAgentEnvironment,
//! };
//!
//! # async fn example() {
//! let client = HttpClient::new();
//! let sink = Arc::new(FileSystemSink::new(client.clone(), "./downloads"));
//! let orchestrator = DownloadOrchestrator::new(
//!     sink.clone(),
//!     Arc::new(UserAgentEnvironment::new("Mozilla/5.0 (X11; Linux x86_64)")),
//! )
//! .with_client(client);
//!
//! let (observer, mut events) = ChannelObserver::new();
//! let request = DownloadRequest::new("https://example.com/guide.pdf", "guide.pdf");
//! let outcome = orchestrator.download(&request, &observer).await;
//! sink.wait_for_saves().await;
//! while let Ok(event) = events.try_recv() {
//!     println!("{event:?}");
//! }
//! println!("{outcome:?}");
//! # }
//! ```

mod client;
mod constants;
mod error;
mod filename;
mod fs_sink;
mod orchestrator;
mod progress;
mod request;
mod sink;
mod strategy;

pub use client::HttpClient;
pub use constants::{
    DEFAULT_FILE_NAME, DEFAULT_MOBILE_RETRIGGER_DELAY, DEFAULT_REVOKE_GRACE,
    DEFAULT_SIZE_LIMIT_BYTES, DEFAULT_TIMEOUT,
};
pub use error::{DownloadError, ErrorKind};
pub use fs_sink::FileSystemSink;
pub use orchestrator::{DownloadOrchestrator, ResourceDownload};
pub use progress::{ChannelObserver, DownloadEvent, DownloadObserver, NoopObserver};
pub use request::{DownloadOutcome, DownloadRequest, StrategyKind};
pub use sink::{Blob, DownloadSink, MemorySink, SinkCall, TriggerId};
pub use strategy::{MobileTactics, StrategyTuning};

// Note: we do NOT define module-local Result aliases.
// Use `Result<T, DownloadError>` explicitly in function signatures.
