//! The download entry point.
//!
//! `download` picks a strategy from the environment profile, runs it, and
//! settles the invocation exactly once. The single exception: a timeout is
//! reported through `on_error`, then the native fallback runs and may still
//! report `on_complete`.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{info, instrument, warn};

use super::client::HttpClient;
use super::constants::progress;
use super::error::DownloadError;
use super::progress::{DownloadObserver, NoopObserver, Reporter};
use super::request::{DownloadOutcome, DownloadRequest, StrategyKind};
use super::sink::DownloadSink;
use super::strategy::{StrategyContext, StrategyTuning, desktop, mobile, native};
use crate::environment::EnvironmentProvider;
use crate::resource::{DownloadRecord, DownloadRecorder, Resource, record_in_background};

/// Runs downloads against one sink and one environment.
///
/// Holds no per-download state, so concurrent calls are independent.
///
/// ```no_run
/// use std::sync::Arc;
/// use resource_dl::{
///     DownloadOrchestrator, DownloadRequest, EnvironmentProfile, MemorySink, NoopObserver,
/// };
///
/// # async fn example() {
/// let orchestrator = DownloadOrchestrator::new(
///     Arc::new(MemorySink::new()),
///     Arc::new(EnvironmentProfile::DESKTOP),
/// );
/// let request = DownloadRequest::new("https://example.com/guide.pdf", "guide.pdf");
/// let outcome = orchestrator.download(&request, &NoopObserver).await;
/// println!("success: {}", outcome.is_success());
/// # }
/// ```
#[derive(Clone)]
pub struct DownloadOrchestrator {
    client: HttpClient,
    sink: Arc<dyn DownloadSink>,
    environment: Arc<dyn EnvironmentProvider>,
    tuning: StrategyTuning,
    recorder: Option<Arc<dyn DownloadRecorder>>,
}

impl DownloadOrchestrator {
    #[must_use]
    pub fn new(sink: Arc<dyn DownloadSink>, environment: Arc<dyn EnvironmentProvider>) -> Self {
        Self {
            client: HttpClient::new(),
            sink,
            environment,
            tuning: StrategyTuning::default(),
            recorder: None,
        }
    }

    #[must_use]
    pub fn with_client(mut self, client: HttpClient) -> Self {
        self.client = client;
        self
    }

    #[must_use]
    pub fn with_tuning(mut self, tuning: StrategyTuning) -> Self {
        self.tuning = tuning;
        self
    }

    /// Recorder used by [`record`](Self::record) and
    /// [`download_resource`](Self::download_resource).
    #[must_use]
    pub fn with_recorder(mut self, recorder: Arc<dyn DownloadRecorder>) -> Self {
        self.recorder = Some(recorder);
        self
    }

    #[must_use]
    pub fn tuning(&self) -> &StrategyTuning {
        &self.tuning
    }

    /// Downloads `request`, reporting lifecycle events to `observer`.
    ///
    /// Never fails: every error ends up in the returned outcome and in one
    /// `on_error` call.
    #[instrument(
        skip(self, request, observer),
        fields(url = %request.source_url(), file_name = %request.target_file_name())
    )]
    pub async fn download(
        &self,
        request: &DownloadRequest,
        observer: &dyn DownloadObserver,
    ) -> DownloadOutcome {
        let profile = self.environment.profile();
        let reporter = Reporter::new(observer);
        let ctx = StrategyContext {
            client: &self.client,
            sink: self.sink.as_ref(),
            tuning: &self.tuning,
            reporter: &reporter,
            request,
        };

        info!(
            is_mobile = profile.is_mobile,
            is_ios = profile.is_ios,
            "starting download"
        );
        let primary = if profile.is_mobile {
            mobile::run(&ctx, profile).await
        } else {
            desktop::run(&ctx).await
        };

        match primary {
            Ok(strategy) => settle_success(&reporter, strategy),
            Err(error) if error.is_timeout() => {
                warn!(error = %error, "primary strategy timed out, using native fallback");
                reporter.error(&error.to_string());
                reporter.reopen_for_fallback();
                match native::run(
                    self.sink.as_ref(),
                    profile,
                    request.source_url(),
                    request.target_file_name(),
                ) {
                    Ok(strategy) => settle_success(&reporter, strategy),
                    Err(fallback_error) => settle_failure(&reporter, &fallback_error),
                }
            }
            Err(error) => settle_failure(&reporter, &error),
        }
    }

    /// Simple path without fetch or progress: the host downloads `url`
    /// itself, named by `file_name` where the host honours it.
    #[instrument(skip(self))]
    pub fn download_native(&self, url: &str, file_name: &str) -> DownloadOutcome {
        let request = DownloadRequest::new(url, file_name);
        let reporter = Reporter::new(&NoopObserver);
        match native::run(
            self.sink.as_ref(),
            self.environment.profile(),
            request.source_url(),
            request.target_file_name(),
        ) {
            Ok(strategy) => settle_success(&reporter, strategy),
            Err(error) => settle_failure(&reporter, &error),
        }
    }

    /// Starts recording a download of `resource` on a background task, if a
    /// recorder is set.
    #[must_use]
    pub fn record(&self, resource: &Resource) -> Option<JoinHandle<()>> {
        self.recorder.as_ref().map(|recorder| {
            record_in_background(Arc::clone(recorder), DownloadRecord::from(resource))
        })
    }

    /// Records the download (in the background, if a recorder is set) and
    /// downloads the resource's file.
    ///
    /// The recording handle is returned so callers that are about to exit
    /// can wait for it; dropping it leaves the task running.
    pub async fn download_resource(
        &self,
        resource: &Resource,
        observer: &dyn DownloadObserver,
    ) -> ResourceDownload {
        let recording = self.record(resource);
        let outcome = self.download(&resource.download_request(), observer).await;
        ResourceDownload { outcome, recording }
    }
}

/// Result of [`DownloadOrchestrator::download_resource`].
#[derive(Debug)]
pub struct ResourceDownload {
    pub outcome: DownloadOutcome,
    /// Background recording task, when a recorder is set.
    pub recording: Option<JoinHandle<()>>,
}

fn settle_success(reporter: &Reporter<'_>, strategy: StrategyKind) -> DownloadOutcome {
    reporter.progress(progress::DONE);
    reporter.complete();
    info!(strategy = strategy.as_str(), "download complete");
    DownloadOutcome::Completed { strategy }
}

fn settle_failure(reporter: &Reporter<'_>, error: &DownloadError) -> DownloadOutcome {
    warn!(error = %error, "download failed");
    reporter.error(&error.to_string());
    DownloadOutcome::failed(error)
}
