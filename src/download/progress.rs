//! Lifecycle reporting: observers, events, and the reporter that keeps
//! callbacks well-behaved.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

use tokio::sync::mpsc;
use tracing::trace;

/// Receives lifecycle callbacks for one download. Every method defaults to a
/// no-op so observers implement only what they need.
pub trait DownloadObserver: Send + Sync {
    fn on_start(&self) {}
    fn on_progress(&self, _percent: u8) {}
    fn on_complete(&self) {}
    fn on_error(&self, _message: &str) {}
}

/// Observer that ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl DownloadObserver for NoopObserver {}

/// One lifecycle callback, as a value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadEvent {
    Started,
    Progress(u8),
    Completed,
    Failed(String),
}

/// Forwards callbacks into a tokio channel, for callers that prefer a stream
/// of [`DownloadEvent`]s to implementing [`DownloadObserver`].
///
/// ```
/// use resource_dl::{ChannelObserver, DownloadEvent, DownloadObserver};
///
/// let (observer, mut events) = ChannelObserver::new();
/// observer.on_progress(42);
/// assert_eq!(events.try_recv().ok(), Some(DownloadEvent::Progress(42)));
/// ```
#[derive(Debug, Clone)]
pub struct ChannelObserver {
    tx: mpsc::UnboundedSender<DownloadEvent>,
}

impl ChannelObserver {
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<DownloadEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn send(&self, event: DownloadEvent) {
        // A dropped receiver only means nobody is listening anymore.
        let _ = self.tx.send(event);
    }
}

impl DownloadObserver for ChannelObserver {
    fn on_start(&self) {
        self.send(DownloadEvent::Started);
    }

    fn on_progress(&self, percent: u8) {
        self.send(DownloadEvent::Progress(percent));
    }

    fn on_complete(&self) {
        self.send(DownloadEvent::Completed);
    }

    fn on_error(&self, message: &str) {
        self.send(DownloadEvent::Failed(message.to_string()));
    }
}

/// Wraps the caller's observer for one invocation.
///
/// Drops progress that would go backwards, clamps to 100, and swallows every
/// callback once the invocation has settled. The orchestrator reopens it
/// exactly once, for the timeout fallback.
pub(crate) struct Reporter<'a> {
    observer: &'a dyn DownloadObserver,
    last_progress: AtomicU8,
    settled: AtomicBool,
}

impl<'a> Reporter<'a> {
    pub(crate) fn new(observer: &'a dyn DownloadObserver) -> Self {
        Self {
            observer,
            last_progress: AtomicU8::new(0),
            settled: AtomicBool::new(false),
        }
    }

    fn is_settled(&self) -> bool {
        self.settled.load(Ordering::Acquire)
    }

    pub(crate) fn start(&self) {
        if !self.is_settled() {
            self.observer.on_start();
        }
    }

    pub(crate) fn progress(&self, percent: u8) {
        if self.is_settled() {
            return;
        }
        let percent = percent.min(100);
        let previous = self.last_progress.fetch_max(percent, Ordering::AcqRel);
        if percent < previous {
            trace!(percent, previous, "dropping regressing progress");
            return;
        }
        self.observer.on_progress(percent);
    }

    pub(crate) fn complete(&self) {
        if !self.settled.swap(true, Ordering::AcqRel) {
            self.observer.on_complete();
        }
    }

    pub(crate) fn error(&self, message: &str) {
        if !self.settled.swap(true, Ordering::AcqRel) {
            self.observer.on_error(message);
        }
    }

    /// Allows one more terminal callback after a timeout was reported.
    pub(crate) fn reopen_for_fallback(&self) {
        self.settled.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(rx: &mut mpsc::UnboundedReceiver<DownloadEvent>) -> Vec<DownloadEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[test]
    fn test_reporter_drops_regressing_progress() {
        let (observer, mut rx) = ChannelObserver::new();
        let reporter = Reporter::new(&observer);
        reporter.progress(30);
        reporter.progress(10);
        reporter.progress(70);
        assert_eq!(
            drain(&mut rx),
            vec![DownloadEvent::Progress(30), DownloadEvent::Progress(70)]
        );
    }

    #[test]
    fn test_reporter_repeats_equal_progress() {
        let (observer, mut rx) = ChannelObserver::new();
        let reporter = Reporter::new(&observer);
        reporter.progress(100);
        reporter.progress(100);
        assert_eq!(drain(&mut rx).len(), 2);
    }

    #[test]
    fn test_reporter_clamps_to_100() {
        let (observer, mut rx) = ChannelObserver::new();
        Reporter::new(&observer).progress(250);
        assert_eq!(drain(&mut rx), vec![DownloadEvent::Progress(100)]);
    }

    #[test]
    fn test_reporter_silent_after_settle() {
        let (observer, mut rx) = ChannelObserver::new();
        let reporter = Reporter::new(&observer);
        reporter.error("boom");
        reporter.progress(90);
        reporter.complete();
        reporter.error("again");
        assert_eq!(drain(&mut rx), vec![DownloadEvent::Failed("boom".to_string())]);
    }

    #[test]
    fn test_reporter_reopen_allows_one_more_terminal() {
        let (observer, mut rx) = ChannelObserver::new();
        let reporter = Reporter::new(&observer);
        reporter.error("timed out");
        reporter.reopen_for_fallback();
        reporter.complete();
        reporter.complete();
        assert_eq!(
            drain(&mut rx),
            vec![
                DownloadEvent::Failed("timed out".to_string()),
                DownloadEvent::Completed
            ]
        );
    }

    #[test]
    fn test_channel_observer_survives_dropped_receiver() {
        let (observer, rx) = ChannelObserver::new();
        drop(rx);
        observer.on_start();
        observer.on_complete();
    }
}
