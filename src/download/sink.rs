//! The host side of a download.
//!
//! A browser saves a file by pointing a hidden anchor at an object URL (or at
//! the remote URL) and clicking it, or by opening the URL in a new tab. The
//! [`DownloadSink`] trait names those primitives so the strategies can be
//! written, and tested, without a real host. [`MemorySink`] records every call.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::error::DownloadError;

/// An in-memory payload handed to the sink.
#[derive(Debug, Clone)]
pub struct Blob {
    data: Arc<[u8]>,
    content_type: Option<String>,
}

impl Blob {
    #[must_use]
    pub fn new(data: impl Into<Arc<[u8]>>, content_type: Option<String>) -> Self {
        Self {
            data: data.into(),
            content_type,
        }
    }

    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Shared handle to the bytes, for saves that outlive the object URL.
    #[must_use]
    pub fn shared_data(&self) -> Arc<[u8]> {
        Arc::clone(&self.data)
    }

    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Handle to an attached trigger element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TriggerId(pub u64);

/// Host primitives the download strategies are built from.
///
/// Release methods (`revoke_object_url`, `detach_trigger`) are infallible and
/// synchronous so they can run from `Drop`.
pub trait DownloadSink: Send + Sync {
    /// Registers `blob` and returns a process-local URL referencing it.
    fn create_object_url(&self, blob: Blob) -> Result<String, DownloadError>;

    /// Releases an object URL. Unknown URLs are ignored.
    fn revoke_object_url(&self, object_url: &str);

    /// Attaches a hidden trigger that saves `href` as `file_name` when activated.
    fn attach_trigger(&self, href: &str, file_name: &str) -> Result<TriggerId, DownloadError>;

    /// Activates a trigger, starting the save.
    fn activate_trigger(&self, trigger: TriggerId) -> Result<(), DownloadError>;

    /// Removes a trigger. Unknown triggers are ignored.
    fn detach_trigger(&self, trigger: TriggerId);

    /// Opens `url` in a new browsing context, leaving the save to the host.
    fn open_in_new_context(&self, url: &str) -> Result<(), DownloadError>;
}

/// Detaches the trigger and revokes the object URL when dropped, so every
/// exit path of a blob save releases both, including a cancelled future.
pub(crate) struct BlobHandoff<'a> {
    sink: &'a dyn DownloadSink,
    object_url: String,
    trigger: Option<TriggerId>,
}

impl<'a> BlobHandoff<'a> {
    pub(crate) fn create(sink: &'a dyn DownloadSink, blob: Blob) -> Result<Self, DownloadError> {
        let object_url = sink.create_object_url(blob)?;
        Ok(Self {
            sink,
            object_url,
            trigger: None,
        })
    }

    pub(crate) fn attach(&mut self, file_name: &str) -> Result<TriggerId, DownloadError> {
        let trigger = self.sink.attach_trigger(&self.object_url, file_name)?;
        self.trigger = Some(trigger);
        Ok(trigger)
    }
}

impl Drop for BlobHandoff<'_> {
    fn drop(&mut self) {
        if let Some(trigger) = self.trigger.take() {
            self.sink.detach_trigger(trigger);
        }
        self.sink.revoke_object_url(&self.object_url);
    }
}

/// One recorded [`MemorySink`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkCall {
    CreateObjectUrl { object_url: String, bytes: usize },
    RevokeObjectUrl { object_url: String },
    AttachTrigger { trigger: TriggerId, href: String, file_name: String },
    ActivateTrigger { trigger: TriggerId },
    DetachTrigger { trigger: TriggerId },
    OpenInNewContext { url: String },
}

#[derive(Debug, Default)]
struct MemoryState {
    calls: Vec<SinkCall>,
    blobs: HashMap<String, Blob>,
    triggers: HashMap<TriggerId, (String, String)>,
    saved: Vec<(String, Vec<u8>)>,
}

/// In-memory sink that records every call and the payloads it "saved".
///
/// Activating a trigger that points at an object URL stores the blob bytes
/// under the trigger's filename; activating one that points elsewhere stores
/// nothing, since the host would have fetched it.
#[derive(Debug, Default)]
pub struct MemorySink {
    state: Mutex<MemoryState>,
    next_id: AtomicU64,
    popups_blocked: bool,
}

impl MemorySink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink whose `open_in_new_context` always fails.
    #[must_use]
    pub fn with_popups_blocked() -> Self {
        Self {
            popups_blocked: true,
            ..Self::default()
        }
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Every call so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<SinkCall> {
        self.state().calls.clone()
    }

    /// `(file_name, bytes)` for every blob trigger activation.
    #[must_use]
    pub fn saved(&self) -> Vec<(String, Vec<u8>)> {
        self.state().saved.clone()
    }

    /// Object URLs created but not yet revoked.
    #[must_use]
    pub fn live_object_urls(&self) -> usize {
        self.state().blobs.len()
    }

    /// Triggers attached but not yet detached.
    #[must_use]
    pub fn live_triggers(&self) -> usize {
        self.state().triggers.len()
    }

    /// URLs passed to `open_in_new_context`, including blocked attempts.
    #[must_use]
    pub fn opened_contexts(&self) -> Vec<String> {
        self.state()
            .calls
            .iter()
            .filter_map(|call| match call {
                SinkCall::OpenInNewContext { url } => Some(url.clone()),
                _ => None,
            })
            .collect()
    }

    /// Number of trigger activations.
    #[must_use]
    pub fn activations(&self) -> usize {
        self.state()
            .calls
            .iter()
            .filter(|call| matches!(call, SinkCall::ActivateTrigger { .. }))
            .count()
    }
}

impl DownloadSink for MemorySink {
    fn create_object_url(&self, blob: Blob) -> Result<String, DownloadError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let object_url = format!("blob:memory/{id}");
        let mut state = self.state();
        state.calls.push(SinkCall::CreateObjectUrl {
            object_url: object_url.clone(),
            bytes: blob.len(),
        });
        state.blobs.insert(object_url.clone(), blob);
        Ok(object_url)
    }

    fn revoke_object_url(&self, object_url: &str) {
        let mut state = self.state();
        state.calls.push(SinkCall::RevokeObjectUrl {
            object_url: object_url.to_string(),
        });
        state.blobs.remove(object_url);
    }

    fn attach_trigger(&self, href: &str, file_name: &str) -> Result<TriggerId, DownloadError> {
        let trigger = TriggerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut state = self.state();
        state.calls.push(SinkCall::AttachTrigger {
            trigger,
            href: href.to_string(),
            file_name: file_name.to_string(),
        });
        state
            .triggers
            .insert(trigger, (href.to_string(), file_name.to_string()));
        Ok(trigger)
    }

    fn activate_trigger(&self, trigger: TriggerId) -> Result<(), DownloadError> {
        let mut state = self.state();
        state.calls.push(SinkCall::ActivateTrigger { trigger });
        let Some((href, file_name)) = state.triggers.get(&trigger).cloned() else {
            return Err(DownloadError::unknown(format!(
                "trigger {} is not attached",
                trigger.0
            )));
        };
        if let Some(bytes) = state.blobs.get(&href).map(|blob| blob.data().to_vec()) {
            state.saved.push((file_name, bytes));
        }
        Ok(())
    }

    fn detach_trigger(&self, trigger: TriggerId) {
        let mut state = self.state();
        state.calls.push(SinkCall::DetachTrigger { trigger });
        state.triggers.remove(&trigger);
    }

    fn open_in_new_context(&self, url: &str) -> Result<(), DownloadError> {
        self.state().calls.push(SinkCall::OpenInNewContext {
            url: url.to_string(),
        });
        if self.popups_blocked {
            return Err(DownloadError::popup_blocked(url));
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_blob_handoff_releases_on_drop() {
        let sink = MemorySink::new();
        {
            let mut handoff = BlobHandoff::create(&sink, Blob::new(vec![1, 2, 3], None)).unwrap();
            let trigger = handoff.attach("a.bin").unwrap();
            sink.activate_trigger(trigger).unwrap();
            assert_eq!(sink.live_object_urls(), 1);
            assert_eq!(sink.live_triggers(), 1);
        }
        assert_eq!(sink.live_object_urls(), 0);
        assert_eq!(sink.live_triggers(), 0);
        assert_eq!(sink.saved(), vec![("a.bin".to_string(), vec![1, 2, 3])]);
    }

    #[test]
    fn test_blob_handoff_releases_without_trigger() {
        let sink = MemorySink::new();
        drop(BlobHandoff::create(&sink, Blob::new(vec![0u8; 4], None)).unwrap());
        assert_eq!(sink.live_object_urls(), 0);
        assert!(
            !sink
                .calls()
                .iter()
                .any(|call| matches!(call, SinkCall::DetachTrigger { .. }))
        );
    }

    #[test]
    fn test_activate_remote_href_saves_nothing() {
        let sink = MemorySink::new();
        let trigger = sink
            .attach_trigger("https://host/file.pdf", "file.pdf")
            .unwrap();
        sink.activate_trigger(trigger).unwrap();
        assert!(sink.saved().is_empty());
        assert_eq!(sink.activations(), 1);
    }

    #[test]
    fn test_activate_detached_trigger_fails() {
        let sink = MemorySink::new();
        let trigger = sink.attach_trigger("https://host/x", "x").unwrap();
        sink.detach_trigger(trigger);
        assert!(sink.activate_trigger(trigger).is_err());
    }

    #[test]
    fn test_popups_blocked_sink_records_attempt() {
        let sink = MemorySink::with_popups_blocked();
        let err = sink.open_in_new_context("https://host/x").unwrap_err();
        assert!(matches!(err, DownloadError::PopupBlocked { .. }));
        assert_eq!(sink.opened_contexts(), vec!["https://host/x".to_string()]);
    }
}
