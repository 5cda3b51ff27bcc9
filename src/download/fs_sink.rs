//! [`DownloadSink`] for native hosts: "saving" means writing into a directory.
//!
//! Object URLs name blobs staged in memory. Activating a trigger spawns the
//! write on the tokio runtime, the way a browser hands a click to its
//! download manager, so the strategy's grace delay and release still apply.
//! Triggers and new contexts that point at a remote URL stream it to disk.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::io::AsyncWriteExt;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use super::client::{HttpClient, parse_http_url};
use super::error::DownloadError;
use super::filename::create_unique_file;
use super::sink::{Blob, DownloadSink, TriggerId};

type SaveResult = Result<PathBuf, DownloadError>;

#[derive(Debug, Default)]
struct StagingState {
    blobs: HashMap<String, Blob>,
    triggers: HashMap<TriggerId, (String, String)>,
    activated: HashSet<TriggerId>,
}

/// Saves downloads into `output_dir`.
///
/// Saves run in the background; call [`FileSystemSink::wait_for_saves`]
/// before exiting to let them finish.
#[derive(Debug)]
pub struct FileSystemSink {
    client: HttpClient,
    output_dir: PathBuf,
    allow_new_contexts: bool,
    staging: Mutex<StagingState>,
    saves: Mutex<JoinSet<SaveResult>>,
    next_id: AtomicU64,
}

impl FileSystemSink {
    #[must_use]
    pub fn new(client: HttpClient, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            client,
            output_dir: output_dir.into(),
            allow_new_contexts: true,
            staging: Mutex::new(StagingState::default()),
            saves: Mutex::new(JoinSet::new()),
            next_id: AtomicU64::new(0),
        }
    }

    /// When false, `open_in_new_context` reports a blocked popup.
    #[must_use]
    pub fn with_new_contexts(mut self, allow: bool) -> Self {
        self.allow_new_contexts = allow;
        self
    }

    #[must_use]
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    fn staging(&self) -> MutexGuard<'_, StagingState> {
        self.staging.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn spawn_save<F>(&self, save: F) -> Result<(), DownloadError>
    where
        F: Future<Output = SaveResult> + Send + 'static,
    {
        let handle = tokio::runtime::Handle::try_current()
            .map_err(|e| DownloadError::unknown(format!("no async runtime to save on: {e}")))?;
        self.saves
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .spawn_on(save, &handle);
        Ok(())
    }

    fn spawn_remote_save(&self, url: &str, file_name: Option<&str>) -> Result<(), DownloadError> {
        parse_http_url(url)?;
        let client = self.client.clone();
        let dir = self.output_dir.clone();
        let url = url.to_string();
        let file_name = file_name.map(ToString::to_string);
        self.spawn_save(async move { client.save_to_dir(&url, &dir, file_name.as_deref()).await })
    }

    /// Waits for every background save started so far.
    ///
    /// Failures are logged and returned; they never affect a settled
    /// download outcome.
    pub async fn wait_for_saves(&self) -> Vec<SaveResult> {
        let mut saves = std::mem::take(
            &mut *self.saves.lock().unwrap_or_else(PoisonError::into_inner),
        );
        let mut results = Vec::new();
        while let Some(joined) = saves.join_next().await {
            let result = joined
                .map_err(|e| DownloadError::unknown(format!("save task failed: {e}")))
                .and_then(|saved| saved);
            match &result {
                Ok(path) => info!(path = %path.display(), "file saved"),
                Err(error) => warn!(error = %error, "background save failed"),
            }
            results.push(result);
        }
        results
    }
}

impl DownloadSink for FileSystemSink {
    fn create_object_url(&self, blob: Blob) -> Result<String, DownloadError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let object_url = format!("blob:resource-dl/{id}");
        debug!(object_url = %object_url, bytes = blob.len(), "staged blob");
        self.staging().blobs.insert(object_url.clone(), blob);
        Ok(object_url)
    }

    fn revoke_object_url(&self, object_url: &str) {
        if self.staging().blobs.remove(object_url).is_some() {
            debug!(object_url = %object_url, "released blob");
        }
    }

    fn attach_trigger(&self, href: &str, file_name: &str) -> Result<TriggerId, DownloadError> {
        let trigger = TriggerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.staging()
            .triggers
            .insert(trigger, (href.to_string(), file_name.to_string()));
        Ok(trigger)
    }

    fn activate_trigger(&self, trigger: TriggerId) -> Result<(), DownloadError> {
        let (href, file_name, blob) = {
            let mut staging = self.staging();
            let Some((href, file_name)) = staging.triggers.get(&trigger).cloned() else {
                return Err(DownloadError::unknown(format!(
                    "trigger {} is not attached",
                    trigger.0
                )));
            };
            // A repeated activation is a retry of the same click.
            if !staging.activated.insert(trigger) {
                debug!(trigger = trigger.0, "trigger already activated, ignoring");
                return Ok(());
            }
            let blob = staging.blobs.get(&href).cloned();
            (href, file_name, blob)
        };

        match blob {
            Some(blob) => {
                let dir = self.output_dir.clone();
                let data = blob.shared_data();
                self.spawn_save(async move {
                    let (path, mut file) = create_unique_file(&dir, &file_name)
                        .await
                        .map_err(|e| DownloadError::io(dir.join(&file_name), e))?;
                    file.write_all(&data)
                        .await
                        .map_err(|e| DownloadError::io(path.clone(), e))?;
                    file.flush()
                        .await
                        .map_err(|e| DownloadError::io(path.clone(), e))?;
                    Ok::<PathBuf, DownloadError>(path)
                })
            }
            None => self.spawn_remote_save(&href, Some(&file_name)),
        }
    }

    fn detach_trigger(&self, trigger: TriggerId) {
        let mut staging = self.staging();
        staging.triggers.remove(&trigger);
        staging.activated.remove(&trigger);
    }

    fn open_in_new_context(&self, url: &str) -> Result<(), DownloadError> {
        if !self.allow_new_contexts {
            return Err(DownloadError::popup_blocked(url));
        }
        self.spawn_remote_save(url, None)
    }
}
