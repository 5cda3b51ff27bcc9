//! Published resources and the download counter.
//!
//! Resource records live in an external store; the orchestrator only needs
//! their `file_url` and `file_name`. Recording a download is fire-and-forget:
//! a failing recorder is logged and never touches the download itself.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::download::DownloadRequest;

/// A downloadable resource as stored by the resource store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    #[serde(default)]
    pub id: Option<String>,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub file_name: String,
    #[serde(default)]
    pub file_size: Option<u64>,
    pub file_url: String,
    #[serde(default)]
    pub file_type: Option<String>,
    #[serde(default)]
    pub is_published: bool,
    #[serde(default)]
    pub download_count: u64,
}

impl Resource {
    /// Builds a request for this resource with default limits.
    #[must_use]
    pub fn download_request(&self) -> DownloadRequest {
        DownloadRequest::new(&self.file_url, &self.file_name)
    }
}

/// Errors from a [`DownloadRecorder`].
#[derive(Debug, Error)]
pub enum RecorderError {
    #[error("download recorder returned HTTP {status}")]
    HttpStatus { status: u16 },

    #[error("download recorder unreachable: {source}")]
    Network {
        #[source]
        source: reqwest::Error,
    },
}

/// Payload sent for each recorded download.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DownloadRecord {
    pub resource_id: Option<String>,
    pub file_name: String,
}

impl From<&Resource> for DownloadRecord {
    fn from(resource: &Resource) -> Self {
        Self {
            resource_id: resource.id.clone(),
            file_name: resource.file_name.clone(),
        }
    }
}

/// Counts downloads of a resource.
#[async_trait]
pub trait DownloadRecorder: Send + Sync {
    async fn record(&self, record: &DownloadRecord) -> Result<(), RecorderError>;
}

/// Posts each [`DownloadRecord`] as JSON to an endpoint.
#[derive(Debug, Clone)]
pub struct HttpDownloadRecorder {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpDownloadRecorder {
    #[must_use]
    pub fn new(client: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl DownloadRecorder for HttpDownloadRecorder {
    #[instrument(level = "debug", skip(self), fields(endpoint = %self.endpoint))]
    async fn record(&self, record: &DownloadRecord) -> Result<(), RecorderError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(record)
            .send()
            .await
            .map_err(|source| RecorderError::Network { source })?;
        let status = response.status();
        if !status.is_success() {
            return Err(RecorderError::HttpStatus {
                status: status.as_u16(),
            });
        }
        debug!("download recorded");
        Ok(())
    }
}

/// Records `record` on a background task. Failures are logged at `warn`.
pub fn record_in_background(
    recorder: Arc<dyn DownloadRecorder>,
    record: DownloadRecord,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        if let Err(error) = recorder.record(&record).await {
            warn!(error = %error, file_name = %record.file_name, "failed to record download");
        }
    })
}
