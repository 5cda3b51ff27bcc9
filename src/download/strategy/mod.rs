//! Download strategies.
//!
//! - [`desktop`]: fetch into memory, save through a blob trigger.
//! - [`mobile`]: iOS opens a new context; other mobile hosts use the blob
//!   path with a re-triggered activation, or a new context when the fetch
//!   cannot get through.
//! - [`native`]: no fetch; a trigger pointed straight at the remote URL.
//!
//! Strategies report progress but never settle the invocation; the
//! orchestrator owns `on_complete`/`on_error`.

pub(crate) mod desktop;
pub(crate) mod mobile;
pub(crate) mod native;

use std::time::Duration;

use tracing::debug;

use super::client::HttpClient;
use super::constants::{DEFAULT_MOBILE_RETRIGGER_DELAY, DEFAULT_REVOKE_GRACE, progress};
use super::error::DownloadError;
use super::progress::Reporter;
use super::request::DownloadRequest;
use super::sink::{Blob, BlobHandoff, DownloadSink};

/// Mobile click-to-download workarounds.
///
/// Some mobile browsers drop the first programmatic activation of a blob
/// trigger. Whether a second one is needed depends on the browser version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MobileTactics {
    /// Activate the trigger a second time after `retrigger_delay`.
    pub double_activate: bool,
    pub retrigger_delay: Duration,
}

impl Default for MobileTactics {
    fn default() -> Self {
        Self {
            double_activate: true,
            retrigger_delay: DEFAULT_MOBILE_RETRIGGER_DELAY,
        }
    }
}

/// Timing knobs shared by the blob strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StrategyTuning {
    /// How long a blob stays referenced after its trigger fired.
    pub revoke_grace: Duration,
    pub mobile: MobileTactics,
}

impl Default for StrategyTuning {
    fn default() -> Self {
        Self {
            revoke_grace: DEFAULT_REVOKE_GRACE,
            mobile: MobileTactics::default(),
        }
    }
}

/// Everything a strategy needs for one invocation.
pub(crate) struct StrategyContext<'a> {
    pub(crate) client: &'a HttpClient,
    pub(crate) sink: &'a dyn DownloadSink,
    pub(crate) tuning: &'a StrategyTuning,
    pub(crate) reporter: &'a Reporter<'a>,
    pub(crate) request: &'a DownloadRequest,
}

/// How many times to activate a blob trigger.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Activation {
    Once,
    Twice { delay: Duration },
}

/// Hands `blob` to the sink under the request's filename and releases it
/// after the grace delay. Release also happens on every early return and if
/// the future is dropped.
pub(crate) async fn save_blob(
    ctx: &StrategyContext<'_>,
    blob: Blob,
    activation: Activation,
) -> Result<(), DownloadError> {
    let mut handoff = BlobHandoff::create(ctx.sink, blob)?;
    let trigger = handoff.attach(ctx.request.target_file_name())?;
    ctx.sink.activate_trigger(trigger)?;

    if let Activation::Twice { delay } = activation {
        tokio::time::sleep(delay).await;
        debug!("re-triggering download");
        ctx.sink.activate_trigger(trigger)?;
    }

    ctx.reporter.progress(progress::TRIGGERED);
    tokio::time::sleep(ctx.tuning.revoke_grace).await;
    drop(handoff);
    Ok(())
}
