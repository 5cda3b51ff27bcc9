//! Fetch + blob, for desktop hosts.

use tracing::instrument;

use super::{Activation, StrategyContext, save_blob};
use crate::download::constants::progress;
use crate::download::error::DownloadError;
use crate::download::request::StrategyKind;

/// Runs the desktop strategy. A timeout comes back as
/// [`DownloadError::Timeout`] for the orchestrator to answer.
#[instrument(level = "debug", skip(ctx), fields(url = %ctx.request.source_url()))]
pub(crate) async fn run(ctx: &StrategyContext<'_>) -> Result<StrategyKind, DownloadError> {
    ctx.reporter.start();
    ctx.reporter.progress(progress::STARTED);

    let blob = ctx.client.fetch_blob(ctx.request, ctx.reporter).await?;
    save_blob(ctx, blob, Activation::Once).await?;
    Ok(StrategyKind::Desktop)
}
