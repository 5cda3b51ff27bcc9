//! Mobile hosts.

use tracing::{instrument, warn};

use super::{Activation, StrategyContext, save_blob};
use crate::download::constants::progress;
use crate::download::error::DownloadError;
use crate::download::request::StrategyKind;
use crate::environment::EnvironmentProfile;

/// Runs the mobile strategy for `profile`.
///
/// iOS never takes the blob path. Elsewhere a transport failure of the fetch
/// (connection error or timeout) opens the URL in a new context instead;
/// HTTP statuses and size limits stay terminal.
#[instrument(level = "debug", skip(ctx), fields(url = %ctx.request.source_url()))]
pub(crate) async fn run(
    ctx: &StrategyContext<'_>,
    profile: EnvironmentProfile,
) -> Result<StrategyKind, DownloadError> {
    ctx.reporter.start();

    if profile.is_ios {
        ctx.sink.open_in_new_context(ctx.request.source_url())?;
        return Ok(StrategyKind::IosNewContext);
    }

    ctx.reporter.progress(progress::STARTED);
    let blob = match ctx.client.fetch_blob(ctx.request, ctx.reporter).await {
        Ok(blob) => blob,
        Err(error) if error.is_transport() => {
            warn!(error = %error, "mobile fetch failed, opening URL directly");
            ctx.sink.open_in_new_context(ctx.request.source_url())?;
            return Ok(StrategyKind::MobileNewContext);
        }
        Err(error) => return Err(error),
    };

    let tactics = ctx.tuning.mobile;
    let activation = if tactics.double_activate {
        Activation::Twice {
            delay: tactics.retrigger_delay,
        }
    } else {
        Activation::Once
    };
    save_blob(ctx, blob, activation).await?;
    Ok(StrategyKind::MobileBlob)
}
