//! Native fallback: let the host fetch the remote URL itself.

use tracing::debug;

use crate::download::client::parse_http_url;
use crate::download::error::DownloadError;
use crate::download::request::StrategyKind;
use crate::download::sink::DownloadSink;
use crate::environment::EnvironmentProfile;

/// Points a trigger at `url` and activates it, relying on the server's
/// content headers. iOS ignores the download attribute, so it gets a new
/// context instead.
pub(crate) fn run(
    sink: &dyn DownloadSink,
    profile: EnvironmentProfile,
    url: &str,
    file_name: &str,
) -> Result<StrategyKind, DownloadError> {
    parse_http_url(url)?;

    if profile.is_ios {
        sink.open_in_new_context(url)?;
        return Ok(StrategyKind::IosNewContext);
    }

    let trigger = sink.attach_trigger(url, file_name)?;
    let activated = sink.activate_trigger(trigger);
    sink.detach_trigger(trigger);
    activated?;
    debug!(url = %url, "native trigger activated");
    Ok(StrategyKind::NativeFallback)
}
