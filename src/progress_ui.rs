//! Terminal progress bar driven by download lifecycle callbacks.

use indicatif::{ProgressBar, ProgressStyle};
use resource_dl::DownloadObserver;

/// Renders one download as a 0-100 bar on stderr.
pub(crate) struct ProgressBarObserver {
    bar: ProgressBar,
}

impl ProgressBarObserver {
    pub(crate) fn new(file_name: &str) -> Self {
        let bar = ProgressBar::new(100);
        bar.set_style(
            ProgressStyle::with_template("{spinner} {msg} [{bar:30}] {pos:>3}%")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=> "),
        );
        bar.set_message(file_name.to_string());
        Self { bar }
    }
}

impl DownloadObserver for ProgressBarObserver {
    fn on_progress(&self, percent: u8) {
        self.bar.set_position(u64::from(percent));
    }

    fn on_complete(&self) {
        self.bar.finish();
    }

    fn on_error(&self, message: &str) {
        self.bar.println(format!("error: {message}"));
    }
}

impl Drop for ProgressBarObserver {
    fn drop(&mut self) {
        if !self.bar.is_finished() {
            self.bar.abandon();
        }
    }
}

pub(crate) fn is_dumb_terminal() -> bool {
    std::env::var("TERM")
        .map(|value| value.eq_ignore_ascii_case("dumb"))
        .unwrap_or(false)
}

pub(crate) fn should_show_progress(
    stderr_is_terminal: bool,
    quiet: bool,
    json: bool,
    dumb_terminal: bool,
) -> bool {
    stderr_is_terminal && !quiet && !json && !dumb_terminal
}
