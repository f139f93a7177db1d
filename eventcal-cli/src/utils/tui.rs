use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

const TICKS: &[&str] = &["◐", "◓", "◑", "◒", "●"];

/// A one-line spinner shown while a feed is fetched.
///
/// Nothing is drawn when stderr is not a terminal.
pub struct Spinner {
    bar: ProgressBar,
}

impl Spinner {
    pub fn start(label: impl Into<String>) -> Self {
        let bar = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner} {msg}") {
            bar.set_style(style.tick_strings(TICKS));
        }
        bar.set_message(label.into());
        bar.enable_steady_tick(Duration::from_millis(100));
        Spinner { bar }
    }

    /// Remove the spinner so the caller can print the outcome in its place.
    pub fn stop(self) {
        self.bar.finish_and_clear();
    }
}
