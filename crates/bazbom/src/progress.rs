//! Rate-limited stderr progress reporting for `depscan scan` (§4.9): one
//! line every 250ms while a scan is running, using `indicatif` the way the
//! teacher's `progress` module drives its bars rather than a hand-rolled
//! timer loop.

use bazbom_core::ScanProgress;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

const TICK_INTERVAL: Duration = Duration::from_millis(250);

pub struct ScanProgressReporter {
    bar: ProgressBar,
}

impl ScanProgressReporter {
    pub fn new() -> Self {
        let bar = ProgressBar::new(100);
        bar.set_style(
            ProgressStyle::with_template("{prefix:>10} [{bar:30}] {pos:>3}% {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=> "),
        );
        bar.set_prefix("scanning");
        bar.enable_steady_tick(TICK_INTERVAL);
        Self { bar }
    }

    /// Advance the bar to match the job registry's current snapshot. Safe to
    /// call more often than every 250ms; `indicatif` coalesces redraws to
    /// its own steady-tick cadence so stderr is never flooded.
    pub fn update(&self, progress: &ScanProgress) {
        self.bar.set_position(progress.progress_percent as u64);
        self.bar.set_message(progress.current_step.clone());
    }

    pub fn finish(&self, message: impl Into<String>) {
        self.bar.finish_with_message(message.into());
    }

    pub fn abandon(&self, message: impl Into<String>) {
        self.bar.abandon_with_message(message.into());
    }
}

impl Default for ScanProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}
