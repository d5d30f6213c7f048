//! Progress bar for export runs.

use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

/// Creates the run's progress bar; hidden when `enabled` is false.
pub(crate) fn export_progress_bar(enabled: bool, total: usize) -> ProgressBar {
    if !enabled {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new(total as u64);
    bar.set_style(
        ProgressStyle::with_template("{spinner} [{pos}/{len}] {wide_msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    bar.enable_steady_tick(Duration::from_millis(120));
    bar
}
