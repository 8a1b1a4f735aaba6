use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use series_cleanup_core::ProgressReporter;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

const TICK_CHARS: &str = "⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏";

/// CLI progress reporter using indicatif progress bars.
///
/// - Scan phase: spinner (file count unknown upfront)
/// - Retention phase: progress bar over the episodes in the collection
pub struct CliReporter {
    bar: Mutex<Option<ProgressBar>>,
}

impl CliReporter {
    pub fn new() -> Self {
        Self {
            bar: Mutex::new(None),
        }
    }

    fn set_bar(&self, pb: ProgressBar) {
        if let Ok(mut guard) = self.bar.lock() {
            if let Some(old) = guard.take() {
                old.finish_and_clear();
            }
            *guard = Some(pb);
        }
    }

    fn finish_bar(&self) {
        if let Ok(mut guard) = self.bar.lock() {
            if let Some(pb) = guard.take() {
                pb.finish_and_clear();
            }
        }
    }

    fn with_bar(&self, f: impl FnOnce(&ProgressBar)) {
        if let Ok(guard) = self.bar.lock() {
            if let Some(pb) = guard.as_ref() {
                f(pb);
            }
        }
    }
}

fn spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
        pb.set_style(style.tick_chars(TICK_CHARS));
    }
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

impl ProgressReporter for CliReporter {
    fn on_authorization_required(&self, verification_url: &str, user_code: &str) {
        self.finish_bar();
        eprintln!(
            "  Open {} and enter the code {} to authorize series-cleanup",
            verification_url.cyan().underline(),
            user_code.yellow().bold()
        );
        self.set_bar(spinner("Waiting for authorization..."));
    }

    fn on_history_loaded(&self, shows: usize, episodes: usize) {
        self.finish_bar();
        eprintln!(
            "  {} Watched history: {} episodes across {} shows",
            "✓".green(),
            episodes,
            shows
        );
    }

    fn on_scan_start(&self) {
        self.set_bar(spinner("Scanning folders..."));
    }

    fn on_scan_folder(&self, folder: &Path) {
        self.with_bar(|pb| pb.set_message(format!("Scanning {}...", folder.display())));
    }

    fn on_scan_complete(&self, total_files: usize, duration_secs: f64) {
        self.finish_bar();
        eprintln!(
            "  {} Scan complete: {} files in {:.2}s",
            "✓".green(),
            total_files,
            duration_secs
        );
    }

    fn on_retention_start(&self, episodes: usize) {
        let pb = ProgressBar::new(episodes as u64);
        if let Ok(style) = ProgressStyle::with_template(
            "  {spinner:.cyan} Retention [{bar:30.cyan/dim}] {pos}/{len} episodes",
        ) {
            pb.set_style(style.progress_chars("━╸─").tick_chars(TICK_CHARS));
        }
        pb.enable_steady_tick(Duration::from_millis(80));
        self.set_bar(pb);
    }

    fn on_episode_processed(&self) {
        self.with_bar(|pb| pb.inc(1));
    }

    fn on_episodes_skipped(&self, count: usize) {
        self.with_bar(|pb| pb.inc(count as u64));
    }

    fn on_retention_complete(&self, duration_secs: f64) {
        self.finish_bar();
        eprintln!(
            "  {} Retention complete in {:.2}s",
            "✓".green(),
            duration_secs
        );
    }
}
