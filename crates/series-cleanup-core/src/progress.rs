use std::path::Path;

/// Trait for reporting run progress.
///
/// The CLI implements it with indicatif spinners. All methods have default
/// no-op implementations.
pub trait ProgressReporter: Send + Sync {
    fn on_authorization_required(&self, _verification_url: &str, _user_code: &str) {}
    fn on_history_loaded(&self, _shows: usize, _episodes: usize) {}
    fn on_scan_start(&self) {}
    fn on_scan_folder(&self, _folder: &Path) {}
    fn on_scan_complete(&self, _total_files: usize, _duration_secs: f64) {}
    fn on_retention_start(&self, _episodes: usize) {}
    fn on_episode_processed(&self) {}
    /// Episodes under a kept show or season, counted without being walked.
    fn on_episodes_skipped(&self, count: usize) {
        for _ in 0..count {
            self.on_episode_processed();
        }
    }
    fn on_retention_complete(&self, _duration_secs: f64) {}
}

/// No-op progress reporter for silent operation.
pub struct SilentReporter;

impl ProgressReporter for SilentReporter {}
