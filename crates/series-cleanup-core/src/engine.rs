use crate::collection::Collection;
use crate::config::{self, AppConfig};
use crate::error::Error;
use crate::history::WatchedIndex;
use crate::progress::{ProgressReporter, SilentReporter};
use crate::provider::WatchedHistoryProvider;
use crate::retention::{CancellationToken, FileRemover, FsRemover, RetentionEngine, RetentionReport};
use crate::scanner::{self, ParseFailure, ScanOptions};
use chrono::{DateTime, Utc};
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// One full cleanup pass: fetch history, scan, build the tree, apply retention.
pub struct CleanupEngine<'a> {
    config: AppConfig,
    provider: &'a dyn WatchedHistoryProvider,
    remover: &'a dyn FileRemover,
    reporter: &'a dyn ProgressReporter,
    cancel: CancellationToken,
    now: Option<DateTime<Utc>>,
}

#[derive(Debug)]
pub struct RunResult {
    pub history_duration: Duration,
    pub scan_duration: Duration,
    pub retention_duration: Duration,
    pub history_shows: usize,
    pub history_episodes: usize,
    pub total_files_scanned: usize,
    pub media_files: usize,
    pub shows: usize,
    pub episodes: usize,
    pub parse_failures: Vec<ParseFailure>,
    pub retention: RetentionReport,
}

impl RunResult {
    /// True when every attempted deletion succeeded.
    pub fn is_clean(&self) -> bool {
        self.retention.failures.is_empty()
    }
}

impl<'a> CleanupEngine<'a> {
    pub fn new(config: AppConfig, provider: &'a dyn WatchedHistoryProvider) -> Self {
        Self {
            config,
            provider,
            remover: &FsRemover,
            reporter: &SilentReporter,
            cancel: CancellationToken::new(),
            now: None,
        }
    }

    pub fn with_remover(mut self, remover: &'a dyn FileRemover) -> Self {
        self.remover = remover;
        self
    }

    pub fn with_reporter(mut self, reporter: &'a dyn ProgressReporter) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Fix the clock used for grace-period checks.
    pub fn with_now(mut self, now: DateTime<Utc>) -> Self {
        self.now = Some(now);
        self
    }

    pub fn run(&self) -> Result<RunResult, Error> {
        for folder in &self.config.scan_folders {
            if !folder.is_dir() {
                return Err(Error::MissingScanFolder(folder.clone()));
            }
        }
        let roots = config::non_overlapping_directories(&self.config.scan_folders);
        info!("Processing directories: {:?}", roots);

        let options = ScanOptions::from_config(&self.config)?;

        // Phase 1: watched history
        info!("Fetching watched history from {}...", self.provider.name());
        let history_start = Instant::now();
        let shows = self.provider.watched_shows(&self.config.trakt.user)?;
        let index = WatchedIndex::from_watched_shows(shows, self.provider.name());
        let history_duration = history_start.elapsed();
        self.reporter
            .on_history_loaded(index.len(), index.episode_count());
        debug!(
            "History loaded in {:.2}s: {} shows, {} episodes",
            history_duration.as_secs_f64(),
            index.len(),
            index.episode_count(),
        );

        // Phase 2: scan
        info!("Scanning folders...");
        let scan_start = Instant::now();
        self.reporter.on_scan_start();
        for root in &roots {
            self.reporter.on_scan_folder(root);
        }
        let report = scanner::scan_folders(&roots, &options)?;
        let media_files = report.descriptors.len();
        let collection = Collection::from_descriptors(report.descriptors, &index);
        let scan_duration = scan_start.elapsed();
        self.reporter
            .on_scan_complete(report.files_seen, scan_duration.as_secs_f64());
        debug!(
            "Scan completed in {:.2}s: {} files, {} media files, {} shows, {} episodes",
            scan_duration.as_secs_f64(),
            report.files_seen,
            media_files,
            collection.show_count(),
            collection.episode_count(),
        );

        // Phase 3: retention
        info!("Applying retention rules...");
        let retention_start = Instant::now();
        let mut retention = RetentionEngine::new(self.config.rules, self.config.dry_run, self.remover)
            .with_cancellation(self.cancel.clone())
            .with_reporter(self.reporter);
        if let Some(now) = self.now {
            retention = retention.with_now(now);
        }
        let retention_report = retention.run(&collection);
        let retention_duration = retention_start.elapsed();
        debug!(
            "Retention completed in {:.2}s: {} deleted, {} would delete, {} failures",
            retention_duration.as_secs_f64(),
            retention_report.deleted_files,
            retention_report.would_delete_files,
            retention_report.failures.len(),
        );

        Ok(RunResult {
            history_duration,
            scan_duration,
            retention_duration,
            history_shows: index.len(),
            history_episodes: index.episode_count(),
            total_files_scanned: report.files_seen,
            media_files,
            shows: collection.show_count(),
            episodes: collection.episode_count(),
            parse_failures: report.parse_failures,
            retention: retention_report,
        })
    }
}
