use crate::collection::{Collection, EpisodeId, SeasonId, ShowId};
use crate::config::{FolderRules, GlobalRules};
use crate::history::WatchedEntry;
use crate::progress::{ProgressReporter, SilentReporter};
use chrono::{DateTime, Duration, Utc};
use rayon::prelude::*;
use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info};

/// Removes files from disk. Swapped out in tests.
pub trait FileRemover: Send + Sync {
    fn remove(&self, path: &Path) -> io::Result<()>;
}

pub struct FsRemover;

impl FileRemover for FsRemover {
    fn remove(&self, path: &Path) -> io::Result<()> {
        fs::remove_file(path)
    }
}

/// Shared stop flag. Once cancelled, no new episode deletion starts.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    KeepShow,
    KeepSeason,
    Unwatched,
    RecentlyWatched,
    NoGracePeriod,
    Cancelled,
    WouldDelete,
    Delete,
}

impl Decision {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::KeepShow => "keep show",
            Self::KeepSeason => "keep season",
            Self::Unwatched => "unwatched",
            Self::RecentlyWatched => "recently watched",
            Self::NoGracePeriod => "no grace period",
            Self::Cancelled => "cancelled",
            Self::WouldDelete => "would delete",
            Self::Delete => "delete",
        }
    }
}

/// What happened to one show, season or episode. `season` and `episode`
/// are `None` when the whole show (or season) was skipped.
#[derive(Debug, Clone)]
pub struct Outcome {
    pub show: String,
    pub season: Option<u32>,
    pub episode: Option<u32>,
    pub decision: Decision,
    /// Files deleted, or that would have been in dry-run mode.
    pub files: Vec<PathBuf>,
    pub failures: Vec<DeletionFailure>,
}

#[derive(Debug, Clone)]
pub struct DeletionFailure {
    pub path: PathBuf,
    pub reason: String,
}

#[derive(Debug, Default)]
pub struct RetentionReport {
    pub outcomes: Vec<Outcome>,
    pub deleted_files: usize,
    pub would_delete_files: usize,
    pub failures: Vec<DeletionFailure>,
    pub cancelled: bool,
}

impl RetentionReport {
    fn from_outcomes(outcomes: Vec<Outcome>, cancelled: bool) -> Self {
        let mut report = Self {
            cancelled,
            ..Self::default()
        };
        for outcome in &outcomes {
            match outcome.decision {
                Decision::Delete => report.deleted_files += outcome.files.len(),
                Decision::WouldDelete => report.would_delete_files += outcome.files.len(),
                _ => {}
            }
            report.failures.extend(outcome.failures.iter().cloned());
        }
        report.outcomes = outcomes;
        report
    }

    pub fn count(&self, decision: Decision) -> usize {
        self.outcomes
            .iter()
            .filter(|outcome| outcome.decision == decision)
            .count()
    }
}

/// Folder override when set and non-zero, otherwise the global value.
/// `None` means there is no grace period and nothing is ever deleted.
pub fn effective_grace_hours(global: &GlobalRules, rules: &FolderRules) -> Option<u32> {
    rules
        .grace_override()
        .or(Some(global.delete_watched_after_hours))
        .filter(|hours| *hours != 0)
}

/// Decision for one episode before any side effect. Only ever returns
/// `Unwatched`, `RecentlyWatched`, `NoGracePeriod` or `Delete`.
pub fn decide(
    watched: Option<&WatchedEntry>,
    grace_hours: Option<u32>,
    now: DateTime<Utc>,
) -> Decision {
    let Some(entry) = watched else {
        return Decision::Unwatched;
    };
    let Some(hours) = grace_hours else {
        return Decision::NoGracePeriod;
    };
    if now - entry.last_watched < Duration::hours(i64::from(hours)) {
        Decision::RecentlyWatched
    } else {
        Decision::Delete
    }
}

/// Walks a [`Collection`] in parallel and deletes watched episodes whose
/// grace period has passed.
pub struct RetentionEngine<'a> {
    rules: GlobalRules,
    dry_run: bool,
    now: DateTime<Utc>,
    remover: &'a dyn FileRemover,
    cancel: CancellationToken,
    reporter: &'a dyn ProgressReporter,
}

impl<'a> RetentionEngine<'a> {
    pub fn new(rules: GlobalRules, dry_run: bool, remover: &'a dyn FileRemover) -> Self {
        Self {
            rules,
            dry_run,
            now: Utc::now(),
            remover,
            cancel: CancellationToken::new(),
            reporter: &SilentReporter,
        }
    }

    pub fn with_now(mut self, now: DateTime<Utc>) -> Self {
        self.now = now;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_reporter(mut self, reporter: &'a dyn ProgressReporter) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn run(&self, collection: &Collection) -> RetentionReport {
        let start = Instant::now();
        self.reporter.on_retention_start(collection.episode_count());
        if self.dry_run {
            info!("Dry run, no files will be deleted");
        }

        let shows: Vec<ShowId> = collection.show_ids().collect();
        let outcomes: Vec<Outcome> = shows
            .par_iter()
            .flat_map_iter(|show_id| self.process_show(collection, *show_id))
            .collect();

        self.reporter
            .on_retention_complete(start.elapsed().as_secs_f64());
        RetentionReport::from_outcomes(outcomes, self.cancel.is_cancelled())
    }

    fn process_show(&self, collection: &Collection, show_id: ShowId) -> Vec<Outcome> {
        let show = collection.show(show_id);
        let name = show.identifiers.name.clone();

        if show.rules.keep_show {
            info!(show = %name, "Keeping show");
            let episodes = show
                .seasons
                .iter()
                .map(|id| collection.season(*id).episodes.len())
                .sum::<usize>();
            self.reporter.on_episodes_skipped(episodes);
            return vec![skipped(name, None, Decision::KeepShow)];
        }

        let grace_hours = effective_grace_hours(&self.rules, &show.rules);
        let latest_season = collection.latest_season(show_id);

        show.seasons
            .par_iter()
            .flat_map_iter(|season_id| {
                self.process_season(collection, &show.rules, *season_id, latest_season, grace_hours)
            })
            .collect()
    }

    fn process_season(
        &self,
        collection: &Collection,
        rules: &FolderRules,
        season_id: SeasonId,
        latest_season: Option<u32>,
        grace_hours: Option<u32>,
    ) -> Vec<Outcome> {
        let season = collection.season(season_id);
        let show = &collection.show(season.show).identifiers.name;

        if rules.keeps_season(season.number, latest_season) {
            info!(show = %show, season = season.number, "Keeping season");
            self.reporter.on_episodes_skipped(season.episodes.len());
            return vec![skipped(show.clone(), Some(season.number), Decision::KeepSeason)];
        }

        season
            .episodes
            .par_iter()
            .map(|episode_id| self.process_episode(collection, *episode_id, grace_hours))
            .collect()
    }

    fn process_episode(
        &self,
        collection: &Collection,
        episode_id: EpisodeId,
        grace_hours: Option<u32>,
    ) -> Outcome {
        let episode = collection.episode(episode_id);
        let season = collection.season(episode.season);
        let show = &collection.show(season.show).identifiers.name;

        let mut outcome = Outcome {
            show: show.clone(),
            season: Some(season.number),
            episode: Some(episode.number),
            decision: decide(episode.watched.as_ref(), grace_hours, self.now),
            files: Vec::new(),
            failures: Vec::new(),
        };

        if outcome.decision == Decision::Delete {
            // Two parts of one episode can claim the same subtitle.
            let mut seen = HashSet::new();
            let paths = episode
                .files
                .iter()
                .flat_map(|file| file.all_paths().map(Path::to_path_buf))
                .filter(move |path| seen.insert(path.clone()));

            if self.cancel.is_cancelled() {
                outcome.decision = Decision::Cancelled;
            } else if self.dry_run {
                outcome.decision = Decision::WouldDelete;
                for path in paths {
                    info!(file = %path.display(), "Would delete");
                    outcome.files.push(path);
                }
            } else {
                for path in paths {
                    match self.remover.remove(&path) {
                        Ok(()) => {
                            info!(file = %path.display(), "Deleted");
                            outcome.files.push(path);
                        }
                        Err(err) => {
                            error!(file = %path.display(), "Failed to delete: {}", err);
                            outcome.failures.push(DeletionFailure {
                                path,
                                reason: err.to_string(),
                            });
                        }
                    }
                }
            }
        }

        debug!(
            show = %outcome.show,
            season = season.number,
            episode = episode.number,
            decision = outcome.decision.as_str(),
            "Episode processed"
        );
        self.reporter.on_episode_processed();
        outcome
    }
}

fn skipped(show: String, season: Option<u32>, decision: Decision) -> Outcome {
    Outcome {
        show,
        season,
        episode: None,
        decision,
        files: Vec::new(),
        failures: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::KeepSeason;
    use crate::history::{WatchedHistoryRecord, WatchedIndex};
    use crate::identifiers::ShowIdentifiers;
    use crate::scanner::FileDescriptor;
    use chrono::TimeZone;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingRemover {
        removed: Mutex<Vec<PathBuf>>,
        failing: std::collections::HashSet<PathBuf>,
    }

    impl FileRemover for RecordingRemover {
        fn remove(&self, path: &Path) -> io::Result<()> {
            if self.failing.contains(path) {
                return Err(io::Error::new(io::ErrorKind::PermissionDenied, "denied"));
            }
            self.removed.lock().unwrap().push(path.to_path_buf());
            Ok(())
        }
    }

    impl RecordingRemover {
        fn removed(&self) -> Vec<PathBuf> {
            let mut removed = self.removed.lock().unwrap().clone();
            removed.sort();
            removed
        }
    }

    #[derive(Default)]
    struct CountingReporter {
        total: AtomicUsize,
        processed: AtomicUsize,
    }

    impl ProgressReporter for CountingReporter {
        fn on_retention_start(&self, episodes: usize) {
            self.total.store(episodes, Ordering::SeqCst);
        }

        fn on_episode_processed(&self) {
            self.processed.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn global(hours: u32) -> GlobalRules {
        GlobalRules {
            delete_watched_after_hours: hours,
        }
    }

    fn file(show: &str, season: u32, episode: u32, rules: &FolderRules) -> FileDescriptor {
        let directory = PathBuf::from(format!("/tv/{}/Season {}", show, season));
        let filename = format!("{}.S{:02}E{:02}.mkv", show, season, episode);
        FileDescriptor {
            path: directory.join(&filename),
            companions: vec![directory.join(format!("{}.S{:02}E{:02}.en.srt", show, season, episode))],
            directory,
            filename,
            extension: "mkv".to_string(),
            season,
            episode,
            show_folder: show.to_string(),
            identifiers: ShowIdentifiers::named(show),
            rules: rules.clone(),
        }
    }

    /// Every (show, season, episode) given is watched `hours_ago` before `now()`.
    fn history(watched: &[(&str, u32, u32, i64)]) -> WatchedIndex {
        let mut records: Vec<WatchedHistoryRecord> = Vec::new();
        for (show, season, episode, hours_ago) in watched {
            let entry = WatchedEntry {
                season: *season,
                episode: *episode,
                last_watched: now() - Duration::hours(*hours_ago),
                source: "test".to_string(),
            };
            match records.iter_mut().find(|r| r.show.name == *show) {
                Some(record) => record.entries.push(entry),
                None => records.push(WatchedHistoryRecord {
                    show: ShowIdentifiers::named(*show),
                    entries: vec![entry],
                }),
            }
        }
        WatchedIndex::new(records)
    }

    #[test]
    fn test_effective_grace_hours() {
        let none = FolderRules::default();
        let short = FolderRules {
            delete_watched_after_hours: Some(1),
            ..FolderRules::default()
        };
        let zero = FolderRules {
            delete_watched_after_hours: Some(0),
            ..FolderRules::default()
        };
        assert_eq!(effective_grace_hours(&global(24), &none), Some(24));
        assert_eq!(effective_grace_hours(&global(24), &short), Some(1));
        assert_eq!(effective_grace_hours(&global(24), &zero), Some(24));
        assert_eq!(effective_grace_hours(&global(0), &none), None);
    }

    #[test]
    fn test_grace_resolution_per_show() {
        let short = FolderRules {
            delete_watched_after_hours: Some(1),
            ..FolderRules::default()
        };
        let index = history(&[("A", 1, 1, 2), ("B", 1, 1, 2)]);
        let collection = Collection::from_descriptors(
            vec![
                file("A", 1, 1, &FolderRules::default()),
                file("B", 1, 1, &short),
            ],
            &index,
        );

        let remover = RecordingRemover::default();
        let report = RetentionEngine::new(global(24), false, &remover)
            .with_now(now())
            .run(&collection);

        assert_eq!(report.count(Decision::RecentlyWatched), 1);
        assert_eq!(report.count(Decision::Delete), 1);
        assert_eq!(
            remover.removed(),
            vec![
                PathBuf::from("/tv/B/Season 1/B.S01E01.en.srt"),
                PathBuf::from("/tv/B/Season 1/B.S01E01.mkv"),
            ]
        );
    }

    #[test]
    fn test_decide_states() {
        let entry = WatchedEntry {
            season: 1,
            episode: 1,
            last_watched: now() - Duration::hours(24),
            source: "test".to_string(),
        };
        assert_eq!(decide(None, Some(24), now()), Decision::Unwatched);
        assert_eq!(decide(Some(&entry), None, now()), Decision::NoGracePeriod);
        assert_eq!(decide(Some(&entry), Some(25), now()), Decision::RecentlyWatched);
        assert_eq!(decide(Some(&entry), Some(24), now()), Decision::Delete);
    }

    #[test]
    fn test_dry_run_never_removes() {
        let index = history(&[("A", 1, 1, 100), ("A", 1, 2, 100), ("B", 2, 5, 100)]);
        let rules = FolderRules::default();
        let collection = Collection::from_descriptors(
            vec![file("A", 1, 1, &rules), file("A", 1, 2, &rules), file("B", 2, 5, &rules)],
            &index,
        );

        let remover = RecordingRemover::default();
        let report = RetentionEngine::new(global(24), true, &remover)
            .with_now(now())
            .run(&collection);

        assert!(remover.removed().is_empty());
        assert_eq!(report.count(Decision::WouldDelete), 3);
        assert_eq!(report.would_delete_files, 6);
        assert_eq!(report.deleted_files, 0);
    }

    #[test]
    fn test_keep_show_and_latest_season() {
        let keep_show = FolderRules {
            keep_show: true,
            ..FolderRules::default()
        };
        let keep_latest = FolderRules {
            keep_seasons: vec![KeepSeason::Latest],
            ..FolderRules::default()
        };
        let index = history(&[("Kept", 1, 1, 100), ("L", 1, 1, 100), ("L", 2, 1, 100)]);
        let collection = Collection::from_descriptors(
            vec![
                file("Kept", 1, 1, &keep_show),
                file("L", 1, 1, &keep_latest),
                file("L", 2, 1, &keep_latest),
            ],
            &index,
        );

        let remover = RecordingRemover::default();
        let report = RetentionEngine::new(global(24), false, &remover)
            .with_now(now())
            .run(&collection);

        assert_eq!(report.count(Decision::KeepShow), 1);
        assert_eq!(report.count(Decision::KeepSeason), 1);
        assert_eq!(
            remover.removed(),
            vec![
                PathBuf::from("/tv/L/Season 1/L.S01E01.en.srt"),
                PathBuf::from("/tv/L/Season 1/L.S01E01.mkv"),
            ]
        );
    }

    #[test]
    fn test_progress_counts_kept_episodes() {
        let keep_show = FolderRules {
            keep_show: true,
            ..FolderRules::default()
        };
        let keep_latest = FolderRules {
            keep_seasons: vec![KeepSeason::Latest],
            ..FolderRules::default()
        };
        let index = history(&[("L", 1, 1, 100)]);
        let collection = Collection::from_descriptors(
            vec![
                file("Kept", 1, 1, &keep_show),
                file("Kept", 1, 2, &keep_show),
                file("Kept", 2, 1, &keep_show),
                file("L", 1, 1, &keep_latest),
                file("L", 2, 1, &keep_latest),
                file("L", 2, 2, &keep_latest),
            ],
            &index,
        );

        let remover = RecordingRemover::default();
        let reporter = CountingReporter::default();
        RetentionEngine::new(global(24), true, &remover)
            .with_now(now())
            .with_reporter(&reporter)
            .run(&collection);

        assert_eq!(reporter.total.load(Ordering::SeqCst), 6);
        assert_eq!(reporter.processed.load(Ordering::SeqCst), 6);
    }

    #[test]
    fn test_shared_companion_is_removed_once() {
        let index = history(&[("A", 1, 1, 100)]);
        let shared = PathBuf::from("/tv/A/Season 1/A.S01E01.part2.en.srt");
        let mut first = file("A", 1, 1, &FolderRules::default());
        first.companions = vec![shared.clone()];
        let mut second = file("A", 1, 1, &FolderRules::default());
        second.path = PathBuf::from("/tv/A/Season 1/A.S01E01.part2.mkv");
        second.companions = vec![shared.clone()];
        let collection = Collection::from_descriptors(vec![first, second], &index);

        let remover = RecordingRemover::default();
        let report = RetentionEngine::new(global(24), false, &remover)
            .with_now(now())
            .run(&collection);

        assert!(report.failures.is_empty());
        assert_eq!(report.deleted_files, 3);
        assert_eq!(remover.removed().iter().filter(|p| **p == shared).count(), 1);
    }

    #[test]
    fn test_failed_remove_does_not_stop_siblings() {
        let index = history(&[("A", 1, 1, 100), ("A", 1, 2, 100)]);
        let rules = FolderRules::default();
        let collection = Collection::from_descriptors(
            vec![file("A", 1, 1, &rules), file("A", 1, 2, &rules)],
            &index,
        );

        let mut remover = RecordingRemover::default();
        remover
            .failing
            .insert(PathBuf::from("/tv/A/Season 1/A.S01E01.mkv"));
        let report = RetentionEngine::new(global(24), false, &remover)
            .with_now(now())
            .run(&collection);

        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].path, PathBuf::from("/tv/A/Season 1/A.S01E01.mkv"));
        assert_eq!(report.deleted_files, 3);
        assert!(remover
            .removed()
            .contains(&PathBuf::from("/tv/A/Season 1/A.S01E01.en.srt")));
    }

    #[test]
    fn test_cancelled_run_deletes_nothing() {
        let index = history(&[("A", 1, 1, 100)]);
        let collection =
            Collection::from_descriptors(vec![file("A", 1, 1, &FolderRules::default())], &index);

        let cancel = CancellationToken::new();
        cancel.cancel();
        let remover = RecordingRemover::default();
        let report = RetentionEngine::new(global(24), false, &remover)
            .with_now(now())
            .with_cancellation(cancel)
            .run(&collection);

        assert!(report.cancelled);
        assert_eq!(report.count(Decision::Cancelled), 1);
        assert!(remover.removed().is_empty());
    }

    #[test]
    fn test_unwatched_episode_is_kept() {
        let collection = Collection::from_descriptors(
            vec![file("A", 1, 1, &FolderRules::default())],
            &WatchedIndex::default(),
        );
        let remover = RecordingRemover::default();
        let report = RetentionEngine::new(global(24), false, &remover)
            .with_now(now())
            .run(&collection);

        assert_eq!(report.count(Decision::Unwatched), 1);
        assert!(remover.removed().is_empty());
    }
}
