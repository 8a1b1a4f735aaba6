use crate::config::FolderRules;
use crate::history::{WatchedEntry, WatchedIndex};
use crate::identifiers::{position_by_priority, ShowIdentifiers};
use crate::scanner::FileDescriptor;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShowId(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SeasonId(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EpisodeId(usize);

#[derive(Debug, Clone)]
pub struct Show {
    pub identifiers: ShowIdentifiers,
    pub rules: FolderRules,
    /// Show folder the current rules were taken from.
    pub rules_folder: String,
    pub seasons: Vec<SeasonId>,
}

#[derive(Debug, Clone)]
pub struct Season {
    pub number: u32,
    pub show: ShowId,
    pub episodes: Vec<EpisodeId>,
}

#[derive(Debug, Clone)]
pub struct Episode {
    pub number: u32,
    pub season: SeasonId,
    pub files: Vec<FileDescriptor>,
    pub watched: Option<WatchedEntry>,
}

/// Show → season → episode tree, stored in flat arenas. Children refer to
/// their parents by id.
#[derive(Debug, Default)]
pub struct Collection {
    shows: Vec<Show>,
    seasons: Vec<Season>,
    episodes: Vec<Episode>,
}

impl Collection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a collection from descriptors in the given order.
    pub fn from_descriptors(
        descriptors: impl IntoIterator<Item = FileDescriptor>,
        index: &WatchedIndex,
    ) -> Self {
        let mut collection = Self::new();
        for descriptor in descriptors {
            collection.add_file(descriptor, index);
        }
        collection
    }

    /// Insert one scanned file, creating the show, season and episode as
    /// needed, and (re)bind the episode's watched entry.
    ///
    /// Adding a path that is already present leaves the file list unchanged.
    pub fn add_file(&mut self, descriptor: FileDescriptor, index: &WatchedIndex) -> EpisodeId {
        let show_id = self.find_or_create_show(&descriptor);
        let season_id = self.find_or_create_season(show_id, descriptor.season);
        let episode_id = self.find_or_create_episode(season_id, descriptor.episode);

        let episode = &mut self.episodes[episode_id.0];
        if episode.files.iter().any(|file| file.path == descriptor.path) {
            debug!(file = %descriptor.path.display(), "File already in collection");
        } else {
            episode.files.push(descriptor);
        }

        let show = &self.shows[show_id.0];
        let season_number = self.seasons[season_id.0].number;
        let episode = &mut self.episodes[episode_id.0];
        episode.watched = index
            .lookup_episode(&show.identifiers, season_number, episode.number)
            .cloned();

        episode_id
    }

    fn find_or_create_show(&mut self, descriptor: &FileDescriptor) -> ShowId {
        let found = position_by_priority(&self.shows, &descriptor.identifiers, |show| {
            &show.identifiers
        });

        match found {
            Some((pos, _)) => {
                let show = &mut self.shows[pos];
                show.identifiers.enrich_from(&descriptor.identifiers);
                if show.rules != descriptor.rules
                    && !show.rules_folder.eq_ignore_ascii_case(&descriptor.show_folder)
                {
                    warn!(
                        show = %show.identifiers,
                        previous = %show.rules_folder,
                        current = %descriptor.show_folder,
                        "Show found in folders with different rules, using the latest"
                    );
                }
                show.rules = descriptor.rules.clone();
                show.rules_folder = descriptor.show_folder.clone();
                ShowId(pos)
            }
            None => {
                debug!(show = %descriptor.identifiers, "Adding show");
                self.shows.push(Show {
                    identifiers: descriptor.identifiers.clone(),
                    rules: descriptor.rules.clone(),
                    rules_folder: descriptor.show_folder.clone(),
                    seasons: Vec::new(),
                });
                ShowId(self.shows.len() - 1)
            }
        }
    }

    fn find_or_create_season(&mut self, show_id: ShowId, number: u32) -> SeasonId {
        if let Some(id) = self.shows[show_id.0]
            .seasons
            .iter()
            .copied()
            .find(|id| self.seasons[id.0].number == number)
        {
            return id;
        }
        let id = SeasonId(self.seasons.len());
        self.seasons.push(Season {
            number,
            show: show_id,
            episodes: Vec::new(),
        });
        self.shows[show_id.0].seasons.push(id);
        id
    }

    fn find_or_create_episode(&mut self, season_id: SeasonId, number: u32) -> EpisodeId {
        if let Some(id) = self.seasons[season_id.0]
            .episodes
            .iter()
            .copied()
            .find(|id| self.episodes[id.0].number == number)
        {
            return id;
        }
        let id = EpisodeId(self.episodes.len());
        self.episodes.push(Episode {
            number,
            season: season_id,
            files: Vec::new(),
            watched: None,
        });
        self.seasons[season_id.0].episodes.push(id);
        id
    }

    pub fn find_show(&self, key: &ShowIdentifiers) -> Option<ShowId> {
        position_by_priority(&self.shows, key, |show| &show.identifiers).map(|(pos, _)| ShowId(pos))
    }

    /// Highest season number currently in the tree for this show.
    pub fn latest_season(&self, show_id: ShowId) -> Option<u32> {
        self.show(show_id)
            .seasons
            .iter()
            .map(|id| self.seasons[id.0].number)
            .max()
    }

    pub fn show(&self, id: ShowId) -> &Show {
        &self.shows[id.0]
    }

    pub fn season(&self, id: SeasonId) -> &Season {
        &self.seasons[id.0]
    }

    pub fn episode(&self, id: EpisodeId) -> &Episode {
        &self.episodes[id.0]
    }

    pub fn show_ids(&self) -> impl Iterator<Item = ShowId> {
        (0..self.shows.len()).map(ShowId)
    }

    pub fn show_count(&self) -> usize {
        self.shows.len()
    }

    pub fn season_count(&self) -> usize {
        self.seasons.len()
    }

    pub fn episode_count(&self) -> usize {
        self.episodes.len()
    }

    pub fn file_count(&self) -> usize {
        self.episodes.iter().map(|episode| episode.files.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.shows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::KeepSeason;
    use crate::history::WatchedHistoryRecord;
    use chrono::{TimeZone, Utc};
    use std::path::PathBuf;

    fn descriptor(folder: &str, season: u32, episode: u32, file: &str) -> FileDescriptor {
        let directory = PathBuf::from(format!("/tv/{}/Season {}", folder, season));
        FileDescriptor {
            path: directory.join(file),
            directory,
            filename: file.to_string(),
            extension: "mkv".to_string(),
            companions: Vec::new(),
            season,
            episode,
            show_folder: folder.to_string(),
            identifiers: ShowIdentifiers::named(folder),
            rules: FolderRules::default(),
        }
    }

    #[test]
    fn test_same_path_twice_is_idempotent() {
        let index = WatchedIndex::default();
        let mut collection = Collection::new();
        let first = collection.add_file(descriptor("Show", 1, 1, "Show.S01E01.mkv"), &index);
        let second = collection.add_file(descriptor("Show", 1, 1, "Show.S01E01.mkv"), &index);

        assert_eq!(first, second);
        assert_eq!(collection.show_count(), 1);
        assert_eq!(collection.episode_count(), 1);
        assert_eq!(collection.file_count(), 1);
    }

    #[test]
    fn test_multi_part_episode_holds_both_files() {
        let index = WatchedIndex::default();
        let mut collection = Collection::new();
        let a = collection.add_file(descriptor("Show", 1, 1, "Show.S01E01.part1.mkv"), &index);
        let b = collection.add_file(descriptor("Show", 1, 1, "Show.S01E01.part2.mkv"), &index);

        assert_eq!(a, b);
        assert_eq!(collection.episode(a).files.len(), 2);
    }

    #[test]
    fn test_show_matched_by_id_across_folders() {
        let index = WatchedIndex::default();
        let mut collection = Collection::new();

        let mut first = descriptor("Doctor Who", 1, 1, "DW.S01E01.mkv");
        first.identifiers.trakt = Some(56872);
        let mut second = descriptor("Doctor Who (2005)", 2, 1, "DW.S02E01.mkv");
        second.identifiers.trakt = Some(56872);
        second.identifiers.imdb = Some("tt0436992".to_string());

        collection.add_file(first, &index);
        collection.add_file(second, &index);

        assert_eq!(collection.show_count(), 1);
        let show = collection.show(collection.show_ids().next().unwrap());
        assert_eq!(show.identifiers.name, "Doctor Who");
        assert_eq!(show.identifiers.imdb_id(), Some("tt0436992"));
        assert_eq!(show.seasons.len(), 2);
    }

    #[test]
    fn test_latest_season_follows_the_tree() {
        let index = WatchedIndex::default();
        let mut collection = Collection::new();
        for season in 1..=3 {
            collection.add_file(
                descriptor("Show", season, 1, &format!("Show.S0{}E01.mkv", season)),
                &index,
            );
        }
        let show = collection.find_show(&ShowIdentifiers::named("show")).unwrap();
        assert_eq!(collection.latest_season(show), Some(3));

        let rules = FolderRules {
            keep_seasons: vec![KeepSeason::Latest],
            ..FolderRules::default()
        };
        assert!(rules.keeps_season(3, collection.latest_season(show)));
        assert!(!rules.keeps_season(2, collection.latest_season(show)));

        collection.add_file(descriptor("Show", 4, 1, "Show.S04E01.mkv"), &index);
        assert_eq!(collection.latest_season(show), Some(4));
        assert!(!rules.keeps_season(3, collection.latest_season(show)));
        assert!(rules.keeps_season(4, collection.latest_season(show)));
    }

    #[test]
    fn test_watched_entry_is_bound() {
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 20, 0, 0).unwrap();
        let index = WatchedIndex::new(vec![WatchedHistoryRecord {
            show: ShowIdentifiers::named("SHOW"),
            entries: vec![WatchedEntry {
                season: 1,
                episode: 2,
                last_watched: at,
                source: "trakt".to_string(),
            }],
        }]);
        let mut collection = Collection::new();
        let watched = collection.add_file(descriptor("Show", 1, 2, "Show.S01E02.mkv"), &index);
        let unwatched = collection.add_file(descriptor("Show", 1, 3, "Show.S01E03.mkv"), &index);

        assert_eq!(
            collection.episode(watched).watched.as_ref().map(|e| e.last_watched),
            Some(at)
        );
        assert!(collection.episode(unwatched).watched.is_none());
    }

    #[test]
    fn test_rules_folder_tracks_latest_sighting() {
        let index = WatchedIndex::default();
        let mut collection = Collection::new();

        let mut first = descriptor("Doctor Who", 1, 1, "DW.S01E01.mkv");
        first.identifiers.trakt = Some(56872);
        let mut second = descriptor("Doctor Who (2005)", 2, 1, "DW.S02E01.mkv");
        second.identifiers.trakt = Some(56872);

        collection.add_file(first, &index);
        collection.add_file(second, &index);

        let show = collection.show(collection.show_ids().next().unwrap());
        assert_eq!(show.rules_folder, "Doctor Who (2005)");
    }

    #[test]
    fn test_later_rules_win() {
        let index = WatchedIndex::default();
        let mut collection = Collection::new();
        collection.add_file(descriptor("Show", 1, 1, "Show.S01E01.mkv"), &index);

        let mut kept = descriptor("Show", 1, 2, "Show.S01E02.mkv");
        kept.rules.keep_show = true;
        collection.add_file(kept, &index);

        let show = collection.find_show(&ShowIdentifiers::named("Show")).unwrap();
        assert!(collection.show(show).rules.keep_show);
    }
}
