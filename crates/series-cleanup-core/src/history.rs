use crate::identifiers::{position_by_priority, ShowIdentifiers};
use crate::provider::WatchedShow;
use chrono::{DateTime, Utc};
use tracing::debug;

/// One watched episode as reported by a watched-history provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchedEntry {
    pub season: u32,
    pub episode: u32,
    pub last_watched: DateTime<Utc>,
    pub source: String,
}

/// Everything a provider knows about one show.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchedHistoryRecord {
    pub show: ShowIdentifiers,
    pub entries: Vec<WatchedEntry>,
}

impl WatchedHistoryRecord {
    pub fn entry(&self, season: u32, episode: u32) -> Option<&WatchedEntry> {
        self.entries
            .iter()
            .find(|entry| entry.season == season && entry.episode == episode)
    }
}

/// Read-only index of watched history, built once before scanning starts.
#[derive(Debug, Clone, Default)]
pub struct WatchedIndex {
    records: Vec<WatchedHistoryRecord>,
}

impl WatchedIndex {
    pub fn new(records: Vec<WatchedHistoryRecord>) -> Self {
        Self { records }
    }

    /// Build the index from a provider response. Shows reported twice under
    /// the same title (ignoring case) end up in a single record.
    pub fn from_watched_shows(shows: Vec<WatchedShow>, source: &str) -> Self {
        let mut records: Vec<WatchedHistoryRecord> = Vec::new();

        for watched in shows {
            let ids = watched.show.identifiers();
            let title = ids.name.to_lowercase();
            let pos = match records
                .iter()
                .position(|record| record.show.name.to_lowercase() == title)
            {
                Some(pos) => {
                    records[pos].show = ids;
                    pos
                }
                None => {
                    records.push(WatchedHistoryRecord {
                        show: ids,
                        entries: Vec::new(),
                    });
                    records.len() - 1
                }
            };

            let record = &mut records[pos];
            for season in watched.seasons {
                for episode in season.episodes {
                    record.entries.push(WatchedEntry {
                        season: season.number,
                        episode: episode.number,
                        last_watched: episode.last_watched_at,
                        source: source.to_string(),
                    });
                }
            }
        }

        debug!("Indexed watched history for {} shows", records.len());
        Self { records }
    }

    pub fn find(&self, key: &ShowIdentifiers) -> Option<&WatchedHistoryRecord> {
        position_by_priority(&self.records, key, |record| &record.show).map(|(pos, field)| {
            debug!(show = %key, matched_on = field.as_str(), "Matched watched history");
            &self.records[pos]
        })
    }

    pub fn lookup_episode(
        &self,
        key: &ShowIdentifiers,
        season: u32,
        episode: u32,
    ) -> Option<&WatchedEntry> {
        self.find(key)?.entry(season, episode)
    }

    pub fn records(&self) -> &[WatchedHistoryRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn episode_count(&self) -> usize {
        self.records.iter().map(|record| record.entries.len()).sum()
    }
}
