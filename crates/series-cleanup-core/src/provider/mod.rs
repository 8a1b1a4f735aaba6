pub mod trakt;

use crate::error::Error;
use crate::identifiers::ShowIdentifiers;
use chrono::{DateTime, Utc};
use serde::Deserialize;

/// Source of "what has the user watched, and when".
///
/// One bulk fetch per run; the result is turned into a
/// [`WatchedIndex`](crate::history::WatchedIndex) before scanning starts.
pub trait WatchedHistoryProvider {
    /// Short name recorded as the `source` of every watched entry.
    fn name(&self) -> &str;

    fn watched_shows(&self, username: &str) -> Result<Vec<WatchedShow>, Error>;
}

#[derive(Debug, Clone, Deserialize)]
pub struct WatchedShow {
    pub show: ProviderShow,
    #[serde(default)]
    pub seasons: Vec<WatchedSeason>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProviderShow {
    pub title: String,
    #[serde(default)]
    pub ids: ProviderIds,
}

impl ProviderShow {
    pub fn identifiers(&self) -> ShowIdentifiers {
        ShowIdentifiers {
            name: self.title.clone(),
            trakt: self.ids.trakt,
            slug: self.ids.slug.clone(),
            imdb: self.ids.imdb.clone(),
            tvdb: self.ids.tvdb,
            tmdb: self.ids.tmdb,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProviderIds {
    pub trakt: Option<u64>,
    pub slug: Option<String>,
    pub imdb: Option<String>,
    pub tvdb: Option<u64>,
    pub tmdb: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WatchedSeason {
    pub number: u32,
    #[serde(default)]
    pub episodes: Vec<WatchedEpisode>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WatchedEpisode {
    pub number: u32,
    pub last_watched_at: DateTime<Utc>,
}
