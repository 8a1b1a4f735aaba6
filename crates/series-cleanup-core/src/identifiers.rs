use serde::{Deserialize, Serialize};
use std::fmt;

/// The ways a show can be recognised: the folder (or provider) name plus the
/// external ids the watched-history provider knows about.
///
/// Empty strings and zero ids count as "not set".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShowIdentifiers {
    pub name: String,
    #[serde(default)]
    pub trakt: Option<u64>,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub imdb: Option<String>,
    #[serde(default)]
    pub tvdb: Option<u64>,
    #[serde(default)]
    pub tmdb: Option<u64>,
}

impl ShowIdentifiers {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn trakt_id(&self) -> Option<u64> {
        self.trakt.filter(|id| *id != 0)
    }

    pub fn slug(&self) -> Option<&str> {
        non_empty(&self.slug)
    }

    pub fn imdb_id(&self) -> Option<&str> {
        non_empty(&self.imdb)
    }

    pub fn tvdb_id(&self) -> Option<u64> {
        self.tvdb.filter(|id| *id != 0)
    }

    pub fn tmdb_id(&self) -> Option<u64> {
        self.tmdb.filter(|id| *id != 0)
    }

    /// Fill every field that is unset here with the value from `other`.
    /// Fields already set are left alone.
    pub fn enrich_from(&mut self, other: &ShowIdentifiers) {
        if self.name.trim().is_empty() {
            self.name = other.name.clone();
        }
        if self.trakt_id().is_none() {
            self.trakt = other.trakt_id();
        }
        if self.slug().is_none() {
            self.slug = other.slug().map(str::to_owned);
        }
        if self.imdb_id().is_none() {
            self.imdb = other.imdb_id().map(str::to_owned);
        }
        if self.tvdb_id().is_none() {
            self.tvdb = other.tvdb_id();
        }
        if self.tmdb_id().is_none() {
            self.tmdb = other.tmdb_id();
        }
    }
}

impl fmt::Display for ShowIdentifiers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Identifier fields in the order they are consulted when matching shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdField {
    Trakt,
    Imdb,
    Tvdb,
    Slug,
    Name,
}

impl IdField {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Trakt => "trakt",
            Self::Imdb => "imdb",
            Self::Tvdb => "tvdb",
            Self::Slug => "slug",
            Self::Name => "name",
        }
    }
}

/// `None` when the query does not carry the field, so the step is skipped.
type Matcher = fn(&ShowIdentifiers, &ShowIdentifiers) -> Option<bool>;

const MATCH_PRIORITY: [(IdField, Matcher); 5] = [
    (IdField::Trakt, match_trakt),
    (IdField::Imdb, match_imdb),
    (IdField::Tvdb, match_tvdb),
    (IdField::Slug, match_slug),
    (IdField::Name, match_name),
];

fn match_trakt(query: &ShowIdentifiers, candidate: &ShowIdentifiers) -> Option<bool> {
    query
        .trakt_id()
        .map(|id| candidate.trakt_id() == Some(id))
}

fn match_imdb(query: &ShowIdentifiers, candidate: &ShowIdentifiers) -> Option<bool> {
    query.imdb_id().map(|id| {
        candidate
            .imdb_id()
            .is_some_and(|other| other.eq_ignore_ascii_case(id))
    })
}

fn match_tvdb(query: &ShowIdentifiers, candidate: &ShowIdentifiers) -> Option<bool> {
    query.tvdb_id().map(|id| candidate.tvdb_id() == Some(id))
}

fn match_slug(query: &ShowIdentifiers, candidate: &ShowIdentifiers) -> Option<bool> {
    query.slug().map(|slug| candidate.slug() == Some(slug))
}

fn match_name(query: &ShowIdentifiers, candidate: &ShowIdentifiers) -> Option<bool> {
    let name = query.name.trim();
    if name.is_empty() {
        return None;
    }
    Some(name.to_lowercase() == candidate.name.trim().to_lowercase())
}

/// Walk the identifier priority chain and return the position of the first
/// item matching `key`, together with the field that matched.
///
/// Each step only looks at one field: every item is tried against the
/// trakt id before any item is tried against the imdb id, and so on.
pub fn position_by_priority<T>(
    items: &[T],
    key: &ShowIdentifiers,
    ids: impl Fn(&T) -> &ShowIdentifiers,
) -> Option<(usize, IdField)> {
    if items.is_empty() {
        return None;
    }

    for (field, matcher) in MATCH_PRIORITY {
        // Check the first item to learn whether the query has this field.
        if matcher(key, ids(&items[0])).is_none() {
            continue;
        }
        if let Some(pos) = items
            .iter()
            .position(|item| matcher(key, ids(item)) == Some(true))
        {
            return Some((pos, field));
        }
    }
    None
}
