use crate::error::Error;
use crate::identifiers::ShowIdentifiers;
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, Environment, File as ConfigFile};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::path::{Path, PathBuf};

pub const DEFAULT_FOLDER_REGEX: &str = "(?P<Show>.*)";
const DEFAULT_CONFIG_NAME: &str = "series-cleanup";
const ENV_PREFIX: &str = "SC";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub dry_run: bool,
    pub scan_folders: Vec<PathBuf>,
    #[serde(default)]
    pub ignore_patterns: Vec<String>,
    #[serde(default = "default_folder_regex")]
    pub folder_regex: String,
    pub rules: GlobalRules,
    #[serde(default)]
    pub folder_settings: Vec<FolderSettings>,
    pub trakt: TraktConfig,
}

fn default_folder_regex() -> String {
    DEFAULT_FOLDER_REGEX.to_string()
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GlobalRules {
    pub delete_watched_after_hours: u32,
}

/// Per-folder identifier and rule overrides, matched case-insensitively
/// against the show folder of every scanned file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FolderSettings {
    pub folder: String,
    #[serde(default)]
    pub identifiers: IdentifierOverrides,
    #[serde(default)]
    pub rules: FolderRules,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IdentifierOverrides {
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

impl IdentifierOverrides {
    /// Every field set here replaces whatever the file name or folder regex produced.
    pub fn apply(&self, ids: &mut ShowIdentifiers) {
        let overrides = ShowIdentifiers {
            name: String::new(),
            trakt: self.trakt,
            slug: self.slug.clone(),
            imdb: self.imdb.clone(),
            tvdb: self.tvdb,
            tmdb: self.tmdb,
        };
        if let Some(id) = overrides.trakt_id() {
            ids.trakt = Some(id);
        }
        if let Some(slug) = overrides.slug() {
            ids.slug = Some(slug.to_string());
        }
        if let Some(imdb) = overrides.imdb_id() {
            ids.imdb = Some(imdb.to_string());
        }
        if let Some(id) = overrides.tvdb_id() {
            ids.tvdb = Some(id);
        }
        if let Some(id) = overrides.tmdb_id() {
            ids.tmdb = Some(id);
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderRules {
    /// 0 or absent inherits the global value.
    #[serde(default)]
    pub delete_watched_after_hours: Option<u32>,
    #[serde(default)]
    pub keep_show: bool,
    #[serde(default)]
    pub keep_seasons: Vec<KeepSeason>,
}

impl FolderRules {
    pub fn grace_override(&self) -> Option<u32> {
        self.delete_watched_after_hours.filter(|hours| *hours != 0)
    }

    /// Whether `season` must be kept, given the highest season number the show currently has.
    pub fn keeps_season(&self, season: u32, latest_season: Option<u32>) -> bool {
        self.keep_seasons.iter().any(|keep| match keep {
            KeepSeason::Number(number) => *number == season,
            KeepSeason::Latest => latest_season == Some(season),
        })
    }
}

/// One entry of `keep_seasons`. Configured as a season number, or `-1` for
/// whatever season is currently the latest one on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum KeepSeason {
    Latest,
    Number(u32),
}

impl TryFrom<i64> for KeepSeason {
    type Error = String;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            -1 => Ok(KeepSeason::Latest),
            n => u32::try_from(n)
                .map(KeepSeason::Number)
                .map_err(|_| format!("invalid season {n}: use a season number or -1 for the latest")),
        }
    }
}

impl From<KeepSeason> for i64 {
    fn from(value: KeepSeason) -> Self {
        match value {
            KeepSeason::Latest => -1,
            KeepSeason::Number(n) => i64::from(n),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraktConfig {
    pub client_id: String,
    pub client_secret: SensitiveString,
    pub user: String,
    pub cache_dir: PathBuf,
}

/// A string that never shows up in logs or printed configuration.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct SensitiveString(String);

impl SensitiveString {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SensitiveString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl fmt::Display for SensitiveString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl Serialize for SensitiveString {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str("[REDACTED]")
    }
}

impl<'de> Deserialize<'de> for SensitiveString {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(SensitiveString)
    }
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), Error> {
        if self.scan_folders.is_empty() {
            return Err(invalid("scan_folders: at least one folder is required"));
        }
        if self.rules.delete_watched_after_hours == 0 {
            return Err(invalid("rules.delete_watched_after_hours: must be >= 1"));
        }
        regex::Regex::new(&self.folder_regex).map_err(|source| Error::InvalidRegex {
            pattern: self.folder_regex.clone(),
            source,
        })?;
        for pattern in &self.ignore_patterns {
            glob::Pattern::new(pattern)
                .map_err(|e| invalid(format!("ignore_patterns: '{pattern}': {e}")))?;
        }
        for (i, settings) in self.folder_settings.iter().enumerate() {
            if settings.folder.trim().is_empty() {
                return Err(invalid(format!("folder_settings[{i}].folder: this field is required")));
            }
            if settings.rules.keep_show && !settings.rules.keep_seasons.is_empty() {
                return Err(invalid(format!(
                    "folder_settings[{i}] ({}): keep_show and keep_seasons are mutually exclusive",
                    settings.folder
                )));
            }
        }
        if self.trakt.client_id.trim().is_empty() {
            return Err(invalid("trakt.client_id: this field is required"));
        }
        if self.trakt.client_secret.expose().trim().is_empty() {
            return Err(invalid("trakt.client_secret: this field is required"));
        }
        if self.trakt.user.trim().is_empty() {
            return Err(invalid("trakt.user: this field is required"));
        }
        if !self.trakt.cache_dir.is_dir() {
            return Err(invalid(format!(
                "trakt.cache_dir: folder '{}' does not exist",
                self.trakt.cache_dir.display()
            )));
        }
        Ok(())
    }
}

/// Folder settings for a show folder, if any.
pub fn find_folder_settings<'a>(
    settings: &'a [FolderSettings],
    folder: &str,
) -> Option<&'a FolderSettings> {
    let folder = folder.to_lowercase();
    settings
        .iter()
        .find(|item| item.folder.to_lowercase() == folder)
}

fn invalid(message: impl Into<String>) -> Error {
    Error::InvalidConfig(message.into())
}

fn defaults() -> Result<ConfigBuilder<DefaultState>, Error> {
    Ok(Config::builder()
        .set_default("dry_run", false)?
        .set_default("folder_regex", DEFAULT_FOLDER_REGEX)?
        .set_default("rules.delete_watched_after_hours", 24)?
        .set_default("trakt.cache_dir", ".")?)
}

/// Load defaults, then the config file, then `SC_*` environment variables.
/// An explicit `path` must exist; the default `series-cleanup.*` file is optional.
pub fn load_configuration(path: Option<&Path>) -> Result<AppConfig, Error> {
    let file_source = match path {
        Some(path) => ConfigFile::from(path).required(true),
        None => ConfigFile::with_name(DEFAULT_CONFIG_NAME).required(false),
    };

    let builder = defaults()?.add_source(file_source).add_source(
        Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("_")
            .separator("__")
            .list_separator(" ")
            .with_list_parse_key("scan_folders")
            .with_list_parse_key("ignore_patterns")
            .try_parsing(true),
    );

    from_builder(builder)
}

fn from_builder(builder: ConfigBuilder<DefaultState>) -> Result<AppConfig, Error> {
    let config = builder.build()?.try_deserialize::<AppConfig>()?;
    config.validate()?;
    Ok(config)
}

/// Remove directories that are subdirectories of other directories in the list.
pub fn non_overlapping_directories(dirs: &[PathBuf]) -> Vec<PathBuf> {
    let mut result: Vec<PathBuf> = Vec::new();

    for dir in dirs {
        if result.iter().any(|kept| dir.starts_with(kept)) {
            continue;
        }
        result.retain(|kept| !kept.starts_with(dir));
        result.push(dir.clone());
    }

    result
}
