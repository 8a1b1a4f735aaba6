use crate::config::{find_folder_settings, AppConfig, FolderRules, FolderSettings};
use crate::error::Error;
use crate::identifiers::ShowIdentifiers;
use glob::Pattern;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};

pub const MEDIA_EXTENSIONS: [&str; 3] = ["avi", "mkv", "mp4"];
pub const SUBTITLE_EXTENSIONS: [&str; 1] = ["srt"];

static EPISODE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)s(\d+)e(\d+)").expect("Invalid episode pattern"));

/// Everything the scanner needs besides the paths themselves.
#[derive(Debug, Clone, Default)]
pub struct ScanOptions {
    /// Applied to the show folder name; named groups `Show`, `IMDBID` and `TVDBID`.
    pub folder_regex: Option<Regex>,
    pub folder_settings: Vec<FolderSettings>,
    pub ignore_patterns: Vec<Pattern>,
}

impl ScanOptions {
    pub fn from_config(config: &AppConfig) -> Result<Self, Error> {
        let folder_regex = if config.folder_regex.is_empty() {
            None
        } else {
            Some(
                Regex::new(&config.folder_regex).map_err(|source| Error::InvalidRegex {
                    pattern: config.folder_regex.clone(),
                    source,
                })?,
            )
        };

        let ignore_patterns = config
            .ignore_patterns
            .iter()
            .map(|glob| {
                Pattern::new(glob)
                    .map_err(|e| Error::InvalidConfig(format!("ignore pattern '{}': {}", glob, e)))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            folder_regex,
            folder_settings: config.folder_settings.clone(),
            ignore_patterns,
        })
    }
}

/// A media file on disk, with what could be worked out about the episode it holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDescriptor {
    pub path: PathBuf,
    pub directory: PathBuf,
    pub filename: String,
    /// Lowercase, without the leading dot.
    pub extension: String,
    /// Subtitle files next to the media file whose names start with its stem.
    pub companions: Vec<PathBuf>,
    pub season: u32,
    pub episode: u32,
    pub show_folder: String,
    pub identifiers: ShowIdentifiers,
    pub rules: FolderRules,
}

impl FileDescriptor {
    /// Returns `Ok(None)` for anything that isn't a media file.
    pub fn parse(path: &Path, options: &ScanOptions) -> Result<Option<Self>, Error> {
        if media_extension(path).is_none() {
            return Ok(None);
        }
        let directory = path.parent().unwrap_or_else(|| Path::new("."));
        let siblings = fs::read_dir(directory)?
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().map(|t| !t.is_dir()).unwrap_or(false))
            .map(|entry| entry.path())
            .collect::<Vec<_>>();
        Self::parse_with_siblings(path, &siblings, options)
    }

    /// Like [`FileDescriptor::parse`], with the directory listing supplied by the caller.
    pub fn parse_with_siblings(
        path: &Path,
        siblings: &[PathBuf],
        options: &ScanOptions,
    ) -> Result<Option<Self>, Error> {
        let Some(extension) = media_extension(path) else {
            return Ok(None);
        };

        let directory = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        let filename = file_name(path)
            .ok_or_else(|| Error::parse(path, "path has no file name"))?;
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();

        let mut companions: Vec<PathBuf> = siblings
            .iter()
            .filter(|sibling| sibling.as_path() != path)
            .filter(|sibling| is_subtitle_file(sibling))
            .filter(|sibling| file_name(sibling).is_some_and(|name| name.starts_with(&stem)))
            .cloned()
            .collect();
        companions.sort();

        let (season, episode) = season_and_episode(path, &filename)?;

        let show_folder = directory
            .parent()
            .and_then(file_name)
            .ok_or_else(|| Error::parse(path, "file is not inside a show folder"))?;

        let mut identifiers = identify_show(path, &show_folder, options.folder_regex.as_ref())?;
        let rules = match find_folder_settings(&options.folder_settings, &show_folder) {
            Some(settings) => {
                settings.identifiers.apply(&mut identifiers);
                settings.rules.clone()
            }
            None => FolderRules::default(),
        };

        Ok(Some(Self {
            path: path.to_path_buf(),
            directory,
            filename,
            extension,
            companions,
            season,
            episode,
            show_folder,
            identifiers,
            rules,
        }))
    }

    /// The media file followed by its companions, in deletion order.
    pub fn all_paths(&self) -> impl Iterator<Item = &Path> {
        std::iter::once(self.path.as_path()).chain(self.companions.iter().map(PathBuf::as_path))
    }
}

pub fn is_media_file(path: &Path) -> bool {
    media_extension(path).is_some()
}

fn media_extension(path: &Path) -> Option<String> {
    let extension = path.extension()?.to_string_lossy().to_lowercase();
    MEDIA_EXTENSIONS
        .contains(&extension.as_str())
        .then_some(extension)
}

fn is_subtitle_file(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .is_some_and(|ext| SUBTITLE_EXTENSIONS.contains(&ext.as_str()))
}

fn file_name(path: &Path) -> Option<String> {
    path.file_name().map(|name| name.to_string_lossy().into_owned())
}

/// The last `S<n>E<n>` in the file name wins.
fn season_and_episode(path: &Path, filename: &str) -> Result<(u32, u32), Error> {
    let caps = EPISODE_PATTERN
        .captures_iter(filename)
        .last()
        .ok_or_else(|| Error::parse(path, "no S<season>E<episode> marker in file name"))?;

    let season = caps[1]
        .parse::<u32>()
        .map_err(|e| Error::parse(path, format!("season number: {}", e)))?;
    let episode = caps[2]
        .parse::<u32>()
        .map_err(|e| Error::parse(path, format!("episode number: {}", e)))?;
    Ok((season, episode))
}

fn identify_show(
    path: &Path,
    show_folder: &str,
    folder_regex: Option<&Regex>,
) -> Result<ShowIdentifiers, Error> {
    let mut identifiers = ShowIdentifiers::named(show_folder);

    let Some(caps) = folder_regex.and_then(|regex| regex.captures(show_folder)) else {
        return Ok(identifiers);
    };

    if let Some(show) = caps.name("Show").filter(|m| !m.as_str().is_empty()) {
        identifiers.name = show.as_str().to_string();
    }
    if let Some(imdb) = caps.name("IMDBID").filter(|m| !m.as_str().is_empty()) {
        identifiers.imdb = Some(imdb.as_str().to_string());
    }
    if let Some(tvdb) = caps.name("TVDBID").filter(|m| !m.as_str().is_empty()) {
        let id = tvdb
            .as_str()
            .parse::<u64>()
            .map_err(|e| Error::parse(path, format!("TVDBID '{}': {}", tvdb.as_str(), e)))?;
        identifiers.tvdb = Some(id);
    }
    Ok(identifiers)
}
