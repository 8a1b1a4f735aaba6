use dashmap::DashMap;
use glob::Pattern;
use rayon::prelude::*;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::error;

/// Parallel directory traversal. Builds a map of directory → files directly
/// inside it, filtering by glob ignore patterns. Hidden files are skipped and
/// symlinked directories are not followed.
pub fn build_directory_map(
    root_paths: &[PathBuf],
    ignore_patterns: &[Pattern],
) -> io::Result<DashMap<PathBuf, Vec<PathBuf>>> {
    let map: DashMap<PathBuf, Vec<PathBuf>> = DashMap::new();

    root_paths
        .par_iter()
        .try_for_each(|root_dir| visit_dirs(root_dir, &map, ignore_patterns))?;

    Ok(map)
}

fn visit_dirs(
    dir: &Path,
    map: &DashMap<PathBuf, Vec<PathBuf>>,
    ignore_patterns: &[Pattern],
) -> io::Result<()> {
    if !dir.is_dir() {
        return Ok(());
    }

    if is_ignored(dir, ignore_patterns) {
        return Ok(());
    }

    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) => {
            if err.kind() == io::ErrorKind::PermissionDenied {
                error!(
                    "Access denied reading directory {}: {}",
                    dir.display(),
                    err
                );
                return Ok(());
            } else {
                return Err(io::Error::new(
                    err.kind(),
                    format!("Error reading directory {}: {}", dir.display(), err),
                ));
            }
        }
    };

    entries.par_bridge().try_for_each(|entry_result| {
        let entry = match entry_result {
            Ok(entry) => entry,
            Err(err) => {
                return Err(io::Error::new(
                    err.kind(),
                    format!(
                        "Error reading entry in directory {}: {}",
                        dir.display(),
                        err
                    ),
                ));
            }
        };

        let path = entry.path();
        let file_type = entry.file_type().map_err(|err| {
            io::Error::new(
                err.kind(),
                format!("Error getting file type for {}: {}", path.display(), err),
            )
        })?;

        if file_type.is_dir() {
            visit_dirs(&path, map, ignore_patterns)?;
        } else if !is_hidden(&path) && !is_ignored(&path, ignore_patterns) {
            map.entry(dir.to_path_buf()).or_default().push(path);
        }
        Ok(())
    })?;

    Ok(())
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .is_some_and(|name| name.to_string_lossy().starts_with('.'))
}

fn is_ignored(path: &Path, ignore_patterns: &[Pattern]) -> bool {
    ignore_patterns
        .iter()
        .any(|pattern| pattern.matches_path(path))
}
