pub mod descriptor;
pub mod walk;

pub use descriptor::{is_media_file, FileDescriptor, ScanOptions};

use crate::error::Error;
use rayon::prelude::*;
use std::path::PathBuf;
use tracing::{debug, warn};

/// A media file that was found but could not be turned into a [`FileDescriptor`].
#[derive(Debug, Clone)]
pub struct ParseFailure {
    pub path: PathBuf,
    pub reason: String,
}

#[derive(Debug, Default)]
pub struct ScanReport {
    /// Sorted by path, so that inserting them in order is deterministic.
    pub descriptors: Vec<FileDescriptor>,
    pub files_seen: usize,
    pub parse_failures: Vec<ParseFailure>,
}

/// Walk every root in parallel and parse each media file found.
///
/// A file that fails to parse is logged and reported, it never aborts the scan.
pub fn scan_folders(roots: &[PathBuf], options: &ScanOptions) -> Result<ScanReport, Error> {
    let directory_map = walk::build_directory_map(roots, &options.ignore_patterns)?;
    let directories: Vec<(PathBuf, Vec<PathBuf>)> = directory_map.into_iter().collect();

    let files_seen = directories.iter().map(|(_, files)| files.len()).sum();

    let results: Vec<(PathBuf, Result<Option<FileDescriptor>, Error>)> = directories
        .par_iter()
        .flat_map_iter(|(_, files)| {
            files
                .iter()
                .filter(|path| is_media_file(path))
                .map(move |path| {
                    (
                        path.clone(),
                        FileDescriptor::parse_with_siblings(path, files, options),
                    )
                })
        })
        .collect();

    let mut report = ScanReport {
        files_seen,
        ..ScanReport::default()
    };
    for (path, result) in results {
        match result {
            Ok(Some(descriptor)) => {
                debug!(
                    folder = %descriptor.directory.display(),
                    file = %descriptor.filename,
                    "Found media file"
                );
                report.descriptors.push(descriptor);
            }
            Ok(None) => {}
            Err(err) => {
                warn!(file = %path.display(), "Skipping file: {}", err);
                report.parse_failures.push(ParseFailure {
                    path,
                    reason: err.to_string(),
                });
            }
        }
    }

    report.descriptors.sort_by(|a, b| a.path.cmp(&b.path));
    report.parse_failures.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(report)
}
