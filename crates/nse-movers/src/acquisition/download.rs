//! Download-directory scanning and arrival confirmation.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime};

use crate::config::FileSelection;

/// Regular files in `dir` whose extension equals `extension` (case-insensitive),
/// in directory listing order.
///
/// In-flight browser artefacts such as `report.csv.crdownload` carry their own
/// extension and never match.
pub fn matching_files(dir: &Path, extension: &str) -> io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let matches = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case(extension));
        if matches {
            files.push(path);
        }
    }
    Ok(files)
}

/// Size and modification time of every matching file, taken before the
/// download is triggered.
///
/// A file counts as fresh when it is absent from the snapshot or its size or
/// mtime has changed since. Files left over from earlier runs are never
/// mistaken for the new download.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirSnapshot {
    files: HashMap<PathBuf, FileStamp>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FileStamp {
    len: u64,
    modified: Option<SystemTime>,
}

impl FileStamp {
    fn of(path: &Path) -> Option<Self> {
        let meta = std::fs::metadata(path).ok()?;
        Some(Self {
            len: meta.len(),
            modified: meta.modified().ok(),
        })
    }
}

impl DirSnapshot {
    /// Stamp every file in `dir` matching `extension`. An unreadable or
    /// missing directory yields an empty snapshot.
    pub fn capture(dir: &Path, extension: &str) -> Self {
        let files = matching_files(dir, extension).unwrap_or_else(|e| {
            tracing::debug!("No baseline for {}: {e}", dir.display());
            Vec::new()
        });
        let files: HashMap<PathBuf, FileStamp> = files
            .into_iter()
            .filter_map(|path| FileStamp::of(&path).map(|stamp| (path, stamp)))
            .collect();
        if !files.is_empty() {
            tracing::debug!("{} existing file(s) excluded from confirmation", files.len());
        }
        Self { files }
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// True if `path` appeared or changed after the snapshot was taken.
    pub fn is_fresh(&self, path: &Path) -> bool {
        match self.files.get(path) {
            None => true,
            Some(before) => FileStamp::of(path).is_some_and(|now| now != *before),
        }
    }
}

/// Pick one file from a listing.
pub fn select(files: &[PathBuf], selection: FileSelection) -> Option<PathBuf> {
    match selection {
        FileSelection::FirstListed => files.first().cloned(),
        FileSelection::MostRecent => {
            let mut best: Option<(&PathBuf, SystemTime)> = None;
            for path in files {
                let modified = std::fs::metadata(path)
                    .and_then(|m| m.modified())
                    .unwrap_or(SystemTime::UNIX_EPOCH);
                // Strictly newer only, so ties keep listing order.
                if best.map_or(true, |(_, t)| modified > t) {
                    best = Some((path, modified));
                }
            }
            best.map(|(p, _)| p.clone())
        }
    }
}

/// Poll `dir` until a fresh matching file is present with a stable size, or
/// `timeout` elapses.
///
/// Only files that are new or changed relative to `baseline` are candidates.
/// At the deadline any fresh match is accepted even if it was still growing.
/// Returns `None` when no fresh file matched at all.
pub async fn await_download(
    dir: &Path,
    extension: &str,
    baseline: &DirSnapshot,
    selection: FileSelection,
    timeout: Duration,
    interval: Duration,
) -> Option<PathBuf> {
    let deadline = Instant::now() + timeout;
    let mut last_seen: Option<(PathBuf, u64)> = None;

    loop {
        let mut files = matching_files(dir, extension).unwrap_or_else(|e| {
            tracing::warn!("Cannot list {}: {e}", dir.display());
            Vec::new()
        });
        files.retain(|path| baseline.is_fresh(path));
        let chosen = select(&files, selection);

        if let Some(path) = &chosen {
            let size = std::fs::metadata(path).map(|m| m.len()).ok();
            match (&last_seen, size) {
                (Some((prev, prev_size)), Some(size)) if prev == path && *prev_size == size => {
                    tracing::debug!("{} settled at {size} bytes", path.display());
                    return chosen;
                }
                (_, Some(size)) => last_seen = Some((path.clone(), size)),
                (_, None) => last_seen = None,
            }
        } else {
            last_seen = None;
        }

        if Instant::now() >= deadline {
            return chosen;
        }
        tokio::time::sleep(interval).await;
    }
}
