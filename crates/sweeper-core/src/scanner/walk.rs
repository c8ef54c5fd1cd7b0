use glob::Pattern;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, error, info, warn};
use walkdir::{DirEntry, WalkDir};

use crate::cancel::CancelToken;
use crate::error::Error;
use crate::model::FileRecord;
use crate::progress::ProgressReporter;

const PROGRESS_EVERY: usize = 1_000;

#[derive(Debug, Clone, Default)]
pub struct ScanOptions {
    /// Deepest directory level whose files are included (root = 0).
    pub max_depth: Option<usize>,
    pub min_size: u64,
    /// Lower-cased, dot-prefixed. Empty accepts every extension.
    pub extensions: Vec<String>,
    pub ignore_patterns: Vec<String>,
}

impl ScanOptions {
    pub fn new(
        max_depth: Option<usize>,
        min_size: u64,
        extensions: &[String],
        ignore_patterns: &[String],
    ) -> Self {
        Self {
            max_depth,
            min_size,
            extensions: extensions.iter().map(|e| normalize_extension(e)).collect(),
            ignore_patterns: ignore_patterns.to_vec(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedDir {
    pub path: PathBuf,
    pub depth: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanStats {
    pub files_seen: usize,
    pub files_filtered: usize,
    pub errors: usize,
}

/// Result of one sequential walk: candidate files in walk order plus every
/// directory visited.
#[derive(Debug, Clone)]
pub struct Inventory {
    pub root: PathBuf,
    pub files: Vec<FileRecord>,
    pub dirs: Vec<ScannedDir>,
    pub stats: ScanStats,
}

/// Sequential walk of `root`. Symlinks are never followed and per-entry
/// failures are counted, not returned.
pub fn scan_inventory(
    root: &Path,
    options: &ScanOptions,
    cancel: &CancelToken,
    reporter: &dyn ProgressReporter,
) -> Result<Inventory, Error> {
    if !root.is_dir() {
        return Err(Error::InvalidArgument(format!(
            "scan root is not a directory: {}",
            root.display()
        )));
    }

    let ignore_patterns: Vec<Pattern> = options
        .ignore_patterns
        .iter()
        .filter_map(|glob| match Pattern::new(glob) {
            Ok(p) => Some(p),
            Err(e) => {
                error!("Invalid glob pattern '{}': {}", glob, e);
                None
            }
        })
        .collect();

    info!("Scanning {}", root.display());
    reporter.on_scan_start();
    let start = Instant::now();

    let mut walker = WalkDir::new(root).follow_links(false).sort_by_file_name();
    if let Some(depth) = options.max_depth {
        walker = walker.max_depth(depth + 1);
    }

    let max_depth = options.max_depth;
    let entries = walker
        .into_iter()
        .filter_entry(|entry| keep_entry(entry, max_depth, &ignore_patterns));

    let mut files = Vec::new();
    let mut dirs = Vec::new();
    let mut stats = ScanStats::default();

    for entry in entries {
        cancel.check()?;

        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Skipping unreadable entry: {}", e);
                stats.errors += 1;
                continue;
            }
        };

        let file_type = entry.file_type();
        if file_type.is_dir() {
            dirs.push(ScannedDir {
                path: entry.path().to_path_buf(),
                depth: entry.depth(),
            });
            continue;
        }
        if !file_type.is_file() {
            continue;
        }

        let metadata = match entry.metadata() {
            Ok(metadata) => metadata,
            Err(e) => {
                warn!("Cannot stat {}: {}", entry.path().display(), e);
                stats.errors += 1;
                continue;
            }
        };

        stats.files_seen += 1;
        let size = metadata.len();
        if size < options.min_size || !extension_allowed(entry.path(), &options.extensions) {
            stats.files_filtered += 1;
            continue;
        }

        files.push(FileRecord {
            path: entry.path().to_path_buf(),
            size,
            modified: metadata.modified().ok(),
        });

        if files.len() % PROGRESS_EVERY == 0 {
            reporter.on_scan_progress(files.len(), &entry.path().to_string_lossy());
        }
    }

    let elapsed = start.elapsed().as_secs_f64();
    debug!(
        "Scan completed in {:.2}s: {} files kept, {} seen, {} filtered, {} errors, {} dirs",
        elapsed,
        files.len(),
        stats.files_seen,
        stats.files_filtered,
        stats.errors,
        dirs.len(),
    );
    reporter.on_scan_complete(files.len(), elapsed);

    Ok(Inventory {
        root: root.to_path_buf(),
        files,
        dirs,
        stats,
    })
}

fn keep_entry(entry: &DirEntry, max_depth: Option<usize>, ignore: &[Pattern]) -> bool {
    if entry.depth() == 0 {
        return true;
    }
    if entry.file_type().is_dir() && max_depth.map(|d| entry.depth() > d).unwrap_or(false) {
        return false;
    }
    !ignore.iter().any(|pattern| {
        pattern.matches_path(entry.path())
            || entry
                .file_name()
                .to_str()
                .map(|name| pattern.matches(name))
                .unwrap_or(false)
    })
}

fn extension_allowed(path: &Path, allowed: &[String]) -> bool {
    if allowed.is_empty() {
        return true;
    }
    match path.extension() {
        Some(ext) => {
            let ext = format!(".{}", ext.to_string_lossy().to_lowercase());
            allowed.iter().any(|a| *a == ext)
        }
        None => false,
    }
}

fn normalize_extension(ext: &str) -> String {
    let ext = ext.trim().to_lowercase();
    if ext.starts_with('.') {
        ext
    } else {
        format!(".{ext}")
    }
}
