use ahash::AHashMap;
use rayon::prelude::*;
use std::hash::Hash;
use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;
use tracing::{debug, error, info};

use super::{strong, worker_pool, xxhash};
use crate::cancel::CancelToken;
use crate::error::Error;
use crate::model::{DuplicateGroup, FileRecord, GroupMember};
use crate::progress::ProgressReporter;

const PROGRESS_EVERY: usize = 256;

#[derive(Debug, Clone, Copy)]
pub struct MatchOptions {
    pub min_group_count: usize,
    pub workers: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MatchStats {
    /// Files sharing their exact size with enough others to form a group.
    pub size_candidates: usize,
    pub cheap_hashed: usize,
    pub strong_hashed: usize,
    /// Zero-byte or unreadable files.
    pub excluded: usize,
}

/// Size → cheap hash → strong hash. Each tier only reads the survivors of the
/// previous one. Groups and their members come out in scan order.
pub fn find_duplicate_groups(
    files: &[FileRecord],
    options: MatchOptions,
    cancel: &CancelToken,
    reporter: &dyn ProgressReporter,
) -> Result<(Vec<DuplicateGroup>, MatchStats), Error> {
    let min_count = options.min_group_count.max(2);
    let pool = worker_pool(options.workers)?;
    let mut stats = MatchStats::default();

    // Tier 1: exact size.
    let mut by_size: Vec<Vec<usize>> = Vec::new();
    let mut size_index: AHashMap<u64, usize> = AHashMap::new();
    for (i, file) in files.iter().enumerate() {
        if file.size == 0 {
            stats.excluded += 1;
            continue;
        }
        let slot = *size_index.entry(file.size).or_insert_with(|| {
            by_size.push(Vec::new());
            by_size.len() - 1
        });
        by_size[slot].push(i);
    }
    let candidates = survivors(by_size, min_count);
    stats.size_candidates = candidates.len();
    debug!(
        "{} of {} files share a size with at least {} others",
        candidates.len(),
        files.len(),
        min_count - 1
    );

    // Tier 2: cheap whole-file hash.
    let cheap = run_tier(&pool, "cheap", files, &candidates, cancel, reporter, |p| {
        xxhash::hash_file(p)
    })?;
    stats.cheap_hashed = candidates.len();
    let (by_cheap, failed) = regroup(&candidates, cheap, |i, h| (files[i].size, h));
    stats.excluded += failed;
    let candidates = survivors(by_cheap, min_count);

    // Tier 3: strong hash, only on cheap-hash collisions.
    let strong = run_tier(&pool, "strong", files, &candidates, cancel, reporter, |p| {
        strong::hash_file(p)
    })?;
    stats.strong_hashed = candidates.len();

    let mut hashes: AHashMap<usize, String> = AHashMap::new();
    for (&i, digest) in candidates.iter().zip(strong.iter()) {
        if let Some(digest) = digest {
            hashes.insert(i, digest.clone());
        }
    }
    let (by_strong, failed) = regroup(&candidates, strong, |i, h| (files[i].size, h));
    stats.excluded += failed;

    let groups: Vec<DuplicateGroup> = by_strong
        .into_iter()
        .filter(|members| members.len() >= min_count)
        .filter_map(|members| {
            let first = *members.first()?;
            Some(DuplicateGroup {
                strong_hash: hashes.get(&first)?.clone(),
                size: files[first].size,
                members: members
                    .iter()
                    .map(|&i| GroupMember {
                        path: files[i].path.clone(),
                        size: files[i].size,
                    })
                    .collect(),
            })
        })
        .collect();

    info!(
        "Found {} duplicate groups ({} cheap-hashed, {} strong-hashed, {} excluded)",
        groups.len(),
        stats.cheap_hashed,
        stats.strong_hashed,
        stats.excluded
    );
    Ok((groups, stats))
}

/// Hashes `indices` on the pool. Results line up with `indices`; a failed read
/// yields `None`.
fn run_tier<T, F>(
    pool: &rayon::ThreadPool,
    tier: &str,
    files: &[FileRecord],
    indices: &[usize],
    cancel: &CancelToken,
    reporter: &dyn ProgressReporter,
    hash: F,
) -> Result<Vec<Option<T>>, Error>
where
    T: Send,
    F: Fn(&Path) -> io::Result<T> + Sync,
{
    let total = indices.len();
    reporter.on_hash_start(tier, total);
    let start = Instant::now();
    let done = AtomicUsize::new(0);

    let results: Vec<Option<T>> = pool.install(|| {
        indices
            .par_iter()
            .map(|&i| {
                if cancel.is_cancelled() {
                    return None;
                }
                let path = &files[i].path;
                let result = match hash(path) {
                    Ok(h) => Some(h),
                    Err(e) => {
                        error!("Error hashing '{}': {}", path.display(), e);
                        None
                    }
                };
                let finished = done.fetch_add(1, Ordering::Relaxed) + 1;
                if finished % PROGRESS_EVERY == 0 || finished == total {
                    reporter.on_hash_progress(finished, total);
                }
                result
            })
            .collect()
    });
    cancel.check()?;

    let hashed = results.iter().filter(|r| r.is_some()).count();
    reporter.on_hash_complete(tier, hashed, start.elapsed().as_secs_f64());
    debug!(
        "{} tier hashed {} files in {:.2}s",
        tier,
        total,
        start.elapsed().as_secs_f64()
    );
    Ok(results)
}

/// Order-preserving regroup of `indices` by a key built from each result.
fn regroup<T, K, F>(indices: &[usize], results: Vec<Option<T>>, key: F) -> (Vec<Vec<usize>>, usize)
where
    K: Hash + Eq,
    F: Fn(usize, T) -> K,
{
    let mut buckets: Vec<Vec<usize>> = Vec::new();
    let mut index: AHashMap<K, usize> = AHashMap::new();
    let mut failed = 0;
    for (&i, result) in indices.iter().zip(results) {
        let Some(value) = result else {
            failed += 1;
            continue;
        };
        let slot = *index.entry(key(i, value)).or_insert_with(|| {
            buckets.push(Vec::new());
            buckets.len() - 1
        });
        buckets[slot].push(i);
    }
    (buckets, failed)
}

fn survivors(buckets: Vec<Vec<usize>>, min_count: usize) -> Vec<usize> {
    buckets
        .into_iter()
        .filter(|b| b.len() >= min_count)
        .flatten()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::SilentReporter;
    use std::fs;
    use std::path::PathBuf;

    fn record(path: PathBuf) -> FileRecord {
        let size = fs::metadata(&path).unwrap().len();
        FileRecord {
            path,
            size,
            modified: None,
        }
    }

    fn options(min: usize) -> MatchOptions {
        MatchOptions {
            min_group_count: min,
            workers: 2,
        }
    }

    #[test]
    fn test_same_size_different_content_is_not_a_group() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a");
        let b = dir.path().join("b");
        let c = dir.path().join("c");
        fs::write(&a, b"aaaa").unwrap();
        fs::write(&b, b"bbbb").unwrap();
        fs::write(&c, b"aaaa").unwrap();
        let files = vec![record(a.clone()), record(b), record(c.clone())];

        let (groups, stats) =
            find_duplicate_groups(&files, options(2), &CancelToken::new(), &SilentReporter).unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].members[0].path, a);
        assert_eq!(groups[0].members[1].path, c);
        assert_eq!(stats.size_candidates, 3);
        assert_eq!(stats.strong_hashed, 2);
    }

    #[test]
    fn test_min_group_count_filters_pairs() {
        let dir = tempfile::tempdir().unwrap();
        let paths: Vec<PathBuf> = (0..2).map(|i| dir.path().join(format!("{i}"))).collect();
        for p in &paths {
            fs::write(p, b"dup").unwrap();
        }
        let files: Vec<FileRecord> = paths.into_iter().map(record).collect();

        let (groups, _) =
            find_duplicate_groups(&files, options(3), &CancelToken::new(), &SilentReporter).unwrap();
        assert!(groups.is_empty());
    }

    #[test]
    fn test_zero_byte_and_missing_files_are_excluded() {
        let dir = tempfile::tempdir().unwrap();
        let e1 = dir.path().join("e1");
        let e2 = dir.path().join("e2");
        fs::write(&e1, b"").unwrap();
        fs::write(&e2, b"").unwrap();
        let ghost = FileRecord {
            path: dir.path().join("ghost"),
            size: 3,
            modified: None,
        };
        let real = dir.path().join("real");
        fs::write(&real, b"abc").unwrap();
        let files = vec![record(e1), record(e2), ghost, record(real)];

        let (groups, stats) =
            find_duplicate_groups(&files, options(2), &CancelToken::new(), &SilentReporter).unwrap();
        assert!(groups.is_empty());
        assert_eq!(stats.excluded, 3);
    }

    #[test]
    fn test_cancelled_match_returns_error() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a");
        let b = dir.path().join("b");
        fs::write(&a, b"x").unwrap();
        fs::write(&b, b"x").unwrap();
        let cancel = CancelToken::new();
        cancel.cancel();
        let result = find_duplicate_groups(&[record(a), record(b)], options(2), &cancel, &SilentReporter);
        assert!(matches!(result, Err(Error::Cancelled)));
    }
}
