use ahash::{AHashMap, AHashSet};
use rayon::prelude::*;
use std::hash::Hasher as _;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::time::Instant;
use tracing::{debug, info, warn};
use twox_hash::XxHash64;

use crate::cancel::CancelToken;
use crate::checkpoint::{CheckpointRecord, CheckpointStore};
use crate::error::Error;
use crate::hasher::{worker_pool, xxhash};
use crate::model::FileRecord;
use crate::platform;
use crate::progress::ProgressReporter;
use crate::scanner::Inventory;

#[derive(Debug, Clone, Copy)]
pub struct FingerprintOptions {
    pub workers: usize,
    /// Flush the checkpoint after this many freshly computed files.
    pub checkpoint_every: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FingerprintStats {
    pub files: usize,
    pub cache_hits: usize,
    pub computed: usize,
    pub failed: usize,
    pub pruned: usize,
}

/// Recursive content summary of one directory.
#[derive(Debug, Clone)]
pub struct FolderFingerprint {
    pub path: PathBuf,
    /// Fingerprints of every file at or below this directory.
    pub hashes: AHashSet<u64>,
    pub total_bytes: u64,
    pub file_count: usize,
    /// Depth below the scan root (root = 0).
    pub depth: usize,
    /// Order-independent digest of `hashes`.
    pub digest: u64,
}

impl FolderFingerprint {
    pub fn qualifies(&self, min_bytes: u64) -> bool {
        self.total_bytes >= min_bytes && !self.hashes.is_empty()
    }
}

/// Per-file partial fingerprints for `files`, aligned by index.
///
/// Fresh checkpoint entries are reused without touching file content. Misses
/// are hashed on a bounded pool; a single consumer merges results into the
/// store and flushes it every `checkpoint_every` files. The store is flushed
/// once more on completion or cancellation.
pub fn fingerprint_files(
    files: &[FileRecord],
    store: &mut CheckpointStore,
    options: FingerprintOptions,
    cancel: &CancelToken,
    reporter: &dyn ProgressReporter,
) -> Result<(Vec<Option<u64>>, FingerprintStats), Error> {
    let start = Instant::now();
    let mut stats = FingerprintStats {
        files: files.len(),
        ..FingerprintStats::default()
    };
    let mut hashes: Vec<Option<u64>> = vec![None; files.len()];
    let mut keys: Vec<String> = Vec::with_capacity(files.len());
    let mut pending: Vec<usize> = Vec::new();

    for (i, file) in files.iter().enumerate() {
        let key = platform::path_key(&file.path);
        match store.lookup(&key, file.size, file.mod_time_nanos()) {
            Some(hash) => {
                hashes[i] = Some(hash);
                stats.cache_hits += 1;
            }
            None => pending.push(i),
        }
        keys.push(key);
    }

    let live: AHashSet<String> = keys.iter().cloned().collect();
    stats.pruned = store.prune(&live);

    info!(
        "Fingerprinting {} files ({} cached, {} to compute)",
        files.len(),
        stats.cache_hits,
        pending.len()
    );
    reporter.on_fingerprint_start(pending.len(), stats.cache_hits);

    let pool = worker_pool(options.workers)?;
    let every = options.checkpoint_every.max(1);
    let total_pending = pending.len();

    let merged: Result<(), Error> = std::thread::scope(|scope| {
        let (tx, rx) = mpsc::channel::<(usize, io::Result<u64>)>();
        let pool = &pool;
        let pending = &pending;
        scope.spawn(move || {
            pool.install(|| {
                pending.par_iter().for_each_with(tx, |tx, &i| {
                    if cancel.is_cancelled() {
                        return;
                    }
                    let file = &files[i];
                    let result = xxhash::partial_fingerprint(&file.path, file.size);
                    // The consumer hangs up on error or cancellation.
                    let _ = tx.send((i, result));
                });
            });
        });

        let mut processed = 0usize;
        for (i, result) in rx {
            let file = &files[i];
            match result {
                Ok(hash) => {
                    hashes[i] = Some(hash);
                    stats.computed += 1;
                    if let Some(mod_time) = file.mod_time_nanos() {
                        store.insert(
                            keys[i].clone(),
                            CheckpointRecord {
                                hash,
                                size: file.size,
                                mod_time,
                            },
                        );
                    }
                }
                Err(e) => {
                    warn!("Cannot fingerprint {}: {}", file.path.display(), e);
                    stats.failed += 1;
                }
            }

            processed += 1;
            reporter.on_fingerprint_progress(processed, total_pending);
            if processed % every == 0 {
                store.flush()?;
                reporter.on_checkpoint_flush(store.len());
            }
            if cancel.is_cancelled() {
                break;
            }
        }
        Ok(())
    });

    store.flush()?;
    reporter.on_checkpoint_flush(store.len());
    merged?;
    cancel.check()?;

    let elapsed = start.elapsed().as_secs_f64();
    debug!(
        "Fingerprints done in {:.2}s: {} hits, {} computed, {} failed, {} pruned",
        elapsed, stats.cache_hits, stats.computed, stats.failed, stats.pruned
    );
    reporter.on_fingerprint_complete(stats.computed, stats.failed, elapsed);
    Ok((hashes, stats))
}

/// Builds recursive hash sets for every scanned directory, deepest first.
/// No file content is read here.
pub fn build_folder_fingerprints(
    inventory: &Inventory,
    file_hashes: &[Option<u64>],
) -> Vec<FolderFingerprint> {
    let mut folders: Vec<FolderFingerprint> = inventory
        .dirs
        .iter()
        .map(|dir| FolderFingerprint {
            path: dir.path.clone(),
            hashes: AHashSet::new(),
            total_bytes: 0,
            file_count: 0,
            depth: dir.depth,
            digest: 0,
        })
        .collect();
    let index: AHashMap<&Path, usize> = inventory
        .dirs
        .iter()
        .enumerate()
        .map(|(i, dir)| (dir.path.as_path(), i))
        .collect();

    // Direct children.
    for (file, hash) in inventory.files.iter().zip(file_hashes) {
        let (Some(hash), Some(parent)) = (hash, file.path.parent()) else {
            continue;
        };
        if let Some(&slot) = index.get(parent) {
            let folder = &mut folders[slot];
            folder.hashes.insert(*hash);
            folder.total_bytes += file.size;
            folder.file_count += 1;
        }
    }

    // Merge each directory into its parent, deepest level first.
    let mut order: Vec<usize> = (0..folders.len()).collect();
    order.sort_by(|&a, &b| folders[b].depth.cmp(&folders[a].depth));
    for i in order {
        let Some(parent) = folders[i].path.parent().and_then(|p| index.get(p)).copied() else {
            continue;
        };
        if parent == i {
            continue;
        }
        let child = std::mem::take(&mut folders[i].hashes);
        let (bytes, count) = (folders[i].total_bytes, folders[i].file_count);
        let parent_folder = &mut folders[parent];
        parent_folder.hashes.extend(child.iter().copied());
        parent_folder.total_bytes += bytes;
        parent_folder.file_count += count;
        folders[i].hashes = child;
    }

    for folder in &mut folders {
        folder.digest = set_digest(&folder.hashes);
    }
    debug!("Built {} folder fingerprints", folders.len());
    folders
}

/// XxHash64 over the sorted members of a hash set.
pub fn set_digest(hashes: &AHashSet<u64>) -> u64 {
    let mut sorted: Vec<u64> = hashes.iter().copied().collect();
    sorted.sort_unstable();
    let mut hasher = XxHash64::with_seed(0);
    for h in sorted {
        hasher.write_u64(h);
    }
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::SilentReporter;
    use crate::scanner::{scan_inventory, ScanOptions};
    use std::fs;

    fn options() -> FingerprintOptions {
        FingerprintOptions {
            workers: 2,
            checkpoint_every: 2,
        }
    }

    #[test]
    fn test_parent_set_is_union_of_children() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("root");
        fs::create_dir_all(root.join("a/deep")).unwrap();
        fs::create_dir_all(root.join("b")).unwrap();
        fs::write(root.join("a/one.bin"), b"one").unwrap();
        fs::write(root.join("a/deep/two.bin"), b"two!").unwrap();
        fs::write(root.join("b/three.bin"), b"three").unwrap();

        let inventory =
            scan_inventory(&root, &ScanOptions::default(), &CancelToken::new(), &SilentReporter).unwrap();
        let mut store = CheckpointStore::open(dir.path().join("ck.json"), None);
        let (hashes, stats) =
            fingerprint_files(&inventory.files, &mut store, options(), &CancelToken::new(), &SilentReporter)
                .unwrap();
        assert_eq!(stats.computed, 3);

        let folders = build_folder_fingerprints(&inventory, &hashes);
        let find = |p: &Path| folders.iter().find(|f| f.path == p).unwrap();
        let top = find(&root);
        let a = find(&root.join("a"));
        let deep = find(&root.join("a/deep"));

        assert_eq!(top.hashes.len(), 3);
        assert_eq!(top.file_count, 3);
        assert_eq!(top.total_bytes, 12);
        assert_eq!(a.hashes.len(), 2);
        assert!(deep.hashes.is_subset(&a.hashes));
        assert_eq!(deep.depth, 2);
        assert!(a.qualifies(7));
        assert!(!a.qualifies(8));
    }

    #[test]
    fn test_digest_is_order_independent() {
        let x: AHashSet<u64> = [1, 2, 3].into_iter().collect();
        let y: AHashSet<u64> = [3, 1, 2].into_iter().collect();
        let z: AHashSet<u64> = [1, 2].into_iter().collect();
        assert_eq!(set_digest(&x), set_digest(&y));
        assert_ne!(set_digest(&x), set_digest(&z));
    }
}
