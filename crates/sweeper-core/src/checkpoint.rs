//! Durable path → fingerprint table for the folder engine.
//!
//! On disk the store is one JSON object mapping a normalized path key to
//! `{"hash": "<16 hex>", "size": n, "modTime": ns}`. Older layouts
//! (`[h, sz]`, `[h, sz, mt]`, `{"h", "sz", "mt"}`) are migrated when the file
//! is loaded. Entries that cannot prove freshness are dropped at load and
//! therefore recomputed.

use ahash::{AHashMap, AHashSet};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, trace, warn};

use crate::error::Error;
use crate::fs::atomic_write;
use crate::hasher::xxhash;
use crate::platform;

/// One validated checkpoint entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckpointRecord {
    pub hash: u64,
    pub size: u64,
    /// Nanoseconds since the Unix epoch.
    pub mod_time: i64,
}

#[derive(Serialize)]
struct StoredRecord {
    hash: String,
    size: u64,
    #[serde(rename = "modTime")]
    mod_time: i64,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum LooseInt {
    Int(i64),
    Float(f64),
    Text(String),
}

impl LooseInt {
    fn as_i64(&self) -> Option<i64> {
        match self {
            LooseInt::Int(v) => Some(*v),
            LooseInt::Float(v) if v.is_finite() => Some(*v as i64),
            LooseInt::Float(_) => None,
            LooseInt::Text(s) => s.trim().parse().ok(),
        }
    }
}

/// Every entry shape the file has ever held.
#[derive(Deserialize)]
#[serde(untagged)]
enum StoredEntry {
    Current {
        hash: String,
        size: LooseInt,
        #[serde(rename = "modTime", default)]
        mod_time: Option<LooseInt>,
    },
    Short {
        h: String,
        sz: LooseInt,
        #[serde(default)]
        mt: Option<LooseInt>,
    },
    Triple(String, LooseInt, Option<LooseInt>),
    Pair(String, LooseInt),
    Unknown(serde_json::Value),
}

impl StoredEntry {
    /// Normalizes to the current record; `None` marks the entry stale.
    fn migrate(self) -> Option<CheckpointRecord> {
        let (hash, size, mod_time) = match self {
            StoredEntry::Current {
                hash,
                size,
                mod_time,
            } => (hash, size, mod_time),
            StoredEntry::Short { h, sz, mt } => (h, sz, mt),
            StoredEntry::Triple(h, sz, mt) => (h, sz, mt),
            StoredEntry::Pair(h, sz) => (h, sz, None),
            StoredEntry::Unknown(_) => return None,
        };
        let size = u64::try_from(size.as_i64()?).ok()?;
        Some(CheckpointRecord {
            hash: xxhash::parse_hex(&hash)?,
            size,
            mod_time: mod_time?.as_i64()?,
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadStats {
    pub loaded: usize,
    pub stale: usize,
    pub from_backup: bool,
    pub corrupt: bool,
}

#[derive(Debug)]
pub struct CheckpointStore {
    path: PathBuf,
    backup_path: Option<PathBuf>,
    entries: AHashMap<String, CheckpointRecord>,
    load_stats: LoadStats,
}

impl CheckpointStore {
    /// File name for the checkpoint of a scan root, stable across runs.
    pub fn file_name_for_root(root: &Path) -> String {
        let key = platform::path_key(root);
        format!("_ckpt_{}.json", xxhash::to_hex(xxhash::hash_data(key.as_bytes())))
    }

    /// Store for `root` under `dir`, with a `.bak` sibling when `keep_backup`.
    pub fn for_root(dir: &Path, root: &Path, keep_backup: bool) -> Self {
        let path = dir.join(Self::file_name_for_root(root));
        let backup = keep_backup.then(|| path.with_extension("json.bak"));
        Self::open(path, backup)
    }

    /// Loads the snapshot at `path`, falling back to `backup_path` when the
    /// primary is missing or empty. Unparseable content yields an empty store.
    pub fn open(path: PathBuf, backup_path: Option<PathBuf>) -> Self {
        let mut load_stats = LoadStats::default();
        let mut source = read_non_empty(&path);
        if source.is_none() {
            if let Some(backup) = &backup_path {
                source = read_non_empty(backup);
                load_stats.from_backup = source.is_some();
            }
        }

        let mut entries = AHashMap::new();
        if let Some(bytes) = source {
            match serde_json::from_slice::<BTreeMap<String, StoredEntry>>(&bytes) {
                Ok(raw) => {
                    for (key, entry) in raw {
                        match entry.migrate() {
                            Some(record) => {
                                entries.insert(key, record);
                            }
                            None => load_stats.stale += 1,
                        }
                    }
                }
                Err(e) => {
                    warn!(
                        "Checkpoint {} is unreadable, starting cold: {}",
                        path.display(),
                        e
                    );
                    load_stats.corrupt = true;
                }
            }
        }
        load_stats.loaded = entries.len();

        if load_stats.loaded > 0 || load_stats.stale > 0 {
            info!(
                "Loaded checkpoint {} ({} entries, {} stale)",
                path.display(),
                load_stats.loaded,
                load_stats.stale
            );
        }

        Self {
            path,
            backup_path,
            entries,
            load_stats,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load_stats(&self) -> LoadStats {
        self.load_stats
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&CheckpointRecord> {
        self.entries.get(key)
    }

    /// The stored hash, only while size and modification time still match.
    pub fn lookup(&self, key: &str, size: u64, mod_time: Option<i64>) -> Option<u64> {
        let record = self.entries.get(key)?;
        if record.size == size && Some(record.mod_time) == mod_time {
            trace!("Checkpoint hit: {}", key);
            Some(record.hash)
        } else {
            None
        }
    }

    pub fn insert(&mut self, key: String, record: CheckpointRecord) {
        self.entries.insert(key, record);
    }

    /// Drops entries outside the live scan set whose file no longer exists.
    pub fn prune(&mut self, live: &AHashSet<String>) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|key, _| live.contains(key) || Path::new(key).exists());
        let pruned = before - self.entries.len();
        if pruned > 0 {
            debug!("Pruned {} checkpoint entries", pruned);
        }
        pruned
    }

    /// Atomically replaces the snapshot (and backup) with the current table.
    pub fn flush(&self) -> Result<(), Error> {
        let snapshot: BTreeMap<&str, StoredRecord> = self
            .entries
            .iter()
            .map(|(key, r)| {
                (
                    key.as_str(),
                    StoredRecord {
                        hash: xxhash::to_hex(r.hash),
                        size: r.size,
                        mod_time: r.mod_time,
                    },
                )
            })
            .collect();
        let bytes = serde_json::to_vec(&snapshot)?;
        atomic_write(&self.path, &bytes)?;
        if let Some(backup) = &self.backup_path {
            atomic_write(backup, &bytes)?;
        }
        debug!(
            "Flushed {} checkpoint entries to {}",
            self.entries.len(),
            self.path.display()
        );
        Ok(())
    }
}

fn read_non_empty(path: &Path) -> Option<Vec<u8>> {
    match fs::read(path) {
        Ok(bytes) if !bytes.iter().all(u8::is_ascii_whitespace) => Some(bytes),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HASH: &str = "00000000000000ff";

    fn record(size: u64, mod_time: i64) -> CheckpointRecord {
        CheckpointRecord {
            hash: 0xff,
            size,
            mod_time,
        }
    }

    #[test]
    fn test_lookup_requires_size_and_mtime_match() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = CheckpointStore::open(dir.path().join("c.json"), None);
        store.insert("k".into(), record(10, 5));

        assert_eq!(store.lookup("k", 10, Some(5)), Some(0xff));
        assert_eq!(store.lookup("k", 11, Some(5)), None);
        assert_eq!(store.lookup("k", 10, Some(6)), None);
        assert_eq!(store.lookup("k", 10, None), None);
        assert_eq!(store.lookup("other", 10, Some(5)), None);
    }

    #[test]
    fn test_flush_then_reopen_preserves_entries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("c.json");
        let mut store = CheckpointStore::open(path.clone(), None);
        store.insert("/a".into(), record(1, 2));
        store.insert("/b".into(), record(3, 4));
        store.flush().unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("\"modTime\":2"));
        assert!(text.contains(HASH));

        let reopened = CheckpointStore::open(path, None);
        assert_eq!(reopened.len(), 2);
        assert_eq!(reopened.get("/b"), Some(&record(3, 4)));
    }

    #[test]
    fn test_legacy_shapes_are_migrated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("c.json");
        let legacy = format!(
            r#"{{
                "/obj": {{"h": "{HASH}", "sz": 10, "mt": 7}},
                "/triple": ["{HASH}", 11, 8],
                "/pair": ["{HASH}", 12],
                "/no_mt": {{"h": "{HASH}", "sz": 13}},
                "/md5": ["d41d8cd98f00b204e9800998ecf8427e", 14, 9],
                "/current": {{"hash": "{HASH}", "size": 15, "modTime": 10}},
                "/junk": 42
            }}"#
        );
        fs::write(&path, legacy).unwrap();

        let store = CheckpointStore::open(path, None);
        assert_eq!(store.get("/obj"), Some(&record(10, 7)));
        assert_eq!(store.get("/triple"), Some(&record(11, 8)));
        assert_eq!(store.get("/current"), Some(&record(15, 10)));
        assert!(store.get("/pair").is_none());
        assert!(store.get("/no_mt").is_none());
        assert!(store.get("/md5").is_none());
        assert_eq!(store.load_stats().stale, 4);
    }

    #[test]
    fn test_corrupt_file_starts_cold() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("c.json");
        fs::write(&path, b"{not json").unwrap();
        let store = CheckpointStore::open(path, None);
        assert!(store.is_empty());
        assert!(store.load_stats().corrupt);
    }

    #[test]
    fn test_backup_used_when_primary_missing() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("tree");
        let mut store = CheckpointStore::for_root(dir.path(), &root, true);
        store.insert("/a".into(), record(1, 1));
        store.flush().unwrap();

        fs::remove_file(store.path()).unwrap();
        let reopened = CheckpointStore::for_root(dir.path(), &root, true);
        assert_eq!(reopened.len(), 1);
        assert!(reopened.load_stats().from_backup);
    }

    #[test]
    fn test_prune_keeps_live_and_existing_paths() {
        let dir = tempfile::tempdir().unwrap();
        let existing = dir.path().join("still_here.bin");
        fs::write(&existing, b"x").unwrap();
        let existing_key = existing.to_string_lossy().into_owned();

        let mut store = CheckpointStore::open(dir.path().join("c.json"), None);
        store.insert("live".into(), record(1, 1));
        store.insert(existing_key.clone(), record(1, 1));
        store.insert(dir.path().join("gone").to_string_lossy().into_owned(), record(1, 1));

        let live: AHashSet<String> = ["live".to_string()].into_iter().collect();
        assert_eq!(store.prune(&live), 1);
        assert!(store.get("live").is_some());
        assert!(store.get(&existing_key).is_some());
    }
}
