use std::path::Path;
use tracing::{debug, warn};
use walkdir::WalkDir;

use super::plan::CleanupPlan;
use crate::platform::{self, DiskSpace};
use crate::run::RunMeta;

/// Totals of the scanned dataset, taken from the run's scan root.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DatasetStats {
    pub files: u64,
    pub bytes: u64,
}

/// What a cleanup would do, computed before anything is copied.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Accounting {
    pub links_keep: usize,
    pub links_remove: usize,
    pub existing_total: usize,
    pub existing_keep: usize,
    pub existing_remove: usize,
    pub bytes_total: u64,
    pub bytes_keep: u64,
    pub bytes_remove: u64,
    pub disk: Option<DiskSpace>,
    pub dataset: Option<DatasetStats>,
}

impl Accounting {
    pub fn from_plan(plan: &CleanupPlan) -> Self {
        let mut acc = Accounting::default();
        let mut first_remove: Option<&Path> = None;

        for d in plan.decisions() {
            if d.keep {
                acc.links_keep += 1;
            } else {
                acc.links_remove += 1;
            }
            let Some(target) = d.target.as_deref().filter(|_| d.target_exists()) else {
                continue;
            };
            let size = entry_size(target);
            acc.existing_total += 1;
            acc.bytes_total += size;
            if d.keep {
                acc.existing_keep += 1;
                acc.bytes_keep += size;
            } else {
                acc.existing_remove += 1;
                acc.bytes_remove += size;
                first_remove.get_or_insert(target);
            }
        }

        acc.disk = first_remove.and_then(platform::disk_space_for);
        acc.dataset = match RunMeta::read(plan.run_dir()) {
            Ok(Some(meta)) => Some(scan_root_stats(&meta.root)),
            Ok(None) => None,
            Err(e) => {
                warn!("Cannot read run metadata: {}", e);
                None
            }
        };
        debug!("Cleanup accounting: {:?}", acc);
        acc
    }

    /// Bytes freed once kept copies are the only survivors.
    pub fn projected_reclaim(&self) -> u64 {
        self.bytes_total.saturating_sub(self.bytes_keep)
    }

    pub fn reclaim_percent(&self) -> f64 {
        percent(self.projected_reclaim(), self.bytes_total)
    }

    /// Free space left once every remove target has been copied to quarantine.
    pub fn free_after_copy(&self) -> Option<i128> {
        self.disk
            .map(|d| d.available as i128 - self.bytes_remove as i128)
    }

    pub fn dataset_after(&self) -> Option<u64> {
        self.dataset
            .map(|d| d.bytes.saturating_sub(self.projected_reclaim()))
    }

    pub fn dataset_reduction_percent(&self) -> Option<f64> {
        self.dataset
            .map(|d| percent(self.projected_reclaim(), d.bytes))
    }
}

fn percent(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 * 100.0 / whole as f64
    }
}

/// Size of a file, or the sum of regular files under a directory.
pub fn entry_size(path: &Path) -> u64 {
    match path.symlink_metadata() {
        Ok(m) if m.is_dir() => WalkDir::new(path)
            .follow_links(false)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_file())
            .filter_map(|e| e.metadata().ok())
            .map(|m| m.len())
            .sum(),
        Ok(m) => m.len(),
        Err(_) => 0,
    }
}

pub fn scan_root_stats(root: &Path) -> DatasetStats {
    let mut stats = DatasetStats::default();
    for entry in WalkDir::new(root).follow_links(false).into_iter().filter_map(Result::ok) {
        if !entry.file_type().is_file() {
            continue;
        }
        if let Ok(m) = entry.metadata() {
            stats.files += 1;
            stats.bytes += m.len();
        }
    }
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_entry_size_sums_directories() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("d/e")).unwrap();
        fs::write(dir.path().join("d/a"), b"12345").unwrap();
        fs::write(dir.path().join("d/e/b"), b"123").unwrap();
        assert_eq!(entry_size(&dir.path().join("d")), 8);
        assert_eq!(entry_size(&dir.path().join("d/a")), 5);
        assert_eq!(entry_size(&dir.path().join("missing")), 0);
    }

    #[test]
    fn test_projections() {
        let acc = Accounting {
            bytes_total: 300,
            bytes_keep: 100,
            bytes_remove: 200,
            disk: Some(DiskSpace {
                total: 1000,
                available: 150,
            }),
            dataset: Some(DatasetStats {
                files: 10,
                bytes: 800,
            }),
            ..Accounting::default()
        };
        assert_eq!(acc.projected_reclaim(), 200);
        assert!((acc.reclaim_percent() - 66.666).abs() < 0.01);
        assert_eq!(acc.free_after_copy(), Some(-50));
        assert_eq!(acc.dataset_after(), Some(600));
        assert_eq!(acc.dataset_reduction_percent(), Some(25.0));
    }
}
