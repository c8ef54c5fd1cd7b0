//! Run directory layout and metadata.
//!
//! ```text
//! <output_base>/Runs/run_<YYYYMMDD_HHMM>_<dup|big|fol>/
//!     run_meta.toml
//!     01_duplicate_result.csv .. 05_top_group_paths.csv   (file modes)
//!     folder_similarity_pairs.csv, folder_similarity_clusters.csv
//!     01_review_<tag>/            reviewable artifacts
//!     02_post_review/             cleanup tables
//!     03_quarantine/              verified copies
//!     04_removed_originals/       moved sources
//! ```

pub mod tables;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::config::ScanMode;
use crate::error::Error;
use crate::fs::{atomic_write, next_free_path};

pub const RUNS_DIR: &str = "Runs";
pub const RUN_META_FILE: &str = "run_meta.toml";
pub const POST_REVIEW_DIR: &str = "02_post_review";
pub const QUARANTINE_DIR: &str = "03_quarantine";
pub const REMOVED_DIR: &str = "04_removed_originals";

pub const DUPLICATE_RESULT_CSV: &str = "01_duplicate_result.csv";
pub const GROUPED_REPORT_CSV: &str = "02_grouped_report.csv";
pub const COUNT_FILTERED_CSV: &str = "03_count_filtered.csv";
pub const TOP_GROUPS_CSV: &str = "04_top_groups.csv";
pub const TOP_GROUP_PATHS_CSV: &str = "05_top_group_paths.csv";
pub const SIMILARITY_PAIRS_CSV: &str = "folder_similarity_pairs.csv";
pub const SIMILARITY_CLUSTERS_CSV: &str = "folder_similarity_clusters.csv";

/// Review directory name for a mode.
pub fn review_dir_name(mode: ScanMode) -> String {
    format!("01_review_{}", mode.tag())
}

/// What a run was asked to do, read back by the cleanup stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunMeta {
    pub root: PathBuf,
    pub output_base: PathBuf,
    pub run_id: String,
    pub mode: ScanMode,
    pub top_n: usize,
    pub created_at: String,
}

impl RunMeta {
    pub fn write(&self, run_dir: &Path) -> Result<(), Error> {
        let text = toml::to_string_pretty(self)?;
        atomic_write(run_dir.join(RUN_META_FILE), text.as_bytes())?;
        Ok(())
    }

    /// `Ok(None)` when the run directory has no metadata file.
    pub fn read(run_dir: &Path) -> Result<Option<RunMeta>, Error> {
        let path = run_dir.join(RUN_META_FILE);
        if !path.is_file() {
            return Ok(None);
        }
        let text = fs::read_to_string(path)?;
        Ok(Some(toml::from_str(&text)?))
    }
}

#[derive(Debug, Clone)]
pub struct RunLayout {
    run_dir: PathBuf,
    run_id: String,
    mode: ScanMode,
}

impl RunLayout {
    /// Creates a fresh run directory under `<output_base>/Runs`. A second run
    /// in the same minute gets a `__DUP__n` suffix.
    pub fn create(output_base: &Path, mode: ScanMode, now: DateTime<Local>) -> Result<Self, Error> {
        let run_id = now.format("%Y%m%d_%H%M").to_string();
        let runs_root = output_base.join(RUNS_DIR);
        fs::create_dir_all(&runs_root)?;

        let run_dir = next_free_path(&runs_root, &format!("run_{}_{}", run_id, mode.tag()));
        fs::create_dir_all(&run_dir)?;
        info!("Run directory: {}", run_dir.display());

        Ok(Self {
            run_dir,
            run_id,
            mode,
        })
    }

    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn mode(&self) -> ScanMode {
        self.mode
    }

    pub fn table(&self, name: &str) -> PathBuf {
        self.run_dir.join(name)
    }

    pub fn review_root(&self) -> PathBuf {
        self.run_dir.join(review_dir_name(self.mode))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn noon() -> DateTime<Local> {
        Local.with_ymd_and_hms(2026, 3, 4, 12, 5, 59).unwrap()
    }

    #[test]
    fn test_run_dir_name_and_clash_suffix() {
        let base = tempfile::tempdir().unwrap();
        let first = RunLayout::create(base.path(), ScanMode::Duplicate, noon()).unwrap();
        assert_eq!(first.run_id(), "20260304_1205");
        assert!(first.run_dir().ends_with("Runs/run_20260304_1205_dup"));
        assert!(first.review_root().ends_with("01_review_dup"));

        let second = RunLayout::create(base.path(), ScanMode::Duplicate, noon()).unwrap();
        assert!(second.run_dir().ends_with("run_20260304_1205_dup__DUP__1"));
    }

    #[test]
    fn test_meta_round_trips_through_toml() {
        let dir = tempfile::tempdir().unwrap();
        assert!(RunMeta::read(dir.path()).unwrap().is_none());

        let meta = RunMeta {
            root: PathBuf::from("/data"),
            output_base: PathBuf::from("/out"),
            run_id: "20260304_1205".into(),
            mode: ScanMode::FolderSimilarity,
            top_n: 7,
            created_at: "2026-03-04T12:05:59+00:00".into(),
        };
        meta.write(dir.path()).unwrap();
        let text = fs::read_to_string(dir.path().join(RUN_META_FILE)).unwrap();
        assert!(text.contains("mode = \"folder\""));
        assert_eq!(RunMeta::read(dir.path()).unwrap(), Some(meta));
    }
}
