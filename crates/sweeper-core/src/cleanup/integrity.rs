use std::path::PathBuf;
use tracing::{info, warn};

use super::plan::file_name;
use super::quarantine::lossy;
use super::relocate::Relocated;
use super::tables::KeepCheckRow;
use crate::error::Error;
use crate::platform;
use crate::review;
use crate::run::tables::write_table;

pub const KEEP_CHECK_OK_CSV: &str = "keep_check_ok.csv";
pub const KEEP_CHECK_PROBLEM_CSV: &str = "keep_check_problem.csv";

/// State of one kept member after the move.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeepCheck {
    pub group: String,
    pub artifact: PathBuf,
    pub target: Option<PathBuf>,
    pub exists: bool,
    pub in_removed_dir: bool,
}

impl KeepCheck {
    pub fn is_ok(&self) -> bool {
        self.exists && !self.in_removed_dir
    }

    fn row(&self) -> KeepCheckRow {
        KeepCheckRow {
            group: self.group.clone(),
            artifact_name: file_name(&self.artifact),
            artifact_path: lossy(&self.artifact),
            target_path: self.target.as_deref().map(lossy).unwrap_or_default(),
            exists: self.exists,
            in_removed_dir: self.in_removed_dir,
        }
    }
}

/// Final result of a completed cleanup.
#[derive(Debug, Clone)]
pub struct CleanupReport {
    pub copied: usize,
    pub copy_failed: usize,
    pub sampled: usize,
    pub moved: usize,
    pub move_failed: usize,
    pub missing_source: usize,
    pub kept_ok: usize,
    pub kept_problems: Vec<KeepCheck>,
    pub post_review_dir: PathBuf,
    pub removed_dir: PathBuf,
}

impl CleanupReport {
    pub fn has_integrity_problems(&self) -> bool {
        !self.kept_problems.is_empty()
    }
}

impl Relocated {
    /// Re-reads the review decisions and confirms every kept target still
    /// exists outside the removed-originals area.
    pub fn check_integrity(self) -> Result<CleanupReport, Error> {
        let plan = &self.verified.quarantined.plan;
        let removed = plan.removed_dir();
        let decisions = review::read_decisions(plan.review_root())?;

        let (ok, problems): (Vec<KeepCheck>, Vec<KeepCheck>) = decisions
            .into_iter()
            .filter(|d| d.keep)
            .map(|d| {
                let exists = d.target_exists();
                let in_removed_dir = d
                    .target
                    .as_deref()
                    .map(|t| platform::is_within(t, &removed))
                    .unwrap_or(false);
                KeepCheck {
                    group: d.group,
                    artifact: d.artifact,
                    target: d.target,
                    exists,
                    in_removed_dir,
                }
            })
            .partition(KeepCheck::is_ok);

        let post = plan.post_review_dir();
        let ok_rows: Vec<KeepCheckRow> = ok.iter().map(KeepCheck::row).collect();
        write_table(&post.join(KEEP_CHECK_OK_CSV), &ok_rows)?;
        let problem_rows: Vec<KeepCheckRow> = problems.iter().map(KeepCheck::row).collect();
        write_table(&post.join(KEEP_CHECK_PROBLEM_CSV), &problem_rows)?;

        if problems.is_empty() {
            info!("Keep check: {} kept targets intact", ok.len());
        } else {
            for p in &problems {
                warn!(
                    "Kept target problem in {}: {} (exists={}, in_removed={})",
                    p.group,
                    p.target.as_deref().map(lossy).unwrap_or_default(),
                    p.exists,
                    p.in_removed_dir
                );
            }
        }

        Ok(CleanupReport {
            copied: self.verified.quarantined.copied(),
            copy_failed: self.verified.quarantined.failed(),
            sampled: self.verified.sampled,
            moved: self.moved(),
            move_failed: self.failed(),
            missing_source: self.missing_source(),
            kept_ok: ok.len(),
            kept_problems: problems,
            post_review_dir: post,
            removed_dir: removed,
        })
    }
}
