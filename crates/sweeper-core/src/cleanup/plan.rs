use std::path::{Path, PathBuf};
use tracing::info;

use super::tables::CandidateRow;
use crate::error::Error;
use crate::review::{self, ReviewDecision};
use crate::run::tables::write_table;
use crate::run::{POST_REVIEW_DIR, QUARANTINE_DIR, REMOVED_DIR};

pub const REMOVE_CANDIDATES_CSV: &str = "remove_candidates.csv";
pub const BROKEN_TARGETS_CSV: &str = "broken_targets.csv";

/// A member not marked keep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoveCandidate {
    pub group: String,
    pub artifact: PathBuf,
    pub target: Option<PathBuf>,
    /// Whether the target existed when the plan was built.
    pub target_exists: bool,
}

impl RemoveCandidate {
    pub(crate) fn row(&self) -> CandidateRow {
        CandidateRow {
            group: self.group.clone(),
            artifact_name: file_name(&self.artifact),
            artifact_path: self.artifact.to_string_lossy().into_owned(),
            target_path: self
                .target
                .as_deref()
                .map(|t| t.to_string_lossy().into_owned())
                .unwrap_or_default(),
            target_exists: self.target_exists,
        }
    }
}

/// Review decisions of a run split into keep and remove sets. Entry point of
/// the cleanup pipeline; nothing on disk is touched beyond the post-review
/// tables.
#[derive(Debug)]
pub struct CleanupPlan {
    run_dir: PathBuf,
    review_root: PathBuf,
    decisions: Vec<ReviewDecision>,
    candidates: Vec<RemoveCandidate>,
}

impl CleanupPlan {
    /// Reads the run's review artifacts and writes `remove_candidates.csv`
    /// and `broken_targets.csv`.
    pub fn load(run_dir: &Path) -> Result<Self, Error> {
        let review_root = review::find_review_root(run_dir).ok_or_else(|| {
            Error::InvalidArgument(format!("no review directory in {}", run_dir.display()))
        })?;
        let decisions = review::read_decisions(&review_root)?;
        let candidates: Vec<RemoveCandidate> = decisions
            .iter()
            .filter(|d| !d.keep)
            .map(|d| RemoveCandidate {
                group: d.group.clone(),
                artifact: d.artifact.clone(),
                target: d.target.clone(),
                target_exists: d.target_exists(),
            })
            .collect();

        let plan = Self {
            run_dir: run_dir.to_path_buf(),
            review_root,
            decisions,
            candidates,
        };

        let rows: Vec<CandidateRow> = plan.candidates.iter().map(RemoveCandidate::row).collect();
        write_table(&plan.post_review_dir().join(REMOVE_CANDIDATES_CSV), &rows)?;
        let broken: Vec<CandidateRow> = plan.broken().map(RemoveCandidate::row).collect();
        write_table(&plan.post_review_dir().join(BROKEN_TARGETS_CSV), &broken)?;

        info!(
            "Cleanup plan: {} artifacts, {} remove candidates, {} broken",
            plan.decisions.len(),
            plan.candidates.len(),
            broken.len()
        );
        Ok(plan)
    }

    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }

    pub fn review_root(&self) -> &Path {
        &self.review_root
    }

    pub fn decisions(&self) -> &[ReviewDecision] {
        &self.decisions
    }

    pub fn candidates(&self) -> &[RemoveCandidate] {
        &self.candidates
    }

    /// Candidates whose target is missing or unreadable.
    pub fn broken(&self) -> impl Iterator<Item = &RemoveCandidate> {
        self.candidates.iter().filter(|c| !c.target_exists)
    }

    /// True when at least one remove candidate still exists on disk.
    pub fn has_work(&self) -> bool {
        self.candidates.iter().any(|c| c.target_exists)
    }

    pub fn post_review_dir(&self) -> PathBuf {
        self.run_dir.join(POST_REVIEW_DIR)
    }

    pub fn quarantine_dir(&self) -> PathBuf {
        self.run_dir.join(QUARANTINE_DIR)
    }

    pub fn removed_dir(&self) -> PathBuf {
        self.run_dir.join(REMOVED_DIR)
    }
}

pub(crate) fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}
