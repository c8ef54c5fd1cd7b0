use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

use super::plan::{file_name, CleanupPlan};
use super::tables::{LogRow, QuarantineRow};
use crate::error::Error;
use crate::fs::{copy_entry, next_free_path};
use crate::progress::ProgressReporter;
use crate::run::tables::write_table;

pub const QUARANTINE_CSV: &str = "quarantine_candidates.csv";
pub const COPY_LOG_CSV: &str = "copy_log.csv";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CopyStatus {
    Copied,
    Failed(String),
}

impl CopyStatus {
    pub fn is_copied(&self) -> bool {
        matches!(self, CopyStatus::Copied)
    }
}

impl fmt::Display for CopyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CopyStatus::Copied => f.write_str("COPIED"),
            CopyStatus::Failed(reason) => write!(f, "FAILED:{}", reason),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuarantineEntry {
    pub group: String,
    pub artifact: PathBuf,
    pub source: PathBuf,
    pub quarantine_path: PathBuf,
    pub status: CopyStatus,
}

/// Remove candidates copied aside. Sources are untouched at this point.
#[derive(Debug)]
pub struct Quarantined {
    pub(crate) plan: CleanupPlan,
    pub(crate) entries: Vec<QuarantineEntry>,
}

impl CleanupPlan {
    /// Copies every remove candidate whose target exists into the flat
    /// quarantine area. Per-entry failures are recorded, not returned.
    pub fn quarantine(self, reporter: &dyn ProgressReporter) -> Result<Quarantined, Error> {
        let q_root = self.quarantine_dir();
        fs::create_dir_all(&q_root)?;

        let todo: Vec<(String, PathBuf, PathBuf)> = self
            .candidates()
            .iter()
            .filter(|c| c.target_exists)
            .filter_map(|c| {
                c.target
                    .clone()
                    .map(|t| (c.group.clone(), c.artifact.clone(), t))
            })
            .collect();

        info!("Quarantining {} entries into {}", todo.len(), q_root.display());
        let total = todo.len();
        reporter.on_stage_start("quarantine", total);

        let mut entries = Vec::with_capacity(todo.len());
        for (i, (group, artifact, source)) in todo.into_iter().enumerate() {
            let quarantine_path = next_free_path(&q_root, &file_name(&source));
            let status = match copy_entry(&source, &quarantine_path) {
                Ok(()) => {
                    debug!("Copied {} -> {}", source.display(), quarantine_path.display());
                    CopyStatus::Copied
                }
                Err(e) => {
                    error!("Failed to copy '{}': {}", source.display(), e);
                    CopyStatus::Failed(format!("{:?}", e.kind()))
                }
            };
            entries.push(QuarantineEntry {
                group,
                artifact,
                source,
                quarantine_path,
                status,
            });
            reporter.on_stage_progress(i + 1, total);
        }

        let quarantined = Quarantined {
            plan: self,
            entries,
        };
        quarantined.write_tables()?;

        let summary = format!(
            "{} copied, {} failed",
            quarantined.copied(),
            quarantined.failed()
        );
        info!("Quarantine: {}", summary);
        reporter.on_stage_complete("quarantine", &summary);
        Ok(quarantined)
    }
}

impl Quarantined {
    pub fn entries(&self) -> &[QuarantineEntry] {
        &self.entries
    }

    pub fn plan(&self) -> &CleanupPlan {
        &self.plan
    }

    pub fn copied(&self) -> usize {
        self.entries.iter().filter(|e| e.status.is_copied()).count()
    }

    pub fn failed(&self) -> usize {
        self.entries.len() - self.copied()
    }

    fn write_tables(&self) -> Result<(), Error> {
        let post = self.plan.post_review_dir();
        let q_rows: Vec<QuarantineRow> = self
            .entries
            .iter()
            .map(|e| QuarantineRow {
                group: e.group.clone(),
                artifact_name: file_name(&e.artifact),
                artifact_path: lossy(&e.artifact),
                target_path: lossy(&e.source),
                target_exists: true,
                quarantine_path: lossy(&e.quarantine_path),
                status: e.status.to_string(),
            })
            .collect();
        write_table(&post.join(QUARANTINE_CSV), &q_rows)?;

        let log: Vec<LogRow> = self
            .entries
            .iter()
            .map(|e| LogRow {
                group: e.group.clone(),
                source: lossy(&e.source),
                destination: lossy(&e.quarantine_path),
                status: e.status.to_string(),
            })
            .collect();
        write_table(&post.join(COPY_LOG_CSV), &log)?;
        Ok(())
    }
}

pub(crate) fn lossy(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
