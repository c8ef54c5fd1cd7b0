use std::fmt;
use std::fs;
use std::path::PathBuf;
use tracing::{debug, error, info, warn};

use super::plan::file_name;
use super::quarantine::lossy;
use super::tables::LogRow;
use super::verify::Verified;
use crate::error::Error;
use crate::fs::{move_entry, next_free_path};
use crate::progress::ProgressReporter;
use crate::run::tables::write_table;

pub const MOVE_LOG_CSV: &str = "finalize_move_log.csv";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MoveStatus {
    Moved,
    Failed(String),
    /// The source disappeared between quarantine and the move.
    MissingSource,
}

impl fmt::Display for MoveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MoveStatus::Moved => f.write_str("MOVED"),
            MoveStatus::Failed(reason) => write!(f, "FAILED:{}", reason),
            MoveStatus::MissingSource => f.write_str("MISSING_SRC"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveLogEntry {
    pub group: String,
    pub source: PathBuf,
    pub destination: Option<PathBuf>,
    pub status: MoveStatus,
}

/// Sources moved into the removed-originals area.
#[derive(Debug)]
pub struct Relocated {
    pub(crate) verified: Verified,
    pub(crate) log: Vec<MoveLogEntry>,
}

impl Verified {
    /// Moves the source of every successfully copied entry. Nothing is
    /// deleted; a failed move leaves the source where it was.
    pub fn relocate(self, reporter: &dyn ProgressReporter) -> Result<Relocated, Error> {
        let removed = self.quarantined.plan.removed_dir();
        fs::create_dir_all(&removed)?;

        let copied: Vec<_> = self
            .quarantined
            .entries
            .iter()
            .filter(|e| e.status.is_copied())
            .collect();
        let total = copied.len();
        info!("Moving {} originals into {}", total, removed.display());
        reporter.on_stage_start("move", total);

        let mut log = Vec::with_capacity(total);
        for (i, entry) in copied.into_iter().enumerate() {
            let (destination, status) = if entry.source.symlink_metadata().is_err() {
                warn!("Source vanished before move: {}", entry.source.display());
                (None, MoveStatus::MissingSource)
            } else {
                let destination = next_free_path(&removed, &file_name(&entry.source));
                match move_entry(&entry.source, &destination) {
                    Ok(()) => {
                        debug!("Moved {} -> {}", entry.source.display(), destination.display());
                        (Some(destination), MoveStatus::Moved)
                    }
                    Err(e) => {
                        error!("Failed to move '{}': {}", entry.source.display(), e);
                        (Some(destination), MoveStatus::Failed(format!("{:?}", e.kind())))
                    }
                }
            };
            log.push(MoveLogEntry {
                group: entry.group.clone(),
                source: entry.source.clone(),
                destination,
                status,
            });
            reporter.on_stage_progress(i + 1, total);
        }

        let rows: Vec<LogRow> = log
            .iter()
            .map(|e| LogRow {
                group: e.group.clone(),
                source: lossy(&e.source),
                destination: e.destination.as_deref().map(lossy).unwrap_or_default(),
                status: e.status.to_string(),
            })
            .collect();
        write_table(
            &self.quarantined.plan.post_review_dir().join(MOVE_LOG_CSV),
            &rows,
        )?;

        let relocated = Relocated { verified: self, log };
        let summary = format!(
            "{} moved, {} failed, {} missing",
            relocated.moved(),
            relocated.failed(),
            relocated.missing_source()
        );
        info!("Move: {}", summary);
        reporter.on_stage_complete("move", &summary);
        Ok(relocated)
    }
}

impl Relocated {
    pub fn log(&self) -> &[MoveLogEntry] {
        &self.log
    }

    pub fn moved(&self) -> usize {
        self.count(|s| matches!(s, MoveStatus::Moved))
    }

    pub fn failed(&self) -> usize {
        self.count(|s| matches!(s, MoveStatus::Failed(_)))
    }

    pub fn missing_source(&self) -> usize {
        self.count(|s| matches!(s, MoveStatus::MissingSource))
    }

    fn count(&self, pred: impl Fn(&MoveStatus) -> bool) -> usize {
        self.log.iter().filter(|e| pred(&e.status)).count()
    }
}
