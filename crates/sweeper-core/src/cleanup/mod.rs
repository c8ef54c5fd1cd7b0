//! Post-review cleanup of a run directory.
//!
//! Stages are expressed as types so that an unverified quarantine can never
//! move anything:
//!
//! ```text
//! CleanupPlan --quarantine--> Quarantined --verify--> Verified
//!     --relocate--> Relocated --check_integrity--> CleanupReport
//! ```
//!
//! Nothing is ever deleted. Remove candidates are copied into
//! `03_quarantine/`, a random sample of copies is hashed against the
//! originals, and only then are the originals moved into
//! `04_removed_originals/`.

mod accounting;
mod integrity;
mod plan;
mod quarantine;
mod relocate;
mod tables;
mod verify;

pub use accounting::{entry_size, scan_root_stats, Accounting, DatasetStats};
pub use integrity::{CleanupReport, KeepCheck, KEEP_CHECK_OK_CSV, KEEP_CHECK_PROBLEM_CSV};
pub use plan::{CleanupPlan, RemoveCandidate, BROKEN_TARGETS_CSV, REMOVE_CANDIDATES_CSV};
pub use quarantine::{CopyStatus, QuarantineEntry, Quarantined, COPY_LOG_CSV, QUARANTINE_CSV};
pub use relocate::{MoveLogEntry, MoveStatus, Relocated, MOVE_LOG_CSV};
pub use verify::Verified;

use rand::Rng;
use std::path::Path;
use tracing::info;

use crate::error::Error;
use crate::progress::ProgressReporter;

pub const DEFAULT_SAMPLE_SIZE: usize = 10;

#[derive(Debug, Clone, Copy)]
pub struct CleanupOptions {
    /// Number of (source, copy) pairs hashed before anything moves.
    pub sample_size: usize,
}

impl Default for CleanupOptions {
    fn default() -> Self {
        Self {
            sample_size: DEFAULT_SAMPLE_SIZE,
        }
    }
}

#[derive(Debug)]
pub enum CleanupOutcome {
    /// No remove candidate exists on disk.
    NothingToDo { broken: usize },
    /// The confirmation callback said no. Nothing was copied.
    Declined(Accounting),
    Completed(CleanupReport),
}

/// Runs the whole cleanup for `run_dir`.
///
/// `confirm` sees the accounting and decides whether the quarantine stage
/// starts. Verification failures abort before any source is moved.
pub fn run_cleanup<R, F>(
    run_dir: &Path,
    options: CleanupOptions,
    rng: &mut R,
    reporter: &dyn ProgressReporter,
    confirm: F,
) -> Result<CleanupOutcome, Error>
where
    R: Rng + ?Sized,
    F: FnOnce(&Accounting) -> bool,
{
    let plan = CleanupPlan::load(run_dir)?;
    if !plan.has_work() {
        let broken = plan.broken().count();
        info!("No existing remove targets, nothing to do ({} broken)", broken);
        return Ok(CleanupOutcome::NothingToDo { broken });
    }

    let accounting = Accounting::from_plan(&plan);
    if !confirm(&accounting) {
        info!("Cleanup declined");
        return Ok(CleanupOutcome::Declined(accounting));
    }

    let quarantined = plan.quarantine(reporter)?;
    reporter.on_stage_start("verify", options.sample_size);
    let verified = quarantined.verify(options.sample_size, rng)?;
    reporter.on_stage_complete("verify", &format!("{} sampled", verified.sampled()));
    let relocated = verified.relocate(reporter)?;
    let report = relocated.check_integrity()?;
    Ok(CleanupOutcome::Completed(report))
}
