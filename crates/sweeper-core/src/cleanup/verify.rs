use rand::seq::SliceRandom;
use rand::Rng;
use tracing::{error, info, warn};

use super::quarantine::{QuarantineEntry, Quarantined};
use crate::error::Error;
use crate::hasher::strong;

/// Quarantine copies that passed the sampled hash check. Only this state can
/// move sources.
#[derive(Debug)]
pub struct Verified {
    pub(crate) quarantined: Quarantined,
    pub(crate) sampled: usize,
}

impl Quarantined {
    /// Hashes a random sample of copied pairs, source against copy.
    ///
    /// With no entries there is nothing to verify and nothing to move. With
    /// entries but no successful copy the pipeline aborts with
    /// [`Error::NoVerifiablePairs`]. Any mismatch, read error or missing file
    /// in the sample aborts with [`Error::VerificationFailed`].
    pub fn verify<R: Rng + ?Sized>(self, sample_size: usize, rng: &mut R) -> Result<Verified, Error> {
        if self.entries.is_empty() {
            warn!("No quarantine entries, nothing to verify");
            return Ok(Verified {
                quarantined: self,
                sampled: 0,
            });
        }

        let valid: Vec<&QuarantineEntry> =
            self.entries.iter().filter(|e| e.status.is_copied()).collect();
        if valid.is_empty() {
            error!("No verifiable (source, quarantine) pairs");
            return Err(Error::NoVerifiablePairs);
        }

        let sample: Vec<&&QuarantineEntry> = valid.choose_multiple(rng, sample_size.max(1)).collect();
        let sampled = sample.len();
        let mut bad = 0;
        for entry in sample {
            match (strong::hash_entry(&entry.source), strong::hash_entry(&entry.quarantine_path)) {
                (Ok(a), Ok(b)) if a == b => {}
                (Ok(_), Ok(_)) => {
                    error!(
                        "Hash mismatch: {} vs {}",
                        entry.source.display(),
                        entry.quarantine_path.display()
                    );
                    bad += 1;
                }
                (Err(e), _) | (_, Err(e)) => {
                    error!("Cannot hash sample {}: {}", entry.source.display(), e);
                    bad += 1;
                }
            }
        }

        if bad > 0 {
            error!("Verification failed: {} bad of {} sampled", bad, sampled);
            return Err(Error::VerificationFailed { bad, sampled });
        }
        info!("Hash sample verified ({} of {} pairs)", sampled, valid.len());
        Ok(Verified {
            quarantined: self,
            sampled,
        })
    }
}

impl Verified {
    pub fn sampled(&self) -> usize {
        self.sampled
    }

    pub fn quarantined(&self) -> &Quarantined {
        &self.quarantined
    }
}
