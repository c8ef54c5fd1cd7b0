pub mod strong;
mod tiered;
pub mod xxhash;

pub use tiered::{find_duplicate_groups, MatchOptions, MatchStats};

use crate::error::Error;

/// Bounded worker pool used for every hashing pass.
pub fn worker_pool(workers: usize) -> Result<rayon::ThreadPool, Error> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(workers.max(1))
        .thread_name(|i| format!("sweeper-hash-{i}"))
        .build()
        .map_err(|e| Error::Other(format!("failed to build worker pool: {e}")))
}
