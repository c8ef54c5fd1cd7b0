/// Trait for reporting pipeline progress.
///
/// CLI implements with tracing/indicatif; tests use [`SilentReporter`].
/// All methods have default no-op implementations.
pub trait ProgressReporter: Send + Sync {
    fn on_scan_start(&self) {}
    fn on_scan_progress(&self, _files_found: usize, _current_path: &str) {}
    fn on_scan_complete(&self, _total_files: usize, _duration_secs: f64) {}

    fn on_hash_start(&self, _tier: &str, _total_files: usize) {}
    fn on_hash_progress(&self, _files_hashed: usize, _total_files: usize) {}
    fn on_hash_complete(&self, _tier: &str, _files_hashed: usize, _duration_secs: f64) {}

    fn on_fingerprint_start(&self, _pending: usize, _cached: usize) {}
    fn on_fingerprint_progress(&self, _processed: usize, _pending: usize) {}
    fn on_checkpoint_flush(&self, _entries: usize) {}
    fn on_fingerprint_complete(&self, _computed: usize, _failed: usize, _duration_secs: f64) {}

    fn on_similarity_start(&self, _total_pairs: u64) {}
    fn on_similarity_progress(&self, _compared: u64, _total_pairs: u64) {}
    fn on_similarity_complete(&self, _edges: usize, _clusters: usize, _duration_secs: f64) {}

    fn on_stage_start(&self, _stage: &str, _total_items: usize) {}
    fn on_stage_progress(&self, _done: usize, _total_items: usize) {}
    fn on_stage_complete(&self, _stage: &str, _summary: &str) {}
}

/// No-op progress reporter for silent operation.
pub struct SilentReporter;

impl ProgressReporter for SilentReporter {}
