use indicatif::{ProgressBar, ProgressStyle};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use sweeper_core::ProgressReporter;

const TICKS: &str = "⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏";

/// CLI progress reporter using indicatif progress bars.
///
/// - Scan: spinner (file count unknown upfront)
/// - Hash tiers, fingerprinting, cleanup stages: bars with known totals
/// - Similarity: bar over the pair count
pub struct CliReporter {
    bar: Mutex<Option<ProgressBar>>,
}

impl CliReporter {
    pub fn new() -> Self {
        Self {
            bar: Mutex::new(None),
        }
    }

    fn slot(&self) -> MutexGuard<'_, Option<ProgressBar>> {
        self.bar.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn set_bar(&self, pb: ProgressBar) {
        let mut guard = self.slot();
        if let Some(old) = guard.take() {
            old.finish_and_clear();
        }
        *guard = Some(pb);
    }

    fn finish_bar(&self) {
        if let Some(pb) = self.slot().take() {
            pb.finish_and_clear();
        }
    }

    fn spinner(&self, message: String) {
        let pb = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
            pb.set_style(style.tick_chars(TICKS));
        }
        pb.set_message(message);
        pb.enable_steady_tick(Duration::from_millis(80));
        self.set_bar(pb);
    }

    fn bar(&self, label: &str, total: u64) {
        let pb = ProgressBar::new(total);
        let template = format!(
            "  {{spinner:.cyan}} {} [{{bar:30.cyan/dim}}] {{pos}}/{{len}} ({{eta}} remaining)",
            label
        );
        if let Ok(style) = ProgressStyle::with_template(&template) {
            pb.set_style(style.progress_chars("━╸─").tick_chars(TICKS));
        }
        pb.enable_steady_tick(Duration::from_millis(80));
        self.set_bar(pb);
    }

    fn advance(&self, done: u64, total: u64) {
        if let Some(pb) = self.slot().as_ref() {
            if pb.length() != Some(total) {
                pb.set_length(total);
            }
            pb.set_position(done);
        }
    }

    fn done(&self, line: String) {
        self.finish_bar();
        eprintln!("  \x1b[32m✓\x1b[0m {}", line);
    }
}

impl ProgressReporter for CliReporter {
    fn on_scan_start(&self) {
        self.spinner("Scanning files...".to_string());
    }

    fn on_scan_progress(&self, files_found: usize, _current_path: &str) {
        if let Some(pb) = self.slot().as_ref() {
            pb.set_message(format!("Scanning... {} files found", files_found));
        }
    }

    fn on_scan_complete(&self, total_files: usize, duration_secs: f64) {
        self.done(format!(
            "Scan complete: {} files in {:.2}s",
            total_files, duration_secs
        ));
    }

    fn on_hash_start(&self, tier: &str, total_files: usize) {
        self.bar(&format!("Hashing ({})", tier), total_files as u64);
    }

    fn on_hash_progress(&self, files_hashed: usize, total_files: usize) {
        self.advance(files_hashed as u64, total_files as u64);
    }

    fn on_hash_complete(&self, tier: &str, files_hashed: usize, duration_secs: f64) {
        self.done(format!(
            "{} hash: {} files in {:.2}s",
            tier, files_hashed, duration_secs
        ));
    }

    fn on_fingerprint_start(&self, pending: usize, cached: usize) {
        if cached > 0 {
            eprintln!("  {} fingerprints reused from checkpoint", cached);
        }
        self.bar("Fingerprinting", pending as u64);
    }

    fn on_fingerprint_progress(&self, processed: usize, pending: usize) {
        self.advance(processed as u64, pending as u64);
    }

    fn on_checkpoint_flush(&self, entries: usize) {
        if let Some(pb) = self.slot().as_ref() {
            pb.set_message(format!("checkpoint: {} entries", entries));
        }
    }

    fn on_fingerprint_complete(&self, computed: usize, failed: usize, duration_secs: f64) {
        self.done(format!(
            "Fingerprints: {} computed, {} failed in {:.2}s",
            computed, failed, duration_secs
        ));
    }

    fn on_similarity_start(&self, total_pairs: u64) {
        self.bar("Comparing folders", total_pairs);
    }

    fn on_similarity_progress(&self, compared: u64, total_pairs: u64) {
        self.advance(compared, total_pairs);
    }

    fn on_similarity_complete(&self, edges: usize, clusters: usize, duration_secs: f64) {
        self.done(format!(
            "Similarity: {} pairs, {} clusters in {:.2}s",
            edges, clusters, duration_secs
        ));
    }

    fn on_stage_start(&self, stage: &str, total_items: usize) {
        self.bar(stage, total_items as u64);
    }

    fn on_stage_progress(&self, done: usize, total_items: usize) {
        self.advance(done as u64, total_items as u64);
    }

    fn on_stage_complete(&self, stage: &str, summary: &str) {
        self.done(format!("{}: {}", stage, summary));
    }
}
