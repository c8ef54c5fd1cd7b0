use chrono::Local;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{debug, info};

use crate::analysis::{
    build_folder_fingerprints, find_similar_folders, fingerprint_files, select_top,
    FingerprintOptions, FingerprintStats, SimilarityOptions,
};
use crate::cancel::CancelToken;
use crate::checkpoint::CheckpointStore;
use crate::config::{AppConfig, ScanMode};
use crate::error::Error;
use crate::hasher::{find_duplicate_groups, MatchOptions, MatchStats};
use crate::model::DuplicateGroup;
use crate::progress::ProgressReporter;
use crate::review;
use crate::run::{self, tables, RunLayout, RunMeta};
use crate::scanner::{scan_inventory, Inventory, ScanOptions, ScanStats};

pub struct ScanEngine {
    config: AppConfig,
    cancel: CancelToken,
}

/// What one scan run produced.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub run_dir: PathBuf,
    pub mode: ScanMode,
    pub files_scanned: usize,
    pub scan_stats: ScanStats,
    /// Duplicate groups with at least two members.
    pub groups_found: usize,
    /// Groups surviving the count filter and top-N selection.
    pub groups_selected: usize,
    pub wasted_bytes: u64,
    pub match_stats: Option<MatchStats>,
    pub fingerprint_stats: Option<FingerprintStats>,
    pub edges: usize,
    pub clusters: usize,
    pub artifacts: usize,
    pub missing_targets: usize,
}

impl RunSummary {
    fn new(layout: &RunLayout, inventory: &Inventory) -> Self {
        Self {
            run_dir: layout.run_dir().to_path_buf(),
            mode: layout.mode(),
            files_scanned: inventory.files.len(),
            scan_stats: inventory.stats,
            groups_found: 0,
            groups_selected: 0,
            wasted_bytes: 0,
            match_stats: None,
            fingerprint_stats: None,
            edges: 0,
            clusters: 0,
            artifacts: 0,
            missing_targets: 0,
        }
    }
}

impl ScanEngine {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            cancel: CancelToken::new(),
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Token a driver can trip (e.g. from a Ctrl-C handler) to stop the run
    /// at the next safe point.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Scan, match or fingerprint, write the run tables and render the review
    /// artifacts. Nothing outside the new run directory (and the checkpoint
    /// store in folder mode) is written.
    pub fn run(&self, reporter: &dyn ProgressReporter) -> Result<RunSummary, Error> {
        self.config.validate()?;
        let root = PathBuf::from(&self.config.root_path);
        let output_base = self.config.output_base_path();
        let mode = self.config.mode;

        let layout = RunLayout::create(&output_base, mode, Local::now())?;
        RunMeta {
            root: root.clone(),
            output_base: output_base.clone(),
            run_id: layout.run_id().to_string(),
            mode,
            top_n: self.config.top_n,
            created_at: Local::now().to_rfc3339(),
        }
        .write(layout.run_dir())?;
        info!("Mode {} on {} (run {})", mode, root.display(), layout.run_id());

        let options = ScanOptions::new(
            self.config.depth_limit,
            self.config.min_file_bytes(),
            self.config.extension_filter(),
            &self.config.ignore_patterns,
        );
        let inventory = scan_inventory(&root, &options, &self.cancel, reporter)?;

        match mode {
            ScanMode::Duplicate | ScanMode::BigFile => self.run_file_mode(&layout, &inventory, reporter),
            ScanMode::FolderSimilarity => self.run_folder_mode(&layout, &inventory, reporter),
        }
    }

    fn run_file_mode(
        &self,
        layout: &RunLayout,
        inventory: &Inventory,
        reporter: &dyn ProgressReporter,
    ) -> Result<RunSummary, Error> {
        let start = Instant::now();
        let (groups, match_stats) = find_duplicate_groups(
            &inventory.files,
            MatchOptions {
                min_group_count: 2,
                workers: self.config.workers,
            },
            &self.cancel,
            reporter,
        )?;
        debug!(
            "Matching done in {:.2}s: {} groups",
            start.elapsed().as_secs_f64(),
            groups.len()
        );

        tables::write_duplicate_result(&layout.table(run::DUPLICATE_RESULT_CSV), &groups)?;
        tables::write_grouped_report(&layout.table(run::GROUPED_REPORT_CSV), &groups)?;

        let min_count = self.config.min_group_count();
        let filtered: Vec<DuplicateGroup> = groups
            .iter()
            .filter(|g| g.count() >= min_count)
            .cloned()
            .collect();
        tables::write_grouped_report(&layout.table(run::COUNT_FILTERED_CSV), &filtered)?;

        let policy = self.config.ranking_policy();
        let top = select_top(&filtered, policy, self.config.top_n);
        tables::write_top_groups(&layout.table(run::TOP_GROUPS_CSV), &top)?;
        tables::write_top_group_paths(&layout.table(run::TOP_GROUP_PATHS_CSV), &top)?;
        info!(
            "{} groups, {} with >= {} members, {} selected by {}",
            groups.len(),
            filtered.len(),
            min_count,
            top.len(),
            policy.as_str()
        );

        let render = review::render_groups(&layout.review_root(), &top)?;

        let mut summary = RunSummary::new(layout, inventory);
        summary.groups_found = groups.len();
        summary.groups_selected = top.len();
        summary.wasted_bytes = filtered.iter().map(DuplicateGroup::wasted_bytes).sum();
        summary.match_stats = Some(match_stats);
        summary.artifacts = render.artifacts;
        summary.missing_targets = render.missing_targets;
        Ok(summary)
    }

    fn run_folder_mode(
        &self,
        layout: &RunLayout,
        inventory: &Inventory,
        reporter: &dyn ProgressReporter,
    ) -> Result<RunSummary, Error> {
        let checkpoint_dir = self.config.checkpoint_dir_path();
        std::fs::create_dir_all(&checkpoint_dir)?;
        let mut store = CheckpointStore::for_root(&checkpoint_dir, &inventory.root, true);

        let (hashes, fp_stats) = fingerprint_files(
            &inventory.files,
            &mut store,
            FingerprintOptions {
                workers: self.config.workers,
                checkpoint_every: self.config.checkpoint_every,
            },
            &self.cancel,
            reporter,
        )?;
        let folders = build_folder_fingerprints(inventory, &hashes);

        let report = find_similar_folders(
            &folders,
            SimilarityOptions {
                threshold: self.config.similarity_threshold,
                min_bytes: self.config.min_dir_bytes(),
            },
            &self.cancel,
            reporter,
        )?;

        let top_n = self.config.top_n;
        tables::write_similarity_pairs(
            &layout.table(run::SIMILARITY_PAIRS_CSV),
            &report.edges,
            &report.clusters,
            top_n,
        )?;
        tables::write_similarity_clusters(&layout.table(run::SIMILARITY_CLUSTERS_CSV), &report.clusters)?;

        let selected = &report.clusters[..report.clusters.len().min(top_n)];
        let render = review::render_clusters(&layout.review_root(), selected)?;
        info!(
            "{} folders compared, {} edges, {} clusters ({} rendered)",
            report.qualifying,
            report.edges.len(),
            report.clusters.len(),
            selected.len()
        );

        let mut summary = RunSummary::new(layout, inventory);
        summary.fingerprint_stats = Some(fp_stats);
        summary.edges = report.edges.len();
        summary.clusters = report.clusters.len();
        summary.groups_selected = selected.len();
        summary.artifacts = render.artifacts;
        summary.missing_targets = render.missing_targets;
        Ok(summary)
    }
}
