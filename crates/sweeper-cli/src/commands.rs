use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use sweeper_core::{AppConfig, ScanMode};

#[derive(Debug, Parser)]
#[command(name = "sweeper")]
#[command(about = "Find duplicate files and similar folders, review them, quarantine the rest", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Scan a tree and write a new run directory with reviewable artifacts
    Scan(ScanArgs),
    /// Inspect or change keep decisions of a run
    #[command(subcommand)]
    Review(ReviewCommand),
    /// Quarantine, verify and move the unkept members of a reviewed run
    Cleanup(CleanupArgs),
    /// Print configuration values
    PrintConfig,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ModeArg {
    Duplicate,
    BigFile,
    Folder,
}

impl From<ModeArg> for ScanMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Duplicate => ScanMode::Duplicate,
            ModeArg::BigFile => ScanMode::BigFile,
            ModeArg::Folder => ScanMode::FolderSimilarity,
        }
    }
}

/// Flags override `Config.toml` and `SWEEPER_*` values.
#[derive(Debug, Args)]
pub struct ScanArgs {
    #[arg(long)]
    pub root: Option<String>,
    /// Output base; runs go to `<base>/Runs`
    #[arg(long)]
    pub base: Option<String>,
    #[arg(long, value_enum)]
    pub mode: Option<ModeArg>,
    #[arg(long)]
    pub top_n: Option<usize>,
    #[arg(long)]
    pub min_size_mb: Option<u64>,
    /// Extension allow-list for big-file mode, repeatable
    #[arg(long = "ext")]
    pub extensions: Vec<String>,
    /// Deepest directory level whose files are included (root = 0)
    #[arg(long)]
    pub depth: Option<usize>,
    /// Folder similarity threshold in percent
    #[arg(long)]
    pub similarity: Option<f64>,
    #[arg(long)]
    pub min_dir_mb: Option<u64>,
    #[arg(long)]
    pub workers: Option<usize>,
}

impl ScanArgs {
    pub fn apply(self, config: &mut AppConfig) {
        if let Some(root) = self.root {
            config.root_path = root;
        }
        if let Some(base) = self.base {
            config.output_base = base;
        }
        if let Some(mode) = self.mode {
            config.mode = mode.into();
        }
        if let Some(top_n) = self.top_n {
            config.top_n = top_n;
        }
        if let Some(mb) = self.min_size_mb {
            config.min_size_mb = mb;
        }
        if !self.extensions.is_empty() {
            config.extensions = self.extensions;
        }
        if self.depth.is_some() {
            config.depth_limit = self.depth;
        }
        if let Some(threshold) = self.similarity {
            config.similarity_threshold = threshold;
        }
        if let Some(mb) = self.min_dir_mb {
            config.min_dir_mb = mb;
        }
        if let Some(workers) = self.workers {
            config.workers = workers;
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum ReviewCommand {
    /// List every artifact of a run with its decision
    List { run_dir: PathBuf },
    /// Mark an artifact as keep
    Keep { artifact: PathBuf },
    /// Clear the keep mark of an artifact
    Unkeep { artifact: PathBuf },
}

#[derive(Debug, Args)]
pub struct CleanupArgs {
    pub run_dir: PathBuf,
    /// Number of quarantine copies to hash against their source
    #[arg(long)]
    pub sample: Option<usize>,
    /// Skip the confirmation prompt
    #[arg(long)]
    pub yes: bool,
}
