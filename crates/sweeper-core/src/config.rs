use config::{Config, ConfigError, Environment, File as ConfigFile};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::analysis::ranking::RankingPolicy;
use crate::error::Error;

const MIB: u64 = 1024 * 1024;

/// Which detection path a run takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScanMode {
    #[serde(rename = "duplicate", alias = "dup")]
    Duplicate,
    #[serde(rename = "big-file", alias = "big")]
    BigFile,
    #[serde(rename = "folder", alias = "folder-similarity", alias = "fol")]
    FolderSimilarity,
}

impl ScanMode {
    /// Short tag used in run-directory and review-directory names.
    pub fn tag(self) -> &'static str {
        match self {
            ScanMode::Duplicate => "dup",
            ScanMode::BigFile => "big",
            ScanMode::FolderSimilarity => "fol",
        }
    }

    pub fn default_min_group_count(self) -> usize {
        match self {
            ScanMode::Duplicate => 3,
            ScanMode::BigFile | ScanMode::FolderSimilarity => 2,
        }
    }

    pub fn default_ranking(self) -> RankingPolicy {
        match self {
            ScanMode::Duplicate => RankingPolicy::LargestMember,
            ScanMode::BigFile | ScanMode::FolderSimilarity => RankingPolicy::WastedBytes,
        }
    }
}

impl fmt::Display for ScanMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ScanMode::Duplicate => "DUP",
            ScanMode::BigFile => "BIGFILE",
            ScanMode::FolderSimilarity => "FOLDER",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub root_path: String,
    pub output_base: String,
    pub mode: ScanMode,
    pub top_n: usize,
    /// Big-file mode only: files below this size are never candidates.
    pub min_size_mb: u64,
    /// Big-file mode only: extension allow-list (case-insensitive, with dot).
    pub extensions: Vec<String>,
    /// Deepest directory level whose files are included (root = 0).
    ///
    /// Older settings files counted one level further: their `depth_limit = N`
    /// kept only levels below N, which is `N - 1` here.
    pub depth_limit: Option<usize>,
    pub ignore_patterns: Vec<String>,
    pub min_group_count: Option<usize>,
    pub ranking: Option<RankingPolicy>,
    /// Percent, 0–100.
    pub similarity_threshold: f64,
    pub min_dir_mb: u64,
    pub sample_size: usize,
    pub workers: usize,
    pub checkpoint_dir: Option<String>,
    pub checkpoint_every: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            root_path: ".".to_string(),
            output_base: "./dedup".to_string(),
            mode: ScanMode::BigFile,
            top_n: 50,
            min_size_mb: 200,
            extensions: [".mp4", ".mov", ".mkv", ".avi", ".wmv", ".flv", ".mpg", ".mpeg"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            depth_limit: None,
            ignore_patterns: Vec::new(),
            min_group_count: None,
            ranking: None,
            similarity_threshold: 85.0,
            min_dir_mb: 100,
            sample_size: 10,
            workers: 6,
            checkpoint_dir: None,
            checkpoint_every: 5_000,
        }
    }
}

impl AppConfig {
    pub fn min_group_count(&self) -> usize {
        self.min_group_count
            .unwrap_or_else(|| self.mode.default_min_group_count())
            .max(2)
    }

    pub fn ranking_policy(&self) -> RankingPolicy {
        self.ranking.unwrap_or_else(|| self.mode.default_ranking())
    }

    /// Minimum file size for inventory candidates; only big-file mode filters.
    pub fn min_file_bytes(&self) -> u64 {
        match self.mode {
            ScanMode::BigFile => self.min_size_mb * MIB,
            _ => 0,
        }
    }

    /// Extension allow-list for inventory candidates; only big-file mode filters.
    pub fn extension_filter(&self) -> &[String] {
        match self.mode {
            ScanMode::BigFile => &self.extensions,
            _ => &[],
        }
    }

    pub fn min_dir_bytes(&self) -> u64 {
        self.min_dir_mb * MIB
    }

    /// Output base with a trailing `Runs` segment removed.
    pub fn output_base_path(&self) -> PathBuf {
        normalize_output_base(Path::new(&self.output_base))
    }

    pub fn checkpoint_dir_path(&self) -> PathBuf {
        match &self.checkpoint_dir {
            Some(dir) => PathBuf::from(dir),
            None => self.output_base_path().join("_checkpoints"),
        }
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.top_n == 0 {
            return Err(Error::InvalidArgument("top_n must be at least 1".into()));
        }
        if self.workers == 0 {
            return Err(Error::InvalidArgument("workers must be at least 1".into()));
        }
        if self.sample_size == 0 {
            return Err(Error::InvalidArgument("sample_size must be at least 1".into()));
        }
        if self.checkpoint_every == 0 {
            return Err(Error::InvalidArgument(
                "checkpoint_every must be at least 1".into(),
            ));
        }
        if !(0.0..=100.0).contains(&self.similarity_threshold) {
            return Err(Error::InvalidArgument(format!(
                "similarity_threshold must be within 0..=100, got {}",
                self.similarity_threshold
            )));
        }
        Ok(())
    }
}

/// Load `Config.toml` (optional) overlaid by `SWEEPER_*` environment variables.
pub fn load_configuration() -> Result<AppConfig, ConfigError> {
    let builder = Config::builder()
        .add_source(ConfigFile::with_name("Config").required(false))
        .add_source(Environment::with_prefix("SWEEPER").try_parsing(true))
        .build()?;
    builder.try_deserialize::<AppConfig>()
}

fn normalize_output_base(base: &Path) -> PathBuf {
    match base.file_name() {
        Some(name) if name.to_string_lossy().eq_ignore_ascii_case("runs") => base
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| base.to_path_buf()),
        _ => base.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::FileFormat;

    fn from_toml(text: &str) -> AppConfig {
        Config::builder()
            .add_source(ConfigFile::from_str(text, FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize::<AppConfig>()
            .unwrap()
    }

    #[test]
    fn test_defaults_fill_missing_fields() {
        let cfg = from_toml(r#"root_path = "/data""#);
        assert_eq!(cfg.root_path, "/data");
        assert_eq!(cfg.top_n, 50);
        assert_eq!(cfg.sample_size, 10);
        assert_eq!(cfg.workers, 6);
        assert_eq!(cfg.mode, ScanMode::BigFile);
    }

    #[test]
    fn test_mode_names_and_defaults() {
        let cfg = from_toml(r#"mode = "duplicate""#);
        assert_eq!(cfg.mode, ScanMode::Duplicate);
        assert_eq!(cfg.min_group_count(), 3);
        assert_eq!(cfg.ranking_policy(), RankingPolicy::LargestMember);
        assert_eq!(cfg.min_file_bytes(), 0);
        assert!(cfg.extension_filter().is_empty());

        let cfg = from_toml(r#"mode = "big-file""#);
        assert_eq!(cfg.min_group_count(), 2);
        assert_eq!(cfg.ranking_policy(), RankingPolicy::WastedBytes);
        assert_eq!(cfg.min_file_bytes(), 200 * MIB);

        let cfg = from_toml(r#"mode = "folder""#);
        assert_eq!(cfg.mode, ScanMode::FolderSimilarity);
    }

    #[test]
    fn test_explicit_ranking_overrides_mode_default() {
        let cfg = from_toml(
            r#"
            mode = "duplicate"
            ranking = "wasted-bytes"
            min_group_count = 2
            "#,
        );
        assert_eq!(cfg.ranking_policy(), RankingPolicy::WastedBytes);
        assert_eq!(cfg.min_group_count(), 2);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut cfg = AppConfig::default();
        assert!(cfg.validate().is_ok());

        cfg.similarity_threshold = 120.0;
        assert!(cfg.validate().is_err());

        cfg.similarity_threshold = 85.0;
        cfg.top_n = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_output_base_strips_runs_segment() {
        let cfg = AppConfig {
            output_base: "/srv/dedup/Runs".to_string(),
            ..AppConfig::default()
        };
        assert_eq!(cfg.output_base_path(), PathBuf::from("/srv/dedup"));
        assert_eq!(
            cfg.checkpoint_dir_path(),
            PathBuf::from("/srv/dedup/_checkpoints")
        );
    }
}
