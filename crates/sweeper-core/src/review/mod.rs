//! Reviewable artifacts.
//!
//! Each selected group or cluster becomes a directory under the review root,
//! holding one `.ref` file per member. A `.ref` file contains the absolute
//! path of its target. A member is kept when its artifact name starts with
//! `mmm` (any case); everything else is a remove candidate. Only this module
//! knows about the naming convention; the rest of the crate sees
//! [`ReviewDecision`].

use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::analysis::FolderCluster;
use crate::error::Error;
use crate::fs::{atomic_write, safe_filename};
use crate::model::DuplicateGroup;
use crate::run::tables::format_size_tag;

pub const KEEP_PREFIX: &str = "mmm_";
pub const ARTIFACT_EXTENSION: &str = "ref";

/// Review roots in lookup order; `01_review` is the legacy name.
pub const REVIEW_ROOT_NAMES: [&str; 4] = [
    "01_review_dup",
    "01_review_big",
    "01_review_fol",
    "01_review",
];

const GROUP_NAME_MAX: usize = 120;
const ARTIFACT_NAME_MAX: usize = 220;

/// Keep/remove decision for one member, read back from its artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewDecision {
    /// Name of the group directory holding the artifact.
    pub group: String,
    pub artifact: PathBuf,
    /// `None` when the artifact is empty or unreadable.
    pub target: Option<PathBuf>,
    pub keep: bool,
}

impl ReviewDecision {
    pub fn artifact_name(&self) -> String {
        self.artifact
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub fn target_exists(&self) -> bool {
        self.target
            .as_deref()
            .map(|t| t.symlink_metadata().is_ok())
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderStats {
    pub groups: usize,
    pub artifacts: usize,
    pub missing_targets: usize,
}

pub fn is_keep_name(name: &str) -> bool {
    name.get(..3)
        .map(|p| p.eq_ignore_ascii_case("mmm"))
        .unwrap_or(false)
}

/// First existing review root inside `run_dir`.
pub fn find_review_root(run_dir: &Path) -> Option<PathBuf> {
    REVIEW_ROOT_NAMES
        .iter()
        .map(|name| run_dir.join(name))
        .find(|p| p.is_dir())
}

/// One directory per ranked group (`NN_SHA_<hash>`), members largest first.
pub fn render_groups(review_root: &Path, groups: &[DuplicateGroup]) -> Result<RenderStats, Error> {
    let mut stats = RenderStats::default();
    for (idx, group) in groups.iter().enumerate() {
        let tag: String = group.strong_hash.chars().take(32).collect();
        let group_dir = review_root.join(format!("{:02}_SHA_{}", idx + 1, tag));
        fs::create_dir_all(&group_dir)?;
        stats.groups += 1;

        let mut members: Vec<(&Path, u64)> = group
            .members
            .iter()
            .map(|m| (m.path.as_path(), m.size))
            .collect();
        members.sort_by(|a, b| b.1.cmp(&a.1));

        for (file_idx, (target, size)) in members.into_iter().enumerate() {
            write_artifact(&group_dir, file_idx + 1, target, size, &mut stats)?;
        }
    }
    info!(
        "Rendered {} groups ({} artifacts) under {}",
        stats.groups,
        stats.artifacts,
        review_root.display()
    );
    Ok(stats)
}

/// One directory per cluster (`NN_G<n>_<k>dirs_<names>`), members in cluster order.
pub fn render_clusters(review_root: &Path, clusters: &[FolderCluster]) -> Result<RenderStats, Error> {
    let mut stats = RenderStats::default();
    for (idx, cluster) in clusters.iter().enumerate() {
        let gid = idx + 1;
        let names = cluster
            .members
            .iter()
            .take(4)
            .map(|m| {
                let name = m
                    .path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                safe_filename(&name, 30)
            })
            .collect::<Vec<_>>()
            .join("__");
        let more = if cluster.size() > 4 {
            format!("(+{})", cluster.size() - 4)
        } else {
            String::new()
        };
        let dir_name = safe_filename(
            &format!("{:02}_G{}_{}dirs_{}{}", gid, gid, cluster.size(), names, more),
            GROUP_NAME_MAX,
        );
        let group_dir = review_root.join(dir_name);
        fs::create_dir_all(&group_dir)?;
        stats.groups += 1;

        for (member_idx, member) in cluster.members.iter().enumerate() {
            write_artifact(&group_dir, member_idx + 1, &member.path, member.total_bytes, &mut stats)?;
        }
    }
    info!(
        "Rendered {} clusters ({} artifacts) under {}",
        stats.groups,
        stats.artifacts,
        review_root.display()
    );
    Ok(stats)
}

fn write_artifact(
    group_dir: &Path,
    idx: usize,
    target: &Path,
    size: u64,
    stats: &mut RenderStats,
) -> Result<(), Error> {
    if target.symlink_metadata().is_err() {
        stats.missing_targets += 1;
    }
    // Only the label is shortened so the extension always survives.
    let prefix = format!("{:02}__{}__", idx, format_size_tag(size));
    let suffix = format!(".{}", ARTIFACT_EXTENSION);
    let room = ARTIFACT_NAME_MAX.saturating_sub(prefix.chars().count() + suffix.chars().count());
    let label = safe_filename(&member_label(target), room);
    let path = group_dir.join(format!("{}{}{}", prefix, label, suffix));
    if path.exists() {
        return Ok(());
    }
    let body = format!("{}\n", target.to_string_lossy());
    atomic_write(&path, body.as_bytes())?;
    stats.artifacts += 1;
    Ok(())
}

/// `<drive>__<parent>__<parent>__<name>` with the two nearest parents.
fn member_label(path: &Path) -> String {
    let parts: Vec<String> = path
        .components()
        .filter_map(|c| match c {
            std::path::Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
            std::path::Component::Prefix(p) => {
                Some(p.as_os_str().to_string_lossy().replace(':', ""))
            }
            _ => None,
        })
        .collect();
    let drive = match path.components().next() {
        Some(std::path::Component::Prefix(_)) => parts.first().cloned().unwrap_or_default(),
        _ => "ROOT".to_string(),
    };
    let normal: Vec<&String> = match path.components().next() {
        Some(std::path::Component::Prefix(_)) => parts.iter().skip(1).collect(),
        _ => parts.iter().collect(),
    };
    let name = normal.last().map(|s| s.as_str()).unwrap_or_default();
    let parents: Vec<&str> = normal
        .iter()
        .rev()
        .skip(1)
        .take(2)
        .rev()
        .map(|s| s.as_str())
        .collect();
    let label = if parents.is_empty() {
        format!("{}__{}", drive, name)
    } else {
        format!("{}__{}__{}", drive, parents.join("__"), name)
    };
    safe_filename(&label, ARTIFACT_NAME_MAX)
}

/// Reads every artifact under `review_root`, sorted by path.
pub fn read_decisions(review_root: &Path) -> Result<Vec<ReviewDecision>, Error> {
    let mut decisions = Vec::new();
    for entry in WalkDir::new(review_root).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Skipping unreadable review entry: {}", e);
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some(ARTIFACT_EXTENSION) {
            continue;
        }
        let name = entry.file_name().to_string_lossy();
        let group = path
            .parent()
            .and_then(|p| p.file_name())
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let target = match fs::read_to_string(path) {
            Ok(text) => {
                // Spaces are legal at either end of a file name; drop only the line ending.
                let line = text.split('\n').next().unwrap_or("").trim_end_matches('\r');
                (!line.is_empty()).then(|| PathBuf::from(line))
            }
            Err(e) => {
                warn!("Cannot read artifact {}: {}", path.display(), e);
                None
            }
        };
        decisions.push(ReviewDecision {
            group,
            artifact: path.to_path_buf(),
            target,
            keep: is_keep_name(&name),
        });
    }
    debug!(
        "Read {} review decisions from {}",
        decisions.len(),
        review_root.display()
    );
    Ok(decisions)
}

/// Marks or unmarks an artifact as keep by renaming it; returns the new path.
pub fn set_keep(artifact: &Path, keep: bool) -> Result<PathBuf, Error> {
    let name = artifact
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| Error::InvalidArgument(format!("not an artifact: {}", artifact.display())))?;
    if !artifact.is_file() {
        return Err(Error::InvalidArgument(format!(
            "artifact not found: {}",
            artifact.display()
        )));
    }
    if is_keep_name(&name) == keep {
        return Ok(artifact.to_path_buf());
    }

    let new_name = if keep {
        format!("{}{}", KEEP_PREFIX, name)
    } else {
        let rest = &name[3..];
        rest.strip_prefix('_').unwrap_or(rest).to_string()
    };
    let destination = artifact.with_file_name(new_name);
    if destination.exists() {
        return Err(Error::InvalidArgument(format!(
            "cannot rename, {} already exists",
            destination.display()
        )));
    }
    fs::rename(artifact, &destination)?;
    debug!("{} -> {}", artifact.display(), destination.display());
    Ok(destination)
}
