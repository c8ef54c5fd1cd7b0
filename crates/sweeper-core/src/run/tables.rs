use serde::Serialize;
use std::fs;
use std::path::Path;
use tracing::debug;

use crate::analysis::{FolderCluster, SimilarityEdge};
use crate::error::Error;
use crate::model::DuplicateGroup;

const KIB: u64 = 1024;
const MIB: u64 = KIB * 1024;
const GIB: u64 = MIB * 1024;

/// A CSV row with a fixed header, written even when there are no rows.
pub trait TableRow: Serialize {
    const HEADERS: &'static [&'static str];
}

/// Writes `rows` to `path` under `T::HEADERS`, replacing any previous table.
pub fn write_table<T: TableRow>(path: &Path, rows: &[T]) -> Result<usize, Error> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)?;
    writer.write_record(T::HEADERS)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    debug!("Wrote {} rows to {}", rows.len(), path.display());
    Ok(rows.len())
}

/// `512 B`, `1.50 KB`, `2.00 GB`.
pub fn human_bytes(n: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    let mut value = n as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", n, UNITS[0])
    } else {
        format!("{:.2} {}", value, UNITS[unit])
    }
}

/// Compact size used in artifact names: `1.5GB`, `12.000MB`, `3KB`.
pub fn format_size_tag(size: u64) -> String {
    if size >= GIB {
        format!("{:.1}GB", size as f64 / GIB as f64)
    } else if size >= MIB {
        format!("{:.3}MB", size as f64 / MIB as f64)
    } else {
        format!("{}KB", (size / KIB).max(1))
    }
}

#[derive(Serialize)]
struct DuplicateRow<'a> {
    size: u64,
    hash: &'a str,
    path: String,
}

impl TableRow for DuplicateRow<'_> {
    const HEADERS: &'static [&'static str] = &["SIZE", "HASH", "FILE_PATH"];
}

#[derive(Serialize)]
struct GroupedRow<'a> {
    hash: &'a str,
    size: u64,
    size_human: String,
    count: usize,
    paths: String,
}

impl TableRow for GroupedRow<'_> {
    const HEADERS: &'static [&'static str] = &["HASH", "SIZE_BYTES", "SIZE_HUMAN", "COUNT", "PATHS"];
}

#[derive(Serialize)]
struct TopGroupRow<'a> {
    hash: &'a str,
    count: usize,
    max_file_bytes: u64,
    total_bytes: u64,
    wasted_bytes: u64,
    keeper_candidate_path: String,
}

impl TableRow for TopGroupRow<'_> {
    const HEADERS: &'static [&'static str] = &[
        "hash",
        "count",
        "max_file_bytes",
        "total_bytes",
        "wasted_bytes",
        "keeper_candidate_path",
    ];
}

#[derive(Serialize)]
struct GroupPathRow<'a> {
    hash: &'a str,
    path: String,
    size_bytes: u64,
}

impl TableRow for GroupPathRow<'_> {
    const HEADERS: &'static [&'static str] = &["hash", "path", "size_bytes"];
}

/// Every member of every group: size, strong hash, path.
pub fn write_duplicate_result(path: &Path, groups: &[DuplicateGroup]) -> Result<usize, Error> {
    let rows: Vec<DuplicateRow> = groups
        .iter()
        .flat_map(|g| {
            g.members.iter().map(move |m| DuplicateRow {
                size: m.size,
                hash: &g.strong_hash,
                path: m.path.to_string_lossy().into_owned(),
            })
        })
        .collect();
    write_table(path, &rows)
}

/// One row per group with pipe-delimited member paths.
pub fn write_grouped_report(path: &Path, groups: &[DuplicateGroup]) -> Result<usize, Error> {
    let rows: Vec<GroupedRow> = groups
        .iter()
        .map(|g| GroupedRow {
            hash: &g.strong_hash,
            size: g.size,
            size_human: human_bytes(g.size),
            count: g.count(),
            paths: g
                .members
                .iter()
                .map(|m| m.path.to_string_lossy())
                .collect::<Vec<_>>()
                .join(" | "),
        })
        .collect();
    write_table(path, &rows)
}

pub fn write_top_groups(path: &Path, groups: &[DuplicateGroup]) -> Result<usize, Error> {
    let rows: Vec<TopGroupRow> = groups
        .iter()
        .map(|g| TopGroupRow {
            hash: &g.strong_hash,
            count: g.count(),
            max_file_bytes: g.largest_member_size(),
            total_bytes: g.total_bytes(),
            wasted_bytes: g.wasted_bytes(),
            keeper_candidate_path: g
                .keeper_candidate()
                .map(|p| p.to_string_lossy().into_owned())
                .unwrap_or_default(),
        })
        .collect();
    write_table(path, &rows)
}

/// Members of the selected groups, in rank order.
pub fn write_top_group_paths(path: &Path, groups: &[DuplicateGroup]) -> Result<usize, Error> {
    let rows: Vec<GroupPathRow> = groups
        .iter()
        .flat_map(|g| {
            g.members.iter().map(move |m| GroupPathRow {
                hash: &g.strong_hash,
                path: m.path.to_string_lossy().into_owned(),
                size_bytes: m.size,
            })
        })
        .collect();
    write_table(path, &rows)
}

#[derive(Serialize)]
struct PairRow {
    rank: usize,
    cluster: String,
    score: String,
    match_type: &'static str,
    shared: usize,
    files_a: usize,
    files_b: usize,
    bytes_a: u64,
    bytes_b: u64,
    dir_a: String,
    dir_b: String,
}

impl TableRow for PairRow {
    const HEADERS: &'static [&'static str] = &[
        "rank", "cluster", "score", "match", "shared", "files_a", "files_b", "bytes_a",
        "bytes_b", "dir_a", "dir_b",
    ];
}

#[derive(Serialize)]
struct ClusterRow {
    cluster: usize,
    size: usize,
    avg_score: String,
    max_score: String,
    total_bytes: u64,
    total_human: String,
    members: String,
}

impl TableRow for ClusterRow {
    const HEADERS: &'static [&'static str] = &[
        "cluster",
        "members",
        "avg_score",
        "max_score",
        "total_bytes",
        "total_human",
        "paths",
    ];
}

/// Top `limit` edges, tagged with the 1-based cluster they belong to.
pub fn write_similarity_pairs(
    path: &Path,
    edges: &[SimilarityEdge],
    clusters: &[FolderCluster],
    limit: usize,
) -> Result<usize, Error> {
    let cluster_of = |dir: &Path| {
        clusters
            .iter()
            .position(|c| c.members.iter().any(|m| m.path == dir))
            .map(|i| (i + 1).to_string())
            .unwrap_or_else(|| "-".to_string())
    };
    let rows: Vec<PairRow> = edges
        .iter()
        .take(limit)
        .enumerate()
        .map(|(i, e)| PairRow {
            rank: i + 1,
            cluster: cluster_of(&e.left),
            score: format!("{:.1}", e.score),
            match_type: e.match_type.as_str(),
            shared: e.shared,
            files_a: e.left_files,
            files_b: e.right_files,
            bytes_a: e.left_bytes,
            bytes_b: e.right_bytes,
            dir_a: e.left.to_string_lossy().into_owned(),
            dir_b: e.right.to_string_lossy().into_owned(),
        })
        .collect();
    write_table(path, &rows)
}

pub fn write_similarity_clusters(path: &Path, clusters: &[FolderCluster]) -> Result<usize, Error> {
    let rows: Vec<ClusterRow> = clusters
        .iter()
        .enumerate()
        .map(|(i, c)| ClusterRow {
            cluster: i + 1,
            size: c.size(),
            avg_score: format!("{:.1}", c.avg_score),
            max_score: format!("{:.1}", c.max_score),
            total_bytes: c.total_bytes,
            total_human: human_bytes(c.total_bytes),
            members: c
                .members
                .iter()
                .map(|m| m.path.to_string_lossy())
                .collect::<Vec<_>>()
                .join(" | "),
        })
        .collect();
    write_table(path, &rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::GroupMember;
    use std::path::PathBuf;

    #[test]
    fn test_human_bytes() {
        assert_eq!(human_bytes(512), "512 B");
        assert_eq!(human_bytes(1536), "1.50 KB");
        assert_eq!(human_bytes(2 * GIB), "2.00 GB");
    }

    #[test]
    fn test_size_tags() {
        assert_eq!(format_size_tag(10), "1KB");
        assert_eq!(format_size_tag(3 * KIB), "3KB");
        assert_eq!(format_size_tag(12 * MIB), "12.000MB");
        assert_eq!(format_size_tag(3 * GIB / 2), "1.5GB");
    }

    #[test]
    fn test_empty_table_still_has_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.csv");
        write_top_groups(&path, &[]).unwrap();
        let text = fs::read_to_string(path).unwrap();
        assert_eq!(
            text.trim_end(),
            "hash,count,max_file_bytes,total_bytes,wasted_bytes,keeper_candidate_path"
        );
    }

    #[test]
    fn test_grouped_report_joins_paths() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("g.csv");
        let group = DuplicateGroup {
            strong_hash: "abc".into(),
            size: 2048,
            members: vec![
                GroupMember {
                    path: PathBuf::from("/x/1"),
                    size: 2048,
                },
                GroupMember {
                    path: PathBuf::from("/y/2"),
                    size: 2048,
                },
            ],
        };
        write_grouped_report(&path, &[group]).unwrap();
        let text = fs::read_to_string(path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[1], "abc,2048,2.00 KB,2,/x/1 | /y/2");
    }
}
