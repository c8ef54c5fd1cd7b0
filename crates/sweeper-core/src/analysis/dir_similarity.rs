use ahash::{AHashMap, AHashSet};
use std::cmp::Ordering;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info};

use super::dir_fingerprint::FolderFingerprint;
use crate::cancel::CancelToken;
use crate::error::Error;
use crate::progress::ProgressReporter;

const PROGRESS_EVERY: u64 = 10_000;

#[derive(Debug, Clone, Copy)]
pub struct SimilarityOptions {
    /// Percent, 0–100.
    pub threshold: f64,
    pub min_bytes: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchType {
    Exact,
    Subset,
    Partial,
}

impl MatchType {
    pub fn as_str(self) -> &'static str {
        match self {
            MatchType::Exact => "exact",
            MatchType::Subset => "subset",
            MatchType::Partial => "partial",
        }
    }
}

/// A kept pair of folders. `left` precedes `right` in walk order.
#[derive(Debug, Clone)]
pub struct SimilarityEdge {
    pub left: PathBuf,
    pub right: PathBuf,
    /// Jaccard index × 100.
    pub score: f64,
    pub shared: usize,
    pub left_files: usize,
    pub right_files: usize,
    pub left_bytes: u64,
    pub right_bytes: u64,
    pub match_type: MatchType,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterMember {
    pub path: PathBuf,
    pub total_bytes: u64,
    pub file_count: usize,
}

/// Connected component of kept edges, members in walk order.
#[derive(Debug, Clone)]
pub struct FolderCluster {
    pub members: Vec<ClusterMember>,
    pub avg_score: f64,
    pub max_score: f64,
    pub total_bytes: u64,
    pub edge_count: usize,
}

impl FolderCluster {
    pub fn size(&self) -> usize {
        self.members.len()
    }
}

#[derive(Debug, Clone, Default)]
pub struct SimilarityReport {
    pub qualifying: usize,
    pub compared: u64,
    pub edges: Vec<SimilarityEdge>,
    pub clusters: Vec<FolderCluster>,
}

/// Disjoint-set forest with path halving and union by rank.
#[derive(Debug)]
pub struct UnionFind {
    parent: Vec<usize>,
    rank: Vec<u8>,
}

impl UnionFind {
    pub fn new(len: usize) -> Self {
        Self {
            parent: (0..len).collect(),
            rank: vec![0; len],
        }
    }

    pub fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }

    pub fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra == rb {
            return;
        }
        match self.rank[ra].cmp(&self.rank[rb]) {
            Ordering::Less => self.parent[ra] = rb,
            Ordering::Greater => self.parent[rb] = ra,
            Ordering::Equal => {
                self.parent[rb] = ra;
                self.rank[ra] += 1;
            }
        }
    }
}

/// Jaccard index of two hash sets as a percentage. Two empty sets score 0.
pub fn jaccard_score(a: &AHashSet<u64>, b: &AHashSet<u64>) -> f64 {
    let (small, large) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    let shared = small.iter().filter(|h| large.contains(h)).count();
    let union = a.len() + b.len() - shared;
    if union == 0 {
        0.0
    } else {
        shared as f64 * 100.0 / union as f64
    }
}

/// True when one path contains the other (or they are equal).
pub fn is_ancestor_pair(a: &Path, b: &Path) -> bool {
    a.starts_with(b) || b.starts_with(a)
}

/// Compares every unordered pair of qualifying folders and merges pairs at or
/// above the threshold into clusters. Ancestor/descendant pairs are skipped.
pub fn find_similar_folders(
    folders: &[FolderFingerprint],
    options: SimilarityOptions,
    cancel: &CancelToken,
    reporter: &dyn ProgressReporter,
) -> Result<SimilarityReport, Error> {
    let start = Instant::now();
    let candidates: Vec<&FolderFingerprint> = folders
        .iter()
        .filter(|f| f.qualifies(options.min_bytes))
        .collect();
    let n = candidates.len();
    let total_pairs = (n as u64) * (n as u64).saturating_sub(1) / 2;
    info!(
        "Comparing {} qualifying folders ({} pairs, threshold {:.1}%)",
        n, total_pairs, options.threshold
    );
    reporter.on_similarity_start(total_pairs);

    let mut uf = UnionFind::new(n);
    let mut kept: Vec<(usize, usize, SimilarityEdge)> = Vec::new();
    let mut compared = 0u64;

    for i in 0..n {
        for j in (i + 1)..n {
            cancel.check()?;
            compared += 1;
            if compared % PROGRESS_EVERY == 0 {
                reporter.on_similarity_progress(compared, total_pairs);
            }

            let (a, b) = (candidates[i], candidates[j]);
            if is_ancestor_pair(&a.path, &b.path) {
                continue;
            }
            let score = jaccard_score(&a.hashes, &b.hashes);
            if score < options.threshold {
                continue;
            }

            uf.union(i, j);
            kept.push((i, j, make_edge(a, b, score)));
        }
    }
    reporter.on_similarity_progress(compared, total_pairs);

    let clusters = build_clusters(&candidates, &mut uf, &kept);

    let mut edges: Vec<SimilarityEdge> = kept.into_iter().map(|(_, _, e)| e).collect();
    edges.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| b.shared.cmp(&a.shared))
            .then_with(|| a.left.cmp(&b.left))
            .then_with(|| a.right.cmp(&b.right))
    });

    let elapsed = start.elapsed().as_secs_f64();
    debug!(
        "Similarity done in {:.2}s: {} edges, {} clusters",
        elapsed,
        edges.len(),
        clusters.len()
    );
    reporter.on_similarity_complete(edges.len(), clusters.len(), elapsed);

    Ok(SimilarityReport {
        qualifying: n,
        compared,
        edges,
        clusters,
    })
}

fn make_edge(a: &FolderFingerprint, b: &FolderFingerprint, score: f64) -> SimilarityEdge {
    let shared = a.hashes.intersection(&b.hashes).count();
    let match_type = if a.digest == b.digest && a.hashes == b.hashes {
        MatchType::Exact
    } else if shared == a.hashes.len() || shared == b.hashes.len() {
        MatchType::Subset
    } else {
        MatchType::Partial
    };
    SimilarityEdge {
        left: a.path.clone(),
        right: b.path.clone(),
        score,
        shared,
        left_files: a.file_count,
        right_files: b.file_count,
        left_bytes: a.total_bytes,
        right_bytes: b.total_bytes,
        match_type,
    }
}

fn build_clusters(
    candidates: &[&FolderFingerprint],
    uf: &mut UnionFind,
    kept: &[(usize, usize, SimilarityEdge)],
) -> Vec<FolderCluster> {
    let mut components: Vec<Vec<usize>> = Vec::new();
    let mut slot_of_root: AHashMap<usize, usize> = AHashMap::new();
    for i in 0..candidates.len() {
        let root = uf.find(i);
        let slot = *slot_of_root.entry(root).or_insert_with(|| {
            components.push(Vec::new());
            components.len() - 1
        });
        components[slot].push(i);
    }

    let mut scores: Vec<Vec<f64>> = vec![Vec::new(); components.len()];
    for (i, _, edge) in kept {
        if let Some(&slot) = slot_of_root.get(&uf.find(*i)) {
            scores[slot].push(edge.score);
        }
    }

    let mut clusters: Vec<FolderCluster> = components
        .into_iter()
        .zip(scores)
        .filter(|(members, _)| members.len() >= 2)
        .map(|(members, scores)| {
            let avg_score = if scores.is_empty() {
                0.0
            } else {
                scores.iter().sum::<f64>() / scores.len() as f64
            };
            let max_score = scores.iter().copied().fold(0.0, f64::max);
            FolderCluster {
                total_bytes: members.iter().map(|&i| candidates[i].total_bytes).sum(),
                members: members
                    .iter()
                    .map(|&i| ClusterMember {
                        path: candidates[i].path.clone(),
                        total_bytes: candidates[i].total_bytes,
                        file_count: candidates[i].file_count,
                    })
                    .collect(),
                avg_score,
                max_score,
                edge_count: scores.len(),
            }
        })
        .collect();

    clusters.sort_by(|a, b| {
        b.size()
            .cmp(&a.size())
            .then_with(|| b.avg_score.total_cmp(&a.avg_score))
            .then_with(|| b.total_bytes.cmp(&a.total_bytes))
            .then_with(|| {
                let first = |c: &FolderCluster| c.members.first().map(|m| m.path.clone());
                first(a).cmp(&first(b))
            })
    });
    clusters
}
