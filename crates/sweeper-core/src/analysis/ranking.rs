use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::model::DuplicateGroup;

/// How duplicate groups are ordered before the top-N cut.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RankingPolicy {
    /// Wasted bytes descending, then strong hash ascending.
    WastedBytes,
    /// Largest member size descending, then wasted bytes, then strong hash.
    LargestMember,
}

impl RankingPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            RankingPolicy::WastedBytes => "wasted-bytes",
            RankingPolicy::LargestMember => "largest-member",
        }
    }

    fn compare(self, a: &DuplicateGroup, b: &DuplicateGroup) -> Ordering {
        let by_hash = || a.strong_hash.cmp(&b.strong_hash);
        match self {
            RankingPolicy::WastedBytes => b
                .wasted_bytes()
                .cmp(&a.wasted_bytes())
                .then_with(by_hash),
            RankingPolicy::LargestMember => b
                .largest_member_size()
                .cmp(&a.largest_member_size())
                .then_with(|| b.wasted_bytes().cmp(&a.wasted_bytes()))
                .then_with(by_hash),
        }
    }
}

/// Orders every group by `policy`, dropping groups with no bytes.
pub fn rank_groups(groups: &[DuplicateGroup], policy: RankingPolicy) -> Vec<DuplicateGroup> {
    let mut ranked: Vec<DuplicateGroup> = groups
        .iter()
        .filter(|g| g.largest_member_size() > 0)
        .cloned()
        .collect();
    ranked.sort_by(|a, b| policy.compare(a, b));
    ranked
}

/// The first `top_n` groups under `policy`.
pub fn select_top(groups: &[DuplicateGroup], policy: RankingPolicy, top_n: usize) -> Vec<DuplicateGroup> {
    let mut ranked = rank_groups(groups, policy);
    ranked.truncate(top_n);
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::GroupMember;
    use std::path::PathBuf;

    fn group(hash: &str, size: u64, count: usize) -> DuplicateGroup {
        DuplicateGroup {
            strong_hash: hash.to_string(),
            size,
            members: (0..count)
                .map(|i| GroupMember {
                    path: PathBuf::from(format!("/{hash}/{i}")),
                    size,
                })
                .collect(),
        }
    }

    fn hashes(groups: &[DuplicateGroup]) -> Vec<&str> {
        groups.iter().map(|g| g.strong_hash.as_str()).collect()
    }

    #[test]
    fn test_policies_disagree_on_top_pick() {
        // "many": 10 copies of 100 bytes wastes 900; "huge": 2 copies of 500 wastes 500.
        let groups = vec![group("many", 100, 10), group("huge", 500, 2)];

        let wasted = select_top(&groups, RankingPolicy::WastedBytes, 1);
        assert_eq!(hashes(&wasted), vec!["many"]);

        let largest = select_top(&groups, RankingPolicy::LargestMember, 1);
        assert_eq!(hashes(&largest), vec!["huge"]);
    }

    #[test]
    fn test_ties_break_on_hash_ascending() {
        let groups = vec![group("bb", 10, 2), group("aa", 10, 2), group("cc", 10, 2)];
        let ranked = rank_groups(&groups, RankingPolicy::WastedBytes);
        assert_eq!(hashes(&ranked), vec!["aa", "bb", "cc"]);
    }

    #[test]
    fn test_empty_groups_dropped_and_top_n_truncates() {
        let groups = vec![group("zero", 0, 3), group("a", 5, 2), group("b", 6, 2)];
        let ranked = select_top(&groups, RankingPolicy::LargestMember, 5);
        assert_eq!(hashes(&ranked), vec!["b", "a"]);
        assert_eq!(select_top(&groups, RankingPolicy::WastedBytes, 1).len(), 1);
    }

    #[test]
    fn test_policy_names() {
        let parsed: RankingPolicy = serde_json::from_str("\"largest-member\"").unwrap();
        assert_eq!(parsed, RankingPolicy::LargestMember);
        assert_eq!(RankingPolicy::WastedBytes.as_str(), "wasted-bytes");
    }
}
