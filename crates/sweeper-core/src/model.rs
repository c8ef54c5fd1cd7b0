use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// A regular file discovered by the inventory scanner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    pub path: PathBuf,
    pub size: u64,
    pub modified: Option<SystemTime>,
}

impl FileRecord {
    /// Modification time as nanoseconds since the Unix epoch.
    pub fn mod_time_nanos(&self) -> Option<i64> {
        self.modified.and_then(system_time_nanos)
    }
}

pub fn system_time_nanos(time: SystemTime) -> Option<i64> {
    time.duration_since(UNIX_EPOCH)
        .ok()
        .and_then(|d| i64::try_from(d.as_nanos()).ok())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupMember {
    pub path: PathBuf,
    pub size: u64,
}

/// Files confirmed identical by size and strong hash, in first-seen order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateGroup {
    pub strong_hash: String,
    pub size: u64,
    pub members: Vec<GroupMember>,
}

impl DuplicateGroup {
    pub fn count(&self) -> usize {
        self.members.len()
    }

    pub fn total_bytes(&self) -> u64 {
        self.members.iter().map(|m| m.size).sum()
    }

    pub fn largest_member_size(&self) -> u64 {
        self.members.iter().map(|m| m.size).max().unwrap_or(0)
    }

    /// Bytes occupied beyond the single largest copy.
    pub fn wasted_bytes(&self) -> u64 {
        self.total_bytes().saturating_sub(self.largest_member_size())
    }

    /// Path of the largest member; the first seen wins a tie.
    pub fn keeper_candidate(&self) -> Option<&Path> {
        let mut best: Option<&GroupMember> = None;
        for member in &self.members {
            if best.map(|b| member.size > b.size).unwrap_or(true) {
                best = Some(member);
            }
        }
        best.map(|m| m.path.as_path())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn group(sizes: &[u64]) -> DuplicateGroup {
        DuplicateGroup {
            strong_hash: "ab".into(),
            size: sizes[0],
            members: sizes
                .iter()
                .enumerate()
                .map(|(i, &size)| GroupMember {
                    path: PathBuf::from(format!("/m/{i}")),
                    size,
                })
                .collect(),
        }
    }

    #[test]
    fn test_wasted_bytes_is_total_minus_largest() {
        let g = group(&[100, 100, 100]);
        assert_eq!(g.count(), 3);
        assert_eq!(g.total_bytes(), 300);
        assert_eq!(g.wasted_bytes(), 200);

        let g = group(&[10, 40, 25]);
        assert_eq!(g.wasted_bytes(), 35);
        assert_eq!(g.keeper_candidate(), Some(Path::new("/m/1")));
    }

    #[test]
    fn test_keeper_tie_goes_to_first_seen() {
        let g = group(&[7, 7, 7]);
        assert_eq!(g.keeper_candidate(), Some(Path::new("/m/0")));
    }
}
