#[cfg(target_os = "windows")]
pub mod windows;

use std::path::{Path, PathBuf};
use sysinfo::Disks;

/// Normalized string key for a path, used by the checkpoint store.
///
/// Windows paths are case-insensitive, so keys are case-folded with a uniform
/// separator there; elsewhere the path text is used as-is.
#[cfg(target_os = "windows")]
pub fn path_key(path: &Path) -> String {
    windows::path_key(path)
}

#[cfg(not(target_os = "windows"))]
pub fn path_key(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// True if `path` is `root` itself or lies underneath it.
///
/// Both sides are canonicalized when possible so that `..` segments and
/// symlinked prefixes do not hide containment.
pub fn is_within(path: &Path, root: &Path) -> bool {
    let path = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
    let root = root.canonicalize().unwrap_or_else(|_| root.to_path_buf());
    path.starts_with(&root)
}

/// Capacity of the volume holding a path.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiskSpace {
    pub total: u64,
    pub available: u64,
}

impl DiskSpace {
    pub fn used(&self) -> u64 {
        self.total.saturating_sub(self.available)
    }
}

/// Look up the disk whose mount point is the longest prefix of `path`.
pub fn disk_space_for(path: &Path) -> Option<DiskSpace> {
    let path: PathBuf = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
    let disks = Disks::new_with_refreshed_list();

    let mut best: Option<(usize, DiskSpace)> = None;
    for disk in disks.list() {
        let mount = disk.mount_point();
        if path.starts_with(mount) {
            let len = mount.as_os_str().len();
            if best.map(|(l, _)| len > l).unwrap_or(true) {
                best = Some((
                    len,
                    DiskSpace {
                        total: disk.total_space(),
                        available: disk.available_space(),
                    },
                ));
            }
        }
    }
    best.map(|(_, space)| space)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_within() {
        let tmp = tempfile::tempdir().unwrap();
        let removed = tmp.path().join("04_removed_originals");
        std::fs::create_dir_all(removed.join("nested")).unwrap();
        std::fs::write(removed.join("x.bin"), b"x").unwrap();

        assert!(is_within(&removed, &removed));
        assert!(is_within(&removed.join("nested"), &removed));
        assert!(is_within(&removed.join("nested").join("..").join("x.bin"), &removed));
        assert!(!is_within(tmp.path(), &removed));
    }

    #[cfg(not(target_os = "windows"))]
    #[test]
    fn test_path_key_is_verbatim() {
        assert_eq!(path_key(Path::new("/Data/Clip.MP4")), "/Data/Clip.MP4");
    }
}
