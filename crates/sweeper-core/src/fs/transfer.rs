//! Copy and move for quarantine candidates, which may be files or whole
//! directories (folder-similarity mode).
//!
//! Moves try `rename()` first. Some mounts surface `EXDEV` even for paths that
//! look local; those fall back to copy followed by removal of the source.

use std::fs;
use std::io;
use std::path::Path;
use walkdir::WalkDir;

/// Copy a file (preserving permissions) or a directory tree to `destination`.
pub fn copy_entry(source: &Path, destination: &Path) -> io::Result<()> {
    let metadata = fs::symlink_metadata(source)?;
    if metadata.is_dir() {
        copy_tree(source, destination)
    } else {
        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(source, destination)?;
        if let Ok(modified) = metadata.modified() {
            let _ = fs::File::options()
                .write(true)
                .open(destination)
                .and_then(|f| f.set_modified(modified));
        }
        Ok(())
    }
}

fn copy_tree(source: &Path, destination: &Path) -> io::Result<()> {
    for entry in WalkDir::new(source).follow_links(false) {
        let entry = entry.map_err(io::Error::from)?;
        let relative = entry
            .path()
            .strip_prefix(source)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        let target = destination.join(relative);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)?;
        } else if entry.file_type().is_symlink() {
            copy_link(entry.path(), &target)?;
        } else if entry.file_type().is_file() {
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

/// Recreate the link itself, not the file it points at.
fn copy_link(source: &Path, target: &Path) -> io::Result<()> {
    let link = fs::read_link(source)?;
    #[cfg(unix)]
    {
        std::os::unix::fs::symlink(&link, target)
    }
    #[cfg(windows)]
    {
        if fs::metadata(source).map(|m| m.is_dir()).unwrap_or(false) {
            std::os::windows::fs::symlink_dir(&link, target)
        } else {
            std::os::windows::fs::symlink_file(&link, target)
        }
    }
    #[cfg(not(any(unix, windows)))]
    {
        let _ = (link, target);
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "symlinks are not supported on this platform",
        ))
    }
}

/// Move a file or directory to `destination`, creating parent directories.
pub fn move_entry(source: &Path, destination: &Path) -> io::Result<()> {
    if let Some(parent) = destination.parent() {
        fs::create_dir_all(parent)?;
    }

    match fs::rename(source, destination) {
        Ok(()) => Ok(()),
        Err(e) if is_cross_device_rename(&e) => {
            copy_entry(source, destination)?;
            if fs::symlink_metadata(source)?.is_dir() {
                fs::remove_dir_all(source)
            } else {
                fs::remove_file(source)
            }
        }
        Err(e) => Err(e),
    }
}

fn is_cross_device_rename(err: &io::Error) -> bool {
    // EXDEV on unix, ERROR_NOT_SAME_DEVICE on windows
    if cfg!(windows) {
        err.raw_os_error() == Some(17)
    } else {
        err.raw_os_error() == Some(18)
    }
}
