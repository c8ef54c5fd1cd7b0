use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use walkdir::WalkDir;

const READ_BUFFER: usize = 64 * 1024;

/// Full BLAKE3 digest of a file, lower-case hex.
pub fn hash_file(path: &Path) -> io::Result<String> {
    let mut hasher = blake3::Hasher::new();
    feed_file(&mut hasher, path)?;
    Ok(hasher.finalize().to_hex().to_string())
}

/// BLAKE3 over a directory's sorted relative paths and file contents.
/// Two trees digest equal only when layout and bytes agree. Symlinks are
/// digested by their target text and never followed.
pub fn hash_tree(root: &Path) -> io::Result<String> {
    let mut hasher = blake3::Hasher::new();
    for entry in WalkDir::new(root).follow_links(false).sort_by_file_name() {
        let entry = entry?;
        if entry.depth() == 0 {
            continue;
        }
        let relative = entry
            .path()
            .strip_prefix(root)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        let relative = relative.to_string_lossy().replace('\\', "/");
        hasher.update(relative.as_bytes());
        hasher.update(&[0]);

        if entry.file_type().is_dir() {
            hasher.update(b"D");
        } else if entry.file_type().is_symlink() {
            hasher.update(b"L");
            let link = std::fs::read_link(entry.path())?;
            hasher.update(link.to_string_lossy().as_bytes());
        } else if entry.file_type().is_file() {
            hasher.update(b"F");
            feed_file(&mut hasher, entry.path())?;
        }
    }
    Ok(hasher.finalize().to_hex().to_string())
}

/// Dispatches on the entry kind: directories get a tree digest.
pub fn hash_entry(path: &Path) -> io::Result<String> {
    if std::fs::symlink_metadata(path)?.is_dir() {
        hash_tree(path)
    } else {
        hash_file(path)
    }
}

fn feed_file(hasher: &mut blake3::Hasher, path: &Path) -> io::Result<()> {
    let mut file = File::open(path)?;
    let mut buffer = vec![0u8; READ_BUFFER];
    loop {
        let read = file.read(&mut buffer)?;
        if read == 0 {
            return Ok(());
        }
        hasher.update(&buffer[..read]);
    }
}
