use std::fs::File;
use std::hash::Hasher as _;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;
use twox_hash::XxHash64;

const READ_BUFFER: usize = 64 * 1024;

/// Bytes read from each end of a file for its partial fingerprint.
pub const FINGERPRINT_WINDOW: u64 = 64 * 1024;

/// Streaming XxHash64 over the whole file. Cheap tier of the matcher.
pub fn hash_file(path: &Path) -> io::Result<u64> {
    let mut file = File::open(path)?;
    let mut hasher = XxHash64::with_seed(0);
    let mut buffer = vec![0u8; READ_BUFFER];
    loop {
        let read = file.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        hasher.write(&buffer[..read]);
    }
    Ok(hasher.finish())
}

/// Fixed-cost fingerprint: the size, the first window and, when the file is
/// longer than two windows, the last window.
pub fn partial_fingerprint(path: &Path, size: u64) -> io::Result<u64> {
    let mut file = File::open(path)?;
    let mut hasher = XxHash64::with_seed(0);
    hasher.write(&size.to_le_bytes());

    let mut head = Vec::with_capacity(FINGERPRINT_WINDOW.min(size) as usize);
    (&mut file).take(FINGERPRINT_WINDOW).read_to_end(&mut head)?;
    hasher.write(&head);

    if size > FINGERPRINT_WINDOW * 2 {
        file.seek(SeekFrom::Start(size - FINGERPRINT_WINDOW))?;
        let mut tail = Vec::with_capacity(FINGERPRINT_WINDOW as usize);
        file.take(FINGERPRINT_WINDOW).read_to_end(&mut tail)?;
        hasher.write(&tail);
    }
    Ok(hasher.finish())
}

pub fn hash_data(data: &[u8]) -> u64 {
    let mut hasher = XxHash64::with_seed(0);
    hasher.write(data);
    hasher.finish()
}

pub fn to_hex(hash: u64) -> String {
    format!("{hash:016x}")
}

/// Parses a 16-digit hex fingerprint; anything else is rejected.
pub fn parse_hex(text: &str) -> Option<u64> {
    if text.len() != 16 || !text.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    u64::from_str_radix(text, 16).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_streaming_hash_matches_in_memory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f.bin");
        let data: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();
        fs::write(&path, &data).unwrap();
        assert_eq!(hash_file(&path).unwrap(), hash_data(&data));
    }

    #[test]
    fn test_fingerprint_ignores_middle_of_large_files() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.bin");
        let b = dir.path().join("b.bin");
        let mut data = vec![7u8; 300_000];
        fs::write(&a, &data).unwrap();
        data[150_000] = 9;
        fs::write(&b, &data).unwrap();

        let size = data.len() as u64;
        assert_eq!(
            partial_fingerprint(&a, size).unwrap(),
            partial_fingerprint(&b, size).unwrap()
        );
        assert_ne!(hash_file(&a).unwrap(), hash_file(&b).unwrap());
    }

    #[test]
    fn test_fingerprint_covers_small_files_fully() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.bin");
        let b = dir.path().join("b.bin");
        fs::write(&a, b"hello world").unwrap();
        fs::write(&b, b"hello w0rld").unwrap();
        assert_ne!(
            partial_fingerprint(&a, 11).unwrap(),
            partial_fingerprint(&b, 11).unwrap()
        );
    }

    #[test]
    fn test_hex_round_trip_and_rejects() {
        assert_eq!(parse_hex(&to_hex(0xdead_beef)), Some(0xdead_beef));
        assert_eq!(parse_hex("abc"), None);
        assert_eq!(parse_hex("zzzzzzzzzzzzzzzz"), None);
        assert_eq!(to_hex(1).len(), 16);
    }
}
