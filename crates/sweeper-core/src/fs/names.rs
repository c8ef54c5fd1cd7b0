use std::path::{Path, PathBuf};

/// First free path for `name` inside `dir`.
///
/// On a clash the stem gets a `__DUP__n` suffix (`clip__DUP__1.mp4`, ...).
pub fn next_free_path(dir: &Path, name: &str) -> PathBuf {
    let candidate = dir.join(name);
    if candidate.symlink_metadata().is_err() {
        return candidate;
    }

    let (stem, ext) = split_extension(name);
    let mut i = 1u32;
    loop {
        let candidate = dir.join(format!("{}__DUP__{}{}", stem, i, ext));
        if candidate.symlink_metadata().is_err() {
            return candidate;
        }
        i += 1;
    }
}

fn split_extension(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(idx) if idx > 0 => (&name[..idx], &name[idx..]),
        _ => (name, ""),
    }
}

/// Replace characters that are invalid in file names on any supported platform,
/// collapse whitespace and cap the length (in characters).
pub fn safe_filename(s: &str, max_len: usize) -> String {
    let replaced: String = s
        .chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '_',
            c if (c as u32) < 0x20 => '_',
            c => c,
        })
        .collect();
    let collapsed = replaced.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() > max_len {
        collapsed
            .chars()
            .take(max_len)
            .collect::<String>()
            .trim_end()
            .to_string()
    } else {
        collapsed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_next_free_path_appends_suffix() {
        let tmp = tempfile::tempdir().unwrap();
        let first = next_free_path(tmp.path(), "clip.mp4");
        assert_eq!(first, tmp.path().join("clip.mp4"));
        fs::write(&first, b"a").unwrap();

        let second = next_free_path(tmp.path(), "clip.mp4");
        assert_eq!(second, tmp.path().join("clip__DUP__1.mp4"));
        fs::write(&second, b"b").unwrap();

        let third = next_free_path(tmp.path(), "clip.mp4");
        assert_eq!(third, tmp.path().join("clip__DUP__2.mp4"));
    }

    #[test]
    fn test_next_free_path_without_extension() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("README"), b"a").unwrap();
        assert_eq!(
            next_free_path(tmp.path(), "README"),
            tmp.path().join("README__DUP__1")
        );
    }

    #[test]
    fn test_safe_filename() {
        assert_eq!(safe_filename("a<b>:c|d?.txt", 100), "a_b__c_d_.txt");
        assert_eq!(safe_filename("  spaced   out  ", 100), "spaced out");
        assert_eq!(safe_filename("abcdef", 3), "abc");
    }
}
