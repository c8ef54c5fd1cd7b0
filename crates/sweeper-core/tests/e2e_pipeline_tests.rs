use rand::rngs::StdRng;
use rand::SeedableRng;
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::tempdir;

use sweeper_core::cleanup::{CleanupPlan, KEEP_CHECK_PROBLEM_CSV, MOVE_LOG_CSV};
use sweeper_core::review::{find_review_root, read_decisions, set_keep};
use sweeper_core::{
    run_cleanup, AppConfig, CleanupOptions, CleanupOutcome, Error, RunSummary, ScanEngine,
    ScanMode, SilentReporter,
};

/// Layout:
///   data/
///     a/clip.mp4, b/clip.mp4, c/clip.mp4   identical, 3 copies
///     a/other.mp4, b/other.mp4             identical, 2 copies
///     c/unique.mp4
fn create_tree(root: &Path) -> Vec<PathBuf> {
    let clip = vec![0xABu8; 200 * 1024];
    let mut copies = Vec::new();
    for d in ["a", "b", "c"] {
        let dir = root.join(d);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("clip.mp4"), &clip).unwrap();
        copies.push(dir.join("clip.mp4"));
    }
    fs::write(root.join("a/other.mp4"), b"other video").unwrap();
    fs::write(root.join("b/other.mp4"), b"other video").unwrap();
    fs::write(root.join("c/unique.mp4"), b"unique video").unwrap();
    copies
}

fn scan(tmp: &Path, mode: ScanMode) -> RunSummary {
    let config = AppConfig {
        root_path: tmp.join("data").to_string_lossy().into_owned(),
        output_base: tmp.join("out").to_string_lossy().into_owned(),
        mode,
        min_size_mb: 0,
        workers: 2,
        ..AppConfig::default()
    };
    ScanEngine::new(config).run(&SilentReporter).unwrap()
}

#[test]
fn test_scan_review_cleanup_moves_only_unkept() {
    let tmp = tempdir().unwrap();
    let copies = create_tree(&tmp.path().join("data"));

    let summary = scan(tmp.path(), ScanMode::Duplicate);
    assert_eq!(summary.files_scanned, 6);
    assert_eq!(summary.groups_found, 2);
    assert_eq!(summary.groups_selected, 1);
    assert_eq!(summary.wasted_bytes, 2 * 200 * 1024);

    // Keep two of the three copies.
    let review = find_review_root(&summary.run_dir).unwrap();
    let decisions = read_decisions(&review).unwrap();
    assert_eq!(decisions.len(), 3);
    let kept: Vec<PathBuf> = decisions[..2]
        .iter()
        .map(|d| d.target.clone().unwrap())
        .collect();
    for d in &decisions[..2] {
        set_keep(&d.artifact, true).unwrap();
    }
    let doomed = decisions[2].target.clone().unwrap();

    let mut rng = StdRng::seed_from_u64(42);
    let outcome = run_cleanup(
        &summary.run_dir,
        CleanupOptions { sample_size: 5 },
        &mut rng,
        &SilentReporter,
        |acc| {
            assert_eq!(acc.links_keep, 2);
            assert_eq!(acc.existing_remove, 1);
            assert_eq!(acc.projected_reclaim(), 200 * 1024);
            assert_eq!(acc.dataset.unwrap().files, 6);
            true
        },
    )
    .unwrap();

    let CleanupOutcome::Completed(report) = outcome else {
        panic!("cleanup did not complete");
    };
    assert_eq!(report.moved, 1);
    assert_eq!(report.kept_ok, 2);
    assert!(!report.has_integrity_problems());
    assert!(kept.iter().all(|p| p.exists()));
    assert!(!doomed.exists());
    assert_eq!(copies.iter().filter(|p| p.exists()).count(), 2);
    assert!(report.removed_dir.join("clip.mp4").is_file());

    let log = fs::read_to_string(report.post_review_dir.join(MOVE_LOG_CSV)).unwrap();
    assert!(log.lines().nth(1).unwrap().ends_with("MOVED"));
    let problems = fs::read_to_string(report.post_review_dir.join(KEEP_CHECK_PROBLEM_CSV)).unwrap();
    assert_eq!(problems.lines().count(), 1);
}

#[test]
fn test_tampered_quarantine_aborts_without_moving() {
    let tmp = tempdir().unwrap();
    let copies = create_tree(&tmp.path().join("data"));
    let summary = scan(tmp.path(), ScanMode::Duplicate);

    let review = find_review_root(&summary.run_dir).unwrap();
    let first = read_decisions(&review).unwrap()[0].artifact.clone();
    set_keep(&first, true).unwrap();

    let quarantined = CleanupPlan::load(&summary.run_dir)
        .unwrap()
        .quarantine(&SilentReporter)
        .unwrap();
    let victim = &quarantined.entries()[0].quarantine_path;
    fs::write(victim, b"corrupted").unwrap();

    let mut rng = StdRng::seed_from_u64(3);
    let err = quarantined.verify(10, &mut rng).unwrap_err();
    assert!(matches!(err, Error::VerificationFailed { bad: 1, .. }));
    assert!(copies.iter().all(|p| p.exists()));
}

#[test]
fn test_big_file_mode_filters_by_extension() {
    let tmp = tempdir().unwrap();
    let data = tmp.path().join("data");
    create_tree(&data);
    fs::write(data.join("a/notes.txt"), b"other video").unwrap();

    let summary = scan(tmp.path(), ScanMode::BigFile);
    // The .txt twin of other.mp4 is not a candidate.
    assert_eq!(summary.files_scanned, 6);
    assert_eq!(summary.groups_found, 2);
    assert_eq!(summary.groups_selected, 2);
    assert!(summary.run_dir.join("01_review_big").is_dir());
}

#[test]
fn test_folder_mode_renders_clusters() {
    let tmp = tempdir().unwrap();
    let data = tmp.path().join("data");
    for d in ["album", "album backup"] {
        fs::create_dir_all(data.join(d)).unwrap();
        for i in 0..4 {
            fs::write(data.join(d).join(format!("{i}.jpg")), format!("photo {i}")).unwrap();
        }
    }
    fs::create_dir_all(data.join("misc")).unwrap();
    fs::write(data.join("misc/readme"), b"nothing alike").unwrap();

    let config = AppConfig {
        root_path: data.to_string_lossy().into_owned(),
        output_base: tmp.path().join("out").to_string_lossy().into_owned(),
        mode: ScanMode::FolderSimilarity,
        min_dir_mb: 0,
        workers: 2,
        ..AppConfig::default()
    };
    let summary = ScanEngine::new(config).run(&SilentReporter).unwrap();
    assert_eq!(summary.clusters, 1);
    assert_eq!(summary.fingerprint_stats.unwrap().computed, 9);

    let review = summary.run_dir.join("01_review_fol");
    let decisions = read_decisions(&review).unwrap();
    assert_eq!(decisions.len(), 2);
    assert!(decisions.iter().all(|d| d.target_exists()));
    assert!(tmp.path().join("out/_checkpoints").is_dir());
}

/// Two identical albums under `data/`; `extra` runs on each album dir.
/// The `sub` folders stay under the 1 MiB floor so only the albums cluster.
fn folder_run(tmp: &Path, extra: impl Fn(&Path)) -> RunSummary {
    let data = tmp.join("data");
    for d in ["album", "album_copy"] {
        let dir = data.join(d);
        fs::create_dir_all(dir.join("sub")).unwrap();
        fs::write(dir.join("1.jpg"), vec![0x5Au8; 2 * 1024 * 1024]).unwrap();
        fs::write(dir.join("sub/2.jpg"), b"second photo").unwrap();
        extra(&dir);
    }
    let config = AppConfig {
        root_path: data.to_string_lossy().into_owned(),
        output_base: tmp.join("out").to_string_lossy().into_owned(),
        mode: ScanMode::FolderSimilarity,
        min_dir_mb: 1,
        workers: 2,
        ..AppConfig::default()
    };
    let summary = ScanEngine::new(config).run(&SilentReporter).unwrap();
    assert_eq!(summary.clusters, 1);
    summary
}

/// Keeps `album`, runs cleanup and returns the report.
fn clean_keeping_album(summary: &RunSummary) -> sweeper_core::CleanupReport {
    let review = summary.run_dir.join("01_review_fol");
    let decisions = read_decisions(&review).unwrap();
    assert_eq!(decisions.len(), 2);
    let keep = decisions
        .iter()
        .find(|d| d.target.as_deref().and_then(|t| t.file_name()) == Some(OsStr::new("album")))
        .unwrap();
    set_keep(&keep.artifact, true).unwrap();

    let mut rng = StdRng::seed_from_u64(7);
    let outcome = run_cleanup(
        &summary.run_dir,
        CleanupOptions { sample_size: 5 },
        &mut rng,
        &SilentReporter,
        |acc| {
            assert_eq!(acc.links_keep, 1);
            assert_eq!(acc.existing_remove, 1);
            true
        },
    )
    .unwrap();
    let CleanupOutcome::Completed(report) = outcome else {
        panic!("cleanup did not complete");
    };
    report
}

#[test]
fn test_folder_mode_cleanup_moves_whole_directory() {
    let tmp = tempdir().unwrap();
    let summary = folder_run(tmp.path(), |_| {});
    let report = clean_keeping_album(&summary);

    let data = tmp.path().join("data");
    assert_eq!(report.moved, 1);
    assert_eq!(report.kept_ok, 1);
    assert!(!report.has_integrity_problems());
    assert!(data.join("album/sub/2.jpg").is_file());
    assert!(!data.join("album_copy").exists());

    let moved = report.removed_dir.join("album_copy");
    assert!(moved.is_dir());
    assert_eq!(fs::read(moved.join("sub/2.jpg")).unwrap(), b"second photo");
}

#[cfg(unix)]
#[test]
fn test_folder_mode_cleanup_with_symlinked_member_file() {
    let tmp = tempdir().unwrap();
    let summary = folder_run(tmp.path(), |dir| {
        std::os::unix::fs::symlink("1.jpg", dir.join("cover.jpg")).unwrap();
    });
    let report = clean_keeping_album(&summary);

    assert_eq!(report.moved, 1);
    assert!(!report.has_integrity_problems());
    assert!(!tmp.path().join("data/album_copy").exists());

    let cover = report.removed_dir.join("album_copy/cover.jpg");
    assert!(fs::symlink_metadata(&cover).unwrap().file_type().is_symlink());
    assert_eq!(fs::read_link(&cover).unwrap(), Path::new("1.jpg"));
    assert_eq!(fs::metadata(&cover).unwrap().len(), 2 * 1024 * 1024);
}
