use super::*;
use filetime::{FileTime, set_file_mtime};

/// Commits a manifest of `count` entries whose files do not exist, so every
/// sampled entry fails.
fn commit_phantom_manifest(root: &Path, count: usize) {
    let mut manifest = Manifest::new();
    for i in 0..count {
        manifest
            .insert(
                format!("./phantom/{i:05}"),
                Record {
                    fingerprint: format!("{i:064x}"),
                    size: i as u64,
                },
            )
            .unwrap();
    }
    ManifestStore::new(root).commit(&manifest).unwrap();
}

fn sampled(outcome: &DirectoryOutcome) -> (usize, usize, &[String]) {
    match &outcome.report {
        OperationReport::Sampled {
            total,
            selected,
            failed,
        } => (*total, *selected, failed),
        other => panic!("Expected Sampled report, got {:?}", other),
    }
}

#[test]
fn test_sample_selects_about_the_requested_fraction() {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    commit_phantom_manifest(root, 10_000);

    let outcome = run_hash(root, Mode::Sample).unwrap();

    let (total, selected, failed) = sampled(&outcome);
    assert_eq!(total, 10_000);
    assert!(
        (60..=140).contains(&selected),
        "selected {selected} of 10000 at rate 0.01"
    );
    assert_eq!(failed.len(), selected);
    assert!(outcome.has_problems());
}

#[test]
fn test_sample_with_seed_is_repeatable() {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    commit_phantom_manifest(root, 2_000);

    let first = run_hash(root, Mode::Sample).unwrap();
    let second = run_hash(root, Mode::Sample).unwrap();

    assert_eq!(first, second);
}

#[test]
fn test_sample_passes_intact_files() {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    for i in 0..20 {
        fs::write(root.join(format!("f{i}")), format!("content {i}")).unwrap();
    }
    run_hash(root, Mode::Create).unwrap();

    let mut ctx = context(&HashProvider);
    ctx.sample_rate = 1.0;
    let outcome = run(root, Mode::Sample, &ctx).unwrap();

    let (total, selected, failed) = sampled(&outcome);
    assert_eq!(total, 20);
    assert_eq!(selected, 20);
    assert!(failed.is_empty());
    assert!(!outcome.has_problems());
}

#[test]
fn test_sample_reports_corrupted_file() {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    fs::write(root.join("a"), "good").unwrap();
    fs::write(root.join("b"), "good").unwrap();
    run_hash(root, Mode::Create).unwrap();
    fs::write(root.join("b"), "evil").unwrap();

    let mut ctx = context(&HashProvider);
    ctx.sample_rate = 1.0;
    let outcome = run(root, Mode::Sample, &ctx).unwrap();

    let (_, _, failed) = sampled(&outcome);
    assert_eq!(failed, ["./b".to_string()]);
    // Sampling never proposes a candidate.
    assert!(!ManifestStore::new(root).has_candidate());
}

#[test]
fn test_sample_of_empty_manifest() {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    run_hash(root, Mode::Create).unwrap();

    let outcome = run_hash(root, Mode::Sample).unwrap();

    assert_eq!(sampled(&outcome), (0, 0, &[][..]));
    assert!(!outcome.has_problems());
}

#[test]
fn test_review_flags_newer_file() {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    fs::write(root.join("old"), "1").unwrap();
    run_hash(root, Mode::Create).unwrap();

    set_file_mtime(root.join("old"), FileTime::from_unix_time(1_000_000_000, 0)).unwrap();
    set_file_mtime(root.join(".hashcheck"), FileTime::from_unix_time(1_500_000_000, 0))
        .unwrap();
    fs::write(root.join("recent"), "2").unwrap();

    let outcome = run_hash(root, Mode::Review).unwrap();

    match &outcome.report {
        OperationReport::Reviewed { newer, .. } => {
            assert_eq!(newer.as_deref(), Some("./recent"));
        }
        other => panic!("Expected Reviewed report, got {:?}", other),
    }
    assert!(outcome.pending_review());
    assert!(!outcome.has_problems());
    assert!(!ManifestStore::new(root).has_candidate());
}

#[test]
fn test_review_clean_when_nothing_newer() {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    fs::write(root.join("a"), "1").unwrap();
    run_hash(root, Mode::Create).unwrap();

    set_file_mtime(root.join("a"), FileTime::from_unix_time(1_000_000_000, 0)).unwrap();
    // Changing content without touching the mtime goes unnoticed.
    fs::write(root.join("a"), "2").unwrap();
    set_file_mtime(root.join("a"), FileTime::from_unix_time(1_000_000_000, 0)).unwrap();

    let outcome = run_hash(root, Mode::Review).unwrap();

    assert!(!outcome.pending_review());
    assert!(committed(root).contains("./a"));
}

#[test]
fn test_review_requires_manifest() {
    let temp = TempDir::new().unwrap();
    let result = run_hash(temp.path(), Mode::Review);
    assert!(matches!(result, Err(WorkflowError::NotInitialized(_))));
}
