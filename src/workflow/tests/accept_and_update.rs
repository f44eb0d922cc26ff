use super::*;

#[test]
fn test_deleted_file_verify_then_accept() {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    fs::write(root.join("f"), "doomed").unwrap();
    fs::write(root.join("g"), "stays").unwrap();
    run_hash(root, Mode::Create).unwrap();

    fs::remove_file(root.join("f")).unwrap();

    let outcome = run_hash(root, Mode::Verify).unwrap();
    assert_eq!(verified_diff(&outcome).lost, vec!["./f"]);
    assert!(outcome.has_problems());
    assert!(outcome.pending_accept());
    // Not yet accepted: the committed manifest still lists F.
    assert!(committed(root).contains("./f"));

    let outcome = run_hash(root, Mode::Accept).unwrap();
    assert_eq!(outcome.report, OperationReport::Accepted);

    let manifest = committed(root);
    assert!(!manifest.contains("./f"));
    assert!(manifest.contains("./g"));
    assert!(!ManifestStore::new(root).has_candidate());

    let outcome = run_hash(root, Mode::Verify).unwrap();
    assert!(verified_diff(&outcome).is_empty());
}

#[test]
fn test_accept_without_candidate() {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    run_hash(root, Mode::Create).unwrap();

    let result = run_hash(root, Mode::Accept);

    assert!(matches!(result, Err(WorkflowError::NoCandidate(_))));
}

#[test]
fn test_accept_rejects_unparseable_candidate() {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    fs::write(root.join("a"), "1").unwrap();
    run_hash(root, Mode::Create).unwrap();
    let before = fs::read(root.join(".hashcheck")).unwrap();

    fs::write(root.join(".hashcheck.new"), "not a manifest line\n").unwrap();

    let result = run_hash(root, Mode::Accept);

    assert!(matches!(result, Err(WorkflowError::Manifest(_))));
    assert_eq!(fs::read(root.join(".hashcheck")).unwrap(), before);
}

#[test]
fn test_changed_file_accept_records_new_content() {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    fs::write(root.join("f"), "first").unwrap();
    run_hash(root, Mode::Create).unwrap();

    fs::write(root.join("f"), "second version").unwrap();
    let outcome = run_hash(root, Mode::Verify).unwrap();
    assert_eq!(verified_diff(&outcome).changed, vec!["./f"]);

    run_hash(root, Mode::Accept).unwrap();

    assert_eq!(committed(root).get("./f").unwrap().size, 14);
}

#[test]
fn test_update_commits_additions_and_proposes_removals() {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    fs::write(root.join("gone"), "bye").unwrap();
    fs::write(root.join("kept"), "hi").unwrap();
    run_hash(root, Mode::Create).unwrap();

    fs::remove_file(root.join("gone")).unwrap();
    fs::write(root.join("fresh"), "new").unwrap();

    let outcome = run_hash(root, Mode::Update).unwrap();

    assert_eq!(
        outcome.report,
        OperationReport::Updated {
            added: vec!["./fresh".to_string()],
            lost: vec!["./gone".to_string()],
        }
    );
    assert!(outcome.has_problems());
    assert!(outcome.pending_accept());

    // Additions land in the committed manifest right away.
    let manifest = committed(root);
    assert!(manifest.contains("./fresh"));
    assert!(manifest.contains("./gone"));

    let candidate = ManifestStore::new(root).load_candidate().unwrap();
    assert!(candidate.contains("./fresh"));
    assert!(candidate.contains("./kept"));
    assert!(!candidate.contains("./gone"));

    run_hash(root, Mode::Accept).unwrap();
    assert!(!committed(root).contains("./gone"));
}

#[test]
fn test_update_without_losses_leaves_no_candidate() {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    fs::write(root.join("a"), "1").unwrap();
    run_hash(root, Mode::Create).unwrap();
    fs::write(root.join("b"), "2").unwrap();

    let outcome = run_hash(root, Mode::Update).unwrap();

    assert!(!outcome.has_problems());
    assert!(!outcome.pending_accept());
    assert!(committed(root).contains("./b"));
    assert!(!ManifestStore::new(root).has_candidate());
}

#[test]
fn test_update_does_not_refingerprint_survivors() {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    fs::write(root.join("a"), "1").unwrap();
    fs::write(root.join("b"), "2").unwrap();
    run_hash(root, Mode::Create).unwrap();

    fs::write(root.join("a"), "corrupted").unwrap();
    fs::remove_file(root.join("b")).unwrap();

    run_hash(root, Mode::Update).unwrap();

    let candidate = ManifestStore::new(root).load_candidate().unwrap();
    assert_eq!(candidate.get("./a"), committed(root).get("./a"));
}

#[test]
fn test_interrupted_verify_keeps_committed_manifest() {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    fs::write(root.join("a"), "1").unwrap();
    run_hash(root, Mode::Create).unwrap();
    fs::write(root.join("a"), "changed").unwrap();
    let before = fs::read(root.join(".hashcheck")).unwrap();

    let ctx = context(&HashProvider);
    ctx.interrupt.trigger();
    let result = run(root, Mode::Verify, &ctx);

    assert!(result.as_ref().is_err_and(|e| e.is_interrupted()));
    assert_eq!(fs::read(root.join(".hashcheck")).unwrap(), before);
    assert!(!ManifestStore::new(root).has_candidate());
}

#[test]
fn test_accept_requires_no_manifest_rescan() {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    fs::write(root.join("a"), "1").unwrap();
    run_hash(root, Mode::Create).unwrap();
    fs::remove_file(root.join("a")).unwrap();
    run_hash(root, Mode::Verify).unwrap();

    // Files appearing after verify are not part of the accepted manifest.
    fs::write(root.join("late"), "x").unwrap();
    run_hash(root, Mode::Accept).unwrap();

    assert!(committed(root).is_empty());
}
