use crate::manifest::MANIFEST_FILENAME;
use crate::report;
use crate::workflow::{self, Context, DirectoryOutcome, Mode, WorkflowError};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),
    #[error("No {MANIFEST_FILENAME} files found under {0}")]
    NoManifests(PathBuf),
}

/// Turns command line directories into the list of directories to process.
///
/// With `find`, each directory is a root that is searched for manifests, and
/// every directory holding one becomes a target.
pub fn resolve_targets(dirs: &[PathBuf], find: bool) -> Result<Vec<PathBuf>, DiscoveryError> {
    for dir in dirs {
        if !dir.is_dir() {
            return Err(DiscoveryError::NotADirectory(dir.clone()));
        }
    }

    if !find {
        return Ok(dirs.to_vec());
    }

    let mut found = BTreeSet::new();
    for root in dirs {
        let discovered = discover(root);
        if discovered.is_empty() {
            return Err(DiscoveryError::NoManifests(root.clone()));
        }
        found.extend(discovered);
    }
    Ok(found.into_iter().collect())
}

fn discover(root: &Path) -> BTreeSet<PathBuf> {
    let mut dirs = BTreeSet::new();

    for entry in WalkDir::new(root).follow_links(false).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Skipping part of {} during discovery: {}", root.display(), e);
                continue;
            }
        };
        if entry.file_type().is_file()
            && entry.file_name() == MANIFEST_FILENAME
            && let Some(parent) = entry.path().parent()
        {
            dirs.insert(parent.to_path_buf());
        }
    }

    debug!("Found {} manifests under {}", dirs.len(), root.display());
    dirs
}

/// Directories sorted into the categories that decide the exit status.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub processed: usize,
    pub problems: Vec<PathBuf>,
    pub pending_accept: Vec<PathBuf>,
    pub pending_review: Vec<PathBuf>,
    /// Directories that hit an internal consistency error. Also listed under
    /// `problems`.
    pub internal: Vec<PathBuf>,
    pub interrupted: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchStatus {
    Clean,
    Pending,
    Problems,
}

impl BatchSummary {
    pub fn record_outcome(&mut self, outcome: &DirectoryOutcome) {
        if outcome.has_problems() {
            self.problems.push(outcome.dir.clone());
        }
        if outcome.pending_accept() {
            self.pending_accept.push(outcome.dir.clone());
        }
        if outcome.pending_review() {
            self.pending_review.push(outcome.dir.clone());
        }
    }

    pub fn record_failure(&mut self, dir: &Path, err: &WorkflowError) {
        self.problems.push(dir.to_path_buf());
        if err.is_internal() {
            self.internal.push(dir.to_path_buf());
        }
        if err.is_interrupted() {
            self.interrupted = true;
        }
    }

    pub fn status(&self) -> BatchStatus {
        if !self.problems.is_empty() || self.interrupted {
            BatchStatus::Problems
        } else if !self.pending_accept.is_empty() || !self.pending_review.is_empty() {
            BatchStatus::Pending
        } else {
            BatchStatus::Clean
        }
    }
}

/// Runs `mode` on each directory in turn. A failing directory does not stop
/// the batch; an interrupt does.
pub fn run_batch(dirs: &[PathBuf], mode: Mode, ctx: &Context<'_>) -> BatchSummary {
    let mut summary = BatchSummary::default();

    for dir in dirs {
        if ctx.interrupt.check().is_err() {
            warn!("Interrupted; {} directories not processed", dirs.len() - summary.processed);
            summary.interrupted = true;
            break;
        }
        summary.processed += 1;

        match workflow::run(dir, mode, ctx) {
            Ok(outcome) => {
                report::print_outcome(&outcome);
                summary.record_outcome(&outcome);
            }
            Err(err) => {
                report::print_failure(dir, mode, &err);
                summary.record_failure(dir, &err);
                if err.is_interrupted() {
                    break;
                }
            }
        }
    }

    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backup::AssumeYes;
    use crate::interrupt::Interrupt;
    use crate::record::HashProvider;
    use std::fs;
    use tempfile::TempDir;

    fn context() -> Context<'static> {
        Context {
            provider: &HashProvider,
            sample_rate: 0.01,
            sample_seed: Some(3),
            subset_list: None,
            confirm: &AssumeYes,
            interrupt: Interrupt::detached(),
        }
    }

    #[test]
    fn test_literal_targets_kept_in_order() {
        let temp = TempDir::new().unwrap();
        let b = temp.path().join("b");
        let a = temp.path().join("a");
        fs::create_dir(&a).unwrap();
        fs::create_dir(&b).unwrap();

        let targets = resolve_targets(&[b.clone(), a.clone()], false).unwrap();

        assert_eq!(targets, vec![b, a]);
    }

    #[test]
    fn test_literal_target_must_be_directory() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("file");
        fs::write(&file, "x").unwrap();

        let result = resolve_targets(&[file], false);

        assert!(matches!(result, Err(DiscoveryError::NotADirectory(_))));
    }

    #[test]
    fn test_find_discovers_nested_manifests() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        fs::create_dir_all(root.join("x/deep")).unwrap();
        fs::create_dir_all(root.join("y")).unwrap();
        fs::create_dir_all(root.join("z")).unwrap();
        fs::write(root.join("x/deep/.hashcheck"), "").unwrap();
        fs::write(root.join("y/.hashcheck"), "").unwrap();
        fs::write(root.join("z/not-a-manifest"), "").unwrap();

        let targets = resolve_targets(&[root.to_path_buf(), root.join("y")], true).unwrap();

        assert_eq!(targets, vec![root.join("x/deep"), root.join("y")]);
    }

    #[test]
    fn test_find_without_manifests() {
        let temp = TempDir::new().unwrap();
        let result = resolve_targets(&[temp.path().to_path_buf()], true);
        assert!(matches!(result, Err(DiscoveryError::NoManifests(_))));
    }

    #[test]
    fn test_batch_continues_past_failures() {
        let temp = TempDir::new().unwrap();
        let uninitialized = temp.path().join("a");
        let damaged = temp.path().join("b");
        let grown = temp.path().join("c");
        for dir in [&uninitialized, &damaged, &grown] {
            fs::create_dir(dir).unwrap();
        }
        let ctx = context();

        fs::write(damaged.join("f"), "1").unwrap();
        workflow::run(&damaged, Mode::Create, &ctx).unwrap();
        fs::remove_file(damaged.join("f")).unwrap();

        workflow::run(&grown, Mode::Create, &ctx).unwrap();
        fs::write(grown.join("new"), "n").unwrap();

        let dirs = vec![uninitialized.clone(), damaged.clone(), grown.clone()];
        let summary = run_batch(&dirs, Mode::Verify, &ctx);

        assert_eq!(summary.processed, 3);
        assert_eq!(summary.problems, vec![uninitialized, damaged.clone()]);
        assert_eq!(summary.pending_accept, vec![damaged, grown]);
        assert!(summary.internal.is_empty());
        assert_eq!(summary.status(), BatchStatus::Problems);
    }

    #[test]
    fn test_batch_stops_when_interrupted() {
        let temp = TempDir::new().unwrap();
        let ctx = context();
        workflow::run(temp.path(), Mode::Create, &ctx).unwrap();
        ctx.interrupt.trigger();

        let summary = run_batch(&[temp.path().to_path_buf()], Mode::Verify, &ctx);

        assert_eq!(summary.processed, 0);
        assert!(summary.interrupted);
        assert_eq!(summary.status(), BatchStatus::Problems);
    }

    #[test]
    fn test_status_levels() {
        let mut summary = BatchSummary::default();
        assert_eq!(summary.status(), BatchStatus::Clean);

        summary.pending_review.push(PathBuf::from("r"));
        assert_eq!(summary.status(), BatchStatus::Pending);

        summary.problems.push(PathBuf::from("p"));
        assert_eq!(summary.status(), BatchStatus::Problems);
    }
}
