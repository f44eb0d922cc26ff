use crate::backup::{self, BackupOutcome, Confirm, SyncError};
use crate::diff::{DiffError, DiffResult, compare};
use crate::interrupt::{Interrupt, Interrupted};
use crate::manifest::{Manifest, ManifestError, ManifestStore};
use crate::record::{RecordError, RecordProvider};
use crate::tree::{self, TreeError};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{info, warn};

pub const SUBSET_LIST_FILENAME: &str = ".hashcheck.subset";

#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("Manifest error: {0}")]
    Manifest(#[from] ManifestError),
    #[error("Record error: {0}")]
    Record(#[from] RecordError),
    #[error("Enumeration error: {0}")]
    Tree(#[from] TreeError),
    #[error(transparent)]
    Diff(#[from] DiffError),
    #[error("Backup error: {0}")]
    Sync(#[from] SyncError),
    #[error(transparent)]
    Interrupted(#[from] Interrupted),
    #[error("Not initialized: no manifest in {0} (use hashcheck create to initialize)")]
    NotInitialized(PathBuf),
    #[error("Already initialized: {0} has a manifest (use hashcheck expand or update instead)")]
    AlreadyExists(PathBuf),
    #[error("No candidate manifest in {0} (run verify, subset or update first)")]
    NoCandidate(PathBuf),
    #[error("Pending candidate manifest in {0} (run hashcheck accept first)")]
    PendingCandidate(PathBuf),
    #[error("Cannot read subset list {path}: {source}")]
    MissingSubsetList {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl WorkflowError {
    /// Whether this is a "can't happen" failure rather than a data problem.
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            WorkflowError::Diff(DiffError::InternalConsistency)
                | WorkflowError::Sync(SyncError::Diff(DiffError::InternalConsistency))
        )
    }

    pub fn is_interrupted(&self) -> bool {
        matches!(
            self,
            WorkflowError::Interrupted(_)
                | WorkflowError::Record(RecordError::Interrupted(_))
                | WorkflowError::Sync(SyncError::Interrupted(_))
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Create,
    Expand,
    Verify,
    Subset,
    Sample,
    Accept,
    Review,
    Update,
    Backup,
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Mode::Create => "create",
            Mode::Expand => "expand",
            Mode::Verify => "verify",
            Mode::Subset => "subset",
            Mode::Sample => "sample",
            Mode::Accept => "accept",
            Mode::Review => "review",
            Mode::Update => "update",
            Mode::Backup => "backup",
        };
        f.write_str(name)
    }
}

/// Everything an operation needs besides the directory.
pub struct Context<'a> {
    pub provider: &'a dyn RecordProvider,
    pub sample_rate: f64,
    /// Fixed seed for `sample`; a fresh random selection otherwise.
    pub sample_seed: Option<u64>,
    /// Overrides `<dir>/.hashcheck.subset`.
    pub subset_list: Option<PathBuf>,
    pub confirm: &'a dyn Confirm,
    pub interrupt: Interrupt,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationReport {
    Created {
        files: usize,
        bytes: u64,
    },
    Expanded {
        added: Vec<String>,
    },
    Updated {
        added: Vec<String>,
        lost: Vec<String>,
    },
    /// Result of `verify` and `subset`. A non-empty diff means a candidate
    /// was left pending.
    Verified {
        checked: usize,
        diff: DiffResult,
    },
    Sampled {
        total: usize,
        selected: usize,
        failed: Vec<String>,
    },
    Accepted,
    Reviewed {
        manifest_mtime: SystemTime,
        newer: Option<String>,
    },
    Backup(BackupOutcome),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryOutcome {
    pub dir: PathBuf,
    pub mode: Mode,
    pub report: OperationReport,
}

impl DirectoryOutcome {
    /// Changed or lost files, or failed samples.
    pub fn has_problems(&self) -> bool {
        match &self.report {
            OperationReport::Verified { diff, .. } => diff.has_damage(),
            OperationReport::Updated { lost, .. } => !lost.is_empty(),
            OperationReport::Sampled { failed, .. } => !failed.is_empty(),
            _ => false,
        }
    }

    /// A candidate awaits `accept`.
    pub fn pending_accept(&self) -> bool {
        match &self.report {
            OperationReport::Verified { diff, .. } => !diff.is_empty(),
            OperationReport::Updated { lost, .. } => !lost.is_empty(),
            _ => false,
        }
    }

    pub fn pending_review(&self) -> bool {
        matches!(
            &self.report,
            OperationReport::Reviewed { newer: Some(_), .. }
        )
    }
}

/// Runs `mode` against one directory.
pub fn run(dir: &Path, mode: Mode, ctx: &Context<'_>) -> Result<DirectoryOutcome, WorkflowError> {
    let store = ManifestStore::new(dir);

    let report = match mode {
        Mode::Create => create(&store, ctx)?,
        Mode::Expand => expand(&store, ctx)?,
        Mode::Update => update(&store, ctx)?,
        Mode::Verify => verify(&store, ctx)?,
        Mode::Subset => subset(&store, ctx)?,
        Mode::Sample => sample(&store, ctx)?,
        Mode::Accept => accept(&store)?,
        Mode::Review => review(&store)?,
        Mode::Backup => backup(&store, ctx)?,
    };

    Ok(DirectoryOutcome {
        dir: dir.to_path_buf(),
        mode,
        report,
    })
}

fn load_committed(store: &ManifestStore) -> Result<Manifest, WorkflowError> {
    store.load().map_err(|e| match e {
        ManifestError::Missing(dir) => WorkflowError::NotInitialized(dir),
        other => WorkflowError::Manifest(other),
    })
}

fn discard_stale_candidate(store: &ManifestStore) -> Result<(), WorkflowError> {
    if store.discard_candidate()? {
        warn!(
            "Discarded earlier candidate in {} without accepting it",
            store.dir().display()
        );
    }
    Ok(())
}

fn create(store: &ManifestStore, ctx: &Context<'_>) -> Result<OperationReport, WorkflowError> {
    if store.exists() {
        return Err(WorkflowError::AlreadyExists(store.dir().to_path_buf()));
    }
    discard_stale_candidate(store)?;

    let paths = tree::enumerate_tree(store.dir())?;
    let manifest = ctx.provider.records(store.dir(), &paths, &ctx.interrupt)?;
    store.commit(&manifest)?;

    info!(
        "Created manifest for {} with {} files",
        store.dir().display(),
        manifest.len()
    );

    Ok(OperationReport::Created {
        files: manifest.len(),
        bytes: manifest.total_size(),
    })
}

/// Records tree files missing from `committed` and commits the result.
///
/// Existing entries are not re-fingerprinted. Returns the added paths.
fn record_additions(
    store: &ManifestStore,
    committed: &mut Manifest,
    tree_paths: &BTreeSet<String>,
    ctx: &Context<'_>,
) -> Result<Vec<String>, WorkflowError> {
    let missing: BTreeSet<String> = tree_paths
        .iter()
        .filter(|p| !committed.contains(p))
        .cloned()
        .collect();

    if missing.is_empty() {
        return Ok(Vec::new());
    }

    let fresh = ctx.provider.records(store.dir(), &missing, &ctx.interrupt)?;
    let added: Vec<String> = fresh.paths().map(str::to_string).collect();
    if added.is_empty() {
        return Ok(added);
    }
    committed.merge(fresh);
    store.commit(committed)?;

    info!(
        "Added {} files to manifest of {}",
        added.len(),
        store.dir().display()
    );

    Ok(added)
}

fn expand(store: &ManifestStore, ctx: &Context<'_>) -> Result<OperationReport, WorkflowError> {
    let mut committed = load_committed(store)?;
    if store.has_candidate() {
        warn!(
            "{} has a pending candidate; it does not include files added now",
            store.dir().display()
        );
    }

    let tree_paths = tree::enumerate_tree(store.dir())?;
    let added = record_additions(store, &mut committed, &tree_paths, ctx)?;

    Ok(OperationReport::Expanded { added })
}

/// `expand`, plus a candidate without the entries whose files are gone.
///
/// Entries kept in the candidate are passed through without being
/// re-fingerprinted, so corruption of surviving files goes unnoticed here.
fn update(store: &ManifestStore, ctx: &Context<'_>) -> Result<OperationReport, WorkflowError> {
    let mut committed = load_committed(store)?;
    discard_stale_candidate(store)?;

    let tree_paths = tree::enumerate_tree(store.dir())?;
    let added = record_additions(store, &mut committed, &tree_paths, ctx)?;

    let lost: Vec<String> = committed
        .paths()
        .filter(|p| !tree_paths.contains(*p))
        .map(str::to_string)
        .collect();

    if !lost.is_empty() {
        let mut candidate = committed.clone();
        for path in &lost {
            candidate.remove(path);
        }
        ctx.interrupt.check()?;
        store.save_candidate(&candidate)?;
        warn!(
            "{} files lost from {}; candidate awaits accept",
            lost.len(),
            store.dir().display()
        );
    }

    Ok(OperationReport::Updated { added, lost })
}

/// Compares `candidate` against `committed`, keeping the candidate only if
/// they differ.
fn settle_candidate(
    store: &ManifestStore,
    committed: &Manifest,
    candidate: &Manifest,
    ctx: &Context<'_>,
) -> Result<DiffResult, WorkflowError> {
    let diff = compare(committed, candidate)?;
    if !diff.is_empty() {
        ctx.interrupt.check()?;
        store.save_candidate(candidate)?;
        info!(
            "{}: {} added, {} changed, {} lost; candidate awaits accept",
            store.dir().display(),
            diff.added.len(),
            diff.changed.len(),
            diff.lost.len()
        );
    }
    Ok(diff)
}

fn verify(store: &ManifestStore, ctx: &Context<'_>) -> Result<OperationReport, WorkflowError> {
    let committed = load_committed(store)?;
    discard_stale_candidate(store)?;

    let tree_paths = tree::enumerate_tree(store.dir())?;
    let candidate = ctx.provider.records(store.dir(), &tree_paths, &ctx.interrupt)?;
    let diff = settle_candidate(store, &committed, &candidate, ctx)?;

    Ok(OperationReport::Verified {
        checked: candidate.len(),
        diff,
    })
}

/// Reads a subset list, normalizing entries to manifest path form.
pub fn read_subset_list(path: &Path) -> Result<BTreeSet<String>, WorkflowError> {
    let content = std::fs::read_to_string(path).map_err(|source| {
        WorkflowError::MissingSubsetList {
            path: path.to_path_buf(),
            source,
        }
    })?;

    let mut paths = BTreeSet::new();
    for line in content.split_terminator('\n') {
        if line.is_empty() {
            continue;
        }
        let Some(path) = tree::manifest_path(Path::new(line)) else {
            warn!("Ignoring {:?} in subset list: not a path inside the tree", line);
            continue;
        };
        let excluded = Path::new(&path)
            .file_name()
            .is_none_or(tree::is_excluded);
        if excluded {
            warn!("Ignoring {} in subset list: not a recordable name", path);
            continue;
        }
        paths.insert(path);
    }
    Ok(paths)
}

fn subset(store: &ManifestStore, ctx: &Context<'_>) -> Result<OperationReport, WorkflowError> {
    let committed = load_committed(store)?;

    let list_path = ctx
        .subset_list
        .clone()
        .unwrap_or_else(|| store.dir().join(SUBSET_LIST_FILENAME));
    let selected = read_subset_list(&list_path)?;

    discard_stale_candidate(store)?;

    let fresh = ctx.provider.records(store.dir(), &selected, &ctx.interrupt)?;

    let mut candidate = committed.clone();
    for path in &selected {
        candidate.remove(path);
    }
    candidate.merge(fresh);

    let diff = settle_candidate(store, &committed, &candidate, ctx)?;

    Ok(OperationReport::Verified {
        checked: selected.len(),
        diff,
    })
}

fn sample(store: &ManifestStore, ctx: &Context<'_>) -> Result<OperationReport, WorkflowError> {
    let committed = load_committed(store)?;

    let mut rng = match ctx.sample_seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let selected: BTreeSet<String> = committed
        .paths()
        .filter(|_| rng.gen_bool(ctx.sample_rate))
        .map(str::to_string)
        .collect();

    let fresh = ctx.provider.records(store.dir(), &selected, &ctx.interrupt)?;

    let failed: Vec<String> = selected
        .iter()
        .filter(|path| fresh.get(path) != committed.get(path))
        .cloned()
        .collect();

    info!(
        "Sampled {} of {} files in {}: {} passed, {} failed",
        selected.len(),
        committed.len(),
        store.dir().display(),
        selected.len() - failed.len(),
        failed.len()
    );

    Ok(OperationReport::Sampled {
        total: committed.len(),
        selected: selected.len(),
        failed,
    })
}

fn accept(store: &ManifestStore) -> Result<OperationReport, WorkflowError> {
    if !store.has_candidate() {
        return Err(WorkflowError::NoCandidate(store.dir().to_path_buf()));
    }
    // A damaged candidate must not replace a good manifest.
    store.load_candidate()?;

    if !store.promote_candidate()? {
        return Err(WorkflowError::NoCandidate(store.dir().to_path_buf()));
    }
    info!("Accepted candidate in {}", store.dir().display());

    Ok(OperationReport::Accepted)
}

/// Flags trees with files newer than their manifest. Nothing is
/// fingerprinted, so a touched but identical file is a false positive and
/// corruption that leaves the mtime alone is invisible.
fn review(store: &ManifestStore) -> Result<OperationReport, WorkflowError> {
    let manifest_mtime = store.committed_mtime().map_err(|e| match e {
        ManifestError::Missing(dir) => WorkflowError::NotInitialized(dir),
        other => WorkflowError::Manifest(other),
    })?;

    let newer = tree::find_newer_than(store.dir(), manifest_mtime)?;
    if let Some(path) = &newer {
        info!(
            "{} needs verify: {} is newer than its manifest",
            store.dir().display(),
            path
        );
    }

    Ok(OperationReport::Reviewed {
        manifest_mtime,
        newer,
    })
}

fn backup(store: &ManifestStore, ctx: &Context<'_>) -> Result<OperationReport, WorkflowError> {
    let committed = load_committed(store)?;
    if store.has_candidate() {
        return Err(WorkflowError::PendingCandidate(store.dir().to_path_buf()));
    }

    let outcome = backup::synchronize(store, &committed, ctx.confirm, &ctx.interrupt)?;
    Ok(OperationReport::Backup(outcome))
}

#[cfg(test)]
mod tests;

