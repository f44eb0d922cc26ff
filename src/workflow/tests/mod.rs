use super::*;
use crate::backup::AssumeYes;
use crate::manifest::Record;
use crate::record::{HashProvider, MetadataProvider};
use std::fs;
use tempfile::TempDir;

fn context(provider: &dyn RecordProvider) -> Context<'_> {
    Context {
        provider,
        sample_rate: 0.01,
        sample_seed: Some(1),
        subset_list: None,
        confirm: &AssumeYes,
        interrupt: Interrupt::detached(),
    }
}

fn run_hash(dir: &Path, mode: Mode) -> Result<DirectoryOutcome, WorkflowError> {
    run(dir, mode, &context(&HashProvider))
}

fn committed(dir: &Path) -> Manifest {
    ManifestStore::new(dir).load().unwrap()
}

fn verified_diff(outcome: &DirectoryOutcome) -> &DiffResult {
    match &outcome.report {
        OperationReport::Verified { diff, .. } => diff,
        other => panic!("Expected Verified report, got {:?}", other),
    }
}

mod accept_and_update;
mod sample_and_review;
