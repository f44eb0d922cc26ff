//! Finds files recorded with the same fingerprint and size across several
//! manifests.

use crate::manifest::{Manifest, ManifestError, ManifestStore};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// A file whose fingerprint and size equal those of a file seen earlier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Match {
    pub fingerprint: String,
    pub size: u64,
    pub path: PathBuf,
    pub earlier: PathBuf,
}

#[derive(Debug, Default)]
pub struct DuplicateFinder {
    seen: HashMap<String, Vec<(u64, PathBuf)>>,
}

impl DuplicateFinder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds every entry of `manifest` (rooted at `dir`) and returns the
    /// matches against entries added before it, at most one per entry.
    ///
    /// Zero-length files all share a fingerprint and are ignored.
    pub fn scan(&mut self, dir: &Path, manifest: &Manifest) -> Vec<Match> {
        let mut matches = Vec::new();

        for (path, record) in manifest.iter() {
            if record.size == 0 {
                continue;
            }
            let full = dir.join(path.strip_prefix("./").unwrap_or(path));

            let candidates = self.seen.entry(record.fingerprint.clone()).or_default();
            if let Some((_, earlier)) = candidates.iter().find(|(size, _)| *size == record.size) {
                matches.push(Match {
                    fingerprint: record.fingerprint.clone(),
                    size: record.size,
                    path: full.clone(),
                    earlier: earlier.clone(),
                });
            }
            candidates.push((record.size, full));
        }

        matches
    }
}

/// What scanning one directory produced.
#[derive(Debug)]
pub enum DirectoryScan {
    Scanned { dir: PathBuf, matches: Vec<Match> },
    NoManifest { dir: PathBuf },
    Unreadable { dir: PathBuf, error: ManifestError },
}

/// Scans the committed manifest of each directory in order.
///
/// Directories without a readable manifest are reported and skipped.
pub fn find_duplicates(dirs: &[PathBuf]) -> Vec<DirectoryScan> {
    let mut finder = DuplicateFinder::new();

    dirs.iter()
        .map(|dir| match ManifestStore::new(dir).load() {
            Ok(manifest) => {
                let matches = finder.scan(dir, &manifest);
                debug!(
                    "{}: {} entries, {} matches",
                    dir.display(),
                    manifest.len(),
                    matches.len()
                );
                DirectoryScan::Scanned {
                    dir: dir.clone(),
                    matches,
                }
            }
            Err(ManifestError::Missing(_)) => DirectoryScan::NoManifest { dir: dir.clone() },
            Err(error) => DirectoryScan::Unreadable {
                dir: dir.clone(),
                error,
            },
        })
        .collect()
}
