//! One-way synchronization of a primary directory into its backup peer.
//!
//! The peer is named by `.hashcheck.backup` in the primary. Its manifest is
//! diffed against the primary's committed manifest; after confirmation, lost
//! files are deleted from the peer, added and changed files are copied over,
//! and finally the manifest itself is copied so both sides match byte for
//! byte.

use crate::diff::{DiffError, DiffResult, compare};
use crate::interrupt::{Interrupt, Interrupted};
use crate::manifest::{Manifest, ManifestError, ManifestStore};
use filetime::{FileTime, set_file_mtime};
use std::io::{BufRead, ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub const BACKUP_POINTER_FILENAME: &str = ".hashcheck.backup";

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("No backup pointer ({BACKUP_POINTER_FILENAME}) in {0}")]
    MissingPointer(PathBuf),
    #[error("Backup pointer in {dir} is not an absolute path: {target:?}")]
    RelativePointer { dir: PathBuf, target: String },
    #[error("Backup target is not a directory: {0}")]
    PeerNotDirectory(PathBuf),
    #[error("Backup target {0} is the primary directory itself")]
    SamePeer(PathBuf),
    #[error("No manifest in backup target {0}")]
    MissingPeerManifest(PathBuf),
    #[error("Invalid manifest in backup target: {0}")]
    PeerManifest(ManifestError),
    #[error("Failed to copy {path}: {source}")]
    Copy {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to delete {path}: {source}")]
    Delete {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("IO error: {0}")]
    Io(std::io::Error),
    #[error(transparent)]
    Diff(#[from] DiffError),
    #[error(transparent)]
    Interrupted(#[from] Interrupted),
}

/// Blocking yes/no gate in front of any change to the peer.
pub trait Confirm {
    fn confirm(&self, peer: &Path, diff: &DiffResult) -> std::io::Result<bool>;
}

/// Lists the pending changes on stderr and reads an answer from stdin.
pub struct StdinConfirm;

impl Confirm for StdinConfirm {
    fn confirm(&self, peer: &Path, diff: &DiffResult) -> std::io::Result<bool> {
        let mut stderr = std::io::stderr().lock();
        writeln!(stderr, "Backup target {} differs:", peer.display())?;
        for (path, change) in diff.entries() {
            writeln!(stderr, "  {:<2} {}", crate::report::change_code(change), path)?;
        }
        write!(
            stderr,
            "Copy {} and delete {} file(s) in {}? [y/N] ",
            diff.added.len() + diff.changed.len(),
            diff.lost.len(),
            peer.display()
        )?;
        stderr.flush()?;

        let mut answer = String::new();
        std::io::stdin().lock().read_line(&mut answer)?;
        Ok(matches!(
            answer.trim().to_ascii_lowercase().as_str(),
            "y" | "yes"
        ))
    }
}

/// Confirms everything (`--yes`).
pub struct AssumeYes;

impl Confirm for AssumeYes {
    fn confirm(&self, peer: &Path, _diff: &DiffResult) -> std::io::Result<bool> {
        info!("Synchronizing {} without confirmation", peer.display());
        Ok(true)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackupOutcome {
    InSync { peer: PathBuf },
    /// Not an error: the operator chose not to touch the peer.
    Declined { peer: PathBuf, diff: DiffResult },
    Synced { peer: PathBuf, diff: DiffResult },
}

/// Reads and validates the backup pointer of `dir`.
pub fn read_pointer(dir: &Path) -> Result<PathBuf, SyncError> {
    let pointer = dir.join(BACKUP_POINTER_FILENAME);
    let content = std::fs::read_to_string(&pointer).map_err(|e| {
        if e.kind() == ErrorKind::NotFound {
            SyncError::MissingPointer(dir.to_path_buf())
        } else {
            SyncError::Io(e)
        }
    })?;

    let target = content.lines().next().unwrap_or("").trim_end();
    if target.is_empty() {
        return Err(SyncError::MissingPointer(dir.to_path_buf()));
    }

    let peer = PathBuf::from(target);
    if !peer.is_absolute() {
        return Err(SyncError::RelativePointer {
            dir: dir.to_path_buf(),
            target: target.to_string(),
        });
    }
    if !peer.is_dir() {
        return Err(SyncError::PeerNotDirectory(peer));
    }

    let same = match (dir.canonicalize(), peer.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    };
    if same {
        return Err(SyncError::SamePeer(peer));
    }

    Ok(peer)
}

/// Brings the peer named by `primary`'s pointer in line with `local`.
///
/// `local` must be the parsed form of `primary`'s committed manifest.
pub fn synchronize(
    primary: &ManifestStore,
    local: &Manifest,
    confirm: &dyn Confirm,
    interrupt: &Interrupt,
) -> Result<BackupOutcome, SyncError> {
    let peer_dir = read_pointer(primary.dir())?;
    let peer = ManifestStore::new(&peer_dir);

    let peer_manifest = peer.load().map_err(|e| match e {
        ManifestError::Missing(_) => SyncError::MissingPeerManifest(peer_dir.clone()),
        other => SyncError::PeerManifest(other),
    })?;

    let diff = compare(&peer_manifest, local)?;
    if diff.is_empty() {
        // Equal entries can still be written differently (unsorted, say).
        let primary_bytes = std::fs::read(primary.manifest_path()).map_err(SyncError::Io)?;
        let peer_bytes = std::fs::read(peer.manifest_path()).map_err(SyncError::Io)?;
        if primary_bytes != peer_bytes {
            interrupt.check()?;
            copy_file(&primary.manifest_path(), &peer.manifest_path())?;
            info!("Rewrote manifest of {} to match the primary", peer_dir.display());
        }
        info!("Backup {} is in sync", peer_dir.display());
        return Ok(BackupOutcome::InSync { peer: peer_dir });
    }

    if !confirm.confirm(&peer_dir, &diff).map_err(SyncError::Io)? {
        info!("Backup of {} cancelled", primary.dir().display());
        return Ok(BackupOutcome::Declined {
            peer: peer_dir,
            diff,
        });
    }

    for path in &diff.lost {
        interrupt.check()?;
        let target = peer_dir.join(path);
        match std::fs::remove_file(&target) {
            Ok(()) => debug!("Deleted {}", target.display()),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!("{} was already absent", target.display())
            }
            Err(e) => {
                return Err(SyncError::Delete {
                    path: target,
                    source: e,
                });
            }
        }
    }

    for path in diff.added.iter().chain(&diff.changed) {
        interrupt.check()?;
        copy_file(&primary.dir().join(path), &peer_dir.join(path))?;
    }

    interrupt.check()?;
    copy_file(&primary.manifest_path(), &peer.manifest_path())?;

    if peer
        .discard_candidate()
        .map_err(SyncError::PeerManifest)?
    {
        warn!("Removed stale candidate in {}", peer_dir.display());
    }

    info!(
        "Backup {}: copied {}, deleted {}",
        peer_dir.display(),
        diff.added.len() + diff.changed.len(),
        diff.lost.len()
    );

    Ok(BackupOutcome::Synced {
        peer: peer_dir,
        diff,
    })
}

/// Copies `src` to `dest` through a temporary file next to `dest`, keeping
/// permissions and modification time so metadata-mode fingerprints carry
/// over.
fn copy_file(src: &Path, dest: &Path) -> Result<(), SyncError> {
    let copy_error = |source: std::io::Error| SyncError::Copy {
        path: src.to_path_buf(),
        source,
    };

    let parent = dest.parent().unwrap_or(Path::new("."));
    std::fs::create_dir_all(parent).map_err(copy_error)?;

    let metadata = std::fs::metadata(src).map_err(copy_error)?;
    let mut reader = std::fs::File::open(src).map_err(copy_error)?;

    let mut temp_file = tempfile::Builder::new()
        .prefix(".hashcheck-tmp")
        .tempfile_in(parent)
        .map_err(copy_error)?;

    std::io::copy(&mut reader, &mut temp_file).map_err(copy_error)?;
    temp_file.as_file().sync_all().map_err(copy_error)?;

    std::fs::set_permissions(temp_file.path(), metadata.permissions()).map_err(copy_error)?;
    set_file_mtime(
        temp_file.path(),
        FileTime::from_last_modification_time(&metadata),
    )
    .map_err(copy_error)?;

    temp_file.persist(dest).map_err(|e| copy_error(e.error))?;
    debug!("Copied {} to {}", src.display(), dest.display());

    Ok(())
}
