//! Fingerprinting strategies.
//!
//! A run uses exactly one [`RecordProvider`]: content hashing (SHA-256 of the
//! file bytes) or metadata (modification time in whole seconds). Metadata
//! mode is fast but blind to in-place rewrites that keep size and mtime;
//! hash mode catches those.

use crate::interrupt::{Interrupt, Interrupted};
use crate::manifest::{Manifest, ManifestError, Record};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    #[error("IO error: {0}")]
    Io(std::io::Error),
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),
    #[error("File modified during checksumming: {0}")]
    ConcurrentModification(PathBuf),
    #[error(transparent)]
    Manifest(#[from] ManifestError),
    #[error(transparent)]
    Interrupted(#[from] Interrupted),
}

fn io_error(e: std::io::Error, path: &Path) -> RecordError {
    if e.kind() == ErrorKind::PermissionDenied {
        RecordError::PermissionDenied(path.to_path_buf())
    } else {
        RecordError::Io(e)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordMode {
    Hash,
    Metadata,
}

impl std::fmt::Display for RecordMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecordMode::Hash => f.write_str("hash"),
            RecordMode::Metadata => f.write_str("metadata"),
        }
    }
}

pub trait RecordProvider {
    fn mode(&self) -> RecordMode;

    /// Records the file at `root/path`, or `None` if it no longer exists.
    ///
    /// `path` is in manifest form (`./a/b`). Long reads give up early once
    /// `interrupt` fires.
    fn record(
        &self,
        root: &Path,
        path: &str,
        interrupt: &Interrupt,
    ) -> Result<Option<Record>, RecordError>;

    /// Records every path that still exists as a regular file.
    fn records(
        &self,
        root: &Path,
        paths: &BTreeSet<String>,
        interrupt: &Interrupt,
    ) -> Result<Manifest, RecordError> {
        let mut manifest = Manifest::new();
        for path in paths {
            interrupt.check()?;
            match self.record(root, path, interrupt)? {
                Some(record) => manifest.insert(path.clone(), record)?,
                None => debug!("{} vanished before it could be recorded", path),
            }
        }
        Ok(manifest)
    }
}

pub fn provider_for(mode: RecordMode) -> Box<dyn RecordProvider> {
    match mode {
        RecordMode::Hash => Box::new(HashProvider),
        RecordMode::Metadata => Box::new(MetadataProvider),
    }
}

/// Returns the metadata of a regular file, `None` if absent or not a file.
fn file_metadata(path: &Path) -> Result<Option<std::fs::Metadata>, RecordError> {
    match std::fs::symlink_metadata(path) {
        Ok(m) if m.is_file() => Ok(Some(m)),
        Ok(_) => Ok(None),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(io_error(e, path)),
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct HashProvider;

impl RecordProvider for HashProvider {
    fn mode(&self) -> RecordMode {
        RecordMode::Hash
    }

    fn record(
        &self,
        root: &Path,
        path: &str,
        interrupt: &Interrupt,
    ) -> Result<Option<Record>, RecordError> {
        let absolute = root.join(path);
        if file_metadata(&absolute)?.is_none() {
            return Ok(None);
        }
        let checksum = checksum_file(&absolute, interrupt)?;
        Ok(Some(Record {
            fingerprint: checksum.sha256,
            size: checksum.size,
        }))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MetadataProvider;

impl RecordProvider for MetadataProvider {
    fn mode(&self) -> RecordMode {
        RecordMode::Metadata
    }

    fn record(
        &self,
        root: &Path,
        path: &str,
        _interrupt: &Interrupt,
    ) -> Result<Option<Record>, RecordError> {
        let absolute = root.join(path);
        let Some(metadata) = file_metadata(&absolute)? else {
            return Ok(None);
        };
        let mtime = metadata.modified().map_err(RecordError::Io)?;
        Ok(Some(Record {
            fingerprint: unix_seconds(mtime).to_string(),
            size: metadata.len(),
        }))
    }
}

/// Whole seconds since the epoch, negative for earlier times.
fn unix_seconds(time: SystemTime) -> i64 {
    match time.duration_since(UNIX_EPOCH) {
        Ok(d) => d.as_secs() as i64,
        Err(e) => -(e.duration().as_secs_f64().ceil() as i64),
    }
}

pub struct FileChecksum {
    /// Hex encoded.
    pub sha256: String,
    pub size: u64,
}

/// Computes the SHA-256 checksum of a file with concurrent modification
/// detection.
///
/// The modification time is sampled before and after reading; a difference
/// fails with `ConcurrentModification`. Its absence is *not* a guarantee that
/// the file was left alone. `interrupt` is polled between buffer reads.
pub fn checksum_file(path: &Path, interrupt: &Interrupt) -> Result<FileChecksum, RecordError> {
    debug!("Checksumming {}", path.display());

    let metadata_before = std::fs::metadata(path).map_err(|e| io_error(e, path))?;
    let mtime_before = metadata_before.modified().map_err(RecordError::Io)?;

    let mut file = File::open(path).map_err(|e| io_error(e, path))?;
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192];

    loop {
        interrupt.check()?;
        let bytes_read = file.read(&mut buffer).map_err(RecordError::Io)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    let metadata_after = std::fs::metadata(path).map_err(RecordError::Io)?;
    let mtime_after = metadata_after.modified().map_err(RecordError::Io)?;

    if mtime_before != mtime_after {
        return Err(RecordError::ConcurrentModification(path.to_path_buf()));
    }

    let sha256 = format!("{:x}", hasher.finalize());

    debug!("Checksum of {} is {}", path.display(), sha256);

    Ok(FileChecksum {
        sha256,
        size: metadata_after.len(),
    })
}
