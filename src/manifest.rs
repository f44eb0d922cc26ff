//! Line-oriented manifest files and their on-disk lifecycle.
//!
//! A manifest records `<fingerprint> <size> <path>` for every file of a tree,
//! one entry per line, sorted by path bytes. Each initialized directory holds
//! a committed manifest (`.hashcheck`) and, transiently, a candidate
//! (`.hashcheck.new`) proposing a replacement that awaits `accept`.

use crate::tree;
use std::collections::BTreeMap;
use std::collections::btree_map;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

pub const MANIFEST_FILENAME: &str = ".hashcheck";
pub const CANDIDATE_FILENAME: &str = ".hashcheck.new";

#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("IO error: {0}")]
    Io(std::io::Error),
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),
    #[error("No manifest found in {0}")]
    Missing(PathBuf),
    #[error("Malformed manifest line {line}: {reason}")]
    Parse { line: usize, reason: String },
    #[error("Path cannot be recorded in a manifest: {0:?}")]
    InvalidPath(String),
}

impl ManifestError {
    fn from_io(e: std::io::Error, path: &Path) -> Self {
        if e.kind() == ErrorKind::PermissionDenied {
            ManifestError::PermissionDenied(path.to_path_buf())
        } else {
            ManifestError::Io(e)
        }
    }
}

/// Whether `path` is a canonical manifest path: `./` followed by one or more
/// plain names joined by single slashes. Absolute paths, `..` and `.`
/// components, empty components and newlines are all rejected, so joining a
/// manifest path onto a directory never leaves that directory.
pub fn is_manifest_path(path: &str) -> bool {
    tree::manifest_path(Path::new(path)).as_deref() == Some(path)
}

/// The recorded state of one file, minus its path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub fingerprint: String,
    pub size: u64,
}

/// Manifest entries keyed by path.
///
/// `BTreeMap<String, _>` orders keys by their UTF-8 bytes, which is exactly
/// the locale-independent order the file format commits to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    entries: BTreeMap<String, Record>,
}

impl Manifest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces the entry for `path`.
    ///
    /// `path` must be in canonical manifest form (see [`is_manifest_path`]).
    /// Fingerprints containing whitespace would not survive a
    /// serialize/parse cycle and are rejected.
    pub fn insert(&mut self, path: String, record: Record) -> Result<(), ManifestError> {
        if !is_manifest_path(&path) {
            return Err(ManifestError::InvalidPath(path));
        }
        if record.fingerprint.is_empty() || record.fingerprint.contains(char::is_whitespace) {
            return Err(ManifestError::InvalidPath(format!(
                "{path} (fingerprint {:?})",
                record.fingerprint
            )));
        }
        self.entries.insert(path, record);
        Ok(())
    }

    pub fn remove(&mut self, path: &str) -> Option<Record> {
        self.entries.remove(path)
    }

    pub fn get(&self, path: &str) -> Option<&Record> {
        self.entries.get(path)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.entries.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, Record> {
        self.entries.iter()
    }

    /// Sum of all recorded sizes.
    pub fn total_size(&self) -> u64 {
        self.entries.values().map(|r| r.size).sum()
    }

    /// Moves every entry of `other` into `self`, replacing entries with the
    /// same path.
    pub fn merge(&mut self, other: Manifest) {
        self.entries.extend(other.entries);
    }

    /// Parse manifest text.
    ///
    /// Each line is split on the first two single spaces; the remainder of
    /// the line is the path and may itself contain spaces. Only `\n` ends a
    /// line, so a path ending in `\r` survives intact.
    pub fn parse(text: &str) -> Result<Self, ManifestError> {
        let mut manifest = Manifest::new();

        for (index, line) in text.split_terminator('\n').enumerate() {
            let line_no = index + 1;
            let parse_error = |reason: &str| ManifestError::Parse {
                line: line_no,
                reason: reason.to_string(),
            };

            let mut fields = line.splitn(3, ' ');
            let (Some(fingerprint), Some(size), Some(path)) =
                (fields.next(), fields.next(), fields.next())
            else {
                return Err(parse_error("expected <fingerprint> <size> <path>"));
            };
            if fingerprint.is_empty() || path.is_empty() {
                return Err(parse_error("expected <fingerprint> <size> <path>"));
            }

            let size: u64 = size
                .parse()
                .map_err(|_| parse_error(&format!("invalid size {size:?}")))?;

            if !is_manifest_path(path) {
                return Err(parse_error(&format!(
                    "path {path:?} is not a relative path inside the tree"
                )));
            }
            if manifest.contains(path) {
                return Err(parse_error(&format!("duplicate path {path:?}")));
            }

            manifest
                .insert(
                    path.to_string(),
                    Record {
                        fingerprint: fingerprint.to_string(),
                        size,
                    },
                )
                .map_err(|_| parse_error("fingerprint contains whitespace"))?;
        }

        Ok(manifest)
    }

    /// Serialize to the canonical text form.
    pub fn serialize(&self) -> String {
        let mut out = String::new();
        for (path, record) in &self.entries {
            out.push_str(&record.fingerprint);
            out.push(' ');
            out.push_str(&record.size.to_string());
            out.push(' ');
            out.push_str(path);
            out.push('\n');
        }
        out
    }

    pub fn load_from(path: &Path) -> Result<Self, ManifestError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                ManifestError::Missing(path.parent().unwrap_or(path).to_path_buf())
            } else {
                ManifestError::from_io(e, path)
            }
        })?;

        Self::parse(&content)
    }

    /// Save to `path` atomically.
    ///
    /// Writes to a temporary file in the same directory, fsyncs it, then
    /// renames it into place. If anything fails before the rename the
    /// temporary file is removed when its guard drops.
    pub fn save_to(&self, path: &Path) -> Result<(), ManifestError> {
        let parent = path.parent().unwrap_or(Path::new("."));

        let mut temp_file = tempfile::Builder::new()
            .prefix(".hashcheck-tmp")
            .tempfile_in(parent)
            .map_err(|e| ManifestError::from_io(e, parent))?;

        temp_file
            .write_all(self.serialize().as_bytes())
            .map_err(|e| ManifestError::from_io(e, path))?;

        temp_file
            .as_file()
            .sync_all()
            .map_err(ManifestError::Io)?;

        temp_file
            .persist(path)
            .map_err(|e| ManifestError::from_io(e.error, path))?;

        Ok(())
    }
}

/// Manifest operations scoped to one directory.
#[derive(Debug, Clone)]
pub struct ManifestStore {
    dir: PathBuf,
}

impl ManifestStore {
    pub fn new(dir: &Path) -> Self {
        ManifestStore {
            dir: dir.to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.dir.join(MANIFEST_FILENAME)
    }

    pub fn candidate_path(&self) -> PathBuf {
        self.dir.join(CANDIDATE_FILENAME)
    }

    pub fn exists(&self) -> bool {
        self.manifest_path().is_file()
    }

    pub fn load(&self) -> Result<Manifest, ManifestError> {
        Manifest::load_from(&self.manifest_path())
    }

    pub fn commit(&self, manifest: &Manifest) -> Result<(), ManifestError> {
        manifest.save_to(&self.manifest_path())
    }

    pub fn committed_mtime(&self) -> Result<SystemTime, ManifestError> {
        let path = self.manifest_path();
        std::fs::metadata(&path)
            .and_then(|m| m.modified())
            .map_err(|e| {
                if e.kind() == ErrorKind::NotFound {
                    ManifestError::Missing(self.dir.clone())
                } else {
                    ManifestError::from_io(e, &path)
                }
            })
    }

    pub fn has_candidate(&self) -> bool {
        self.candidate_path().is_file()
    }

    pub fn load_candidate(&self) -> Result<Manifest, ManifestError> {
        Manifest::load_from(&self.candidate_path())
    }

    pub fn save_candidate(&self, manifest: &Manifest) -> Result<(), ManifestError> {
        manifest.save_to(&self.candidate_path())
    }

    /// Removes the candidate if present. Returns whether one was removed.
    pub fn discard_candidate(&self) -> Result<bool, ManifestError> {
        let path = self.candidate_path();
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(ManifestError::from_io(e, &path)),
        }
    }

    /// Renames the candidate over the committed manifest.
    ///
    /// Returns `Ok(false)` when there is no candidate to promote.
    pub fn promote_candidate(&self) -> Result<bool, ManifestError> {
        let candidate = self.candidate_path();
        match std::fs::rename(&candidate, self.manifest_path()) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(ManifestError::from_io(e, &candidate)),
        }
    }
}
