//! Recursive enumeration of the files a manifest covers.
//!
//! Every regular file below the root is included, except names starting with
//! the reserved marker character and the legacy macOS `Icon\r` file. Nested
//! directories with their own `.hashcheck` are walked like any other
//! directory; their manifests are dotfiles and so never fingerprint
//! themselves.

use std::collections::BTreeSet;
use std::ffi::OsStr;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Files whose name starts with this are never recorded.
pub const RESERVED_MARKER: char = '.';

/// Finder's custom-icon file, named `Icon` followed by a carriage return.
pub const LEGACY_EXCLUDED_NAME: &str = "Icon\r";

#[derive(Debug, thiserror::Error)]
pub enum TreeError {
    #[error("IO error: {0}")]
    Io(std::io::Error),
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),
}

impl TreeError {
    fn from_walk(e: walkdir::Error, root: &Path) -> Self {
        let path = e.path().unwrap_or(root).to_path_buf();
        match e.into_io_error() {
            Some(io) if io.kind() == ErrorKind::PermissionDenied => {
                TreeError::PermissionDenied(path)
            }
            Some(io) => TreeError::Io(io),
            None => TreeError::Io(std::io::Error::other(format!(
                "filesystem loop at {}",
                path.display()
            ))),
        }
    }
}

pub fn is_excluded(name: &OsStr) -> bool {
    let bytes = name.as_encoded_bytes();
    bytes.first() == Some(&(RESERVED_MARKER as u8)) || name == LEGACY_EXCLUDED_NAME
}

/// Converts a path relative to the tree root into manifest form (`./a/b`).
///
/// Returns `None` for names that a line-oriented manifest cannot hold.
pub fn manifest_path(relative: &Path) -> Option<String> {
    let mut out = String::from(".");
    for component in relative.components() {
        match component {
            Component::Normal(part) => {
                let part = part.to_str()?;
                if part.contains('\n') {
                    return None;
                }
                out.push('/');
                out.push_str(part);
            }
            Component::CurDir => {}
            _ => return None,
        }
    }
    if out == "." { None } else { Some(out) }
}

fn check_root(root: &Path) -> Result<(), TreeError> {
    let metadata = std::fs::metadata(root).map_err(|e| {
        if e.kind() == ErrorKind::PermissionDenied {
            TreeError::PermissionDenied(root.to_path_buf())
        } else {
            TreeError::Io(e)
        }
    })?;
    if !metadata.is_dir() {
        return Err(TreeError::NotADirectory(root.to_path_buf()));
    }
    std::fs::read_dir(root).map_err(|e| {
        if e.kind() == ErrorKind::PermissionDenied {
            TreeError::PermissionDenied(root.to_path_buf())
        } else {
            TreeError::Io(e)
        }
    })?;
    Ok(())
}

/// Visits every recordable file under `root` with its manifest path.
fn walk_files(
    root: &Path,
    mut visit: impl FnMut(&walkdir::DirEntry, String) -> Result<bool, TreeError>,
) -> Result<(), TreeError> {
    check_root(root)?;

    let walker = WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .min_depth(1);

    for entry in walker {
        let entry = entry.map_err(|e| TreeError::from_walk(e, root))?;
        if !entry.file_type().is_file() || is_excluded(entry.file_name()) {
            continue;
        }

        let relative = entry
            .path()
            .strip_prefix(root)
            .map_err(|e| TreeError::Io(std::io::Error::other(e)))?;

        let Some(path) = manifest_path(relative) else {
            warn!(
                "Skipping {}: name is not UTF-8 or contains a newline",
                entry.path().display()
            );
            continue;
        };

        if !visit(&entry, path)? {
            break;
        }
    }

    Ok(())
}

/// All recordable files under `root`, in manifest path form.
pub fn enumerate_tree(root: &Path) -> Result<BTreeSet<String>, TreeError> {
    let mut paths = BTreeSet::new();
    walk_files(root, |_, path| {
        paths.insert(path);
        Ok(true)
    })?;
    debug!("Enumerated {} files under {}", paths.len(), root.display());
    Ok(paths)
}

/// First recordable file whose modification time is after `reference`.
pub fn find_newer_than(root: &Path, reference: SystemTime) -> Result<Option<String>, TreeError> {
    let mut found = None;
    walk_files(root, |entry, path| {
        let mtime = entry
            .metadata()
            .map_err(|e| TreeError::from_walk(e, root))?
            .modified()
            .map_err(TreeError::Io)?;
        if mtime > reference {
            found = Some(path);
            return Ok(false);
        }
        Ok(true)
    })?;
    Ok(found)
}
