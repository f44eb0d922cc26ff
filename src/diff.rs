use crate::manifest::Manifest;

#[derive(Debug, thiserror::Error)]
pub enum DiffError {
    /// The manifests serialize differently yet no entry differs. This means
    /// a bug in parsing or serialization, never a data problem.
    #[error(
        "Internal consistency error: manifests differ textually but no added, changed or lost entries were found"
    )]
    InternalConsistency,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeType {
    Added,
    Changed,
    Lost,
}

/// Paths classified by [`compare`], each list sorted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiffResult {
    pub added: Vec<String>,
    pub changed: Vec<String>,
    pub lost: Vec<String>,
}

impl DiffResult {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.changed.is_empty() && self.lost.is_empty()
    }

    /// Changed or lost entries. Additions are expected in an append-only
    /// tree and do not count.
    pub fn has_damage(&self) -> bool {
        !self.changed.is_empty() || !self.lost.is_empty()
    }

    /// Every classified path with its change type, sorted by path.
    pub fn entries(&self) -> Vec<(&str, ChangeType)> {
        let mut all: Vec<(&str, ChangeType)> = self
            .added
            .iter()
            .map(|p| (p.as_str(), ChangeType::Added))
            .chain(self.changed.iter().map(|p| (p.as_str(), ChangeType::Changed)))
            .chain(self.lost.iter().map(|p| (p.as_str(), ChangeType::Lost)))
            .collect();
        all.sort_by(|a, b| a.0.cmp(b.0));
        all
    }
}

/// Classify every path of `old` and `new`.
///
/// Identical serialized text short-circuits to an empty result. Otherwise an
/// entry present on both sides is changed when either its size or its
/// fingerprint differs.
pub fn compare(old: &Manifest, new: &Manifest) -> Result<DiffResult, DiffError> {
    if old.serialize() == new.serialize() {
        return Ok(DiffResult::default());
    }

    let mut result = DiffResult::default();

    for (path, old_record) in old.iter() {
        match new.get(path) {
            None => result.lost.push(path.clone()),
            Some(new_record) => {
                if old_record.size != new_record.size
                    || old_record.fingerprint != new_record.fingerprint
                {
                    result.changed.push(path.clone());
                }
            }
        }
    }

    for (path, _) in new.iter() {
        if !old.contains(path) {
            result.added.push(path.clone());
        }
    }

    // Manifest iteration is already ordered. Sorting again keeps the output
    // contract independent of the map type.
    result.added.sort();
    result.changed.sort();
    result.lost.sort();

    if result.is_empty() {
        return Err(DiffError::InternalConsistency);
    }

    Ok(result)
}
