//! Change-ids - which logical changes already reached the target branch

use super::{CHANGE_ID_KEY, Commit};
use crate::{Error, Result};
use std::collections::HashSet;
use uuid::Uuid;

/// Every change-id present in a run of history, sync commits flattened.
#[derive(Debug, Clone, Default)]
pub struct ChangeIdSet {
    ids: HashSet<String>,
}

impl ChangeIdSet {
    pub fn from_commits<'a>(commits: impl IntoIterator<Item = &'a Commit>) -> Self {
        let ids = commits
            .into_iter()
            .flat_map(|c| c.change_ids.iter().cloned())
            .collect();
        Self { ids }
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn contains(&self, change_id: &str) -> bool {
        self.ids.contains(change_id)
    }

    /// A commit is synced when every id it carries is already present.
    pub fn is_synced(&self, commit: &Commit) -> bool {
        !commit.change_ids.is_empty() && commit.change_ids.iter().all(|id| self.contains(id))
    }
}

/// Index into `current` (newest first) of the oldest commit whose change-id
/// is not in `synced`; everything from there up to index 0 is replayed.
///
/// A synced commit newer than that boundary does not shorten the window, it
/// is replayed again along with the rest. `None` means nothing to sync.
///
/// Fails when a commit in `current` carries no change-id, since such a
/// commit could never be recognised as synced.
pub fn pending_index(current: &[Commit], synced: &[Commit]) -> Result<Option<usize>> {
    if let Some(untracked) = current.iter().find(|c| c.change_ids.is_empty()) {
        return Err(Error::MissingChangeId(untracked.short_hash().to_string()));
    }

    let applied = ChangeIdSet::from_commits(synced);
    if applied.is_empty() {
        return Ok(current.len().checked_sub(1));
    }

    Ok(current.iter().rposition(|c| !applied.is_synced(c)))
}

/// A fresh change-id: 128 random bits as lowercase hex
pub fn new_change_id() -> String {
    Uuid::new_v4().simple().to_string()
}

/// The trailer paragraph carrying `change_id`
pub fn trailer(change_id: &str) -> String {
    format!("{}{}", CHANGE_ID_KEY, change_id)
}
