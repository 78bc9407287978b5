//! Permanently excluded items
//!
//! The blacklist is a sorted JSON array of identities. Additions are
//! persisted immediately by [`blacklist_item`](super::persistence::blacklist_item);
//! there is no removal. Blacklisting never touches the item's rating record.

use super::item::ItemId;
use crate::error::{Error, Result};
use elopix_common::atomic_file::write_json_atomic;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

#[derive(Debug, Clone, Default)]
pub struct Blacklist {
    ids: BTreeSet<ItemId>,
    /// Document path; `None` keeps the blacklist in memory only
    path: Option<PathBuf>,
    /// An addition has not reached disk yet
    dirty: bool,
}

impl Blacklist {
    /// Blacklist that is never written to disk
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Load the blacklist document at `path`; a missing file is empty
    pub fn load(path: &Path) -> Result<Self> {
        let ids = if path.exists() {
            let content = std::fs::read_to_string(path).map_err(|e| Error::persistence(path, e))?;
            let ids: BTreeSet<ItemId> =
                serde_json::from_str(&content).map_err(|e| Error::persistence(path, e))?;
            debug!("Loaded {} blacklisted items from {}", ids.len(), path.display());
            ids
        } else {
            BTreeSet::new()
        };

        Ok(Self {
            ids,
            path: Some(path.to_path_buf()),
            dirty: false,
        })
    }

    /// Exclude `id` from all future selections
    ///
    /// Idempotent. Returns whether `id` was newly added. Only memory is
    /// touched; [`Blacklist::pending_write`] hands out what still has to
    /// reach disk.
    pub fn insert(&mut self, id: &str) -> bool {
        let added = self.ids.insert(id.to_string());
        if added {
            info!("Blacklisted {}", id);
            self.dirty = true;
        }
        added
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ItemId> {
        self.ids.iter()
    }

    /// Sorted copy of the identities, for writing outside a lock
    pub fn snapshot(&self) -> Vec<ItemId> {
        self.ids.iter().cloned().collect()
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Document path and sorted snapshot, if an addition is not on disk yet
    pub fn pending_write(&self) -> Option<(PathBuf, Vec<ItemId>)> {
        match &self.path {
            Some(path) if self.dirty => Some((path.clone(), self.snapshot())),
            _ => None,
        }
    }

    /// Record that a snapshot of `saved_len` ids reached disk
    ///
    /// Stays dirty if ids were added after the snapshot was taken.
    pub(crate) fn mark_saved(&mut self, saved_len: usize) {
        if self.ids.len() == saved_len {
            self.dirty = false;
        }
    }
}

/// Write a blacklist snapshot to `path` (write-then-rename)
pub fn write_blacklist(path: &Path, ids: &[ItemId]) -> Result<()> {
    write_json_atomic(path, ids).map_err(|e| Error::persistence(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_insert_is_idempotent() {
        let mut blacklist = Blacklist::in_memory();
        assert!(blacklist.insert("a.png"));
        assert!(!blacklist.insert("a.png"));
        assert_eq!(blacklist.len(), 1);
        assert!(blacklist.contains("a.png"));
        assert!(blacklist.pending_write().is_none());
    }

    #[test]
    fn test_pending_write_is_sorted_and_cleared_once_saved() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("blacklist.json");

        let mut blacklist = Blacklist::load(&path).unwrap();
        assert!(blacklist.pending_write().is_none());
        blacklist.insert("z.png");
        blacklist.insert("b.png");

        let (target, ids) = blacklist.pending_write().unwrap();
        assert_eq!(target, path);
        assert_eq!(ids, vec!["b.png".to_string(), "z.png".to_string()]);
        write_blacklist(&target, &ids).unwrap();
        blacklist.mark_saved(ids.len());

        assert!(blacklist.pending_write().is_none());
        assert_eq!(Blacklist::load(&path).unwrap().snapshot(), ids);
    }

    #[test]
    fn test_addition_after_snapshot_stays_pending() {
        let dir = TempDir::new().unwrap();
        let mut blacklist = Blacklist::load(&dir.path().join("blacklist.json")).unwrap();
        blacklist.insert("a.png");
        let (_, ids) = blacklist.pending_write().unwrap();

        blacklist.insert("c.png");
        blacklist.mark_saved(ids.len());

        let (_, pending) = blacklist.pending_write().unwrap();
        assert_eq!(pending.len(), 2);
    }
}
