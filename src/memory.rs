//! In-memory content-addressed snapshot store

use crate::error::{HistDiffError, Result};
use crate::hash::{Hash, HashComputer};
use crate::store::{Commit, CommitMeta, RootValue, SnapshotStore};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Commits and named references held in memory
#[derive(Debug, Default)]
pub struct MemoryStore {
    commits: HashMap<Hash, Commit>,
    refs: BTreeMap<String, Hash>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a commit and return its content hash. Parents must already exist.
    pub fn commit(&mut self, parents: &[Hash], root: RootValue, meta: CommitMeta) -> Result<Hash> {
        let mut height = 0;
        for parent in parents {
            let parent_commit = self.commits.get(parent).ok_or_else(|| {
                HistDiffError::store(format!("parent commit {} does not exist", parent))
            })?;
            height = height.max(parent_commit.height);
        }

        let hash = HashComputer::new().hash_commit(&root.hash(), parents, &meta);
        let commit = Commit {
            hash,
            parents: parents.to_vec(),
            height: height + 1,
            meta,
            root: Arc::new(root),
        };
        log::debug!("stored commit {} at height {}", hash.short(), commit.height);
        self.commits.insert(hash, commit);
        Ok(hash)
    }

    /// Point a named reference at a commit
    pub fn set_ref(&mut self, name: impl Into<String>, hash: Hash) -> Result<()> {
        if !self.commits.contains_key(&hash) {
            return Err(HistDiffError::store(format!("commit {} does not exist", hash)));
        }
        self.refs.insert(name.into(), hash);
        Ok(())
    }

    pub fn refs(&self) -> impl Iterator<Item = (&str, &Hash)> {
        self.refs.iter().map(|(n, h)| (n.as_str(), h))
    }

    pub fn len(&self) -> usize {
        self.commits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commits.is_empty()
    }
}

impl SnapshotStore for MemoryStore {
    fn resolve_ref(&self, reference: &str) -> Result<Commit> {
        if let Some(hash) = self.refs.get(reference) {
            return self.read_commit(hash);
        }
        match reference.parse::<Hash>() {
            Ok(hash) => self.read_commit(&hash),
            Err(_) => Err(HistDiffError::store(format!(
                "unable to resolve reference '{}'",
                reference
            ))),
        }
    }

    fn read_commit(&self, hash: &Hash) -> Result<Commit> {
        self.commits
            .get(hash)
            .cloned()
            .ok_or_else(|| HistDiffError::store(format!("commit {} not found", hash)))
    }
}
