//! Commit graph iteration, most recent first

use crate::error::Result;
use crate::hash::Hash;
use crate::store::{Commit, SnapshotStore};
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};
use std::sync::Arc;

/// A resettable sequence of (hash, commit) pairs
pub trait CommitItr: Send {
    /// Next commit, or `None` once the source is drained
    fn next(&mut self) -> Result<Option<(Hash, Commit)>>;

    /// Restart from the first commit
    fn reset(&mut self) -> Result<()>;
}

/// Heap entry ordered by height, then timestamp, then hash
struct QueuedCommit(Commit);

impl PartialEq for QueuedCommit {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for QueuedCommit {}

impl PartialOrd for QueuedCommit {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueuedCommit {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0
            .height
            .cmp(&other.0.height)
            .then_with(|| self.0.meta.timestamp.cmp(&other.0.meta.timestamp))
            .then_with(|| self.0.hash.cmp(&other.0.hash))
    }
}

/// Topological walk over the ancestry of one or more heads.
///
/// A commit is yielded only after every walked child of it, since a child's
/// height is always greater than its parents'. Each commit is yielded once.
pub struct CommitWalker {
    store: Arc<dyn SnapshotStore>,
    heads: Vec<Commit>,
    stop_at: HashSet<Hash>,
    queue: BinaryHeap<QueuedCommit>,
    seen: HashSet<Hash>,
}

impl CommitWalker {
    pub fn new(store: Arc<dyn SnapshotStore>, heads: Vec<Commit>) -> Self {
        let mut walker = Self {
            store,
            heads,
            stop_at: HashSet::new(),
            queue: BinaryHeap::new(),
            seen: HashSet::new(),
        };
        walker.seed();
        walker
    }

    /// Bound the walk: these commits are yielded but their parents are not walked
    pub fn with_stop_at(mut self, hashes: impl IntoIterator<Item = Hash>) -> Self {
        self.stop_at.extend(hashes);
        self
    }

    fn seed(&mut self) {
        self.queue.clear();
        self.seen.clear();
        for head in self.heads.clone() {
            self.enqueue(head);
        }
    }

    fn enqueue(&mut self, commit: Commit) {
        if self.seen.insert(commit.hash) {
            self.queue.push(QueuedCommit(commit));
        }
    }
}

impl CommitItr for CommitWalker {
    fn next(&mut self) -> Result<Option<(Hash, Commit)>> {
        let Some(QueuedCommit(commit)) = self.queue.pop() else {
            return Ok(None);
        };

        if !self.stop_at.contains(&commit.hash) {
            for parent in &commit.parents {
                if !self.seen.contains(parent) {
                    let parent_commit = self.store.read_commit(parent)?;
                    self.enqueue(parent_commit);
                }
            }
        }

        Ok(Some((commit.hash, commit)))
    }

    fn reset(&mut self) -> Result<()> {
        self.seed();
        Ok(())
    }
}

/// Iterates an explicit list of commits in the given order
pub struct CommitSliceIter {
    commits: Vec<Commit>,
    pos: usize,
}

impl CommitSliceIter {
    pub fn new(commits: Vec<Commit>) -> Self {
        Self { commits, pos: 0 }
    }
}

impl CommitItr for CommitSliceIter {
    fn next(&mut self) -> Result<Option<(Hash, Commit)>> {
        let Some(commit) = self.commits.get(self.pos) else {
            return Ok(None);
        };
        self.pos += 1;
        Ok(Some((commit.hash, commit.clone())))
    }

    fn reset(&mut self) -> Result<()> {
        self.pos = 0;
        Ok(())
    }
}
