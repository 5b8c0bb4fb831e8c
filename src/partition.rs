//! History partitioning
//!
//! One most-recent-first walk turns the commit graph into pairwise
//! (newer, older) table states. Each visited commit's state is handed to
//! its parents through the [`PendingStateTable`]; when a parent is later
//! visited its own state is compared against every state handed to it, and
//! each content change becomes a [`DiffPartition`].

use crate::cancel::CancelToken;
use crate::commit_walk::CommitItr;
use crate::error::{HistDiffError, Result};
use crate::hash::Hash;
use crate::schema::Schema;
use crate::store::{Commit, Table};
use chrono::{DateTime, Utc};
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::Arc;

/// Table state as of one commit, not yet matched with its parent
#[derive(Debug, Clone)]
pub struct PendingState {
    pub label: String,
    pub timestamp: Option<DateTime<Utc>>,
    pub table: Option<Arc<Table>>,
    pub table_hash: Option<Hash>,
}

impl PendingState {
    pub fn new(label: impl Into<String>, timestamp: Option<DateTime<Utc>>, table: Option<Arc<Table>>) -> Self {
        let table_hash = table.as_ref().map(|t| t.hash());
        Self {
            label: label.into(),
            timestamp,
            table,
            table_hash,
        }
    }
}

/// Commit hash to the states handed down by its already visited children
#[derive(Debug, Default)]
pub struct PendingStateTable {
    states: HashMap<Hash, Vec<PendingState>>,
}

impl PendingStateTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, hash: Hash, state: PendingState) {
        self.states.entry(hash).or_default().push(state);
    }

    /// Remove and return every state pending for `hash`
    pub fn take(&mut self, hash: &Hash) -> Vec<PendingState> {
        self.states.remove(hash).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}

/// A pair of table states to diff. A missing side means the table did not exist.
#[derive(Debug, Clone)]
pub struct DiffPartition {
    pub newer: Option<Arc<Table>>,
    pub older: Option<Arc<Table>>,
    pub newer_label: String,
    pub older_label: String,
    pub newer_date: Option<DateTime<Utc>>,
    pub older_date: Option<DateTime<Utc>>,
}

/// How two sides of a partition can be diffed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Diffability {
    /// Key columns match by tag
    Simple,
    /// Key columns match only by name; nothing older can be diffed
    Fuzzy,
    /// Not diffable; the walk ends here
    None,
}

impl DiffPartition {
    pub fn key(&self) -> String {
        format!("{}..{}", self.older_label, self.newer_label)
    }

    pub fn newer_schema(&self) -> Schema {
        self.newer
            .as_ref()
            .map(|t| t.schema().clone())
            .unwrap_or_else(Schema::empty)
    }

    pub fn older_schema(&self) -> Schema {
        self.older
            .as_ref()
            .map(|t| t.schema().clone())
            .unwrap_or_else(Schema::empty)
    }

    pub fn diffability(&self) -> Diffability {
        // a missing newer side means the table was dropped here; anything
        // older belongs to a different table of the same name
        let Some(newer) = &self.newer else {
            return Diffability::None;
        };
        let Some(older) = &self.older else {
            return Diffability::Simple;
        };

        let newer_keys: Vec<_> = newer.schema().key_columns().collect();
        let older_keys: Vec<_> = older.schema().key_columns().collect();
        if newer_keys.len() != older_keys.len() {
            return Diffability::None;
        }

        let by_tag = newer_keys
            .iter()
            .zip(&older_keys)
            .all(|(n, o)| n.tag == o.tag && n.kind.widened_with(o.kind).is_some());
        if by_tag {
            return Diffability::Simple;
        }

        let by_name = older_keys.iter().all(|o| {
            newer_keys
                .iter()
                .any(|n| n.name == o.name && n.kind.widened_with(o.kind).is_some())
        });
        if by_name {
            Diffability::Fuzzy
        } else {
            Diffability::None
        }
    }
}

impl fmt::Display for DiffPartition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}

/// Predicate selecting which partitions are emitted
pub type PartitionFilter = Arc<dyn Fn(&DiffPartition) -> bool + Send + Sync>;

/// Select partitions whose newer side carries `label`
pub fn to_commit_filter(label: impl Into<String>) -> PartitionFilter {
    let label = label.into();
    Arc::new(move |p: &DiffPartition| p.newer_label == label)
}

/// Select partitions whose older side carries `label`
pub fn from_commit_filter(label: impl Into<String>) -> PartitionFilter {
    let label = label.into();
    Arc::new(move |p: &DiffPartition| p.older_label == label)
}

/// Lazily yields the partitions of one table's history
pub struct DiffPartitions {
    table_name: String,
    commits: Box<dyn CommitItr>,
    pending: PendingStateTable,
    filter: Option<PartitionFilter>,
    ctx: CancelToken,
    ready: VecDeque<DiffPartition>,
    done: bool,
}

impl DiffPartitions {
    pub fn new(
        table_name: impl Into<String>,
        commits: Box<dyn CommitItr>,
        pending: PendingStateTable,
        filter: Option<PartitionFilter>,
        ctx: CancelToken,
    ) -> Self {
        Self {
            table_name: table_name.into(),
            commits,
            pending,
            filter,
            ctx,
            ready: VecDeque::new(),
            done: false,
        }
    }

    fn selected(&self, partition: &DiffPartition) -> bool {
        self.filter.as_ref().map_or(true, |f| f(partition))
    }

    fn process_commit(&mut self, hash: Hash, commit: &Commit) {
        let table = commit.root.get_table(&self.table_name);
        let state = PendingState::new(hash.to_string(), Some(commit.meta.timestamp), table);

        for newer in self.pending.take(&hash) {
            if newer.table_hash == state.table_hash {
                continue;
            }
            let partition = DiffPartition {
                newer: newer.table,
                older: state.table.clone(),
                newer_label: newer.label,
                older_label: state.label.clone(),
                newer_date: newer.timestamp,
                older_date: state.timestamp,
            };
            if self.selected(&partition) {
                self.ready.push_back(partition);
            }
        }

        for parent in &commit.parents {
            self.pending.push(*parent, state.clone());
        }
    }

    fn stop(&mut self) {
        self.done = true;
        self.ready.clear();
    }

    /// Next partition in walk order, or `None` once history is exhausted
    /// or a partition that cannot be diffed further is reached
    pub fn next(&mut self) -> Result<Option<DiffPartition>> {
        loop {
            if self.done {
                return Ok(None);
            }
            if self.ctx.is_cancelled() {
                self.stop();
                return Err(HistDiffError::Cancelled);
            }

            if let Some(partition) = self.ready.pop_front() {
                match partition.diffability() {
                    Diffability::Simple => return Ok(Some(partition)),
                    Diffability::Fuzzy => {
                        log::warn!(
                            "primary key of '{}' changed between {} and {}; older history is not diffed",
                            self.table_name,
                            partition.older_label,
                            partition.newer_label
                        );
                        self.stop();
                        return Ok(Some(partition));
                    }
                    Diffability::None => {
                        log::warn!(
                            "'{}' cannot be diffed between {} and {}; stopping history walk",
                            self.table_name,
                            partition.older_label,
                            partition.newer_label
                        );
                        self.stop();
                        return Ok(None);
                    }
                }
            }

            match self.commits.next()? {
                Some((hash, commit)) => self.process_commit(hash, &commit),
                None => self.done = true,
            }
        }
    }

    /// Drain into an indexable set
    pub fn collect_all(mut self) -> Result<PartitionSet> {
        let mut partitions = Vec::new();
        while let Some(p) = self.next()? {
            partitions.push(p);
        }
        log::debug!("collected {} partitions of '{}'", partitions.len(), self.table_name);
        Ok(PartitionSet { partitions })
    }
}

/// Collected partitions in walk order
#[derive(Debug, Clone, Default)]
pub struct PartitionSet {
    partitions: Vec<DiffPartition>,
}

impl PartitionSet {
    pub fn get(&self, index: usize) -> Result<&DiffPartition> {
        self.partitions
            .get(index)
            .ok_or(HistDiffError::PartitionOutOfRange {
                index,
                len: self.partitions.len(),
            })
    }

    pub fn len(&self) -> usize {
        self.partitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.partitions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DiffPartition> {
        self.partitions.iter()
    }
}

impl IntoIterator for PartitionSet {
    type Item = DiffPartition;
    type IntoIter = std::vec::IntoIter<DiffPartition>;

    fn into_iter(self) -> Self::IntoIter {
        self.partitions.into_iter()
    }
}
