//! The `diff_<table>` view over a table's history

use crate::cancel::CancelToken;
use crate::commit_walk::{CommitItr, CommitSliceIter, CommitWalker};
use crate::config::EngineConfig;
use crate::diff_iter::{DiffRow, DiffRowIter, DiffSchema};
use crate::error::{HistDiffError, Result};
use crate::hash::Hash;
use crate::partition::{DiffPartition, DiffPartitions, PartitionFilter, PartitionSet, PendingState, PendingStateTable};
use crate::schema::Schema;
use crate::store::{Commit, RootValue, SnapshotStore};
use crate::super_schema::{ReconciledSchema, SchemaReconciler, SuperSchema};
use crate::{DIFF_TABLE_PREFIX, WORKING_LABEL};
use std::collections::HashSet;
use std::sync::Arc;

/// Optional inputs of a diff session
#[derive(Clone, Default)]
pub struct DiffTableOptions {
    /// Uncommitted state, diffed against the head as `WORKING`
    pub working: Option<Arc<RootValue>>,
    /// Oldest commit walked; its ancestors are ignored
    pub from: Option<Hash>,
    pub config: EngineConfig,
    pub filter: Option<PartitionFilter>,
    pub cancel: CancelToken,
}

/// Row-level history of one table
pub struct DiffTable {
    store: Arc<dyn SnapshotStore>,
    table_name: String,
    head: Commit,
    working: Option<Arc<RootValue>>,
    lower_bound: Option<Hash>,
    reconciled: ReconciledSchema,
    target: Schema,
    diff_schema: Arc<DiffSchema>,
    config: EngineConfig,
    filter: Option<PartitionFilter>,
    ctx: CancelToken,
}

impl DiffTable {
    /// Open a diff session for `table` over the ancestry of `head`.
    ///
    /// The table name is resolved case-insensitively against the newest
    /// endpoint (the working set if given, else the head) and then the lower
    /// bound. Every schema of the table in range is reconciled up front.
    pub fn open(
        store: Arc<dyn SnapshotStore>,
        table: &str,
        head: Commit,
        options: DiffTableOptions,
    ) -> Result<Self> {
        options.config.validate()?;

        let newest = options
            .working
            .clone()
            .unwrap_or_else(|| Arc::clone(&head.root));
        let resolved = match newest.get_table_insensitive(table) {
            Some(found) => Some(found),
            None => match &options.from {
                Some(hash) => store.read_commit(hash)?.root.get_table_insensitive(table),
                None => None,
            },
        };
        let Some((table_name, latest)) = resolved else {
            return Err(HistDiffError::table_not_found(table));
        };
        log::info!("opening diff of '{}' from head {}", table_name, head.hash.short());

        let mut walker = Self::walker_for(&store, &head, options.from);
        let mut reconciler = SchemaReconciler::new(table_name.clone(), latest.schema())?;
        let mut reached_from = options.from.is_none();
        while let Some((hash, commit)) = walker.next()? {
            if options.cancel.is_cancelled() {
                return Err(HistDiffError::Cancelled);
            }
            reached_from |= options.from == Some(hash);
            reconciler.visit_commit(&commit)?;
        }
        if !reached_from {
            if let Some(from) = &options.from {
                return Err(HistDiffError::invalid_input(format!(
                    "commit {} is not an ancestor of head {}",
                    from.short(),
                    head.hash.short()
                )));
            }
        }
        let reconciled = reconciler.finish()?;
        let target = reconciled.super_schema.generate_schema()?;
        let diff_schema = Arc::new(DiffSchema::new(&target)?);

        Ok(Self {
            store,
            table_name,
            head,
            working: options.working,
            lower_bound: options.from,
            reconciled,
            target,
            diff_schema,
            config: options.config,
            filter: options.filter,
            ctx: options.cancel,
        })
    }

    /// Open with the head given as a reference name or commit hash
    pub fn open_ref(
        store: Arc<dyn SnapshotStore>,
        table: &str,
        reference: &str,
        options: DiffTableOptions,
    ) -> Result<Self> {
        let head = store.resolve_ref(reference)?;
        Self::open(store, table, head, options)
    }

    fn walker_for(store: &Arc<dyn SnapshotStore>, head: &Commit, from: Option<Hash>) -> CommitWalker {
        CommitWalker::new(Arc::clone(store), vec![head.clone()]).with_stop_at(from)
    }

    fn walker(&self) -> CommitWalker {
        Self::walker_for(&self.store, &self.head, self.lower_bound)
    }

    /// `diff_<table>`
    pub fn name(&self) -> String {
        format!("{}{}", DIFF_TABLE_PREFIX, self.table_name)
    }

    /// The resolved name of the underlying table
    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// Relational schema of the diff rows
    pub fn schema(&self) -> &Schema {
        self.diff_schema.schema()
    }

    pub fn diff_schema(&self) -> &Arc<DiffSchema> {
        &self.diff_schema
    }

    pub fn super_schema(&self) -> &SuperSchema {
        &self.reconciled.super_schema
    }

    /// The super-schema materialized as a concrete schema
    pub fn target_schema(&self) -> &Schema {
        &self.target
    }

    pub fn head(&self) -> &Commit {
        &self.head
    }

    /// Lazily walk history into partitions, newest first
    pub fn partitions(&self) -> Result<DiffPartitions> {
        let mut walker = self.walker();
        let mut pending = PendingStateTable::new();

        if let Some(working) = &self.working {
            if let Some((first, _)) = walker.next()? {
                pending.push(
                    first,
                    PendingState::new(WORKING_LABEL, None, working.get_table(&self.table_name)),
                );
            }
            walker.reset()?;
        }

        Ok(DiffPartitions::new(
            self.table_name.clone(),
            Box::new(walker),
            pending,
            self.filter.clone(),
            self.ctx.clone(),
        ))
    }

    pub fn collect_partitions(&self) -> Result<PartitionSet> {
        self.partitions()?.collect_all()
    }

    /// Partitions whose newer side is one of `hashes`. Commits outside the
    /// walked range or lacking the table are skipped.
    pub fn to_commit_partitions(&self, hashes: &[Hash]) -> Result<PartitionSet> {
        let mut in_scope = HashSet::new();
        let mut walker = self.walker();
        while let Some((hash, _)) = walker.next()? {
            in_scope.insert(hash);
        }

        let mut pending = PendingStateTable::new();
        let mut parents = Vec::new();
        let mut queued = HashSet::new();
        for hash in hashes {
            if !in_scope.contains(hash) {
                log::debug!("commit {} is not in range, skipping", hash.short());
                continue;
            }
            let commit = self.store.read_commit(hash)?;
            let Some(table) = commit.root.get_table(&self.table_name) else {
                continue;
            };
            let state = PendingState::new(hash.to_string(), Some(commit.meta.timestamp), Some(table));
            for parent in &commit.parents {
                pending.push(*parent, state.clone());
                if queued.insert(*parent) {
                    parents.push(self.store.read_commit(parent)?);
                }
            }
        }

        if parents.is_empty() {
            return Ok(PartitionSet::default());
        }

        DiffPartitions::new(
            self.table_name.clone(),
            Box::new(CommitSliceIter::new(parents)),
            pending,
            self.filter.clone(),
            self.ctx.clone(),
        )
        .collect_all()
    }

    /// Row iterator for one partition. The caller closes it, or drops it.
    pub fn partition_rows(&self, partition: &DiffPartition) -> Result<DiffRowIter> {
        DiffRowIter::new(
            &self.table_name,
            partition,
            &self.reconciled,
            &self.target,
            Arc::clone(&self.diff_schema),
            self.config.clone(),
            self.ctx.clone(),
        )
    }

    /// Every diff row of every partition, in partition order.
    ///
    /// Holds the whole history in memory, so it suits small histories and
    /// tests. Large histories should walk [`DiffTable::partitions`] and drain
    /// each [`DiffTable::partition_rows`] iterator instead.
    pub fn rows(&self) -> Result<Vec<DiffRow>> {
        let mut partitions = self.partitions()?;
        let mut rows = Vec::new();
        while let Some(partition) = partitions.next()? {
            let mut iter = self.partition_rows(&partition)?;
            let result = Self::drain(&mut iter, &mut rows);
            iter.close()?;
            result?;
        }
        Ok(rows)
    }

    fn drain(iter: &mut DiffRowIter, rows: &mut Vec<DiffRow>) -> Result<()> {
        while let Some(row) = iter.next()? {
            rows.push(row);
        }
        Ok(())
    }
}
