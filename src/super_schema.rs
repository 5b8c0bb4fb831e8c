//! Super-schema reconciliation across a table's history
//!
//! The super-schema is the union of every column a table has had in the
//! walked history, keyed by tag. Rows from any historical version are
//! converted into it before they are diffed.

use crate::commit_walk::CommitItr;
use crate::error::{HistDiffError, Result};
use crate::hash::{Hash, HashComputer};
use crate::schema::{Column, Schema};
use crate::store::Commit;
use indexmap::IndexMap;
use std::collections::{HashMap, HashSet};

/// Historical column name to super-schema column name
pub type NameMap = HashMap<String, String>;

#[derive(Debug, Clone)]
struct SuperColumn {
    column: Column,
    /// Every name the tag has carried, first seen first
    names: Vec<String>,
    /// Number of folded schemas containing the tag
    seen_in: usize,
}

/// Union of all columns of one table, keyed by tag
#[derive(Debug, Clone)]
pub struct SuperSchema {
    table: String,
    columns: IndexMap<u64, SuperColumn>,
    schema_count: usize,
}

impl SuperSchema {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            columns: IndexMap::new(),
            schema_count: 0,
        }
    }

    pub fn from_schemas(table: impl Into<String>, schemas: &[&Schema]) -> Result<Self> {
        let mut ss = Self::new(table);
        for sch in schemas {
            ss.add_schema(sch)?;
        }
        Ok(ss)
    }

    /// Fold a schema in. A tag that reappears with an incompatible kind is a
    /// conflict and leaves the super-schema untouched.
    pub fn add_schema(&mut self, sch: &Schema) -> Result<()> {
        let mut widened = Vec::new();
        for col in sch.columns() {
            if let Some(existing) = self.columns.get(&col.tag) {
                let kind = existing
                    .column
                    .kind
                    .widened_with(col.kind)
                    .ok_or_else(|| HistDiffError::SchemaConflict {
                        table: self.table.clone(),
                        tag: col.tag,
                        column: col.name.clone(),
                        existing: existing.column.kind,
                        incoming: col.kind,
                    })?;
                widened.push(kind);
            }
        }

        let mut widened = widened.into_iter();
        for col in sch.columns() {
            match self.columns.get_mut(&col.tag) {
                Some(existing) => {
                    if let Some(kind) = widened.next() {
                        existing.column.kind = kind;
                    }
                    existing.column.nullable |= col.nullable;
                    existing.seen_in += 1;
                    if !existing.names.contains(&col.name) {
                        existing.names.push(col.name.clone());
                    }
                }
                None => {
                    self.columns.insert(
                        col.tag,
                        SuperColumn {
                            column: col.clone(),
                            names: vec![col.name.clone()],
                            seen_in: 1,
                        },
                    );
                }
            }
        }
        self.schema_count += 1;
        Ok(())
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn tags(&self) -> impl Iterator<Item = u64> + '_ {
        self.columns.keys().copied()
    }

    pub fn get_by_tag(&self, tag: u64) -> Option<&Column> {
        self.columns.get(&tag).map(|c| &c.column)
    }

    /// Every name a tag has carried
    pub fn all_names(&self, tag: u64) -> &[String] {
        self.columns
            .get(&tag)
            .map(|c| c.names.as_slice())
            .unwrap_or(&[])
    }

    /// Final column name per tag. A name already claimed by an earlier tag
    /// gets the tag appended.
    fn resolved_names(&self) -> IndexMap<u64, String> {
        let mut used = HashSet::new();
        let mut names = IndexMap::new();
        for (tag, sc) in &self.columns {
            let mut name = sc.column.name.clone();
            if !used.insert(name.clone()) {
                name = format!("{}_{}", sc.column.name, tag);
                used.insert(name.clone());
            }
            names.insert(*tag, name);
        }
        names
    }

    /// Map every column name of `sch` to its name in the super-schema
    pub fn name_map_for_schema(&self, sch: &Schema) -> Result<NameMap> {
        let resolved = self.resolved_names();
        let mut map = NameMap::new();
        for col in sch.columns() {
            let name = resolved.get(&col.tag).ok_or_else(|| {
                HistDiffError::schema_mismatch(format!(
                    "column '{}' (tag {}) is not part of the super schema for table '{}'",
                    col.name, col.tag, self.table
                ))
            })?;
            map.insert(col.name.clone(), name.clone());
        }
        Ok(map)
    }

    /// Materialize as a concrete schema in fold order
    pub fn generate_schema(&self) -> Result<Schema> {
        let resolved = self.resolved_names();
        let columns = self
            .columns
            .iter()
            .map(|(tag, sc)| {
                let always_present = sc.seen_in == self.schema_count;
                Column {
                    name: resolved[tag].clone(),
                    tag: *tag,
                    kind: sc.column.kind,
                    is_key: sc.column.is_key,
                    nullable: sc.column.nullable || !always_present,
                }
            })
            .collect();
        Schema::new(columns)
    }
}

/// Content hashes of schemas already folded during one reconciliation
#[derive(Debug, Default)]
pub struct VisitedSchemaSet {
    hashes: HashSet<Hash>,
}

impl VisitedSchemaSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if the hash was not seen before
    pub fn insert(&mut self, hash: Hash) -> bool {
        self.hashes.insert(hash)
    }

    pub fn contains(&self, hash: &Hash) -> bool {
        self.hashes.contains(hash)
    }

    pub fn len(&self) -> usize {
        self.hashes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hashes.is_empty()
    }
}

/// Result of reconciliation: the super-schema plus a name map per distinct
/// historical schema
#[derive(Debug, Clone)]
pub struct ReconciledSchema {
    pub super_schema: SuperSchema,
    name_maps: HashMap<Hash, NameMap>,
}

impl ReconciledSchema {
    /// Name map for a historical schema, computed on demand for schemas
    /// that were not folded during the walk
    pub fn name_map_for(&self, sch: &Schema) -> Result<NameMap> {
        let hash = HashComputer::new().hash_schema(sch);
        match self.name_maps.get(&hash) {
            Some(map) => Ok(map.clone()),
            None => self.super_schema.name_map_for_schema(sch),
        }
    }

    pub fn distinct_schemas(&self) -> usize {
        self.name_maps.len()
    }
}

/// Folds every distinct schema of one table into a super-schema
pub struct SchemaReconciler {
    table_name: String,
    visited: VisitedSchemaSet,
    distinct: Vec<(Hash, Schema)>,
    super_schema: SuperSchema,
    hasher: HashComputer,
}

impl SchemaReconciler {
    /// Seed with the table's latest schema
    pub fn new(table_name: impl Into<String>, latest: &Schema) -> Result<Self> {
        let table_name = table_name.into();
        let mut reconciler = Self {
            super_schema: SuperSchema::new(table_name.clone()),
            table_name,
            visited: VisitedSchemaSet::new(),
            distinct: Vec::new(),
            hasher: HashComputer::new(),
        };
        reconciler.fold_schema(latest)?;
        Ok(reconciler)
    }

    /// Fold a schema unless an identical one was already folded
    pub fn fold_schema(&mut self, sch: &Schema) -> Result<bool> {
        let hash = self.hasher.hash_schema(sch);
        if !self.visited.insert(hash) {
            return Ok(false);
        }
        self.super_schema.add_schema(sch)?;
        self.distinct.push((hash, sch.clone()));
        Ok(true)
    }

    /// Fold the table's schema at `commit`, if the table exists there
    pub fn visit_commit(&mut self, commit: &Commit) -> Result<()> {
        if let Some(table) = commit.root.get_table(&self.table_name) {
            if self.fold_schema(table.schema())? {
                log::debug!(
                    "folded schema of '{}' at commit {}",
                    self.table_name,
                    commit.hash.short()
                );
            }
        }
        Ok(())
    }

    /// Walk every commit from `commits`, then finish
    pub fn run(mut self, commits: &mut dyn CommitItr) -> Result<ReconciledSchema> {
        while let Some((_, commit)) = commits.next()? {
            self.visit_commit(&commit)?;
        }
        self.finish()
    }

    pub fn finish(self) -> Result<ReconciledSchema> {
        let mut name_maps = HashMap::new();
        for (hash, sch) in &self.distinct {
            name_maps.insert(*hash, self.super_schema.name_map_for_schema(sch)?);
        }
        log::info!(
            "reconciled {} distinct schemas of '{}' into {} columns",
            self.distinct.len(),
            self.table_name,
            self.super_schema.len()
        );
        Ok(ReconciledSchema {
            super_schema: self.super_schema,
            name_maps,
        })
    }
}
