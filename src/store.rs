//! Read-only interface to the content-addressed snapshot store

use crate::error::Result;
use crate::hash::{Hash, HashComputer};
use crate::row::{MemRowMap, Row, RowMap};
use crate::schema::Schema;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Authorship metadata of a commit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitMeta {
    pub name: String,
    pub email: String,
    pub timestamp: DateTime<Utc>,
    pub description: String,
}

impl CommitMeta {
    pub fn new(name: impl Into<String>, timestamp: DateTime<Utc>, description: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            email: format!("{}@localhost", name.to_lowercase()),
            name,
            timestamp,
            description: description.into(),
        }
    }
}

/// An immutable commit
#[derive(Debug, Clone)]
pub struct Commit {
    pub hash: Hash,
    pub parents: Vec<Hash>,
    /// Length of the longest path to a root commit, roots have height 1
    pub height: u64,
    pub meta: CommitMeta,
    pub root: Arc<RootValue>,
}

/// One table's state inside a root value
#[derive(Debug, Clone)]
pub struct Table {
    name: String,
    schema: Schema,
    rows: Arc<dyn RowMap>,
    hash: Hash,
}

impl Table {
    /// Wrap an externally provided row mapping with a precomputed content hash
    pub fn with_row_map(name: impl Into<String>, schema: Schema, rows: Arc<dyn RowMap>, hash: Hash) -> Self {
        Self {
            name: name.into(),
            schema,
            rows,
            hash,
        }
    }

    /// Build an in-memory table, computing its content hash
    pub fn from_rows(name: impl Into<String>, schema: Schema, rows: Vec<Row>) -> Result<Self> {
        let map = MemRowMap::from_rows(&schema, rows)?;
        let hash = HashComputer::new().hash_table(&schema, &map.entries());
        Ok(Self {
            name: name.into(),
            schema,
            rows: Arc::new(map),
            hash,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn rows(&self) -> Arc<dyn RowMap> {
        Arc::clone(&self.rows)
    }

    pub fn hash(&self) -> Hash {
        self.hash
    }
}

/// The set of tables at one commit (or in the working set)
#[derive(Debug, Clone, Default)]
pub struct RootValue {
    tables: BTreeMap<String, Arc<Table>>,
}

impl RootValue {
    pub fn new(tables: impl IntoIterator<Item = Table>) -> Self {
        Self {
            tables: tables
                .into_iter()
                .map(|t| (t.name().to_string(), Arc::new(t)))
                .collect(),
        }
    }

    pub fn get_table(&self, name: &str) -> Option<Arc<Table>> {
        self.tables.get(name).cloned()
    }

    /// Case-insensitive lookup, returning the stored name
    pub fn get_table_insensitive(&self, name: &str) -> Option<(String, Arc<Table>)> {
        if let Some(table) = self.tables.get(name) {
            return Some((name.to_string(), Arc::clone(table)));
        }
        self.tables
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(n, t)| (n.clone(), Arc::clone(t)))
    }

    pub fn table_hash(&self, name: &str) -> Option<Hash> {
        self.tables.get(name).map(|t| t.hash())
    }

    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(|k| k.as_str())
    }

    pub fn hash(&self) -> Hash {
        let pairs: Vec<(&str, Hash)> = self
            .tables
            .iter()
            .map(|(n, t)| (n.as_str(), t.hash()))
            .collect();
        HashComputer::new().hash_root(pairs.iter().map(|(n, h)| (*n, h)))
    }
}

/// Read-only access to commits.
///
/// Implementations are shared across concurrent diff sessions.
pub trait SnapshotStore: Send + Sync {
    /// Resolve a named reference (branch, tag or hash string)
    fn resolve_ref(&self, reference: &str) -> Result<Commit>;

    /// Read a commit by hash
    fn read_commit(&self, hash: &Hash) -> Result<Commit>;
}
