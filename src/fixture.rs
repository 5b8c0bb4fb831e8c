//! JSON repository fixtures
//!
//! A fixture describes a small commit graph in one file:
//!
//! ```json
//! {
//!   "commits": [
//!     { "id": "c1", "parents": [], "message": "create people",
//!       "tables": { "people": {
//!         "columns": [ { "name": "id", "tag": 1, "kind": "int", "key": true },
//!                      { "name": "name", "tag": 2, "kind": "string" } ],
//!         "rows": [ [1, "alice"] ] } } }
//!   ],
//!   "refs": { "main": "c1" },
//!   "head": "main",
//!   "working": { "people": { "columns": [...], "rows": [...] } }
//! }
//! ```
//!
//! Commits are listed parents first. `working` is optional.

use crate::error::{HistDiffError, Result};
use crate::hash::Hash;
use crate::memory::MemoryStore;
use crate::row::Row;
use crate::schema::{Column, Schema};
use crate::store::{Commit, CommitMeta, RootValue, SnapshotStore, Table};
use crate::value::Value;
use anyhow::Context;
use chrono::{DateTime, Duration, TimeZone, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

/// Seconds since the epoch used for commits without a timestamp
const DEFAULT_EPOCH: i64 = 1_700_000_000;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixtureFile {
    pub commits: Vec<FixtureCommit>,
    #[serde(default)]
    pub refs: IndexMap<String, String>,
    #[serde(default)]
    pub head: Option<String>,
    #[serde(default)]
    pub working: Option<IndexMap<String, FixtureTable>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixtureCommit {
    pub id: String,
    #[serde(default)]
    pub parents: Vec<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub tables: IndexMap<String, FixtureTable>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixtureTable {
    pub columns: Vec<Column>,
    #[serde(default)]
    pub rows: Vec<Vec<serde_json::Value>>,
}

impl FixtureTable {
    fn build(&self, name: &str) -> Result<Table> {
        let schema = Schema::new(self.columns.clone())?;
        let mut rows = Vec::with_capacity(self.rows.len());
        for (i, raw) in self.rows.iter().enumerate() {
            if raw.len() != schema.len() {
                return Err(HistDiffError::invalid_input(format!(
                    "table '{}' row {} has {} values, expected {}",
                    name,
                    i,
                    raw.len(),
                    schema.len()
                )));
            }
            let mut values = Vec::with_capacity(raw.len());
            for (col, json) in schema.columns().iter().zip(raw) {
                let value = Value::from_json(json, col.kind).ok_or_else(|| {
                    HistDiffError::invalid_input(format!(
                        "table '{}' row {}: {} is not a valid {} for column '{}'",
                        name, i, json, col.kind, col.name
                    ))
                })?;
                values.push(value);
            }
            rows.push(Row::from_values(&schema, values)?);
        }
        Table::from_rows(name, schema, rows)
    }
}

fn build_root(tables: &IndexMap<String, FixtureTable>) -> Result<RootValue> {
    let tables = tables
        .iter()
        .map(|(name, t)| t.build(name))
        .collect::<Result<Vec<_>>>()?;
    Ok(RootValue::new(tables))
}

/// A fixture loaded into a memory store
pub struct Fixture {
    store: Arc<MemoryStore>,
    ids: HashMap<String, Hash>,
    head: Commit,
    working: Option<Arc<RootValue>>,
}

impl Fixture {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read fixture {}", path.display()))?;
        let file: FixtureFile = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse fixture {}", path.display()))?;
        Self::from_file(file)
    }

    pub fn from_file(file: FixtureFile) -> Result<Self> {
        let mut store = MemoryStore::new();
        let mut ids: HashMap<String, Hash> = HashMap::new();
        let mut last = None;

        for (i, fc) in file.commits.iter().enumerate() {
            let mut parents = Vec::with_capacity(fc.parents.len());
            for p in &fc.parents {
                let hash = ids.get(p).copied().ok_or_else(|| {
                    HistDiffError::invalid_input(format!(
                        "commit '{}' lists unknown parent '{}'; parents must come first",
                        fc.id, p
                    ))
                })?;
                parents.push(hash);
            }
            let timestamp = fc.timestamp.unwrap_or_else(|| default_timestamp(i));
            let author = fc.author.clone().unwrap_or_else(|| "fixture".to_string());
            let root = build_root(&fc.tables)?;
            let hash = store.commit(&parents, root, CommitMeta::new(author, timestamp, fc.message.clone()))?;
            if ids.insert(fc.id.clone(), hash).is_some() {
                return Err(HistDiffError::invalid_input(format!("duplicate commit id '{}'", fc.id)));
            }
            last = Some(hash);
        }

        for (name, target) in &file.refs {
            let hash = ids.get(target).copied().ok_or_else(|| {
                HistDiffError::invalid_input(format!("ref '{}' points at unknown commit '{}'", name, target))
            })?;
            store.set_ref(name.clone(), hash)?;
        }

        let head_hash = match &file.head {
            Some(name) => file
                .refs
                .get(name)
                .and_then(|id| ids.get(id))
                .or_else(|| ids.get(name))
                .copied()
                .ok_or_else(|| HistDiffError::invalid_input(format!("unknown head '{}'", name)))?,
            None => last.ok_or_else(|| HistDiffError::invalid_input("fixture has no commits"))?,
        };
        let head = store.read_commit(&head_hash)?;

        let working = match &file.working {
            Some(tables) => Some(Arc::new(build_root(tables)?)),
            None => None,
        };

        log::debug!(
            "loaded fixture with {} commits, head {}",
            store.len(),
            head.hash.short()
        );
        Ok(Self {
            store: Arc::new(store),
            ids,
            head,
            working,
        })
    }

    pub fn store(&self) -> Arc<dyn SnapshotStore> {
        self.store.clone()
    }

    pub fn head(&self) -> &Commit {
        &self.head
    }

    pub fn working(&self) -> Option<Arc<RootValue>> {
        self.working.clone()
    }

    /// Hash of a fixture commit id
    pub fn commit_id(&self, id: &str) -> Option<Hash> {
        self.ids.get(id).copied()
    }

    /// Resolve a fixture commit id, ref name or commit hash
    pub fn resolve(&self, reference: &str) -> Result<Commit> {
        match self.ids.get(reference) {
            Some(hash) => self.store.read_commit(hash),
            None => self.store.resolve_ref(reference),
        }
    }
}

fn default_timestamp(index: usize) -> DateTime<Utc> {
    let base = Utc
        .timestamp_opt(DEFAULT_EPOCH, 0)
        .single()
        .unwrap_or_default();
    base + Duration::seconds(index as i64 * 60)
}
