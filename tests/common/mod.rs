//! Common test utilities and helpers

use chrono::{TimeZone, Utc};
use histdiff::memory::MemoryStore;
use histdiff::row::Row;
use histdiff::schema::{Column, Schema};
use histdiff::store::{Commit, CommitMeta, RootValue, SnapshotStore, Table};
use histdiff::value::{Value, ValueKind};
use histdiff::{DiffTable, DiffTableOptions, Hash, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

pub const ID_TAG: u64 = 100;
pub const NAME_TAG: u64 = 200;
pub const AGE_TAG: u64 = 300;

/// Builds commit graphs in a memory store
pub struct RepoBuilder {
    store: MemoryStore,
    clock: i64,
}

impl RepoBuilder {
    pub fn new() -> Self {
        Self {
            store: MemoryStore::new(),
            clock: 0,
        }
    }

    /// Commit the given tables on top of `parents`
    pub fn commit(&mut self, parents: &[Hash], tables: Vec<Table>) -> Hash {
        self.clock += 1;
        let meta = CommitMeta::new(
            "tester",
            Utc.timestamp_opt(1_700_000_000 + self.clock * 60, 0).unwrap(),
            format!("commit {}", self.clock),
        );
        self.store.commit(parents, RootValue::new(tables), meta).unwrap()
    }

    pub fn set_ref(&mut self, name: &str, hash: Hash) {
        self.store.set_ref(name, hash).unwrap();
    }

    pub fn read(&self, hash: Hash) -> Commit {
        self.store.read_commit(&hash).unwrap()
    }

    pub fn into_store(self) -> Arc<dyn SnapshotStore> {
        Arc::new(self.store)
    }

    /// Open a diff session for `table` with head `head`
    pub fn open(self, table: &str, head: Hash, options: DiffTableOptions) -> Result<DiffTable> {
        let head = self.read(head);
        DiffTable::open(self.into_store(), table, head, options)
    }
}

impl Default for RepoBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// `people(id int key, name string)`
pub fn people_schema() -> Schema {
    Schema::new(vec![
        Column::key("id", ID_TAG, ValueKind::Int),
        Column::new("name", NAME_TAG, ValueKind::String),
    ])
    .unwrap()
}

/// `people(id int key, name string, age int)`
pub fn people_with_age_schema() -> Schema {
    Schema::new(vec![
        Column::key("id", ID_TAG, ValueKind::Int),
        Column::new("name", NAME_TAG, ValueKind::String),
        Column::new("age", AGE_TAG, ValueKind::Int),
    ])
    .unwrap()
}

pub fn people(rows: &[(i64, &str)]) -> Table {
    let schema = people_schema();
    let rows = rows
        .iter()
        .map(|(id, name)| Row::from_values(&schema, vec![Value::Int(*id), (*name).into()]).unwrap())
        .collect();
    Table::from_rows("people", schema, rows).unwrap()
}

pub fn people_with_age(rows: &[(i64, &str, i64)]) -> Table {
    let schema = people_with_age_schema();
    let rows = rows
        .iter()
        .map(|(id, name, age)| {
            Row::from_values(&schema, vec![Value::Int(*id), (*name).into(), Value::Int(*age)]).unwrap()
        })
        .collect();
    Table::from_rows("people", schema, rows).unwrap()
}

/// Temporary directory holding fixture and config files
pub struct TestFixture {
    pub temp_dir: TempDir,
}

impl TestFixture {
    pub fn new() -> Result<Self> {
        Ok(Self {
            temp_dir: TempDir::new()?,
        })
    }

    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Write a JSON file under the fixture root
    pub fn create_json(&self, name: &str, data: &serde_json::Value) -> Result<PathBuf> {
        let path = self.root().join(name);
        fs::write(&path, serde_json::to_string_pretty(data)?)?;
        Ok(path)
    }

    pub fn create_raw(&self, name: &str, content: &str) -> Result<PathBuf> {
        let path = self.root().join(name);
        fs::write(&path, content)?;
        Ok(path)
    }
}

/// CLI test runner that parses arguments and executes them in-process
pub struct CliTestRunner {
    fixture: TestFixture,
}

impl CliTestRunner {
    pub fn new() -> Result<Self> {
        Ok(Self {
            fixture: TestFixture::new()?,
        })
    }

    pub fn fixture(&self) -> &TestFixture {
        &self.fixture
    }

    /// Run a histdiff command and return the result
    pub fn run_command(&self, args: &[&str]) -> Result<()> {
        use clap::Parser;
        use histdiff::cli::Cli;
        use histdiff::commands::execute_command;

        let mut cmd_args = vec!["histdiff"];
        cmd_args.extend(args);

        let cli = Cli::try_parse_from(cmd_args)
            .map_err(|e| histdiff::HistDiffError::invalid_input(e.to_string()))?;
        execute_command(cli.command, cli.config.as_deref())
    }

    /// Run a command and expect it to succeed
    pub fn expect_success(&self, args: &[&str]) {
        self.run_command(args).expect("Command should succeed");
    }

    /// Run a command and expect it to fail
    pub fn expect_failure(&self, args: &[&str]) -> histdiff::HistDiffError {
        self.run_command(args).expect_err("Command should fail")
    }
}

/// Sample fixture documents
pub mod sample_data {
    use serde_json::json;

    fn people_columns() -> serde_json::Value {
        json!([
            { "name": "id", "tag": 100, "kind": "int", "key": true },
            { "name": "name", "tag": 200, "kind": "string" }
        ])
    }

    /// init -> create people -> edit + insert, with a working set that deletes id 2
    pub fn people_history() -> serde_json::Value {
        json!({
            "commits": [
                { "id": "init", "message": "init" },
                { "id": "c1", "parents": ["init"], "message": "create people",
                  "tables": { "people": { "columns": people_columns(), "rows": [[1, "alice"]] } } },
                { "id": "c2", "parents": ["c1"], "message": "edit people",
                  "tables": { "people": { "columns": people_columns(), "rows": [[1, "alicia"], [2, "bob"]] } } }
            ],
            "refs": { "main": "c2" },
            "head": "main",
            "working": {
                "people": { "columns": people_columns(), "rows": [[1, "alicia"]] }
            }
        })
    }

    /// Same history with a column added in the last commit
    pub fn evolving_schema_history() -> serde_json::Value {
        json!({
            "commits": [
                { "id": "c1", "message": "create",
                  "tables": { "people": { "columns": people_columns(), "rows": [[1, "alice"], [2, "bob"]] } } },
                { "id": "c2", "parents": ["c1"], "message": "add age, drop bob",
                  "tables": { "people": {
                      "columns": [
                          { "name": "id", "tag": 100, "kind": "int", "key": true },
                          { "name": "name", "tag": 200, "kind": "string" },
                          { "name": "age", "tag": 300, "kind": "int" }
                      ],
                      "rows": [[1, "alice", 30]] } } }
            ],
            "head": "c2"
        })
    }
}

/// Assertion helpers over diff output
pub mod assertions {
    use histdiff::{DiffRow, DiffType};

    pub fn diff_types(rows: &[DiffRow]) -> Vec<DiffType> {
        rows.iter().map(|r| r.diff_type()).collect()
    }

    pub fn assert_diff_types(rows: &[DiffRow], expected: &[DiffType]) {
        assert_eq!(diff_types(rows), expected, "unexpected diff types");
    }
}
