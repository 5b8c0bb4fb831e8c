//! Table schemas keyed by stable column tags

use crate::error::{HistDiffError, Result};
use crate::row::{Key, Row};
use crate::value::{Value, ValueKind};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// First tag of the range reserved for synthesized columns
pub const RESERVED_TAG_MIN: u64 = 1 << 50;
/// Tag of the synthesized `commit` column on each side of a diff
pub const DIFF_COMMIT_TAG: u64 = RESERVED_TAG_MIN + 1;
/// Tag of the synthesized `commit_date` column on each side of a diff
pub const DIFF_COMMIT_DATE_TAG: u64 = RESERVED_TAG_MIN + 2;

pub const COMMIT_COLUMN: &str = "commit";
pub const COMMIT_DATE_COLUMN: &str = "commit_date";

/// Column information for a schema
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub tag: u64,
    pub kind: ValueKind,
    #[serde(default, rename = "key")]
    pub is_key: bool,
    #[serde(default = "default_nullable")]
    pub nullable: bool,
}

fn default_nullable() -> bool {
    true
}

impl Column {
    /// A nullable, non-key column
    pub fn new(name: impl Into<String>, tag: u64, kind: ValueKind) -> Self {
        Self {
            name: name.into(),
            tag,
            kind,
            is_key: false,
            nullable: true,
        }
    }

    /// A non-null key column
    pub fn key(name: impl Into<String>, tag: u64, kind: ValueKind) -> Self {
        Self {
            name: name.into(),
            tag,
            kind,
            is_key: true,
            nullable: false,
        }
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }
}

/// Ordered collection of columns. Key order is declaration order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Schema {
    columns: Vec<Column>,
}

impl Schema {
    /// Build a schema, rejecting duplicate tags or names
    pub fn new(columns: Vec<Column>) -> Result<Self> {
        let mut tags = HashSet::new();
        let mut names = HashSet::new();
        for col in &columns {
            if !tags.insert(col.tag) {
                return Err(HistDiffError::schema_mismatch(format!(
                    "duplicate column tag {}",
                    col.tag
                )));
            }
            if !names.insert(col.name.as_str()) {
                return Err(HistDiffError::schema_mismatch(format!(
                    "duplicate column name '{}'",
                    col.name
                )));
            }
        }
        Ok(Self { columns })
    }

    /// Schema of a table that does not exist
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn key_columns(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter().filter(|c| c.is_key)
    }

    pub fn column_by_name(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_by_tag(&self, tag: u64) -> Option<&Column> {
        self.columns.iter().find(|c| c.tag == tag)
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Extract the key of a row under this schema
    pub fn key_of(&self, row: &Row) -> Result<Key> {
        let mut values = Vec::new();
        for col in self.key_columns() {
            match row.get(col.tag) {
                Some(v) => values.push(v.clone()),
                None => {
                    return Err(HistDiffError::schema_mismatch(format!(
                        "row is missing key column '{}'",
                        col.name
                    )))
                }
            }
        }
        Ok(Key::new(values))
    }

    /// Append the synthesized `commit` and `commit_date` columns
    pub fn with_commit_columns(&self) -> Result<Schema> {
        let mut columns = self.columns.clone();
        columns.push(Column::new(COMMIT_COLUMN, DIFF_COMMIT_TAG, ValueKind::String).not_null());
        columns.push(Column::new(
            COMMIT_DATE_COLUMN,
            DIFF_COMMIT_DATE_TAG,
            ValueKind::Timestamp,
        ));
        Schema::new(columns)
    }

    /// Check a value against the declared column kind and nullability
    pub fn check_value(&self, col: &Column, value: &Value) -> Result<()> {
        match value.kind() {
            None if !col.nullable => Err(HistDiffError::schema_mismatch(format!(
                "column '{}' is not nullable",
                col.name
            ))),
            Some(kind) if kind != col.kind => Err(HistDiffError::schema_mismatch(format!(
                "column '{}' is {} but got {} value {}",
                col.name, col.kind, kind, value
            ))),
            _ => Ok(()),
        }
    }
}

/// Structural equality over column descriptors: same columns, same order.
pub fn schemas_equal(a: &Schema, b: &Schema) -> bool {
    a.columns == b.columns
}

/// Name of a column on the newer side of a diff
pub fn to_col_name(name: &str) -> String {
    format!("to_{}", name)
}

/// Name of a column on the older side of a diff
pub fn from_col_name(name: &str) -> String {
    format!("from_{}", name)
}
