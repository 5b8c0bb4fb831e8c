//! Rows, keys and ordered row mappings

use crate::error::{HistDiffError, Result};
use crate::schema::Schema;
use crate::value::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Ordered tuple of key-column values
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Key(Vec<Value>);

impl Key {
    pub fn new(values: Vec<Value>) -> Self {
        Self(values)
    }

    pub fn values(&self) -> &[Value] {
        &self.0
    }

    pub fn into_values(self) -> Vec<Value> {
        self.0
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        for (i, v) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", v)?;
        }
        f.write_str(")")
    }
}

/// Tagged values of one row. Null values are never stored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Row {
    values: BTreeMap<u64, Value>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a row from positional values in schema order
    pub fn from_values(schema: &Schema, values: Vec<Value>) -> Result<Self> {
        if values.len() != schema.len() {
            return Err(HistDiffError::schema_mismatch(format!(
                "expected {} values, got {}",
                schema.len(),
                values.len()
            )));
        }
        let mut row = Row::new();
        for (col, value) in schema.columns().iter().zip(values) {
            schema.check_value(col, &value)?;
            row.set(col.tag, value);
        }
        Ok(row)
    }

    pub fn get(&self, tag: u64) -> Option<&Value> {
        self.values.get(&tag)
    }

    /// Set a value; setting `Null` clears the tag
    pub fn set(&mut self, tag: u64, value: Value) {
        if value.is_null() {
            self.values.remove(&tag);
        } else {
            self.values.insert(tag, value);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (u64, &Value)> {
        self.values.iter().map(|(t, v)| (*t, v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Cursor over a row mapping in ascending key order
pub type RowCursor<'a> = Box<dyn Iterator<Item = Result<(Key, Row)>> + Send + 'a>;

/// An immutable key-ordered mapping of rows.
///
/// Implementations must yield keys in strictly ascending order.
pub trait RowMap: Send + Sync + fmt::Debug {
    fn len(&self) -> u64;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn cursor(&self) -> Result<RowCursor<'_>>;
}

/// In-memory row mapping
#[derive(Debug, Clone, Default)]
pub struct MemRowMap {
    rows: BTreeMap<Key, Row>,
}

impl MemRowMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from rows, keyed by the schema's key columns
    pub fn from_rows(schema: &Schema, rows: Vec<Row>) -> Result<Self> {
        let mut map = BTreeMap::new();
        for row in rows {
            let key = schema.key_of(&row)?;
            if map.insert(key.clone(), row).is_some() {
                return Err(HistDiffError::invalid_input(format!("duplicate key {}", key)));
            }
        }
        Ok(Self { rows: map })
    }

    pub fn get(&self, key: &Key) -> Option<&Row> {
        self.rows.get(key)
    }

    /// Snapshot of all entries in key order
    pub fn entries(&self) -> Vec<(Key, Row)> {
        self.rows
            .iter()
            .map(|(k, r)| (k.clone(), r.clone()))
            .collect()
    }
}

impl RowMap for MemRowMap {
    fn len(&self) -> u64 {
        self.rows.len() as u64
    }

    fn cursor(&self) -> Result<RowCursor<'_>> {
        Ok(Box::new(
            self.rows.iter().map(|(k, r)| Ok((k.clone(), r.clone()))),
        ))
    }
}
