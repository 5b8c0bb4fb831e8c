//! Content hashing for snapshots, schemas and commits

use crate::error::{HistDiffError, Result};
use crate::row::{Key, Row};
use crate::schema::Schema;
use crate::value::Value;
use blake3::Hasher;
use rayon::prelude::*;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// A 32-byte content hash
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Hash([u8; 32]);

impl Hash {
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == [0u8; 32]
    }

    /// First 8 hex characters, for log lines
    pub fn short(&self) -> String {
        let mut full = self.to_string();
        full.truncate(8);
        full
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash({})", self.short())
    }
}

impl FromStr for Hash {
    type Err = HistDiffError;

    fn from_str(s: &str) -> Result<Self> {
        let hash = blake3::Hash::from_hex(s)
            .map_err(|e| HistDiffError::invalid_input(format!("invalid hash '{}': {}", s, e)))?;
        Ok(Self(*hash.as_bytes()))
    }
}

impl From<blake3::Hash> for Hash {
    fn from(h: blake3::Hash) -> Self {
        Self(*h.as_bytes())
    }
}

impl Serialize for Hash {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Hash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Hash computer for the structures the store addresses by content
#[derive(Debug, Default, Clone, Copy)]
pub struct HashComputer;

impl HashComputer {
    pub fn new() -> Self {
        Self
    }

    /// Hash a single string value
    pub fn hash_value(&self, value: &str) -> Hash {
        blake3::hash(value.as_bytes()).into()
    }

    /// Compute schema hash from its columns, in declared order
    pub fn hash_schema(&self, schema: &Schema) -> Hash {
        let mut hasher = Hasher::new();
        for col in schema.columns() {
            hasher.update(&col.tag.to_le_bytes());
            hasher.update(col.name.as_bytes());
            hasher.update(b"|");
            hasher.update(col.kind.as_str().as_bytes());
            hasher.update(&[col.is_key as u8, col.nullable as u8]);
            hasher.update(b"||");
        }
        hasher.finalize().into()
    }

    /// Compute a row hash from its tagged values
    pub fn hash_row(&self, key: &Key, row: &Row) -> Hash {
        let mut hasher = Hasher::new();
        for value in key.values() {
            update_value(&mut hasher, value);
        }
        hasher.update(b"#");
        for (tag, value) in row.iter() {
            hasher.update(&tag.to_le_bytes());
            update_value(&mut hasher, value);
        }
        hasher.finalize().into()
    }

    /// Compute a table hash: schema hash followed by the row hashes in key order.
    ///
    /// Rows are hashed in parallel and folded sequentially so the result only
    /// depends on content.
    pub fn hash_table(&self, schema: &Schema, rows: &[(Key, Row)]) -> Hash {
        let row_hashes: Vec<Hash> = rows
            .par_iter()
            .map(|(key, row)| self.hash_row(key, row))
            .collect();

        let mut hasher = Hasher::new();
        hasher.update(self.hash_schema(schema).as_bytes());
        for h in &row_hashes {
            hasher.update(h.as_bytes());
        }
        hasher.finalize().into()
    }

    /// Compute a root hash from (table name, table hash) pairs in name order
    pub fn hash_root<'a>(&self, tables: impl IntoIterator<Item = (&'a str, &'a Hash)>) -> Hash {
        let mut hasher = Hasher::new();
        for (name, hash) in tables {
            hasher.update(name.as_bytes());
            hasher.update(b"|");
            hasher.update(hash.as_bytes());
        }
        hasher.finalize().into()
    }

    /// Compute a commit hash from its root, parents and metadata
    pub fn hash_commit(
        &self,
        root: &Hash,
        parents: &[Hash],
        meta: &crate::store::CommitMeta,
    ) -> Hash {
        let mut hasher = Hasher::new();
        hasher.update(root.as_bytes());
        for parent in parents {
            hasher.update(parent.as_bytes());
        }
        hasher.update(meta.name.as_bytes());
        hasher.update(b"|");
        hasher.update(meta.email.as_bytes());
        hasher.update(b"|");
        hasher.update(&meta.timestamp.timestamp_millis().to_le_bytes());
        hasher.update(meta.description.as_bytes());
        hasher.finalize().into()
    }
}

fn update_value(hasher: &mut Hasher, value: &Value) {
    match value {
        Value::Null => {
            hasher.update(&[0]);
        }
        Value::Bool(b) => {
            hasher.update(&[1, *b as u8]);
        }
        Value::Int(i) => {
            hasher.update(&[2]);
            hasher.update(&i.to_le_bytes());
        }
        Value::Uint(u) => {
            hasher.update(&[3]);
            hasher.update(&u.to_le_bytes());
        }
        Value::Float(f) => {
            hasher.update(&[4]);
            hasher.update(&f.to_bits().to_le_bytes());
        }
        Value::String(s) => {
            hasher.update(&[5]);
            hasher.update(&(s.len() as u64).to_le_bytes());
            hasher.update(s.as_bytes());
        }
        Value::Bytes(b) => {
            hasher.update(&[6]);
            hasher.update(&(b.len() as u64).to_le_bytes());
            hasher.update(b);
        }
        Value::Timestamp(t) => {
            hasher.update(&[7]);
            hasher.update(&t.timestamp_micros().to_le_bytes());
        }
    }
}
